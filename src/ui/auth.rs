//! Identity injection seam.
//!
//! A real deployment runs its own authentication middleware (JWT/session
//! cookie) upstream and inserts an [`Identity`] extension before these routes
//! are reached. `header_identity` is the stand-in used by the demo binary and
//! the integration tests: it trusts `X-User-Id`/`X-User-Name` headers, which
//! is obviously only acceptable behind a terminating proxy you control.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::{Identity, UserId};

pub async fn header_identity(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let identity = identity_from_headers(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    let user_id = headers
        .get("x-user-id")?
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw).ok())?;
    let user_name = headers.get("x-user-name")?.to_str().ok()?.to_string();
    if user_name.trim().is_empty() {
        return None;
    }
    Some(Identity {
        user_id: UserId::new(user_id),
        user_name,
    })
}
