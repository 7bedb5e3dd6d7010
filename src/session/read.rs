//! Session read task: pumps frames from the connection to the hub.
//!
//! The only task permitted to receive on this connection. The inbound frame
//! size limit is enforced by the upgrade (`max_message_size`), so an
//! oversized frame surfaces here as a read error and tears the session down.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitStream, StreamExt};
use tokio::time::{Instant, timeout_at};

use crate::common::time::now_utc;
use crate::domain::{ChatMessage, RoomStore};
use crate::hub::HubHandle;
use crate::infrastructure::dto::InboundChatFrame;

use super::{Session, SessionConfig, SessionError};

/// Read frames until an error, a close, or the idle deadline.
///
/// The deadline starts at `pong_wait` and is refreshed only when the peer
/// acknowledges a liveness probe; a peer that never pongs is torn down within
/// roughly one `pong_wait` of its last acknowledgment.
pub(super) async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    session: Session,
    hub: HubHandle,
    store: Arc<dyn RoomStore>,
    config: SessionConfig,
) {
    let mut deadline = Instant::now() + config.pong_wait;

    loop {
        let frame = match timeout_at(deadline, stream.next()).await {
            Err(_) => {
                tracing::debug!(session_id = %session.id, "idle deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(session_id = %session.id, error = %e, "read failed");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Pong(_) => {
                deadline = Instant::now() + config.pong_wait;
            }
            Message::Text(text) => {
                if let Err(e) = handle_inbound(text.as_str(), &session, &hub, store.as_ref()).await
                {
                    tracing::warn!(session_id = %session.id, error = %e, "terminating session");
                    break;
                }
            }
            Message::Close(_) => {
                tracing::debug!(session_id = %session.id, "peer requested close");
                break;
            }
            _ => {}
        }
    }
}

/// Store one inbound message, then submit it for broadcast.
///
/// Persistence comes first: a message the store rejected is never delivered.
/// A frame that fails to parse is discarded without touching the store and is
/// not fatal to the session.
async fn handle_inbound(
    raw: &str,
    session: &Session,
    hub: &HubHandle,
    store: &dyn RoomStore,
) -> Result<(), SessionError> {
    let frame: InboundChatFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "discarding malformed frame");
            return Ok(());
        }
    };

    let sent_at = now_utc();
    store
        .store_message(
            &session.room_id,
            &session.identity.user_id,
            &frame.msg,
            sent_at,
        )
        .await?;

    let message = Arc::new(ChatMessage::new(
        session.room_id.clone(),
        &session.identity,
        frame.msg,
        sent_at,
    ));
    hub.broadcast(message, session.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;
    use uuid::Uuid;

    use crate::domain::{Identity, MockRoomStore, RoomId, StoreError, UserId};
    use crate::hub::{Hub, HubConfig};

    fn fixture_session() -> Session {
        Session::new(
            RoomId::new("r1".to_string()).unwrap(),
            Identity {
                user_id: UserId::new(Uuid::new_v4()),
                user_name: "alice".to_string(),
            },
        )
    }

    fn spawn_hub() -> (HubHandle, tokio::task::JoinHandle<()>) {
        let (handle, hub) = Hub::new(HubConfig::default());
        (handle, tokio::spawn(hub.run()))
    }

    #[tokio::test]
    async fn test_valid_frame_is_stored_then_broadcast() {
        // given: a running hub with the session registered, and a store that
        // accepts the message
        let (hub, _join) = spawn_hub();
        let session = fixture_session();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(session.room_id.clone(), session.id, tx)
            .await
            .unwrap();

        let mut store = MockRoomStore::new();
        let expected_room = session.room_id.clone();
        let expected_sender = session.identity.user_id;
        store
            .expect_store_message()
            .withf(move |room, sender, body, _| {
                *room == expected_room && *sender == expected_sender && body == "hi"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        // when:
        let result = handle_inbound(r#"{"msg":"hi"}"#, &session, &hub, &store).await;

        // then: the message reached the session's own queue (self-echo on)
        assert!(result.is_ok());
        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.body, "hi");
        assert_eq!(delivered.sender_name, "alice");
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal_and_nothing_is_broadcast() {
        // given: a store that rejects the message
        let (hub, _join) = spawn_hub();
        let session = fixture_session();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(session.room_id.clone(), session.id, tx)
            .await
            .unwrap();

        let mut store = MockRoomStore::new();
        store
            .expect_store_message()
            .times(1)
            .returning(|_, _, _, _| Err(StoreError::Backend("db down".to_string())));

        // when:
        let result = handle_inbound(r#"{"msg":"hi"}"#, &session, &hub, &store).await;

        // then: the session error is fatal and no broadcast was submitted
        assert!(matches!(result, Err(SessionError::Store(_))));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_discarded_without_storing() {
        // given: a store that must not be called
        let (hub, _join) = spawn_hub();
        let session = fixture_session();
        let mut store = MockRoomStore::new();
        store.expect_store_message().times(0);

        // when:
        let result = handle_inbound("not json at all", &session, &hub, &store).await;

        // then: the frame is skipped, the session survives
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_failure_after_hub_shutdown_is_fatal() {
        // given: a hub that has already stopped
        let (hub, join) = spawn_hub();
        hub.shutdown().await.unwrap();
        join.await.unwrap();

        let session = fixture_session();
        let mut store = MockRoomStore::new();
        store
            .expect_store_message()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        // when:
        let result = handle_inbound(r#"{"msg":"hi"}"#, &session, &hub, &store).await;

        // then:
        assert!(matches!(result, Err(SessionError::Hub(_))));
    }
}
