//! Wire-level DTOs: the inbound JSON frame and the outbound rendered fragment.

use serde::Deserialize;

use crate::common::time::format_wall_clock;
use crate::domain::{ChatMessage, UserId};

/// Inbound text frame. Clients send a JSON object with at least a `msg`
/// field; anything else (e.g. form metadata added by the front end) is
/// ignored.
#[derive(Debug, Deserialize)]
pub struct InboundChatFrame {
    pub msg: String,
}

/// Render one message as the recipient-relative outbound fragment.
///
/// `viewer` is the identity of the session the frame is written to; the
/// `data-mine` flag compares it against the sender so the front end can style
/// the viewer's own messages differently.
pub fn render_message(message: &ChatMessage, viewer: &UserId) -> String {
    let mine = message.sender_id == *viewer;
    format!(
        concat!(
            r#"<div class="message" data-room="{room}" data-mine="{mine}">"#,
            r#"<span class="sender">{sender}</span>"#,
            r#"<span class="time">{time}</span>"#,
            r#"<p class="body">{body}</p>"#,
            "</div>"
        ),
        room = escape_html(message.room_id.as_str()),
        mine = mine,
        sender = escape_html(&message.sender_name),
        time = format_wall_clock(message.sent_at),
        body = escape_html(&message.body),
    )
}

/// Minimal HTML escaping for user-controlled text interpolated into the
/// outbound fragment.
fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
