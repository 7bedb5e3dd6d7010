//! Session write task: pumps messages from the outbound queue to the
//! connection and keeps the peer alive with periodic pings.
//!
//! The only task permitted to send on this connection. Every write runs under
//! `write_wait`; a write that cannot complete in time tears the session down.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::sink::SinkExt;
use futures_util::stream::SplitSink;
use tokio::time::{Instant, interval_at, timeout};

use crate::domain::UserId;
use crate::hub::OutboundReceiver;
use crate::infrastructure::dto::render_message;

use super::SessionConfig;

pub(super) async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: OutboundReceiver,
    viewer: UserId,
    config: SessionConfig,
) {
    // First probe fires one full period in, not immediately.
    let mut probe = interval_at(Instant::now() + config.ping_period, config.ping_period);

    loop {
        tokio::select! {
            delivery = outbound.recv() => match delivery {
                Some(message) => {
                    let frame = render_message(&message, &viewer);
                    if let Err(e) =
                        write_within(&mut sink, Message::Text(frame.into()), config.write_wait).await
                    {
                        tracing::debug!(error = %e, "outbound write failed");
                        break;
                    }
                }
                None => {
                    // The hub closed the queue: unregistered or evicted.
                    let _ =
                        write_within(&mut sink, Message::Close(None), config.write_wait).await;
                    break;
                }
            },
            _ = probe.tick() => {
                if let Err(e) =
                    write_within(&mut sink, Message::Ping(Bytes::new()), config.write_wait).await
                {
                    tracing::debug!(error = %e, "liveness probe write failed");
                    break;
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum WriteError {
    #[error("write deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Transport(#[from] axum::Error),
}

async fn write_within(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    write_wait: Duration,
) -> Result<(), WriteError> {
    match timeout(write_wait, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WriteError::Transport(e)),
        Err(_) => Err(WriteError::DeadlineExceeded),
    }
}
