//! Per-connection session protocol.
//!
//! One physical connection is driven by exactly two tasks: a read task that
//! owns the receive half of the socket and a write task that owns the send
//! half. The read task turns valid inbound frames into store-then-broadcast
//! requests; the write task drains the session's bounded outbound queue and
//! keeps the connection alive with periodic pings. Whichever task exits first
//! aborts the other, and the session unregisters from the hub exactly once on
//! the way out (the hub tolerates a second unregister from the eviction path).

mod read;
mod write;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use futures_util::StreamExt;

use crate::domain::{Identity, RoomId, RoomStore, SessionId, StoreError};
use crate::hub::{HubClosed, HubHandle, OutboundReceiver};

/// Timing and sizing knobs for one connection.
///
/// `ping_period` must be strictly shorter than `pong_wait` so a liveness
/// probe is always attempted before the peer-side deadline can expire.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Time allowed to write a frame to the peer.
    pub write_wait: Duration,
    /// Time allowed to read the next pong from the peer.
    pub pong_wait: Duration,
    /// Interval between server-initiated pings.
    pub ping_period: Duration,
    /// Maximum inbound frame size allowed from the peer.
    pub max_frame_bytes: usize,
    /// Capacity of the bounded outbound queue.
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            max_frame_bytes: 512,
            queue_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionConfigError> {
        if self.ping_period >= self.pong_wait {
            return Err(SessionConfigError::PingPeriodTooLong {
                ping_period: self.ping_period,
                pong_wait: self.pong_wait,
            });
        }
        if self.queue_capacity == 0 {
            return Err(SessionConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionConfigError {
    #[error("ping period {ping_period:?} must be strictly shorter than pong wait {pong_wait:?}")]
    PingPeriodTooLong {
        ping_period: Duration,
        pong_wait: Duration,
    },
    #[error("outbound queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Identity and placement of one connection, fixed for its whole lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub room_id: RoomId,
    pub identity: Identity,
}

impl Session {
    pub fn new(room_id: RoomId, identity: Identity) -> Self {
        Self {
            id: SessionId::generate(),
            room_id,
            identity,
        }
    }
}

/// Fatal per-session failures. Each tears down that one connection only.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("message could not be persisted: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Hub(#[from] HubClosed),
}

/// Drive one upgraded connection until either task exits, then unregister.
///
/// The caller has already registered the session with the hub and holds no
/// other reference to `outbound`; the hub owns the sender half.
pub async fn run_session(
    socket: WebSocket,
    session: Session,
    hub: HubHandle,
    store: Arc<dyn RoomStore>,
    config: SessionConfig,
    outbound: OutboundReceiver,
) {
    let (sink, stream) = socket.split();
    let viewer = session.identity.user_id;

    let mut read_task = tokio::spawn(read::read_loop(
        stream,
        session.clone(),
        hub.clone(),
        store,
        config,
    ));
    let mut write_task = tokio::spawn(write::write_loop(sink, outbound, viewer, config));

    // Exactly one reader and one writer exist per connection; the first to
    // finish takes the other down with it.
    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    };

    if hub
        .unregister(session.room_id.clone(), session.id)
        .await
        .is_err()
    {
        tracing::debug!(session_id = %session.id, "hub already stopped during teardown");
    }
    tracing::info!(session_id = %session.id, room_id = %session.room_id, "session closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        // given:
        let config = SessionConfig::default();

        // when / then:
        assert!(config.validate().is_ok());
        assert!(config.ping_period < config.pong_wait);
    }

    #[test]
    fn test_validate_rejects_ping_period_not_shorter_than_pong_wait() {
        // given:
        let config = SessionConfig {
            ping_period: Duration::from_secs(60),
            pong_wait: Duration::from_secs(60),
            ..SessionConfig::default()
        };

        // when:
        let result = config.validate();

        // then:
        assert!(matches!(
            result,
            Err(SessionConfigError::PingPeriodTooLong { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_queue_capacity() {
        // given:
        let config = SessionConfig {
            queue_capacity: 0,
            ..SessionConfig::default()
        };

        // when:
        let result = config.validate();

        // then:
        assert_eq!(result, Err(SessionConfigError::ZeroQueueCapacity));
    }
}
