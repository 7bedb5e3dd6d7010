//! Hub: single-owner control loop for room membership and message fan-out.
//!
//! The hub loop is the only place room state is read or mutated. Sessions and
//! the HTTP layer talk to it through a [`HubHandle`], which serializes every
//! register/unregister/broadcast request over one bounded channel. Shared
//! mutable state therefore needs no locks, and the order in which broadcast
//! requests are accepted defines delivery order within a room.

mod registry;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::{ChatMessage, RoomId, SessionId};

use registry::RoomRegistry;

/// Sender half of one session's bounded outbound queue.
///
/// The hub holds the only clone; dropping it closes the queue and thereby
/// cancels that session's write task.
pub type OutboundSender = mpsc::Sender<Arc<ChatMessage>>;

/// Receiver half, consumed by exactly one write task.
pub type OutboundReceiver = mpsc::Receiver<Arc<ChatMessage>>;

/// Requests accepted by the hub loop.
#[derive(Debug)]
enum HubCommand {
    Register {
        room_id: RoomId,
        session_id: SessionId,
        queue: OutboundSender,
    },
    Unregister {
        room_id: RoomId,
        session_id: SessionId,
    },
    Broadcast {
        message: Arc<ChatMessage>,
        origin: SessionId,
    },
    CreateRoom(RoomId),
    DeleteRoom(RoomId),
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Whether a broadcast is delivered back to the session that sent it.
    /// The rendered frame marks such messages as the viewer's own.
    pub self_echo: bool,
    /// Capacity of the hub's request channel.
    pub command_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            self_echo: true,
            command_buffer: 1024,
        }
    }
}

/// The hub loop declined the request because it is no longer running.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("hub is no longer running")]
pub struct HubClosed;

/// Cloneable handle for submitting requests to the hub loop.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Insert a session into its room's registry entry. Registering an
    /// already-present session is a no-op.
    pub async fn register(
        &self,
        room_id: RoomId,
        session_id: SessionId,
        queue: OutboundSender,
    ) -> Result<(), HubClosed> {
        self.send(HubCommand::Register {
            room_id,
            session_id,
            queue,
        })
        .await
    }

    /// Remove a session and close its outbound queue. Safe to call for an
    /// absent or already-removed session.
    pub async fn unregister(
        &self,
        room_id: RoomId,
        session_id: SessionId,
    ) -> Result<(), HubClosed> {
        self.send(HubCommand::Unregister {
            room_id,
            session_id,
        })
        .await
    }

    /// Fan a message out to every live session in its room.
    pub async fn broadcast(
        &self,
        message: Arc<ChatMessage>,
        origin: SessionId,
    ) -> Result<(), HubClosed> {
        self.send(HubCommand::Broadcast { message, origin }).await
    }

    /// Ensure a registry entry exists for the room (explicit room creation by
    /// an external collaborator).
    pub async fn create_room(&self, room_id: RoomId) -> Result<(), HubClosed> {
        self.send(HubCommand::CreateRoom(room_id)).await
    }

    /// Drop the room's registry entry and close every member queue.
    pub async fn delete_room(&self, room_id: RoomId) -> Result<(), HubClosed> {
        self.send(HubCommand::DeleteRoom(room_id)).await
    }

    /// Stop the hub loop. Live sessions are not force-closed by this; they
    /// terminate independently via their own connection error paths.
    pub async fn shutdown(&self) -> Result<(), HubClosed> {
        self.send(HubCommand::Shutdown).await
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubClosed> {
        self.tx.send(command).await.map_err(|_| HubClosed)
    }
}

/// The control loop state. Create with [`Hub::new`], then spawn [`Hub::run`].
pub struct Hub {
    rx: mpsc::Receiver<HubCommand>,
    registry: RoomRegistry,
    config: HubConfig,
}

impl Hub {
    pub fn new(config: HubConfig) -> (HubHandle, Self) {
        let (tx, rx) = mpsc::channel(config.command_buffer);
        let hub = Self {
            rx,
            registry: RoomRegistry::default(),
            config,
        };
        (HubHandle { tx }, hub)
    }

    /// Run the loop until a shutdown request arrives or every handle is
    /// dropped. No per-session or per-message failure terminates it.
    pub async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                HubCommand::Register {
                    room_id,
                    session_id,
                    queue,
                } => {
                    if self.registry.insert(room_id.clone(), session_id, queue) {
                        tracing::debug!(%room_id, %session_id, "session registered");
                    } else {
                        tracing::debug!(%room_id, %session_id, "duplicate register ignored");
                    }
                }
                HubCommand::Unregister {
                    room_id,
                    session_id,
                } => {
                    if self.registry.remove(&room_id, &session_id).is_some() {
                        tracing::debug!(%room_id, %session_id, "session unregistered");
                    }
                }
                HubCommand::Broadcast { message, origin } => {
                    self.fan_out(message, origin);
                }
                HubCommand::CreateRoom(room_id) => {
                    self.registry.create_room(room_id.clone());
                    tracing::debug!(%room_id, "room created");
                }
                HubCommand::DeleteRoom(room_id) => {
                    let dropped = self.registry.delete_room(&room_id);
                    tracing::info!(%room_id, dropped, "room deleted");
                }
                HubCommand::Shutdown => {
                    tracing::info!("hub shutdown requested");
                    break;
                }
            }
        }
        tracing::info!("hub stopped");
    }

    /// Attempt a non-blocking enqueue onto every member's outbound queue.
    ///
    /// A full queue marks that one member as a slow consumer: it is removed
    /// from the room and its queue is closed, exactly as if it had
    /// unregistered. Delivery to the remaining members is unaffected.
    fn fan_out(&mut self, message: Arc<ChatMessage>, origin: SessionId) {
        let room_id = message.room_id.clone();
        let mut evicted: Vec<SessionId> = Vec::new();

        for (session_id, queue) in self.registry.members(&room_id) {
            if !self.config.self_echo && *session_id == origin {
                continue;
            }
            match queue.try_send(Arc::clone(&message)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(%room_id, %session_id, "outbound queue full, evicting slow consumer");
                    evicted.push(*session_id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%room_id, %session_id, "outbound queue already closed");
                    evicted.push(*session_id);
                }
            }
        }

        for session_id in evicted {
            self.registry.remove(&room_id, &session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::mpsc::error::TryRecvError;
    use uuid::Uuid;

    use crate::domain::{Identity, UserId};

    fn room(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn message(room_id: &RoomId, body: &str) -> Arc<ChatMessage> {
        let sender = Identity {
            user_id: UserId::new(Uuid::new_v4()),
            user_name: "alice".to_string(),
        };
        Arc::new(ChatMessage::new(
            room_id.clone(),
            &sender,
            body.to_string(),
            Utc::now(),
        ))
    }

    fn spawn_hub(config: HubConfig) -> (HubHandle, tokio::task::JoinHandle<()>) {
        let (handle, hub) = Hub::new(config);
        let join = tokio::spawn(hub.run());
        (handle, join)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_room_members_in_order() {
        // given: two sessions registered in the same room
        let (hub, _join) = spawn_hub(HubConfig::default());
        let r1 = room("r1");
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = SessionId::generate();
        let b = SessionId::generate();
        hub.register(r1.clone(), a, tx_a).await.unwrap();
        hub.register(r1.clone(), b, tx_b).await.unwrap();

        // when: three broadcasts are accepted in order
        let m1 = message(&r1, "one");
        let m2 = message(&r1, "two");
        let m3 = message(&r1, "three");
        hub.broadcast(m1, a).await.unwrap();
        hub.broadcast(m2, a).await.unwrap();
        hub.broadcast(m3, b).await.unwrap();

        // then: both members observe all three in processing order
        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.recv().await.unwrap().body, "one");
            assert_eq!(rx.recv().await.unwrap().body, "two");
            assert_eq!(rx.recv().await.unwrap().body, "three");
        }
    }

    #[tokio::test]
    async fn test_broadcast_does_not_cross_rooms() {
        // given: one session per room
        let (hub, _join) = spawn_hub(HubConfig::default());
        let r1 = room("r1");
        let r2 = room("r2");
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = SessionId::generate();
        let b = SessionId::generate();
        hub.register(r1.clone(), a, tx_a).await.unwrap();
        hub.register(r2.clone(), b, tx_b).await.unwrap();

        // when: a message is broadcast into r1
        hub.broadcast(message(&r1, "hi"), a).await.unwrap();

        // then: only the r1 member receives it
        assert_eq!(rx_a.recv().await.unwrap().body, "hi");
        assert!(matches!(rx_b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_duplicate_register_keeps_original_queue() {
        // given: a registered session
        let (hub, _join) = spawn_hub(HubConfig::default());
        let r1 = room("r1");
        let a = SessionId::generate();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        hub.register(r1.clone(), a, tx1).await.unwrap();

        // when: the same session id registers again with another queue
        hub.register(r1.clone(), a, tx2).await.unwrap();
        hub.broadcast(message(&r1, "hi"), SessionId::generate())
            .await
            .unwrap();

        // then: the original queue receives; the duplicate was dropped unused
        assert_eq!(rx1.recv().await.unwrap().body, "hi");
        assert_eq!(rx2.recv().await, None);
    }

    #[tokio::test]
    async fn test_unregister_closes_queue_and_is_idempotent() {
        // given:
        let (hub, _join) = spawn_hub(HubConfig::default());
        let r1 = room("r1");
        let a = SessionId::generate();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(r1.clone(), a, tx).await.unwrap();

        // when: unregistered twice, plus once for a session never registered
        hub.unregister(r1.clone(), a).await.unwrap();
        hub.unregister(r1.clone(), a).await.unwrap();
        hub.unregister(r1.clone(), SessionId::generate())
            .await
            .unwrap();

        // then: the queue is closed and later broadcasts skip the session
        assert_eq!(rx.recv().await, None);
        hub.broadcast(message(&r1, "after"), SessionId::generate())
            .await
            .unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_slow_consumer_is_evicted_without_blocking_others() {
        // given: a room where one member has a single-slot queue
        let (hub, _join) = spawn_hub(HubConfig::default());
        let r1 = room("r1");
        let slow = SessionId::generate();
        let fast = SessionId::generate();
        let (tx_slow, mut rx_slow) = mpsc::channel(1);
        let (tx_fast, mut rx_fast) = mpsc::channel(8);
        hub.register(r1.clone(), slow, tx_slow).await.unwrap();
        hub.register(r1.clone(), fast, tx_fast).await.unwrap();

        // when: two broadcasts arrive before the slow member drains anything
        let origin = SessionId::generate();
        hub.broadcast(message(&r1, "one"), origin).await.unwrap();
        hub.broadcast(message(&r1, "two"), origin).await.unwrap();

        // then: the fast member got both, the slow member got the first and
        // was then removed, its queue closed
        assert_eq!(rx_fast.recv().await.unwrap().body, "one");
        assert_eq!(rx_fast.recv().await.unwrap().body, "two");
        assert_eq!(rx_slow.recv().await.unwrap().body, "one");
        assert_eq!(rx_slow.recv().await, None);

        // and later broadcasts still reach the remaining member
        hub.broadcast(message(&r1, "three"), origin).await.unwrap();
        assert_eq!(rx_fast.recv().await.unwrap().body, "three");
    }

    #[tokio::test]
    async fn test_self_echo_disabled_skips_the_sender() {
        // given: self-echo turned off
        let config = HubConfig {
            self_echo: false,
            ..HubConfig::default()
        };
        let (hub, _join) = spawn_hub(config);
        let r1 = room("r1");
        let a = SessionId::generate();
        let b = SessionId::generate();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register(r1.clone(), a, tx_a).await.unwrap();
        hub.register(r1.clone(), b, tx_b).await.unwrap();

        // when: a broadcast originating from session a
        hub.broadcast(message(&r1, "hi"), a).await.unwrap();

        // then: b receives it, a does not
        assert_eq!(rx_b.recv().await.unwrap().body, "hi");
        assert!(matches!(rx_a.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_self_echo_enabled_delivers_to_the_sender() {
        // given: default config (self-echo on)
        let (hub, _join) = spawn_hub(HubConfig::default());
        let r1 = room("r1");
        let a = SessionId::generate();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        hub.register(r1.clone(), a, tx_a).await.unwrap();

        // when:
        hub.broadcast(message(&r1, "hi"), a).await.unwrap();

        // then:
        assert_eq!(rx_a.recv().await.unwrap().body, "hi");
    }

    #[tokio::test]
    async fn test_delete_room_closes_all_member_queues() {
        // given:
        let (hub, _join) = spawn_hub(HubConfig::default());
        let r1 = room("r1");
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register(r1.clone(), SessionId::generate(), tx_a)
            .await
            .unwrap();
        hub.register(r1.clone(), SessionId::generate(), tx_b)
            .await
            .unwrap();

        // when:
        hub.delete_room(r1.clone()).await.unwrap();

        // then:
        assert_eq!(rx_a.recv().await, None);
        assert_eq!(rx_b.recv().await, None);
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop_and_rejects_later_requests() {
        // given:
        let (hub, join) = spawn_hub(HubConfig::default());

        // when:
        hub.shutdown().await.unwrap();
        join.await.unwrap();

        // then: the loop has exited and the handle reports it
        let result = hub.create_room(room("r1")).await;
        assert_eq!(result, Err(HubClosed));
    }
}
