//! Fan-out of push messages to connected UI clients.
//!
//! Each client owns the receiving end of a bounded `mpsc` channel; its
//! WebSocket task drains the channel onto the socket.  Pushing uses
//! `try_send`, so a client that stops reading only fills its own queue:
//! further messages to that client are dropped while every other client keeps
//! receiving.  A client whose task has ended is removed on the next push.

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::PushSink;
use crate::domain::PushMessage;

pub struct ClientBroadcaster {
    clients: DashMap<Uuid, mpsc::Sender<PushMessage>>,
    buffer: usize,
}

impl ClientBroadcaster {
    /// `buffer` is the per-client queue depth (at least 1).
    pub fn new(buffer: usize) -> Self {
        Self {
            clients: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Adds a client and returns its id and message queue.
    pub fn register(&self) -> (Uuid, mpsc::Receiver<PushMessage>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let client_id = Uuid::new_v4();
        self.clients.insert(client_id, tx);
        debug!(%client_id, "UI client registered");
        (client_id, rx)
    }

    /// Removes a client.  Returns `false` if it was already gone.
    pub fn unregister(&self, client_id: Uuid) -> bool {
        let removed = self.clients.remove(&client_id).is_some();
        if removed {
            debug!(%client_id, "UI client unregistered");
        }
        removed
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl PushSink for ClientBroadcaster {
    fn push(&self, message: PushMessage) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.clients.iter() {
            match entry.value().try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(client_id = %entry.key(), method = message.method(), "UI client queue full; message dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal happens after iteration; DashMap shards are still read-locked inside the loop.
        for client_id in closed {
            self.unregister(client_id);
        }
        delivered
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceIdPayload;

    fn hand_raised() -> PushMessage {
        PushMessage::HandRaised(DeviceIdPayload {
            device_id: Uuid::new_v4(),
        })
    }

    #[tokio::test]
    async fn test_push_reaches_every_client() {
        // Arrange
        let broadcaster = ClientBroadcaster::new(8);
        let (_, mut a) = broadcaster.register();
        let (_, mut b) = broadcaster.register();
        let msg = hand_raised();

        // Act
        let delivered = broadcaster.push(msg.clone());

        // Assert
        assert_eq!(delivered, 2);
        assert_eq!(a.recv().await, Some(msg.clone()));
        assert_eq!(b.recv().await, Some(msg));
    }

    #[tokio::test]
    async fn test_full_client_does_not_block_others() {
        // Arrange
        let broadcaster = ClientBroadcaster::new(1);
        let (_, _stalled) = broadcaster.register();
        let (_, mut healthy) = broadcaster.register();
        broadcaster.push(hand_raised());
        healthy.recv().await.unwrap();

        // Act
        let delivered = broadcaster.push(hand_raised());

        // Assert
        assert_eq!(delivered, 1);
        assert!(healthy.recv().await.is_some());
        assert_eq!(broadcaster.client_count(), 2);
    }

    #[test]
    fn test_closed_client_is_removed_on_push() {
        let broadcaster = ClientBroadcaster::new(4);
        let (_, gone) = broadcaster.register();
        drop(gone);

        let delivered = broadcaster.push(hand_raised());

        assert_eq!(delivered, 0);
        assert_eq!(broadcaster.client_count(), 0);
    }

    #[test]
    fn test_unregister_reports_whether_client_existed() {
        let broadcaster = ClientBroadcaster::new(4);
        let (id, _rx) = broadcaster.register();

        assert!(broadcaster.unregister(id));
        assert!(!broadcaster.unregister(id));
    }

    #[test]
    fn test_zero_buffer_is_raised_to_one() {
        let broadcaster = ClientBroadcaster::new(0);
        let (_, _rx) = broadcaster.register();
        assert_eq!(broadcaster.push(hand_raised()), 1);
    }
}
