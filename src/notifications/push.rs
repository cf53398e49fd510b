use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

// ============================================================================
// PushHub - registry of connected real-time clients
// ============================================================================
//
// Each client owns a bounded queue. A broadcast walks the registry under a
// read lock and uses `try_send`, so one slow client never holds up the
// others or the publisher:
// - full queue   -> event dropped for that client only
// - closed queue -> client deregistered after the walk
//
// ============================================================================

/// Frame shape written to the push transport.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushFrame {
    pub event: String,
    pub data: Value,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: u64,
    pub dropped: u64,
    pub disconnected: u64,
}

pub struct PushHub {
    capacity: usize,
    clients: RwLock<HashMap<Uuid, mpsc::Sender<Arc<PushFrame>>>>,
}

impl PushHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self) -> (Uuid, mpsc::Receiver<Arc<PushFrame>>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let client_id = Uuid::new_v4();
        self.clients.write().insert(client_id, tx);
        tracing::debug!(%client_id, "Push client registered");
        (client_id, rx)
    }

    pub fn unregister(&self, client_id: Uuid) -> bool {
        let removed = self.clients.write().remove(&client_id).is_some();
        if removed {
            tracing::debug!(%client_id, "Push client unregistered");
        }
        removed
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn broadcast(&self, event: &str, data: Value) -> BroadcastReport {
        let frame = Arc::new(PushFrame {
            event: event.to_string(),
            data,
        });

        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for (client_id, tx) in self.clients.read().iter() {
            match tx.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(%client_id, event, "Push queue full, dropping event for client");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => closed.push(*client_id),
            }
        }

        if !closed.is_empty() {
            let mut clients = self.clients.write();
            for client_id in &closed {
                clients.remove(client_id);
            }
            report.disconnected = closed.len() as u64;
        }

        report
    }

    /// Drops every client queue; sessions see their receiver close.
    pub fn close(&self) {
        self.clients.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let hub = PushHub::new(4);
        let (_, mut a) = hub.register();
        let (_, mut b) = hub.register();

        let report = hub.broadcast("orderUpdated", json!({"id": 5}));
        assert_eq!(report.delivered, 2);

        let frame_a = a.recv().await.unwrap();
        let frame_b = b.recv().await.unwrap();
        assert_eq!(frame_a, frame_b);
        assert_eq!(frame_a.event, "orderUpdated");
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_for_that_client() {
        let hub = PushHub::new(1);
        let (_, mut slow) = hub.register();
        let (_, mut fast) = hub.register();

        hub.broadcast("e", json!(1));
        fast.recv().await.unwrap();

        let report = hub.broadcast("e", json!(2));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(hub.client_count(), 2);

        assert_eq!(slow.recv().await.unwrap().data, json!(1));
        assert_eq!(fast.recv().await.unwrap().data, json!(2));
    }

    #[test]
    fn test_closed_queue_is_deregistered() {
        let hub = PushHub::new(4);
        let (_, gone) = hub.register();
        let (_, _kept) = hub.register();
        drop(gone);

        let report = hub.broadcast("e", json!(null));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.disconnected, 1);
        assert_eq!(hub.client_count(), 1);
    }

    #[test]
    fn test_frame_wire_shape() {
        let frame = PushFrame {
            event: "notificationCreated".to_string(),
            data: json!({"id": 1}),
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"event":"notificationCreated","data":{"id":1}}"#
        );
    }
}
