use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use sensorhub_core::events::LiveEvent;

/// Unique live-connection identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl Default for ConnectionId {
    fn default() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

impl ConnectionId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One open live-update session: its id plus the sending half of its bounded outbound queue.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn try_deliver(&self, message: String) -> Result<(), TrySendError<String>> {
        self.tx.try_send(message)
    }
}

/// Live set of open connections, in registration order.
///
/// The lock is only held to mutate or snapshot the list, never while delivering.
pub struct BroadcastRegistry {
    handles: Mutex<Vec<ConnectionHandle>>,
    max_send_queue: usize,
}

impl BroadcastRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            max_send_queue: max_send_queue.max(1),
        }
    }

    /// Create a queue for a new connection and register it.
    ///
    /// The caller keeps only the id and the receiving half; once the handle is
    /// unregistered the receiver observes the channel closing.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let id = ConnectionId::new();
        self.register(ConnectionHandle::new(id.clone(), tx));
        (id, rx)
    }

    /// Append a handle. Returns false if a handle with the same id is already present.
    pub fn register(&self, handle: ConnectionHandle) -> bool {
        let mut handles = self.handles.lock();
        if handles.iter().any(|h| h.id == handle.id) {
            return false;
        }
        handles.push(handle);
        true
    }

    /// Remove a handle by id. Unknown ids are ignored.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let mut handles = self.handles.lock();
        let before = handles.len();
        handles.retain(|h| &h.id != id);
        handles.len() != before
    }

    /// Deliver an event to every registered connection.
    ///
    /// A connection whose queue is closed or full is unregistered; the rest still receive.
    pub fn broadcast(&self, event: &LiveEvent) {
        let text = match event.to_json() {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(event = event.event_type(), %error, "failed to serialize live event");
                return;
            }
        };
        self.broadcast_text(&text);
    }

    fn broadcast_text(&self, text: &str) {
        let snapshot: Vec<ConnectionHandle> = self.handles.lock().clone();
        let mut dropped = 0usize;

        for handle in &snapshot {
            match handle.try_deliver(text.to_string()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(conn_id = %handle.id, "send queue full, dropping connection");
                    let _ = self.unregister(&handle.id);
                    dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(conn_id = %handle.id, "connection gone, dropping");
                    let _ = self.unregister(&handle.id);
                    dropped += 1;
                }
            }
        }

        tracing::debug!(recipients = snapshot.len() - dropped, dropped, "broadcast delivered");
    }

    /// Number of registered connections.
    pub fn count(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.handles.lock().iter().any(|h| &h.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorhub_core::events::ReadingEvent;

    fn event(id: i64) -> LiveEvent {
        LiveEvent::NewReading(ReadingEvent {
            id,
            sensor_id: 1,
            value: 36.6,
            unit: "C".into(),
            is_present: true,
            timestamp: "2026-01-01T00:00:00.000000Z".into(),
        })
    }

    fn handle() -> (ConnectionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        (ConnectionHandle::new(ConnectionId::new(), tx), rx)
    }

    #[test]
    fn connection_id_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.0.starts_with("conn_"));
    }

    #[test]
    fn register_rejects_duplicates() {
        let registry = BroadcastRegistry::new(8);
        let (h, _rx) = handle();
        assert!(registry.register(h.clone()));
        assert!(!registry.register(h));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn unregister_twice_is_same_as_once() {
        let registry = BroadcastRegistry::new(8);
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();
        registry.register(a.clone());
        registry.register(b.clone());

        assert!(registry.unregister(a.id()));
        assert!(!registry.unregister(a.id()));
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(b.id()));
    }

    #[test]
    fn broadcast_reaches_everyone_in_order() {
        let registry = BroadcastRegistry::new(8);
        let (_id1, mut rx1) = registry.connect();
        let (_id2, mut rx2) = registry.connect();

        registry.broadcast(&event(1));
        registry.broadcast(&event(2));

        for rx in [&mut rx1, &mut rx2] {
            let first: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
            let second: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
            assert_eq!(first["type"], "new_reading");
            assert_eq!(first["id"], 1);
            assert_eq!(second["id"], 2);
        }
    }

    #[test]
    fn closed_connection_is_dropped_others_still_receive() {
        let registry = BroadcastRegistry::new(8);
        let (a, mut rx_a) = handle();
        let (b, rx_b) = handle();
        let (c, mut rx_c) = handle();
        registry.register(a);
        registry.register(b.clone());
        registry.register(c);
        drop(rx_b);

        registry.broadcast(&event(7));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
        assert_eq!(registry.count(), 2);
        assert!(!registry.contains(b.id()));
    }

    #[test]
    fn full_queue_counts_as_failed_send() {
        let registry = BroadcastRegistry::new(1);
        let (slow, _slow_rx) = registry.connect();
        let (fast, mut fast_rx) = registry.connect();

        registry.broadcast(&event(1));
        assert!(fast_rx.try_recv().is_ok());
        registry.broadcast(&event(2));

        assert!(!registry.contains(&slow));
        assert!(registry.contains(&fast));
        assert!(fast_rx.try_recv().is_ok());
    }

    #[test]
    fn unregistered_receiver_sees_channel_close() {
        let registry = BroadcastRegistry::new(4);
        let (id, mut rx) = registry.connect();
        registry.unregister(&id);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn broadcast_with_no_connections_is_noop() {
        let registry = BroadcastRegistry::new(4);
        registry.broadcast(&event(1));
        assert_eq!(registry.count(), 0);
    }
}
