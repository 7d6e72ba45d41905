//! WebSocket hub: the live set of subscriber connections and broadcast
//! delivery.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::{info, warn};
use tokio::sync::mpsc;

use joist_protocol::ChangeEvent;

use super::types::ServerMessage;
use crate::relay::ChangeHandler;

/// A sender for messages to a specific connection.
///
/// Unbounded: enqueueing never blocks the relay pump, and a connection's
/// messages stay FIFO until its writer task dies. A send only fails once
/// the receiving side is gone, which is the signal to prune.
pub type WsSender = mpsc::UnboundedSender<ServerMessage>;

/// Hub managing all live subscriber connections.
///
/// The hub is the only owner of the live set: handlers and the relay reach
/// connections exclusively through `broadcast`/`send_to`.
pub struct WsHub {
    /// Connection ID -> sender for that connection's writer task.
    connections: DashMap<u64, WsSender>,

    /// Next connection ID. IDs are never reused within a process.
    next_id: AtomicU64,
}

impl WsHub {
    /// Create a new hub with no connections.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver its writer task drains, and the connection ID.
    pub fn accept(&self) -> (mpsc::UnboundedReceiver<ServerMessage>, u64) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(conn_id, tx);
        info!(
            "WebSocket connection {} registered (total: {})",
            conn_id,
            self.connections.len()
        );
        (rx, conn_id)
    }

    /// Remove a connection. Removing an unknown ID is a no-op.
    pub fn remove(&self, conn_id: u64) {
        if self.connections.remove(&conn_id).is_some() {
            info!(
                "WebSocket connection {} removed (total: {})",
                conn_id,
                self.connections.len()
            );
        }
    }

    /// Best-effort send to a single connection.
    ///
    /// A failed send means the connection's writer task is gone; the
    /// connection is pruned and the failure goes no further.
    pub fn send_to(&self, conn_id: u64, message: ServerMessage) {
        let Some(tx) = self.connections.get(&conn_id).map(|entry| entry.value().clone()) else {
            return;
        };
        if tx.send(message).is_err() {
            warn!("Failed to send to connection {}, pruning", conn_id);
            self.remove(conn_id);
        }
    }

    /// Broadcast a message to every live connection.
    ///
    /// Iterates a snapshot of the live set, so connections may be accepted
    /// or removed concurrently. A connection that fails mid-broadcast is
    /// pruned without aborting the remaining sends.
    pub fn broadcast(&self, message: ServerMessage) {
        let snapshot: Vec<(u64, WsSender)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut dead = Vec::new();
        for (conn_id, tx) in snapshot {
            if tx.send(message.clone()).is_err() {
                warn!("Error sending to connection {}", conn_id);
                dead.push(conn_id);
            }
        }

        for conn_id in dead {
            self.remove(conn_id);
        }
    }

    /// Drop every connection so their writer tasks wind down.
    ///
    /// Used at shutdown: once the queues close, each writer task sends a
    /// Close frame and exits, letting the server drain.
    pub fn close_all(&self) {
        let count = self.connections.len();
        self.connections.clear();
        if count > 0 {
            info!("Closed {} WebSocket connection(s)", count);
        }
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry handler that fans decoded change events out to the hub.
///
/// This is the bridge between the relay pump and the connection set.
/// Enqueueing is non-blocking, so the pump is free as soon as every live
/// connection has the event queued.
pub struct BroadcastForwarder {
    hub: std::sync::Arc<WsHub>,
}

impl BroadcastForwarder {
    pub fn new(hub: std::sync::Arc<WsHub>) -> Self {
        Self { hub }
    }
}

impl ChangeHandler for BroadcastForwarder {
    fn name(&self) -> &str {
        "ws-broadcast"
    }

    fn handle(&self, event: &ChangeEvent) -> anyhow::Result<()> {
        self.hub.broadcast(ServerMessage::change(event.message.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use joist_protocol::{ChangeAction, ChangeMessage, ChangeRecord};

    fn record(id: i64) -> ChangeMessage {
        ChangeMessage::Record(ChangeRecord {
            table: "items".to_string(),
            action: ChangeAction::Insert,
            id,
            data: json!({ "id": id }),
        })
    }

    fn record_id(message: &ServerMessage) -> i64 {
        match message {
            ServerMessage::Change(change) => change.record().unwrap().id,
            other => panic!("expected change message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_live_connection_receives_every_broadcast_in_order() {
        let hub = WsHub::new();
        let (mut rx_a, _) = hub.accept();
        let (mut rx_b, _) = hub.accept();

        for i in 0..3 {
            hub.broadcast(ServerMessage::change(record(i)));
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for expected in 0..3 {
                let message = rx.try_recv().expect("message queued");
                assert_eq!(record_id(&message), expected);
            }
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_dead_connection_is_pruned_without_disturbing_others() {
        let hub = WsHub::new();
        let (rx_dead, dead_id) = hub.accept();
        let (mut rx_live, _) = hub.accept();

        // Simulate a disconnect: the writer side is gone.
        drop(rx_dead);

        hub.broadcast(ServerMessage::change(record(1)));
        hub.broadcast(ServerMessage::change(record(2)));

        assert_eq!(hub.connection_count(), 1);
        assert_eq!(record_id(&rx_live.try_recv().unwrap()), 1);
        assert_eq!(record_id(&rx_live.try_recv().unwrap()), 2);

        // Already pruned; removing again is a no-op.
        hub.remove(dead_id);
    }

    #[tokio::test]
    async fn test_send_to_targets_one_connection() {
        let hub = WsHub::new();
        let (mut rx_a, id_a) = hub.accept();
        let (mut rx_b, _) = hub.accept();

        hub.send_to(id_a, ServerMessage::echo("ping"));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_dead_connection_prunes_it() {
        let hub = WsHub::new();
        let (rx, id) = hub.accept();
        drop(rx);

        hub.send_to(id, ServerMessage::echo("ping"));

        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let hub = WsHub::new();
        let (_rx, id) = hub.accept();

        hub.remove(id);
        hub.remove(id);
        hub.remove(9999);

        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let hub = WsHub::new();
        let (_rx_a, id_a) = hub.accept();
        let (_rx_b, id_b) = hub.accept();

        assert_ne!(id_a, id_b);
    }

    #[tokio::test]
    async fn test_forwarder_broadcasts_decoded_events() {
        let hub = Arc::new(WsHub::new());
        let (mut rx, _) = hub.accept();
        let forwarder = BroadcastForwarder::new(hub);

        let event = joist_protocol::ChangeEvent::new("item_changes", record(5));
        forwarder.handle(&event).unwrap();

        assert_eq!(record_id(&rx.try_recv().unwrap()), 5);
    }
}
