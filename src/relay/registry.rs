//! # Session Registry
//!
//! Tracks which connections are live and how to reach each one.
//!
//! ## Delivery Model:
//! Every registered connection owns an unbounded channel whose receiving end
//! is drained by that connection's WebSocket actor. `emit` looks up exactly one
//! sender by connection ID, so an event can only ever reach the connection it
//! was addressed to. There is no broadcast operation.
//!
//! ## Thread Safety:
//! The map sits behind `Arc<RwLock<..>>`. Locks are taken for a lookup or an
//! insert and released immediately; no lock is ever held across an `.await`.

use crate::relay::events::ServerEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Opaque identifier assigned to a connection at upgrade time.
pub type ConnectionId = String;

/// Outbound half of a connection's event channel.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

struct ConnectionEntry {
    sender: EventSender,
    connected_at: DateTime<Utc>,
}

/// Live connections, keyed by connection ID.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, ConnectionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Re-registering an ID replaces its sender.
    pub fn register(&self, connection_id: &str, sender: EventSender) {
        let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        let previous = connections.insert(
            connection_id.to_string(),
            ConnectionEntry {
                sender,
                connected_at: Utc::now(),
            },
        );

        if previous.is_some() {
            warn!(connection_id, "Connection re-registered, previous sender replaced");
        }
    }

    /// Forget a connection. Returns whether it was registered.
    pub fn remove(&self, connection_id: &str) -> bool {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id)
            .is_some()
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(connection_id)
    }

    pub fn active_count(&self) -> usize {
        self.connections.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// When the longest-lived connection was registered.
    pub fn oldest_connected_at(&self) -> Option<DateTime<Utc>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|entry| entry.connected_at)
            .min()
    }

    /// Deliver an event to one connection.
    ///
    /// Returns `false` when the connection is gone (disconnected while its
    /// request was in flight); the event is dropped.
    pub fn emit(&self, connection_id: &str, event: ServerEvent) -> bool {
        let sender = {
            let connections = self.connections.read().unwrap_or_else(PoisonError::into_inner);
            connections.get(connection_id).map(|entry| entry.sender.clone())
        };

        let Some(sender) = sender else {
            debug!(connection_id, event = event.name(), "Dropping event for unknown connection");
            return false;
        };

        let name = event.name();
        match sender.send(event) {
            Ok(()) => true,
            Err(_) => {
                debug!(connection_id, event = name, "Connection channel closed, event dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_remove() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        registry.register("a", tx);
        assert!(registry.contains("a"));
        assert_eq!(registry.active_count(), 1);

        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_oldest_connection_survives_newer_ones() {
        let registry = SessionRegistry::new();
        assert!(registry.oldest_connected_at().is_none());

        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        registry.register("a", tx_a);
        let first = registry.oldest_connected_at().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        registry.register("b", tx_b);
        assert_eq!(registry.oldest_connected_at(), Some(first));

        registry.remove("a");
        assert!(registry.oldest_connected_at().unwrap() > first);
    }

    #[test]
    fn test_emit_reaches_only_target() {
        let registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register("a", tx_a);
        registry.register("b", tx_b);

        assert!(registry.emit("a", ServerEvent::error("for a")));

        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::error("for a"));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_emit_to_unknown_or_closed_connection() {
        let registry = SessionRegistry::new();
        assert!(!registry.emit("ghost", ServerEvent::error("x")));

        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("closed", tx);
        drop(rx);
        assert!(!registry.emit("closed", ServerEvent::error("x")));
    }
}
