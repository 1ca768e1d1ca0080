//! Connection registry: which sockets are open and which display name each one speaks for.
//!
//! Sessions never hold a connection directly, only a name. Anything that wants
//! to reach a player goes through the registry, so a closed connection simply
//! stops being reachable instead of leaving a dangling handle behind.

use crate::messaging::ServerMessage;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::SystemTime;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace};

/// Type alias for connection identifiers.
///
/// Connection IDs are assigned by the server when a socket is accepted and
/// uniquely identify the connection throughout its lifecycle.
pub type ConnectionId = usize;

/// An open client connection.
#[derive(Debug)]
pub struct ClientConnection {
    /// Display name announced on this connection, if any
    pub username: Option<String>,

    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,

    outbox: UnboundedSender<ServerMessage>,
}

/// What changed when a name was bound to a connection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameBinding {
    /// Connection that owned the name until now
    pub superseded: Option<ConnectionId>,
    /// Name the binding connection owned until now and has given up
    pub released: Option<String>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ClientConnection>,
    by_name: HashMap<String, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly accepted connection with no name bound yet.
    pub fn register(&mut self, connection_id: ConnectionId, remote_addr: SocketAddr, outbox: UnboundedSender<ServerMessage>) {
        self.connections.insert(
            connection_id,
            ClientConnection {
                username: None,
                remote_addr,
                connected_at: SystemTime::now(),
                outbox,
            },
        );
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
    }

    /// Makes `connection_id` the live connection for `name`.
    ///
    /// The latest binding wins: a previous owner of the name keeps its socket
    /// but is no longer reachable under that name. If this connection owned a
    /// different name until now, that name goes offline.
    pub fn bind_name(&mut self, connection_id: ConnectionId, name: &str) -> NameBinding {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return NameBinding::default();
        };

        let mut released = None;
        if let Some(old_name) = connection.username.replace(name.to_string()) {
            if old_name != name && self.by_name.get(&old_name) == Some(&connection_id) {
                self.by_name.remove(&old_name);
                debug!("Connection {} gave up {} for {}", connection_id, old_name, name);
                released = Some(old_name);
            }
        }

        let superseded = match self.by_name.insert(name.to_string(), connection_id) {
            Some(prev) if prev != connection_id => {
                debug!("🔁 Name {} moved from connection {} to {}", name, prev, connection_id);
                Some(prev)
            }
            _ => None,
        };
        NameBinding { superseded, released }
    }

    /// Removes a closed connection.
    ///
    /// Returns the name it owned at the time of closing; `None` if it never
    /// announced one or if the name has since been re-bound elsewhere.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<String> {
        let connection = self.connections.remove(&connection_id)?;
        info!(
            "❌ Connection {} from {} disconnected",
            connection_id, connection.remote_addr
        );

        let name = connection.username?;
        if self.by_name.get(&name) == Some(&connection_id) {
            self.by_name.remove(&name);
            Some(name)
        } else {
            None
        }
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    /// Name currently owned by this connection.
    pub fn name_of(&self, connection_id: ConnectionId) -> Option<&str> {
        let name = self.connections.get(&connection_id)?.username.as_deref()?;
        self.owns_name(connection_id, name).then_some(name)
    }

    pub fn connection_for(&self, name: &str) -> Option<ConnectionId> {
        self.by_name.get(name).copied()
    }

    pub fn owns_name(&self, connection_id: ConnectionId, name: &str) -> bool {
        self.by_name.get(name) == Some(&connection_id)
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Queues a message on a connection; false if it is already gone.
    pub fn send(&self, connection_id: ConnectionId, message: ServerMessage) -> bool {
        let Some(connection) = self.connections.get(&connection_id) else {
            trace!("Dropping {} for closed connection {}", message.kind(), connection_id);
            return false;
        };
        trace!("📤 {} -> connection {}", message.kind(), connection_id);
        connection.outbox.send(message).is_ok()
    }

    /// Queues a message for whichever connection currently owns `name`.
    pub fn send_to_name(&self, name: &str, message: ServerMessage) -> bool {
        match self.connection_for(name) {
            Some(connection_id) => self.send(connection_id, message),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn online_count(&self) -> usize {
        self.by_name.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_latest_binding_wins() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(1, addr(), tx1);
        registry.register(2, addr(), tx2);

        assert_eq!(registry.bind_name(1, "alice"), NameBinding::default());
        assert_eq!(registry.bind_name(2, "alice").superseded, Some(1));
        assert_eq!(registry.connection_for("alice"), Some(2));
        assert_eq!(registry.name_of(1), None);

        assert!(registry.send_to_name("alice", ServerMessage::waiting()));
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), ServerMessage::waiting());

        // The stale connection closing does not take the name offline
        assert_eq!(registry.unregister(1), None);
        assert!(registry.is_online("alice"));
        assert_eq!(registry.unregister(2), Some("alice".to_string()));
        assert!(!registry.is_online("alice"));
    }

    #[test]
    fn test_rebinding_releases_old_name() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(1, addr(), tx);
        assert_eq!(registry.bind_name(1, "alice").released, None);
        assert_eq!(registry.bind_name(1, "alicia").released, Some("alice".to_string()));
        // Announcing the same name again releases nothing
        assert_eq!(registry.bind_name(1, "alicia"), NameBinding::default());
        assert!(!registry.is_online("alice"));
        assert_eq!(registry.name_of(1), Some("alicia"));
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn test_send_to_closed_connection() {
        let mut registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(1, addr(), tx);
        assert_eq!(registry.bind_name(9, "ghost"), NameBinding::default());
        assert!(!registry.is_online("ghost"));

        drop(rx);
        assert!(!registry.send(1, ServerMessage::waiting()));
        assert!(!registry.send(2, ServerMessage::waiting()));
        assert!(!registry.send_to_name("nobody", ServerMessage::waiting()));
    }
}
