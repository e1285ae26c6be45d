use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use quad_types::events::GatewayEvent;

/// Presence/room registry: tracks every live connection, which member
/// identity it is bound to, and which faculty rooms it has joined.
/// Fan-out is a lookup plus iterate-and-push over per-connection
/// unbounded channels, so senders never block on slow clients.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<RwLock<Registry>>,
}

struct ConnectionEntry {
    member_id: Option<Uuid>,
    rooms: HashSet<String>,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<Uuid, ConnectionEntry>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Registry::default())),
        }
    }

    /// Register a new live connection. Returns its id and the receiver
    /// end the connection loop drains into the socket.
    pub fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .write()
            .expect("registry lock poisoned")
            .connections
            .insert(
                conn_id,
                ConnectionEntry {
                    member_id: None,
                    rooms: HashSet::new(),
                    tx,
                },
            );
        (conn_id, rx)
    }

    pub fn unregister(&self, conn_id: Uuid) {
        self.inner
            .write()
            .expect("registry lock poisoned")
            .connections
            .remove(&conn_id);
    }

    /// Bind a connection to a member identity (after Identify).
    pub fn bind_member(&self, conn_id: Uuid, member_id: Uuid) {
        let mut registry = self.inner.write().expect("registry lock poisoned");
        if let Some(entry) = registry.connections.get_mut(&conn_id) {
            entry.member_id = Some(member_id);
        }
    }

    pub fn join_room(&self, conn_id: Uuid, faculty: &str) {
        let mut registry = self.inner.write().expect("registry lock poisoned");
        if let Some(entry) = registry.connections.get_mut(&conn_id) {
            entry.rooms.insert(faculty.to_string());
        }
    }

    pub fn send_to_conn(&self, conn_id: Uuid, event: GatewayEvent) {
        let registry = self.inner.read().expect("registry lock poisoned");
        if let Some(entry) = registry.connections.get(&conn_id) {
            let _ = entry.tx.send(event);
        }
    }

    /// Fan a group event out to every connection joined to the room,
    /// except connections bound to a member in `excluded` (members who
    /// have blocked the sender).
    pub fn send_to_room(&self, faculty: &str, event: GatewayEvent, excluded: &HashSet<Uuid>) {
        let registry = self.inner.read().expect("registry lock poisoned");
        for entry in registry.connections.values() {
            if !entry.rooms.contains(faculty) {
                continue;
            }
            if let Some(member_id) = entry.member_id {
                if excluded.contains(&member_id) {
                    continue;
                }
            }
            let _ = entry.tx.send(event.clone());
        }
    }

    /// Deliver to every connection currently bound to a member. No-op
    /// when the member has no live connection.
    pub fn send_to_member(&self, member_id: Uuid, event: GatewayEvent) {
        let registry = self.inner.read().expect("registry lock poisoned");
        for entry in registry.connections.values() {
            if entry.member_id == Some(member_id) {
                let _ = entry.tx.send(event.clone());
            }
        }
    }

    /// Best-effort push to every live connection, regardless of room
    /// or identity. Used by the settings broadcaster.
    pub fn broadcast(&self, event: GatewayEvent) {
        let registry = self.inner.read().expect("registry lock poisoned");
        for entry in registry.connections.values() {
            let _ = entry.tx.send(event.clone());
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .connections
            .len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quad_types::models::Settings;

    fn settings_event() -> GatewayEvent {
        GatewayEvent::SettingsChanged {
            settings: Settings {
                rules: String::new(),
                daily_topic: String::new(),
                filter_words: vec![],
                group_retention_hours: 24,
                private_retention_hours: 48,
            },
        }
    }

    #[test]
    fn room_fanout_reaches_only_joined_connections() {
        let dispatcher = Dispatcher::new();
        let (joined, mut joined_rx) = dispatcher.register();
        let (_other, mut other_rx) = dispatcher.register();

        dispatcher.join_room(joined, "physics");
        dispatcher.send_to_room("physics", settings_event(), &HashSet::new());

        assert!(joined_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn room_fanout_skips_excluded_members() {
        let dispatcher = Dispatcher::new();
        let blocker = Uuid::new_v4();

        let (conn_a, mut rx_a) = dispatcher.register();
        let (conn_b, mut rx_b) = dispatcher.register();
        dispatcher.join_room(conn_a, "physics");
        dispatcher.join_room(conn_b, "physics");
        dispatcher.bind_member(conn_a, blocker);

        let excluded: HashSet<Uuid> = [blocker].into_iter().collect();
        dispatcher.send_to_room("physics", settings_event(), &excluded);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn member_delivery_hits_every_bound_connection() {
        let dispatcher = Dispatcher::new();
        let member = Uuid::new_v4();

        let (conn_a, mut rx_a) = dispatcher.register();
        let (conn_b, mut rx_b) = dispatcher.register();
        let (_conn_c, mut rx_c) = dispatcher.register();
        dispatcher.bind_member(conn_a, member);
        dispatcher.bind_member(conn_b, member);

        dispatcher.send_to_member(member, settings_event());

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let dispatcher = Dispatcher::new();
        let (_a, mut rx_a) = dispatcher.register();
        let (_b, mut rx_b) = dispatcher.register();

        dispatcher.broadcast(settings_event());

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn unregister_drops_the_connection() {
        let dispatcher = Dispatcher::new();
        let (conn, mut rx) = dispatcher.register();
        assert_eq!(dispatcher.connection_count(), 1);

        dispatcher.unregister(conn);
        assert_eq!(dispatcher.connection_count(), 0);

        dispatcher.broadcast(settings_event());
        assert!(rx.try_recv().is_err());
    }
}
