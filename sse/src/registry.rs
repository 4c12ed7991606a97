use crate::connection::StreamConnection;
use dashmap::DashMap;
use log::*;

/// Connections are keyed by their resolved URL.
pub type ConnectionKey = String;

/// Registry holding at most one shared `StreamConnection` per URL.
///
/// Entries are never dropped automatically when subscribers go away; callers remove
/// them explicitly, or call `clear()` at a session boundary (logout, account switch).
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionKey, StreamConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Returns the connection for `key`, creating it with `factory` if absent.
    ///
    /// `factory` runs at most once per key and must not call back into the registry.
    pub fn get_or_create<F>(&self, key: &str, factory: F) -> StreamConnection
    where
        F: FnOnce() -> StreamConnection,
    {
        if let Some(existing) = self.connections.get(key) {
            return existing.value().clone();
        }

        self.connections
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!("Creating SSE connection for {}", key);
                factory()
            })
            .value()
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<StreamConnection> {
        self.connections.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.connections.contains_key(key)
    }

    /// Disconnects and forgets the connection for `key`. No-op if absent.
    pub fn remove(&self, key: &str) {
        if let Some((_, connection)) = self.connections.remove(key) {
            debug!("Removing SSE connection for {}", key);
            connection.close();
        }
    }

    /// Disconnects and removes every connection.
    pub fn clear(&self) {
        let keys = self.keys();
        info!("Clearing {} SSE connection(s)", keys.len());

        for key in keys {
            self.remove(&key);
        }
    }

    pub fn keys(&self) -> Vec<ConnectionKey> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
