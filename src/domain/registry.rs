//! Live connection bookkeeping
//!
//! One [`Connection`] per established link, held in connect order. The
//! registry owns each connection and its discovery cache; callers only
//! ever see ids and cloned snapshots.

use tracing::info;

use crate::domain::cache::DiscoveryCache;
use crate::domain::models::{BdAddr, ConnectionId};

/// Snapshot of a registry entry handed out to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub conn_id: ConnectionId,
    pub address: BdAddr,
}

/// An established GATT link and its discovery state.
#[derive(Debug)]
pub struct Connection {
    conn_id: ConnectionId,
    address: BdAddr,
    cache: DiscoveryCache,
}

impl Connection {
    pub fn new(conn_id: ConnectionId, address: BdAddr) -> Self {
        Self {
            conn_id,
            address,
            cache: DiscoveryCache::new(),
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn address(&self) -> &BdAddr {
        &self.address
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DiscoveryCache {
        &mut self.cache
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            conn_id: self.conn_id,
            address: self.address,
        }
    }
}

/// Ordered set of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the tail, preserving connect order.
    pub fn add(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Remove by id. Returns false when no such connection exists.
    pub fn remove(&mut self, conn_id: ConnectionId) -> bool {
        match self.connections.iter().position(|c| c.conn_id == conn_id) {
            Some(index) => {
                self.connections.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn find(&self, conn_id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.conn_id == conn_id)
    }

    pub fn find_mut(&mut self, conn_id: ConnectionId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.conn_id == conn_id)
    }

    pub fn find_by_address(&self, address: &BdAddr) -> Option<&Connection> {
        self.connections.iter().find(|c| c.address == *address)
    }

    pub fn head(&self) -> Option<&Connection> {
        self.connections.first()
    }

    pub fn tail(&self) -> Option<&Connection> {
        self.connections.last()
    }

    /// The connection that was established right after the given one.
    pub fn next_after(&self, conn_id: ConnectionId) -> Option<&Connection> {
        let index = self.connections.iter().position(|c| c.conn_id == conn_id)?;
        self.connections.get(index + 1)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn clear(&mut self) {
        self.connections.clear();
    }

    pub fn log_all(&self) {
        info!("{} connection(s)", self.connections.len());
        for connection in &self.connections {
            info!(
                conn_id = connection.conn_id,
                address = %connection.address,
                services = connection.cache.service_count(),
            );
        }
    }
}
