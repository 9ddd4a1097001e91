//! Database registry

use super::keyspace::Keyspace;
use bytes::Bytes;
use std::collections::HashMap;

/// All keyspaces of the server, indexed by database id
///
/// Keyspaces are created on first write access. The whole registry sits
/// behind the engine's single lock, so nothing in here synchronizes.
pub struct Store {
    databases: HashMap<usize, Keyspace>,

    /// Number of selectable databases (SELECT 0..max)
    max_databases: usize,
}

impl Store {
    /// Create an empty registry with `max_databases` selectable databases
    pub fn new(max_databases: usize) -> Self {
        Store {
            databases: HashMap::new(),
            max_databases,
        }
    }

    /// Number of selectable databases
    pub fn max_databases(&self) -> usize {
        self.max_databases
    }

    /// Get a database, creating it on first access
    pub fn db(&mut self, id: usize) -> &mut Keyspace {
        self.databases.entry(id).or_insert_with(|| Keyspace::new(id))
    }

    /// Version of a key, 0 if its database was never touched
    ///
    /// Pending expirations are applied first so a snapshot never holds a
    /// version the key is about to lose.
    pub fn current_version(&mut self, id: usize, key: &Bytes) -> u64 {
        match self.databases.get_mut(&id) {
            Some(db) => db.current_version(key),
            None => 0,
        }
    }

    /// Number of keys in a database, 0 if it was never touched
    pub fn db_len(&self, id: usize) -> usize {
        self.databases.get(&id).map_or(0, Keyspace::len)
    }

    /// Drop expired keys in every database, returns how many were removed
    pub fn sweep_expired(&mut self) -> usize {
        self.databases.values_mut().map(Keyspace::sweep_expired).sum()
    }
}
