//! Per-database keyspace
//!
//! A keyspace keeps a master map of key -> type tag, one typed store per
//! category, a version counter per key and the TTL deadlines. The version
//! counters are what WATCH snapshots and EXEC compares.

use super::value::KeyType;
use crate::error::CommandError;
use bytes::Bytes;
use siphasher::sip::SipHasher13;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::BuildHasherDefault;
use std::time::Duration;
use tokio::time::Instant;

/// Type alias for our hash maps with SipHasher
type StoreMap<V> = HashMap<Bytes, V, BuildHasherDefault<SipHasher13>>;

fn store_map<V>() -> StoreMap<V> {
    HashMap::with_hasher(BuildHasherDefault::<SipHasher13>::default())
}

/// List end to push to or pop from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Where LINSERT places the new element relative to the pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before,
    After,
}

/// One database worth of keys
pub struct Keyspace {
    /// Database index
    id: usize,

    /// Master map of keys with their type
    types: StoreMap<KeyType>,

    /// GET/SET keys
    strings: StoreMap<Bytes>,

    /// HSET/HGET keys
    hashes: StoreMap<HashMap<Bytes, Bytes>>,

    /// LPUSH/LPOP &c. keys
    lists: StoreMap<VecDeque<Bytes>>,

    /// SADD/SMEMBERS keys
    sets: StoreMap<HashSet<Bytes>>,

    /// Absolute expiration deadlines
    expires: StoreMap<Instant>,

    /// Per-key version counters, kept after deletion
    versions: StoreMap<u64>,
}

impl Keyspace {
    /// Create an empty keyspace for database `id`
    pub fn new(id: usize) -> Self {
        Keyspace {
            id,
            types: store_map(),
            strings: store_map(),
            hashes: store_map(),
            lists: store_map(),
            sets: store_map(),
            expires: store_map(),
            versions: store_map(),
        }
    }

    /// Database index of this keyspace
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of keys, including expired keys not yet removed
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the keyspace holds no keys
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Check if a key exists (and is not expired)
    pub fn exists(&mut self, key: &Bytes) -> bool {
        self.key_type(key).is_some()
    }

    /// Type of a key, None if absent or expired
    pub fn key_type(&mut self, key: &Bytes) -> Option<KeyType> {
        self.expire_if_due(key);
        self.types.get(key).copied()
    }

    /// Version counter of a key as stored, 0 if it was never written
    pub fn version(&self, key: &Bytes) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    /// Version counter after applying a pending expiration
    pub fn current_version(&mut self, key: &Bytes) -> u64 {
        self.expire_if_due(key);
        self.version(key)
    }

    /// Delete a key, returns true if the key existed
    ///
    /// Only an existing key gets its version bumped: deleting an absent key
    /// must not make a watcher believe it changed.
    pub fn delete(&mut self, key: &Bytes, drop_ttl: bool) -> bool {
        self.expire_if_due(key);
        self.remove(key, drop_ttl)
    }

    /// Remove all keys, bumping each one's version
    pub fn flush(&mut self) {
        let keys: Vec<Bytes> = self.types.keys().cloned().collect();
        for key in keys {
            self.remove(&key, true);
        }
        self.expires.clear();
    }

    // ---- strings ----

    /// GET
    pub fn get_string(&mut self, key: &Bytes) -> Result<Option<&Bytes>, CommandError> {
        if !self.check_type(key, KeyType::String)? {
            return Ok(None);
        }
        Ok(self.strings.get(key))
    }

    /// SET: replaces whatever the key held and clears its TTL
    pub fn set_string(&mut self, key: &Bytes, value: Bytes) {
        match self.key_type(key) {
            Some(KeyType::String) | None => {}
            Some(_) => self.unlink(key, true),
        }
        self.expires.remove(key);
        self.types.insert(key.clone(), KeyType::String);
        self.strings.insert(key.clone(), value);
        self.bump(key);
    }

    // ---- hashes ----

    /// HSET: returns the number of new fields
    pub fn hset(&mut self, key: &Bytes, pairs: &[(Bytes, Bytes)]) -> Result<usize, CommandError> {
        if !self.check_type(key, KeyType::Hash)? {
            self.types.insert(key.clone(), KeyType::Hash);
        }

        let hash = self.hashes.entry(key.clone()).or_default();
        let mut added = 0;
        for (field, value) in pairs {
            if hash.insert(field.clone(), value.clone()).is_none() {
                added += 1;
            }
        }

        self.bump(key);
        Ok(added)
    }

    /// HGET
    pub fn hget(&mut self, key: &Bytes, field: &Bytes) -> Result<Option<&Bytes>, CommandError> {
        if !self.check_type(key, KeyType::Hash)? {
            return Ok(None);
        }
        Ok(self.hashes.get(key).and_then(|hash| hash.get(field)))
    }

    /// HDEL: returns the number of removed fields, deletes the key once empty
    pub fn hdel(&mut self, key: &Bytes, fields: &[Bytes]) -> Result<usize, CommandError> {
        if !self.check_type(key, KeyType::Hash)? {
            return Ok(0);
        }

        let (removed, now_empty) = match self.hashes.get_mut(key) {
            Some(hash) => {
                let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count();
                (removed, hash.is_empty())
            }
            None => missing_entry(self.id, key, KeyType::Hash),
        };

        if now_empty {
            self.remove(key, true);
        } else if removed > 0 {
            self.bump(key);
        }
        Ok(removed)
    }

    // ---- sets ----

    /// SADD: returns the number of new members
    pub fn sadd(&mut self, key: &Bytes, members: &[Bytes]) -> Result<usize, CommandError> {
        if !self.check_type(key, KeyType::Set)? {
            self.types.insert(key.clone(), KeyType::Set);
        }

        let set = self.sets.entry(key.clone()).or_default();
        let added = members.iter().filter(|m| set.insert((*m).clone())).count();

        if added > 0 {
            self.bump(key);
        }
        Ok(added)
    }

    /// SMEMBERS, sorted for stable replies
    pub fn smembers(&mut self, key: &Bytes) -> Result<Vec<Bytes>, CommandError> {
        if !self.check_type(key, KeyType::Set)? {
            return Ok(Vec::new());
        }
        let mut members: Vec<Bytes> = self.sets.get(key).into_iter().flatten().cloned().collect();
        members.sort();
        Ok(members)
    }

    /// SISMEMBER
    pub fn sismember(&mut self, key: &Bytes, member: &Bytes) -> Result<bool, CommandError> {
        if !self.check_type(key, KeyType::Set)? {
            return Ok(false);
        }
        Ok(self.sets.get(key).map_or(false, |set| set.contains(member)))
    }

    // ---- lists ----

    /// Borrow a list, None if the key is absent
    pub fn list(&mut self, key: &Bytes) -> Result<Option<&VecDeque<Bytes>>, CommandError> {
        if !self.check_type(key, KeyType::List)? {
            return Ok(None);
        }
        Ok(self.lists.get(key))
    }

    /// LPUSH/RPUSH: pushing to an absent key creates it. Returns the new length.
    pub fn list_push(&mut self, key: &Bytes, side: Side, values: &[Bytes]) -> Result<usize, CommandError> {
        if !self.check_type(key, KeyType::List)? {
            self.types.insert(key.clone(), KeyType::List);
        }

        let list = self.lists.entry(key.clone()).or_default();
        for value in values {
            match side {
                Side::Left => list.push_front(value.clone()),
                Side::Right => list.push_back(value.clone()),
            }
        }
        let len = list.len();

        self.bump(key);
        Ok(len)
    }

    /// LPOP/RPOP: popping the last element deletes the key
    pub fn list_pop(&mut self, key: &Bytes, side: Side) -> Result<Option<Bytes>, CommandError> {
        if !self.check_type(key, KeyType::List)? {
            return Ok(None);
        }

        let (value, now_empty) = match self.lists.get_mut(key) {
            Some(list) => {
                let value = match side {
                    Side::Left => list.pop_front(),
                    Side::Right => list.pop_back(),
                };
                (value, list.is_empty())
            }
            None => missing_entry(self.id, key, KeyType::List),
        };

        // One bump either way: the deletion accounts for the last pop.
        if now_empty {
            self.remove(key, true);
        } else if value.is_some() {
            self.bump(key);
        }
        Ok(value)
    }

    /// LINSERT: 0 if the key is absent, -1 if the pivot is absent, else the new length
    pub fn list_insert(
        &mut self,
        key: &Bytes,
        position: Position,
        pivot: &Bytes,
        value: Bytes,
    ) -> Result<i64, CommandError> {
        if !self.check_type(key, KeyType::List)? {
            return Ok(0);
        }

        let list = match self.lists.get_mut(key) {
            Some(list) => list,
            None => missing_entry(self.id, key, KeyType::List),
        };
        let index = match list.iter().position(|el| el == pivot) {
            Some(i) => i,
            None => return Ok(-1),
        };

        match position {
            Position::Before => list.insert(index, value),
            Position::After => list.insert(index + 1, value),
        }
        let len = list.len() as i64;

        self.bump(key);
        Ok(len)
    }

    // ---- TTL ----

    /// Set a TTL on an existing key
    pub fn expire(&mut self, key: &Bytes, ttl: Duration) -> bool {
        if !self.exists(key) {
            return false;
        }
        match Instant::now().checked_add(ttl) {
            Some(at) => {
                self.expires.insert(key.clone(), at);
            }
            // Past any reachable instant: never expires
            None => {
                self.expires.remove(key);
            }
        }
        self.bump(key);
        true
    }

    /// Remaining TTL: None if the key is absent, Some(None) if it has no TTL
    pub fn ttl(&mut self, key: &Bytes) -> Option<Option<Duration>> {
        if !self.exists(key) {
            return None;
        }
        Some(
            self.expires
                .get(key)
                .map(|deadline| deadline.saturating_duration_since(Instant::now())),
        )
    }

    /// Drop the TTL of a key, true if it had one
    pub fn persist(&mut self, key: &Bytes) -> bool {
        if !self.exists(key) || self.expires.remove(key).is_none() {
            return false;
        }
        self.bump(key);
        true
    }

    /// Remove every key whose deadline has passed, returns how many were removed
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let due: Vec<Bytes> = self
            .expires
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in due {
            if self.remove(&key, true) {
                removed += 1;
            }
            self.expires.remove(&key);
        }
        removed
    }

    // ---- internals ----

    /// Ok(true) if present with the expected type, Ok(false) if absent
    fn check_type(&mut self, key: &Bytes, expected: KeyType) -> Result<bool, CommandError> {
        match self.key_type(key) {
            None => Ok(false),
            Some(kind) if kind == expected => Ok(true),
            Some(_) => Err(CommandError::WrongType),
        }
    }

    fn expire_if_due(&mut self, key: &Bytes) {
        let due = self
            .expires
            .get(key)
            .map_or(false, |deadline| *deadline <= Instant::now());
        if due {
            self.remove(key, true);
            self.expires.remove(key);
        }
    }

    /// Delete without the expiration check
    fn remove(&mut self, key: &Bytes, drop_ttl: bool) -> bool {
        if !self.types.contains_key(key) {
            return false;
        }
        self.unlink(key, drop_ttl);
        self.bump(key);
        true
    }

    /// Drop a key from the type map and its typed store, without a version bump
    fn unlink(&mut self, key: &Bytes, drop_ttl: bool) {
        let kind = match self.types.remove(key) {
            Some(kind) => kind,
            None => return,
        };
        if drop_ttl {
            self.expires.remove(key);
        }

        let found = match kind {
            KeyType::String => self.strings.remove(key).is_some(),
            KeyType::Hash => self.hashes.remove(key).is_some(),
            KeyType::List => self.lists.remove(key).is_some(),
            KeyType::Set => self.sets.remove(key).is_some(),
        };
        if !found {
            missing_entry(self.id, key, kind);
        }
    }

    fn bump(&mut self, key: &Bytes) {
        *self.versions.entry(key.clone()).or_insert(0) += 1;
    }
}

/// A tagged key without a typed entry means the keyspace is corrupt
fn missing_entry(db: usize, key: &Bytes, kind: KeyType) -> ! {
    panic!(
        "db {}: unknown key type, {:?} is tagged {} but has no entry in the {} store",
        db, key, kind, kind
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[test]
    fn test_delete_absent_key_keeps_version() {
        let mut db = Keyspace::new(0);
        assert!(!db.delete(&key("nope"), true));
        assert_eq!(db.version(&key("nope")), 0);
    }

    #[test]
    fn test_delete_present_key_bumps_version() {
        let mut db = Keyspace::new(0);
        db.set_string(&key("k"), key("v"));
        assert_eq!(db.version(&key("k")), 1);

        assert!(db.delete(&key("k"), true));
        assert_eq!(db.version(&key("k")), 2);
        assert!(!db.exists(&key("k")));

        // A second delete is a no-op
        assert!(!db.delete(&key("k"), true));
        assert_eq!(db.version(&key("k")), 2);
    }

    #[test]
    fn test_versions_never_decrease() {
        let mut db = Keyspace::new(0);
        let k = key("list");
        let mut seen = vec![db.version(&k)];

        db.list_push(&k, Side::Right, &[key("a"), key("b")]).unwrap();
        seen.push(db.version(&k));
        db.list_pop(&k, Side::Left).unwrap();
        seen.push(db.version(&k));
        db.list_insert(&k, Position::Before, &key("b"), key("x")).unwrap();
        seen.push(db.version(&k));
        db.list_pop(&k, Side::Right).unwrap();
        seen.push(db.version(&k));
        db.list_pop(&k, Side::Right).unwrap();
        seen.push(db.version(&k));
        // Popping an absent list is a no-op
        db.list_pop(&k, Side::Right).unwrap();
        seen.push(db.version(&k));
        db.set_string(&k, key("now a string"));
        seen.push(db.version(&k));
        db.delete(&k, true);
        seen.push(db.version(&k));

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 5, 6, 7]);
    }

    #[test]
    fn test_multi_value_push_bumps_once() {
        let mut db = Keyspace::new(0);
        let len = db.list_push(&key("l"), Side::Left, &[key("a"), key("b"), key("c")]).unwrap();
        assert_eq!(len, 3);
        assert_eq!(db.key_type(&key("l")), Some(KeyType::List));
        assert_eq!(db.version(&key("l")), 1);
        assert_eq!(db.list(&key("l")).unwrap().unwrap().front(), Some(&key("c")));
    }

    #[test]
    fn test_pop_last_element_deletes_with_one_bump() {
        let mut db = Keyspace::new(0);
        db.list_push(&key("l"), Side::Right, &[key("a")]).unwrap();
        assert_eq!(db.version(&key("l")), 1);

        assert_eq!(db.list_pop(&key("l"), Side::Left).unwrap(), Some(key("a")));
        assert!(!db.exists(&key("l")));
        assert_eq!(db.version(&key("l")), 2);
    }

    #[test]
    fn test_linsert_missing_pivot_changes_nothing() {
        let mut db = Keyspace::new(0);
        db.list_push(&key("l"), Side::Right, &[key("a"), key("b")]).unwrap();
        let before = db.version(&key("l"));

        let res = db.list_insert(&key("l"), Position::Before, &key("zz"), key("x")).unwrap();
        assert_eq!(res, -1);
        assert_eq!(db.version(&key("l")), before);
        let items: Vec<_> = db.list(&key("l")).unwrap().unwrap().iter().cloned().collect();
        assert_eq!(items, vec![key("a"), key("b")]);
    }

    #[test]
    fn test_linsert_after_last() {
        let mut db = Keyspace::new(0);
        db.list_push(&key("l"), Side::Right, &[key("a"), key("b")]).unwrap();
        assert_eq!(db.list_insert(&key("l"), Position::After, &key("b"), key("c")).unwrap(), 3);
        assert_eq!(db.list(&key("l")).unwrap().unwrap().back(), Some(&key("c")));
        assert_eq!(db.list_insert(&key("nope"), Position::After, &key("b"), key("c")).unwrap(), 0);
    }

    #[test]
    fn test_wrong_type() {
        let mut db = Keyspace::new(0);
        db.set_string(&key("s"), key("v"));
        assert_eq!(db.list_push(&key("s"), Side::Left, &[key("a")]), Err(CommandError::WrongType));
        assert_eq!(db.hget(&key("s"), &key("f")), Err(CommandError::WrongType));
        assert_eq!(db.sadd(&key("s"), &[key("m")]), Err(CommandError::WrongType));
        // Failed mutations leave the version alone
        assert_eq!(db.version(&key("s")), 1);
    }

    #[test]
    fn test_set_replaces_other_type() {
        let mut db = Keyspace::new(0);
        db.sadd(&key("k"), &[key("m")]).unwrap();
        db.set_string(&key("k"), key("v"));
        assert_eq!(db.key_type(&key("k")), Some(KeyType::String));
        assert_eq!(db.smembers(&key("k")), Err(CommandError::WrongType));
        assert_eq!(db.version(&key("k")), 2);
    }

    #[test]
    fn test_hash_fields() {
        let mut db = Keyspace::new(0);
        let pairs = vec![(key("f1"), key("v1")), (key("f2"), key("v2"))];
        assert_eq!(db.hset(&key("h"), &pairs).unwrap(), 2);
        assert_eq!(db.hget(&key("h"), &key("f1")).unwrap(), Some(&key("v1")));

        assert_eq!(db.hdel(&key("h"), &[key("f1"), key("zz")]).unwrap(), 1);
        assert_eq!(db.hdel(&key("h"), &[key("f2")]).unwrap(), 1);
        assert!(!db.exists(&key("h")));
    }

    #[test]
    fn test_flush_bumps_every_key() {
        let mut db = Keyspace::new(3);
        db.set_string(&key("a"), key("1"));
        db.sadd(&key("b"), &[key("m")]).unwrap();
        db.flush();

        assert!(db.is_empty());
        assert_eq!(db.version(&key("a")), 2);
        assert_eq!(db.version(&key("b")), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_expiration_bumps_version() {
        let mut db = Keyspace::new(0);
        db.set_string(&key("k"), key("v"));
        assert!(db.expire(&key("k"), Duration::from_secs(10)));
        assert_eq!(db.version(&key("k")), 2);
        assert_eq!(db.ttl(&key("k")), Some(Some(Duration::from_secs(10))));

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(db.current_version(&key("k")), 3);
        assert!(!db.exists(&key("k")));
        assert_eq!(db.ttl(&key("k")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_and_persist() {
        let mut db = Keyspace::new(0);
        db.set_string(&key("a"), key("1"));
        db.set_string(&key("b"), key("2"));
        db.expire(&key("a"), Duration::from_secs(1));
        db.expire(&key("b"), Duration::from_secs(1));
        assert!(db.persist(&key("b")));
        assert!(!db.persist(&key("b")));

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(db.sweep_expired(), 1);
        assert_eq!(db.len(), 1);
        assert_eq!(db.ttl(&key("b")), Some(None));
    }

    #[test]
    fn test_unreachable_ttl_never_expires() {
        let mut db = Keyspace::new(0);
        db.set_string(&key("k"), key("v"));
        db.expire(&key("k"), Duration::from_secs(5));

        assert!(db.expire(&key("k"), Duration::MAX));
        assert_eq!(db.ttl(&key("k")), Some(None));
        assert_eq!(db.version(&key("k")), 3);
    }
}
