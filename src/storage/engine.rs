//! Storage Engine
//!
//! The single-threaded keyspace. One progressive hashtable maps key hashes
//! to entries in a slab arena; each entry holds either a string value or a
//! [`SortedSet`], plus the position of its TTL in the expiration heap (if it
//! has one).
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      StorageEngine                        │
//! │                                                           │
//! │  index: HashTable ──────> entries: Slab<Entry>            │
//! │  (hash -> entry key)        │  key, value, heap_pos       │
//! │                             │        ▲                    │
//! │  ttl: TtlHeap <─────────────┘        │                    │
//! │  (deadline, entry key) ── back-refs ─┘                    │
//! │                                                           │
//! │  pool: ThreadPool  <── large sorted-set teardown          │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Time never comes from a clock in here: every time-dependent operation
//! takes `now_ms`, the caller's monotonic millisecond timestamp. The event
//! loop passes real time; tests pass whatever they like.
//!
//! Expired keys are reclaimed only by [`StorageEngine::expire_sweep`], which
//! the event loop runs every tick with a fixed budget. Reads do not check
//! deadlines, so a key can be observed for a short moment past its TTL; the
//! trade is strictly bounded sweep work per tick.

use bytes::Bytes;
use slab::Slab;
use thiserror::Error;
use tracing::debug;

use super::hashmap::{hash_bytes, HashTable};
use super::heap::{TtlHeap, TtlItem};
use super::zset::SortedSet;
use crate::pool::{ThreadPool, DEFAULT_WORKERS};

/// Sorted sets larger than this are torn down on a worker thread instead of
/// inline, so a big delete cannot stall the event loop.
pub const LARGE_CONTAINER_SIZE: usize = 1000;

/// A value-kind mismatch between a command and the stored entry. The
/// messages are exactly what goes over the wire in the error response.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TypeError {
    #[error("not a string value")]
    NotAString,
    #[error("a non-string value exists")]
    OccupiedByNonString,
    #[error("expect zset")]
    NotASortedSet,
}

/// What a key maps to.
#[derive(Debug)]
pub enum StoredValue {
    Str(Bytes),
    Set(SortedSet),
}

/// One keyspace entry.
#[derive(Debug)]
pub struct Entry {
    key: Bytes,
    hash: u64,
    value: StoredValue,
    /// Position of this entry's TTL in the heap, if it has one.
    heap_pos: Option<usize>,
}

#[derive(Debug)]
pub struct StorageEngine {
    entries: Slab<Entry>,
    index: HashTable<usize>,
    ttl: TtlHeap,
    pool: ThreadPool,
}

impl StorageEngine {
    pub fn new() -> Self {
        StorageEngine {
            entries: Slab::new(),
            index: HashTable::new(),
            ttl: TtlHeap::new(),
            pool: ThreadPool::new(DEFAULT_WORKERS),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Reads a string value. `Ok(None)` for a missing key; an error if the
    /// key holds a sorted set.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>, TypeError> {
        let Some(id) = self.lookup(key) else {
            return Ok(None);
        };
        match &self.entries[id].value {
            StoredValue::Str(val) => Ok(Some(val.clone())),
            StoredValue::Set(_) => Err(TypeError::NotAString),
        }
    }

    /// Writes a string value, creating the key if needed. Refuses to
    /// overwrite a sorted set.
    pub fn set(&mut self, key: &[u8], value: Bytes) -> Result<(), TypeError> {
        if let Some(id) = self.lookup(key) {
            match &mut self.entries[id].value {
                StoredValue::Str(stored) => {
                    *stored = value;
                    Ok(())
                }
                StoredValue::Set(_) => Err(TypeError::OccupiedByNonString),
            }
        } else {
            self.insert_entry(key, StoredValue::Str(value));
            Ok(())
        }
    }

    /// Deletes a key of either kind. Returns `false` if it was not present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let Some(id) = self.lookup(key) else {
            return false;
        };
        let hash = self.entries[id].hash;
        self.index.remove(hash, |&cand| cand == id);
        self.drop_entry(id);
        true
    }

    /// Sets, updates or clears a key's TTL. A negative `ttl_ms` clears it.
    /// Returns `false` if the key does not exist.
    pub fn set_ttl(&mut self, key: &[u8], ttl_ms: i64, now_ms: u64) -> bool {
        let Some(id) = self.lookup(key) else {
            return false;
        };
        if ttl_ms < 0 {
            self.unregister_ttl(id);
        } else {
            let item = TtlItem {
                deadline_ms: now_ms + ttl_ms as u64,
                entry: id,
            };
            let pos = self.entries[id].heap_pos;
            let entries = &mut self.entries;
            self.ttl.upsert(pos, item, |entry, new_pos| {
                entries[entry].heap_pos = Some(new_pos)
            });
        }
        true
    }

    /// Remaining TTL in milliseconds: -2 for a missing key, -1 for a key
    /// without a TTL, otherwise the time left (clamped at 0).
    pub fn ttl_remaining(&mut self, key: &[u8], now_ms: u64) -> i64 {
        let Some(id) = self.lookup(key) else {
            return -2;
        };
        match self.entries[id].heap_pos {
            None => -1,
            Some(pos) => self.ttl.deadline_at(pos).saturating_sub(now_ms) as i64,
        }
    }

    /// Visits every key in unspecified order.
    pub fn for_each_key(&self, mut f: impl FnMut(&Bytes)) {
        let entries = &self.entries;
        self.index.for_each(|&id| f(&entries[id].key));
    }

    /// Adds a member to a sorted set, creating the key as an empty set if it
    /// is missing. Returns `true` when the member is new, `false` on a score
    /// update.
    pub fn zadd(&mut self, key: &[u8], name: &[u8], score: f64) -> Result<bool, TypeError> {
        let id = match self.lookup(key) {
            Some(id) => id,
            None => self.insert_entry(key, StoredValue::Set(SortedSet::new())),
        };
        match &mut self.entries[id].value {
            StoredValue::Set(set) => Ok(set.insert(name, score)),
            StoredValue::Str(_) => Err(TypeError::NotASortedSet),
        }
    }

    /// Removes a member from a sorted set. A missing key is an empty set.
    pub fn zrem(&mut self, key: &[u8], name: &[u8]) -> Result<bool, TypeError> {
        match self.sorted_set_mut(key)? {
            Some(set) => Ok(set.remove(name)),
            None => Ok(false),
        }
    }

    /// Looks up a member's score. A missing key is an empty set.
    pub fn zscore(&mut self, key: &[u8], name: &[u8]) -> Result<Option<f64>, TypeError> {
        match self.sorted_set_mut(key)? {
            Some(set) => Ok(set.score(name)),
            None => Ok(None),
        }
    }

    /// Range query: seeks the first member at or after `(score, name)`,
    /// advances `offset` ranks, then emits `(name, score)` pairs while the
    /// flattened output stays under `limit` elements (each pair counts as
    /// two, matching the wire encoding the caller produces).
    pub fn zquery(
        &mut self,
        key: &[u8],
        score: f64,
        name: &[u8],
        offset: i64,
        limit: i64,
    ) -> Result<Vec<(Bytes, f64)>, TypeError> {
        let Some(set) = self.sorted_set_mut(key)? else {
            return Ok(Vec::new());
        };
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let Some(start) = set.seek_at_or_after(score, name) else {
            return Ok(out);
        };
        let Some(mut cur) = set.advance_by_rank(start, offset) else {
            return Ok(out);
        };
        let mut emitted: i64 = 0;
        while emitted < limit {
            let (member, member_score) = set.member(cur);
            out.push((member.clone(), member_score));
            emitted += 2;
            match set.advance_by_rank(cur, 1) {
                Some(next) => cur = next,
                None => break,
            }
        }
        Ok(out)
    }

    /// Reclaims keys whose deadline has passed, at most `budget` of them.
    /// Returns how many were reclaimed.
    pub fn expire_sweep(&mut self, now_ms: u64, budget: usize) -> usize {
        let mut expired = 0;
        while expired < budget {
            let Some(item) = self.ttl.peek() else {
                break;
            };
            if item.deadline_ms >= now_ms {
                break;
            }
            let id = item.entry;
            let hash = self.entries[id].hash;
            self.index.remove(hash, |&cand| cand == id);
            self.drop_entry(id);
            expired += 1;
        }
        if expired > 0 {
            debug!(expired, "swept expired keys");
        }
        expired
    }

    /// The earliest TTL deadline, for the event loop's poll timeout.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.ttl.peek().map(|item| item.deadline_ms)
    }

    fn lookup(&mut self, key: &[u8]) -> Option<usize> {
        let hash = hash_bytes(key);
        let entries = &self.entries;
        self.index
            .get(hash, |&id| entries[id].key[..] == *key)
            .copied()
    }

    fn insert_entry(&mut self, key: &[u8], value: StoredValue) -> usize {
        let hash = hash_bytes(key);
        let id = self.entries.insert(Entry {
            key: Bytes::copy_from_slice(key),
            hash,
            value,
            heap_pos: None,
        });
        self.index.insert(hash, id);
        id
    }

    /// Mutable access to a key's sorted set. `Ok(None)` when the key is
    /// missing (a missing key reads as an empty set); an error when the key
    /// holds a string.
    fn sorted_set_mut(&mut self, key: &[u8]) -> Result<Option<&mut SortedSet>, TypeError> {
        let Some(id) = self.lookup(key) else {
            return Ok(None);
        };
        match &mut self.entries[id].value {
            StoredValue::Set(set) => Ok(Some(set)),
            StoredValue::Str(_) => Err(TypeError::NotASortedSet),
        }
    }

    fn unregister_ttl(&mut self, id: usize) {
        if let Some(pos) = self.entries[id].heap_pos.take() {
            let entries = &mut self.entries;
            self.ttl.remove(pos, |entry, new_pos| {
                entries[entry].heap_pos = Some(new_pos)
            });
        }
    }

    /// Frees an entry already unlinked from the index. The TTL is always
    /// unregistered first, while the arena slot is still valid for the
    /// heap's back-reference fixups; only then is the entry moved out and
    /// either dropped inline or, for large sorted sets, handed to the pool.
    fn drop_entry(&mut self, id: usize) {
        self.unregister_ttl(id);
        let entry = self.entries.remove(id);
        let large =
            matches!(&entry.value, StoredValue::Set(set) if set.len() > LARGE_CONTAINER_SIZE);
        if large {
            debug!(key = ?entry.key, "offloading sorted-set teardown");
            self.pool.execute(move || drop(entry));
        }
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}
