//! Progressive Two-Generation Chained Hashtable
//!
//! A hashtable that never pauses to rehash. When the load factor passes the
//! trigger, the full table becomes the `older` generation and an empty table
//! of twice the slot count becomes `newer`. Every subsequent operation moves
//! a bounded batch of nodes from `older` to `newer`, so the cost of growth is
//! spread across many operations instead of spiking on one.
//!
//! ## Layout
//!
//! ```text
//!  newer.slots          older.slots
//!  ┌───┐                ┌───┐
//!  │ ──┼─> node ─> node │ ──┼─> node          migrate_pos ──┐
//!  ├───┤                ├───┤                               ▼
//!  │   │                │   │ <── slots below are already drained
//!  ├───┤                ├───┤
//!  │ ──┼─> node         │ ──┼─> node ─> node ─> node
//!  └───┘                └───┘
//! ```
//!
//! Nodes live in a [`Slab`] arena and chains are singly linked by arena key,
//! with [`NIL`] as the terminator. Moving a node between generations is a
//! relink, never a reallocation, so references held elsewhere (by arena key)
//! stay valid across migration.
//!
//! Lookups probe `newer` first, then `older`. Callers supply the hash and an
//! equality predicate over the stored item, which keeps this table agnostic
//! of what it stores (the storage engine keys it by entry, the sorted set by
//! member name).

use slab::Slab;

/// Chain terminator and absent-table sentinel.
pub(crate) const NIL: usize = usize::MAX;

/// Nodes migrated from the older generation per table operation.
const MIGRATION_BATCH: usize = 128;

/// Average chain length that triggers growth.
const MAX_LOAD_FACTOR: usize = 8;

/// Slot count of the first allocated table. Always a power of two.
const INITIAL_SLOTS: usize = 4;

/// Hashes a byte string with the 32-bit FNV-style accumulator used for all
/// key and member-name hashing, widened to u64.
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u32 = 0x811C_9DC5;
    for &b in data {
        h = h.wrapping_add(u32::from(b)).wrapping_mul(0x0100_0193);
    }
    u64::from(h)
}

#[derive(Debug)]
struct Node<T> {
    hash: u64,
    next: usize,
    item: T,
}

/// One generation: a power-of-two slot array of chain heads.
#[derive(Debug, Default)]
struct Table {
    slots: Vec<usize>,
    len: usize,
}

impl Table {
    fn with_slots(n: usize) -> Self {
        debug_assert!(n.is_power_of_two());
        Table {
            slots: vec![NIL; n],
            len: 0,
        }
    }

    fn is_allocated(&self) -> bool {
        !self.slots.is_empty()
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }
}

#[derive(Debug, Clone, Copy)]
enum Gen {
    Newer,
    Older,
}

/// Progressive chained hashtable over items of type `T`.
///
/// The table stores `(hash, T)` pairs; callers pass the hash explicitly and
/// identify items with an equality predicate. Lookup methods take `&mut self`
/// because every operation, reads included, advances pending migration.
#[derive(Debug, Default)]
pub struct HashTable<T> {
    nodes: Slab<Node<T>>,
    newer: Table,
    older: Table,
    /// Slots of `older` below this index are fully drained.
    migrate_pos: usize,
}

impl<T> HashTable<T> {
    pub fn new() -> Self {
        HashTable {
            nodes: Slab::new(),
            newer: Table::default(),
            older: Table::default(),
            migrate_pos: 0,
        }
    }

    /// Total number of stored items across both generations.
    pub fn len(&self) -> usize {
        self.newer.len + self.older.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts an item, growing the table when the load factor passes the
    /// trigger. Duplicates are the caller's concern; this always inserts.
    pub fn insert(&mut self, hash: u64, item: T) {
        if !self.newer.is_allocated() {
            self.newer = Table::with_slots(INITIAL_SLOTS);
        }
        let node = self.nodes.insert(Node {
            hash,
            next: NIL,
            item,
        });
        self.link_into_newer(node);
        if !self.older.is_allocated() && self.newer.len >= MAX_LOAD_FACTOR * self.newer.slots.len()
        {
            self.trigger_migration();
        }
        self.help_migrate();
    }

    pub fn get(&mut self, hash: u64, mut eq: impl FnMut(&T) -> bool) -> Option<&T> {
        self.help_migrate();
        let found = self
            .find(Gen::Newer, hash, &mut eq)
            .or_else(|| self.find(Gen::Older, hash, &mut eq));
        found.map(|(_, _, node)| &self.nodes[node].item)
    }

    pub fn get_mut(&mut self, hash: u64, mut eq: impl FnMut(&T) -> bool) -> Option<&mut T> {
        self.help_migrate();
        let found = self
            .find(Gen::Newer, hash, &mut eq)
            .or_else(|| self.find(Gen::Older, hash, &mut eq));
        found.map(|(_, _, node)| &mut self.nodes[node].item)
    }

    /// Removes and returns the first item matching `hash` and `eq`.
    pub fn remove(&mut self, hash: u64, mut eq: impl FnMut(&T) -> bool) -> Option<T> {
        self.help_migrate();
        for gen in [Gen::Newer, Gen::Older] {
            if let Some((slot, prev, node)) = self.find(gen, hash, &mut eq) {
                self.unlink(gen, slot, prev, node);
                return Some(self.nodes.remove(node).item);
            }
        }
        None
    }

    /// Visits every stored item in unspecified order.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        for table in [&self.newer, &self.older] {
            for &head in &table.slots {
                let mut cur = head;
                while cur != NIL {
                    let node = &self.nodes[cur];
                    f(&node.item);
                    cur = node.next;
                }
            }
        }
    }

    fn table(&self, gen: Gen) -> &Table {
        match gen {
            Gen::Newer => &self.newer,
            Gen::Older => &self.older,
        }
    }

    /// Walks one chain, returning `(slot, predecessor, node)` on a match.
    /// The predecessor is [`NIL`] when the match is the chain head.
    fn find(
        &self,
        gen: Gen,
        hash: u64,
        eq: &mut impl FnMut(&T) -> bool,
    ) -> Option<(usize, usize, usize)> {
        let table = self.table(gen);
        if !table.is_allocated() {
            return None;
        }
        let slot = (hash as usize) & table.mask();
        let mut prev = NIL;
        let mut cur = table.slots[slot];
        while cur != NIL {
            let node = &self.nodes[cur];
            if node.hash == hash && eq(&node.item) {
                return Some((slot, prev, cur));
            }
            prev = cur;
            cur = node.next;
        }
        None
    }

    /// Unlinks a node from its chain without freeing it.
    fn unlink(&mut self, gen: Gen, slot: usize, prev: usize, node: usize) {
        let next = self.nodes[node].next;
        if prev != NIL {
            self.nodes[prev].next = next;
        }
        let table = match gen {
            Gen::Newer => &mut self.newer,
            Gen::Older => &mut self.older,
        };
        if prev == NIL {
            table.slots[slot] = next;
        }
        table.len -= 1;
    }

    fn link_into_newer(&mut self, node: usize) {
        let slot = (self.nodes[node].hash as usize) & self.newer.mask();
        self.nodes[node].next = self.newer.slots[slot];
        self.newer.slots[slot] = node;
        self.newer.len += 1;
    }

    /// Demotes the full table to `older` and allocates a doubled `newer`.
    fn trigger_migration(&mut self) {
        debug_assert!(!self.older.is_allocated());
        let doubled = self.newer.slots.len() * 2;
        self.older = std::mem::replace(&mut self.newer, Table::with_slots(doubled));
        self.migrate_pos = 0;
    }

    /// Relinks up to [`MIGRATION_BATCH`] nodes from `older` into `newer`.
    /// Scanning past drained slots does not count against the batch.
    fn help_migrate(&mut self) {
        let mut moved = 0;
        while moved < MIGRATION_BATCH && self.older.len > 0 {
            let slot = self.migrate_pos;
            let head = self.older.slots[slot];
            if head == NIL {
                self.migrate_pos += 1;
                continue;
            }
            self.older.slots[slot] = self.nodes[head].next;
            self.older.len -= 1;
            self.link_into_newer(head);
            moved += 1;
        }
        if self.older.is_allocated() && self.older.len == 0 {
            self.older = Table::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_pair(table: &mut HashTable<(String, u64)>, key: &str, val: u64) {
        let hash = hash_bytes(key.as_bytes());
        table.insert(hash, (key.to_string(), val));
    }

    fn get_val(table: &mut HashTable<(String, u64)>, key: &str) -> Option<u64> {
        let hash = hash_bytes(key.as_bytes());
        table.get(hash, |(k, _)| k == key).map(|(_, v)| *v)
    }

    fn remove_pair(table: &mut HashTable<(String, u64)>, key: &str) -> Option<u64> {
        let hash = hash_bytes(key.as_bytes());
        table.remove(hash, |(k, _)| k == key).map(|(_, v)| v)
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = HashTable::new();
        insert_pair(&mut table, "alpha", 1);
        insert_pair(&mut table, "beta", 2);

        assert_eq!(get_val(&mut table, "alpha"), Some(1));
        assert_eq!(get_val(&mut table, "beta"), Some(2));
        assert_eq!(get_val(&mut table, "gamma"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut table = HashTable::new();
        insert_pair(&mut table, "alpha", 1);

        assert_eq!(remove_pair(&mut table, "alpha"), Some(1));
        assert_eq!(remove_pair(&mut table, "alpha"), None);
        assert_eq!(get_val(&mut table, "alpha"), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_get_mut() {
        let mut table = HashTable::new();
        insert_pair(&mut table, "counter", 0);

        let hash = hash_bytes(b"counter");
        if let Some((_, v)) = table.get_mut(hash, |(k, _)| k == "counter") {
            *v = 42;
        }
        assert_eq!(get_val(&mut table, "counter"), Some(42));
    }

    #[test]
    fn test_no_keys_lost_across_migrations() {
        // Enough inserts to trigger several doublings, each of which drains
        // progressively while further inserts land in the newer generation.
        let mut table = HashTable::new();
        let n = 10_000;
        for i in 0..n {
            insert_pair(&mut table, &format!("key-{i}"), i);
        }
        assert_eq!(table.len(), n as usize);
        for i in 0..n {
            assert_eq!(get_val(&mut table, &format!("key-{i}")), Some(i));
        }
    }

    #[test]
    fn test_remove_during_migration() {
        let mut table = HashTable::new();
        let n = 1_000u64;
        for i in 0..n {
            insert_pair(&mut table, &format!("key-{i}"), i);
        }
        // Interleave removals and lookups so some hit the older generation.
        for i in (0..n).step_by(2) {
            assert_eq!(remove_pair(&mut table, &format!("key-{i}")), Some(i));
        }
        assert_eq!(table.len(), n as usize / 2);
        for i in 0..n {
            let expect = if i % 2 == 0 { None } else { Some(i) };
            assert_eq!(get_val(&mut table, &format!("key-{i}")), expect);
        }
    }

    #[test]
    fn test_colliding_hashes_share_a_chain() {
        // Same hash, distinguished only by the equality predicate.
        let mut table: HashTable<(String, u64)> = HashTable::new();
        table.insert(7, ("a".to_string(), 1));
        table.insert(7, ("b".to_string(), 2));

        assert_eq!(table.get(7, |(k, _)| k == "a").map(|(_, v)| *v), Some(1));
        assert_eq!(table.get(7, |(k, _)| k == "b").map(|(_, v)| *v), Some(2));
        assert_eq!(table.remove(7, |(k, _)| k == "a").map(|(_, v)| v), Some(1));
        assert_eq!(table.get(7, |(k, _)| k == "b").map(|(_, v)| *v), Some(2));
    }

    #[test]
    fn test_for_each_visits_both_generations() {
        let mut table = HashTable::new();
        let n = 500u64;
        for i in 0..n {
            insert_pair(&mut table, &format!("key-{i}"), i);
        }
        let mut seen: Vec<u64> = Vec::new();
        table.for_each(|(_, v)| seen.push(*v));
        seen.sort_unstable();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
        assert_eq!(hash_bytes(b""), 0x811C_9DC5);
    }
}
