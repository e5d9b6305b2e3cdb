//! Sorted Set
//!
//! A collection of unique member names, each carrying an f64 score, ordered
//! by the `(score, name)` pair. Two structures index the same member arena:
//!
//! ```text
//!            ┌──────────────────────────────────┐
//!            │         member arena (Slab)      │
//!            │  { name, score, tree links }     │
//!            └───────▲──────────────────▲───────┘
//!                    │                  │
//!      ┌─────────────┴────┐    ┌────────┴─────────────┐
//!      │  name hashtable  │    │  AVL tree by         │
//!      │  O(1) score      │    │  (score, name) with  │
//!      │  lookup          │    │  subtree sizes       │
//!      └──────────────────┘    └──────────────────────┘
//! ```
//!
//! The tree augments every node with its subtree size, which turns rank
//! arithmetic into tree walks: [`SortedSet::seek_at_or_after`] finds the
//! first member at or after a `(score, name)` bound in O(log n), and
//! [`SortedSet::advance_by_rank`] moves any number of ranks forward or
//! backward in O(log n) instead of stepping successor-by-successor.
//!
//! Members are addressed by their arena key, valid until the member is
//! removed. Scores are never NaN; the command layer rejects NaN before it
//! reaches this module.

use bytes::Bytes;
use slab::Slab;

use super::hashmap::{hash_bytes, HashTable, NIL};

#[derive(Debug)]
struct ZNode {
    name: Bytes,
    score: f64,
    hash: u64,
    parent: usize,
    left: usize,
    right: usize,
    height: u32,
    /// Size of the subtree rooted here, this node included.
    count: usize,
}

#[derive(Debug, Default)]
pub struct SortedSet {
    nodes: Slab<ZNode>,
    by_name: HashTable<usize>,
    root: usize,
}

impl SortedSet {
    pub fn new() -> Self {
        SortedSet {
            nodes: Slab::new(),
            by_name: HashTable::new(),
            root: NIL,
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.subtree_size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    /// Adds a member or updates its score. Returns `true` only when the
    /// member is new. An update whose score compares exactly equal (f64 `==`)
    /// to the stored one leaves the tree untouched; any other update is a
    /// detach and re-insert, since the score is the primary sort key.
    pub fn insert(&mut self, name: &[u8], score: f64) -> bool {
        if let Some(id) = self.lookup(name) {
            self.update_score(id, score);
            return false;
        }
        let hash = hash_bytes(name);
        let id = self.nodes.insert(ZNode {
            name: Bytes::copy_from_slice(name),
            score,
            hash,
            parent: NIL,
            left: NIL,
            right: NIL,
            height: 1,
            count: 1,
        });
        self.by_name.insert(hash, id);
        self.tree_insert(id);
        true
    }

    /// Removes a member by name. Returns `false` if it was not present.
    pub fn remove(&mut self, name: &[u8]) -> bool {
        let Some(id) = self.lookup(name) else {
            return false;
        };
        let hash = self.nodes[id].hash;
        self.by_name.remove(hash, |&cand| cand == id);
        self.root = self.tree_detach(id);
        self.nodes.remove(id);
        true
    }

    pub fn score(&mut self, name: &[u8]) -> Option<f64> {
        let id = self.lookup(name)?;
        Some(self.nodes[id].score)
    }

    /// Finds the first member whose `(score, name)` pair is at or after the
    /// given bound, in set order.
    pub fn seek_at_or_after(&self, score: f64, name: &[u8]) -> Option<usize> {
        let mut found = NIL;
        let mut cur = self.root;
        while cur != NIL {
            if self.sorts_before(cur, score, name) {
                cur = self.nodes[cur].right;
            } else {
                found = cur;
                cur = self.nodes[cur].left;
            }
        }
        (found != NIL).then_some(found)
    }

    /// Moves `offset` ranks from `start` (negative moves backward), walking
    /// the tree with subtree sizes instead of repeated successor steps.
    /// Returns `None` when the target rank falls outside the set.
    pub fn advance_by_rank(&self, start: usize, offset: i64) -> Option<usize> {
        let mut node = start;
        let mut pos: i64 = 0;
        while pos != offset {
            let left = self.nodes[node].left;
            let right = self.nodes[node].right;
            if pos < offset && pos + self.subtree_size(right) as i64 >= offset {
                // the target rank is inside the right subtree
                node = right;
                pos += self.subtree_size(self.nodes[node].left) as i64 + 1;
            } else if pos > offset && pos - self.subtree_size(left) as i64 <= offset {
                // the target rank is inside the left subtree
                node = left;
                pos -= self.subtree_size(self.nodes[node].right) as i64 + 1;
            } else {
                // climb to the parent, adjusting the rank of the current node
                let parent = self.nodes[node].parent;
                if parent == NIL {
                    return None;
                }
                if self.nodes[parent].right == node {
                    pos -= self.subtree_size(left) as i64 + 1;
                } else {
                    pos += self.subtree_size(right) as i64 + 1;
                }
                node = parent;
            }
        }
        Some(node)
    }

    /// Name and score of the member at `id`.
    pub fn member(&self, id: usize) -> (&Bytes, f64) {
        let node = &self.nodes[id];
        (&node.name, node.score)
    }

    /// Drops all members at once.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_name = HashTable::new();
        self.root = NIL;
    }

    fn lookup(&mut self, name: &[u8]) -> Option<usize> {
        let hash = hash_bytes(name);
        let nodes = &self.nodes;
        self.by_name
            .get(hash, |&id| nodes[id].name[..] == *name)
            .copied()
    }

    fn update_score(&mut self, id: usize, score: f64) {
        if self.nodes[id].score == score {
            return;
        }
        self.root = self.tree_detach(id);
        let node = &mut self.nodes[id];
        node.score = score;
        node.parent = NIL;
        node.left = NIL;
        node.right = NIL;
        node.height = 1;
        node.count = 1;
        self.tree_insert(id);
    }

    /// Whether the member at `id` sorts strictly before `(score, name)`.
    fn sorts_before(&self, id: usize, score: f64, name: &[u8]) -> bool {
        let node = &self.nodes[id];
        if node.score != score {
            return node.score < score;
        }
        node.name[..] < *name
    }

    fn height(&self, id: usize) -> u32 {
        if id == NIL {
            0
        } else {
            self.nodes[id].height
        }
    }

    fn subtree_size(&self, id: usize) -> usize {
        if id == NIL {
            0
        } else {
            self.nodes[id].count
        }
    }

    fn refresh(&mut self, id: usize) {
        let left = self.nodes[id].left;
        let right = self.nodes[id].right;
        self.nodes[id].height = 1 + self.height(left).max(self.height(right));
        self.nodes[id].count = 1 + self.subtree_size(left) + self.subtree_size(right);
    }

    fn tree_insert(&mut self, id: usize) {
        if self.root == NIL {
            self.root = id;
            return;
        }
        // descend to a leaf position
        let mut cur = self.root;
        loop {
            let go_left = self.node_sorts_before(id, cur);
            let next = if go_left {
                self.nodes[cur].left
            } else {
                self.nodes[cur].right
            };
            if next == NIL {
                if go_left {
                    self.nodes[cur].left = id;
                } else {
                    self.nodes[cur].right = id;
                }
                self.nodes[id].parent = cur;
                self.root = self.rebalance(id);
                return;
            }
            cur = next;
        }
    }

    /// Whether member `a` sorts strictly before member `b`.
    fn node_sorts_before(&self, a: usize, b: usize) -> bool {
        let score = self.nodes[a].score;
        let node_b = &self.nodes[b];
        if score != node_b.score {
            return score < node_b.score;
        }
        self.nodes[a].name[..] < node_b.name[..]
    }

    /// Walks from `id` to the root, refreshing augmentations and rotating
    /// wherever a subtree is two levels out of balance. Returns the new root.
    fn rebalance(&mut self, mut node: usize) -> usize {
        loop {
            self.refresh(node);
            let parent = self.nodes[node].parent;
            let left = self.height(self.nodes[node].left);
            let right = self.height(self.nodes[node].right);
            let mut subtree = node;
            if left == right + 2 {
                subtree = self.balance_left(node);
            } else if left + 2 == right {
                subtree = self.balance_right(node);
            }
            if parent == NIL {
                return subtree;
            }
            if self.nodes[parent].left == node {
                self.nodes[parent].left = subtree;
            } else {
                self.nodes[parent].right = subtree;
            }
            node = parent;
        }
    }

    /// Left subtree is two levels taller; rotate right, with an inner
    /// pre-rotation for the left-right case.
    fn balance_left(&mut self, node: usize) -> usize {
        let left = self.nodes[node].left;
        if self.height(self.nodes[left].left) < self.height(self.nodes[left].right) {
            let rotated = self.rotate_left(left);
            self.nodes[node].left = rotated;
        }
        self.rotate_right(node)
    }

    fn balance_right(&mut self, node: usize) -> usize {
        let right = self.nodes[node].right;
        if self.height(self.nodes[right].right) < self.height(self.nodes[right].left) {
            let rotated = self.rotate_right(right);
            self.nodes[node].right = rotated;
        }
        self.rotate_left(node)
    }

    /// Rotates `node`'s right child above it. The caller reattaches the
    /// returned subtree root to `node`'s former parent.
    fn rotate_left(&mut self, node: usize) -> usize {
        let parent = self.nodes[node].parent;
        let new_root = self.nodes[node].right;
        let inner = self.nodes[new_root].left;
        self.nodes[node].right = inner;
        if inner != NIL {
            self.nodes[inner].parent = node;
        }
        self.nodes[new_root].parent = parent;
        self.nodes[new_root].left = node;
        self.nodes[node].parent = new_root;
        self.refresh(node);
        self.refresh(new_root);
        new_root
    }

    fn rotate_right(&mut self, node: usize) -> usize {
        let parent = self.nodes[node].parent;
        let new_root = self.nodes[node].left;
        let inner = self.nodes[new_root].right;
        self.nodes[node].left = inner;
        if inner != NIL {
            self.nodes[inner].parent = node;
        }
        self.nodes[new_root].parent = parent;
        self.nodes[new_root].right = node;
        self.nodes[node].parent = new_root;
        self.refresh(node);
        self.refresh(new_root);
        new_root
    }

    /// Unlinks `id` from the tree (without freeing its arena slot) and
    /// returns the new tree root.
    fn tree_detach(&mut self, id: usize) -> usize {
        if self.nodes[id].left == NIL || self.nodes[id].right == NIL {
            return self.detach_simple(id);
        }
        // Two children: detach the in-order successor, then splice it into
        // this node's position. The successor has no left child by
        // construction, so its own detach is the simple case.
        let mut victim = self.nodes[id].right;
        while self.nodes[victim].left != NIL {
            victim = self.nodes[victim].left;
        }
        let mut root = self.detach_simple(victim);
        // Read id's links only now: rebalancing inside detach_simple may
        // have rotated around id.
        let (parent, left, right, height, count) = {
            let n = &self.nodes[id];
            (n.parent, n.left, n.right, n.height, n.count)
        };
        {
            let v = &mut self.nodes[victim];
            v.parent = parent;
            v.left = left;
            v.right = right;
            v.height = height;
            v.count = count;
        }
        if left != NIL {
            self.nodes[left].parent = victim;
        }
        if right != NIL {
            self.nodes[right].parent = victim;
        }
        if parent == NIL {
            root = victim;
        } else if self.nodes[parent].left == id {
            self.nodes[parent].left = victim;
        } else {
            self.nodes[parent].right = victim;
        }
        root
    }

    /// Detach for a node with at most one child.
    fn detach_simple(&mut self, id: usize) -> usize {
        debug_assert!(self.nodes[id].left == NIL || self.nodes[id].right == NIL);
        let child = if self.nodes[id].left != NIL {
            self.nodes[id].left
        } else {
            self.nodes[id].right
        };
        let parent = self.nodes[id].parent;
        if child != NIL {
            self.nodes[child].parent = parent;
        }
        if parent == NIL {
            return child;
        }
        if self.nodes[parent].left == id {
            self.nodes[parent].left = child;
        } else {
            self.nodes[parent].right = child;
        }
        self.rebalance(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_in_order(set: &SortedSet) -> Vec<(Vec<u8>, f64)> {
        let mut out = Vec::new();
        let Some(mut cur) = set.seek_at_or_after(f64::NEG_INFINITY, b"") else {
            return out;
        };
        loop {
            let (name, score) = set.member(cur);
            out.push((name.to_vec(), score));
            match set.advance_by_rank(cur, 1) {
                Some(next) => cur = next,
                None => break,
            }
        }
        out
    }

    #[test]
    fn test_insert_and_score() {
        let mut set = SortedSet::new();
        assert!(set.insert(b"alice", 3.0));
        assert!(set.insert(b"bob", 1.5));
        assert!(!set.insert(b"alice", 3.0)); // same member, same score

        assert_eq!(set.score(b"alice"), Some(3.0));
        assert_eq!(set.score(b"bob"), Some(1.5));
        assert_eq!(set.score(b"carol"), None);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_order_is_score_then_name() {
        let mut set = SortedSet::new();
        set.insert(b"c", 2.0);
        set.insert(b"a", 2.0);
        set.insert(b"b", 1.0);
        set.insert(b"d", 2.0);

        let names: Vec<Vec<u8>> = collect_in_order(&set).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![b"b".to_vec(), b"a".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn test_score_update_moves_member() {
        let mut set = SortedSet::new();
        set.insert(b"a", 1.0);
        set.insert(b"b", 2.0);
        set.insert(b"c", 3.0);

        assert!(!set.insert(b"a", 9.0)); // update, not an add
        assert_eq!(set.score(b"a"), Some(9.0));
        let names: Vec<Vec<u8>> = collect_in_order(&set).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![b"b".to_vec(), b"c".to_vec(), b"a".to_vec()]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_remove() {
        let mut set = SortedSet::new();
        set.insert(b"a", 1.0);
        set.insert(b"b", 2.0);

        assert!(set.remove(b"a"));
        assert!(!set.remove(b"a"));
        assert_eq!(set.score(b"a"), None);
        assert_eq!(set.len(), 1);
        assert_eq!(set.score(b"b"), Some(2.0));
    }

    #[test]
    fn test_seek_is_inclusive_lower_bound() {
        let mut set = SortedSet::new();
        set.insert(b"a", 1.0);
        set.insert(b"b", 2.0);
        set.insert(b"c", 3.0);

        let hit = set.seek_at_or_after(2.0, b"b").unwrap();
        assert_eq!(set.member(hit).0[..], b"b"[..]);

        // A name just past "b" at the same score lands on the next member.
        let next = set.seek_at_or_after(2.0, b"bb").unwrap();
        assert_eq!(set.member(next).0[..], b"c"[..]);

        assert!(set.seek_at_or_after(9.0, b"").is_none());
    }

    #[test]
    fn test_rank_offsets_match_linear_scan() {
        let mut set = SortedSet::new();
        let n = 500i64;
        for i in 0..n {
            // scores collide in pairs so name ordering matters too
            set.insert(format!("m{i:04}").as_bytes(), (i / 2) as f64);
        }
        let ordered = collect_in_order(&set);
        assert_eq!(ordered.len(), n as usize);

        let start = set.seek_at_or_after(f64::NEG_INFINITY, b"").unwrap();
        for rank in 0..n {
            let id = set.advance_by_rank(start, rank).unwrap();
            assert_eq!(set.member(id).0[..], ordered[rank as usize].0[..]);
            // and walk back again
            let back = set.advance_by_rank(id, -rank).unwrap();
            assert_eq!(back, start);
        }
        assert!(set.advance_by_rank(start, n).is_none());
        assert!(set.advance_by_rank(start, -1).is_none());
    }

    #[test]
    fn test_many_inserts_and_removes_stay_balanced() {
        let mut set = SortedSet::new();
        let n = 2_000i64;
        for i in 0..n {
            set.insert(format!("m{i}").as_bytes(), ((i * 7919) % 1000) as f64);
        }
        assert_eq!(set.len(), n as usize);
        for i in (0..n).step_by(3) {
            assert!(set.remove(format!("m{i}").as_bytes()));
        }
        let ordered = collect_in_order(&set);
        assert_eq!(ordered.len(), set.len());
        // in-order traversal must be non-decreasing by (score, name)
        for pair in ordered.windows(2) {
            let (ref n0, s0) = pair[0];
            let (ref n1, s1) = pair[1];
            assert!(s0 < s1 || (s0 == s1 && n0 < n1));
        }
    }

    #[test]
    fn test_clear() {
        let mut set = SortedSet::new();
        set.insert(b"a", 1.0);
        set.insert(b"b", 2.0);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.score(b"a"), None);
        assert!(set.insert(b"a", 5.0));
    }
}
