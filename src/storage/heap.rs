//! TTL Min-Heap
//!
//! An array-backed binary min-heap of expiration deadlines, ordered so the
//! root is always the next deadline to fire. The event loop reads the root
//! to bound its poll timeout, and the expiry sweep pops from the root.
//!
//! Entries need to find their heap position in O(1) when a TTL is updated or
//! removed, so every relocation inside the heap is reported through a
//! `track(entry, pos)` closure supplied by the caller. The storage engine
//! passes a closure that writes the position back into the entry arena; the
//! heap itself never touches entry storage.

/// One pending expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlItem {
    /// Absolute deadline on the server's monotonic millisecond clock.
    pub deadline_ms: u64,
    /// Arena key of the owning entry.
    pub entry: usize,
}

#[derive(Debug, Default)]
pub struct TtlHeap {
    items: Vec<TtlItem>,
}

impl TtlHeap {
    pub fn new() -> Self {
        TtlHeap { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item with the earliest deadline.
    pub fn peek(&self) -> Option<&TtlItem> {
        self.items.first()
    }

    pub fn deadline_at(&self, pos: usize) -> u64 {
        self.items[pos].deadline_ms
    }

    /// Overwrites the item at `pos` (when the entry already holds a TTL) or
    /// pushes a new one, then restores heap order. `track` is called with
    /// `(entry, pos)` for every item that lands in a new position, including
    /// the upserted one.
    pub fn upsert(
        &mut self,
        pos: Option<usize>,
        item: TtlItem,
        mut track: impl FnMut(usize, usize),
    ) {
        let pos = match pos {
            Some(pos) => {
                self.items[pos] = item;
                pos
            }
            None => {
                self.items.push(item);
                self.items.len() - 1
            }
        };
        self.restore(pos, &mut track);
    }

    /// Removes the item at `pos` by swapping the last item into its place.
    /// The caller is responsible for clearing the removed entry's own
    /// back-reference; `track` covers the item that moved into the hole.
    pub fn remove(&mut self, pos: usize, mut track: impl FnMut(usize, usize)) {
        let last = self.items.len() - 1;
        self.items.swap(pos, last);
        self.items.pop();
        if pos < self.items.len() {
            self.restore(pos, &mut track);
        }
    }

    /// Re-establishes heap order for the item at `pos`, in whichever
    /// direction it is out of place.
    fn restore(&mut self, pos: usize, track: &mut impl FnMut(usize, usize)) {
        if pos > 0 && self.items[(pos - 1) / 2].deadline_ms > self.items[pos].deadline_ms {
            self.sift_up(pos, track);
        } else {
            self.sift_down(pos, track);
        }
    }

    fn sift_up(&mut self, mut pos: usize, track: &mut impl FnMut(usize, usize)) {
        let item = self.items[pos];
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.items[parent].deadline_ms <= item.deadline_ms {
                break;
            }
            self.items[pos] = self.items[parent];
            track(self.items[pos].entry, pos);
            pos = parent;
        }
        self.items[pos] = item;
        track(item.entry, pos);
    }

    fn sift_down(&mut self, mut pos: usize, track: &mut impl FnMut(usize, usize)) {
        let item = self.items[pos];
        let len = self.items.len();
        loop {
            let left = pos * 2 + 1;
            let right = left + 1;
            let mut best = pos;
            let mut best_deadline = item.deadline_ms;
            if left < len && self.items[left].deadline_ms < best_deadline {
                best = left;
                best_deadline = self.items[left].deadline_ms;
            }
            if right < len && self.items[right].deadline_ms < best_deadline {
                best = right;
            }
            if best == pos {
                break;
            }
            self.items[pos] = self.items[best];
            track(self.items[pos].entry, pos);
            pos = best;
        }
        self.items[pos] = item;
        track(item.entry, pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Mirror of the entry arena's back-references, maintained purely
    /// through the track callback.
    #[derive(Default)]
    struct PosMap(HashMap<usize, usize>);

    impl PosMap {
        fn tracker(&mut self) -> impl FnMut(usize, usize) + '_ {
            |entry, pos| {
                self.0.insert(entry, pos);
            }
        }
    }

    fn assert_consistent(heap: &TtlHeap, positions: &PosMap) {
        assert_eq!(heap.len(), positions.0.len());
        for (&entry, &pos) in &positions.0 {
            assert_eq!(heap.items[pos].entry, entry, "stale back-reference");
        }
        for pos in 1..heap.len() {
            let parent = (pos - 1) / 2;
            assert!(
                heap.items[parent].deadline_ms <= heap.items[pos].deadline_ms,
                "heap order violated at {pos}"
            );
        }
    }

    #[test]
    fn test_root_is_earliest_deadline() {
        let mut heap = TtlHeap::new();
        let mut positions = PosMap::default();
        for (entry, deadline) in [(0, 500u64), (1, 100), (2, 300), (3, 50), (4, 400)] {
            heap.upsert(
                None,
                TtlItem {
                    deadline_ms: deadline,
                    entry,
                },
                positions.tracker(),
            );
        }
        assert_eq!(heap.peek().map(|i| i.deadline_ms), Some(50));
        assert_consistent(&heap, &positions);
    }

    #[test]
    fn test_update_moves_item_both_directions() {
        let mut heap = TtlHeap::new();
        let mut positions = PosMap::default();
        for entry in 0..16usize {
            heap.upsert(
                None,
                TtlItem {
                    deadline_ms: (entry as u64 + 1) * 100,
                    entry,
                },
                positions.tracker(),
            );
        }
        // Push the root far into the future.
        let root = heap.peek().unwrap().entry;
        heap.upsert(
            Some(positions.0[&root]),
            TtlItem {
                deadline_ms: 10_000,
                entry: root,
            },
            positions.tracker(),
        );
        assert_consistent(&heap, &positions);
        assert_ne!(heap.peek().unwrap().entry, root);

        // Pull a deep item to the front.
        let deep = 15usize;
        heap.upsert(
            Some(positions.0[&deep]),
            TtlItem {
                deadline_ms: 1,
                entry: deep,
            },
            positions.tracker(),
        );
        assert_consistent(&heap, &positions);
        assert_eq!(heap.peek().unwrap().entry, deep);
    }

    #[test]
    fn test_remove_patches_the_hole() {
        let mut heap = TtlHeap::new();
        let mut positions = PosMap::default();
        for entry in 0..32usize {
            heap.upsert(
                None,
                TtlItem {
                    deadline_ms: ((entry * 37) % 101) as u64,
                    entry,
                },
                positions.tracker(),
            );
        }
        // Remove from the middle, then from the root, then drain.
        for victim in [13usize, 5, 0] {
            let pos = positions.0.remove(&victim).unwrap();
            heap.remove(pos, positions.tracker());
            // The victim may have been re-tracked by the swap; drop it again.
            positions.0.remove(&victim);
            assert_consistent(&heap, &positions);
        }
        while let Some(&TtlItem { entry, .. }) = heap.peek() {
            let pos = positions.0.remove(&entry).unwrap();
            assert_eq!(pos, 0);
            heap.remove(pos, positions.tracker());
            positions.0.remove(&entry);
            assert_consistent(&heap, &positions);
        }
        assert!(heap.is_empty());
    }

    #[test]
    fn test_remove_last_item_skips_restore() {
        let mut heap = TtlHeap::new();
        let mut positions = PosMap::default();
        heap.upsert(
            None,
            TtlItem {
                deadline_ms: 10,
                entry: 0,
            },
            positions.tracker(),
        );
        heap.remove(0, positions.tracker());
        assert!(heap.is_empty());
    }
}
