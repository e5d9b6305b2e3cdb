//! Idle Connection List
//!
//! A doubly linked list of connection keys ordered by last activity: the
//! front is the connection idle the longest, the back the most recently
//! active. Touching a connection moves it to the back, so the idle sweep
//! only ever inspects a prefix and stops at the first non-expired one.
//!
//! Links are stored in the list itself, indexed by connection key, rather
//! than inside the connections; detaching or re-queuing a key is O(1) and
//! needs no access to the connection table at all.

const NIL: usize = usize::MAX;

#[derive(Debug, Default)]
pub struct IdleList {
    head: usize,
    tail: usize,
    /// `[prev, next]` per connection key; grows with the key space.
    links: Vec<[usize; 2]>,
}

impl IdleList {
    pub fn new() -> Self {
        IdleList {
            head: NIL,
            tail: NIL,
            links: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head == NIL
    }

    /// The key idle the longest, if any.
    pub fn front(&self) -> Option<usize> {
        (self.head != NIL).then_some(self.head)
    }

    /// Appends `key` at the most-recently-active end. The key must not
    /// already be in the list.
    pub fn push_back(&mut self, key: usize) {
        if key >= self.links.len() {
            self.links.resize(key + 1, [NIL, NIL]);
        }
        self.links[key] = [self.tail, NIL];
        if self.tail != NIL {
            self.links[self.tail][1] = key;
        } else {
            self.head = key;
        }
        self.tail = key;
    }

    /// Unlinks `key`. The key must be in the list.
    pub fn remove(&mut self, key: usize) {
        let [prev, next] = self.links[key];
        if prev != NIL {
            self.links[prev][1] = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.links[next][0] = prev;
        } else {
            self.tail = prev;
        }
        self.links[key] = [NIL, NIL];
    }

    /// Moves `key` to the most-recently-active end.
    pub fn touch(&mut self, key: usize) {
        self.remove(key);
        self.push_back(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(list: &mut IdleList) -> Vec<usize> {
        let mut out = Vec::new();
        while let Some(key) = list.front() {
            out.push(key);
            list.remove(key);
        }
        out
    }

    #[test]
    fn test_front_is_oldest() {
        let mut list = IdleList::new();
        assert!(list.is_empty());
        list.push_back(3);
        list.push_back(1);
        list.push_back(7);
        assert_eq!(list.front(), Some(3));
        assert_eq!(drain(&mut list), vec![3, 1, 7]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_touch_moves_to_back() {
        let mut list = IdleList::new();
        list.push_back(0);
        list.push_back(1);
        list.push_back(2);
        list.touch(0);
        assert_eq!(drain(&mut list), vec![1, 2, 0]);
    }

    #[test]
    fn test_remove_from_middle_and_ends() {
        let mut list = IdleList::new();
        for key in 0..5 {
            list.push_back(key);
        }
        list.remove(2); // middle
        list.remove(0); // head
        list.remove(4); // tail
        assert_eq!(drain(&mut list), vec![1, 3]);
    }

    #[test]
    fn test_reinsert_after_remove() {
        let mut list = IdleList::new();
        list.push_back(0);
        list.push_back(1);
        list.remove(0);
        list.push_back(0);
        assert_eq!(drain(&mut list), vec![1, 0]);
    }
}
