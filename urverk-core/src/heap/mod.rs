//! ## urverk-core::heap
//! **Indexed binary min-heap keyed by due time**
//!
//! The heap stores `(id, due_ms)` pairs rather than the timer records
//! themselves; the records live in the scheduler's id table. An id→position
//! index is kept in step with every swap so that any element, not only the
//! root, can be removed or re-keyed in O(log n).

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Returned by [`IndexedMinHeap::peek_due`] when the heap is empty.
pub const NEVER: i64 = i64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node<I> {
    id: I,
    due_ms: i64,
}

/// Min-heap on `due_ms` with O(log n) removal and key update by id.
#[derive(Debug, Clone)]
pub struct IndexedMinHeap<I> {
    nodes: Vec<Node<I>>,
    positions: HashMap<I, usize>,
}

impl<I> Default for IndexedMinHeap<I> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<I> IndexedMinHeap<I>
where
    I: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: I) -> bool {
        self.positions.contains_key(&id)
    }

    /// Current key of `id`, if present.
    pub fn due_of(&self, id: I) -> Option<i64> {
        self.positions.get(&id).map(|&pos| self.nodes[pos].due_ms)
    }

    /// Inserts `id` with key `due_ms`.
    ///
    /// # Panics
    /// If `id` is already present. Two heap slots for one id would make the
    /// position index ambiguous, so this is treated as a programming error.
    pub fn push(&mut self, id: I, due_ms: i64) {
        assert!(
            !self.positions.contains_key(&id),
            "IndexedMinHeap already contains id {id:?}"
        );
        let pos = self.nodes.len();
        self.nodes.push(Node { id, due_ms });
        self.positions.insert(id, pos);
        self.sift_up(pos);
    }

    /// Minimum element without removing it.
    #[inline]
    pub fn peek(&self) -> Option<(I, i64)> {
        self.nodes.first().map(|n| (n.id, n.due_ms))
    }

    /// Minimum key, or [`NEVER`] when empty.
    #[inline]
    pub fn peek_due(&self) -> i64 {
        self.nodes.first().map_or(NEVER, |n| n.due_ms)
    }

    /// Removes and returns the minimum element.
    pub fn pop(&mut self) -> Option<(I, i64)> {
        if self.nodes.is_empty() {
            return None;
        }
        let node = self.remove_at(0);
        Some((node.id, node.due_ms))
    }

    /// Removes `id` wherever it sits. Returns `false` if it was not present.
    pub fn remove(&mut self, id: I) -> bool {
        match self.positions.get(&id).copied() {
            Some(pos) => {
                self.remove_at(pos);
                true
            }
            None => false,
        }
    }

    /// Changes the key of `id`, sifting in whichever direction the key moved.
    /// Returns `false` if `id` is not present.
    pub fn update_key(&mut self, id: I, due_ms: i64) -> bool {
        let Some(pos) = self.positions.get(&id).copied() else {
            return false;
        };
        let old = self.nodes[pos].due_ms;
        if old == due_ms {
            return true;
        }
        self.nodes[pos].due_ms = due_ms;
        if due_ms < old {
            self.sift_up(pos);
        } else {
            self.sift_down(pos);
        }
        true
    }

    fn remove_at(&mut self, pos: usize) -> Node<I> {
        let removed = self.nodes.swap_remove(pos);
        self.positions.remove(&removed.id);

        if pos < self.nodes.len() {
            self.positions.insert(self.nodes[pos].id, pos);
            // The element moved in from the tail may belong above or below.
            self.sift_down(pos);
            self.sift_up(pos);
        }
        removed
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.nodes[pos].due_ms >= self.nodes[parent].due_ms {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.nodes.len();
        loop {
            let left = pos * 2 + 1;
            let right = left + 1;
            let mut smallest = pos;

            if left < len && self.nodes[left].due_ms < self.nodes[smallest].due_ms {
                smallest = left;
            }
            if right < len && self.nodes[right].due_ms < self.nodes[smallest].due_ms {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }

    #[inline]
    fn swap(&mut self, a: usize, b: usize) {
        self.nodes.swap(a, b);
        self.positions.insert(self.nodes[a].id, a);
        self.positions.insert(self.nodes[b].id, b);
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        assert_eq!(self.nodes.len(), self.positions.len());
        for (pos, node) in self.nodes.iter().enumerate() {
            assert_eq!(self.positions[&node.id], pos, "stale index for {:?}", node.id);
            if pos > 0 {
                let parent = (pos - 1) / 2;
                assert!(self.nodes[parent].due_ms <= node.due_ms, "heap order broken");
            }
        }
    }
}
