//! Min-heap of entries keyed by next activation.
//!
//! Ordering invariant: a concrete activation sorts before `None`, so
//! entries that will never fire sink to the bottom and the root is always
//! the next thing to do (or proof that there is nothing to do).

use crate::entry::{Entry, EntryId};

#[derive(Debug, Default)]
pub(crate) struct EntryHeap {
    entries: Vec<Entry>,
}

/// `a` sorts strictly before `b`.
fn earlier(a: &Entry, b: &Entry) -> bool {
    match (a.next, b.next) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    }
}

impl EntryHeap {
    /// Heapify an arbitrary entry list.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut heap = Self { entries };
        if heap.entries.len() > 1 {
            for i in (0..heap.entries.len() / 2).rev() {
                heap.sift_down(i);
            }
        }
        heap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry with the earliest next activation, if any.
    pub fn peek(&self) -> Option<&Entry> {
        self.entries.first()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.sift_up(self.entries.len() - 1);
    }

    pub fn pop(&mut self) -> Option<Entry> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.entries.swap(0, last);
        let entry = self.entries.pop();
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        entry
    }

    /// Remove the entry with the given id, keeping the heap ordered.
    /// Unknown ids are ignored.
    pub fn remove(&mut self, id: EntryId) -> Option<Entry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let last = self.entries.len() - 1;
        self.entries.swap(index, last);
        let entry = self.entries.pop();
        if index < self.entries.len() {
            self.sift_down(index);
            self.sift_up(index);
        }
        entry
    }

    /// Snapshot in storage order. Does not mutate heap order.
    pub fn snapshot(&self) -> Vec<Entry> {
        self.entries.clone()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !earlier(&self.entries[index], &self.entries[parent]) {
                break;
            }
            self.entries.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        loop {
            let mut smallest = index;
            for child in [2 * index + 1, 2 * index + 2] {
                if child < self.entries.len()
                    && earlier(&self.entries[child], &self.entries[smallest])
                {
                    smallest = child;
                }
            }
            if smallest == index {
                return;
            }
            self.entries.swap(index, smallest);
            index = smallest;
        }
    }
}
