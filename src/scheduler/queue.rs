//! Min-priority queue keyed by the instant an item is due

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Anything with a due instant
pub trait Scheduled {
    /// When the item should next be serviced
    fn due_at(&self) -> DateTime<Utc>;
}

/// Heap entry; the due instant is captured on insertion so it cannot drift
struct Entry<T> {
    due: DateTime<Utc>,
    seq: u64,
    item: T,
}

// BinaryHeap is a max-heap: reverse the comparison so the earliest due wins,
// then the earliest inserted among equal instants.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.due.cmp(&self.due) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ordering => ordering,
        }
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

/// Earliest-due-first queue
pub struct RefreshQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    seq: u64,
}

impl<T: Scheduled> RefreshQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Insert an item, O(log n)
    pub fn enqueue(&mut self, item: T) {
        let entry = Entry {
            due: item.due_at(),
            seq: self.seq,
            item,
        };
        self.seq = self.seq.wrapping_add(1);
        self.heap.push(entry);
    }

    /// Remove the item with the earliest due instant, O(log n)
    pub fn dequeue_min(&mut self) -> Option<T> {
        self.heap.pop().map(|entry| entry.item)
    }

    /// Due instant of the next item without removing it
    pub fn peek_due(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|entry| entry.due)
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T: Scheduled> Default for RefreshQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scheduled> FromIterator<T> for RefreshQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Self::new();
        for item in iter {
            queue.enqueue(item);
        }
        queue
    }
}
