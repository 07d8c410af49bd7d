//! Bounded FIFO shared between producers and the export worker.
//!
//! One lock covers append, drain and length reads. Overflow is expressed as
//! data loss: a push onto a full queue drops the incoming record.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of offering a record to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Record appended; `len` is the queue length right after the append
    Accepted {
        /// Queue length including the new record
        len: usize,
    },
    /// Queue at capacity, record dropped
    Full,
}

/// Bounded queue of records.
pub struct BoundedQueue<R> {
    items: Mutex<VecDeque<R>>,
    capacity: usize,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl<R> std::fmt::Debug for BoundedQueue<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl<R> BoundedQueue<R> {
    /// Create a queue holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Append a record unless the queue is full.
    #[inline]
    pub fn push(&self, record: R) -> Admission {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            drop(items);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Admission::Full;
        }
        items.push_back(record);
        let len = items.len();
        drop(items);

        self.enqueued.fetch_add(1, Ordering::Relaxed);
        Admission::Accepted { len }
    }

    /// Remove up to `max` records from the head, preserving order.
    pub fn drain_batch(&self, max: usize) -> Vec<R> {
        let mut items = self.items.lock();
        let take = max.min(items.len());
        items.drain(..take).collect()
    }

    /// Discard everything queued, returning how many records were removed.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let removed = items.len();
        items.clear();
        removed
    }

    /// Current number of queued records
    #[inline]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Maximum number of queued records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records accepted since creation
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Records rejected because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_basic_operations() {
        let queue = BoundedQueue::new(8);

        assert_eq!(queue.push(1), Admission::Accepted { len: 1 });
        assert_eq!(queue.push(2), Admission::Accepted { len: 2 });
        assert_eq!(queue.push(3), Admission::Accepted { len: 3 });

        assert_eq!(queue.drain_batch(2), vec![1, 2]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_batch(10), vec![3]);
        assert!(queue.drain_batch(10).is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_overflow_handling() {
        let queue = BoundedQueue::new(2);

        assert!(matches!(queue.push("a"), Admission::Accepted { .. }));
        assert!(matches!(queue.push("b"), Admission::Accepted { .. }));
        assert_eq!(queue.push("c"), Admission::Full);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.enqueued(), 2);
        assert_eq!(queue.drain_batch(5), vec!["a", "b"]);
    }

    #[test]
    fn test_clear_reports_removed() {
        let queue = BoundedQueue::new(4);
        queue.push(1u8);
        queue.push(2u8);
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
    }
}
