//! A keyed min-priority queue.
//!
//! `keyed_priority_queue` provides a max-queue, but the discrete-event
//! scheduler wants the event with the *smallest* timestamp first and
//! needs to remove cancelled events by key.  This wraps the underlying
//! queue with the ordering reversed.
use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;

use keyed_priority_queue::KeyedPriorityQueue;

#[derive(Debug)]
struct ReverseOrdered<T> {
    inner: T,
}

impl<T> From<T> for ReverseOrdered<T> {
    fn from(inner: T) -> ReverseOrdered<T> {
        ReverseOrdered { inner }
    }
}

impl<T: Ord> PartialOrd for ReverseOrdered<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Eq> Eq for ReverseOrdered<T> {}

impl<T: Eq> PartialEq for ReverseOrdered<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: Ord> Ord for ReverseOrdered<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner).reverse()
    }
}

pub struct KeyedReversePriorityQueue<K: Hash + Eq + Ord, P: Ord> {
    items: KeyedPriorityQueue<K, ReverseOrdered<P>>,
}

impl<K, P> KeyedReversePriorityQueue<K, P>
where
    K: Hash + Eq + Ord,
    P: Ord,
{
    #[must_use]
    pub fn new() -> KeyedReversePriorityQueue<K, P> {
        KeyedReversePriorityQueue {
            items: KeyedPriorityQueue::new(),
        }
    }

    /// The entry with the smallest priority value, if any.
    #[must_use]
    pub fn peek(&self) -> Option<(&K, &P)> {
        self.items.peek().map(|(k, p)| (k, &p.inner))
    }

    pub fn pop(&mut self) -> Option<(K, P)> {
        self.items.pop().map(|(k, p)| (k, p.inner))
    }

    /// Insert an entry, returning the previous priority if `key` was
    /// already queued.
    pub fn push(&mut self, key: K, priority: P) -> Option<P> {
        self.items
            .push(key, ReverseOrdered::from(priority))
            .map(|rd| rd.inner)
    }

    /// Remove the entry for `key`, returning its priority if it was
    /// queued.
    pub fn remove(&mut self, key: &K) -> Option<P> {
        self.items.remove_entry(key).map(|(_, p)| p.inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K, P> Default for KeyedReversePriorityQueue<K, P>
where
    K: Hash + Eq + Ord,
    P: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> Debug for KeyedReversePriorityQueue<K, P>
where
    K: Hash + Eq + Ord + Debug,
    P: Ord + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|(k, p)| (k, &p.inner)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_smallest_first() {
        let mut q = KeyedReversePriorityQueue::new();
        assert!(q.is_empty());
        q.push("late", 3400u64);
        q.push("soon", 170u64);
        q.push("now", 0u64);
        assert_eq!(q.len(), 3);
        assert_eq!(q.peek(), Some((&"now", &0)));
        assert_eq!(q.pop(), Some(("now", 0)));
        assert_eq!(q.pop(), Some(("soon", 170)));
        assert_eq!(q.pop(), Some(("late", 3400)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn push_replaces_existing_key() {
        let mut q = KeyedReversePriorityQueue::new();
        assert_eq!(q.push(1, 500u64), None);
        assert_eq!(q.push(1, 100u64), Some(500));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some((1, 100)));
    }

    #[test]
    fn remove_cancels_an_entry() {
        let mut q = KeyedReversePriorityQueue::new();
        q.push(1, 170u64);
        q.push(2, 340u64);
        assert_eq!(q.remove(&1), Some(170));
        assert_eq!(q.remove(&1), None);
        assert_eq!(q.pop(), Some((2, 340)));
    }
}
