//! Thread-safe FIFO with per-key uniqueness, blocking dequeue, and a
//! distinguished "disposed" terminal state.
//!
//! The queue's contract is synchronous blocking-with-timeout-and-cancellation,
//! which maps directly onto `std::sync::{Mutex, Condvar}` rather than an
//! async notifier: callers (producer threads enqueueing requests, and the
//! pipeline's worker thread dequeueing them) are not necessarily running on
//! an async executor, and the blocking semantics are the contract, not an
//! implementation detail (spec.md §4.6, §5).

use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
    sync::{Condvar, Mutex},
    time::{Duration, Instant},
};

use crate::error::QueueError;

/// Whether a duplicate key is rejected or admitted at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Reject the item if its key already has a pending occurrence.
    EnforceUnique,
    /// Always admit the item regardless of existing occurrences.
    AllowDuplicate,
}

/// Outcome of a [`KeyedQueue::enqueue_batch`] call.
#[derive(Debug)]
pub struct BatchOutcome<V> {
    /// Number of items admitted to the queue.
    pub accepted: usize,
    /// Number of items rejected by `EnforceUnique` duplicate detection.
    pub skipped: usize,
    /// Items whose key-selector raised an error, paired with that error.
    pub failures: Vec<(V, QueueError)>,
}

struct Inner<K, V> {
    items: VecDeque<(K, V)>,
    counts: HashMap<K, usize>,
    disposed: bool,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn push(&mut self, key: K, item: V) {
        *self.counts.entry(key.clone()).or_insert(0) += 1;
        self.items.push_back((key, item));
    }

    fn pop_front(&mut self) -> Option<(K, V)> {
        let entry = self.items.pop_front()?;
        self.decrement(&entry.0);
        Some(entry)
    }

    fn decrement(&mut self, key: &K) {
        if let Some(count) = self.counts.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(key);
            }
        }
    }
}

/// A FIFO queue of `V` items, each associated with a `K` key supplied by the
/// caller at enqueue time. Per-key occurrence counts are tracked alongside
/// the queue so duplicate detection and key-scoped queries are O(1).
///
/// Invariants upheld by every operation (spec.md §4.6):
/// - `sum(per_key_count) == len()`
/// - no key is present in the count map with a count of zero
/// - every operation on a disposed queue fails with [`QueueError::Disposed`]
/// - `clear` and `dispose` wake every blocked waiter
pub struct KeyedQueue<K, V> {
    inner: Mutex<Inner<K, V>>,
    not_empty: Condvar,
}

/// Interval at which a blocking wait re-checks its predicate and cancellation
/// token even when no deadline has elapsed, so cancellation is observed
/// promptly without busy-waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A cooperative cancellation flag shared between a blocking waiter and
/// whoever wants to wake it early (e.g. the pipeline's `close()`).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancelToken {
    /// Creates a fresh, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of any blocking wait holding this token.
    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Returns whether [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl<K, V> Default for KeyedQueue<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyedQueue<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty, non-disposed queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { items: VecDeque::new(), counts: HashMap::new(), disposed: false }),
            not_empty: Condvar::new(),
        }
    }

    /// Enqueues `item` under `key`. In [`DuplicatePolicy::EnforceUnique`]
    /// mode, returns `Ok(false)` without mutating the queue if `key` already
    /// has a pending occurrence (spec.md §7: "not an error").
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn enqueue(&self, key: K, item: V, policy: DuplicatePolicy) -> Result<bool, QueueError> {
        let mut guard = self.lock()?;
        if policy == DuplicatePolicy::EnforceUnique && guard.counts.contains_key(&key) {
            return Ok(false);
        }
        guard.push(key, item);
        drop(guard);
        self.not_empty.notify_all();
        Ok(true)
    }

    /// Enqueues every item produced by `select_key`, one lock acquisition for
    /// the whole batch. A key-selector failure for one item does not abort
    /// the rest of the batch; it is recorded in
    /// [`BatchOutcome::failures`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn enqueue_batch<F>(
        &self,
        items: Vec<V>,
        mut select_key: F,
        policy: DuplicatePolicy,
    ) -> Result<BatchOutcome<V>, QueueError>
    where
        F: FnMut(&V) -> Result<K, QueueError>,
    {
        let mut guard = self.lock()?;
        let mut outcome = BatchOutcome { accepted: 0, skipped: 0, failures: Vec::new() };
        for item in items {
            match select_key(&item) {
                Ok(key) => {
                    if policy == DuplicatePolicy::EnforceUnique && guard.counts.contains_key(&key) {
                        outcome.skipped += 1;
                    } else {
                        guard.push(key, item);
                        outcome.accepted += 1;
                    }
                },
                Err(err) => outcome.failures.push((item, err)),
            }
        }
        drop(guard);
        if outcome.accepted > 0 {
            self.not_empty.notify_all();
        }
        Ok(outcome)
    }

    /// Removes and returns the front item, or `None` if the queue is empty.
    /// Does not block.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn dequeue(&self) -> Result<Option<V>, QueueError> {
        let mut guard = self.lock()?;
        Ok(guard.pop_front().map(|(_, item)| item))
    }

    /// Removes and returns the front item, blocking until one is available,
    /// `timeout` elapses, or `cancel` is signalled. `timeout = None` blocks
    /// indefinitely (subject to cancellation); `timeout = Some(Duration::ZERO)`
    /// behaves like [`Self::dequeue`].
    ///
    /// Returns `Ok(None)` on timeout or cancellation, not an error — matching
    /// `EnforceUnique` rejection, a "did not happen" outcome is distinct from
    /// a fault.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue was or becomes disposed
    /// while waiting.
    pub fn dequeue_blocking(
        &self,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<Option<V>, QueueError> {
        self.wait_for(timeout, cancel, Inner::pop_front)
    }

    /// Returns a clone of the front item without removing it, blocking like
    /// [`Self::dequeue_blocking`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue was or becomes disposed
    /// while waiting.
    pub fn peek_blocking(
        &self,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<Option<V>, QueueError>
    where
        V: Clone,
    {
        self.wait_for(timeout, cancel, |inner| inner.items.front().map(|(_, v)| v.clone()))
    }

    /// Returns a clone of the front item without removing it, or `None` if
    /// the queue is empty. Does not block.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn peek(&self) -> Result<Option<V>, QueueError>
    where
        V: Clone,
    {
        let guard = self.lock()?;
        Ok(guard.items.front().map(|(_, v)| v.clone()))
    }

    fn wait_for<T>(
        &self,
        timeout: Option<Duration>,
        cancel: &CancelToken,
        mut take: impl FnMut(&mut Inner<K, V>) -> Option<T>,
    ) -> Result<Option<T>, QueueError> {
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut guard = self.lock()?;
        loop {
            if let Some(value) = take(&mut guard) {
                return Ok(Some(value));
            }
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let wait_for = match deadline {
                Some(dl) => {
                    let now = Instant::now();
                    if now >= dl {
                        return Ok(None);
                    }
                    (dl - now).min(POLL_INTERVAL)
                },
                None => POLL_INTERVAL,
            };
            let (next_guard, _timed_out) = self
                .not_empty
                .wait_timeout(guard, wait_for)
                .map_err(|_| QueueError::Disposed)?;
            guard = next_guard;
            if guard.disposed {
                return Err(QueueError::Disposed);
            }
        }
    }

    /// Returns whether any item with `key` is currently pending.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn contains_key(&self, key: &K) -> Result<bool, QueueError> {
        Ok(self.lock()?.counts.contains_key(key))
    }

    /// Returns the number of pending items with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn count_for_key(&self, key: &K) -> Result<usize, QueueError> {
        Ok(self.lock()?.counts.get(key).copied().unwrap_or(0))
    }

    /// Removes the first pending item with `key`, preserving the relative
    /// order of the rest.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn remove_first_by_key(&self, key: &K) -> Result<Option<V>, QueueError> {
        let mut guard = self.lock()?;
        let Some(pos) = guard.items.iter().position(|(k, _)| k == key) else {
            return Ok(None);
        };
        let Some((removed_key, item)) = guard.items.remove(pos) else {
            return Ok(None);
        };
        guard.decrement(&removed_key);
        Ok(Some(item))
    }

    /// Removes every pending item with `key`, preserving the relative order
    /// of the rest.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn remove_all_by_key(&self, key: &K) -> Result<Vec<V>, QueueError> {
        let mut guard = self.lock()?;
        let mut kept = VecDeque::with_capacity(guard.items.len());
        let mut taken = Vec::new();
        for entry in guard.items.drain(..) {
            if &entry.0 == key {
                taken.push(entry.1);
            } else {
                kept.push_back(entry);
            }
        }
        guard.items = kept;
        guard.counts.remove(key);
        Ok(taken)
    }

    /// Discards every pending item and wakes all blocked waiters. Does not
    /// dispose the queue; further enqueues are still accepted.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn clear(&self) -> Result<(), QueueError> {
        let mut guard = self.lock()?;
        guard.items.clear();
        guard.counts.clear();
        drop(guard);
        tracing::info!("keyed queue cleared");
        self.not_empty.notify_all();
        Ok(())
    }

    /// Releases any excess backing capacity. A no-op for correctness, a hint
    /// for memory: `VecDeque`/`HashMap` over-allocate under churn.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn trim_excess(&self) -> Result<(), QueueError> {
        let mut guard = self.lock()?;
        guard.items.shrink_to_fit();
        guard.counts.shrink_to_fit();
        Ok(())
    }

    /// Returns a snapshot clone of every pending item, in FIFO order.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn snapshot(&self) -> Result<Vec<V>, QueueError>
    where
        V: Clone,
    {
        Ok(self.lock()?.items.iter().map(|(_, v)| v.clone()).collect())
    }

    /// Returns a snapshot clone of every distinct pending key.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn key_snapshot(&self) -> Result<Vec<K>, QueueError>
    where
        K: Clone,
    {
        Ok(self.lock()?.counts.keys().cloned().collect())
    }

    /// Number of pending items.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.items.len())
    }

    /// Whether no items are pending.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] if the queue has been disposed.
    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    /// Discards every pending item and marks the queue disposed: every
    /// subsequent operation fails with [`QueueError::Disposed`]. Wakes every
    /// blocked waiter, which observe the disposal and return the error.
    pub fn dispose(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.items.clear();
            guard.counts.clear();
            guard.disposed = true;
        }
        tracing::info!("keyed queue disposed");
        self.not_empty.notify_all();
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner<K, V>>, QueueError> {
        // A poisoned mutex (panic while held) is treated the same as
        // disposal: the queue's invariants can no longer be trusted.
        let guard = self.inner.lock().map_err(|_| QueueError::Disposed)?;
        if guard.disposed {
            return Err(QueueError::Disposed);
        }
        Ok(guard)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn enforce_unique_rejects_duplicate_key() {
        let queue: KeyedQueue<u32, &str> = KeyedQueue::new();
        assert!(queue.enqueue(1, "a", DuplicatePolicy::EnforceUnique).unwrap());
        assert!(!queue.enqueue(1, "b", DuplicatePolicy::EnforceUnique).unwrap());
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn allow_duplicate_always_admits() {
        let queue: KeyedQueue<u32, &str> = KeyedQueue::new();
        assert!(queue.enqueue(1, "a", DuplicatePolicy::AllowDuplicate).unwrap());
        assert!(queue.enqueue(1, "b", DuplicatePolicy::AllowDuplicate).unwrap());
        assert_eq!(queue.count_for_key(&1).unwrap(), 2);
    }

    #[test]
    fn dequeue_is_fifo_and_updates_counts() {
        let queue: KeyedQueue<u32, &str> = KeyedQueue::new();
        queue.enqueue(1, "a", DuplicatePolicy::AllowDuplicate).unwrap();
        queue.enqueue(2, "b", DuplicatePolicy::AllowDuplicate).unwrap();
        assert_eq!(queue.dequeue().unwrap(), Some("a"));
        assert!(!queue.contains_key(&1).unwrap());
        assert!(queue.contains_key(&2).unwrap());
    }

    #[test]
    fn batch_enqueue_reports_accepted_skipped_and_failures() {
        let queue: KeyedQueue<u32, u32> = KeyedQueue::new();
        queue.enqueue(0, 0, DuplicatePolicy::EnforceUnique).unwrap();
        let outcome = queue
            .enqueue_batch(
                vec![0, 1, 2],
                |item| if *item == 2 { Err(QueueError::KeySelector("bad".into())) } else { Ok(*item) },
                DuplicatePolicy::EnforceUnique,
            )
            .unwrap();
        assert_eq!(outcome.accepted, 1); // item 1
        assert_eq!(outcome.skipped, 1); // item 0, duplicate of the pre-existing key
        assert_eq!(outcome.failures.len(), 1); // item 2
    }

    #[test]
    fn remove_all_by_key_preserves_order_of_survivors() {
        let queue: KeyedQueue<u32, char> = KeyedQueue::new();
        queue.enqueue(1, 'a', DuplicatePolicy::AllowDuplicate).unwrap();
        queue.enqueue(2, 'b', DuplicatePolicy::AllowDuplicate).unwrap();
        queue.enqueue(1, 'c', DuplicatePolicy::AllowDuplicate).unwrap();
        queue.enqueue(3, 'd', DuplicatePolicy::AllowDuplicate).unwrap();

        let removed = queue.remove_all_by_key(&1).unwrap();
        assert_eq!(removed, vec!['a', 'c']);
        assert_eq!(queue.snapshot().unwrap(), vec!['b', 'd']);
        assert!(!queue.contains_key(&1).unwrap());
    }

    #[test]
    fn dispose_fails_further_operations() {
        let queue: KeyedQueue<u32, &str> = KeyedQueue::new();
        queue.enqueue(1, "a", DuplicatePolicy::AllowDuplicate).unwrap();
        queue.dispose();
        assert_eq!(queue.enqueue(2, "b", DuplicatePolicy::AllowDuplicate), Err(QueueError::Disposed));
        assert_eq!(queue.dequeue(), Err(QueueError::Disposed));
    }

    #[test]
    fn dequeue_blocking_times_out_on_empty_queue() {
        let queue: KeyedQueue<u32, &str> = KeyedQueue::new();
        let cancel = CancelToken::new();
        let result = queue.dequeue_blocking(Some(Duration::from_millis(30)), &cancel).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn dequeue_blocking_wakes_on_enqueue_from_another_thread() {
        let queue = Arc::new(KeyedQueue::<u32, &str>::new());
        let cancel = CancelToken::new();
        let waiter = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || queue.dequeue_blocking(Some(Duration::from_secs(5)), &cancel))
        };
        thread::sleep(Duration::from_millis(20));
        queue.enqueue(1, "a", DuplicatePolicy::AllowDuplicate).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), Some("a"));
    }

    #[test]
    fn dispose_wakes_blocked_waiter_with_disposed_error() {
        let queue = Arc::new(KeyedQueue::<u32, &str>::new());
        let cancel = CancelToken::new();
        let waiter = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || queue.dequeue_blocking(Some(Duration::from_secs(5)), &cancel))
        };
        thread::sleep(Duration::from_millis(20));
        queue.dispose();
        assert_eq!(waiter.join().unwrap(), Err(QueueError::Disposed));
    }

    #[test]
    fn cancel_token_wakes_blocked_waiter_without_disposing() {
        let queue = Arc::new(KeyedQueue::<u32, &str>::new());
        let cancel = CancelToken::new();
        let waiter = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || queue.dequeue_blocking(None, &cancel))
        };
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        assert_eq!(waiter.join().unwrap().unwrap(), None);
        assert!(queue.is_empty().unwrap()); // cancellation, not disposal: queue remains usable
    }

    proptest! {
        #[test]
        fn sum_of_key_counts_equals_queue_size(
            ops in proptest::collection::vec(0u32..6, 1..200),
        ) {
            let queue: KeyedQueue<u32, u32> = KeyedQueue::new();
            for (i, key) in ops.iter().enumerate() {
                if i % 3 == 2 {
                    let _ = queue.dequeue().unwrap();
                } else {
                    let _ = queue.enqueue(*key, *key, DuplicatePolicy::AllowDuplicate).unwrap();
                }
                let len = queue.len().unwrap();
                let keys = queue.key_snapshot().unwrap();
                let sum: usize = keys.iter().map(|k| queue.count_for_key(k).unwrap()).sum();
                prop_assert_eq!(sum, len);
                for key in &keys {
                    prop_assert!(queue.count_for_key(key).unwrap() > 0);
                }
            }
        }
    }
}
