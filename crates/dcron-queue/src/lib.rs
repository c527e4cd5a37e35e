//! A min-heap of scheduling [`Entry`] records keyed by `next`, augmented with
//! an id→index map so a specific job's entry can be updated or removed in
//! `O(log n)` without scanning the heap — the direct translation of
//! `container/heap` plus an explicit index map, since `std::collections::BinaryHeap`
//! has no `Remove`/`Fix`-at-arbitrary-position operation.
//!
//! All operations are thread-safe: [`PriorityQueue::peek`] takes a shared
//! lock, every mutator takes an exclusive lock. Operations on an absent id
//! are silent — there is no error kind for "not found" here.

use chrono::{DateTime, Utc};
use dcron_core::JobId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A scheduling record: job id, fire times, and a back-reference sufficient
/// to invoke the job's run-callback. `C` is left generic so `dcron-queue`
/// doesn't need to know what a "run-callback" looks like.
#[derive(Debug, Clone)]
pub struct Entry<C> {
    pub job_id: JobId,
    pub next: DateTime<Utc>,
    pub prev: Option<DateTime<Utc>>,
    pub callback: C,
}

impl<C> Entry<C> {
    pub fn new(job_id: JobId, next: DateTime<Utc>, callback: C) -> Self {
        Self {
            job_id,
            next,
            prev: None,
            callback,
        }
    }
}

/// The unsynchronized heap. Kept private; [`PriorityQueue`] is the public,
/// lock-guarded surface.
struct IndexedHeap<C> {
    heap: Vec<Entry<C>>,
    index: HashMap<JobId, usize>,
}

impl<C> IndexedHeap<C> {
    fn new() -> Self {
        Self {
            heap: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.index.insert(self.heap[a].job_id.clone(), a);
        self.index.insert(self.heap[b].job_id.clone(), b);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].next < self.heap[parent].next {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < len && self.heap[left].next < self.heap[smallest].next {
                smallest = left;
            }
            if right < len && self.heap[right].next < self.heap[smallest].next {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    fn fix(&mut self, i: usize) {
        if i > 0 && self.heap[i].next < self.heap[(i - 1) / 2].next {
            self.sift_up(i);
        } else {
            self.sift_down(i);
        }
    }

    fn add(&mut self, entry: Entry<C>) {
        if let Some(&i) = self.index.get(&entry.job_id) {
            self.heap[i] = entry;
            self.fix(i);
        } else {
            let job_id = entry.job_id.clone();
            self.heap.push(entry);
            let i = self.heap.len() - 1;
            self.index.insert(job_id, i);
            self.sift_up(i);
        }
    }

    fn remove(&mut self, id: &JobId) -> bool {
        let Some(i) = self.index.remove(id) else {
            return false;
        };
        let last = self.heap.len() - 1;
        if i != last {
            self.heap.swap(i, last);
            self.index.insert(self.heap[i].job_id.clone(), i);
        }
        self.heap.pop();
        if i < self.heap.len() {
            self.fix(i);
        }
        true
    }

    fn pop(&mut self) -> Option<Entry<C>> {
        if self.heap.is_empty() {
            return None;
        }
        let id = self.heap[0].job_id.clone();
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let popped = self.heap.pop().expect("heap nonempty");
        self.index.remove(&id);
        if !self.heap.is_empty() {
            self.index.insert(self.heap[0].job_id.clone(), 0);
            self.sift_down(0);
        }
        Some(popped)
    }

    fn peek(&self) -> Option<&Entry<C>> {
        self.heap.first()
    }
}

/// Thread-safe priority queue of scheduling entries, keyed by ascending
/// `next`. Readers (`peek`, `len`) take a shared lock; mutators take an
/// exclusive lock.
pub struct PriorityQueue<C> {
    inner: RwLock<IndexedHeap<C>>,
}

impl<C: Clone> PriorityQueue<C> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexedHeap::new()),
        }
    }

    /// Inserts `entry`, or updates the existing entry for its id in place.
    pub fn add(&self, entry: Entry<C>) {
        self.inner.write().add(entry);
    }

    /// Alias for [`Self::add`] — update is the same operation as add for an
    /// id already present.
    pub fn update(&self, entry: Entry<C>) {
        self.add(entry);
    }

    /// The entry with the smallest `next`, without removing it.
    pub fn peek(&self) -> Option<Entry<C>> {
        self.inner.read().peek().cloned()
    }

    /// Removes and returns the entry with the smallest `next`.
    pub fn pop(&self) -> Option<Entry<C>> {
        self.inner.write().pop()
    }

    /// Removes the entry for `id`, if any. Returns whether it existed.
    pub fn remove(&self, id: &JobId) -> bool {
        self.inner.write().remove(id)
    }

    /// Number of entries currently queued.
    pub fn len(&self) -> usize {
        self.inner.read().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: Clone> Default for PriorityQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn peek_and_pop_return_ascending_next() {
        let q: PriorityQueue<()> = PriorityQueue::new();
        q.add(Entry::new(JobId::new("a"), at(30), ()));
        q.add(Entry::new(JobId::new("b"), at(10), ()));
        q.add(Entry::new(JobId::new("c"), at(20), ()));

        assert_eq!(q.peek().unwrap().job_id, JobId::new("b"));

        let mut order = Vec::new();
        while let Some(e) = q.pop() {
            order.push(e.job_id);
        }
        assert_eq!(
            order,
            vec![JobId::new("b"), JobId::new("c"), JobId::new("a")]
        );
    }

    #[test]
    fn duplicate_id_updates_next_instead_of_growing() {
        let q: PriorityQueue<()> = PriorityQueue::new();
        q.add(Entry::new(JobId::new("a"), at(100), ()));
        q.add(Entry::new(JobId::new("a"), at(5), ()));

        assert_eq!(q.len(), 1);
        assert_eq!(q.peek().unwrap().next, at(5));
    }

    #[test]
    fn remove_missing_id_is_silent() {
        let q: PriorityQueue<()> = PriorityQueue::new();
        assert!(!q.remove(&JobId::new("ghost")));
    }

    #[test]
    fn removing_the_minimum_exposes_the_new_minimum() {
        let q: PriorityQueue<()> = PriorityQueue::new();
        q.add(Entry::new(JobId::new("a"), at(10), ()));
        q.add(Entry::new(JobId::new("b"), at(20), ()));

        assert!(q.remove(&JobId::new("a")));
        assert_eq!(q.peek().unwrap().job_id, JobId::new("b"));
    }

    #[test]
    fn heap_order_holds_under_interleaved_mutation() {
        let q: PriorityQueue<()> = PriorityQueue::new();
        for i in 0..50 {
            q.add(Entry::new(
                JobId::new(format!("job-{i}")),
                at(50 - i),
                (),
            ));
        }
        q.remove(&JobId::new("job-0")); // was the maximum `next`, not the minimum
        q.add(Entry::new(JobId::new("job-10"), at(-100), ())); // now the minimum

        let mut prev = None;
        while let Some(e) = q.pop() {
            if let Some(p) = prev {
                assert!(e.next >= p, "pop order must be ascending");
            }
            prev = Some(e.next);
        }
    }

    #[test]
    fn removing_after_timer_cancellation_exposes_correct_new_minimum() {
        let q: PriorityQueue<()> = PriorityQueue::new();
        q.add(Entry::new(JobId::new("min"), at(1), ()));
        q.add(Entry::new(JobId::new("mid"), at(5), ()));
        q.add(Entry::new(JobId::new("max"), at(10), ()));

        assert!(q.remove(&JobId::new("min")));
        assert_eq!(q.peek().unwrap().next, at(5));
    }
}
