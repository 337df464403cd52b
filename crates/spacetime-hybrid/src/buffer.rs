//! Bounded, priority-ordered recommendation buffer.
//!
//! Below capacity every entry is kept. At capacity a new entry evicts the
//! current minimum only when its priority is strictly greater, so the buffer
//! always holds the top-K recommendations seen since the last `clear`.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use parking_lot::Mutex;
use tracing::warn;

use crate::recommendation::{RecommendationType, TopologyRecommendation};

pub const DEFAULT_CAPACITY: usize = 1000;

/// Heap entry. Orders by priority, then by *reverse* insertion sequence so
/// that among equal priorities the earliest-added ranks highest.
#[derive(Debug, Clone)]
struct Ranked {
    priority: f64,
    seq:      u64,
    rec:      TopologyRecommendation,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Min-heap: the root is the entry to evict next.
    heap:     BinaryHeap<Reverse<Ranked>>,
    next_seq: u64,
}

impl Inner {
    fn push(&mut self, rec: TopologyRecommendation, capacity: usize) -> bool {
        if !rec.priority.is_finite() {
            warn!(%rec, "recommendation with non-finite priority rejected");
            return false;
        }
        let entry = Ranked { priority: rec.priority, seq: self.next_seq, rec };
        self.next_seq += 1;

        if self.heap.len() < capacity {
            self.heap.push(Reverse(entry));
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(min)) if entry.priority > min.priority => {
                self.heap.pop();
                self.heap.push(Reverse(entry));
                true
            }
            _ => false,
        }
    }
}

/// Shared by all modules of a step; every operation takes one coarse lock.
#[derive(Debug)]
pub struct RecommendationBuffer {
    capacity: usize,
    inner:    Mutex<Inner>,
}

impl Default for RecommendationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecommendationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, inner: Mutex::new(Inner::default()) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if the recommendation was kept.
    pub fn add(&self, rec: TopologyRecommendation) -> bool {
        self.inner.lock().push(rec, self.capacity)
    }

    /// Add a batch under a single lock acquisition. Returns how many were kept.
    pub fn add_range<I>(&self, recs: I) -> usize
    where
        I: IntoIterator<Item = TopologyRecommendation>,
    {
        let mut inner = self.inner.lock();
        recs.into_iter()
            .map(|rec| inner.push(rec, self.capacity) as usize)
            .sum()
    }

    /// All entries, priority descending; equal priorities in insertion order.
    pub fn sorted(&self) -> Vec<TopologyRecommendation> {
        let mut entries: Vec<Ranked> = self
            .inner
            .lock()
            .heap
            .iter()
            .map(|Reverse(r)| r.clone())
            .collect();
        entries.sort_unstable_by(|a, b| b.cmp(a));
        entries.into_iter().map(|r| r.rec).collect()
    }

    /// Entries of one type, in the same order as [`Self::sorted`].
    pub fn by_type(&self, kind: RecommendationType) -> Vec<TopologyRecommendation> {
        self.sorted().into_iter().filter(|r| r.kind == kind).collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.heap.clear();
        inner.next_seq = 0;
    }

    pub fn count(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
