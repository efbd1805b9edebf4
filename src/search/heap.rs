// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded top-N heap over scored results.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use super::SearchResult;

/// Keeps the `capacity` highest-similarity results offered to it.
///
/// Backed by a min-heap so the weakest entry is evicted in O(log n). Among
/// equal similarities the earliest offered entry ranks higher.
#[derive(Debug)]
pub struct TopNHeap {
    capacity: usize,
    next_seq: u64,
    heap: BinaryHeap<Reverse<Ranked>>,
}

#[derive(Debug)]
struct Ranked {
    seq: u64,
    result: SearchResult,
}

impl Ranked {
    fn rank(&self, other: &Self) -> Ordering {
        self.result
            .similarity
            .total_cmp(&other.result.similarity)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
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
        self.rank(other)
    }
}

impl TopNHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_seq: 0,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Offers a result; the weakest entry is dropped once over capacity.
    pub fn push(&mut self, result: SearchResult) {
        if self.capacity == 0 {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Ranked { seq, result }));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Drains the heap, best first.
    pub fn into_sorted_vec(self) -> Vec<SearchResult> {
        // Ascending order of Reverse<Ranked> is descending rank.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| ranked.result)
            .collect()
    }
}
