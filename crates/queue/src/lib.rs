//!
//! An integer-keyed priority queue that starts as a bucket array (cheap
//! pushes, cheap pops while keys are dense) and switches permanently to a
//! binary heap once the key range becomes sparse relative to the number of
//! stored elements.
//!

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::debug;

/// Below this density (`num_elements / (max_key_seen + 1)`) the queue
/// abandons the bucket array in favour of a binary heap.
const DEFAULT_DENSITY_THRESHOLD: f64 = 1.0 / 10.0;

#[derive(Debug, Clone)]
struct Entry<V> {
    key: usize,
    value: V,
}

impl<V> PartialEq for Entry<V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<V> Eq for Entry<V> {}

impl<V> PartialOrd for Entry<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V> Ord for Entry<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

enum Representation<V> {
    Buckets {
        buckets: Vec<Vec<V>>,
        /// Lowest bucket index known to (possibly) hold an element; `pop`
        /// resumes scanning from here instead of from zero.
        last_min: usize,
    },
    Heap(BinaryHeap<Reverse<Entry<V>>>),
}

/// See module documentation.
pub struct AdaptivePriorityQueue<V> {
    representation: Representation<V>,
    num_elements: usize,
    max_key_seen: usize,
    density_threshold: f64,
}

impl<V> AdaptivePriorityQueue<V> {
    pub fn new() -> AdaptivePriorityQueue<V> {
        AdaptivePriorityQueue {
            representation: Representation::Buckets {
                buckets: Vec::new(),
                last_min: 0,
            },
            num_elements: 0,
            max_key_seen: 0,
            density_threshold: DEFAULT_DENSITY_THRESHOLD,
        }
    }

    pub fn with_density_threshold(density_threshold: f64) -> AdaptivePriorityQueue<V> {
        AdaptivePriorityQueue {
            density_threshold,
            ..Self::new()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    pub fn len(&self) -> usize {
        self.num_elements
    }

    pub fn push(&mut self, key: usize, value: V) {
        self.max_key_seen = self.max_key_seen.max(key);
        self.num_elements += 1;

        match &mut self.representation {
            Representation::Buckets { buckets, last_min } => {
                if key >= buckets.len() {
                    buckets.resize_with(key + 1, Vec::new);
                }
                buckets[key].push(value);
                *last_min = (*last_min).min(key);
            }
            Representation::Heap(heap) => {
                heap.push(Reverse(Entry { key, value }));
            }
        }

        self.maybe_switch_to_heap();
    }

    /// Removes and returns the `(key, value)` pair with the smallest key.
    /// Ties are broken arbitrarily (last pushed within the bucket is popped
    /// first), matching a LIFO-within-bucket pop order.
    pub fn pop(&mut self) -> Option<(usize, V)> {
        match &mut self.representation {
            Representation::Buckets { buckets, last_min } => {
                while *last_min < buckets.len() && buckets[*last_min].is_empty() {
                    *last_min += 1;
                }

                if *last_min >= buckets.len() {
                    return None;
                }

                let value = buckets[*last_min].pop().expect("bucket was just found non-empty");
                self.num_elements -= 1;
                Some((*last_min, value))
            }
            Representation::Heap(heap) => heap.pop().map(|Reverse(entry)| {
                self.num_elements -= 1;
                (entry.key, entry.value)
            }),
        }
    }

    fn maybe_switch_to_heap(&mut self) {
        if matches!(self.representation, Representation::Heap(_)) {
            return;
        }

        let density = self.num_elements as f64 / (self.max_key_seen as f64 + 1.0);
        if density >= self.density_threshold {
            return;
        }

        debug!(
            "switching adaptive priority queue to heap representation at density {density:.4}"
        );

        let Representation::Buckets { buckets, .. } = std::mem::replace(
            &mut self.representation,
            Representation::Heap(BinaryHeap::new()),
        ) else {
            unreachable!("checked above that the representation is Buckets");
        };

        let mut heap = BinaryHeap::with_capacity(self.num_elements);
        for (key, bucket) in buckets.into_iter().enumerate() {
            for value in bucket {
                heap.push(Reverse(Entry { key, value }));
            }
        }

        self.representation = Representation::Heap(heap);
    }
}

impl<V> Default for AdaptivePriorityQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn pops_in_ascending_key_order() {
        let mut queue = AdaptivePriorityQueue::new();
        for (key, value) in [(5, "e"), (1, "a"), (3, "c"), (1, "a2"), (4, "d")] {
            queue.push(key, value);
        }

        let mut popped = Vec::new();
        while let Some((key, _value)) = queue.pop() {
            popped.push(key);
        }

        assert_eq!(popped, vec![1, 1, 3, 4, 5]);
    }

    #[test]
    fn empty_queue_pops_none() {
        let mut queue: AdaptivePriorityQueue<()> = AdaptivePriorityQueue::new();
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn switches_to_heap_when_sparse() {
        let mut queue = AdaptivePriorityQueue::with_density_threshold(0.5);
        queue.push(0, 'a');
        assert!(matches!(queue.representation, Representation::Buckets { .. }));

        // A single very large key makes the queue sparse; the representation
        // must flip to a heap and further operations must remain correct.
        queue.push(1_000_000, 'b');
        assert!(matches!(queue.representation, Representation::Heap(_)));

        assert_eq!(queue.pop(), Some((0, 'a')));
        assert_eq!(queue.pop(), Some((1_000_000, 'b')));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn never_switches_back_to_buckets() {
        let mut queue = AdaptivePriorityQueue::with_density_threshold(0.5);
        queue.push(0, 0);
        queue.push(1_000, 1);
        assert!(matches!(queue.representation, Representation::Heap(_)));

        // Pushing many dense, small keys should not cause a switch back.
        for key in 0..100 {
            queue.push(key, 2);
        }
        assert!(matches!(queue.representation, Representation::Heap(_)));
    }
}
