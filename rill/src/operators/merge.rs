//! Merging already-sorted inputs.
//!
//! Given inputs individually sorted under `cmp`, these operators emit the
//! globally sorted merge. The binary and n-ary linear variants scan the
//! input heads; the heap variant pays O(log n) per element and is the
//! right choice for many inputs. All three break ties toward the
//! lower-indexed input, so equal elements keep their input order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::seq::{boxed, BoxIter};
use crate::stream::Stream;
use crate::Data;

type Cmp<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

struct HeapEntry<T> {
    item: T,
    source: usize,
    by: Cmp<T>,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    // BinaryHeap pops its maximum; invert so the smallest item (then the
    // lowest source index) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.by)(&self.item, &other.item) {
            Ordering::Less => Ordering::Greater,
            Ordering::Greater => Ordering::Less,
            Ordering::Equal => other.source.cmp(&self.source),
        }
    }
}

impl<T: Data> Stream<T> {
    /// Merges two sorted streams into one sorted stream.
    ///
    /// Ties go to this stream, so the merge is stable across inputs.
    pub fn merge_sorted(
        self,
        other: Stream<T>,
        cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Stream<T> {
        let mut right = other.iter.peekable();
        self.wrap(move |it| {
            let mut left = it.peekable();
            boxed(std::iter::from_fn(move || match (left.peek(), right.peek()) {
                (Some(l), Some(r)) => {
                    if cmp(l, r) != Ordering::Greater {
                        left.next()
                    } else {
                        right.next()
                    }
                }
                (Some(_), None) => left.next(),
                (None, _) => right.next(),
            }))
        })
    }

    /// Merges `n` sorted streams by scanning their heads.
    ///
    /// Linear in the number of inputs per element; prefer
    /// [`merge_sorted_n_heap`](Stream::merge_sorted_n_heap) for many
    /// inputs. Ties go to the lower input index.
    pub fn merge_sorted_n(
        streams: Vec<Stream<T>>,
        cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Stream<T>
    where
        T: Clone,
    {
        let mut heads: Vec<_> = streams.into_iter().map(|s| s.iter.peekable()).collect();
        Stream::new(std::iter::from_fn(move || {
            let mut best: Option<(usize, T)> = None;
            for (i, head) in heads.iter_mut().enumerate() {
                let Some(x) = head.peek() else { continue };
                match &best {
                    // Strict Less keeps ties on the earlier input.
                    Some((_, b)) if cmp(x, b) == Ordering::Less => best = Some((i, x.clone())),
                    Some(_) => {}
                    None => best = Some((i, x.clone())),
                }
            }
            heads[best?.0].next()
        }))
    }

    /// Merges `n` sorted streams through a min-heap.
    ///
    /// O(log n) per element; equal elements pop in input-index order.
    pub fn merge_sorted_n_heap(
        streams: Vec<Stream<T>>,
        cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Stream<T> {
        let by: Cmp<T> = Arc::new(cmp);
        let mut sources: Vec<BoxIter<T>> = streams.into_iter().map(|s| s.iter).collect();
        let mut heap: BinaryHeap<HeapEntry<T>> = BinaryHeap::with_capacity(sources.len());
        for (source, it) in sources.iter_mut().enumerate() {
            if let Some(item) = it.next() {
                heap.push(HeapEntry { item, source, by: Arc::clone(&by) });
            }
        }
        Stream::new(std::iter::from_fn(move || {
            let entry = heap.pop()?;
            if let Some(item) = sources[entry.source].next() {
                heap.push(HeapEntry { item, source: entry.source, by: Arc::clone(&by) });
            }
            Some(entry.item)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_merge_is_stable() {
        let out = Stream::of([1, 3, 5]).merge_sorted(Stream::of([2, 3, 6]), Ord::cmp).collect();
        assert_eq!(out, vec![1, 2, 3, 3, 5, 6]);
    }

    #[test]
    fn heap_merge_round_robin() {
        let out = Stream::merge_sorted_n_heap(
            vec![Stream::of([1, 4, 7]), Stream::of([2, 5, 8]), Stream::of([3, 6, 9])],
            Ord::cmp,
        )
        .collect();
        assert_eq!(out, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn heap_merge_breaks_ties_by_input_index() {
        let out = Stream::merge_sorted_n_heap(
            vec![Stream::of([("b", 0)]), Stream::of([("a", 1), ("b", 1)]), Stream::of([("b", 2)])],
            |x, y| x.0.cmp(y.0),
        )
        .collect();
        assert_eq!(out, vec![("a", 1), ("b", 0), ("b", 1), ("b", 2)]);
    }

    #[test]
    fn linear_merge_matches_heap_merge() {
        let inputs = || vec![Stream::of([1, 2, 9]), Stream::of([0, 5]), Stream::of([3, 4, 5])];
        let linear = Stream::merge_sorted_n(inputs(), Ord::cmp).collect();
        let heaped = Stream::merge_sorted_n_heap(inputs(), Ord::cmp).collect();
        assert_eq!(linear, heaped);
        assert_eq!(linear, vec![0, 1, 2, 3, 4, 5, 5, 9]);
    }
}
