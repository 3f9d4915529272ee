//! Buffering operators: sorting, reversal, and tail selection.
//!
//! These must see their whole upstream before emitting, but the drain is
//! deferred to the first downstream pull so the pipeline stays lazy until
//! a terminal demands output. `drop_last` is the exception: it streams
//! through a delay line of `n` elements.

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::seq::{boxed, deferred};
use crate::stream::Stream;
use crate::Data;

impl<T: Data> Stream<T> {
    /// Emits the elements in ascending order. Not stable.
    pub fn sorted(self) -> Stream<T>
    where
        T: Ord,
    {
        self.sorted_by(Ord::cmp)
    }

    /// Emits the elements ordered by `cmp`. Not stable.
    pub fn sorted_by(self, cmp: impl Fn(&T, &T) -> Ordering + Send + 'static) -> Stream<T> {
        self.wrap(move |it| {
            deferred(move || {
                let mut buf: Vec<T> = it.collect();
                buf.sort_unstable_by(|a, b| cmp(a, b));
                boxed(buf.into_iter())
            })
        })
    }

    /// Emits the elements ordered by a derived key. Not stable.
    pub fn sorted_by_key<K>(self, mut key: impl FnMut(&T) -> K + Send + 'static) -> Stream<T>
    where
        K: Ord + Send + 'static,
    {
        self.wrap(move |it| {
            deferred(move || {
                let mut buf: Vec<T> = it.collect();
                buf.sort_unstable_by_key(|x| key(x));
                boxed(buf.into_iter())
            })
        })
    }

    /// Emits the elements in ascending order, preserving the relative
    /// order of equal elements.
    pub fn sorted_stable(self) -> Stream<T>
    where
        T: Ord,
    {
        self.sorted_stable_by(Ord::cmp)
    }

    /// Emits the elements ordered by `cmp`, preserving the relative order
    /// of elements that compare equal.
    pub fn sorted_stable_by(self, cmp: impl Fn(&T, &T) -> Ordering + Send + 'static) -> Stream<T> {
        self.wrap(move |it| {
            deferred(move || {
                let mut buf: Vec<T> = it.collect();
                buf.sort_by(|a, b| cmp(a, b));
                boxed(buf.into_iter())
            })
        })
    }

    /// Emits the elements ordered by a derived key, stably.
    pub fn sorted_stable_by_key<K>(self, mut key: impl FnMut(&T) -> K + Send + 'static) -> Stream<T>
    where
        K: Ord + Send + 'static,
    {
        self.wrap(move |it| {
            deferred(move || {
                let mut buf: Vec<T> = it.collect();
                buf.sort_by_key(|x| key(x));
                boxed(buf.into_iter())
            })
        })
    }

    /// Emits the elements in reverse upstream order.
    pub fn reverse(self) -> Stream<T> {
        self.wrap(|it| {
            deferred(move || {
                let buf: Vec<T> = it.collect();
                boxed(buf.into_iter().rev())
            })
        })
    }

    /// The final `n` elements, in upstream order.
    pub fn take_last(self, n: usize) -> Stream<T> {
        self.wrap(move |it| {
            deferred(move || {
                let mut tail: VecDeque<T> = VecDeque::with_capacity(n.min(1024));
                if n == 0 {
                    return boxed(std::iter::empty());
                }
                for x in it {
                    if tail.len() == n {
                        tail.pop_front();
                    }
                    tail.push_back(x);
                }
                boxed(tail.into_iter())
            })
        })
    }

    /// All but the final `n` elements, in upstream order.
    ///
    /// Streams through a delay line of `n` elements rather than draining
    /// upstream first.
    pub fn drop_last(self, n: usize) -> Stream<T> {
        self.wrap(move |mut it| {
            let mut held: VecDeque<T> = VecDeque::with_capacity(n.min(1024));
            boxed(std::iter::from_fn(move || loop {
                let x = it.next()?;
                held.push_back(x);
                if held.len() > n {
                    return held.pop_front();
                }
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_is_a_permutation_and_ordered() {
        let input = vec![3, 1, 4, 1, 5, 9, 2, 6];
        let out = Stream::of(input.clone()).sorted().collect();
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
        let mut expected = input;
        expected.sort_unstable();
        assert_eq!(out, expected);
    }

    #[test]
    fn stable_sort_preserves_equal_order() {
        let input = vec![("b", 1), ("a", 2), ("b", 3), ("a", 4)];
        let out = Stream::of(input).sorted_stable_by(|x, y| x.0.cmp(y.0)).collect();
        assert_eq!(out, vec![("a", 2), ("a", 4), ("b", 1), ("b", 3)]);
    }

    #[test]
    fn reverse_twice_is_identity() {
        let out = Stream::of([1, 2, 3]).reverse().reverse().collect();
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(Stream::of([1, 2, 3]).reverse().collect(), vec![3, 2, 1]);
    }

    #[test]
    fn tail_selection() {
        assert_eq!(Stream::of(1..=5).take_last(2).collect(), vec![4, 5]);
        assert_eq!(Stream::of(1..=5).take_last(0).count(), 0);
        assert_eq!(Stream::of(1..=3).take_last(9).collect(), vec![1, 2, 3]);
        assert_eq!(Stream::of(1..=5).drop_last(2).collect(), vec![1, 2, 3]);
        assert_eq!(Stream::of(1..=2).drop_last(9).count(), 0);
    }
}
