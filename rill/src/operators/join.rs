//! The join and cogroup engine over keyed streams.
//!
//! Each join indexes one side in a hash map (the right side, except for
//! `right_join` which mirrors) and then streams the other side lazily
//! against it. Within a key, matches cross-product in the indexed side's
//! encounter order. Key equality is the key type's `Eq`; absent values on
//! the outer side surface as `Option`.

use std::collections::VecDeque;
use std::hash::Hash;

use fnv::{FnvHashMap, FnvHashSet};
use smallvec::SmallVec;

use crate::seq::{boxed, deferred, BoxIter};
use crate::stream::Stream;
use crate::stream2::Stream2;
use crate::Data;

/// One drained side of a join: rows in encounter order plus a hash index
/// of row positions per key.
struct SideIndex<K, V> {
    rows: Vec<(K, V)>,
    by_key: FnvHashMap<K, SmallVec<[usize; 2]>>,
}

impl<K: Data + Clone + Eq + Hash, V: Data> SideIndex<K, V> {
    fn build(iter: BoxIter<(K, V)>) -> SideIndex<K, V> {
        let rows: Vec<(K, V)> = iter.collect();
        let mut by_key: FnvHashMap<K, SmallVec<[usize; 2]>> = FnvHashMap::default();
        for (at, (k, _)) in rows.iter().enumerate() {
            by_key.entry(k.clone()).or_default().push(at);
        }
        SideIndex { rows, by_key }
    }

    fn values_for(&self, key: &K) -> Option<impl Iterator<Item = &V>> {
        self.by_key.get(key).map(|positions| positions.iter().map(|&p| &self.rows[p].1))
    }
}

impl<K: Data + Clone + Eq + Hash, A: Data> Stream2<K, A> {
    /// Inner join: one `(key, (left, right))` row per matching pair.
    ///
    /// ```
    /// use rill::Stream2;
    ///
    /// let rows = Stream2::of_pairs([("a", 1), ("b", 2), ("c", 3)])
    ///     .join(Stream2::of_pairs([("a", "x"), ("c", "z")]))
    ///     .collect();
    /// assert_eq!(rows, vec![("a", (1, "x")), ("c", (3, "z"))]);
    /// ```
    pub fn join<B: Data + Clone>(self, right: Stream2<K, B>) -> Stream2<K, (A, B)>
    where
        A: Clone,
    {
        let right_iter = right.inner.iter;
        Stream2 {
            inner: self.inner.wrap(move |mut left| {
                deferred(move || {
                    let index = SideIndex::build(right_iter);
                    let mut pending: VecDeque<(K, (A, B))> = VecDeque::new();
                    boxed(std::iter::from_fn(move || loop {
                        if let Some(row) = pending.pop_front() {
                            return Some(row);
                        }
                        let (k, a) = left.next()?;
                        if let Some(matches) = index.values_for(&k) {
                            for b in matches {
                                pending.push_back((k.clone(), (a.clone(), b.clone())));
                            }
                        }
                    }))
                })
            }),
        }
    }

    /// Left join: every left row, matched rights or `None`.
    pub fn left_join<B: Data + Clone>(self, right: Stream2<K, B>) -> Stream2<K, (A, Option<B>)>
    where
        A: Clone,
    {
        let right_iter = right.inner.iter;
        Stream2 {
            inner: self.inner.wrap(move |mut left| {
                deferred(move || {
                    let index = SideIndex::build(right_iter);
                    let mut pending: VecDeque<(K, (A, Option<B>))> = VecDeque::new();
                    boxed(std::iter::from_fn(move || loop {
                        if let Some(row) = pending.pop_front() {
                            return Some(row);
                        }
                        let (k, a) = left.next()?;
                        match index.values_for(&k) {
                            Some(matches) => {
                                for b in matches {
                                    pending.push_back((k.clone(), (a.clone(), Some(b.clone()))));
                                }
                            }
                            None => return Some((k, (a, None))),
                        }
                    }))
                })
            }),
        }
    }

    /// Right join: every right row, matched lefts or `None`.
    ///
    /// The mirror of [`left_join`](Stream2::left_join): this side is
    /// indexed and the right side streams, so output follows the right
    /// side's order.
    pub fn right_join<B: Data + Clone>(self, right: Stream2<K, B>) -> Stream2<K, (Option<A>, B)>
    where
        A: Clone,
    {
        let left_iter = self.inner.iter;
        Stream2 {
            inner: right.inner.wrap(move |mut rows| {
                deferred(move || {
                    let index = SideIndex::build(left_iter);
                    let mut pending: VecDeque<(K, (Option<A>, B))> = VecDeque::new();
                    boxed(std::iter::from_fn(move || loop {
                        if let Some(row) = pending.pop_front() {
                            return Some(row);
                        }
                        let (k, b) = rows.next()?;
                        match index.values_for(&k) {
                            Some(matches) => {
                                for a in matches {
                                    pending.push_back((k.clone(), (Some(a.clone()), b.clone())));
                                }
                            }
                            None => return Some((k, (None, b))),
                        }
                    }))
                })
            }),
        }
    }

    /// Full join: matched rows once, then left-only rows in place, then
    /// right-only rows in their encounter order.
    pub fn full_join<B: Data + Clone>(self, right: Stream2<K, B>) -> Stream2<K, (Option<A>, Option<B>)>
    where
        A: Clone,
    {
        let right_iter = right.inner.iter;
        Stream2 {
            inner: self.inner.wrap(move |mut left| {
                deferred(move || {
                    let index = SideIndex::build(right_iter);
                    let mut matched: FnvHashSet<K> = FnvHashSet::default();
                    let mut pending: VecDeque<(K, (Option<A>, Option<B>))> = VecDeque::new();
                    let mut left_done = false;
                    let mut tail_at = 0;
                    boxed(std::iter::from_fn(move || loop {
                        if let Some(row) = pending.pop_front() {
                            return Some(row);
                        }
                        if !left_done {
                            match left.next() {
                                Some((k, a)) => match index.values_for(&k) {
                                    Some(matches) => {
                                        for b in matches {
                                            pending.push_back((k.clone(), (Some(a.clone()), Some(b.clone()))));
                                        }
                                        matched.insert(k);
                                    }
                                    None => return Some((k, (Some(a), None))),
                                },
                                None => left_done = true,
                            }
                            continue;
                        }
                        // Right-only tail, in the right side's encounter order.
                        while tail_at < index.rows.len() {
                            let (k, b) = &index.rows[tail_at];
                            tail_at += 1;
                            if !matched.contains(k) {
                                return Some((k.clone(), (None, Some(b.clone()))));
                            }
                        }
                        return None;
                    }))
                })
            }),
        }
    }

    /// Left join substituting `default` for missing right values.
    pub fn left_join_with<B: Data + Clone>(self, right: Stream2<K, B>, default: B) -> Stream2<K, (A, B)>
    where
        A: Clone,
    {
        self.left_join(right)
            .map_values(move |(a, b)| (a, b.unwrap_or_else(|| default.clone())))
    }

    /// Right join substituting `default` for missing left values.
    pub fn right_join_with<B: Data + Clone>(self, right: Stream2<K, B>, default: A) -> Stream2<K, (A, B)>
    where
        A: Clone,
    {
        self.right_join(right)
            .map_values(move |(a, b)| (a.unwrap_or_else(|| default.clone()), b))
    }

    /// The left rows whose keys appear on the right.
    pub fn semi_join<B: Data>(self, right: Stream2<K, B>) -> Stream2<K, A> {
        let right_iter = right.inner.iter;
        Stream2 {
            inner: self.inner.wrap(move |left| {
                deferred(move || {
                    let keys: FnvHashSet<K> = right_iter.map(|(k, _)| k).collect();
                    boxed(left.filter(move |(k, _)| keys.contains(k)))
                })
            }),
        }
    }

    /// The left rows whose keys do not appear on the right.
    pub fn anti_join<B: Data>(self, right: Stream2<K, B>) -> Stream2<K, A> {
        let right_iter = right.inner.iter;
        Stream2 {
            inner: self.inner.wrap(move |left| {
                deferred(move || {
                    let keys: FnvHashSet<K> = right_iter.map(|(k, _)| k).collect();
                    boxed(left.filter(move |(k, _)| !keys.contains(k)))
                })
            }),
        }
    }

    /// One record per key on either side, carrying both sides' full
    /// groups; a side with no rows for the key contributes an empty group.
    ///
    /// Keys enumerate in first-encounter order, left side first.
    pub fn cogroup<B: Data>(self, right: Stream2<K, B>) -> Stream2<K, (Vec<A>, Vec<B>)> {
        let right_iter = right.inner.iter;
        Stream2 {
            inner: self.inner.wrap(move |left| {
                deferred(move || {
                    let mut order: Vec<K> = Vec::new();
                    let mut groups: FnvHashMap<K, (Vec<A>, Vec<B>)> = FnvHashMap::default();
                    for (k, a) in left {
                        groups
                            .entry(k.clone())
                            .or_insert_with(|| {
                                order.push(k);
                                (Vec::new(), Vec::new())
                            })
                            .0
                            .push(a);
                    }
                    for (k, b) in right_iter {
                        groups
                            .entry(k.clone())
                            .or_insert_with(|| {
                                order.push(k);
                                (Vec::new(), Vec::new())
                            })
                            .1
                            .push(b);
                    }
                    boxed(order.into_iter().map(move |k| {
                        let g = groups.remove(&k).expect("every ordered key has a group");
                        (k, g)
                    }))
                })
            }),
        }
    }
}

impl<T: Data> Stream<T> {
    /// Inner join of element streams through key extractors.
    pub fn join_by<U: Data + Clone, K: Data + Clone + Eq + Hash>(
        self,
        other: Stream<U>,
        mut left_key: impl FnMut(&T) -> K + Send + 'static,
        mut right_key: impl FnMut(&U) -> K + Send + 'static,
    ) -> Stream2<K, (T, U)>
    where
        T: Clone,
    {
        Stream2::from_pairs(self.map(move |t| (left_key(&t), t)))
            .join(Stream2::from_pairs(other.map(move |u| (right_key(&u), u))))
    }

    /// Left join of element streams through key extractors.
    pub fn left_join_by<U: Data + Clone, K: Data + Clone + Eq + Hash>(
        self,
        other: Stream<U>,
        mut left_key: impl FnMut(&T) -> K + Send + 'static,
        mut right_key: impl FnMut(&U) -> K + Send + 'static,
    ) -> Stream2<K, (T, Option<U>)>
    where
        T: Clone,
    {
        Stream2::from_pairs(self.map(move |t| (left_key(&t), t)))
            .left_join(Stream2::from_pairs(other.map(move |u| (right_key(&u), u))))
    }

    /// Right join of element streams through key extractors.
    pub fn right_join_by<U: Data + Clone, K: Data + Clone + Eq + Hash>(
        self,
        other: Stream<U>,
        mut left_key: impl FnMut(&T) -> K + Send + 'static,
        mut right_key: impl FnMut(&U) -> K + Send + 'static,
    ) -> Stream2<K, (Option<T>, U)>
    where
        T: Clone,
    {
        Stream2::from_pairs(self.map(move |t| (left_key(&t), t)))
            .right_join(Stream2::from_pairs(other.map(move |u| (right_key(&u), u))))
    }

    /// The elements whose key appears in `other`.
    pub fn semi_join_by<U: Data, K: Data + Clone + Eq + Hash>(
        self,
        other: Stream<U>,
        mut left_key: impl FnMut(&T) -> K + Send + 'static,
        mut right_key: impl FnMut(&U) -> K + Send + 'static,
    ) -> Stream<T> {
        Stream2::from_pairs(self.map(move |t| (left_key(&t), t)))
            .semi_join(Stream2::from_pairs(other.map(move |u| (right_key(&u), u))))
            .values()
    }

    /// The elements whose key does not appear in `other`.
    pub fn anti_join_by<U: Data, K: Data + Clone + Eq + Hash>(
        self,
        other: Stream<U>,
        mut left_key: impl FnMut(&T) -> K + Send + 'static,
        mut right_key: impl FnMut(&U) -> K + Send + 'static,
    ) -> Stream<T> {
        Stream2::from_pairs(self.map(move |t| (left_key(&t), t)))
            .anti_join(Stream2::from_pairs(other.map(move |u| (right_key(&u), u))))
            .values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left() -> Stream2<&'static str, i32> {
        Stream2::of_pairs([("a", 1), ("b", 2), ("a", 3)])
    }

    fn right() -> Stream2<&'static str, char> {
        Stream2::of_pairs([("a", 'x'), ("c", 'y'), ("a", 'z')])
    }

    #[test]
    fn inner_join_crosses_within_key() {
        let rows = left().join(right()).collect();
        assert_eq!(
            rows,
            vec![("a", (1, 'x')), ("a", (1, 'z')), ("a", (3, 'x')), ("a", (3, 'z'))]
        );
    }

    #[test]
    fn left_join_keeps_all_left_rows() {
        let rows = left().left_join(right()).collect();
        assert_eq!(
            rows,
            vec![
                ("a", (1, Some('x'))),
                ("a", (1, Some('z'))),
                ("b", (2, None)),
                ("a", (3, Some('x'))),
                ("a", (3, Some('z'))),
            ]
        );
    }

    #[test]
    fn right_join_follows_right_order() {
        let rows = left().right_join(right()).collect();
        assert_eq!(
            rows,
            vec![
                ("a", (Some(1), 'x')),
                ("a", (Some(3), 'x')),
                ("c", (None, 'y')),
                ("a", (Some(1), 'z')),
                ("a", (Some(3), 'z')),
            ]
        );
    }

    #[test]
    fn full_join_appends_right_only_tail() {
        let rows = left().full_join(right()).collect();
        assert_eq!(
            rows,
            vec![
                ("a", (Some(1), Some('x'))),
                ("a", (Some(1), Some('z'))),
                ("b", (Some(2), None)),
                ("a", (Some(3), Some('x'))),
                ("a", (Some(3), Some('z'))),
                ("c", (None, Some('y'))),
            ]
        );
    }

    #[test]
    fn semi_and_anti_partition_the_left() {
        let semi = left().semi_join(right()).collect();
        let anti = left().anti_join(right()).collect();
        assert_eq!(semi, vec![("a", 1), ("a", 3)]);
        assert_eq!(anti, vec![("b", 2)]);
        assert_eq!(semi.len() + anti.len(), 3);
    }

    #[test]
    fn join_with_substitutes_defaults() {
        let rows = left().left_join_with(right(), '-').collect();
        assert_eq!(
            rows,
            vec![
                ("a", (1, 'x')),
                ("a", (1, 'z')),
                ("b", (2, '-')),
                ("a", (3, 'x')),
                ("a", (3, 'z')),
            ]
        );
    }

    #[test]
    fn cogroup_carries_both_groups() {
        let mut rows =
            Stream2::of_pairs([("a", 1), ("b", 2), ("a", 3)])
                .cogroup(Stream2::of_pairs([("a", "x"), ("c", "y")]))
                .collect();
        rows.sort_by_key(|(k, _)| *k);
        assert_eq!(
            rows,
            vec![
                ("a", (vec![1, 3], vec!["x"])),
                ("b", (vec![2], vec![])),
                ("c", (vec![], vec!["y"])),
            ]
        );
    }

    #[test]
    fn join_by_lifts_element_streams() {
        let rows = Stream::of([1_i32, 2, 3])
            .join_by(Stream::of([10_i32, 30]), |n| n % 10, |n| n / 10)
            .collect();
        assert_eq!(rows, vec![(1, (1, 10)), (3, (3, 30))]);
    }
}
