//! Keyed streams: the same algebra over `(key, value)` pairs.
//!
//! A [`Stream2`] wraps a stream whose element is a native `(K, V)` tuple
//! and adds key/value projections, per-key reductions, and grouping. The
//! join engine ([`operators::join`](crate::operators::join)) operates on
//! this type.

use std::collections::HashMap;
use std::hash::Hash;

use fnv::FnvHashMap;

use crate::context::Context;
use crate::seq::{boxed, deferred};
use crate::stream::Stream;
use crate::Data;

/// A stream of key-value pairs.
///
/// # Examples
///
/// ```
/// use rill::Stream2;
///
/// let totals = Stream2::of_pairs([("a", 1), ("b", 2), ("a", 3)])
///     .reduce_by_key(|x, y| x + y)
///     .collect();
/// assert_eq!(totals, vec![("a", 4), ("b", 2)]);
/// ```
pub struct Stream2<K, V> {
    pub(crate) inner: Stream<(K, V)>,
}

impl<K: Data, V: Data> Stream2<K, V> {
    /// A keyed stream over the given pairs.
    pub fn of_pairs<I>(pairs: I) -> Stream2<K, V>
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: Send + 'static,
    {
        Stream2 { inner: Stream::of(pairs) }
    }

    /// Lifts a pair stream into the keyed algebra.
    pub fn from_pairs(pairs: Stream<(K, V)>) -> Stream2<K, V> {
        Stream2 { inner: pairs }
    }

    /// Returns to the element-stream view.
    pub fn to_pairs(self) -> Stream<(K, V)> {
        self.inner
    }

    /// The keys, in order, duplicates retained.
    pub fn keys(self) -> Stream<K> {
        self.inner.map(|(k, _)| k)
    }

    /// The values, in order.
    pub fn values(self) -> Stream<V> {
        self.inner.map(|(_, v)| v)
    }

    /// Retains pairs satisfying `predicate`.
    pub fn filter(self, mut predicate: impl FnMut(&K, &V) -> bool + Send + 'static) -> Stream2<K, V> {
        Stream2 { inner: self.inner.filter(move |(k, v)| predicate(k, v)) }
    }

    /// Maps keys, leaving values in place.
    pub fn map_keys<K2: Data>(self, mut f: impl FnMut(K) -> K2 + Send + 'static) -> Stream2<K2, V> {
        Stream2 { inner: self.inner.map(move |(k, v)| (f(k), v)) }
    }

    /// Maps values, leaving keys in place.
    pub fn map_values<V2: Data>(self, mut f: impl FnMut(V) -> V2 + Send + 'static) -> Stream2<K, V2> {
        Stream2 { inner: self.inner.map(move |(k, v)| (k, f(v))) }
    }

    /// Maps whole pairs.
    pub fn map_pairs<K2: Data, V2: Data>(
        self,
        f: impl FnMut((K, V)) -> (K2, V2) + Send + 'static,
    ) -> Stream2<K2, V2> {
        Stream2 { inner: self.inner.map(f) }
    }

    /// Swaps keys and values.
    pub fn swap(self) -> Stream2<V, K> {
        Stream2 { inner: self.inner.map(|(k, v)| (v, k)) }
    }

    /// Observes each pair as it flows past.
    pub fn inspect(self, mut f: impl FnMut(&K, &V) + Send + 'static) -> Stream2<K, V> {
        Stream2 { inner: self.inner.inspect(move |(k, v)| f(k, v)) }
    }

    /// Passes pairs while `predicate` holds, then stops.
    pub fn take_while(
        self,
        mut predicate: impl FnMut(&K, &V) -> bool + Send + 'static,
    ) -> Stream2<K, V> {
        Stream2 { inner: self.inner.take_while(move |(k, v)| predicate(k, v)) }
    }

    /// Discards pairs while `predicate` holds, then passes the rest.
    pub fn skip_while(
        self,
        mut predicate: impl FnMut(&K, &V) -> bool + Send + 'static,
    ) -> Stream2<K, V> {
        Stream2 { inner: self.inner.skip_while(move |(k, v)| predicate(k, v)) }
    }

    /// Skips the first `n` pairs.
    pub fn skip(self, n: usize) -> Stream2<K, V> {
        Stream2 { inner: self.inner.skip(n) }
    }

    /// Passes at most `n` pairs.
    pub fn take(self, n: usize) -> Stream2<K, V> {
        Stream2 { inner: self.inner.take(n) }
    }

    /// Binds a cancellation token at this point of the chain.
    pub fn with_context(self, ctx: &Context) -> Stream2<K, V> {
        Stream2 { inner: self.inner.with_context(ctx) }
    }

    /// The first pair, pulling at most once.
    pub fn first(self) -> Option<(K, V)> {
        self.inner.first()
    }

    /// Combines pairs pairwise with `op`; `None` when empty.
    pub fn reduce(self, op: impl FnMut((K, V), (K, V)) -> (K, V)) -> Option<(K, V)> {
        self.inner.reduce(op)
    }

    /// Drains into a vector of pairs.
    pub fn collect(self) -> Vec<(K, V)> {
        self.inner.collect()
    }

    /// The number of pairs.
    pub fn count(self) -> usize {
        self.inner.count()
    }
}

impl<K: Data + Clone + Eq + Hash, V: Data> Stream2<K, V> {
    /// Retains the first pair seen for each key.
    pub fn distinct_keys(self) -> Stream2<K, V> {
        let mut seen = fnv::FnvHashSet::default();
        self.filter(move |k, _| seen.insert(k.clone()))
    }

    /// Combines the values of equal keys with `op`.
    ///
    /// The result has one pair per distinct key, keys in first-encounter
    /// order; values combine in upstream order.
    pub fn reduce_by_key(self, mut op: impl FnMut(V, V) -> V + Send + 'static) -> Stream2<K, V> {
        self.reduce_by_key_with(|| None, move |acc: Option<V>, v| match acc {
            Some(prev) => Some(op(prev, v)),
            None => Some(v),
        })
        .map_values(|v| v.expect("accumulator set on first value"))
    }

    /// Folds the values of equal keys into a per-key accumulator.
    ///
    /// `init` supplies a fresh accumulator per key; `acc` folds each value
    /// in upstream order. Keys emit in first-encounter order.
    pub fn reduce_by_key_with<A: Data>(
        self,
        init: impl Fn() -> A + Send + 'static,
        mut acc: impl FnMut(A, V) -> A + Send + 'static,
    ) -> Stream2<K, A> {
        let stream = self.inner;
        Stream2 {
            inner: stream.wrap(move |it| {
                deferred(move || {
                    let mut order: Vec<K> = Vec::new();
                    let mut slots: FnvHashMap<K, A> = FnvHashMap::default();
                    for (k, v) in it {
                        let slot = slots.entry(k.clone()).or_insert_with(|| {
                            order.push(k);
                            init()
                        });
                        *slot = acc(std::mem::replace(slot, init()), v);
                    }
                    boxed(order.into_iter().map(move |k| {
                        let a = slots.remove(&k).expect("every ordered key has a slot");
                        (k, a)
                    }))
                })
            }),
        }
    }

    /// Materialises the values of each key, keys in first-encounter order.
    pub fn group_values(self) -> Stream2<K, Vec<V>> {
        self.reduce_by_key_with(Vec::new, |mut group, v| {
            group.push(v);
            group
        })
    }

    /// Drains into a map; for duplicate keys the last value wins.
    pub fn to_map(self) -> HashMap<K, V> {
        self.inner.collect_into()
    }
}

impl<K: Data, V: Data + Clone + Eq + Hash> Stream2<K, V> {
    /// Retains the first pair seen for each value.
    pub fn distinct_values(self) -> Stream2<K, V> {
        let mut seen = fnv::FnvHashSet::default();
        self.filter(move |_, v| seen.insert(v.clone()))
    }
}

impl<K: Data, V: Data> From<Stream<(K, V)>> for Stream2<K, V> {
    fn from(pairs: Stream<(K, V)>) -> Stream2<K, V> {
        Stream2::from_pairs(pairs)
    }
}
