//! Pluggable reduction recipes.
//!
//! A [`Collector`] packages four operations — supply a fresh accumulator,
//! fold one element in, optionally combine two accumulators, and finish
//! into the result — so a reduction can be named once and applied to any
//! stream, sequentially or through the parallel engine. The combiner is
//! what makes a collector parallel-capable: without one,
//! [`par_collect`](crate::Stream::par_collect) falls back to sequential
//! accumulation, since partial accumulators cannot be merged.
//!
//! [`collectors`] holds the built-in recipes plus the combinators
//! (`mapping`, `filtering`, `flat_mapping`, `teeing`, `partitioning_by`)
//! that adapt or compose other collectors.

use crate::stream::Stream;
use crate::Data;

type Op<I, O> = Box<dyn Fn(I) -> O + Send + Sync>;

/// A four-operation reduction: `supplier`, `accumulator`, optional
/// `combiner`, `finisher`.
///
/// For parallel use, the accumulator must be associative over the
/// combiner and the combiner must merge any two partial accumulations.
///
/// # Examples
///
/// ```
/// use rill::{collectors, Stream};
///
/// let csv = Stream::of([1, 2, 3]).collect_with(collectors::joining(","));
/// assert_eq!(csv, "1,2,3");
/// ```
pub struct Collector<T, A, R> {
    supplier: Box<dyn Fn() -> A + Send + Sync>,
    accumulator: Box<dyn Fn(A, T) -> A + Send + Sync>,
    combiner: Option<Box<dyn Fn(A, A) -> A + Send + Sync>>,
    finisher: Op<A, R>,
}

impl<T, A, R> Collector<T, A, R> {
    /// A sequential-only collector from its three required operations.
    pub fn new(
        supplier: impl Fn() -> A + Send + Sync + 'static,
        accumulator: impl Fn(A, T) -> A + Send + Sync + 'static,
        finisher: impl Fn(A) -> R + Send + Sync + 'static,
    ) -> Collector<T, A, R> {
        Collector {
            supplier: Box::new(supplier),
            accumulator: Box::new(accumulator),
            combiner: None,
            finisher: Box::new(finisher),
        }
    }

    /// Adds a combiner, making the collector parallel-capable.
    pub fn with_combiner(mut self, combiner: impl Fn(A, A) -> A + Send + Sync + 'static) -> Self {
        self.combiner = Some(Box::new(combiner));
        self
    }

    /// Whether the collector can merge partial accumulations.
    pub fn has_combiner(&self) -> bool {
        self.combiner.is_some()
    }

    pub(crate) fn supply(&self) -> A {
        (self.supplier)()
    }

    pub(crate) fn accumulate(&self, acc: A, item: T) -> A {
        (self.accumulator)(acc, item)
    }

    /// Merges two partials; the caller must have checked
    /// [`has_combiner`](Collector::has_combiner).
    pub(crate) fn combine(&self, a: A, b: A) -> A {
        (self.combiner.as_ref().expect("collector combiner"))(a, b)
    }

    pub(crate) fn finish(&self, acc: A) -> R {
        (self.finisher)(acc)
    }
}

impl<T: Data> Stream<T> {
    /// Runs a [`Collector`] over the stream.
    pub fn collect_with<A, R>(self, collector: Collector<T, A, R>) -> R {
        let mut acc = collector.supply();
        for x in self.iter {
            acc = collector.accumulate(acc, x);
        }
        collector.finish(acc)
    }
}

/// The built-in collectors and collector combinators.
pub mod collectors {
    use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
    use std::fmt::Display;
    use std::hash::Hash;
    use std::sync::Arc;

    use super::Collector;
    use crate::operators::aggregate::{cmp_from_less, interpolated_quantile, MaxFirst, MinFirst};
    use crate::operators::numeric::Numeric;
    use crate::stream::Stream;
    use crate::Data;

    /// Collects into a vector, upstream order preserved.
    pub fn to_vec<T: Send + 'static>() -> Collector<T, Vec<T>, Vec<T>> {
        Collector::new(
            Vec::new,
            |mut acc, x| {
                acc.push(x);
                acc
            },
            |acc| acc,
        )
        .with_combiner(|mut a, mut b| {
            a.append(&mut b);
            a
        })
    }

    /// Collects into a hash set.
    ///
    /// Iteration order over the result is unspecified, as usual for hash
    /// sets.
    pub fn to_hash_set<T: Send + Eq + Hash + 'static>() -> Collector<T, HashSet<T>, HashSet<T>> {
        Collector::new(
            HashSet::new,
            |mut acc, x| {
                acc.insert(x);
                acc
            },
            |acc| acc,
        )
        .with_combiner(|mut a, b| {
            a.extend(b);
            a
        })
    }

    /// Collects into an ordered set.
    pub fn to_tree_set<T: Send + Ord + 'static>() -> Collector<T, BTreeSet<T>, BTreeSet<T>> {
        Collector::new(
            BTreeSet::new,
            |mut acc, x| {
                acc.insert(x);
                acc
            },
            |acc| acc,
        )
        .with_combiner(|mut a, b| {
            a.extend(b);
            a
        })
    }

    /// Collects pairs into a map; later keys overwrite earlier ones.
    pub fn to_hash_map<K, V>() -> Collector<(K, V), HashMap<K, V>, HashMap<K, V>>
    where
        K: Send + Eq + Hash + 'static,
        V: Send + 'static,
    {
        Collector::new(
            HashMap::new,
            |mut acc, (k, v)| {
                acc.insert(k, v);
                acc
            },
            |acc| acc,
        )
        .with_combiner(|mut a, b| {
            a.extend(b);
            a
        })
    }

    /// Builds a map from projected keys and values, resolving key
    /// collisions with `merge`.
    pub fn to_map_merging<T, K, V>(
        key: impl Fn(&T) -> K + Send + Sync + 'static,
        value: impl Fn(T) -> V + Send + Sync + 'static,
        merge: impl Fn(V, V) -> V + Send + Sync + 'static,
    ) -> Collector<T, HashMap<K, V>, HashMap<K, V>>
    where
        T: Send + 'static,
        K: Send + Eq + Hash + 'static,
        V: Send + 'static,
    {
        let merge = Arc::new(merge);
        let merge_acc = Arc::clone(&merge);
        Collector::new(
            HashMap::new,
            move |mut acc: HashMap<K, V>, x| {
                let k = key(&x);
                let v = value(x);
                let v = match acc.remove(&k) {
                    Some(old) => merge_acc(old, v),
                    None => v,
                };
                acc.insert(k, v);
                acc
            },
            |acc| acc,
        )
        .with_combiner(move |mut a, b| {
            for (k, v) in b {
                let v = match a.remove(&k) {
                    Some(old) => merge(old, v),
                    None => v,
                };
                a.insert(k, v);
            }
            a
        })
    }

    /// Counts the elements.
    pub fn counting<T: Send + 'static>() -> Collector<T, usize, usize> {
        Collector::new(|| 0, |n, _| n + 1, |n| n).with_combiner(|a, b| a + b)
    }

    /// Sums numeric elements.
    pub fn summing<N: Numeric>() -> Collector<N, N, N> {
        Collector::new(|| N::ZERO, |a, b| a + b, |a| a).with_combiner(|a, b| a + b)
    }

    /// The minimum under `less`.
    pub fn min_by<T>(less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Collector<T, Option<T>, Option<T>>
    where
        T: Send + 'static,
    {
        let by = cmp_from_less(less);
        let by_combine = Arc::clone(&by);
        Collector::new(
            || None,
            move |acc, x| match acc {
                Some(best) if by(&best, &x) != std::cmp::Ordering::Greater => Some(best),
                _ => Some(x),
            },
            |acc| acc,
        )
        .with_combiner(move |a, b| match (a, b) {
            (Some(a), Some(b)) => {
                if by_combine(&b, &a) == std::cmp::Ordering::Less {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (a, b) => a.or(b),
        })
    }

    /// The maximum under `less`.
    pub fn max_by<T>(less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Collector<T, Option<T>, Option<T>>
    where
        T: Send + 'static,
    {
        let by = cmp_from_less(less);
        let by_combine = Arc::clone(&by);
        Collector::new(
            || None,
            move |acc, x| match acc {
                Some(best) if by(&x, &best) != std::cmp::Ordering::Greater => Some(best),
                _ => Some(x),
            },
            |acc| acc,
        )
        .with_combiner(move |a, b| match (a, b) {
            (Some(a), Some(b)) => {
                if by_combine(&a, &b) == std::cmp::Ordering::Less {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (a, b) => a.or(b),
        })
    }

    /// The first element, if any.
    ///
    /// Deterministic under the parallel engine only with ordered output.
    pub fn first<T: Send + 'static>() -> Collector<T, Option<T>, Option<T>> {
        Collector::new(|| None, |acc, x| acc.or(Some(x)), |acc| acc).with_combiner(|a, b| a.or(b))
    }

    /// The last element, if any.
    pub fn last<T: Send + 'static>() -> Collector<T, Option<T>, Option<T>> {
        Collector::new(|| None, |_, x| Some(x), |acc| acc).with_combiner(|a, b| b.or(a))
    }

    /// Reduces with an associative `op` from the identity `init`.
    pub fn reducing<T>(init: T, op: impl Fn(T, T) -> T + Send + Sync + 'static) -> Collector<T, T, T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let op_combine = Arc::clone(&op);
        Collector::new(move || init.clone(), move |a, b| op(a, b), |a| a)
            .with_combiner(move |a, b| op_combine(a, b))
    }

    /// Joins display forms with `separator`.
    pub fn joining<T: Display + Send + 'static>(separator: &str) -> Collector<T, Option<String>, String> {
        joining_full(separator, "", "")
    }

    /// Joins display forms with a separator inside a prefix and suffix.
    pub fn joining_full<T: Display + Send + 'static>(
        separator: &str,
        prefix: &str,
        suffix: &str,
    ) -> Collector<T, Option<String>, String> {
        let sep = separator.to_owned();
        let sep_combine = sep.clone();
        let prefix = prefix.to_owned();
        let suffix = suffix.to_owned();
        Collector::new(
            || None,
            move |acc: Option<String>, x: T| {
                Some(match acc {
                    None => x.to_string(),
                    Some(mut s) => {
                        s.push_str(&sep);
                        s.push_str(&x.to_string());
                        s
                    }
                })
            },
            move |acc| format!("{prefix}{}{suffix}", acc.unwrap_or_default()),
        )
        .with_combiner(move |a, b| match (a, b) {
            (Some(mut a), Some(b)) => {
                a.push_str(&sep_combine);
                a.push_str(&b);
                Some(a)
            }
            (a, b) => a.or(b),
        })
    }

    /// The `k` largest elements under `less`, largest first.
    pub fn top_k<T>(
        k: usize,
        less: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) -> Collector<T, BinaryHeap<MinFirst<T>>, Vec<T>>
    where
        T: Send + 'static,
    {
        let by = cmp_from_less(less);
        Collector::new(
            BinaryHeap::new,
            move |mut heap, x| {
                heap.push(MinFirst { item: x, by: Arc::clone(&by) });
                if heap.len() > k {
                    heap.pop();
                }
                heap
            },
            move |heap| heap.into_sorted_vec().into_iter().map(|e| e.item).take(k).collect(),
        )
        .with_combiner(move |mut a, b| {
            for entry in b {
                a.push(entry);
                if a.len() > k {
                    a.pop();
                }
            }
            a
        })
    }

    /// The `k` smallest elements under `less`, smallest first.
    pub fn bottom_k<T>(
        k: usize,
        less: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) -> Collector<T, BinaryHeap<MaxFirst<T>>, Vec<T>>
    where
        T: Send + 'static,
    {
        let by = cmp_from_less(less);
        Collector::new(
            BinaryHeap::new,
            move |mut heap, x| {
                heap.push(MaxFirst { item: x, by: Arc::clone(&by) });
                if heap.len() > k {
                    heap.pop();
                }
                heap
            },
            move |heap| heap.into_sorted_vec().into_iter().map(|e| e.item).take(k).collect(),
        )
        .with_combiner(move |mut a, b| {
            for entry in b {
                a.push(entry);
                if a.len() > k {
                    a.pop();
                }
            }
            a
        })
    }

    /// The linearly interpolated `q`-quantile of numeric elements.
    pub fn quantile<N: Numeric>(q: f64) -> Collector<N, Vec<f64>, Option<f64>> {
        Collector::new(
            Vec::new,
            |mut acc, x: N| {
                acc.push(x.as_f64());
                acc
            },
            move |acc| interpolated_quantile(acc, q),
        )
        .with_combiner(|mut a, mut b| {
            a.append(&mut b);
            a
        })
    }

    /// Occurrence counts per element.
    pub fn frequency<T>() -> Collector<T, HashMap<T, usize>, HashMap<T, usize>>
    where
        T: Send + Eq + Hash + 'static,
    {
        Collector::new(
            HashMap::new,
            |mut acc, x| {
                *acc.entry(x).or_insert(0) += 1;
                acc
            },
            |acc| acc,
        )
        .with_combiner(|mut a, b| {
            for (k, n) in b {
                *a.entry(k).or_insert(0) += n;
            }
            a
        })
    }

    /// Fixed-width bucket counts over `[lo, hi)`; out-of-range samples
    /// clamp into the edge buckets.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero or the range is not positive.
    pub fn histogram<N: Numeric>(lo: f64, hi: f64, buckets: usize) -> Collector<N, Vec<usize>, Vec<usize>> {
        assert!(buckets > 0, "histogram requires at least one bucket");
        assert!(hi > lo, "histogram range must be positive");
        let width = (hi - lo) / buckets as f64;
        Collector::new(
            move || vec![0; buckets],
            move |mut acc, x: N| {
                let at = ((x.as_f64() - lo) / width).floor();
                let at = (at.max(0.0) as usize).min(buckets - 1);
                acc[at] += 1;
                acc
            },
            |acc| acc,
        )
        .with_combiner(|mut a, b| {
            for (slot, n) in a.iter_mut().zip(b) {
                *slot += n;
            }
            a
        })
    }

    /// Splits elements by `predicate` into `(pass, fail)`.
    pub fn partitioning_by<T>(
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Collector<T, (Vec<T>, Vec<T>), (Vec<T>, Vec<T>)>
    where
        T: Send + 'static,
    {
        Collector::new(
            || (Vec::new(), Vec::new()),
            move |(mut pass, mut fail), x| {
                if predicate(&x) {
                    pass.push(x);
                } else {
                    fail.push(x);
                }
                (pass, fail)
            },
            |acc| acc,
        )
        .with_combiner(|(mut p1, mut f1), (mut p2, mut f2)| {
            p1.append(&mut p2);
            f1.append(&mut f2);
            (p1, f1)
        })
    }

    /// Adapts a collector of `U` to accept `T` through `f`.
    pub fn mapping<T, U, A, R>(
        f: impl Fn(T) -> U + Send + Sync + 'static,
        downstream: Collector<U, A, R>,
    ) -> Collector<T, A, R>
    where
        T: Send + 'static,
        U: Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        let parallel = downstream.has_combiner();
        let ds = Arc::new(downstream);
        let supply = Arc::clone(&ds);
        let accumulate = Arc::clone(&ds);
        let finish = Arc::clone(&ds);
        let mut built = Collector::new(
            move || supply.supply(),
            move |acc, x| accumulate.accumulate(acc, f(x)),
            move |acc| finish.finish(acc),
        );
        if parallel {
            built = built.with_combiner(move |a, b| ds.combine(a, b));
        }
        built
    }

    /// Filters elements before a downstream collector sees them.
    pub fn filtering<T, A, R>(
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        downstream: Collector<T, A, R>,
    ) -> Collector<T, A, R>
    where
        T: Send + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        let parallel = downstream.has_combiner();
        let ds = Arc::new(downstream);
        let supply = Arc::clone(&ds);
        let accumulate = Arc::clone(&ds);
        let finish = Arc::clone(&ds);
        let mut built = Collector::new(
            move || supply.supply(),
            move |acc, x| {
                if predicate(&x) {
                    accumulate.accumulate(acc, x)
                } else {
                    acc
                }
            },
            move |acc| finish.finish(acc),
        );
        if parallel {
            built = built.with_combiner(move |a, b| ds.combine(a, b));
        }
        built
    }

    /// Expands each element into a sub-stream before a downstream
    /// collector sees it.
    pub fn flat_mapping<T, U, A, R>(
        f: impl Fn(T) -> Stream<U> + Send + Sync + 'static,
        downstream: Collector<U, A, R>,
    ) -> Collector<T, A, R>
    where
        T: Send + 'static,
        U: Data,
        A: Send + 'static,
        R: Send + 'static,
    {
        let parallel = downstream.has_combiner();
        let ds = Arc::new(downstream);
        let supply = Arc::clone(&ds);
        let accumulate = Arc::clone(&ds);
        let finish = Arc::clone(&ds);
        let mut built = Collector::new(
            move || supply.supply(),
            move |mut acc, x| {
                for u in f(x).into_iter() {
                    acc = accumulate.accumulate(acc, u);
                }
                acc
            },
            move |acc| finish.finish(acc),
        );
        if parallel {
            built = built.with_combiner(move |a, b| ds.combine(a, b));
        }
        built
    }

    /// Feeds every element to two collectors and merges their results.
    pub fn teeing<T, A1, R1: 'static, A2, R2: 'static, R>(
        left: Collector<T, A1, R1>,
        right: Collector<T, A2, R2>,
        merge: impl Fn(R1, R2) -> R + Send + Sync + 'static,
    ) -> Collector<T, (A1, A2), R>
    where
        T: Clone + Send + 'static,
        A1: Send + 'static,
        A2: Send + 'static,
    {
        let parallel = left.has_combiner() && right.has_combiner();
        let left = Arc::new(left);
        let right = Arc::new(right);
        let supply = (Arc::clone(&left), Arc::clone(&right));
        let accumulate = (Arc::clone(&left), Arc::clone(&right));
        let finish = (Arc::clone(&left), Arc::clone(&right));
        let mut built = Collector::new(
            move || (supply.0.supply(), supply.1.supply()),
            move |(a1, a2), x: T| {
                let a1 = accumulate.0.accumulate(a1, x.clone());
                let a2 = accumulate.1.accumulate(a2, x);
                (a1, a2)
            },
            move |(a1, a2)| merge(finish.0.finish(a1), finish.1.finish(a2)),
        );
        if parallel {
            built = built.with_combiner(move |(a1, a2), (b1, b2)| {
                (left.combine(a1, b1), right.combine(a2, b2))
            });
        }
        built
    }
}

#[cfg(test)]
mod tests {
    use super::collectors;
    use crate::stream::Stream;

    #[test]
    fn basic_containers() {
        assert_eq!(Stream::of([1, 2]).collect_with(collectors::to_vec()), vec![1, 2]);
        assert_eq!(Stream::of([1, 1, 2]).collect_with(collectors::to_hash_set()).len(), 2);
        let sorted: Vec<i32> =
            Stream::of([3, 1, 2]).collect_with(collectors::to_tree_set()).into_iter().collect();
        assert_eq!(sorted, vec![1, 2, 3]);
        let map = Stream::of([(1, "a"), (1, "b")]).collect_with(collectors::to_hash_map());
        assert_eq!(map[&1], "b");
    }

    #[test]
    fn merging_map_resolves_collisions() {
        let merged = Stream::of(["apple", "avocado", "banana"])
            .collect_with(collectors::to_map_merging(|s: &&str| s.as_bytes()[0], |s| s.len(), |a, b| a + b));
        assert_eq!(merged[&b'a'], 12);
        assert_eq!(merged[&b'b'], 6);
    }

    #[test]
    fn scalar_collectors() {
        assert_eq!(Stream::of([1, 2, 3]).collect_with(collectors::counting()), 3);
        assert_eq!(Stream::of([1, 2, 3]).collect_with(collectors::summing()), 6);
        assert_eq!(Stream::of([3, 1, 2]).collect_with(collectors::min_by(|a, b| a < b)), Some(1));
        assert_eq!(Stream::of([3, 1, 2]).collect_with(collectors::max_by(|a, b| a < b)), Some(3));
        assert_eq!(Stream::of([7, 8]).collect_with(collectors::first()), Some(7));
        assert_eq!(Stream::of([7, 8]).collect_with(collectors::last()), Some(8));
        assert_eq!(Stream::of([1, 2, 3]).collect_with(collectors::reducing(0, |a, b| a + b)), 6);
    }

    #[test]
    fn joining_collectors() {
        assert_eq!(Stream::of(["a", "b"]).collect_with(collectors::joining("-")), "a-b");
        assert_eq!(
            Stream::of([1, 2]).collect_with(collectors::joining_full(", ", "[", "]")),
            "[1, 2]"
        );
        assert_eq!(Stream::<i32>::empty().collect_with(collectors::joining_full(",", "[", "]")), "[]");
    }

    #[test]
    fn rank_and_shape_collectors() {
        let less = |a: &i32, b: &i32| a < b;
        assert_eq!(Stream::of([5, 1, 9, 3]).collect_with(collectors::top_k(2, less)), vec![9, 5]);
        assert_eq!(Stream::of([5, 1, 9, 3]).collect_with(collectors::bottom_k(2, less)), vec![1, 3]);
        assert_eq!(Stream::of([1, 2, 3, 4]).collect_with(collectors::quantile(0.5)), Some(2.5));

        let hist = Stream::of([0.5_f64, 1.5, 1.6, 9.9, -3.0])
            .collect_with(collectors::histogram(0.0, 10.0, 5));
        assert_eq!(hist, vec![4, 0, 0, 0, 1]);

        let freq = Stream::from_chars("aab").collect_with(collectors::frequency());
        assert_eq!(freq[&'a'], 2);

        let (pass, fail) =
            Stream::of(1..=6).collect_with(collectors::partitioning_by(|n| n % 2 == 0));
        assert_eq!(pass, vec![2, 4, 6]);
        assert_eq!(fail, vec![1, 3, 5]);
    }

    #[test]
    fn combinators_compose() {
        let lengths = Stream::of(["a", "bbb", "cc"])
            .collect_with(collectors::mapping(|s: &str| s.len(), collectors::to_vec()));
        assert_eq!(lengths, vec![1, 3, 2]);

        let evens = Stream::of(1..=6)
            .collect_with(collectors::filtering(|n| n % 2 == 0, collectors::to_vec()));
        assert_eq!(evens, vec![2, 4, 6]);

        let expanded = Stream::of([1, 3])
            .collect_with(collectors::flat_mapping(|n| Stream::of([n, n + 1]), collectors::to_vec()));
        assert_eq!(expanded, vec![1, 2, 3, 4]);

        let (count, total) = Stream::of([1, 2, 3]).collect_with(collectors::teeing(
            collectors::counting(),
            collectors::summing(),
            |n, s| (n, s),
        ));
        assert_eq!((count, total), (3, 6));
    }

    #[test]
    fn parallel_collect_uses_the_combiner() {
        use crate::operators::parallel::ParallelOptions;

        let opts = ParallelOptions::with_concurrency(4).chunk_size(8);
        let out = Stream::of(1..=100).par_collect(&opts, collectors::to_vec());
        assert_eq!(out, (1..=100).collect::<Vec<_>>());

        let total = Stream::of(1..=100_i64).par_collect(&opts, collectors::summing());
        assert_eq!(total, 5050);
    }

    #[test]
    fn parallel_collect_without_combiner_falls_back() {
        use crate::collector::Collector;
        use crate::operators::parallel::ParallelOptions;

        let sequential_only: Collector<i32, Vec<i32>, usize> = Collector::new(
            Vec::new,
            |mut acc, x| {
                acc.push(x);
                acc
            },
            |acc| acc.len(),
        );
        let opts = ParallelOptions::with_concurrency(4);
        let n = Stream::of(1..=10).par_collect(&opts, sequential_only);
        assert_eq!(n, 10);
    }
}
