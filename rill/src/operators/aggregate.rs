//! Terminal aggregations beyond the core terminals.
//!
//! Rank selections (`top_k`, `bottom_k`) run through a bounded heap whose
//! entries carry their comparator, so only `k` elements stay resident.
//! Quantile-family terminals sort a drained copy. Map-building terminals
//! (`group_by`, `associate`, `count_by`, `frequency`) accumulate into
//! hash maps keyed by the caller's projection.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use crate::pair::Pair;
use crate::stream::Stream;
use crate::stream2::Stream2;
use crate::Data;

pub(crate) type Cmp<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

pub(crate) fn cmp_from_less<T>(less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Cmp<T> {
    Arc::new(move |a, b| {
        if less(a, b) {
            Ordering::Less
        } else if less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

/// Heap entry that surfaces the comparator's minimum first; used to keep
/// the `k` largest elements.
pub struct MinFirst<T> {
    pub(crate) item: T,
    pub(crate) by: Cmp<T>,
}

impl<T> PartialEq for MinFirst<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl<T> Eq for MinFirst<T> {}
impl<T> PartialOrd for MinFirst<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for MinFirst<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.by)(&other.item, &self.item)
    }
}

/// Heap entry that surfaces the comparator's maximum first; used to keep
/// the `k` smallest elements.
pub struct MaxFirst<T> {
    pub(crate) item: T,
    pub(crate) by: Cmp<T>,
}

impl<T> PartialEq for MaxFirst<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl<T> Eq for MaxFirst<T> {}
impl<T> PartialOrd for MaxFirst<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for MaxFirst<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.by)(&self.item, &other.item)
    }
}

pub(crate) fn top_k_of<T>(items: impl Iterator<Item = T>, k: usize, by: Cmp<T>) -> Vec<T> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<MinFirst<T>> = BinaryHeap::with_capacity(k + 1);
    for item in items {
        heap.push(MinFirst { item, by: Arc::clone(&by) });
        if heap.len() > k {
            heap.pop();
        }
    }
    // Ascending heap order is descending element order.
    heap.into_sorted_vec().into_iter().map(|e| e.item).collect()
}

pub(crate) fn bottom_k_of<T>(items: impl Iterator<Item = T>, k: usize, by: Cmp<T>) -> Vec<T> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<MaxFirst<T>> = BinaryHeap::with_capacity(k + 1);
    for item in items {
        heap.push(MaxFirst { item, by: Arc::clone(&by) });
        if heap.len() > k {
            heap.pop();
        }
    }
    heap.into_sorted_vec().into_iter().map(|e| e.item).collect()
}

/// Linear interpolation between the ranks bracketing `q`.
pub(crate) fn interpolated_quantile(mut values: Vec<f64>, q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let q = q.clamp(0.0, 1.0);
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}

/// Nearest-rank selection from a comparator-sorted copy.
fn nearest_rank<T>(mut items: Vec<T>, p: f64, by: &Cmp<T>) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    items.sort_by(|a, b| by(a, b));
    let n = items.len();
    let rank = ((p.clamp(0.0, 1.0) * n as f64).ceil() as usize).clamp(1, n);
    Some(items.swap_remove(rank - 1))
}

impl<T: Data> Stream<T> {
    /// The minimum under `cmp`.
    pub fn min_by(self, cmp: impl Fn(&T, &T) -> Ordering + Send + 'static) -> Option<T> {
        self.reduce(move |a, b| if cmp(&b, &a) == Ordering::Less { b } else { a })
    }

    /// The maximum under `cmp`.
    pub fn max_by(self, cmp: impl Fn(&T, &T) -> Ordering + Send + 'static) -> Option<T> {
        self.reduce(move |a, b| if cmp(&b, &a) == Ordering::Greater { b } else { a })
    }

    /// The minimum and maximum in one pass, or `None` when empty.
    pub fn min_max(self) -> Option<Pair<T, T>>
    where
        T: Clone + Ord,
    {
        self.fold(None, |acc: Option<Pair<T, T>>, x| {
            Some(match acc {
                None => Pair::new(x.clone(), x),
                Some(p) => {
                    let first = if x < p.first { x.clone() } else { p.first };
                    let second = if x > p.second { x } else { p.second };
                    Pair::new(first, second)
                }
            })
        })
    }

    /// The `k` largest elements under `less`, largest first.
    ///
    /// Returns `min(k, len)` elements.
    pub fn top_k(self, k: usize, less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Vec<T> {
        top_k_of(self.iter, k, cmp_from_less(less))
    }

    /// The `k` smallest elements under `less`, smallest first.
    pub fn bottom_k(self, k: usize, less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Vec<T> {
        bottom_k_of(self.iter, k, cmp_from_less(less))
    }

    /// The median under `less`: the nearest-rank 0.5 percentile.
    pub fn median(self, less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Option<T> {
        self.percentile(0.5, less)
    }

    /// The nearest-rank percentile for `p` in `[0, 1]`; ties resolve by
    /// sorted position.
    pub fn percentile(self, p: f64, less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Option<T> {
        let by = cmp_from_less(less);
        nearest_rank(self.collect(), p, &by)
    }

    /// The linearly interpolated `q`-quantile of the numeric elements.
    pub fn quantile(self, q: f64) -> Option<f64>
    where
        T: crate::operators::numeric::Numeric,
    {
        interpolated_quantile(self.iter.map(|x| x.as_f64()).collect(), q)
    }

    /// Concatenates the display forms with `separator` between elements.
    pub fn joining(self, separator: &str) -> String
    where
        T: Display,
    {
        self.joining_with(separator, "", "")
    }

    /// Concatenates display forms with a separator, wrapped in a prefix
    /// and suffix.
    pub fn joining_with(self, separator: &str, prefix: &str, suffix: &str) -> String
    where
        T: Display,
    {
        use std::fmt::Write;
        let mut out = String::from(prefix);
        for (i, x) in self.iter.enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            let _ = write!(out, "{x}");
        }
        out.push_str(suffix);
        out
    }

    /// Splits the elements into those passing and those failing
    /// `predicate`, preserving order within each side.
    pub fn partition_by(self, mut predicate: impl FnMut(&T) -> bool) -> (Vec<T>, Vec<T>) {
        let mut pass = Vec::new();
        let mut fail = Vec::new();
        for x in self.iter {
            if predicate(&x) {
                pass.push(x);
            } else {
                fail.push(x);
            }
        }
        (pass, fail)
    }

    /// How often each element occurs.
    pub fn frequency(self) -> HashMap<T, usize>
    where
        T: Eq + Hash,
    {
        let mut counts: HashMap<T, usize> = HashMap::new();
        for x in self.iter {
            *counts.entry(x).or_insert(0) += 1;
        }
        counts
    }

    /// Occurrence counts as a keyed stream, keys in first-encounter
    /// order.
    pub fn frequencies(self) -> Stream2<T, usize>
    where
        T: Clone + Eq + Hash,
    {
        Stream2::from_pairs(self.map(|x| (x, ()))).reduce_by_key_with(|| 0_usize, |n, ()| n + 1)
    }

    /// The `k` most frequent elements with their counts, most frequent
    /// first; equal counts keep first-encounter order.
    pub fn most_common(self, k: usize) -> Vec<Pair<T, usize>>
    where
        T: Clone + Eq + Hash,
    {
        let mut counted = self.frequencies().collect();
        counted.sort_by(|a, b| b.1.cmp(&a.1));
        counted.truncate(k);
        counted.into_iter().map(|(x, n)| Pair::new(x, n)).collect()
    }

    /// Builds a map from the key-value pairs `f` derives; later keys
    /// overwrite earlier ones.
    pub fn associate<K, V>(self, mut f: impl FnMut(T) -> (K, V)) -> HashMap<K, V>
    where
        K: Eq + Hash,
    {
        let mut out = HashMap::new();
        for x in self.iter {
            let (k, v) = f(x);
            out.insert(k, v);
        }
        out
    }

    /// Indexes elements by a derived key; later elements overwrite
    /// earlier ones.
    pub fn associate_by<K>(self, mut key: impl FnMut(&T) -> K) -> HashMap<K, T>
    where
        K: Eq + Hash,
    {
        self.associate(move |x| (key(&x), x))
    }

    /// Indexes elements by a derived key.
    pub fn index_by<K>(self, key: impl FnMut(&T) -> K) -> HashMap<K, T>
    where
        K: Eq + Hash,
    {
        self.associate_by(key)
    }

    /// Counts elements per derived key.
    pub fn count_by<K>(self, mut key: impl FnMut(&T) -> K) -> HashMap<K, usize>
    where
        K: Eq + Hash,
    {
        let mut counts: HashMap<K, usize> = HashMap::new();
        for x in self.iter {
            *counts.entry(key(&x)).or_insert(0) += 1;
        }
        counts
    }

    /// Groups elements by a derived key, preserving order within each
    /// group.
    pub fn group_by<K>(self, mut key: impl FnMut(&T) -> K) -> HashMap<K, Vec<T>>
    where
        K: Eq + Hash,
    {
        let mut groups: HashMap<K, Vec<T>> = HashMap::new();
        for x in self.iter {
            groups.entry(key(&x)).or_default().push(x);
        }
        groups
    }

    /// Groups by a derived key into any extendable map-like container.
    pub fn group_by_to<K, C>(self, key: impl FnMut(&T) -> K) -> C
    where
        K: Eq + Hash,
        C: Default + Extend<(K, Vec<T>)>,
    {
        let mut out = C::default();
        out.extend(self.group_by(key));
        out
    }

    /// Folds each key's elements into a per-key accumulation.
    pub fn group_fold<K, A>(
        self,
        mut key: impl FnMut(&T) -> K,
        init: A,
        mut op: impl FnMut(A, T) -> A,
    ) -> HashMap<K, A>
    where
        K: Eq + Hash,
        A: Clone,
    {
        let mut groups: HashMap<K, A> = HashMap::new();
        for x in self.iter {
            let slot = groups.entry(key(&x)).or_insert_with(|| init.clone());
            *slot = op(std::mem::replace(slot, init.clone()), x);
        }
        groups
    }

    /// Drains into a hash set.
    pub fn to_set(self) -> HashSet<T>
    where
        T: Eq + Hash,
    {
        self.collect_into()
    }

    /// Drains into an ordered set.
    pub fn to_sorted_set(self) -> BTreeSet<T>
    where
        T: Ord,
    {
        self.collect_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_selection() {
        let less = |a: &i32, b: &i32| a < b;
        assert_eq!(Stream::of([5, 1, 9, 3, 7]).top_k(3, less), vec![9, 7, 5]);
        assert_eq!(Stream::of([5, 1, 9, 3, 7]).bottom_k(2, less), vec![1, 3]);
        assert_eq!(Stream::of([5, 1]).top_k(9, less), vec![5, 1]);
        assert_eq!(Stream::of([5, 1]).top_k(0, less), Vec::<i32>::new());
    }

    #[test]
    fn percentile_is_nearest_rank() {
        let less = |a: &i32, b: &i32| a < b;
        let s = || Stream::of([15, 20, 35, 40, 50]);
        assert_eq!(s().percentile(0.05, less), Some(15));
        assert_eq!(s().percentile(0.30, less), Some(20));
        assert_eq!(s().percentile(0.40, less), Some(20));
        assert_eq!(s().percentile(1.0, less), Some(50));
        assert_eq!(s().median(less), Some(35));
        assert_eq!(Stream::<i32>::empty().median(less), None);
    }

    #[test]
    fn quantile_interpolates() {
        assert_eq!(Stream::of([1, 2, 3, 4]).quantile(0.5), Some(2.5));
        assert_eq!(Stream::of([1, 2, 3]).quantile(0.5), Some(2.0));
        assert_eq!(Stream::of([10]).quantile(0.9), Some(10.0));
        assert_eq!(Stream::<i32>::empty().quantile(0.5), None);
    }

    #[test]
    fn min_max_in_one_pass() {
        assert_eq!(Stream::of([3, 1, 4, 1, 5]).min_max(), Some(Pair::new(1, 5)));
        assert_eq!(Stream::<i32>::empty().min_max(), None);
        assert_eq!(Stream::of([2, 8]).min_by(|a, b| a.cmp(b)), Some(2));
        assert_eq!(Stream::of([2, 8]).max_by(|a, b| a.cmp(b)), Some(8));
    }

    #[test]
    fn joining_forms() {
        assert_eq!(Stream::of([1, 2, 3]).joining(", "), "1, 2, 3");
        assert_eq!(Stream::of([1, 2]).joining_with("-", "[", "]"), "[1-2]");
        assert_eq!(Stream::<i32>::empty().joining_with(",", "(", ")"), "()");
    }

    #[test]
    fn partition_matches_filters() {
        let even = |n: &i32| n % 2 == 0;
        let (pass, fail) = Stream::of(1..=6).partition_by(even);
        assert_eq!(pass, Stream::of(1..=6).filter(even).collect());
        assert_eq!(fail, Stream::of(1..=6).filter(move |n| !even(n)).collect());
    }

    #[test]
    fn counting_families() {
        let freq = Stream::from_chars("abracadabra").frequency();
        assert_eq!(freq[&'a'], 5);
        assert_eq!(freq[&'b'], 2);

        let common = Stream::from_chars("abracadabra").most_common(2);
        assert_eq!(common[0], Pair::new('a', 5));
        assert_eq!(common[1].second, 2);

        let by_len = Stream::of(["a", "bb", "cc"]).count_by(|s| s.len());
        assert_eq!(by_len[&2], 2);
    }

    #[test]
    fn map_builders() {
        let m = Stream::of([1, 2]).associate(|n| (n, n * n));
        assert_eq!(m[&2], 4);

        let grouped = Stream::of(1..=6).group_by(|n| n % 2);
        assert_eq!(grouped[&0], vec![2, 4, 6]);

        let folded = Stream::of(1..=6).group_fold(|n| n % 2, 0, |a, b| a + b);
        assert_eq!(folded[&1], 9);

        let sorted: std::collections::BTreeMap<i32, Vec<i32>> =
            Stream::of([1, 2, 3]).group_by_to(|n| n % 2);
        assert_eq!(sorted.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn set_terminals() {
        assert_eq!(Stream::of([2, 1, 2]).to_set().len(), 2);
        let sorted: Vec<i32> = Stream::of([3, 1, 2]).to_sorted_set().into_iter().collect();
        assert_eq!(sorted, vec![1, 2, 3]);
    }
}
