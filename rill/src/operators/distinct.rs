//! Deduplication operators.
//!
//! `distinct` and `distinct_by` track the full set of seen keys;
//! `distinct_until_changed` compares only against the immediately
//! preceding element and therefore runs in constant space.

use std::hash::Hash;

use fnv::FnvHashSet;

use crate::stream::Stream;
use crate::Data;

impl<T: Data> Stream<T> {
    /// Retains the first occurrence of each element.
    pub fn distinct(self) -> Stream<T>
    where
        T: Clone + Eq + Hash,
    {
        let mut seen = FnvHashSet::default();
        self.filter(move |x| seen.insert(x.clone()))
    }

    /// Retains the first element for each derived key.
    pub fn distinct_by<K>(self, mut key: impl FnMut(&T) -> K + Send + 'static) -> Stream<T>
    where
        K: Eq + Hash + Send + 'static,
    {
        let mut seen = FnvHashSet::default();
        self.filter(move |x| seen.insert(key(x)))
    }

    /// Collapses runs of consecutive equal elements to their first.
    pub fn distinct_until_changed(self) -> Stream<T>
    where
        T: Clone + PartialEq,
    {
        self.distinct_until_changed_by(|a, b| a == b)
    }

    /// Collapses runs of consecutive elements equal under `eq`.
    pub fn distinct_until_changed_by(
        self,
        mut eq: impl FnMut(&T, &T) -> bool + Send + 'static,
    ) -> Stream<T>
    where
        T: Clone,
    {
        let mut prev: Option<T> = None;
        self.filter(move |x| {
            let changed = prev.as_ref().is_none_or(|p| !eq(p, x));
            if changed {
                prev = Some(x.clone());
            }
            changed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_is_idempotent() {
        let once = Stream::of([1, 2, 1, 3, 2]).distinct().collect();
        assert_eq!(once, vec![1, 2, 3]);
        let twice = Stream::of([1, 2, 1, 3, 2]).distinct().distinct().collect();
        assert_eq!(twice, once);
    }

    #[test]
    fn distinct_by_key() {
        let out = Stream::of(["ape", "bat", "ant", "cow"]).distinct_by(|s| s.as_bytes()[0]).collect();
        assert_eq!(out, vec!["ape", "bat", "cow"]);
    }

    #[test]
    fn until_changed_collapses_runs_only() {
        let out = Stream::of([1, 1, 2, 2, 2, 1, 3, 3]).distinct_until_changed().collect();
        assert_eq!(out, vec![1, 2, 1, 3]);
    }

    #[test]
    fn until_changed_by_custom_equality() {
        let out = Stream::of(["a", "A", "b", "B", "a"])
            .distinct_until_changed_by(|x, y| x.eq_ignore_ascii_case(y))
            .collect();
        assert_eq!(out, vec!["a", "b", "a"]);
    }
}
