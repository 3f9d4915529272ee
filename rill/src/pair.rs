//! Positional tuple carriers.
//!
//! `Pair`, `Triple`, and `Quad` are immutable positional records with
//! projections, a swap, and per-slot mappers. The stream algebra uses
//! native tuples internally; these carriers appear where a named slot
//! reads better than `.0` — `zip_longest` yields `Pair<Option<L>,
//! Option<R>>`, `min_max` yields `Pair<T, T>`, `most_common` yields
//! counted pairs.

use serde::{Deserialize, Serialize};

/// A two-slot positional record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pair<F, S> {
    /// The first slot.
    pub first: F,
    /// The second slot.
    pub second: S,
}

impl<F, S> Pair<F, S> {
    /// Builds a pair from its slots.
    pub fn new(first: F, second: S) -> Pair<F, S> {
        Pair { first, second }
    }

    /// Swaps the slots.
    pub fn swap(self) -> Pair<S, F> {
        Pair::new(self.second, self.first)
    }

    /// Maps the first slot, leaving the second in place.
    pub fn map_first<F2>(self, f: impl FnOnce(F) -> F2) -> Pair<F2, S> {
        Pair::new(f(self.first), self.second)
    }

    /// Maps the second slot, leaving the first in place.
    pub fn map_second<S2>(self, f: impl FnOnce(S) -> S2) -> Pair<F, S2> {
        Pair::new(self.first, f(self.second))
    }

    /// The slots as a native tuple.
    pub fn into_tuple(self) -> (F, S) {
        (self.first, self.second)
    }
}

impl<F, S> From<(F, S)> for Pair<F, S> {
    fn from((first, second): (F, S)) -> Pair<F, S> {
        Pair::new(first, second)
    }
}

impl<F, S> From<Pair<F, S>> for (F, S) {
    fn from(pair: Pair<F, S>) -> (F, S) {
        pair.into_tuple()
    }
}

/// A three-slot positional record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple<A, B, C> {
    /// The first slot.
    pub first: A,
    /// The second slot.
    pub second: B,
    /// The third slot.
    pub third: C,
}

impl<A, B, C> Triple<A, B, C> {
    /// Builds a triple from its slots.
    pub fn new(first: A, second: B, third: C) -> Triple<A, B, C> {
        Triple { first, second, third }
    }

    /// The slots as a native tuple.
    pub fn into_tuple(self) -> (A, B, C) {
        (self.first, self.second, self.third)
    }
}

impl<A, B, C> From<(A, B, C)> for Triple<A, B, C> {
    fn from((first, second, third): (A, B, C)) -> Triple<A, B, C> {
        Triple::new(first, second, third)
    }
}

/// A four-slot positional record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quad<A, B, C, D> {
    /// The first slot.
    pub first: A,
    /// The second slot.
    pub second: B,
    /// The third slot.
    pub third: C,
    /// The fourth slot.
    pub fourth: D,
}

impl<A, B, C, D> Quad<A, B, C, D> {
    /// Builds a quad from its slots.
    pub fn new(first: A, second: B, third: C, fourth: D) -> Quad<A, B, C, D> {
        Quad { first, second, third, fourth }
    }

    /// The slots as a native tuple.
    pub fn into_tuple(self) -> (A, B, C, D) {
        (self.first, self.second, self.third, self.fourth)
    }
}

impl<A, B, C, D> From<(A, B, C, D)> for Quad<A, B, C, D> {
    fn from((first, second, third, fourth): (A, B, C, D)) -> Quad<A, B, C, D> {
        Quad::new(first, second, third, fourth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_algebra() {
        let p = Pair::new(1, "one");
        assert_eq!(p.swap(), Pair::new("one", 1));
        assert_eq!(p.map_first(|x| x + 1), Pair::new(2, "one"));
        assert_eq!(p.map_second(str::len), Pair::new(1, 3));
        assert_eq!(Pair::from((1, 2)).into_tuple(), (1, 2));
    }
}
