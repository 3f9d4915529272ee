//! The zip family and interleaving.

use crate::pair::Pair;
use crate::seq::boxed;
use crate::stream::Stream;
use crate::Data;

impl<T: Data> Stream<T> {
    /// Pairs elements positionally; ends when either input ends.
    pub fn zip<U: Data>(self, other: Stream<U>) -> Stream<(T, U)> {
        let right = other.iter;
        self.wrap(move |it| boxed(it.zip(right)))
    }

    /// Triples elements positionally; ends when any input ends.
    pub fn zip3<U: Data, W: Data>(self, second: Stream<U>, third: Stream<W>) -> Stream<(T, U, W)> {
        let b = second.iter;
        let c = third.iter;
        self.wrap(move |it| boxed(it.zip(b).zip(c).map(|((x, y), z)| (x, y, z))))
    }

    /// Pairs elements positionally until both inputs end, marking the
    /// shorter side `None` past its end.
    pub fn zip_longest<U: Data>(self, other: Stream<U>) -> Stream<Pair<Option<T>, Option<U>>> {
        let mut right = other.iter;
        self.wrap(move |mut it| {
            boxed(std::iter::from_fn(move || {
                match (it.next(), right.next()) {
                    (None, None) => None,
                    (l, r) => Some(Pair::new(l, r)),
                }
            }))
        })
    }

    /// Pairs elements positionally until both inputs end, substituting the
    /// given defaults past the shorter side's end.
    pub fn zip_longest_with<U: Data + Clone>(self, other: Stream<U>, def_left: T, def_right: U) -> Stream<(T, U)>
    where
        T: Clone,
    {
        self.zip_longest(other).map(move |p| {
            (p.first.unwrap_or_else(|| def_left.clone()), p.second.unwrap_or_else(|| def_right.clone()))
        })
    }

    /// Alternates elements of the two inputs, starting with this one, and
    /// ends as soon as either input ends.
    pub fn interleave(self, other: Stream<T>) -> Stream<T> {
        let mut right = other.iter;
        self.wrap(move |mut it| {
            let mut left_turn = true;
            boxed(std::iter::from_fn(move || {
                let x = if left_turn { it.next() } else { right.next() };
                left_turn = !left_turn;
                x
            }))
        })
    }
}
