//! Per-element error flow.
//!
//! Fallible stages produce streams of `Result<T, E>` with whatever error
//! type they choose; the operators here decide how those elements
//! terminate. `collect_results` fails fast and stops pulling at the first
//! error, `collect_results_all` drains everything, `take_until_err` turns
//! the first error into the stream's end marker, and `catch_panics`
//! converts pipeline panics into error elements instead of unwinding.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::Error;
use crate::seq::boxed;
use crate::stream::Stream;
use crate::Data;

impl<T: Data> Stream<T> {
    /// Applies the fallible `f`, carrying each element's outcome
    /// downstream as a `Result`.
    ///
    /// ```
    /// use rill::Stream;
    ///
    /// let parsed = Stream::of(["1", "x", "2"]).try_map(str::parse::<i32>);
    /// let (ok, err) = parsed.collect_results();
    /// assert_eq!(ok, vec![1]);
    /// assert!(err.is_some());
    /// ```
    pub fn try_map<U: Data, E: Data>(
        self,
        f: impl FnMut(T) -> Result<U, E> + Send + 'static,
    ) -> Stream<Result<U, E>> {
        self.map(f)
    }

    /// Applies the fallible `predicate`; accepted elements pass as `Ok`,
    /// rejected ones vanish, and predicate errors pass as `Err`.
    pub fn try_filter<E: Data>(
        self,
        mut predicate: impl FnMut(&T) -> Result<bool, E> + Send + 'static,
    ) -> Stream<Result<T, E>> {
        self.flat_map(move |x| match predicate(&x) {
            Ok(true) => Some(Ok(x)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        })
    }

    /// Converts panics raised while pulling this stream into
    /// [`Error::Panicked`] elements.
    ///
    /// The first panic poisons the stream: its error is the final
    /// element. Pair with [`try_collect`](Stream::try_collect) to turn a
    /// panicking pipeline into a `Result`.
    pub fn catch_panics(self) -> Stream<Result<T, Error>> {
        self.wrap(|mut it| {
            let mut poisoned = false;
            boxed(std::iter::from_fn(move || {
                if poisoned {
                    return None;
                }
                match catch_unwind(AssertUnwindSafe(|| it.next())) {
                    Ok(next) => next.map(Ok),
                    Err(payload) => {
                        poisoned = true;
                        Some(Err(Error::from_panic(payload)))
                    }
                }
            }))
        })
    }
}

impl<T: Data, E: Data> Stream<Result<T, E>> {
    /// A stream over already-computed results.
    pub fn from_results<I>(results: I) -> Stream<Result<T, E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
        I::IntoIter: Send + 'static,
    {
        Stream::of(results)
    }

    /// Collects values until the first error; nothing after it is pulled.
    pub fn collect_results(mut self) -> (Vec<T>, Option<E>) {
        let mut ok = Vec::new();
        for r in self.iter.by_ref() {
            match r {
                Ok(v) => ok.push(v),
                Err(e) => return (ok, Some(e)),
            }
        }
        (ok, None)
    }

    /// Drains the whole stream, collecting values and errors separately.
    pub fn collect_results_all(self) -> (Vec<T>, Vec<E>) {
        let mut ok = Vec::new();
        let mut errs = Vec::new();
        for r in self.iter {
            match r {
                Ok(v) => ok.push(v),
                Err(e) => errs.push(e),
            }
        }
        (ok, errs)
    }

    /// Splits the stream into its values and its errors.
    pub fn partition_results(self) -> (Vec<T>, Vec<E>) {
        self.collect_results_all()
    }

    /// The values, with errors discarded.
    pub fn filter_ok(self) -> Stream<T> {
        self.flat_map(Result::ok)
    }

    /// The errors, with values discarded.
    pub fn filter_errs(self) -> Stream<E> {
        self.flat_map(Result::err)
    }

    /// Maps the value inside each `Ok`, passing errors through.
    pub fn map_results<U: Data>(self, mut f: impl FnMut(T) -> U + Send + 'static) -> Stream<Result<U, E>> {
        self.map(move |r| r.map(&mut f))
    }

    /// Unwraps every element.
    ///
    /// # Panics
    ///
    /// Panics at the first `Err`, which is the caller asserting the
    /// pipeline cannot fail.
    pub fn unwrap_results(self) -> Stream<T>
    where
        E: std::fmt::Debug,
    {
        self.map(|r| r.expect("unwrap_results on an Err element"))
    }

    /// Replaces errors with `fallback`.
    pub fn unwrap_or(self, fallback: T) -> Stream<T>
    where
        T: Clone,
    {
        self.map(move |r| r.unwrap_or_else(|_| fallback.clone()))
    }

    /// Replaces errors with the value type's default.
    pub fn unwrap_or_default(self) -> Stream<T>
    where
        T: Default,
    {
        self.map(Result::unwrap_or_default)
    }

    /// Passes values until the first error, emits that error as the final
    /// element, and ends.
    pub fn take_until_err(self) -> Stream<Result<T, E>> {
        self.wrap(|mut it| {
            let mut done = false;
            boxed(std::iter::from_fn(move || {
                if done {
                    return None;
                }
                match it.next()? {
                    Ok(v) => Some(Ok(v)),
                    Err(e) => {
                        done = true;
                        Some(Err(e))
                    }
                }
            }))
        })
    }

    /// Collects all values, or the first error; fail-fast like
    /// [`collect_results`](Stream::collect_results) but shaped as a
    /// `Result`.
    pub fn try_collect(self) -> Result<Vec<T>, E> {
        let (ok, err) = self.collect_results();
        match err {
            Some(e) => Err(e),
            None => Ok(ok),
        }
    }
}

/// Adapts an `Option` into the stream algebra.
pub trait OptionStreamExt<T> {
    /// A stream of the contained value, or the empty stream.
    fn to_stream(self) -> Stream<T>;
}

impl<T: Data> OptionStreamExt<T> for Option<T> {
    fn to_stream(self) -> Stream<T> {
        Stream::from_option(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed() -> Stream<Result<i32, std::num::ParseIntError>> {
        Stream::of(["1", "x", "2"]).try_map(str::parse)
    }

    #[test]
    fn fail_fast_stops_at_the_first_error() {
        let (ok, err) = parsed().collect_results();
        assert_eq!(ok, vec![1]);
        assert!(err.is_some());
    }

    #[test]
    fn drain_all_keeps_both_sides() {
        let (ok, errs) = parsed().collect_results_all();
        assert_eq!(ok, vec![1, 2]);
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn ok_and_err_projections() {
        assert_eq!(parsed().filter_ok().collect(), vec![1, 2]);
        assert_eq!(parsed().filter_errs().count(), 1);
        assert_eq!(parsed().unwrap_or(0).collect(), vec![1, 0, 2]);
        assert_eq!(parsed().unwrap_or_default().collect(), vec![1, 0, 2]);
        assert_eq!(parsed().map_results(|n| n * 10).filter_ok().collect(), vec![10, 20]);
    }

    #[test]
    fn take_until_err_ends_with_the_error() {
        let out: Vec<Result<i32, _>> = parsed().take_until_err().collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok(1));
        assert!(out[1].is_err());
    }

    #[test]
    fn try_filter_keeps_predicate_errors() {
        let out = Stream::of([1, 2, 3, 4])
            .try_filter(|&n| if n == 3 { Err("bad") } else { Ok(n % 2 == 0) })
            .collect_results_all();
        assert_eq!(out, (vec![2, 4], vec!["bad"]));
    }

    #[test]
    fn catch_panics_converts_to_err() {
        let (ok, errs) = Stream::of([1, 2, 3])
            .map(|n| {
                assert!(n != 3, "three is out");
                n
            })
            .catch_panics()
            .collect_results_all();
        assert_eq!(ok, vec![1, 2]);
        assert_eq!(errs.len(), 1);
        let caught = Stream::of([1, 2]).catch_panics().try_collect();
        assert_eq!(caught, Ok(vec![1, 2]));
    }

    #[test]
    fn option_to_stream() {
        assert_eq!(Some(5).to_stream().collect(), vec![5]);
        assert_eq!(None::<i32>.to_stream().count(), 0);
    }
}
