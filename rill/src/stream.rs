//! The single-consumer stream handle and its core algebra.
//!
//! A [`Stream`] bundles a boxed sequence with an optional cancellation
//! token. Intermediate operators are thin wrappers: each one transforms
//! the demand of its downstream into the demand issued to its upstream,
//! so nothing runs until a terminal starts pulling. Terminals consume the
//! stream and drive the pull loop to exhaustion or to a short-circuit.
//!
//! The cheap operators live here as inherent methods; heavier families
//! (sorting, windows, joins, the parallel engine, time operators) live
//! under [`operators`](crate::operators).

use crate::context::Context;
use crate::error::Error;
use crate::seq::{boxed, BoxIter};
use crate::Data;

/// A single-consumer handle over a lazy sequence of values.
///
/// Every terminal operation consumes the stream; a drained stream is not
/// restartable. Elements and user closures are `Send + 'static` so any
/// stage may later cross into the parallel engine or a time operator.
///
/// # Examples
///
/// ```
/// use rill::Stream;
///
/// let out = Stream::of([1, 2, 3, 4, 5])
///     .filter(|n| n % 2 == 0)
///     .map(|n| n * 2)
///     .collect();
/// assert_eq!(out, vec![4, 8]);
/// ```
pub struct Stream<T> {
    pub(crate) iter: BoxIter<T>,
    pub(crate) ctx: Option<Context>,
}

impl<T: Data> Stream<T> {
    /// Wraps an iterator as a stream, fusing it.
    pub fn new<I>(iter: I) -> Stream<T>
    where
        I: Iterator<Item = T> + Send + 'static,
    {
        Stream { iter: boxed(iter.fuse()), ctx: None }
    }

    /// Replaces the sequence, keeping the attached context.
    pub(crate) fn wrap<U: Data>(self, f: impl FnOnce(BoxIter<T>) -> BoxIter<U>) -> Stream<U> {
        Stream { iter: f(self.iter), ctx: self.ctx }
    }

    /// Binds a cancellation token at this point of the chain.
    ///
    /// Every pull that crosses this point first checks the token; once it
    /// fires the stream reports exhausted. Terminals with a `_ctx` suffix
    /// additionally return the token's error alongside partial output.
    pub fn with_context(self, ctx: &Context) -> Stream<T> {
        let guard = ctx.clone();
        let mut stream = self.wrap(move |mut it| {
            boxed(std::iter::from_fn(move || {
                if guard.is_canceled() {
                    None
                } else {
                    it.next()
                }
            }))
        });
        stream.ctx = Some(ctx.clone());
        stream
    }

    /// The context bound to this stream, if any.
    pub fn context(&self) -> Option<&Context> {
        self.ctx.as_ref()
    }

    /// Drops the stream, releasing any resource its sources own.
    ///
    /// Resource-backed sources hold their handles inside the chain, so
    /// this (or any other way of dropping the stream) releases them.
    pub fn close(self) {}

    // ------------------------------------------------------------------
    // Stateless operators.
    // ------------------------------------------------------------------

    /// Applies `f` to each element.
    pub fn map<U: Data>(self, f: impl FnMut(T) -> U + Send + 'static) -> Stream<U> {
        self.wrap(move |it| boxed(it.map(f)))
    }

    /// Retains the elements satisfying `predicate`.
    pub fn filter(self, predicate: impl FnMut(&T) -> bool + Send + 'static) -> Stream<T> {
        self.wrap(move |it| boxed(it.filter(predicate)))
    }

    /// Observes each element as it flows past, without changing it.
    pub fn inspect(self, f: impl FnMut(&T) + Send + 'static) -> Stream<T> {
        self.wrap(move |it| boxed(it.inspect(f)))
    }

    /// Replaces each element with the sequence `f` derives from it.
    pub fn flat_map<U, I>(self, f: impl FnMut(T) -> I + Send + 'static) -> Stream<U>
    where
        U: Data,
        I: IntoIterator<Item = U> + 'static,
        I::IntoIter: Send + 'static,
    {
        self.wrap(move |it| boxed(it.flat_map(f)))
    }

    /// Flattens a stream of iterables into their elements.
    pub fn flatten(self) -> Stream<T::Item>
    where
        T: IntoIterator,
        T::IntoIter: Send + 'static,
        T::Item: Data,
    {
        self.wrap(|it| boxed(it.flatten()))
    }

    /// Emits `separator` between consecutive elements.
    pub fn intersperse(self, separator: T) -> Stream<T>
    where
        T: Clone,
    {
        self.wrap(move |mut it| {
            let mut held: Option<T> = None;
            let mut started = false;
            boxed(std::iter::from_fn(move || {
                if let Some(x) = held.take() {
                    return Some(x);
                }
                let x = it.next()?;
                if started {
                    held = Some(x);
                    Some(separator.clone())
                } else {
                    started = true;
                    Some(x)
                }
            }))
        })
    }

    /// Skips the first `n` elements.
    pub fn skip(self, n: usize) -> Stream<T> {
        self.wrap(move |it| boxed(it.skip(n)))
    }

    /// Passes at most `n` elements, then stops pulling upstream.
    pub fn take(self, n: usize) -> Stream<T> {
        self.wrap(move |it| boxed(it.take(n)))
    }

    /// Emits every `k`-th element, starting with the first.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub fn step_by(self, k: usize) -> Stream<T> {
        self.wrap(move |it| boxed(it.step_by(k)))
    }

    /// Passes elements while `predicate` holds, then stops.
    pub fn take_while(self, predicate: impl FnMut(&T) -> bool + Send + 'static) -> Stream<T> {
        self.wrap(move |it| boxed(it.take_while(predicate)))
    }

    /// Discards elements while `predicate` holds, then passes the rest.
    pub fn skip_while(self, predicate: impl FnMut(&T) -> bool + Send + 'static) -> Stream<T> {
        self.wrap(move |it| boxed(it.skip_while(predicate)))
    }

    /// Appends `other` after this stream is exhausted.
    pub fn chain(self, other: Stream<T>) -> Stream<T> {
        let tail = other.iter;
        self.wrap(move |it| boxed(it.chain(tail)))
    }

    /// Pairs each element with its zero-based position.
    pub fn zip_with_index(self) -> Stream<(usize, T)> {
        self.wrap(|it| boxed(it.enumerate()))
    }

    // ------------------------------------------------------------------
    // Terminals.
    // ------------------------------------------------------------------

    /// Drains the stream into a vector.
    pub fn collect(self) -> Vec<T> {
        self.iter.collect()
    }

    /// Drains the stream into any extendable container.
    ///
    /// This is the bridge to external collections: anything implementing
    /// `Default + Extend` can receive the elements.
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use rill::Stream;
    ///
    /// let set: BTreeSet<i32> = Stream::of([3, 1, 2, 1]).collect_into();
    /// assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    /// ```
    pub fn collect_into<C>(self) -> C
    where
        C: Default + Extend<T>,
    {
        let mut target = C::default();
        target.extend(self.iter);
        target
    }

    /// The number of elements.
    pub fn count(self) -> usize {
        self.iter.count()
    }

    /// The first element, pulling at most once.
    pub fn first(mut self) -> Option<T> {
        self.iter.next()
    }

    /// The final element.
    pub fn last(self) -> Option<T> {
        self.iter.last()
    }

    /// The first element satisfying `predicate`; stops pulling once found.
    pub fn find_first(mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        self.iter.find(|x| predicate(x))
    }

    /// The last element satisfying `predicate`.
    pub fn find_last(self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let mut found = None;
        for x in self.iter {
            if predicate(&x) {
                found = Some(x);
            }
        }
        found
    }

    /// Whether any element satisfies `predicate`; short-circuits on the
    /// first hit.
    pub fn any_match(mut self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        self.iter.any(|x| predicate(&x))
    }

    /// Whether every element satisfies `predicate`; short-circuits on the
    /// first miss.
    pub fn all_match(mut self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        self.iter.all(|x| predicate(&x))
    }

    /// Whether no element satisfies `predicate`.
    pub fn none_match(self, predicate: impl FnMut(&T) -> bool) -> bool {
        !self.any_match(predicate)
    }

    /// Folds every element into `init` with `f`.
    pub fn fold<A>(self, init: A, f: impl FnMut(A, T) -> A) -> A {
        self.iter.fold(init, f)
    }

    /// Combines elements pairwise with `op`; `None` when empty.
    pub fn reduce(mut self, op: impl FnMut(T, T) -> T) -> Option<T> {
        self.iter.by_ref().reduce(op)
    }

    /// The minimum element.
    pub fn min(self) -> Option<T>
    where
        T: Ord,
    {
        self.iter.min()
    }

    /// The maximum element.
    pub fn max(self) -> Option<T>
    where
        T: Ord,
    {
        self.iter.max()
    }

    /// The element at zero-based position `i`; stops pulling once reached.
    pub fn at(mut self, i: usize) -> Option<T> {
        self.iter.nth(i)
    }

    /// The element at one-based position `i`; `None` for `i == 0`.
    pub fn nth(self, i: usize) -> Option<T> {
        if i == 0 {
            None
        } else {
            self.at(i - 1)
        }
    }

    /// The sole element, or `None` when the stream has zero or more than
    /// one; pulls at most twice.
    pub fn single(mut self) -> Option<T> {
        let first = self.iter.next()?;
        match self.iter.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Whether the stream has no elements; pulls at most once.
    pub fn is_empty(mut self) -> bool {
        self.iter.next().is_none()
    }

    /// Whether the stream has at least one element; pulls at most once.
    pub fn is_not_empty(self) -> bool {
        !self.is_empty()
    }

    /// Whether `value` occurs in the stream; short-circuits on the first
    /// hit.
    pub fn contains(self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.any_match(|x| x == value)
    }

    /// Applies `f` to every element.
    pub fn for_each(self, f: impl FnMut(T)) {
        self.iter.for_each(f);
    }

    /// Applies `f` to every element with its zero-based position.
    pub fn for_each_indexed(self, mut f: impl FnMut(usize, T)) {
        for (i, x) in self.iter.enumerate() {
            f(i, x);
        }
    }

    /// Applies the fallible `f` to every element, stopping at the first
    /// error.
    pub fn for_each_err<E>(self, mut f: impl FnMut(T) -> Result<(), E>) -> Result<(), E> {
        for x in self.iter {
            f(x)?;
        }
        Ok(())
    }

    /// Applies the fallible `f` with positions, stopping at the first
    /// error.
    pub fn for_each_indexed_err<E>(
        self,
        mut f: impl FnMut(usize, T) -> Result<(), E>,
    ) -> Result<(), E> {
        for (i, x) in self.iter.enumerate() {
            f(i, x)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Context-aware terminals: partial output plus the token's error.
    // ------------------------------------------------------------------

    /// Drains into a vector, checking `ctx` before each pull.
    ///
    /// On cancellation the prefix produced so far is returned together
    /// with the token's error.
    pub fn collect_ctx(self, ctx: &Context) -> (Vec<T>, Option<Error>) {
        let mut out = Vec::new();
        for x in self.iter {
            if let Some(err) = ctx.err() {
                return (out, Some(err));
            }
            out.push(x);
        }
        (out, ctx.err())
    }

    /// Counts elements, checking `ctx` before each pull.
    pub fn count_ctx(self, ctx: &Context) -> (usize, Option<Error>) {
        let mut n = 0;
        for _ in self.iter {
            if let Some(err) = ctx.err() {
                return (n, Some(err));
            }
            n += 1;
        }
        (n, ctx.err())
    }

    /// Applies `f` to every element, checking `ctx` before each pull.
    pub fn for_each_ctx(self, ctx: &Context, mut f: impl FnMut(T)) -> Result<(), Error> {
        for x in self.iter {
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            f(x);
        }
        match ctx.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Folds under `ctx`, returning the accumulation reached so far on
    /// cancellation.
    pub fn reduce_ctx<A>(
        self,
        ctx: &Context,
        init: A,
        mut op: impl FnMut(A, T) -> A,
    ) -> (A, Option<Error>) {
        let mut acc = init;
        for x in self.iter {
            if let Some(err) = ctx.err() {
                return (acc, Some(err));
            }
            acc = op(acc, x);
        }
        (acc, ctx.err())
    }

    /// Searches under `ctx`; `None` so far plus the error on cancellation.
    pub fn find_first_ctx(
        mut self,
        ctx: &Context,
        mut predicate: impl FnMut(&T) -> bool,
    ) -> (Option<T>, Option<Error>) {
        loop {
            if let Some(err) = ctx.err() {
                return (None, Some(err));
            }
            match self.iter.next() {
                Some(x) if predicate(&x) => return (Some(x), None),
                Some(_) => {}
                None => return (None, ctx.err()),
            }
        }
    }

    /// `any_match` under `ctx`.
    pub fn any_match_ctx(
        self,
        ctx: &Context,
        predicate: impl FnMut(&T) -> bool,
    ) -> (bool, Option<Error>) {
        let (found, err) = self.find_first_ctx(ctx, predicate);
        (found.is_some(), err)
    }

    /// `all_match` under `ctx`.
    pub fn all_match_ctx(
        mut self,
        ctx: &Context,
        mut predicate: impl FnMut(&T) -> bool,
    ) -> (bool, Option<Error>) {
        loop {
            if let Some(err) = ctx.err() {
                return (true, Some(err));
            }
            match self.iter.next() {
                Some(x) if !predicate(&x) => return (false, None),
                Some(_) => {}
                None => return (true, ctx.err()),
            }
        }
    }
}

impl<T: Data> IntoIterator for Stream<T> {
    type Item = T;
    type IntoIter = BoxIter<T>;

    /// Adapts the stream to external iteration, consuming it.
    fn into_iter(self) -> BoxIter<T> {
        self.iter
    }
}

impl<T: Data> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").field("ctx", &self.ctx).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_map_collect() {
        let out = Stream::of([1, 2, 3, 4, 5]).filter(|n| n % 2 == 0).map(|n| n * 2).collect();
        assert_eq!(out, vec![4, 8]);
    }

    #[test]
    fn short_circuit_terminals_stop_pulling() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let pulled = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&pulled);
        let stream = Stream::of(1..100).inspect(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert!(stream.any_match(|&n| n == 3));
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn positional_terminals() {
        assert_eq!(Stream::of([10, 20, 30]).at(1), Some(20));
        assert_eq!(Stream::of([10, 20, 30]).nth(1), Some(10));
        assert_eq!(Stream::of([10, 20, 30]).nth(0), None::<i32>);
        assert_eq!(Stream::of([7]).single(), Some(7));
        assert_eq!(Stream::of([7, 8]).single(), None);
        assert_eq!(Stream::<i32>::empty().single(), None);
    }

    #[test]
    fn intersperse_separates() {
        let out = Stream::of(["a", "b", "c"]).intersperse("-").collect();
        assert_eq!(out, vec!["a", "-", "b", "-", "c"]);
        assert_eq!(Stream::of(["a"]).intersperse("-").collect(), vec!["a"]);
        assert!(Stream::<&str>::empty().intersperse("-").collect().is_empty());
    }

    #[test]
    fn canceled_context_truncates() {
        let ctx = Context::cancelable();
        let seen = ctx.clone();
        let (out, err) = Stream::of(1..)
            .inspect(move |&n| {
                if n == 5 {
                    seen.cancel();
                }
            })
            .with_context(&ctx)
            .collect_ctx(&ctx);
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert_eq!(err, Some(Error::Canceled));
    }

    #[test]
    fn fold_and_reduce_agree() {
        let total = Stream::of([1, 2, 3, 4]).fold(0, |a, b| a + b);
        assert_eq!(total, 10);
        assert_eq!(Stream::of([1, 2, 3, 4]).reduce(|a, b| a + b), Some(10));
        assert_eq!(Stream::<i32>::empty().reduce(|a, b| a + b), None);
    }
}
