//! The sequence primitive underlying every stream.
//!
//! A sequence is the standard [`Iterator`] contract, boxed so operator
//! chains can be stored behind one type: on demand it yields `Some(value)`
//! or `None` for permanent exhaustion. Streams fuse their sources at
//! construction, so the exhaustion invariant (once `None`, always `None`)
//! holds across the whole chain. Sequences are single-pass and not safe
//! for concurrent use; the parallel engine owns upstream access
//! exclusively through its dispatcher.
//!
//! Resource-backed sequences (open files, CSV readers) own their handle
//! inside the chain, so dropping the stream releases the resource on every
//! exit path, early termination included.

/// A boxed, sendable sequence of `T`.
pub type BoxIter<T> = Box<dyn Iterator<Item = T> + Send + 'static>;

/// Boxes an iterator as a sequence.
pub(crate) fn boxed<T, I>(iter: I) -> BoxIter<T>
where
    I: Iterator<Item = T> + Send + 'static,
{
    Box::new(iter)
}

/// A sequence whose construction is deferred until the first pull.
///
/// Buffering operators (`sorted`, `reverse`, joins, combinatorics) must
/// not drain their upstream at call time; this defers the drain to the
/// first demand, keeping the pipeline lazy end to end.
pub(crate) fn deferred<T, F>(make: F) -> BoxIter<T>
where
    T: 'static,
    F: FnOnce() -> BoxIter<T> + Send + 'static,
{
    let mut make = Some(make);
    let mut inner: Option<BoxIter<T>> = None;
    boxed(std::iter::from_fn(move || {
        if inner.is_none() {
            inner = Some((make.take()?)());
        }
        inner.as_mut().and_then(|it| it.next())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_is_lazy() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let built = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&built);
        let mut seq = deferred(move || {
            flag.store(true, Ordering::SeqCst);
            boxed(0..3)
        });
        assert!(!built.load(Ordering::SeqCst));
        assert_eq!(seq.next(), Some(0));
        assert!(built.load(Ordering::SeqCst));
        assert_eq!(seq.by_ref().count(), 2);
        assert_eq!(seq.next(), None);
    }
}
