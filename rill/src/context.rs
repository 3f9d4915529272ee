//! Cooperative cancellation for streams.
//!
//! A [`Context`] is a cloneable token observed at stage boundaries: a
//! stream guarded with [`Stream::with_context`](crate::Stream::with_context)
//! reports exhausted at the first pull after cancellation, `*_ctx`
//! terminals return whatever was produced together with the token's error,
//! and time operators race the token's [`done`](Context::done) channel
//! against their timers.
//!
//! Cancellation is cooperative throughout: in-flight user work is never
//! interrupted, and a stage notices the token at its next pull.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{after, bounded, select, Receiver, Sender};

use crate::error::Error;

/// A cancellation token shared by every stage of a pipeline.
///
/// Cloning is cheap and every clone observes the same cancellation state.
/// Tokens form a tree: a [`child`](Context::child) (or a deadline-bearing
/// derivation) is canceled when its parent is, carrying the parent's error.
///
/// # Examples
///
/// ```
/// use rill::{Context, Error, Stream};
///
/// let ctx = Context::cancelable();
/// ctx.cancel();
/// let (out, err) = Stream::of(1..100).collect_ctx(&ctx);
/// assert!(out.is_empty());
/// assert_eq!(err, Some(Error::Canceled));
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    canceled: AtomicBool,
    cause: OnceLock<Error>,
    // Held until cancellation; dropping it disconnects `done` so that
    // `select!` arms wake without polling.
    keep_alive: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    deadline: Option<Instant>,
}

impl Context {
    fn with_deadline_opt(deadline: Option<Instant>) -> Context {
        let (tx, rx) = bounded(0);
        Context {
            inner: Arc::new(Inner {
                canceled: AtomicBool::new(false),
                cause: OnceLock::new(),
                keep_alive: Mutex::new(Some(tx)),
                done: rx,
                deadline,
            }),
        }
    }

    /// An inert root token that is never canceled.
    pub fn background() -> Context {
        Context::with_deadline_opt(None)
    }

    /// A fresh root token that can be canceled with [`cancel`](Context::cancel).
    pub fn cancelable() -> Context {
        Context::with_deadline_opt(None)
    }

    /// A root token that cancels itself with [`Error::DeadlineExceeded`]
    /// once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Context {
        Context::with_deadline(Instant::now() + timeout)
    }

    /// A root token that cancels itself with [`Error::DeadlineExceeded`]
    /// at `deadline`.
    ///
    /// A watcher thread arms the deadline timer and exits as soon as the
    /// token is canceled, whichever comes first.
    pub fn with_deadline(deadline: Instant) -> Context {
        let ctx = Context::with_deadline_opt(Some(deadline));
        let watched = ctx.clone();
        let done = ctx.done();
        std::thread::spawn(move || {
            select! {
                recv(after(deadline.saturating_duration_since(Instant::now()))) -> _ => {
                    watched.cancel_with(Error::DeadlineExceeded);
                }
                recv(done) -> _ => {}
            }
        });
        ctx
    }

    /// Derives a token canceled when either it or `self` is canceled.
    ///
    /// The child inherits the parent's error when the parent fires first.
    pub fn child(&self) -> Context {
        let child = Context::with_deadline_opt(self.inner.deadline);
        let parent = self.clone();
        let parent_done = self.done();
        let linked = child.clone();
        let child_done = child.done();
        std::thread::spawn(move || {
            select! {
                recv(parent_done) -> _ => {
                    linked.cancel_with(parent.err().unwrap_or(Error::Canceled));
                }
                recv(child_done) -> _ => {}
            }
        });
        child
    }

    /// Cancels the token with [`Error::Canceled`]. Idempotent.
    pub fn cancel(&self) {
        self.cancel_with(Error::Canceled);
    }

    /// Cancels the token with a specific error. The first cause wins.
    pub fn cancel_with(&self, cause: Error) {
        if !self.inner.canceled.swap(true, Ordering::SeqCst) {
            let _ = self.inner.cause.set(cause);
            if let Ok(mut guard) = self.inner.keep_alive.lock() {
                guard.take();
            }
        }
    }

    /// Whether the token has been canceled or its deadline has passed.
    pub fn is_canceled(&self) -> bool {
        if self.inner.canceled.load(Ordering::SeqCst) {
            return true;
        }
        // The deadline watcher normally fires first; this check covers the
        // window between expiry and the watcher being scheduled.
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            self.cancel_with(Error::DeadlineExceeded);
            return true;
        }
        false
    }

    /// The cancellation error, if the token has fired.
    pub fn err(&self) -> Option<Error> {
        if self.is_canceled() {
            Some(self.inner.cause.get().cloned().unwrap_or(Error::Canceled))
        } else {
            None
        }
    }

    /// A channel that disconnects when the token fires.
    ///
    /// The receiver never carries a message; a `recv` arm in a `select!`
    /// wakes with a disconnect error at cancellation time, which is the
    /// signal time operators wait on.
    pub fn done(&self) -> Receiver<()> {
        self.inner.done.clone()
    }

    /// The deadline, for tokens derived from one.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("canceled", &self.inner.canceled.load(Ordering::SeqCst))
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_and_first_cause_wins() {
        let ctx = Context::cancelable();
        assert!(!ctx.is_canceled());
        assert_eq!(ctx.err(), None);

        ctx.cancel_with(Error::Timeout(Duration::from_millis(5)));
        ctx.cancel();
        assert!(ctx.is_canceled());
        assert_eq!(ctx.err(), Some(Error::Timeout(Duration::from_millis(5))));
    }

    #[test]
    fn done_disconnects_on_cancel() {
        let ctx = Context::cancelable();
        let done = ctx.done();
        assert!(done.try_recv().is_err());
        ctx.cancel();
        // Disconnected, not merely empty.
        assert!(done.recv().is_err());
    }

    #[test]
    fn deadline_fires() {
        let ctx = Context::with_timeout(Duration::from_millis(10));
        assert!(!ctx.is_canceled());
        std::thread::sleep(Duration::from_millis(30));
        assert!(ctx.is_canceled());
        assert_eq!(ctx.err(), Some(Error::DeadlineExceeded));
    }

    #[test]
    fn child_follows_parent() {
        let parent = Context::cancelable();
        let child = parent.child();
        parent.cancel();
        assert!(child.done().recv().is_err());
        assert_eq!(child.err(), Some(Error::Canceled));
    }
}
