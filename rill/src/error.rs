//! Errors surfaced by stream terminals.
//!
//! These cover the pipeline-fatal cases: cancellation of a bound
//! [`Context`](crate::Context), an expired deadline, an operator timeout,
//! and a captured panic from a user stage. Per-element errors do not use
//! this type; they flow through pipelines as ordinary `Result<T, E>`
//! elements with whatever error type the producing stage chose.

use std::time::Duration;

/// An error reported by a context-aware terminal or a time operator.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The bound context was canceled before the pipeline completed.
    #[error("stream canceled")]
    Canceled,
    /// The bound context reached its deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// A `timeout` operator saw no upstream element within its window.
    #[error("no element arrived within {0:?}")]
    Timeout(Duration),
    /// A user stage panicked; the payload is its display form.
    #[error("stage panicked: {0}")]
    Panicked(String),
}

impl Error {
    /// Renders a panic payload into [`Error::Panicked`].
    ///
    /// Panic payloads are almost always `&str` or `String`; anything else
    /// is reported opaquely.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Error {
        let text = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "opaque panic payload".to_owned());
        Error::Panicked(text)
    }
}
