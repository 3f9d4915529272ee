//! Rill is a pull-based stream algebra: lazy pipelines over finite or
//! infinite sequences of typed values, with SQL/LINQ-style transforms,
//! eager terminal reductions, a bounded parallel execution engine, a
//! join/cogroup engine, and time-aware operators.
//!
//! Pipelines are operator trees whose leaves are sources and whose root
//! is a terminal. Intermediate operators are lazy: each one translates
//! the demand of its downstream into demand on its upstream, and nothing
//! runs until a terminal pulls. Streams are single-consumer and are not
//! restartable once drained.
//!
//! # Examples
//!
//! ```
//! use rill::Stream;
//!
//! let even_doubles = Stream::of([1, 2, 3, 4, 5])
//!     .filter(|n| n % 2 == 0)
//!     .map(|n| n * 2)
//!     .collect();
//! assert_eq!(even_doubles, vec![4, 8]);
//! ```
//!
//! Parallel stages fan work out across a bounded worker pool while, by
//! default, preserving upstream order at the output boundary:
//!
//! ```
//! use rill::{ParallelOptions, Stream};
//!
//! let opts = ParallelOptions::with_concurrency(2);
//! let squares = Stream::range(1, 6).par_map(&opts, |n| n * n).collect();
//! assert_eq!(squares, vec![1, 4, 9, 16, 25]);
//! ```
//!
//! Keyed streams join and group:
//!
//! ```
//! use rill::Stream2;
//!
//! let rows = Stream2::of_pairs([("a", 1), ("b", 2)])
//!     .join(Stream2::of_pairs([("a", "x")]))
//!     .collect();
//! assert_eq!(rows, vec![("a", (1, "x"))]);
//! ```
//!
//! Cancellation is cooperative: bind a [`Context`] and every stage past
//! the binding observes it, with `*_ctx` terminals returning partial
//! output alongside the token's error.

#![forbid(missing_docs)]

/// Marker for stream element types: any owned, sendable value.
///
/// The bound is what lets any stage later cross into the parallel engine
/// or a time operator, both of which move elements between threads.
/// Operators that duplicate elements (windows, products, joins) ask for
/// `Clone` individually.
pub trait Data: Send + 'static {}
impl<T: Send + 'static> Data for T {}

pub mod collector;
pub mod context;
pub mod error;
pub mod io;
pub mod operators;
pub mod pair;
pub mod seq;
pub mod source;
pub mod stream;
pub mod stream2;

pub use collector::{collectors, Collector};
pub use context::Context;
pub use error::Error;
pub use operators::numeric::Numeric;
pub use operators::parallel::ParallelOptions;
pub use operators::results::OptionStreamExt;
pub use pair::{Pair, Quad, Triple};
pub use seq::BoxIter;
pub use stream::Stream;
pub use stream2::Stream2;
