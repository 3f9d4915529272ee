//! Operator families beyond the core algebra.
//!
//! Each module extends [`Stream`](crate::Stream) (and
//! [`Stream2`](crate::Stream2) where keys are involved) with one family of
//! operators: deduplication, buffering/sorting, count windows, the zip and
//! merge families, combinatorics, joins, the parallel engine, time-aware
//! operators, numeric shorthands, per-element error flow, and terminal
//! aggregations.

pub mod aggregate;
pub mod distinct;
pub mod join;
pub mod merge;
pub mod numeric;
pub mod parallel;
pub mod product;
pub mod results;
pub mod sort;
pub mod time;
pub mod window;
pub mod zip;
