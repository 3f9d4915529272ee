//! Ordering, equivalence, and cancellation guarantees of the parallel
//! engine.

use std::time::Duration;

use rand::Rng;
use rill::{Context, Error, ParallelOptions, Stream};

fn jittery(n: i64) -> i64 {
    std::thread::sleep(Duration::from_millis(rand::thread_rng().gen_range(0..4)));
    n * 2 + 1
}

#[test]
fn ordered_parallel_map_equals_sequential_map() {
    for concurrency in [1, 2, 3, 8] {
        let opts = ParallelOptions::with_concurrency(concurrency);
        let parallel = Stream::of(1..=40_i64).par_map(&opts, jittery).collect();
        let sequential = Stream::of(1..=40_i64).map(|n| n * 2 + 1).collect();
        assert_eq!(parallel, sequential, "concurrency={concurrency}");
    }
}

#[test]
fn parallel_map_squares_in_order() {
    let opts = ParallelOptions::with_concurrency(2);
    let out = Stream::range(1_i64, 6).par_map(&opts, |n| n * n).collect();
    assert_eq!(out, vec![1, 4, 9, 16, 25]);
}

#[test]
fn chunked_flat_map_keeps_global_order() {
    let opts = ParallelOptions::with_concurrency(3).chunk_size(2);
    let out = Stream::range(1, 6).par_flat_map(&opts, |n| Stream::of([n, n + 100])).collect();
    assert_eq!(out, vec![1, 101, 2, 102, 3, 103, 4, 104, 5, 105]);
}

#[test]
fn parallel_reduce_matches_sequential_fold() {
    let input: Vec<i64> = (1..=500).collect();
    let sequential = Stream::of(input.clone()).fold(0, |a, b| a + b);
    for chunk in [1, 7, 64] {
        let opts = ParallelOptions::with_concurrency(4).chunk_size(chunk);
        let parallel = Stream::of(input.clone()).par_reduce(&opts, 0, |a, b| a + b);
        assert_eq!(parallel, sequential, "chunk={chunk}");
    }
}

#[test]
fn unordered_output_is_the_same_multiset() {
    let opts = ParallelOptions::with_concurrency(4).ordered(false);
    let mut out = Stream::of(1..=60_i64).par_map(&opts, jittery).collect();
    let mut expected = Stream::of(1..=60_i64).map(|n| n * 2 + 1).collect();
    out.sort_unstable();
    expected.sort_unstable();
    assert_eq!(out, expected);
}

#[test]
fn canceled_terminal_returns_a_prefix() {
    let full: Vec<i64> = Stream::of(1..=1000_i64).map(|n| n * 3).collect();

    let ctx = Context::cancelable();
    let trigger = ctx.clone();
    let (partial, err) = Stream::of(1..=1000_i64)
        .map(|n| n * 3)
        .inspect(move |&n| {
            if n == 300 {
                trigger.cancel();
            }
        })
        .with_context(&ctx)
        .collect_ctx(&ctx);

    assert_eq!(err, Some(Error::Canceled));
    assert!(partial.len() < full.len());
    assert_eq!(partial[..], full[..partial.len()]);
}

#[test]
fn deadline_context_stops_an_infinite_pipeline() {
    let ctx = Context::with_timeout(Duration::from_millis(40));
    let (out, err) = Stream::generate(|| {
        std::thread::sleep(Duration::from_millis(2));
        1_u32
    })
    .with_context(&ctx)
    .collect_ctx(&ctx);
    assert_eq!(err, Some(Error::DeadlineExceeded));
    assert!(!out.is_empty());
}

#[test]
fn prefetch_composes_with_parallel_stages() {
    let opts = ParallelOptions::with_concurrency(3);
    let out = Stream::of(1..=100_i64).prefetch(16).par_map(&opts, |n| n + 1).prefetch(4).collect();
    assert_eq!(out, (2..=101).collect::<Vec<_>>());
}
