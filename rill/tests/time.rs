//! End-to-end behavior of the time-aware operators under cancellation.

use std::time::Duration;

use rill::{Context, Error, Stream};

#[test]
fn debounce_flushes_the_last_value_at_cancellation() {
    // Three immediate values, then silence held open by an unclosed
    // channel; the deadline fires while the debounce is still waiting.
    let (_hold, rx) = crossbeam_channel::unbounded::<i32>();
    let ctx = Context::with_timeout(Duration::from_millis(30));

    let (out, err) = Stream::of([1, 2, 3])
        .chain(Stream::from_channel(rx))
        .debounce(&ctx, Duration::from_millis(5))
        .collect_ctx(&ctx);

    assert_eq!(out, vec![3]);
    assert_eq!(err, Some(Error::DeadlineExceeded));
}

#[test]
fn timeout_reports_through_a_ctx_terminal() {
    let (_hold, rx) = crossbeam_channel::unbounded::<i32>();
    let ctx = Context::cancelable();

    let (out, err) = Stream::of([7, 8])
        .chain(Stream::from_channel(rx))
        .timeout(&ctx, Duration::from_millis(15))
        .collect_ctx(&ctx);

    assert_eq!(out, vec![7, 8]);
    assert_eq!(err, Some(Error::Timeout(Duration::from_millis(15))));
}

#[test]
fn interval_stops_when_its_context_expires() {
    let ctx = Context::with_timeout(Duration::from_millis(45));
    let ticks = Stream::interval(&ctx, Duration::from_millis(10)).collect();
    assert!(!ticks.is_empty() && ticks.len() <= 5, "ticks: {ticks:?}");
    assert_eq!(ticks[0], 0);
}

#[test]
fn canceled_channel_source_reports_exhausted() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let ctx = Context::cancelable();
    tx.send(1).unwrap();
    tx.send(2).unwrap();

    let canceler = ctx.clone();
    let (out, err) = Stream::from_channel_ctx(&ctx, rx)
        .inspect(move |&n| {
            if n == 2 {
                canceler.cancel();
            }
        })
        .collect_ctx(&ctx);

    assert_eq!(out, vec![1]);
    assert_eq!(err, Some(Error::Canceled));
}

#[test]
fn windows_compose_with_aggregation() {
    let ctx = Context::background();
    let totals: Vec<i32> = Stream::of([(0_u64, 1), (1, 2), (30, 10), (1, 20)])
        .map(|(gap_ms, x)| {
            std::thread::sleep(Duration::from_millis(gap_ms));
            x
        })
        .tumbling_windows(&ctx, Duration::from_millis(20))
        .map(|w| w.into_iter().sum())
        .collect();
    assert_eq!(totals, vec![3, 30]);
}
