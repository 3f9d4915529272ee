//! Time-aware operators.
//!
//! Operators that must race upstream production against a timer
//! (`debounce`, `sample`, `timeout`, the time-window family) move the
//! upstream onto a pump thread feeding a bounded channel, then `select!`
//! over {elements, timer channels, the context's `done` channel}. Timing
//! uses the monotonic clock via `crossbeam_channel::{after, at, tick}`,
//! and every timer is dropped at cancellation, so nothing lingers once
//! the token fires. The pump thread itself exits at its next send after
//! the consumer goes away.
//!
//! Pacing operators (`throttle`, `rate_limit`, `delay`) need no race and
//! run on the consumer's thread.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::{after, at, bounded, never, select, tick, Receiver};

use crate::context::Context;
use crate::error::Error;
use crate::stream::Stream;
use crate::Data;

/// Elements buffered between the pump thread and a time operator.
const PUMP_BUFFER: usize = 64;

/// Moves `stream` onto a producer thread, stamping each element with its
/// arrival instant.
fn pump<T: Data>(stream: Stream<T>) -> Receiver<(Instant, T)> {
    let (tx, rx) = bounded(PUMP_BUFFER);
    let iter = stream.iter;
    std::thread::spawn(move || {
        for x in iter {
            if tx.send((Instant::now(), x)).is_err() {
                break;
            }
        }
    });
    rx
}

impl<T: Data> Stream<T> {
    /// Attaches the emission instant to each element.
    pub fn with_timestamp(self) -> Stream<(Instant, T)> {
        self.map(|x| (Instant::now(), x))
    }

    /// Emits an element only once `quiet` has elapsed without a newer
    /// one; each arrival replaces the pending value and restarts the
    /// timer.
    ///
    /// At upstream exhaustion or cancellation the last pending value, if
    /// any, is emitted before the stream ends.
    pub fn debounce(self, ctx: &Context, quiet: Duration) -> Stream<T> {
        let done = ctx.done();
        let guard = ctx.clone();
        let rx = pump(self);
        let mut pending: Option<T> = None;
        let mut timer = never();
        let mut finished = false;
        let mut stream = Stream::new(std::iter::from_fn(move || {
            if finished {
                return None;
            }
            loop {
                select! {
                    recv(rx) -> msg => match msg {
                        Ok((_, x)) => {
                            pending = Some(x);
                            timer = after(quiet);
                        }
                        Err(_) => {
                            finished = true;
                            return pending.take();
                        }
                    },
                    recv(timer) -> _ => {
                        timer = never();
                        if let Some(x) = pending.take() {
                            return Some(x);
                        }
                    }
                    recv(done) -> _ => {
                        finished = true;
                        return pending.take();
                    }
                }
            }
        }));
        stream.ctx = Some(guard);
        stream
    }

    /// After each emission, drops elements arriving within `min_gap`.
    pub fn throttle(self, min_gap: Duration) -> Stream<T> {
        let rx = pump(self);
        let mut last_emit: Option<Instant> = None;
        Stream::new(std::iter::from_fn(move || loop {
            let (arrived, x) = rx.recv().ok()?;
            if last_emit.is_none_or(|prev| arrived.duration_since(prev) >= min_gap) {
                last_emit = Some(arrived);
                return Some(x);
            }
        }))
    }

    /// Allows at most `n` emissions per rolling `window`; excess pulls
    /// wait their turn rather than dropping.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn rate_limit(self, n: usize, window: Duration) -> Stream<T> {
        assert!(n > 0, "rate_limit requires a positive budget");
        self.wrap(move |mut it| {
            let mut emitted: VecDeque<Instant> = VecDeque::with_capacity(n);
            Box::new(std::iter::from_fn(move || {
                let x = it.next()?;
                if emitted.len() == n {
                    let oldest = emitted.pop_front().expect("budget entries present");
                    let reopens = oldest + window;
                    let now = Instant::now();
                    if reopens > now {
                        std::thread::sleep(reopens - now);
                    }
                }
                emitted.push_back(Instant::now());
                Some(x)
            }))
        })
    }

    /// Every `period`, emits the most recent upstream value since the
    /// last tick; silent ticks emit nothing.
    pub fn sample(self, ctx: &Context, period: Duration) -> Stream<T> {
        let done = ctx.done();
        let guard = ctx.clone();
        let rx = pump(self);
        let ticker = tick(period);
        let mut latest: Option<T> = None;
        let mut stream = Stream::new(std::iter::from_fn(move || loop {
            select! {
                recv(rx) -> msg => match msg {
                    Ok((_, x)) => latest = Some(x),
                    Err(_) => return None,
                },
                recv(ticker) -> _ => {
                    if let Some(x) = latest.take() {
                        return Some(x);
                    }
                }
                recv(done) -> _ => return None,
            }
        }));
        stream.ctx = Some(guard);
        stream
    }

    /// Shifts every emission `delay` after its upstream production.
    pub fn delay(self, delay: Duration) -> Stream<T> {
        let rx = pump(self);
        Stream::new(std::iter::from_fn(move || {
            let (arrived, x) = rx.recv().ok()?;
            let due = arrived + delay;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
            Some(x)
        }))
    }

    /// Ends the stream with [`Error::Timeout`] on `ctx` if no upstream
    /// element arrives within `limit` of the previous one.
    pub fn timeout(self, ctx: &Context, limit: Duration) -> Stream<T> {
        let done = ctx.done();
        let guard = ctx.clone();
        let rx = pump(self);
        let mut stream = Stream::new(std::iter::from_fn(move || {
            select! {
                recv(rx) -> msg => msg.ok().map(|(_, x)| x),
                recv(after(limit)) -> _ => {
                    guard.cancel_with(Error::Timeout(limit));
                    None
                }
                recv(done) -> _ => None,
            }
        }));
        stream.ctx = Some(ctx.clone());
        stream
    }

    /// Partitions time into consecutive intervals of `size` and emits the
    /// non-empty batches, each at its interval's end.
    pub fn tumbling_windows(self, ctx: &Context, size: Duration) -> Stream<Vec<T>> {
        let done = ctx.done();
        let guard = ctx.clone();
        let rx = pump(self);
        let mut boundary: Option<Instant> = None;
        let mut buf: Vec<T> = Vec::new();
        let mut finished = false;
        let mut stream = Stream::new(std::iter::from_fn(move || {
            if finished {
                return None;
            }
            let mut edge = *boundary.get_or_insert_with(|| Instant::now() + size);
            loop {
                select! {
                    recv(rx) -> msg => match msg {
                        Ok((_, x)) => buf.push(x),
                        Err(_) => {
                            finished = true;
                            return if buf.is_empty() { None } else { Some(std::mem::take(&mut buf)) };
                        }
                    },
                    recv(at(edge)) -> _ => {
                        edge += size;
                        boundary = Some(edge);
                        if !buf.is_empty() {
                            return Some(std::mem::take(&mut buf));
                        }
                    }
                    recv(done) -> _ => {
                        finished = true;
                        return if buf.is_empty() { None } else { Some(std::mem::take(&mut buf)) };
                    }
                }
            }
        }));
        stream.ctx = Some(guard);
        stream
    }

    /// Overlapping windows of `size` starting every `slide`, each emitted
    /// at its closing edge; empty windows are skipped.
    pub fn sliding_windows(self, ctx: &Context, size: Duration, slide: Duration) -> Stream<Vec<T>>
    where
        T: Clone,
    {
        let done = ctx.done();
        let guard = ctx.clone();
        let rx = pump(self);
        let mut close: Option<Instant> = None;
        let mut buf: VecDeque<(Instant, T)> = VecDeque::new();
        let mut finished = false;
        let mut stream = Stream::new(std::iter::from_fn(move || {
            if finished {
                return None;
            }
            loop {
                let edge = *close.get_or_insert_with(|| Instant::now() + size);
                select! {
                    recv(rx) -> msg => match msg {
                        Ok(stamped) => buf.push_back(stamped),
                        Err(_) => {
                            finished = true;
                            let tail: Vec<T> = buf.drain(..).map(|(_, x)| x).collect();
                            return if tail.is_empty() { None } else { Some(tail) };
                        }
                    },
                    recv(at(edge)) -> _ => {
                        let window: Vec<T> =
                            buf.iter().map(|(_, x)| x.clone()).collect();
                        // Elements older than the next window's start are
                        // out of every future window.
                        let next_start = edge - size + slide;
                        while buf.front().is_some_and(|(t, _)| *t < next_start) {
                            buf.pop_front();
                        }
                        close = Some(edge + slide);
                        if !window.is_empty() {
                            return Some(window);
                        }
                    }
                    recv(done) -> _ => {
                        finished = true;
                        let tail: Vec<T> = buf.drain(..).map(|(_, x)| x).collect();
                        return if tail.is_empty() { None } else { Some(tail) };
                    }
                }
            }
        }));
        stream.ctx = Some(guard);
        stream
    }

    /// Groups elements whose inter-arrival gap stays within `gap` and
    /// closes the session after `gap` of inactivity.
    ///
    /// An arrival landing exactly at gap expiry belongs to the next
    /// session.
    pub fn session_windows(self, ctx: &Context, gap: Duration) -> Stream<Vec<T>> {
        let done = ctx.done();
        let guard = ctx.clone();
        let rx = pump(self);
        let mut buf: Vec<T> = Vec::new();
        let mut last_arrival: Option<Instant> = None;
        let mut finished = false;
        let mut stream = Stream::new(std::iter::from_fn(move || {
            if finished {
                return None;
            }
            loop {
                let expiry = match last_arrival {
                    Some(t) if !buf.is_empty() => at(t + gap),
                    _ => never(),
                };
                select! {
                    recv(rx) -> msg => match msg {
                        Ok((arrived, x)) => {
                            let stale = last_arrival
                                .is_some_and(|t| arrived.duration_since(t) >= gap);
                            last_arrival = Some(arrived);
                            if stale && !buf.is_empty() {
                                let closed = std::mem::take(&mut buf);
                                buf.push(x);
                                return Some(closed);
                            }
                            buf.push(x);
                        }
                        Err(_) => {
                            finished = true;
                            return if buf.is_empty() { None } else { Some(std::mem::take(&mut buf)) };
                        }
                    },
                    recv(expiry) -> _ => {
                        if !buf.is_empty() {
                            return Some(std::mem::take(&mut buf));
                        }
                    }
                    recv(done) -> _ => {
                        finished = true;
                        return if buf.is_empty() { None } else { Some(std::mem::take(&mut buf)) };
                    }
                }
            }
        }));
        stream.ctx = Some(guard);
        stream
    }

    /// Emits `value` once, `delay` after construction.
    pub fn timer(ctx: &Context, delay: Duration, value: T) -> Stream<T>
    where
        T: Clone,
    {
        let done = ctx.done();
        let guard = ctx.clone();
        let alarm = after(delay);
        let mut fired = false;
        let mut stream = Stream::new(std::iter::from_fn(move || {
            if fired {
                return None;
            }
            fired = true;
            select! {
                recv(alarm) -> _ => Some(value.clone()),
                recv(done) -> _ => None,
            }
        }));
        stream.ctx = Some(guard);
        stream
    }
}

impl Stream<u64> {
    /// Emits `0, 1, 2, ...` every `period` until `ctx` is canceled.
    pub fn interval(ctx: &Context, period: Duration) -> Stream<u64> {
        let done = ctx.done();
        let guard = ctx.clone();
        let ticker = tick(period);
        let mut n = 0_u64;
        let mut stream = Stream::new(std::iter::from_fn(move || {
            select! {
                recv(ticker) -> msg => msg.ok().map(|_| {
                    let tick_index = n;
                    n += 1;
                    tick_index
                }),
                recv(done) -> _ => None,
            }
        }));
        stream.ctx = Some(guard);
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    /// A source that emits `values` with the given gaps before each.
    fn spaced<T: Data>(values: Vec<(u64, T)>) -> Stream<T> {
        Stream::of(values).map(|(gap_ms, x)| {
            std::thread::sleep(Duration::from_millis(gap_ms));
            x
        })
    }

    #[test]
    fn debounce_keeps_the_last_of_a_burst() {
        let ctx = Context::background();
        let out = spaced(vec![(0, 1), (1, 2), (1, 3), (40, 4)]).debounce(&ctx, TICK).collect();
        assert_eq!(out, vec![3, 4]);
    }

    #[test]
    fn debounce_flushes_pending_on_cancel() {
        let ctx = Context::with_timeout(Duration::from_millis(30));
        let out = Stream::of([1, 2, 3])
            .chain(Stream::generate(|| {
                std::thread::sleep(Duration::from_millis(5));
                99
            }))
            .take(4)
            .debounce(&ctx, Duration::from_millis(500))
            .collect();
        // Nothing outlasts the quiet period before the deadline, so the
        // pending value flushes at cancellation.
        assert_eq!(out, vec![99]);
    }

    #[test]
    fn throttle_drops_inside_the_quiet_period() {
        let out = spaced(vec![(0, 1), (1, 2), (30, 3), (1, 4)]).throttle(TICK).collect();
        assert_eq!(out, vec![1, 3]);
    }

    #[test]
    fn rate_limit_paces_without_dropping() {
        let started = Instant::now();
        let out = Stream::of(1..=6).rate_limit(2, Duration::from_millis(20)).collect();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);
        // Six elements at two per 20ms leaves two full waits.
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn sample_takes_the_latest_value() {
        let ctx = Context::background();
        let out = spaced(vec![(0, 1), (2, 2), (2, 3), (25, 4)]).sample(&ctx, Duration::from_millis(15)).collect();
        assert!(out.contains(&3), "latest of the opening burst: {out:?}");
        assert!(!out.contains(&2), "superseded value must not emit: {out:?}");
    }

    #[test]
    fn delay_shifts_emissions() {
        let started = Instant::now();
        let out = Stream::of([1, 2]).delay(Duration::from_millis(15)).collect();
        assert_eq!(out, vec![1, 2]);
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn timeout_cancels_the_context() {
        let ctx = Context::cancelable();
        let (out, err) = spaced(vec![(0, 1), (1, 2), (60, 3)])
            .timeout(&ctx, Duration::from_millis(20))
            .collect_ctx(&ctx);
        assert_eq!(out, vec![1, 2]);
        assert_eq!(err, Some(Error::Timeout(Duration::from_millis(20))));
    }

    #[test]
    fn tumbling_windows_partition_by_arrival() {
        let ctx = Context::background();
        let out = spaced(vec![(0, 1), (1, 2), (30, 3)])
            .tumbling_windows(&ctx, Duration::from_millis(20))
            .collect();
        assert_eq!(out, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn session_windows_split_on_gaps() {
        let ctx = Context::background();
        let out = spaced(vec![(0, 1), (2, 2), (40, 3), (2, 4)])
            .session_windows(&ctx, Duration::from_millis(15))
            .collect();
        assert_eq!(out, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn interval_and_timer_tick_until_canceled() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        let ticks = Stream::interval(&ctx, Duration::from_millis(10)).take(3).collect();
        assert_eq!(ticks, vec![0, 1, 2]);

        let ctx = Context::background();
        let once = Stream::timer(&ctx, Duration::from_millis(5), "done").collect();
        assert_eq!(once, vec!["done"]);

        let ctx = Context::cancelable();
        ctx.cancel();
        assert_eq!(Stream::timer(&ctx, Duration::from_millis(5), 1).count(), 0);
    }
}
