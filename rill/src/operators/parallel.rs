//! The parallel execution engine.
//!
//! A parallel stage owns a pool of worker threads fed over a bounded
//! channel. The dispatcher runs on the consumer's thread: each downstream
//! pull tops the in-flight window up to `concurrency + prefetch` items and
//! then receives results, so backpressure is built into the channel
//! capacities and neither side can outrun the other by more than the
//! window. Workers spawn at the first pull and are joined before the
//! stage reports exhausted (or when it is dropped early).
//!
//! With ordered output (the default), results re-sequence through a
//! min-heap keyed by input index and emit exactly in upstream order; the
//! heap is bounded by the in-flight window. Unordered output emits in
//! arrival order. Chunked flat-mapping dispatches `chunk_size` consecutive
//! inputs as one work item whose sub-results concatenate in input order,
//! bounding the reorder buffer for expansions.
//!
//! A worker panic is captured and re-raised on the consumer after all
//! outstanding work has drained; with ordered output the panic earliest in
//! input order wins, otherwise the first to arrive.

use std::collections::BinaryHeap;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::collector::Collector;
use crate::seq::{boxed, BoxIter};
use crate::stream::Stream;
use crate::Data;

/// Execution options for a parallel stage.
#[derive(Clone, Debug)]
pub struct ParallelOptions {
    concurrency: usize,
    ordered: bool,
    chunk_size: usize,
    prefetch: usize,
}

impl Default for ParallelOptions {
    /// Logical CPU count, ordered output, single-element chunks, no extra
    /// prefetch.
    fn default() -> ParallelOptions {
        ParallelOptions {
            concurrency: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            ordered: true,
            chunk_size: 1,
            prefetch: 0,
        }
    }
}

impl ParallelOptions {
    /// Options with the given worker count (clamped to at least one).
    pub fn with_concurrency(n: usize) -> ParallelOptions {
        ParallelOptions::default().concurrency(n)
    }

    /// Sets the worker count (clamped to at least one).
    pub fn concurrency(mut self, n: usize) -> ParallelOptions {
        self.concurrency = n.max(1);
        self
    }

    /// Chooses between upstream-order output and arrival-order output.
    pub fn ordered(mut self, ordered: bool) -> ParallelOptions {
        self.ordered = ordered;
        self
    }

    /// Sets how many consecutive inputs form one flat-map work item
    /// (clamped to at least one).
    pub fn chunk_size(mut self, k: usize) -> ParallelOptions {
        self.chunk_size = k.max(1);
        self
    }

    /// Extends the in-flight window beyond the worker count.
    pub fn prefetch(mut self, n: usize) -> ParallelOptions {
        self.prefetch = n;
        self
    }

    fn window(&self) -> usize {
        self.concurrency + self.prefetch
    }
}

type Payload<O> = std::thread::Result<O>;

/// A completed work item waiting for its turn in ordered mode.
struct Slot<O> {
    index: usize,
    payload: Payload<O>,
}

impl<O> PartialEq for Slot<O> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<O> Eq for Slot<O> {}

impl<O> PartialOrd for Slot<O> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<O> Ord for Slot<O> {
    // Reversed so the BinaryHeap surfaces the lowest index first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.index.cmp(&self.index)
    }
}

/// The dispatcher-and-reorder loop, driven from the consumer thread.
struct ParallelIter<I, O> {
    upstream: Option<BoxIter<I>>,
    task: Arc<dyn Fn(I) -> O + Send + Sync>,
    concurrency: usize,
    window: usize,
    ordered: bool,
    work_tx: Option<Sender<(usize, I)>>,
    results: Option<Receiver<(usize, Payload<O>)>>,
    workers: Vec<JoinHandle<()>>,
    pending: BinaryHeap<Slot<O>>,
    in_flight: usize,
    next_index: usize,
    emit_index: usize,
    started: bool,
}

impl<I: Send + 'static, O: Send + 'static> ParallelIter<I, O> {
    fn new(
        upstream: BoxIter<I>,
        opts: &ParallelOptions,
        task: Arc<dyn Fn(I) -> O + Send + Sync>,
    ) -> ParallelIter<I, O> {
        ParallelIter {
            upstream: Some(upstream),
            task,
            concurrency: opts.concurrency.max(1),
            window: opts.window().max(1),
            ordered: opts.ordered,
            work_tx: None,
            results: None,
            workers: Vec::new(),
            pending: BinaryHeap::new(),
            in_flight: 0,
            next_index: 0,
            emit_index: 0,
            started: false,
        }
    }

    fn start(&mut self) {
        let (work_tx, work_rx) = bounded::<(usize, I)>(self.window);
        let (result_tx, result_rx) = bounded::<(usize, Payload<O>)>(self.window);
        for _ in 0..self.concurrency {
            let work = work_rx.clone();
            let results = result_tx.clone();
            let task = Arc::clone(&self.task);
            self.workers.push(std::thread::spawn(move || {
                while let Ok((index, item)) = work.recv() {
                    let payload = catch_unwind(AssertUnwindSafe(|| task(item)));
                    if results.send((index, payload)).is_err() {
                        break;
                    }
                }
            }));
        }
        self.work_tx = Some(work_tx);
        self.results = Some(result_rx);
    }

    /// Tops the in-flight window up from upstream. Sends cannot block:
    /// the channel capacity equals the window. Reorder-buffered results
    /// count against the window, so a slow item cannot let the buffer
    /// grow past it.
    fn dispatch(&mut self) {
        while self.in_flight + self.pending.len() < self.window {
            let Some(up) = self.upstream.as_mut() else { return };
            match up.next() {
                Some(item) => {
                    let Some(tx) = self.work_tx.as_ref() else { return };
                    if tx.send((self.next_index, item)).is_err() {
                        // Worker pool gone; treat as exhaustion.
                        self.upstream = None;
                        self.work_tx = None;
                        return;
                    }
                    self.next_index += 1;
                    self.in_flight += 1;
                }
                None => {
                    // Dropping the sender lets idle workers exit.
                    self.upstream = None;
                    self.work_tx = None;
                    return;
                }
            }
        }
    }

    /// Drains outstanding work, joins the pool, and re-raises `payload`.
    fn fail(&mut self, payload: Box<dyn std::any::Any + Send>) -> ! {
        self.upstream = None;
        self.work_tx = None;
        if let Some(results) = self.results.take() {
            while self.in_flight > 0 && results.recv().is_ok() {
                self.in_flight -= 1;
            }
        }
        self.join_pool();
        resume_unwind(payload)
    }

    fn join_pool(&mut self) {
        self.results = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl<I: Send + 'static, O: Send + 'static> Iterator for ParallelIter<I, O> {
    type Item = O;

    fn next(&mut self) -> Option<O> {
        if !self.started {
            self.started = true;
            self.start();
        }
        loop {
            self.dispatch();
            if self.ordered {
                if self.pending.peek().is_some_and(|slot| slot.index == self.emit_index) {
                    let slot = self.pending.pop().expect("peeked above");
                    self.emit_index += 1;
                    match slot.payload {
                        Ok(out) => return Some(out),
                        Err(panic) => self.fail(panic),
                    }
                }
            }
            if self.in_flight == 0 {
                if self.upstream.is_none() {
                    self.join_pool();
                    return None;
                }
                continue;
            }
            let received = self.results.as_ref().and_then(|rx| rx.recv().ok());
            match received {
                Some((index, payload)) => {
                    self.in_flight -= 1;
                    if self.ordered {
                        self.pending.push(Slot { index, payload });
                    } else {
                        match payload {
                            Ok(out) => return Some(out),
                            Err(panic) => self.fail(panic),
                        }
                    }
                }
                None => {
                    self.join_pool();
                    return None;
                }
            }
        }
    }
}

impl<I, O> Drop for ParallelIter<I, O> {
    fn drop(&mut self) {
        // Disconnect both channels so every worker unblocks, then join.
        self.upstream = None;
        self.work_tx = None;
        self.results = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Groups consecutive elements into vectors of at most `size`.
fn chunked<T: Send + 'static>(mut it: BoxIter<T>, size: usize) -> BoxIter<Vec<T>> {
    boxed(std::iter::from_fn(move || {
        let mut chunk = Vec::with_capacity(size);
        while chunk.len() < size {
            match it.next() {
                Some(x) => chunk.push(x),
                None => break,
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }))
}

impl<T: Data> Stream<T> {
    /// Applies `f` across the worker pool.
    ///
    /// With ordered output this is element-wise equal to [`map`](Stream::map)
    /// for any concurrency.
    pub fn par_map<U: Data>(
        self,
        opts: &ParallelOptions,
        f: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Stream<U> {
        let opts = opts.clone();
        self.wrap(move |it| boxed(ParallelIter::new(it, &opts, Arc::new(f))))
    }

    /// Evaluates `predicate` across the worker pool, retaining the
    /// elements it accepts.
    pub fn par_filter(
        self,
        opts: &ParallelOptions,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Stream<T> {
        self.par_map(opts, move |x| {
            let keep = predicate(&x);
            (x, keep)
        })
        .flat_map(|(x, keep)| keep.then_some(x))
    }

    /// Expands each element into a sub-stream across the worker pool.
    ///
    /// Inputs are dispatched in groups of `chunk_size`; a chunk's
    /// sub-results concatenate in input order, and with ordered output
    /// chunks re-sequence by index, so the full output preserves input
    /// order while the reorder buffer stays bounded by
    /// `chunk_size × window`. Sub-streams are materialised one input at a
    /// time inside the worker.
    pub fn par_flat_map<U: Data>(
        self,
        opts: &ParallelOptions,
        f: impl Fn(T) -> Stream<U> + Send + Sync + 'static,
    ) -> Stream<U> {
        let opts = opts.clone();
        self.wrap(move |it| {
            let chunks = chunked(it, opts.chunk_size.max(1));
            let task = Arc::new(move |chunk: Vec<T>| {
                let mut out = Vec::new();
                for x in chunk {
                    out.extend(f(x).iter);
                }
                out
            });
            boxed(ParallelIter::new(chunks, &opts, task).flatten())
        })
    }

    /// Applies `f` to every element across the worker pool, draining the
    /// stream.
    pub fn par_for_each(self, opts: &ParallelOptions, f: impl Fn(T) + Send + Sync + 'static) {
        self.par_map(opts, move |x| f(x)).for_each(|()| {});
    }

    /// Reduces with an associative `op` whose identity is `init`.
    ///
    /// Workers fold chunks independently and the partial results combine
    /// in emission order, so `op` must be associative and `init` its
    /// identity for the result to be deterministic.
    pub fn par_reduce(
        self,
        opts: &ParallelOptions,
        init: T,
        op: impl Fn(T, T) -> T + Send + Sync + 'static,
    ) -> T
    where
        T: Clone + Sync,
    {
        let op = Arc::new(op);
        let fold_op = Arc::clone(&op);
        let seed = init.clone();
        let opts = opts.clone();
        let partials = self.wrap(move |it| {
            let chunks = chunked(it, opts.chunk_size.max(1));
            let task = Arc::new(move |chunk: Vec<T>| {
                chunk.into_iter().fold(seed.clone(), |a, b| fold_op(a, b))
            });
            boxed(ParallelIter::new(chunks, &opts, task))
        });
        partials.fold(init, |a, b| op(a, b))
    }

    /// Runs a [`Collector`] with worker-side accumulation.
    ///
    /// Requires the collector's combiner; a collector without one cannot
    /// merge partial accumulations, so this falls back to sequential
    /// accumulation and says so in the log.
    pub fn par_collect<A, R: 'static>(self, opts: &ParallelOptions, collector: Collector<T, A, R>) -> R
    where
        A: Send + 'static,
    {
        if !collector.has_combiner() {
            log::warn!("par_collect: collector has no combiner; accumulating sequentially");
            return self.collect_with(collector);
        }
        let shared = Arc::new(collector);
        let accumulate = Arc::clone(&shared);
        let opts = opts.clone();
        let partials = self.wrap(move |it| {
            let chunks = chunked(it, opts.chunk_size.max(1));
            let task = Arc::new(move |chunk: Vec<T>| {
                let mut acc = accumulate.supply();
                for x in chunk {
                    acc = accumulate.accumulate(acc, x);
                }
                acc
            });
            boxed(ParallelIter::new(chunks, &opts, task))
        });
        let mut merged: Option<A> = None;
        for partial in partials.iter {
            merged = Some(match merged {
                Some(acc) => shared.combine(acc, partial),
                None => partial,
            });
        }
        let acc = merged.unwrap_or_else(|| shared.supply());
        shared.finish(acc)
    }

    /// Decouples this stream from a slow consumer: one producer thread
    /// eagerly fills a buffer of `n` elements.
    ///
    /// Sequential — elements stay in order — but the producer runs ahead
    /// by up to `n` elements. A panic inside the producer re-raises at the
    /// consumer.
    pub fn prefetch(self, n: usize) -> Stream<T> {
        let ctx = self.ctx.clone();
        let iter = self.iter;
        let (tx, rx) = bounded(n.max(1));
        let producer = std::thread::spawn(move || {
            for x in iter {
                if tx.send(x).is_err() {
                    break;
                }
            }
        });
        let mut stream = Stream::new(PrefetchIter { rx: Some(rx), producer: Some(producer) });
        stream.ctx = ctx;
        stream
    }
}

struct PrefetchIter<T> {
    rx: Option<Receiver<T>>,
    producer: Option<JoinHandle<()>>,
}

impl<T> Iterator for PrefetchIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.rx.as_ref()?.recv() {
            Ok(x) => Some(x),
            Err(_) => {
                self.rx = None;
                if let Some(producer) = self.producer.take() {
                    if let Err(panic) = producer.join() {
                        resume_unwind(panic);
                    }
                }
                None
            }
        }
    }
}

impl<T> Drop for PrefetchIter<T> {
    fn drop(&mut self) {
        // Disconnect first so the producer's next send unblocks it.
        self.rx = None;
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn slow_square(n: i64) -> i64 {
        // Uneven delays shuffle completion order.
        std::thread::sleep(Duration::from_millis((n % 3) as u64 * 3));
        n * n
    }

    #[test]
    fn ordered_par_map_matches_sequential() {
        for concurrency in [1, 2, 4] {
            let opts = ParallelOptions::with_concurrency(concurrency);
            let out = Stream::of(1..=20_i64).par_map(&opts, slow_square).collect();
            let expected: Vec<i64> = (1..=20).map(|n| n * n).collect();
            assert_eq!(out, expected, "concurrency={concurrency}");
        }
    }

    #[test]
    fn unordered_par_map_is_a_permutation() {
        let opts = ParallelOptions::with_concurrency(4).ordered(false);
        let mut out = Stream::of(1..=20_i64).par_map(&opts, slow_square).collect();
        out.sort_unstable();
        let expected: Vec<i64> = (1..=20).map(|n| n * n).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn par_filter_keeps_order() {
        let opts = ParallelOptions::with_concurrency(3);
        let out = Stream::of(1..=10).par_filter(&opts, |n| n % 2 == 0).collect();
        assert_eq!(out, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn chunked_par_flat_map_preserves_order() {
        let opts = ParallelOptions::with_concurrency(3).chunk_size(2);
        let out = Stream::of(1..=5).par_flat_map(&opts, |n| Stream::of([n, n + 100])).collect();
        assert_eq!(out, vec![1, 101, 2, 102, 3, 103, 4, 104, 5, 105]);
    }

    #[test]
    fn par_reduce_associative_sum() {
        let opts = ParallelOptions::with_concurrency(4).chunk_size(3);
        let total = Stream::of(1..=100_i64).par_reduce(&opts, 0, |a, b| a + b);
        assert_eq!(total, 5050);
    }

    #[test]
    fn worker_panic_reraises_on_consumer() {
        let opts = ParallelOptions::with_concurrency(2);
        let outcome = std::panic::catch_unwind(|| {
            Stream::of(1..=10)
                .par_map(&opts, |n| {
                    assert!(n != 7, "seven is right out");
                    n
                })
                .collect()
        });
        assert!(outcome.is_err());
    }

    #[test]
    fn early_drop_joins_the_pool() {
        let opts = ParallelOptions::with_concurrency(2);
        let taken = Stream::of(1..=1000_i64).par_map(&opts, slow_square).take(3).collect();
        assert_eq!(taken, vec![1, 4, 9]);
        // Dropping the rest of the stage must not hang or leak; reaching
        // here after the drop is the assertion.
    }

    #[test]
    fn prefetch_preserves_order_and_content() {
        let out = Stream::of(1..=50).prefetch(8).collect();
        assert_eq!(out, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn par_for_each_visits_everything() {
        use std::sync::atomic::{AtomicI64, Ordering};
        let sum = Arc::new(AtomicI64::new(0));
        let seen = Arc::clone(&sum);
        let opts = ParallelOptions::with_concurrency(4);
        Stream::of(1..=100_i64).par_for_each(&opts, move |n| {
            seen.fetch_add(n, Ordering::SeqCst);
        });
        assert_eq!(sum.load(Ordering::SeqCst), 5050);
    }
}
