//! Count-based windows, chunks, and prefix scans.
//!
//! A window is a bounded batch of consecutive upstream elements; chunks
//! are the non-overlapping special case (step = size) and always emit
//! their final partial batch. Windows shorter than `size` emit nothing
//! unless the partial-last flag is set.

use std::collections::VecDeque;

use crate::seq::boxed;
use crate::stream::Stream;
use crate::Data;

impl<T: Data> Stream<T> {
    /// Sliding windows of `size`, advancing by one element.
    ///
    /// Inputs shorter than `size` emit nothing.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn window(self, size: usize) -> Stream<Vec<T>>
    where
        T: Clone,
    {
        self.window_with_step(size, 1, false)
    }

    /// Windows of `size` starting every `step` elements.
    ///
    /// With `emit_partial_last`, the trailing window that could not fill
    /// is emitted once at exhaustion.
    ///
    /// # Panics
    ///
    /// Panics if `size` or `step` is zero.
    pub fn window_with_step(self, size: usize, step: usize, emit_partial_last: bool) -> Stream<Vec<T>>
    where
        T: Clone,
    {
        assert!(size > 0, "window size must be positive");
        assert!(step > 0, "window step must be positive");
        self.wrap(move |mut it| {
            let mut buf: VecDeque<T> = VecDeque::with_capacity(size);
            let mut skip = 0_usize;
            let mut finished = false;
            boxed(std::iter::from_fn(move || {
                if finished {
                    return None;
                }
                loop {
                    match it.next() {
                        Some(x) => {
                            if skip > 0 {
                                skip -= 1;
                                continue;
                            }
                            buf.push_back(x);
                            if buf.len() == size {
                                let out: Vec<T> = buf.iter().cloned().collect();
                                if step >= size {
                                    skip = step - size;
                                    buf.clear();
                                } else {
                                    buf.drain(..step);
                                }
                                return Some(out);
                            }
                        }
                        None => {
                            finished = true;
                            if emit_partial_last && !buf.is_empty() {
                                return Some(buf.drain(..).collect());
                            }
                            return None;
                        }
                    }
                }
            }))
        })
    }

    /// Non-overlapping batches of `size`; the final partial batch is
    /// always emitted.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn chunk(self, size: usize) -> Stream<Vec<T>>
    where
        T: Clone,
    {
        self.window_with_step(size, size, true)
    }

    /// Consecutive element pairs: `(s0, s1), (s1, s2), ...`
    pub fn pairwise(self) -> Stream<(T, T)>
    where
        T: Clone,
    {
        self.wrap(|mut it| {
            let mut prev: Option<T> = None;
            boxed(std::iter::from_fn(move || loop {
                let x = it.next()?;
                if let Some(p) = prev.replace(x.clone()) {
                    return Some((p, x));
                }
            }))
        })
    }

    /// Consecutive element triples: `(s0, s1, s2), (s1, s2, s3), ...`
    pub fn triples(self) -> Stream<(T, T, T)>
    where
        T: Clone,
    {
        self.wrap(|mut it| {
            let mut held: VecDeque<T> = VecDeque::with_capacity(3);
            boxed(std::iter::from_fn(move || loop {
                let x = it.next()?;
                if held.len() == 2 {
                    let a = held.pop_front().expect("two elements held");
                    let b = held.front().cloned().expect("one element held");
                    held.push_back(x.clone());
                    return Some((a, b, x));
                }
                held.push_back(x);
            }))
        })
    }

    /// The running combination of elements: element `i` is
    /// `init ⊕ s₀ ⊕ … ⊕ sᵢ`, so the output has the upstream's length.
    pub fn scan<A: Data + Clone>(self, init: A, mut op: impl FnMut(A, T) -> A + Send + 'static) -> Stream<A> {
        self.wrap(move |it| {
            let mut acc = init;
            boxed(it.map(move |x| {
                acc = op(acc.clone(), x);
                acc.clone()
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_windows() {
        let out = Stream::of(1..=4).window(2).collect();
        assert_eq!(out, vec![vec![1, 2], vec![2, 3], vec![3, 4]]);
        assert_eq!(Stream::of(1..=2).window(3).count(), 0);
    }

    #[test]
    fn window_step_table() {
        let cases = vec![
            // (size, step, partial, input_len, expected)
            (3, 2, false, 5, vec![vec![1, 2, 3], vec![3, 4, 5]]),
            (3, 2, true, 4, vec![vec![1, 2, 3], vec![3, 4]]),
            (2, 3, false, 7, vec![vec![1, 2], vec![4, 5]]),
            (2, 3, true, 7, vec![vec![1, 2], vec![4, 5], vec![7]]),
            (3, 3, true, 2, vec![vec![1, 2]]),
        ];
        for (size, step, partial, len, expected) in cases {
            let out = Stream::of(1..=len).window_with_step(size, step, partial).collect();
            assert_eq!(out, expected, "size={size} step={step} partial={partial}");
        }
    }

    #[test]
    fn chunks_emit_final_partial() {
        let out = Stream::of(1..=5).chunk(2).collect();
        assert_eq!(out, vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn pairwise_and_triples() {
        assert_eq!(Stream::of(1..=4).pairwise().collect(), vec![(1, 2), (2, 3), (3, 4)]);
        assert_eq!(Stream::of(1..=5).triples().collect(), vec![(1, 2, 3), (2, 3, 4), (3, 4, 5)]);
        assert_eq!(Stream::of(1..=2).triples().count(), 0);
    }

    #[test]
    fn scan_matches_prefix_fold() {
        let out = Stream::of([1, 2, 3, 4]).scan(0, |a, b| a + b).collect();
        assert_eq!(out, vec![1, 3, 6, 10]);
        assert_eq!(out.len(), 4);
    }
}
