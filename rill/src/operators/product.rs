//! Cartesian products and combinatoric expansions.
//!
//! These operators materialise every input except the outermost one (the
//! products) or the whole input (combinations, permutations); their
//! output sizes are products and factorials, so callers are expected to
//! bound them downstream.

use crate::seq::{boxed, deferred};
use crate::stream::Stream;
use crate::Data;

impl<T: Data + Clone> Stream<T> {
    /// Every `(left, right)` pair; the right side is materialised, the
    /// left streams lazily.
    pub fn cartesian<U: Data + Clone>(self, other: Stream<U>) -> Stream<(T, U)> {
        let right = other.iter;
        self.wrap(move |mut it| {
            deferred(move || {
                let rights: Vec<U> = right.collect();
                let mut current: Option<T> = None;
                let mut at = 0;
                boxed(std::iter::from_fn(move || {
                    if rights.is_empty() {
                        return None;
                    }
                    loop {
                        if current.is_none() {
                            current = Some(it.next()?);
                            at = 0;
                        }
                        if at < rights.len() {
                            let l = current.clone().expect("current set above");
                            let r = rights[at].clone();
                            at += 1;
                            return Some((l, r));
                        }
                        current = None;
                    }
                }))
            })
        })
    }

    /// Every ordered pair of the stream's own elements, self-pairs
    /// included.
    pub fn cartesian_self(self) -> Stream<(T, T)> {
        self.wrap(|it| {
            deferred(move || {
                let items: Vec<T> = it.collect();
                let n = items.len();
                let mut i = 0;
                let mut j = 0;
                boxed(std::iter::from_fn(move || {
                    if i >= n {
                        return None;
                    }
                    let out = (items[i].clone(), items[j].clone());
                    j += 1;
                    if j == n {
                        j = 0;
                        i += 1;
                    }
                    Some(out)
                }))
            })
        })
    }

    /// The n-ary cross product, one row per choice of one element from
    /// each input.
    ///
    /// The first input streams lazily; every other input is materialised.
    /// Rows vary the last input fastest. An empty input list, or any
    /// empty input, produces the empty stream.
    pub fn cross_product(streams: Vec<Stream<T>>) -> Stream<Vec<T>> {
        let mut streams = streams;
        if streams.is_empty() {
            return Stream::empty();
        }
        let first = streams.remove(0);
        first.wrap(move |mut it| {
            deferred(move || {
                let rest: Vec<Vec<T>> = streams.into_iter().map(Stream::collect).collect();
                if rest.iter().any(Vec::is_empty) {
                    return boxed(std::iter::empty());
                }
                let mut head: Option<T> = None;
                let mut odometer = vec![0_usize; rest.len()];
                let mut rolled_over = true;
                boxed(std::iter::from_fn(move || {
                    if rolled_over {
                        head = Some(it.next()?);
                        odometer.iter_mut().for_each(|d| *d = 0);
                        rolled_over = false;
                    }
                    let mut row = Vec::with_capacity(1 + rest.len());
                    row.push(head.clone().expect("head set above"));
                    row.extend(odometer.iter().zip(&rest).map(|(&d, input)| input[d].clone()));

                    // Advance the odometer, last digit fastest.
                    rolled_over = true;
                    for (digit, input) in odometer.iter_mut().zip(&rest).rev() {
                        *digit += 1;
                        if *digit < input.len() {
                            rolled_over = false;
                            break;
                        }
                        *digit = 0;
                    }
                    Some(row)
                }))
            })
        })
    }

    /// All `k`-element combinations, lexicographic over input order.
    ///
    /// `combinations(0)` emits one empty selection; `k` beyond the input
    /// length emits nothing. The input is materialised.
    pub fn combinations(self, k: usize) -> Stream<Vec<T>> {
        self.wrap(move |it| {
            deferred(move || {
                let items: Vec<T> = it.collect();
                let n = items.len();
                if k > n {
                    return boxed(std::iter::empty());
                }
                let mut indices: Vec<usize> = (0..k).collect();
                let mut exhausted = false;
                boxed(std::iter::from_fn(move || {
                    if exhausted {
                        return None;
                    }
                    let out: Vec<T> = indices.iter().map(|&i| items[i].clone()).collect();
                    // Lexicographic successor: bump the rightmost index
                    // that still has room, reset those after it.
                    let mut pos = k;
                    loop {
                        if pos == 0 {
                            exhausted = true;
                            break;
                        }
                        pos -= 1;
                        if indices[pos] < n - k + pos {
                            indices[pos] += 1;
                            for later in pos + 1..k {
                                indices[later] = indices[later - 1] + 1;
                            }
                            break;
                        }
                    }
                    Some(out)
                }))
            })
        })
    }

    /// All permutations of the input, by Heap's algorithm.
    ///
    /// The input is materialised; output length is `n!`.
    pub fn permutations(self) -> Stream<Vec<T>> {
        self.wrap(|it| {
            deferred(move || {
                let mut items: Vec<T> = it.collect();
                let n = items.len();
                let mut counters = vec![0_usize; n];
                let mut depth = 0;
                let mut emitted_first = false;
                boxed(std::iter::from_fn(move || {
                    if !emitted_first {
                        emitted_first = true;
                        return Some(items.clone());
                    }
                    while depth < n {
                        if counters[depth] < depth {
                            if depth % 2 == 0 {
                                items.swap(0, depth);
                            } else {
                                items.swap(counters[depth], depth);
                            }
                            counters[depth] += 1;
                            depth = 0;
                            return Some(items.clone());
                        }
                        counters[depth] = 0;
                        depth += 1;
                    }
                    None
                }))
            })
        })
    }
}
