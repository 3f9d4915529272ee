//! Source constructors: the leaves of an operator tree.
//!
//! Finite sources wrap in-memory values; infinite sources (`generate`,
//! `iterate`, `cycle`, `repeat_forever`) require a downstream
//! short-circuit (`take`, `take_while`, a canceled context) or the pull
//! loop will not terminate. Channel sources block on the producer and end
//! when the channel disconnects. Reader-backed and clock-driven sources
//! live in [`io`](crate::io) and [`operators::time`](crate::operators::time).

use crossbeam_channel::{select, Receiver};

use crate::context::Context;
use crate::stream::Stream;
use crate::Data;

impl<T: Data> Stream<T> {
    /// A stream over the given values.
    pub fn of<I>(items: I) -> Stream<T>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Stream::new(items.into_iter())
    }

    /// A stream over any iterable. Maps, sets, lists, and ranges all come
    /// in through here.
    pub fn from_iter<I>(items: I) -> Stream<T>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Stream::of(items)
    }

    /// A stream over a copied slice.
    pub fn from_slice(items: &[T]) -> Stream<T>
    where
        T: Clone,
    {
        Stream::of(items.to_vec())
    }

    /// The empty stream.
    pub fn empty() -> Stream<T> {
        Stream::new(std::iter::empty())
    }

    /// A stream of zero or one element.
    pub fn from_option(value: Option<T>) -> Stream<T> {
        Stream::new(value.into_iter())
    }

    /// `value`, `n` times.
    pub fn repeat(value: T, n: usize) -> Stream<T>
    where
        T: Clone,
    {
        Stream::new(std::iter::repeat(value).take(n))
    }

    /// `value`, forever.
    pub fn repeat_forever(value: T) -> Stream<T>
    where
        T: Clone,
    {
        Stream::new(std::iter::repeat(value))
    }

    /// Cycles through `items` forever.
    ///
    /// # Panics
    ///
    /// Panics when `items` is empty: an empty cycle has no meaningful
    /// element to produce and indicates a programming error.
    pub fn cycle(items: Vec<T>) -> Stream<T>
    where
        T: Clone,
    {
        assert!(!items.is_empty(), "Stream::cycle requires at least one element");
        Stream::new(items.into_iter().cycle())
    }

    /// An infinite stream drawing from `supplier`.
    pub fn generate(supplier: impl FnMut() -> T + Send + 'static) -> Stream<T> {
        Stream::new(std::iter::repeat_with(supplier))
    }

    /// `seed`, `step(seed)`, `step(step(seed))`, ...
    pub fn iterate(seed: T, mut step: impl FnMut(&T) -> T + Send + 'static) -> Stream<T> {
        Stream::new(std::iter::successors(Some(seed), move |x| Some(step(x))))
    }

    /// The concatenation of `streams`, in order.
    pub fn concat(streams: Vec<Stream<T>>) -> Stream<T> {
        Stream::new(streams.into_iter().flat_map(|s| s.iter))
    }

    /// Drains a channel until its senders disconnect.
    pub fn from_channel(rx: Receiver<T>) -> Stream<T> {
        Stream::new(rx.into_iter())
    }

    /// Drains a channel until disconnect or cancellation of `ctx`,
    /// whichever comes first.
    pub fn from_channel_ctx(ctx: &Context, rx: Receiver<T>) -> Stream<T> {
        let done = ctx.done();
        let mut stream = Stream::new(std::iter::from_fn(move || {
            select! {
                recv(rx) -> msg => msg.ok(),
                recv(done) -> _ => None,
            }
        }));
        stream.ctx = Some(ctx.clone());
        stream
    }
}

impl Stream<char> {
    /// The characters of `text`, in order.
    pub fn from_chars(text: impl Into<String>) -> Stream<char> {
        let text = text.into();
        let mut at = 0;
        Stream::new(std::iter::from_fn(move || {
            let c = text[at..].chars().next()?;
            at += c.len_utf8();
            Some(c)
        }))
    }
}
