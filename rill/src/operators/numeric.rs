//! Numeric shorthands over streams of primitive numbers.
//!
//! The [`Numeric`] marker abstracts the primitive integers and floats
//! just far enough for the operators here: identities, arithmetic, a
//! magnitude, and a lossy `f64` view for averaging.

use crate::stream::Stream;
use crate::Data;

/// A primitive numeric element.
pub trait Numeric:
    Copy
    + PartialOrd
    + Send
    + Sync
    + 'static
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
{
    /// The additive identity.
    const ZERO: Self;
    /// The multiplicative identity.
    const ONE: Self;
    /// A lossy view for averaging and interpolation.
    fn as_f64(self) -> f64;
    /// The magnitude; identity for unsigned types.
    fn magnitude(self) -> Self;
}

macro_rules! numeric_signed {
    ($($t:ty),*) => {$(
        impl Numeric for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;
            fn as_f64(self) -> f64 { self as f64 }
            fn magnitude(self) -> Self { self.abs() }
        }
    )*};
}

macro_rules! numeric_unsigned {
    ($($t:ty),*) => {$(
        impl Numeric for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;
            fn as_f64(self) -> f64 { self as f64 }
            fn magnitude(self) -> Self { self }
        }
    )*};
}

macro_rules! numeric_float {
    ($($t:ty),*) => {$(
        impl Numeric for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            fn as_f64(self) -> f64 { self as f64 }
            fn magnitude(self) -> Self { self.abs() }
        }
    )*};
}

numeric_signed!(i8, i16, i32, i64, i128, isize);
numeric_unsigned!(u8, u16, u32, u64, u128, usize);
numeric_float!(f32, f64);

impl<T: Data + Numeric> Stream<T> {
    /// Counts from `lo` (inclusive) to `hi` (exclusive) in steps of one.
    pub fn range(lo: T, hi: T) -> Stream<T> {
        let mut cursor = lo;
        Stream::new(std::iter::from_fn(move || {
            if cursor < hi {
                let x = cursor;
                cursor = x + T::ONE;
                Some(x)
            } else {
                None
            }
        }))
    }

    /// Counts from `lo` to `hi`, both inclusive, in steps of one.
    pub fn range_closed(lo: T, hi: T) -> Stream<T> {
        let mut cursor = Some(lo);
        Stream::new(std::iter::from_fn(move || {
            let x = cursor?;
            if x > hi {
                cursor = None;
                return None;
            }
            cursor = if x < hi { Some(x + T::ONE) } else { None };
            Some(x)
        }))
    }

    /// Replaces each element with its magnitude.
    pub fn abs(self) -> Stream<T> {
        self.map(Numeric::magnitude)
    }

    /// Clamps each element into `[lo, hi]`.
    pub fn clamp(self, lo: T, hi: T) -> Stream<T> {
        self.map(move |x| {
            if x < lo {
                lo
            } else if x > hi {
                hi
            } else {
                x
            }
        })
    }

    /// Multiplies each element by `factor`.
    pub fn scale(self, factor: T) -> Stream<T> {
        self.map(move |x| x * factor)
    }

    /// Adds `delta` to each element.
    pub fn offset(self, delta: T) -> Stream<T> {
        self.map(move |x| x + delta)
    }

    /// Retains elements greater than zero.
    pub fn positive(self) -> Stream<T> {
        self.filter(|x| *x > T::ZERO)
    }

    /// Retains elements less than zero.
    pub fn negative(self) -> Stream<T> {
        self.filter(|x| *x < T::ZERO)
    }

    /// Retains elements other than zero.
    pub fn non_zero(self) -> Stream<T> {
        self.filter(|x| *x != T::ZERO)
    }

    /// The running sum, one output per input.
    pub fn running_sum(self) -> Stream<T> {
        self.scan(T::ZERO, |a, b| a + b)
    }

    /// The running product, one output per input.
    pub fn running_product(self) -> Stream<T> {
        self.scan(T::ONE, |a, b| a * b)
    }

    /// Consecutive differences `s₁−s₀, s₂−s₁, ...`; one output fewer than
    /// the input.
    pub fn differences(self) -> Stream<T> {
        self.pairwise().map(|(a, b)| b - a)
    }

    /// The sum of all elements; zero when empty.
    pub fn sum(self) -> T {
        self.fold(T::ZERO, |a, b| a + b)
    }

    /// The product of all elements; one when empty.
    pub fn product(self) -> T {
        self.fold(T::ONE, |a, b| a * b)
    }

    /// The arithmetic mean, or `None` when empty.
    pub fn average(self) -> Option<f64> {
        let (count, total) = self.fold((0_usize, 0.0_f64), |(n, t), x| (n + 1, t + x.as_f64()));
        if count == 0 {
            None
        } else {
            Some(total / count as f64)
        }
    }
}

impl<T: Data> Stream<T> {
    /// Sums a numeric projection of each element.
    pub fn sum_by<N: Numeric>(self, mut f: impl FnMut(&T) -> N + Send + 'static) -> N {
        self.fold(N::ZERO, move |a, x| a + f(&x))
    }

    /// Averages a numeric projection, or `None` when empty.
    pub fn average_by<N: Numeric>(self, mut f: impl FnMut(&T) -> N + Send + 'static) -> Option<f64> {
        self.map(move |x| f(&x)).average()
    }
}
