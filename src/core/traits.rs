//! Scalar-ring traits shared by every numeric layer.
//!
//! A user vector field is written once, generically over [`Ring`], and is
//! then instantiated by the integrator at `f64`, [`Interval`],
//! `AutoDif<Interval>`, `Psa<AutoDif<Interval>>` or `Affine` — the same
//! recursive-instantiation trick the expression-template original plays
//! with C++ templates, expressed through trait bounds and
//! monomorphisation.

use std::ops::{Div, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::interval::Interval;

/// A commutative ring with an embedding of `f64` constants.
///
/// `Zero`/`One` (from `num-traits`) carry the additive and multiplicative
/// structure; subtraction and negation are required separately because
/// `num-traits` does not bundle them.
pub trait Ring:
    Clone + Zero + One + Sub<Output = Self> + Neg<Output = Self> + 'static
{
    /// Embed an `f64` constant into the ring.
    ///
    /// The constant is taken at face value: `from_f64(8.0 / 3.0)` embeds
    /// the *float* 8/3, exactly as a literal coefficient in a vector
    /// field does.
    fn from_f64(c: f64) -> Self;
}

/// A ring with division. Division is deliberately not part of [`Ring`]:
/// truncated power series only form a ring under the fixed-order
/// multiplication the validated stepper relies on.
pub trait Field: Ring + Div<Output = Self> {}

impl<T: Ring + Div<Output = T>> Field for T {}

/// Extra structure required of power-series coefficients: scaling by an
/// interval, used for integration weights and for the domain powers of
/// the fixed-order truncation.
pub trait TaylorRing: Ring {
    /// Multiply every scalar slot by the interval `k`.
    fn scale(&self, k: Interval) -> Self;
}

/// The standard transcendental functions, as enclosures where the ring is
/// set-valued. Implementations must satisfy: the result contains `φ(x)`
/// for every point `x` of the argument.
pub trait Transcendental: Sized + Mul<Output = Self> {
    /// Exponential.
    fn exp(self) -> Self;
    /// Natural logarithm.
    fn ln(self) -> Self;
    /// Square root.
    fn sqrt(self) -> Self;
    /// Sine.
    fn sin(self) -> Self;
    /// Cosine.
    fn cos(self) -> Self;
    /// Tangent.
    fn tan(self) -> Self;
    /// Inverse tangent.
    fn atan(self) -> Self;
    /// Hyperbolic sine.
    fn sinh(self) -> Self;
    /// Hyperbolic cosine.
    fn cosh(self) -> Self;
    /// General power through `exp(y ln x)`.
    fn pow(self, y: Self) -> Self {
        (y * self.ln()).exp()
    }
}

impl Ring for f64 {
    #[inline]
    fn from_f64(c: f64) -> Self {
        c
    }
}

impl Transcendental for f64 {
    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }

    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }

    #[inline]
    fn tan(self) -> Self {
        f64::tan(self)
    }

    #[inline]
    fn atan(self) -> Self {
        f64::atan(self)
    }

    #[inline]
    fn sinh(self) -> Self {
        f64::sinh(self)
    }

    #[inline]
    fn cosh(self) -> Self {
        f64::cosh(self)
    }

    #[inline]
    fn pow(self, y: Self) -> Self {
        f64::powf(self, y)
    }
}
