#![forbid(unsafe_code)]
//! Validated Numerics Library
//!
//! Rigorous enclosures for real computation: every operation returns a
//! machine-representable interval guaranteed to contain the true
//! mathematical result, floating-point rounding included.
//!
//! # Features
//! - Outward-rounded interval arithmetic with enclosed transcendentals
//! - Narrowest-interval construction from decimal string literals
//! - Forward-mode automatic differentiation over any scalar ring
//! - Truncated power-series (Taylor) algebra with remainder handling
//! - Affine arithmetic with noise-symbol recycling
//! - Self-validating ODE integration (Picard-Lindelöf contraction with
//!   Krawczyk-style refinement) and long-time drivers with mean-value,
//!   QR and Lohner wrapping-effect control
//! - Interval gamma/digamma/trigamma with a Krawczyk-verified digamma zero
//!
//! # Usage Examples
//!
//! ## Interval arithmetic
//! ```
//! use valnum::Interval;
//! let x: Interval = "0.1".parse().expect("decimal literal");
//! // 0.1 is not a binary float; the interval brackets it in one ulp.
//! assert!(x.lo() < x.hi());
//! let s = x + x + x;
//! assert!(s.contains(0.1 + 0.1 + 0.1));
//! ```
//!
//! ## A verified ODE integration
//! ```
//! use valnum::{odelong, Interval, NoCallback, OdeParam, OdeStatus, Ring, VectorField};
//!
//! struct Decay;
//! impl VectorField for Decay {
//!     fn eval<T: Ring>(&self, x: &[T], _t: &T) -> Vec<T> {
//!         vec![-x[0].clone()]
//!     }
//! }
//!
//! let mut x = vec![Interval::point(1.0)];
//! let mut end = Interval::point(1.0);
//! let status = odelong(
//!     &Decay,
//!     &mut x,
//!     Interval::point(0.0),
//!     &mut end,
//!     &OdeParam::default().with_order(10),
//!     &mut NoCallback,
//! );
//! assert_eq!(status, OdeStatus::Complete);
//! // x(1) = 1/e, rigorously enclosed (libm's exp gets an ulp of slack).
//! assert!(x[0].widened(1).contains((-1.0f64).exp()));
//! ```

pub mod affine;
pub mod autodif;
pub mod core;
pub mod gamma;
pub mod interval;
pub mod linalg;
pub mod ode;
pub mod psa;
pub mod rounding;

#[cfg(test)]
mod tests;

// Re-export the working set at the crate root.
pub use affine::Affine;
pub use autodif::AutoDif;
pub use core::{Field, Ring, TaylorRing, Transcendental};
pub use interval::{Interval, LiteralError};
pub use ode::{
    CallbackFn, NoCallback, OdeParam, OdeStatus, StepCallback, VectorField, ode, ode_autodif,
    odelong, odelong_autodif, odelong_maffine, odelong_maffine_autodif, odelong_maffine_interval,
    odelong_qr, odelong_qr_lohner,
};
pub use psa::{Psa, PsaMode};
