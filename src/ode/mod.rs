//! Self-validating ODE integration.
//!
//! The entry points mirror the two layers of the machinery:
//! - [`ode`]/[`ode_autodif`] perform **one** validated step: a Taylor
//!   predictor, candidate inflation, a Picard-Lindelöf contraction test
//!   and a Krawczyk-style intersection refinement (module `step`);
//! - the `odelong*` drivers stitch steps over a long time range and fight
//!   the wrapping effect with mean-value/affine or QR-factored transition
//!   frames (module `driver`).
//!
//! A vector field is anything implementing [`VectorField`]; it is written
//! once, generically, and evaluated on plain floats, intervals, jets and
//! power series alike.

pub(crate) mod candidate;
pub mod driver;
pub mod step;

pub use driver::{
    odelong, odelong_autodif, odelong_maffine, odelong_maffine_autodif,
    odelong_maffine_interval, odelong_qr, odelong_qr_lohner,
};
pub use step::{ode, ode_autodif};

use crate::core::traits::Ring;
use crate::interval::Interval;
use crate::psa::Psa;

/// Outcome of a validated integration (weakest status wins across a
/// driver run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OdeStatus {
    /// No contraction could be verified within the restart budget.
    Fail,
    /// Verified, but only over an initial part of the requested range.
    Partial,
    /// Verified over the whole requested range.
    Complete,
}

/// Configuration bundle for the stepper and the drivers.
///
/// The defaults are the ones the integrator was tuned with: order 24,
/// adaptive step size, two tightening iterations, one restart, a 10%
/// radius contribution to the error target and no affine-symbol
/// reduction.
#[derive(Debug, Clone)]
pub struct OdeParam {
    /// Taylor truncation order (≥ 1).
    pub order: usize,
    /// Adaptive step size; when false the step covers the requested
    /// interval or fails.
    pub autostep: bool,
    /// Intersection-tightening iterations after a verified contraction.
    pub iter_max: usize,
    /// How many times the step may halve `h` after a failed contraction.
    pub restart_max: usize,
    /// Fraction of the input radius contributing to the error target.
    pub tol1: f64,
    /// Affine-symbol budget after a reduction (0 = recycle through
    /// split/append instead).
    pub ep_reduce: usize,
    /// Symbol count that triggers a reduction.
    pub ep_reduce_limit: usize,
    /// Print a step-by-step trace to stderr.
    pub verbose: bool,
}

impl Default for OdeParam {
    fn default() -> Self {
        OdeParam {
            order: 24,
            autostep: true,
            iter_max: 2,
            restart_max: 1,
            tol1: 0.1,
            ep_reduce: 0,
            ep_reduce_limit: 0,
            verbose: false,
        }
    }
}

impl OdeParam {
    /// Set the Taylor order.
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Enable or disable the adaptive step size.
    pub fn with_autostep(mut self, autostep: bool) -> Self {
        self.autostep = autostep;
        self
    }

    /// Set the number of tightening iterations.
    pub fn with_iter_max(mut self, iter_max: usize) -> Self {
        self.iter_max = iter_max;
        self
    }

    /// Set the restart budget.
    pub fn with_restart_max(mut self, restart_max: usize) -> Self {
        self.restart_max = restart_max;
        self
    }

    /// Set the affine-symbol reduction parameters.
    pub fn with_ep_reduce(mut self, ep_reduce: usize, ep_reduce_limit: usize) -> Self {
        self.ep_reduce = ep_reduce;
        self.ep_reduce_limit = ep_reduce_limit;
        self
    }

    /// Request a step-by-step trace.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// A user-supplied vector field `x' = f(x, t)`.
///
/// The implementation must be polymorphic over the scalar ring and must
/// not capture rounding-sensitive state: the integrator instantiates it
/// at `f64`, `Interval`, `AutoDif<Interval>` and
/// `Psa<AutoDif<Interval>>` within a single step.
pub trait VectorField {
    /// Evaluate the field; the result length must match `x`.
    fn eval<T: Ring>(&self, x: &[T], t: &T) -> Vec<T>;
}

/// Observer invoked once per committed step of a long integration.
///
/// All arguments are read-only borrows valid only for the duration of the
/// call; the callback must not re-enter the integrator.
pub trait StepCallback {
    /// `solution` is the verified Taylor polynomial on
    /// `[t_start, t_end]` in the local time τ = t - t_start.
    fn on_step(
        &mut self,
        t_start: Interval,
        t_end: Interval,
        x_start: &[Interval],
        x_end: &[Interval],
        solution: &[Psa<Interval>],
    );
}

/// The silent callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCallback;

impl StepCallback for NoCallback {
    fn on_step(
        &mut self,
        _t_start: Interval,
        _t_end: Interval,
        _x_start: &[Interval],
        _x_end: &[Interval],
        _solution: &[Psa<Interval>],
    ) {
    }
}

/// Adapter turning a closure into a [`StepCallback`].
pub struct CallbackFn<F>(pub F);

impl<F> StepCallback for CallbackFn<F>
where
    F: FnMut(Interval, Interval, &[Interval], &[Interval], &[Psa<Interval>]),
{
    fn on_step(
        &mut self,
        t_start: Interval,
        t_end: Interval,
        x_start: &[Interval],
        x_end: &[Interval],
        solution: &[Psa<Interval>],
    ) {
        (self.0)(t_start, t_end, x_start, x_end, solution);
    }
}
