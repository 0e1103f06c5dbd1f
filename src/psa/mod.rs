//! Truncated power-series arithmetic (PSA) over an arbitrary coefficient
//! ring.
//!
//! A [`Psa`] is the Taylor polynomial `c0 + c1 τ + … + ck τ^k`. Two
//! multiplication modes exist, selected through the task-local context:
//!
//! - **Grow** - the product order is the sum of the operand orders; this
//!   is the plain polynomial product used while the predictor builds the
//!   Taylor expansion term by term.
//! - **Fixed** - the product order equals the operand order and every
//!   dropped term `a_i b_j τ^(i+j)` is folded into the top coefficient
//!   scaled by `domain^(i+j-k)`, where `domain` encloses the range of τ.
//!   With the top coefficient interpreted as the remainder over `domain`,
//!   operations preserve enclosure and the Picard contraction test
//!   becomes meaningful.
//!
//! The context also carries the optional multiplication history: a replay
//! tape that lets repeated evaluations of the same vector field at
//! increasing order reuse the already-converged low coefficients. It is
//! semantically invisible — a tape miss falls back to the full product.
//!
//! All context state is thread-local: different integrations may run on
//! different threads, each with its own mode, domain and tape.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::autodif::AutoDif;
use crate::core::traits::{Ring, TaylorRing};
use crate::interval::Interval;

/// Multiplication/truncation mode of the power-series algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsaMode {
    /// Orders add up under multiplication (plain polynomial algebra).
    Grow,
    /// Orders stay fixed; dropped terms fold into the top coefficient
    /// via powers of the domain.
    Fixed,
}

/// One recorded product: the operand orders it was computed with and the
/// type-erased result. Coefficients up to the recorded operand orders are
/// the only ones that survive an order increase of the operands.
struct TapeEntry {
    a_order: usize,
    b_order: usize,
    product: Box<dyn Any>,
}

struct Tape {
    items: Vec<TapeEntry>,
    cursor: usize,
}

struct PsaCtx {
    mode: Cell<PsaMode>,
    domain: Cell<Interval>,
    use_history: Cell<bool>,
    record_history: Cell<bool>,
    tape: RefCell<Tape>,
}

thread_local! {
    static CTX: PsaCtx = PsaCtx {
        mode: Cell::new(PsaMode::Grow),
        domain: Cell::new(Interval::ZERO),
        use_history: Cell::new(false),
        record_history: Cell::new(false),
        tape: RefCell::new(Tape { items: Vec::new(), cursor: 0 }),
    };
}

/// Current multiplication mode.
pub fn mode() -> PsaMode {
    CTX.with(|c| c.mode.get())
}

/// Set the multiplication mode, returning the previous one.
pub fn set_mode(m: PsaMode) -> PsaMode {
    CTX.with(|c| c.mode.replace(m))
}

/// Current truncation domain (the range of the series variable τ).
pub fn domain() -> Interval {
    CTX.with(|c| c.domain.get())
}

/// Set the truncation domain, returning the previous one.
pub fn set_domain(d: Interval) -> Interval {
    CTX.with(|c| c.domain.replace(d))
}

/// Is history replay enabled?
pub fn use_history() -> bool {
    CTX.with(|c| c.use_history.get())
}

/// Enable/disable history replay, returning the previous setting.
pub fn set_use_history(on: bool) -> bool {
    CTX.with(|c| c.use_history.replace(on))
}

/// Is history recording enabled?
pub fn record_history() -> bool {
    CTX.with(|c| c.record_history.get())
}

/// Enable/disable history recording, returning the previous setting.
pub fn set_record_history(on: bool) -> bool {
    CTX.with(|c| c.record_history.replace(on))
}

/// Drop all recorded products and reset the replay cursor.
pub fn history_clear() {
    CTX.with(|c| {
        let mut tape = c.tape.borrow_mut();
        tape.items.clear();
        tape.cursor = 0;
    });
}

/// Reset the replay cursor to the start of the tape. The stepper calls
/// this before every pass over the vector field so the call sequence
/// lines up with the recorded one.
pub fn history_rewind() {
    CTX.with(|c| c.tape.borrow_mut().cursor = 0);
}

/// A truncated Taylor polynomial with coefficients in `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct Psa<T> {
    /// Coefficients, constant term first. Never empty.
    pub c: Vec<T>,
}

impl<T: Ring> Psa<T> {
    /// Build from explicit coefficients (a zero constant if empty).
    pub fn new(mut c: Vec<T>) -> Self {
        if c.is_empty() {
            c.push(T::zero());
        }
        Psa { c }
    }

    /// The constant polynomial `v`.
    pub fn constant(v: T) -> Self {
        Psa { c: vec![v] }
    }

    /// The independent-variable polynomial `t0 + τ`.
    pub fn time(t0: T) -> Self {
        Psa {
            c: vec![t0, T::one()],
        }
    }

    /// Truncation order (degree of the top coefficient).
    pub fn order(&self) -> usize {
        self.c.len() - 1
    }

    /// Evaluate at `x` by Horner's scheme. When `x` is an interval the
    /// top coefficient must already enclose the truncation remainder.
    pub fn eval(&self, x: T) -> T {
        let mut acc = self.c[self.c.len() - 1].clone();
        for k in (0..self.c.len() - 1).rev() {
            acc = acc * x.clone() + self.c[k].clone();
        }
        acc
    }
}

impl<T: TaylorRing> Psa<T> {
    /// Truncate or zero-pad to order `k`. In Fixed mode a truncation
    /// folds each dropped coefficient into the new top one, scaled by
    /// `domain^(i-k)`, so enclosure over the domain is preserved.
    pub fn setorder(&self, k: usize) -> Psa<T> {
        let mut c: Vec<T> = self.c.iter().take(k + 1).cloned().collect();
        c.resize(k + 1, T::zero());
        if mode() == PsaMode::Fixed && self.order() > k {
            let dom = domain();
            for i in (k + 1)..=self.order() {
                let w = dom.powi((i - k) as i32);
                c[k] = c[k].clone() + self.c[i].scale(w);
            }
        }
        Psa { c }
    }

    /// Antiderivative with zero constant term.
    pub fn integrate(&self) -> Psa<T> {
        let mut c = Vec::with_capacity(self.c.len() + 1);
        c.push(T::zero());
        for (k, ck) in self.c.iter().enumerate() {
            let w = Interval::ONE / ((k + 1) as f64);
            c.push(ck.scale(w));
        }
        Psa { c }
    }

    /// Plain convolution coefficient `Σ_{i+j=k} a_i b_j`.
    fn convolve_at(a: &[T], b: &[T], k: usize) -> T {
        let mut acc = T::zero();
        for i in 0..=k {
            let j = k - i;
            if i < a.len() && j < b.len() {
                acc = acc + a[i].clone() * b[j].clone();
            }
        }
        acc
    }

    fn mul_full(&self, rhs: &Psa<T>, target: usize) -> Psa<T> {
        let mut c = vec![T::zero(); target + 1];
        let dom = domain();
        let fixed = mode() == PsaMode::Fixed;
        for (i, ai) in self.c.iter().enumerate() {
            for (j, bj) in rhs.c.iter().enumerate() {
                let p = ai.clone() * bj.clone();
                if i + j <= target {
                    c[i + j] = c[i + j].clone() + p;
                } else if fixed {
                    let w = dom.powi((i + j - target) as i32);
                    c[target] = c[target].clone() + p.scale(w);
                }
            }
        }
        Psa { c }
    }
}

impl<T: Ring> Add for Psa<T> {
    type Output = Psa<T>;

    fn add(self, rhs: Psa<T>) -> Psa<T> {
        let n = self.c.len().max(rhs.c.len());
        let mut c = Vec::with_capacity(n);
        for k in 0..n {
            let a = self.c.get(k).cloned().unwrap_or_else(T::zero);
            let b = rhs.c.get(k).cloned().unwrap_or_else(T::zero);
            c.push(a + b);
        }
        Psa { c }
    }
}

impl<T: Ring> Sub for Psa<T> {
    type Output = Psa<T>;

    fn sub(self, rhs: Psa<T>) -> Psa<T> {
        let n = self.c.len().max(rhs.c.len());
        let mut c = Vec::with_capacity(n);
        for k in 0..n {
            let a = self.c.get(k).cloned().unwrap_or_else(T::zero);
            let b = rhs.c.get(k).cloned().unwrap_or_else(T::zero);
            c.push(a - b);
        }
        Psa { c }
    }
}

impl<T: Ring> Neg for Psa<T> {
    type Output = Psa<T>;

    fn neg(self) -> Psa<T> {
        Psa {
            c: self.c.into_iter().map(|x| -x).collect(),
        }
    }
}

impl<T: TaylorRing> Mul for Psa<T> {
    type Output = Psa<T>;

    fn mul(self, rhs: Psa<T>) -> Psa<T> {
        let target = match mode() {
            PsaMode::Grow => self.order() + rhs.order(),
            PsaMode::Fixed => self.order().max(rhs.order()),
        };

        // History applies only to the grow-order predictor phase.
        let grow = mode() == PsaMode::Grow;
        let replay = grow && use_history();
        let record = grow && record_history();
        if !replay && !record {
            return self.mul_full(&rhs, target);
        }

        let cached: Option<(usize, usize, Psa<T>)> = if replay {
            CTX.with(|ctx| {
                let tape = ctx.tape.borrow();
                tape.items.get(tape.cursor).and_then(|e| {
                    e.product
                        .downcast_ref::<Psa<T>>()
                        .map(|p| (e.a_order, e.b_order, p.clone()))
                })
            })
        } else {
            None
        };

        let result = match cached {
            Some((ao, bo, prev)) if self.order() >= ao && rhs.order() >= bo => {
                // Coefficient k of the product only involves operand
                // coefficients up to k; it is stable across passes as
                // long as no *new* operand coefficient can reach it.
                let mut safe = prev.order().min(target);
                if self.order() > ao {
                    safe = safe.min(ao);
                }
                if rhs.order() > bo {
                    safe = safe.min(bo);
                }
                let mut c: Vec<T> = prev.c[..=safe].to_vec();
                for k in (safe + 1)..=target {
                    c.push(Psa::convolve_at(&self.c, &rhs.c, k));
                }
                Psa { c }
            }
            _ => self.mul_full(&rhs, target),
        };

        CTX.with(|ctx| {
            let mut tape = ctx.tape.borrow_mut();
            let at = tape.cursor;
            if record {
                let entry = TapeEntry {
                    a_order: self.order(),
                    b_order: rhs.order(),
                    product: Box::new(result.clone()),
                };
                if at < tape.items.len() {
                    tape.items[at] = entry;
                } else {
                    tape.items.push(entry);
                }
            }
            tape.cursor += 1;
        });
        result
    }
}

impl<T: TaylorRing> Zero for Psa<T> {
    fn zero() -> Self {
        Psa::constant(T::zero())
    }

    fn is_zero(&self) -> bool {
        self.c.iter().all(Zero::is_zero)
    }
}

impl<T: TaylorRing> One for Psa<T> {
    fn one() -> Self {
        Psa::constant(T::one())
    }
}

impl<T: TaylorRing> Ring for Psa<T> {
    fn from_f64(c: f64) -> Self {
        Psa::constant(T::from_f64(c))
    }
}

impl<T: Ring> AddAssign for Psa<T> {
    fn add_assign(&mut self, rhs: Psa<T>) {
        *self = self.clone() + rhs;
    }
}

impl<T: Ring> Psa<AutoDif<T>> {
    /// Strip the variational data, keeping the plain value series.
    pub fn value_part(&self) -> Psa<T> {
        Psa {
            c: self.c.iter().map(|a| a.v.clone()).collect(),
        }
    }
}
