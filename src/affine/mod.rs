//! Affine arithmetic: first-order correlated enclosures.
//!
//! An [`Affine`] value is `c + Σ aᵢ εᵢ + E` where each noise symbol
//! `εᵢ ∈ [-1, 1]` is shared across the whole task (correlations between
//! quantities survive linear operations, which is what defeats the
//! wrapping effect), and `E` is an anonymous deviation of radius `err`
//! holding rounding crumbs and conversions that do not deserve a symbol
//! of their own.
//!
//! Noise symbols come from a task-local monotonic counter. Drivers
//! checkpoint the counter with [`maxnum`]/[`set_maxnum`] around a step and
//! re-absorb everything allocated inside the step through
//! [`Affine::split`] + [`Affine::append`], so long integrations do not
//! leak symbols; [`epsilon_reduce`] caps growth when a caller prefers a
//! hard bound.
//!
//! Every coefficient operation is performed in interval arithmetic; the
//! midpoint becomes the stored coefficient and the radius is pushed into
//! `err`, which keeps all results rigorous without directed-rounding
//! gymnastics in this layer.

use std::cell::Cell;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::core::traits::{Ring, Transcendental};
use crate::interval::Interval;
use crate::rounding;

thread_local! {
    static MAXNUM: Cell<usize> = const { Cell::new(0) };
}

/// Number of noise symbols allocated so far in this task.
pub fn maxnum() -> usize {
    MAXNUM.with(Cell::get)
}

/// Restore (or force) the symbol counter; returns the previous value.
/// Used by the drivers to checkpoint the counter across step boundaries.
pub fn set_maxnum(n: usize) -> usize {
    MAXNUM.with(|m| m.replace(n))
}

fn fresh_symbol() -> usize {
    MAXNUM.with(|m| {
        let n = m.get();
        m.set(n + 1);
        n
    })
}

/// An affine form over `f64` with interval-rigorous bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine {
    /// Central value.
    c: f64,
    /// Dense noise-symbol coefficients; index = symbol number.
    coef: Vec<f64>,
    /// Radius of the anonymous deviation term (always ≥ 0).
    err: f64,
}

/// Midpoint of an interval op, radius accumulated into `err`.
fn take_mid(x: Interval, err: &mut f64) -> f64 {
    *err = rounding::add_up(*err, x.rad());
    x.mid()
}

impl Affine {
    /// An exact scalar.
    pub fn constant(c: f64) -> Self {
        Affine {
            c,
            coef: Vec::new(),
            err: 0.0,
        }
    }

    /// Central value.
    pub fn center(&self) -> f64 {
        self.c
    }

    /// Interval hull `c + Σ|aᵢ|·[-1,1] + err·[-1,1]`.
    pub fn to_interval(&self) -> Interval {
        let mut r = self.err;
        for &a in &self.coef {
            r = rounding::add_up(r, a.abs());
        }
        Interval::point(self.c) + Interval::new(-r, r)
    }

    /// Total deviation radius (upper bound).
    pub fn radius(&self) -> f64 {
        let mut r = self.err;
        for &a in &self.coef {
            r = rounding::add_up(r, a.abs());
        }
        r
    }

    /// Split into a part using only symbols `< maxnum_save` (keeping the
    /// center) and a remainder carrying the younger symbols plus the
    /// anonymous term.
    pub fn split(&self, maxnum_save: usize) -> (Affine, Affine) {
        let keep = self.coef.len().min(maxnum_save);
        let s1 = Affine {
            c: self.c,
            coef: self.coef[..keep].to_vec(),
            err: 0.0,
        };
        let mut high = vec![0.0; keep];
        high.extend_from_slice(&self.coef[keep..]);
        let s2 = Affine {
            c: 0.0,
            coef: high,
            err: self.err,
        };
        (s1, s2)
    }

    /// Add `extra` as a brand-new independent deviation (fresh symbol
    /// for its radius). The inverse of [`Affine::split`] +
    /// `to_interval` in the drivers' symbol-recycling dance.
    pub fn append(&self, extra: Interval) -> Affine {
        let mut err = self.err;
        let c = take_mid(
            Interval::point(self.c) + Interval::point(extra.mid()),
            &mut err,
        );
        let sym = fresh_symbol();
        let mut coef = self.coef.clone();
        if coef.len() <= sym {
            coef.resize(sym + 1, 0.0);
        }
        coef[sym] = extra.rad();
        Affine { c, coef, err }
    }

    /// Multiplicative inverse through the Chebyshev linear approximation
    /// of `1/t` over the current range. A range containing zero has no
    /// affine representation; the result degenerates to an unbounded
    /// deviation (its interval hull is the whole line).
    pub fn recip(&self) -> Affine {
        let range = self.to_interval();
        if range.zero_in() || range.is_empty() {
            return Affine {
                c: 0.0,
                coef: Vec::new(),
                err: f64::INFINITY,
            };
        }
        if range.hi() < 0.0 {
            return -(-self.clone()).recip();
        }
        // On [a, b] with a > 0: 1/t ⊆ α t + β ± δ with α = -1/(ab),
        // equioscillation at the endpoints and at sqrt(ab).
        let a = Interval::point(range.lo());
        let b = Interval::point(range.hi());
        let alpha = -(Interval::ONE / (a * b));
        let s = Interval::ONE / a + Interval::ONE / b;
        let u = (a * b).sqrt();
        let u = Interval::point(2.0) / u;
        let beta = (s + u) * 0.5;
        let delta = ((s - u) * 0.5).mag();

        let mut out = alpha * self.clone();
        let mut err = out.err;
        out.c = take_mid(Interval::point(out.c) + beta, &mut err);
        out.err = err;
        let sym = fresh_symbol();
        if out.coef.len() <= sym {
            out.coef.resize(sym + 1, 0.0);
        }
        out.coef[sym] = delta;
        out
    }
}

impl From<Interval> for Affine {
    /// Convert an interval into a fresh independent affine form (one new
    /// noise symbol carrying the radius).
    fn from(x: Interval) -> Self {
        let sym = fresh_symbol();
        let mut coef = vec![0.0; sym + 1];
        coef[sym] = x.rad();
        Affine {
            c: x.mid(),
            coef,
            err: 0.0,
        }
    }
}

impl From<f64> for Affine {
    fn from(x: f64) -> Self {
        Affine::constant(x)
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

impl Add for Affine {
    type Output = Affine;

    fn add(self, rhs: Affine) -> Affine {
        let mut err = rounding::add_up(self.err, rhs.err);
        let c = take_mid(Interval::point(self.c) + Interval::point(rhs.c), &mut err);
        let n = self.coef.len().max(rhs.coef.len());
        let mut coef = Vec::with_capacity(n);
        for i in 0..n {
            let a = self.coef.get(i).copied().unwrap_or(0.0);
            let b = rhs.coef.get(i).copied().unwrap_or(0.0);
            coef.push(take_mid(Interval::point(a) + Interval::point(b), &mut err));
        }
        Affine { c, coef, err }
    }
}

impl Neg for Affine {
    type Output = Affine;

    fn neg(self) -> Affine {
        Affine {
            c: -self.c,
            coef: self.coef.into_iter().map(|a| -a).collect(),
            err: self.err,
        }
    }
}

impl Sub for Affine {
    type Output = Affine;

    fn sub(self, rhs: Affine) -> Affine {
        self + (-rhs)
    }
}

impl Mul for Affine {
    type Output = Affine;

    fn mul(self, rhs: Affine) -> Affine {
        let ca = Interval::point(self.c);
        let cb = Interval::point(rhs.c);
        let mut err = 0.0;

        let c = take_mid(ca * cb, &mut err);
        let n = self.coef.len().max(rhs.coef.len());
        let mut coef = Vec::with_capacity(n);
        for i in 0..n {
            let ai = self.coef.get(i).copied().unwrap_or(0.0);
            let bi = rhs.coef.get(i).copied().unwrap_or(0.0);
            coef.push(take_mid(
                ca * Interval::point(bi) + cb * Interval::point(ai),
                &mut err,
            ));
        }

        // Anonymous parts scaled by the centers stay anonymous.
        err = rounding::add_up(err, rounding::mul_up(ca.mag(), rhs.err));
        err = rounding::add_up(err, rounding::mul_up(cb.mag(), self.err));

        // The quadratic remainder (Σaᵢεᵢ + Ea)(Σbᵢεᵢ + Eb) gets a fresh
        // symbol of its own.
        let delta = rounding::mul_up(self.radius(), rhs.radius());
        if delta > 0.0 {
            let sym = fresh_symbol();
            if coef.len() <= sym {
                coef.resize(sym + 1, 0.0);
            }
            coef[sym] = delta;
        }

        Affine { c, coef, err }
    }
}

impl Div for Affine {
    type Output = Affine;

    fn div(self, rhs: Affine) -> Affine {
        self * rhs.recip()
    }
}

impl Add<f64> for Affine {
    type Output = Affine;

    fn add(self, rhs: f64) -> Affine {
        let mut err = self.err;
        let c = take_mid(Interval::point(self.c) + Interval::point(rhs), &mut err);
        Affine {
            c,
            coef: self.coef,
            err,
        }
    }
}

impl Add<Interval> for Affine {
    type Output = Affine;

    /// Interval shifts add their midpoint to the center and their radius
    /// to the anonymous term (no new symbol).
    fn add(self, rhs: Interval) -> Affine {
        let mut err = rounding::add_up(self.err, rhs.rad());
        let c = take_mid(
            Interval::point(self.c) + Interval::point(rhs.mid()),
            &mut err,
        );
        Affine {
            c,
            coef: self.coef,
            err,
        }
    }
}

impl Mul<f64> for Affine {
    type Output = Affine;

    fn mul(self, rhs: f64) -> Affine {
        Interval::point(rhs) * self
    }
}

impl Mul<Affine> for Interval {
    type Output = Affine;

    /// Interval coefficient times affine form. Each slot is relaxed
    /// independently: `k·aᵢεᵢ ⊆ mid(k)aᵢεᵢ + rad(k)|aᵢ|·[-1,1]`.
    fn mul(self, rhs: Affine) -> Affine {
        let mut err = rounding::mul_up(self.mag(), rhs.err);
        let c = take_mid(self * Interval::point(rhs.c), &mut err);
        let coef = rhs
            .coef
            .iter()
            .map(|&a| take_mid(self * Interval::point(a), &mut err))
            .collect();
        Affine { c, coef, err }
    }
}

impl Zero for Affine {
    fn zero() -> Self {
        Affine::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.c == 0.0 && self.err == 0.0 && self.coef.iter().all(|&a| a == 0.0)
    }
}

impl One for Affine {
    fn one() -> Self {
        Affine::constant(1.0)
    }
}

impl Ring for Affine {
    fn from_f64(c: f64) -> Self {
        Affine::constant(c)
    }
}

impl Transcendental for Affine {
    // First-order Chebyshev forms would be sharper; routing through the
    // interval hull keeps this layer small and still rigorous. The
    // drivers never evaluate vector fields on affine arguments directly.
    fn exp(self) -> Self {
        let sym_free = self.to_interval().exp();
        Affine::from(sym_free)
    }

    fn ln(self) -> Self {
        Affine::from(self.to_interval().ln())
    }

    fn sqrt(self) -> Self {
        Affine::from(self.to_interval().sqrt())
    }

    fn sin(self) -> Self {
        Affine::from(self.to_interval().sin())
    }

    fn cos(self) -> Self {
        Affine::from(self.to_interval().cos())
    }

    fn tan(self) -> Self {
        Affine::from(self.to_interval().tan())
    }

    fn atan(self) -> Self {
        Affine::from(self.to_interval().atan())
    }

    fn sinh(self) -> Self {
        Affine::from(self.to_interval().sinh())
    }

    fn cosh(self) -> Self {
        Affine::from(self.to_interval().cosh())
    }
}

/// Collapse the least-significant noise symbols of the vector `v` so at
/// most `ep_reduce` symbols remain, triggered once more than
/// `ep_reduce_limit` are in use. Each component absorbs its share of the
/// dropped symbols (and its anonymous term) into one fresh dedicated
/// symbol, so the interval hull of every component is preserved while
/// cross-component correlation of the dropped tail is forgotten.
pub fn epsilon_reduce(v: &mut [Affine], ep_reduce: usize, ep_reduce_limit: usize) {
    if ep_reduce == 0 || maxnum() <= ep_reduce_limit {
        return;
    }
    let n = v.len();
    let total = v
        .iter()
        .map(|a| a.coef.len())
        .max()
        .unwrap_or(0)
        .max(maxnum());
    let keep_count = ep_reduce.saturating_sub(n).min(total);

    // Rank symbols by their joint magnitude across the vector.
    let mut score = vec![0.0f64; total];
    for a in v.iter() {
        for (j, &cj) in a.coef.iter().enumerate() {
            score[j] = rounding::add_up(score[j], cj.abs());
        }
    }
    let mut order: Vec<usize> = (0..total).collect();
    order.sort_by(|&a, &b| {
        score[b]
            .partial_cmp(&score[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let kept: Vec<usize> = order.into_iter().take(keep_count).collect();

    let mut keep_flag = vec![false; total];
    let mut new_index = vec![usize::MAX; total];
    for (new_j, &old_j) in kept.iter().enumerate() {
        keep_flag[old_j] = true;
        new_index[old_j] = new_j;
    }

    for (i, a) in v.iter_mut().enumerate() {
        let mut coef = vec![0.0; keep_count + n];
        let mut absorbed = a.err;
        for (j, &cj) in a.coef.iter().enumerate() {
            if keep_flag[j] {
                coef[new_index[j]] = cj;
            } else {
                absorbed = rounding::add_up(absorbed, cj.abs());
            }
        }
        coef[keep_count + i] = absorbed;
        a.coef = coef;
        a.err = 0.0;
    }
    set_maxnum(keep_count + n);
}
