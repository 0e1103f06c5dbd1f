//! Interval enclosures of the gamma family and the Krawczyk-verified
//! digamma zero.
//!
//! The scalar kernels follow standard numerical practice (argument
//! reduction by the recurrences, then the asymptotic series), made
//! rigorous by evaluating everything in interval arithmetic and enclosing
//! the truncated asymptotic tail by its first omitted term — for real
//! positive arguments these series envelope the true value, so that term
//! brackets the error on both sides.
//!
//! References: DLMF §5.11 <https://dlmf.nist.gov/5.11> (asymptotics of
//! ψ, ψ₁ and ln Γ), §5.7 (recurrences).
//!
//! [`digamma_zero`] locates the extrema of Γ: a float Newton iteration
//! polishes an initial guess, then a Krawczyk step verifies existence and
//! uniqueness — interior containment of `K(I) = x - R ψ(x) +
//! (1 - R ψ₁(I))(I - x)` in the inflated box `I` proves the zero, and the
//! verified enclosure is cached per branch in a task-local table.
//! `[0, 0]` signals a failed verification, as callers can never confuse
//! it with a true zero of ψ.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::core::traits::Transcendental;
use crate::interval::Interval;

/// Branches beyond this are not cached (they are cheap to recompute and
/// the table stays bounded).
const DIGAMMA_ZERO_MAX: i64 = 300;

/// Reduction thresholds for the asymptotic series.
const PSI_SWITCH: f64 = 16.0;
const LGAMMA_SWITCH: f64 = 16.0;

/// Arguments this far into the negative axis are answered with the
/// trivial enclosure instead of a million recurrence steps.
const REDUCTION_LIMIT: f64 = -1.0e6;

thread_local! {
    static ZERO_CACHE: RefCell<FxHashMap<i64, Interval>> =
        RefCell::new(FxHashMap::default());
}

/// Enclosure of the positive digamma zero (the minimum of Γ on x > 0),
/// used as a fallback when the verified computation declines.
/// Digits from OEIS A030169.
fn positive_zero_constant() -> Interval {
    "1.4616321449683623412626595423257213285"
        .parse::<Interval>()
        .unwrap_or(Interval::new(1.46163, 1.46164))
        .widened(1)
}

/// ψ on an interval staying within one branch (no pole inside, or the
/// division below degenerates to the whole line on its own).
fn digamma_branch(x: Interval) -> Interval {
    if !x.lo().is_finite() || x.lo() < REDUCTION_LIMIT {
        return Interval::WHOLE;
    }
    // ψ(x) = ψ(x + k) - Σ 1/(x + i), pushed past the switch point.
    let mut acc = Interval::ZERO;
    let mut xv = x;
    while xv.lo() < PSI_SWITCH {
        acc -= Interval::ONE / xv;
        if acc.is_whole() {
            return Interval::WHOLE;
        }
        xv += 1.0;
    }
    // ψ(x) ~ ln x - 1/(2x) - 1/(12x²) + 1/(120x⁴) - 1/(252x⁶) + 1/(240x⁸) ∓ …
    let x2 = xv * xv;
    let x4 = x2 * x2;
    let mut r = xv.ln() - Interval::point(0.5) / xv;
    r -= Interval::ONE / (x2 * 12.0);
    r += Interval::ONE / (x4 * 120.0);
    r -= Interval::ONE / (x4 * x2 * 252.0);
    r += Interval::ONE / (x4 * x4 * 240.0);
    // Enveloping series for x > 0: the first omitted term brackets.
    let tail = (Interval::point(5.0) / (x4 * x4 * x2 * 66.0)).mag();
    r += Interval::new(-tail, tail);
    acc + r
}

/// Enclosure of the digamma function ψ(x) = Γ'(x)/Γ(x).
pub fn digamma(x: Interval) -> Interval {
    if x.is_empty() {
        return Interval::EMPTY;
    }
    if x.lo() <= 0.0 && x.lo().floor() != x.hi().floor() {
        // A pole sits between the endpoints.
        return Interval::WHOLE;
    }
    // ψ is increasing on every branch (ψ₁ > 0).
    digamma_branch(Interval::point(x.lo())).hull(&digamma_branch(Interval::point(x.hi())))
}

/// ψ₁ on an interval staying within one branch.
fn trigamma_branch(x: Interval) -> Interval {
    if !x.lo().is_finite() || x.lo() < REDUCTION_LIMIT {
        return Interval::new(0.0, f64::INFINITY);
    }
    // ψ₁(x) = ψ₁(x + k) + Σ 1/(x + i)².
    let mut acc = Interval::ZERO;
    let mut xv = x;
    while xv.lo() < PSI_SWITCH {
        acc += Interval::ONE / xv.powi(2);
        if acc.hi() == f64::INFINITY {
            return Interval::new(0.0, f64::INFINITY);
        }
        xv += 1.0;
    }
    // ψ₁(x) ~ 1/x + 1/(2x²) + 1/(6x³) - 1/(30x⁵) + 1/(42x⁷) - 1/(30x⁹) ∓ …
    let x2 = xv * xv;
    let x3 = x2 * xv;
    let x5 = x3 * x2;
    let mut r = Interval::ONE / xv + Interval::ONE / (x2 * 2.0);
    r += Interval::ONE / (x3 * 6.0);
    r -= Interval::ONE / (x5 * 30.0);
    r += Interval::ONE / (x5 * x2 * 42.0);
    r -= Interval::ONE / (x5 * x2 * x2 * 30.0);
    let tail = (Interval::point(5.0) / (x5 * x5 * xv * 66.0)).mag();
    r += Interval::new(-tail, tail);
    acc + r
}

/// Enclosure of the trigamma function ψ₁ = ψ'.
pub fn trigamma(x: Interval) -> Interval {
    if x.is_empty() {
        return Interval::EMPTY;
    }
    if x.lo() > 0.0 {
        // Decreasing on the positive axis.
        return trigamma_branch(Interval::point(x.hi()))
            .hull(&trigamma_branch(Interval::point(x.lo())));
    }
    if x.lo().floor() != x.hi().floor() || x.lo().floor() == x.lo() {
        // Pole inside or on the boundary; ψ₁ is positive everywhere.
        return Interval::new(0.0, f64::INFINITY);
    }
    // Negative branch: not monotone, evaluate the branch kernel on the
    // full interval.
    trigamma_branch(x)
}

/// ln Γ on a thin positive interval.
fn lgamma_point(x: Interval) -> Interval {
    if !x.lo().is_finite() {
        return Interval::WHOLE;
    }
    // ln Γ(x) = ln Γ(x + k) - Σ ln(x + i).
    let mut acc = Interval::ZERO;
    let mut xv = x;
    while xv.lo() < LGAMMA_SWITCH {
        acc -= xv.ln();
        if acc.is_whole() {
            return Interval::WHOLE;
        }
        xv += 1.0;
    }
    // Stirling: (x - 1/2) ln x - x + ln(2π)/2 + Σ B_2n/(2n(2n-1) x^(2n-1)).
    let ln_two_pi = Interval::two_pi().ln();
    let x2 = xv * xv;
    let x4 = x2 * x2;
    let mut r = (xv - Interval::point(0.5)) * xv.ln() - xv + ln_two_pi * 0.5;
    r += Interval::ONE / (xv * 12.0);
    r -= Interval::ONE / (xv * x2 * 360.0);
    r += Interval::ONE / (xv * x4 * 1260.0);
    r -= Interval::ONE / (xv * x4 * x2 * 1680.0);
    r += Interval::ONE / (xv * x4 * x4 * 1188.0);
    let tail = (Interval::point(691.0) / (xv * x4 * x4 * x2 * 360_360.0)).mag();
    r += Interval::new(-tail, tail);
    acc + r
}

/// Enclosure of ln Γ over positive arguments (whole line otherwise).
pub fn lgamma(x: Interval) -> Interval {
    if x.is_empty() {
        return Interval::EMPTY;
    }
    if x.lo() <= 0.0 {
        return Interval::WHOLE;
    }
    let at_ends = lgamma_point(Interval::point(x.lo())).hull(&lgamma_point(Interval::point(x.hi())));
    let m = digamma_zero(x.lo());
    let m = if m.zero_in() { positive_zero_constant() } else { m };
    if x.overlap(&m) {
        at_ends.hull(&lgamma_point(m))
    } else {
        at_ends
    }
}

/// Γ on a thin interval within one branch.
fn gamma_point(x: Interval) -> Interval {
    if x.lo() > 0.0 {
        return lgamma_point(x).exp();
    }
    // Reflection into the positive axis: Γ(x) = π / (sin(πx) Γ(1 - x)).
    let pi = Interval::pi();
    pi / ((pi * x).sin() * gamma_point(Interval::ONE - x))
}

/// Enclosure of the gamma function.
///
/// Intervals spanning a pole (or touching a non-positive integer) give
/// the whole line. On the positive axis the interior minimum is included
/// through the verified digamma zero.
pub fn gamma(x: Interval) -> Interval {
    if x.is_empty() {
        return Interval::EMPTY;
    }
    if x.lo() > 0.0 {
        let mut m = digamma_zero(x.lo());
        if m.zero_in() {
            m = positive_zero_constant();
        }
        let at_ends =
            gamma_point(Interval::point(x.lo())).hull(&gamma_point(Interval::point(x.hi())));
        return if x.overlap(&m) {
            at_ends.hull(&gamma_point(m))
        } else {
            at_ends
        };
    }
    if x.lo().floor() != x.hi().floor() || x.lo().floor() == x.lo() {
        return Interval::WHOLE;
    }
    let m = digamma_zero(x.lo());
    if m.zero_in() {
        // Unverified extremum: fall back to direct branch evaluation.
        return gamma_point(x);
    }
    let at_ends = gamma_point(Interval::point(x.lo())).hull(&gamma_point(Interval::point(x.hi())));
    if x.overlap(&m) {
        at_ends.hull(&gamma_point(m))
    } else {
        at_ends
    }
}

/// Verified zero of ψ on the branch containing `x` (for `x > 0`, the
/// global minimum of Γ at ≈ 1.4616; for negative `x`, the extremum of the
/// branch `(-n-1, -n)`). Returns `[0, 0]` when the Krawczyk test cannot
/// verify the zero. Results are cached per branch in a task-local table.
pub fn digamma_zero(x: f64) -> Interval {
    let n: i64 = if x > 0.0 { 0 } else { -(x.floor() as i64) };

    if n <= DIGAMMA_ZERO_MAX {
        let hit = ZERO_CACHE.with(|c| c.borrow().get(&n).copied());
        if let Some(iv) = hit {
            return iv;
        }
    }

    // Float Newton polish from a branch-specific guess. The negative-axis
    // guess is the classic approximation -n + atan(π/(ln n + 1/(8n)))/π.
    let mut x0 = if n == 0 {
        1.4616
    } else {
        let dn = n as f64;
        -dn + (std::f64::consts::PI / (dn.ln() + 1.0 / (8.0 * dn))).atan() / std::f64::consts::PI
    };
    for _ in 0..15 {
        let num = digamma(Interval::point(x0)).mid();
        let den = trigamma(Interval::point(x0)).mid();
        if !num.is_finite() || !den.is_finite() || den == 0.0 {
            break;
        }
        let d = num / den;
        x0 -= d;
        if d.abs() <= x0.abs() * f64::EPSILON * 3.0 {
            break;
        }
    }

    // Krawczyk verification around the polished point.
    let result = {
        let den = trigamma(Interval::point(x0)).mid();
        if !den.is_finite() || den == 0.0 {
            Interval::ZERO
        } else {
            let r = 1.0 / den;
            let fc = digamma(Interval::point(x0));
            let rfc = Interval::point(r) * fc;
            let d = (2.0 * rfc.mag()).max(x0.abs() * f64::EPSILON * 3.0);
            let i_box = Interval::point(x0) + Interval::new(-d, d);
            let k = Interval::point(x0) - rfc
                + (Interval::ONE - Interval::point(r) * trigamma(i_box))
                    * (i_box - Interval::point(x0));
            if k.proper_subset(&i_box) {
                k
            } else {
                Interval::ZERO
            }
        }
    };

    if n <= DIGAMMA_ZERO_MAX {
        ZERO_CACHE.with(|c| {
            c.borrow_mut().insert(n, result);
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digamma_at_one_is_minus_euler() {
        // ψ(1) = -γ = -0.5772156649015329…
        let d = digamma(Interval::point(1.0));
        assert!(d.contains(-0.577_215_664_901_532_9));
        assert!(d.width() < 1e-12);
    }

    #[test]
    fn trigamma_at_one_is_pi2_over_6() {
        let t = trigamma(Interval::point(1.0));
        let exact = std::f64::consts::PI * std::f64::consts::PI / 6.0;
        assert!(t.widened(2).contains(exact));
        assert!(t.width() < 1e-11);
    }

    #[test]
    fn gamma_small_integers_and_half() {
        let g4 = gamma(Interval::point(4.0));
        assert!(g4.contains(6.0));
        assert!(g4.width() < 1e-12);
        let g_half = gamma(Interval::point(0.5));
        assert!(g_half.widened(2).contains(std::f64::consts::PI.sqrt()));
    }

    #[test]
    fn gamma_spanning_the_minimum_includes_it() {
        // Γ on [1.2, 1.8] dips to Γ(1.4616…) ≈ 0.8856031944.
        let g = gamma(Interval::new(1.2, 1.8));
        assert!(g.contains(0.885_603_194_410_889));
        assert!(g.lo() < 0.8857);
    }

    #[test]
    fn gamma_negative_branch_by_reflection() {
        // Γ(-1.5) = 4√π/3 ≈ 2.3632718012073548.
        let g = gamma(Interval::point(-1.5));
        assert!(g.widened(4).contains(2.363_271_801_207_355));
        assert!(gamma(Interval::new(-1.5, -0.5)).is_whole());
        assert!(gamma(Interval::point(-2.0)).is_whole());
    }

    #[test]
    fn digamma_zero_is_verified_and_interior() {
        let z = digamma_zero(2.0);
        assert!(!z.zero_in());
        assert!(z.contains(1.461_632_144_968_362_3));
        // ψ must straddle zero across the verified enclosure.
        assert!(digamma(z).zero_in());
        assert!(z.width() < 1e-10);
    }

    #[test]
    fn digamma_zero_negative_branch() {
        // First negative branch extremum at ≈ -0.5040830082644554.
        let z = digamma_zero(-0.3);
        assert!(!z.zero_in());
        assert!(z.contains(-0.504_083_008_264_455_4));
        assert!(digamma(z).zero_in());
    }

    #[test]
    fn digamma_pole_crossing_is_whole() {
        assert!(digamma(Interval::new(-0.5, 0.5)).is_whole());
        assert!(trigamma(Interval::new(-1.5, -0.5)).hi() == f64::INFINITY);
    }

    #[test]
    fn cached_zero_is_stable() {
        let a = digamma_zero(5.0);
        let b = digamma_zero(7.0);
        assert_eq!(a, b);
    }
}
