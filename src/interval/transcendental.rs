//! Enclosures of the elementary transcendental functions.
//!
//! Every function follows the same recipe:
//! 1. reduce the argument to a region where a truncated series converges
//!    quickly (using exact or interval-tracked reductions),
//! 2. sum the series in interval arithmetic and add an interval bound on
//!    the discarded tail,
//! 3. extend to the input interval through monotonicity, or through
//!    explicit extremum bookkeeping for the periodic functions.
//!
//! The guarantee is containment, not tightness: the result holds the image
//! of every real point of the input. Domain violations (`ln` of a
//! zero-crossing interval, `sqrt` of a partly negative one) clip to the
//! natural domain and stretch the offending endpoint to ±∞; an empty
//! domain intersection yields the whole line. Nothing here panics.

use crate::core::traits::Transcendental;
use crate::interval::Interval;
use crate::rounding;

/// `exp` overflows past this (`ln(f64::MAX)` is about 709.7827).
const EXP_OVERFLOW: f64 = 709.79;
/// `exp` is below the smallest subnormal before this.
const EXP_UNDERFLOW: f64 = -746.0;

/// Two-ulp enclosure of a correctly-rounded-to-nearest constant.
#[inline]
fn widened_const(c: f64) -> Interval {
    Interval::new(c.next_down(), c.next_up())
}

impl Interval {
    /// Enclosure of π.
    #[inline]
    pub fn pi() -> Interval {
        widened_const(std::f64::consts::PI)
    }

    /// Enclosure of π/2.
    #[inline]
    pub fn pi_half() -> Interval {
        Interval::pi() * 0.5
    }

    /// Enclosure of 2π.
    #[inline]
    pub fn two_pi() -> Interval {
        Interval::pi() * 2.0
    }

    /// Enclosure of Euler's number e.
    #[inline]
    pub fn e() -> Interval {
        widened_const(std::f64::consts::E)
    }

    /// Enclosure of ln 2.
    #[inline]
    pub fn ln_2() -> Interval {
        widened_const(std::f64::consts::LN_2)
    }
}

/// Upper bound on the geometric tail `|term| * q / (1 - q)` where each
/// further term shrinks by at least `q < 1`.
fn geometric_tail(term_mag: f64, q: f64) -> f64 {
    let den = rounding::sub_down(1.0, q);
    if den <= 0.0 {
        return f64::INFINITY;
    }
    rounding::div_up(rounding::mul_up(term_mag, q), den)
}

/// Symmetric pad `[-rho, rho]`.
#[inline]
fn pad(rho: f64) -> Interval {
    Interval::new(-rho, rho)
}

// ============================================================================
// Thin-argument kernels
// ============================================================================

/// `exp` of the single point `a`.
fn exp_thin(a: f64) -> Interval {
    if a >= EXP_OVERFLOW {
        return Interval::new(f64::MAX, f64::INFINITY);
    }
    if a <= EXP_UNDERFLOW {
        return Interval::new(0.0, f64::MIN_POSITIVE);
    }
    // exp(a) = e^n * exp(r) with n = round(a), |r| <= 1/2 + eps.
    let n = a.round();
    let r = Interval::point(a) - Interval::point(n);
    let e_n = Interval::e().powi(n as i32);

    let mut sum = Interval::ONE;
    let mut term = Interval::ONE;
    let mut k = 0usize;
    loop {
        k += 1;
        term = term * r / (k as f64);
        sum += term;
        if term.mag() < 1e-20 || k >= 30 {
            break;
        }
    }
    // Remaining terms shrink by at least |r|/(k+2) each.
    let q = rounding::div_up(r.mag(), (k + 2) as f64);
    let next = rounding::div_up(rounding::mul_up(term.mag(), r.mag()), (k + 1) as f64);
    sum += pad(rounding::add_up(next, geometric_tail(next, q)));
    e_n * sum
}

/// `ln` of the single point `a > 0`.
fn ln_thin(a: f64) -> Interval {
    debug_assert!(a > 0.0 && a.is_finite());
    // Exact decomposition a = m * 2^e2 with m in [0.75, 1.5].
    let (mut a_scaled, mut e2) = (a, 0i64);
    if a_scaled < f64::MIN_POSITIVE {
        a_scaled *= 2f64.powi(54);
        e2 -= 54;
    }
    let bits = a_scaled.to_bits();
    e2 += (((bits >> 52) & 0x7ff) as i64) - 1023;
    let mut m = f64::from_bits((bits & 0x000f_ffff_ffff_ffff) | (1023u64 << 52));
    if m > 1.5 {
        m *= 0.5;
        e2 += 1;
    }
    // ln m = 2 atanh(t), t = (m-1)/(m+1), |t| <= 1/5.
    let mi = Interval::point(m);
    let t = (mi - 1.0) / (mi + 1.0);
    let t2 = t * t;
    let mut sum = t;
    let mut term = t;
    let mut j = 0usize;
    loop {
        j += 1;
        term = term * t2;
        sum += term / ((2 * j + 1) as f64);
        if term.mag() < 1e-22 || j >= 20 {
            break;
        }
    }
    let next = rounding::div_up(rounding::mul_up(term.mag(), t2.mag()), (2 * j + 3) as f64);
    let tail = rounding::add_up(next, geometric_tail(next, t2.mag()));
    let ln_m = sum * 2.0 + pad(rounding::mul_up(2.0, tail));
    Interval::ln_2() * (e2 as f64) + ln_m
}

/// `sin` of the single point `a`, for `|a| <= 7`.
fn sin_thin(a: f64) -> Interval {
    let x = Interval::point(a);
    let x2 = x * x;
    let mut sum = x;
    let mut term = x;
    let mut k = 0usize;
    loop {
        k += 1;
        term = term * x2 / (-(((2 * k) * (2 * k + 1)) as f64));
        sum += term;
        if term.mag() < 1e-20 || k >= 30 {
            break;
        }
    }
    let q = rounding::div_up(x2.mag(), ((2 * k + 2) * (2 * k + 3)) as f64);
    let next = rounding::div_up(
        rounding::mul_up(term.mag(), x2.mag()),
        ((2 * k + 2) * (2 * k + 3)) as f64,
    );
    sum += pad(rounding::add_up(next, geometric_tail(next, q)));
    sum.intersect(&Interval::new(-1.0, 1.0))
}

/// `cos` of the single point `a`, for `|a| <= 7`.
fn cos_thin(a: f64) -> Interval {
    let x = Interval::point(a);
    let x2 = x * x;
    let mut sum = Interval::ONE;
    let mut term = Interval::ONE;
    let mut k = 0usize;
    loop {
        k += 1;
        term = term * x2 / (-(((2 * k - 1) * (2 * k)) as f64));
        sum += term;
        if term.mag() < 1e-20 || k >= 30 {
            break;
        }
    }
    let q = rounding::div_up(x2.mag(), ((2 * k + 1) * (2 * k + 2)) as f64);
    let next = rounding::div_up(
        rounding::mul_up(term.mag(), x2.mag()),
        ((2 * k + 1) * (2 * k + 2)) as f64,
    );
    sum += pad(rounding::add_up(next, geometric_tail(next, q)));
    sum.intersect(&Interval::new(-1.0, 1.0))
}

/// `atan` over a small interval, `|x| <= 1/2` (alternating series).
fn atan_small(x: Interval) -> Interval {
    let x2 = x * x;
    let mut sum = x;
    let mut term = x;
    let mut k = 0usize;
    loop {
        k += 1;
        term = term * x2;
        let signed = if k % 2 == 1 { -term } else { term };
        sum = sum + signed / ((2 * k + 1) as f64);
        if term.mag() < 1e-20 || k >= 25 {
            break;
        }
    }
    // Alternating with decreasing magnitude: the tail is bounded by the
    // first omitted term.
    let next = rounding::div_up(rounding::mul_up(term.mag(), x2.mag()), (2 * k + 3) as f64);
    sum + pad(next)
}

/// `atan` of the single point `a`.
fn atan_thin(a: f64) -> Interval {
    if a == f64::INFINITY {
        return Interval::pi_half();
    }
    if a == f64::NEG_INFINITY {
        return -Interval::pi_half();
    }
    if a < 0.0 {
        return -atan_thin(-a);
    }
    if a > 2.0 {
        // atan(a) = pi/2 - atan(1/a), 1/a < 1/2.
        return Interval::pi_half() - atan_small(Interval::ONE / a);
    }
    // Half-angle descent: atan(x) = 2 atan(x / (1 + sqrt(1 + x^2))).
    let mut x = Interval::point(a);
    let mut doublings = 0u32;
    while x.mag() > 0.5 && doublings < 4 {
        x = x / (Interval::ONE + (Interval::ONE + x * x).sqrt());
        doublings += 1;
    }
    atan_small(x) * f64::from(1u32 << doublings)
}

/// `sinh` of the single point `a`.
fn sinh_thin(a: f64) -> Interval {
    if a == f64::INFINITY {
        return Interval::new(f64::MAX, f64::INFINITY);
    }
    if a == f64::NEG_INFINITY {
        return Interval::new(f64::NEG_INFINITY, -f64::MAX);
    }
    (exp_thin(a) - exp_thin(-a)) * 0.5
}

/// `cosh` of the single point `a`.
fn cosh_thin(a: f64) -> Interval {
    if a.is_infinite() {
        return Interval::new(f64::MAX, f64::INFINITY);
    }
    (exp_thin(a) + exp_thin(-a)) * 0.5
}

// ============================================================================
// Interval extensions
// ============================================================================

impl Transcendental for Interval {
    fn exp(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        let lo = if self.lo() == f64::NEG_INFINITY {
            0.0
        } else {
            exp_thin(self.lo()).lo()
        };
        let hi = if self.hi() == f64::INFINITY {
            f64::INFINITY
        } else {
            exp_thin(self.hi()).hi()
        };
        Interval::new(lo, hi)
    }

    fn ln(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if self.hi() <= 0.0 {
            // Empty intersection with the domain (0, inf).
            return Interval::WHOLE;
        }
        let lo = if self.lo() <= 0.0 {
            f64::NEG_INFINITY
        } else {
            ln_thin(self.lo()).lo()
        };
        let hi = if self.hi() == f64::INFINITY {
            f64::INFINITY
        } else {
            ln_thin(self.hi()).hi()
        };
        Interval::new(lo, hi)
    }

    fn sqrt(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if self.hi() < 0.0 {
            return Interval::WHOLE;
        }
        let lo = if self.lo() <= 0.0 {
            0.0
        } else {
            rounding::sqrt_down(self.lo())
        };
        let hi = if self.hi() == f64::INFINITY {
            f64::INFINITY
        } else {
            rounding::sqrt_up(self.hi())
        };
        Interval::new(lo, hi)
    }

    fn sin(self) -> Interval {
        let Some(t) = reduce_periodic(self) else {
            return Interval::new(-1.0, 1.0);
        };
        let mut out = sin_thin(t.lo()).hull(&sin_thin(t.hi()));
        for k in -1..=1i32 {
            let shift = Interval::two_pi() * f64::from(k);
            if t.overlap(&(Interval::pi_half() + shift)) {
                out = out.hull(&Interval::ONE);
            }
            if t.overlap(&(-Interval::pi_half() + shift)) {
                out = out.hull(&(-Interval::ONE));
            }
        }
        out.intersect(&Interval::new(-1.0, 1.0))
    }

    fn cos(self) -> Interval {
        let Some(t) = reduce_periodic(self) else {
            return Interval::new(-1.0, 1.0);
        };
        let mut out = cos_thin(t.lo()).hull(&cos_thin(t.hi()));
        for k in -1..=1i32 {
            let shift = Interval::two_pi() * f64::from(k);
            if t.overlap(&shift) {
                out = out.hull(&Interval::ONE);
            }
            if t.overlap(&(Interval::pi() + shift)) || t.overlap(&(-Interval::pi() + shift)) {
                out = out.hull(&(-Interval::ONE));
            }
        }
        out.intersect(&Interval::new(-1.0, 1.0))
    }

    fn tan(self) -> Interval {
        self.sin() / self.cos()
    }

    fn atan(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(atan_thin(self.lo()).lo(), atan_thin(self.hi()).hi())
    }

    fn sinh(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(sinh_thin(self.lo()).lo(), sinh_thin(self.hi()).hi())
    }

    fn cosh(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        let out = cosh_thin(self.lo()).hull(&cosh_thin(self.hi()));
        if self.zero_in() {
            Interval::new(1.0, out.hi())
        } else {
            out
        }
    }

    fn pow(self, y: Interval) -> Interval {
        if self.is_empty() || y.is_empty() {
            return Interval::EMPTY;
        }
        if self.lo() > 0.0 {
            return (y * self.ln()).exp();
        }
        if self.lo() == 0.0 && self.hi() > 0.0 && y.lo() > 0.0 {
            // x^y is increasing in x for y > 0; the infimum is 0.
            let top = (y * ln_thin(self.hi())).exp();
            return Interval::new(0.0, top.hi());
        }
        // Negative base with a real (non-integer) exponent range.
        Interval::WHOLE
    }
}

/// Shift the argument by a multiple of 2π into a window the point kernels
/// accept; `None` means the interval covers a full period (or the shift
/// lost too much) and the caller must fall back to `[-1, 1]`.
fn reduce_periodic(x: Interval) -> Option<Interval> {
    if x.is_empty() || !x.lo().is_finite() || !x.hi().is_finite() {
        return None;
    }
    let two_pi = Interval::two_pi();
    if x.width() >= two_pi.hi() {
        return None;
    }
    let n = (x.mid() / (2.0 * std::f64::consts::PI)).round();
    let t = x - two_pi * n;
    if t.width() >= two_pi.hi() || t.mag() > 7.0 {
        return None;
    }
    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_encloses(iv: Interval, x: f64) {
        // One ulp of slack: libm results are near-correctly rounded but
        // not exact, while `iv` encloses the exact value.
        assert!(
            iv.widened(1).contains(x),
            "{iv} should contain {x}"
        );
    }

    #[test]
    fn exp_brackets_known_values() {
        let e1 = Interval::point(1.0).exp();
        assert_encloses(e1, std::f64::consts::E);
        assert!(e1.width() < 1e-14);
        let e0 = Interval::point(0.0).exp();
        assert_eq!(e0, Interval::ONE);
    }

    #[test]
    fn exp_of_eighth_quarter() {
        // exp([0.125, 0.25]) as in the dd driver example.
        let r = Interval::new(0.125, 0.25).exp();
        assert!(r.subset(&Interval::new(1.1331, 1.2841)));
        assert_encloses(r, 0.125f64.exp());
        assert_encloses(r, 0.25f64.exp());
    }

    #[test]
    fn ln_inverts_exp() {
        for &x in &[0.1, 0.5, 1.0, 2.0, 10.0, 1e10, 1e-10] {
            let l = Interval::point(x).ln();
            assert_encloses(l, x.ln());
            assert!(l.width() < 1e-13);
        }
    }

    #[test]
    fn ln_domain_edges() {
        assert!(Interval::new(-1.0, -0.5).ln().is_whole());
        let l = Interval::new(0.0, 1.0).ln();
        assert_eq!(l.lo(), f64::NEG_INFINITY);
        assert!(l.hi() >= 0.0);
    }

    #[test]
    fn sqrt_domain_edges() {
        assert!(Interval::new(-2.0, -1.0).sqrt().is_whole());
        let s = Interval::new(-1.0, 4.0).sqrt();
        assert_eq!(s.lo(), 0.0);
        assert!(s.contains(2.0));
    }

    #[test]
    fn sin_quarter_turns() {
        let s = Interval::point(std::f64::consts::FRAC_PI_2).sin();
        assert_encloses(s, 1.0);
        let s = Interval::point(std::f64::consts::PI).sin();
        assert_encloses(s, 0.0);
        assert!(s.mag() < 1e-14);
    }

    #[test]
    fn sin_finds_interior_extremum() {
        let s = Interval::new(1.0, 2.0).sin(); // pi/2 inside
        assert_eq!(s.hi(), 1.0);
        assert!(s.lo() <= 1.0f64.sin());
        let c = Interval::new(3.0, 4.0).cos(); // pi inside
        assert_eq!(c.lo(), -1.0);
    }

    #[test]
    fn wide_arguments_saturate() {
        let s = Interval::new(0.0, 100.0).sin();
        assert_eq!(s, Interval::new(-1.0, 1.0));
    }

    #[test]
    fn sin_large_reduced_argument() {
        let x = 1000.0;
        let s = Interval::point(x).sin();
        assert_encloses(s, x.sin());
        assert!(s.width() < 1e-12);
    }

    #[test]
    fn atan_limits() {
        let a = Interval::new(f64::NEG_INFINITY, f64::INFINITY).atan();
        assert!(a.subset(&Interval::new(-1.5708, 1.5708)));
        for &x in &[-5.0, -1.0, -0.3, 0.0, 0.4, 1.0, 3.0, 100.0] {
            assert_encloses(Interval::point(x).atan(), x.atan());
        }
    }

    #[test]
    fn hyperbolics() {
        for &x in &[-2.0, -0.5, 0.0, 0.5, 3.0] {
            assert_encloses(Interval::point(x).sinh(), x.sinh());
            assert_encloses(Interval::point(x).cosh(), x.cosh());
        }
        let c = Interval::new(-1.0, 2.0).cosh();
        assert_eq!(c.lo(), 1.0);
        assert!(c.contains(2.0f64.cosh()));
    }

    #[test]
    fn pow_positive_base() {
        let p = Interval::new(2.0, 3.0).pow(Interval::new(2.0, 2.0));
        assert!(p.contains(4.0) && p.contains(9.0));
        assert!(p.subset(&Interval::new(3.9, 9.1)));
    }

    #[test]
    fn constants_bracket() {
        assert!(Interval::pi().contains(std::f64::consts::PI));
        assert!(Interval::pi().width() < 1e-15);
        assert!(Interval::e().contains(std::f64::consts::E));
        assert!(Interval::ln_2().contains(std::f64::consts::LN_2));
    }
}
