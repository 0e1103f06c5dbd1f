//! Forward-mode automatic differentiation over an arbitrary ring.
//!
//! [`AutoDif`] carries a value and a gradient with respect to the set of
//! independent variables declared through [`AutoDif::init`]; gradient
//! index `i` belongs to the `i`-th declared independent. Instantiated at
//! `T = Interval` it yields rigorous first variations; nested inside the
//! power-series algebra (`Psa<AutoDif<Interval>>`) it transports the
//! variational equation through a Taylor step.
//!
//! Gradient vectors of different lengths combine by zero-extension, so
//! constants can stay gradient-free until an operation mixes them with a
//! live independent.

use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::core::traits::{Field, Ring, TaylorRing, Transcendental};
use crate::interval::Interval;

/// Value plus gradient: a first-order jet over the ring `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoDif<T> {
    /// Function value.
    pub v: T,
    /// Gradient; index `i` pairs with the `i`-th declared independent.
    /// May be shorter than the full independent set (missing = zero).
    pub d: Vec<T>,
}

impl<T: Ring> AutoDif<T> {
    /// A constant: value with an identically zero gradient.
    pub fn constant(v: T) -> Self {
        AutoDif { v, d: Vec::new() }
    }

    /// Declare `values` as the independent variables: the `i`-th result
    /// carries the `i`-th standard basis vector as its gradient.
    pub fn init(values: &[T]) -> Vec<AutoDif<T>> {
        let n = values.len();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut d = vec![T::zero(); n];
                d[i] = T::one();
                AutoDif { v: v.clone(), d }
            })
            .collect()
    }

    /// Extract values and the Jacobian matrix (rows zero-padded to the
    /// widest gradient present).
    pub fn split(jets: &[AutoDif<T>]) -> (Vec<T>, Vec<Vec<T>>) {
        let width = jets.iter().map(|a| a.d.len()).max().unwrap_or(0);
        let values = jets.iter().map(|a| a.v.clone()).collect();
        let jac = jets
            .iter()
            .map(|a| {
                let mut row = a.d.clone();
                row.resize(width, T::zero());
                row
            })
            .collect();
        (values, jac)
    }

    /// Rebase the jets onto a fresh standard basis of dimension
    /// `jets.len()`, returning the rebased jets and the `save` matrix of
    /// original gradients needed by [`AutoDif::expand`].
    ///
    /// Any gradient coordinate that is identically zero across `jets`
    /// stops being carried through the computation; per-step work drops
    /// from O(n²·k) to O(n·k) when the caller's basis is much wider than
    /// the state.
    pub fn compress(jets: &[AutoDif<T>]) -> (Vec<AutoDif<T>>, Vec<Vec<T>>) {
        let (values, save) = AutoDif::split(jets);
        (AutoDif::init(&values), save)
    }

    /// Undo [`AutoDif::compress`]: express a gradient taken w.r.t. the
    /// compressed basis in the original one (`d_new = d · save`).
    pub fn expand(jet: &AutoDif<T>, save: &[Vec<T>]) -> AutoDif<T> {
        let width = save.first().map_or(0, Vec::len);
        let mut d = vec![T::zero(); width];
        for (k, dk) in jet.d.iter().enumerate() {
            if k >= save.len() {
                break;
            }
            for (j, s) in save[k].iter().enumerate() {
                d[j] = d[j].clone() + dk.clone() * s.clone();
            }
        }
        AutoDif {
            v: jet.v.clone(),
            d,
        }
    }

    /// Zero-extend the gradient to length `n` in place.
    pub fn resize_grad(&mut self, n: usize) {
        if self.d.len() < n {
            self.d.resize(n, T::zero());
        }
    }

    fn zip_grads<F: Fn(T, T) -> T>(a: &[T], b: &[T], f: F) -> Vec<T> {
        let n = a.len().max(b.len());
        (0..n)
            .map(|i| {
                let x = a.get(i).cloned().unwrap_or_else(T::zero);
                let y = b.get(i).cloned().unwrap_or_else(T::zero);
                f(x, y)
            })
            .collect()
    }

    /// Apply the chain rule: value `v`, every gradient entry scaled by
    /// `dfac`.
    fn chain(self, v: T, dfac: T) -> Self {
        let d = self
            .d
            .into_iter()
            .map(|g| dfac.clone() * g)
            .collect();
        AutoDif { v, d }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

impl<T: Ring> Add for AutoDif<T> {
    type Output = AutoDif<T>;

    fn add(self, rhs: AutoDif<T>) -> AutoDif<T> {
        AutoDif {
            v: self.v + rhs.v,
            d: AutoDif::zip_grads(&self.d, &rhs.d, |x, y| x + y),
        }
    }
}

impl<T: Ring> Sub for AutoDif<T> {
    type Output = AutoDif<T>;

    fn sub(self, rhs: AutoDif<T>) -> AutoDif<T> {
        AutoDif {
            v: self.v - rhs.v,
            d: AutoDif::zip_grads(&self.d, &rhs.d, |x, y| x - y),
        }
    }
}

impl<T: Ring> Neg for AutoDif<T> {
    type Output = AutoDif<T>;

    fn neg(self) -> AutoDif<T> {
        AutoDif {
            v: -self.v,
            d: self.d.into_iter().map(|g| -g).collect(),
        }
    }
}

impl<T: Ring> Mul for AutoDif<T> {
    type Output = AutoDif<T>;

    fn mul(self, rhs: AutoDif<T>) -> AutoDif<T> {
        let d = AutoDif::zip_grads(&self.d, &rhs.d, |x, y| {
            x * rhs.v.clone() + self.v.clone() * y
        });
        AutoDif {
            v: self.v * rhs.v,
            d,
        }
    }
}

impl<T: Field> Div for AutoDif<T> {
    type Output = AutoDif<T>;

    fn div(self, rhs: AutoDif<T>) -> AutoDif<T> {
        let q = self.v.clone() / rhs.v.clone();
        let d = AutoDif::zip_grads(&self.d, &rhs.d, |x, y| {
            (x - q.clone() * y) / rhs.v.clone()
        });
        AutoDif { v: q, d }
    }
}

impl<T: Ring> Zero for AutoDif<T> {
    fn zero() -> Self {
        AutoDif::constant(T::zero())
    }

    fn is_zero(&self) -> bool {
        self.v.is_zero() && self.d.iter().all(Zero::is_zero)
    }
}

impl<T: Ring> One for AutoDif<T> {
    fn one() -> Self {
        AutoDif::constant(T::one())
    }
}

impl<T: Ring> Ring for AutoDif<T> {
    fn from_f64(c: f64) -> Self {
        AutoDif::constant(T::from_f64(c))
    }
}

impl<T: TaylorRing> TaylorRing for AutoDif<T> {
    fn scale(&self, k: Interval) -> Self {
        AutoDif {
            v: self.v.scale(k),
            d: self.d.iter().map(|g| g.scale(k)).collect(),
        }
    }
}

impl<T: Field + Transcendental> Transcendental for AutoDif<T> {
    fn exp(self) -> Self {
        let v = self.v.clone().exp();
        let dfac = v.clone();
        self.chain(v, dfac)
    }

    fn ln(self) -> Self {
        let v = self.v.clone().ln();
        let dfac = T::one() / self.v.clone();
        self.chain(v, dfac)
    }

    fn sqrt(self) -> Self {
        let v = self.v.clone().sqrt();
        let dfac = T::one() / (T::from_f64(2.0) * v.clone());
        self.chain(v, dfac)
    }

    fn sin(self) -> Self {
        let v = self.v.clone().sin();
        let dfac = self.v.clone().cos();
        self.chain(v, dfac)
    }

    fn cos(self) -> Self {
        let v = self.v.clone().cos();
        let dfac = -self.v.clone().sin();
        self.chain(v, dfac)
    }

    fn tan(self) -> Self {
        let v = self.v.clone().tan();
        let dfac = T::one() + v.clone() * v.clone();
        self.chain(v, dfac)
    }

    fn atan(self) -> Self {
        let v = self.v.clone().atan();
        let dfac = T::one() / (T::one() + self.v.clone() * self.v.clone());
        self.chain(v, dfac)
    }

    fn sinh(self) -> Self {
        let v = self.v.clone().sinh();
        let dfac = self.v.clone().cosh();
        self.chain(v, dfac)
    }

    fn cosh(self) -> Self {
        let v = self.v.clone().cosh();
        let dfac = self.v.clone().sinh();
        self.chain(v, dfac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;

    fn point(x: f64) -> Interval {
        Interval::point(x)
    }

    #[test]
    fn init_builds_standard_basis() {
        let jets = AutoDif::init(&[point(1.0), point(2.0)]);
        assert_eq!(jets[0].d[0], Interval::ONE);
        assert!(jets[0].d[1].is_zero());
        assert!(jets[1].d[0].is_zero());
        assert_eq!(jets[1].d[1], Interval::ONE);
    }

    #[test]
    fn product_rule() {
        // f(x, y) = x * y at (3, 5): grad = (5, 3).
        let jets = AutoDif::init(&[point(3.0), point(5.0)]);
        let f = jets[0].clone() * jets[1].clone();
        assert!(f.v.contains(15.0));
        assert!(f.d[0].contains(5.0));
        assert!(f.d[1].contains(3.0));
    }

    #[test]
    fn quotient_rule() {
        // f(x, y) = x / y at (1, 2): grad = (1/2, -1/4).
        let jets = AutoDif::init(&[point(1.0), point(2.0)]);
        let f = jets[0].clone() / jets[1].clone();
        assert!(f.v.contains(0.5));
        assert!(f.d[0].contains(0.5));
        assert!(f.d[1].contains(-0.25));
    }

    #[test]
    fn chain_rule_through_transcendentals() {
        // d/dx exp(sin x) = cos(x) exp(sin x) at x = 0.7.
        let x = 0.7;
        let jets = AutoDif::init(&[point(x)]);
        let f = jets[0].clone().sin().exp();
        assert!(f.v.widened(2).contains(x.sin().exp()));
        assert!(f.d[0].widened(2).contains(x.cos() * x.sin().exp()));
    }

    #[test]
    fn compress_then_expand_restores_basis() {
        // Two jets whose gradients live in a 4-wide basis.
        let mut jets = AutoDif::init(&[point(1.0), point(2.0), point(3.0), point(4.0)]);
        jets.truncate(2);
        let (packed, save) = AutoDif::compress(&jets);
        assert_eq!(packed[0].d.len(), 2);
        let f = packed[0].clone() * packed[1].clone();
        let full = AutoDif::expand(&f, &save);
        assert_eq!(full.d.len(), 4);
        // d(x0*x1)/dx0 = x1 = 2, and nothing depends on x2, x3.
        assert!(full.d[0].contains(2.0));
        assert!(full.d[2].is_zero() && full.d[3].is_zero());
    }

    #[test]
    fn mixed_width_gradients_zero_extend() {
        let jets = AutoDif::init(&[point(2.0)]);
        let c = AutoDif::constant(point(10.0));
        let f = jets[0].clone() * c;
        assert!(f.v.contains(20.0));
        assert!(f.d[0].contains(10.0));
    }
}
