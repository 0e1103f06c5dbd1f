//! Shared test vector fields and a non-validated RK4 reference
//! integrator. The fields are written once, generically over the scalar
//! ring, exactly as a library user would write them.

use crate::core::traits::Ring;
use crate::ode::VectorField;

/// y' = (y₂, -y₁): circular motion, solution (cos t, -sin t) from (1, 0).
pub struct Harmonic;

impl VectorField for Harmonic {
    fn eval<T: Ring>(&self, x: &[T], _t: &T) -> Vec<T> {
        vec![x[1].clone(), -x[0].clone()]
    }
}

/// y' = y (1 - y), the logistic equation.
pub struct Logistic;

impl VectorField for Logistic {
    fn eval<T: Ring>(&self, x: &[T], _t: &T) -> Vec<T> {
        vec![x[0].clone() * (T::one() - x[0].clone())]
    }
}

/// Normalised Lotka-Volterra predator-prey dynamics.
pub struct LotkaVolterra;

impl VectorField for LotkaVolterra {
    fn eval<T: Ring>(&self, x: &[T], _t: &T) -> Vec<T> {
        vec![
            x[0].clone() - x[0].clone() * x[1].clone(),
            x[0].clone() * x[1].clone() - x[1].clone(),
        ]
    }
}

/// The Lorenz system with the classic σ = 10, ρ = 28, β = 8/3.
pub struct Lorenz;

impl VectorField for Lorenz {
    fn eval<T: Ring>(&self, x: &[T], _t: &T) -> Vec<T> {
        vec![
            T::from_f64(10.0) * (x[1].clone() - x[0].clone()),
            T::from_f64(28.0) * x[0].clone() - x[1].clone() - x[0].clone() * x[2].clone(),
            T::from_f64(-8.0 / 3.0) * x[2].clone() + x[0].clone() * x[1].clone(),
        ]
    }
}

/// Van der Pol oscillator; large `mu` makes it stiff.
pub struct VanDerPol {
    pub mu: f64,
}

impl VectorField for VanDerPol {
    fn eval<T: Ring>(&self, x: &[T], _t: &T) -> Vec<T> {
        vec![
            x[1].clone(),
            T::from_f64(self.mu) * (T::one() - x[0].clone() * x[0].clone()) * x[1].clone()
                - x[0].clone(),
        ]
    }
}

/// Plain fixed-step RK4 on `f64`, used as the non-validated ground truth
/// the enclosures must contain.
pub fn rk4<F: VectorField>(f: &F, mut x: Vec<f64>, t0: f64, t1: f64, steps: usize) -> Vec<f64> {
    let h = (t1 - t0) / steps as f64;
    let mut t = t0;
    for _ in 0..steps {
        let k1 = f.eval(&x, &t);
        let xa: Vec<f64> = x.iter().zip(&k1).map(|(xi, k)| xi + 0.5 * h * k).collect();
        let k2 = f.eval(&xa, &(t + 0.5 * h));
        let xb: Vec<f64> = x.iter().zip(&k2).map(|(xi, k)| xi + 0.5 * h * k).collect();
        let k3 = f.eval(&xb, &(t + 0.5 * h));
        let xc: Vec<f64> = x.iter().zip(&k3).map(|(xi, k)| xi + h * k).collect();
        let k4 = f.eval(&xc, &(t + h));
        x = x
            .iter()
            .enumerate()
            .map(|(i, xi)| xi + h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
            .collect();
        t += h;
    }
    x
}
