//! One self-validating Taylor step.
//!
//! The algorithm, for a step from `start` toward `end`:
//!
//! 1. build the Taylor polynomial of the solution by iterating the
//!    Picard operator `x ↦ x₀ + ∫ f(x, t) dτ` in grow-order mode — after
//!    `order` passes the polynomial is exact through `order` (coefficient
//!    k is fixed after pass k, which is also what makes the
//!    multiplication history sound);
//! 2. pick the step radius from the magnitudes of the two highest
//!    non-vanishing coefficients;
//! 3. switch the series algebra to fixed-order mode over the step
//!    domain, inflate the top coefficient into a candidate box
//!    (`make_candidate`), re-apply the Picard operator once and rescale
//!    the radius from the observed growth (one-shot resize feedback);
//! 4. re-apply the operator again: interior containment of the top
//!    coefficient proves existence and enclosure (Picard-Lindelöf); on
//!    failure halve the radius up to `restart_max` times;
//! 5. tighten by `iter_max` intersection passes (the intersection of two
//!    valid enclosures is valid), then evaluate at the step width.
//!
//! [`ode`] propagates a plain interval box; [`ode_autodif`] additionally
//! transports first-variation jets, verifying containment on value *and*
//! gradient parts, with the gradient basis compressed for the duration of
//! the step.

use crate::autodif::AutoDif;
use crate::interval::Interval;
use crate::ode::candidate::make_candidate;
use crate::ode::{OdeParam, OdeStatus, VectorField};
use crate::psa::{self, Psa, PsaMode};

/// Clamp for the one-shot resize feedback ratio.
const RESIZE_MIN: f64 = 0.01;
const RESIZE_MAX: f64 = 100.0;

/// Saved PSA context, restored on every exit path of a step.
struct CtxGuard {
    mode: PsaMode,
    use_history: bool,
    record_history: bool,
}

impl CtxGuard {
    fn save() -> Self {
        CtxGuard {
            mode: psa::mode(),
            use_history: psa::use_history(),
            record_history: psa::record_history(),
        }
    }
}

impl Drop for CtxGuard {
    fn drop(&mut self) {
        psa::set_mode(self.mode);
        psa::set_use_history(self.use_history);
        psa::set_record_history(self.record_history);
        psa::history_clear();
    }
}

/// One application of the Picard operator at truncation order `order`.
fn picard<F: VectorField>(
    f: &F,
    x0: &[Interval],
    z: &[Psa<Interval>],
    t: &Psa<Interval>,
    order: usize,
) -> Vec<Psa<Interval>> {
    let y = f.eval(z, t);
    x0.iter()
        .zip(y)
        .map(|(&c, yi)| Psa::constant(c) + yi.integrate().setorder(order))
        .collect()
}

/// One validated step on an interval box. On success `init` holds the
/// enclosure at the achieved end; `end` is rewritten when only part of
/// the requested range was covered. `result_psa`, when supplied,
/// receives the verified solution polynomial in τ = t - start.
pub fn ode<F: VectorField>(
    f: &F,
    init: &mut Vec<Interval>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    mut result_psa: Option<&mut Vec<Psa<Interval>>>,
) -> OdeStatus {
    let n = init.len();
    let order = p.order.max(1);
    let x0: Vec<Interval> = init.clone();

    // Error target: machine epsilon scaled by the data, plus a tol1
    // fraction of the incoming radius.
    let mut tolerance = f64::EPSILON;
    for x in &x0 {
        tolerance = tolerance
            .max(x.norm() * f64::EPSILON)
            .max(x.rad() * p.tol1);
    }

    let guard = CtxGuard::save();
    psa::set_mode(PsaMode::Grow);
    psa::set_use_history(false);
    psa::set_record_history(true);
    psa::history_clear();

    let torg: Psa<Interval> = Psa::time(start);
    let mut x: Vec<Psa<Interval>> = x0.iter().map(|&v| Psa::constant(v)).collect();
    for j in 0..order {
        if j == 1 {
            psa::set_use_history(true);
        }
        psa::history_rewind();
        let t = torg.setorder(j);
        x = picard(f, &x0, &x, &t, j + 1);
    }
    psa::set_use_history(false);
    psa::set_record_history(false);

    // Step radius from the top coefficients: the first two non-vanishing
    // magnitudes m_j, each read as a convergence-radius estimate m_j^(1/j).
    let mut radius = 0.0f64;
    if p.autostep {
        let mut seen = 0;
        for j in (1..=order).rev() {
            let mut mj = 0.0f64;
            for xi in &x {
                mj = mj.max(xi.c[j].mid().abs());
            }
            if mj == 0.0 {
                continue;
            }
            radius = radius.max(mj.powf(1.0 / j as f64));
            seen += 1;
            if seen == 2 {
                break;
            }
        }
        radius = tolerance.powf(1.0 / order as f64) / radius;
    }

    psa::set_mode(PsaMode::Fixed);

    let mut restart = 0;
    let mut resized = false;
    let mut ret;
    let mut end2;
    let mut deltat;
    let mut w;

    loop {
        if p.autostep {
            let end_point = (start + Interval::point(radius)).mid();
            if end_point >= end.lo() {
                end2 = *end;
                ret = OdeStatus::Complete;
            } else {
                end2 = Interval::point(end_point);
                ret = OdeStatus::Partial;
            }
        } else {
            end2 = *end;
            ret = OdeStatus::Complete;
        }
        deltat = end2 - start;
        psa::set_domain(Interval::new(0.0, deltat.hi()));

        let mut z = x.clone();
        let t = torg.setorder(order);
        w = picard(f, &x0, &z, &t, order);

        let mut newton: Vec<f64> = (0..n)
            .map(|i| (w[i].c[order] - z[i].c[order]).norm())
            .collect();
        make_candidate(&mut newton);
        for i in 0..n {
            z[i].c[order] += newton[i] * Interval::new(-1.0, 1.0);
        }

        if p.autostep && !resized {
            // One-shot feedback: compare observable growth at τ = h with
            // the target and rescale h once before committing.
            resized = true;
            let mut growth = 0.0f64;
            for (zi, x0i) in z.iter().zip(&x0) {
                growth = growth.max(zi.eval(deltat).rad() - x0i.rad());
            }
            let ratio = (growth / tolerance).clamp(RESIZE_MIN, RESIZE_MAX);
            radius /= ratio.powf(1.0 / order as f64);
            continue;
        }

        w = picard(f, &x0, &z, &t, order);
        let contracted = (0..n).all(|i| w[i].c[order].subset(&z[i].c[order]));
        if contracted {
            break;
        }
        if !p.autostep || restart >= p.restart_max {
            ret = OdeStatus::Fail;
            break;
        }
        radius *= 0.5;
        restart += 1;
    }

    if ret != OdeStatus::Fail {
        let t = torg.setorder(order);
        for _ in 0..p.iter_max {
            let z = w.clone();
            w = picard(f, &x0, &z, &t, order);
            for i in 0..n {
                w[i].c[order] = w[i].c[order].intersect(&z[i].c[order]);
            }
        }
        *init = w.iter().map(|wi| wi.eval(deltat)).collect();
        if ret == OdeStatus::Partial {
            *end = end2;
        }
        if let Some(out) = result_psa.as_deref_mut() {
            *out = w;
        }
    }

    drop(guard);
    ret
}

/// One application of the Picard operator on jets.
fn picard_ad<F: VectorField>(
    f: &F,
    x0: &[AutoDif<Interval>],
    z: &[Psa<AutoDif<Interval>>],
    t: &Psa<AutoDif<Interval>>,
    order: usize,
) -> Vec<Psa<AutoDif<Interval>>> {
    let y = f.eval(z, t);
    x0.iter()
        .zip(y)
        .map(|(c, yi)| Psa::constant(c.clone()) + yi.integrate().setorder(order))
        .collect()
}

/// One validated step transporting first variations: like [`ode`] but on
/// `AutoDif<Interval>` state, with interior containment required on the
/// value and on every gradient entry. The incoming gradient basis is
/// compressed to the state dimension for the duration of the step and
/// expanded back on return.
pub fn ode_autodif<F: VectorField>(
    f: &F,
    init: &mut Vec<AutoDif<Interval>>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    mut result_psa: Option<&mut Vec<Psa<AutoDif<Interval>>>>,
) -> OdeStatus {
    let n = init.len();
    let order = p.order.max(1);

    let (mut x0, save) = AutoDif::compress(init);
    for jet in &mut x0 {
        jet.resize_grad(n);
    }

    let mut tolerance = f64::EPSILON;
    for jet in &x0 {
        tolerance = tolerance
            .max(jet.v.norm() * f64::EPSILON)
            .max(jet.v.rad() * p.tol1);
        for g in &jet.d {
            tolerance = tolerance
                .max(g.norm() * f64::EPSILON)
                .max(g.rad() * p.tol1);
        }
    }

    let guard = CtxGuard::save();
    psa::set_mode(PsaMode::Grow);
    psa::set_use_history(false);
    psa::set_record_history(true);
    psa::history_clear();

    let torg: Psa<AutoDif<Interval>> = Psa::time(AutoDif::constant(start));
    let mut x: Vec<Psa<AutoDif<Interval>>> =
        x0.iter().map(|v| Psa::constant(v.clone())).collect();
    for j in 0..order {
        if j == 1 {
            psa::set_use_history(true);
        }
        psa::history_rewind();
        let t = torg.setorder(j);
        x = picard_ad(f, &x0, &x, &t, j + 1);
    }
    psa::set_use_history(false);
    psa::set_record_history(false);

    let mut radius = 0.0f64;
    if p.autostep {
        let mut seen = 0;
        for j in (1..=order).rev() {
            let mut mj = 0.0f64;
            for xi in &x {
                mj = mj.max(xi.c[j].v.mid().abs());
                for g in &xi.c[j].d {
                    mj = mj.max(g.mid().abs());
                }
            }
            if mj == 0.0 {
                continue;
            }
            radius = radius.max(mj.powf(1.0 / j as f64));
            seen += 1;
            if seen == 2 {
                break;
            }
        }
        radius = tolerance.powf(1.0 / order as f64) / radius;
    }

    psa::set_mode(PsaMode::Fixed);

    let band = Interval::new(-1.0, 1.0);
    let mut restart = 0;
    let mut resized = false;
    let mut ret;
    let mut end2;
    let mut deltat;
    let mut w;

    loop {
        if p.autostep {
            let end_point = (start + Interval::point(radius)).mid();
            if end_point >= end.lo() {
                end2 = *end;
                ret = OdeStatus::Complete;
            } else {
                end2 = Interval::point(end_point);
                ret = OdeStatus::Partial;
            }
        } else {
            end2 = *end;
            ret = OdeStatus::Complete;
        }
        deltat = end2 - start;
        psa::set_domain(Interval::new(0.0, deltat.hi()));

        let mut z = x.clone();
        let t = torg.setorder(order);
        w = picard_ad(f, &x0, &z, &t, order);

        // Newton-step magnitudes for value and gradient slots, flattened
        // in the same order the inflation below consumes them.
        let mut newton: Vec<f64> = Vec::with_capacity(n + n * n);
        for i in 0..n {
            let wmz = w[i].c[order].clone() - z[i].c[order].clone();
            newton.push(wmz.v.norm());
            for j in 0..n {
                newton.push(wmz.d.get(j).map_or(0.0, Interval::norm));
            }
        }
        make_candidate(&mut newton);
        let mut k = 0;
        for zi in z.iter_mut() {
            let top = &mut zi.c[order];
            top.v += newton[k] * band;
            k += 1;
            top.resize_grad(n);
            for j in 0..n {
                top.d[j] += newton[k] * band;
                k += 1;
            }
        }

        if p.autostep && !resized {
            resized = true;
            let mut growth = 0.0f64;
            for (zi, x0i) in z.iter().zip(&x0) {
                let at_h = zi.eval(AutoDif::constant(deltat));
                growth = growth.max(at_h.v.rad() - x0i.v.rad());
                for j in 0..n {
                    let g = at_h.d.get(j).copied().unwrap_or(Interval::ZERO);
                    growth = growth.max(g.rad() - x0i.d[j].rad());
                }
            }
            let ratio = (growth / tolerance).clamp(RESIZE_MIN, RESIZE_MAX);
            radius /= ratio.powf(1.0 / order as f64);
            continue;
        }

        w = picard_ad(f, &x0, &z, &t, order);
        let mut contracted = true;
        for i in 0..n {
            let wt = &mut w[i].c[order];
            wt.resize_grad(n);
            let zt = &z[i].c[order];
            contracted = contracted && wt.v.subset(&zt.v);
            for j in 0..n {
                contracted = contracted && wt.d[j].subset(&zt.d[j]);
            }
        }
        if contracted {
            break;
        }
        if !p.autostep || restart >= p.restart_max {
            ret = OdeStatus::Fail;
            break;
        }
        radius *= 0.5;
        restart += 1;
    }

    if ret != OdeStatus::Fail {
        let t = torg.setorder(order);
        for _ in 0..p.iter_max {
            let z = w.clone();
            w = picard_ad(f, &x0, &z, &t, order);
            for i in 0..n {
                let wt = &mut w[i].c[order];
                wt.resize_grad(n);
                let zt = &z[i].c[order];
                wt.v = wt.v.intersect(&zt.v);
                for j in 0..n {
                    wt.d[j] = wt.d[j].intersect(zt.d.get(j).unwrap_or(&Interval::ZERO));
                }
            }
        }

        // Back to the caller's gradient basis, then evaluate at τ = h.
        for wi in w.iter_mut() {
            for c in wi.c.iter_mut() {
                c.resize_grad(n);
                *c = AutoDif::expand(c, &save);
            }
        }
        let at_h = AutoDif::constant(deltat);
        *init = w.iter().map(|wi| wi.eval(at_h.clone())).collect();
        if ret == OdeStatus::Partial {
            *end = end2;
        }
        if let Some(out) = result_psa.as_deref_mut() {
            *out = w;
        }
    }

    drop(guard);
    ret
}
