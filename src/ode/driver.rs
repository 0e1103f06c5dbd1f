//! Long-time integration drivers.
//!
//! Every driver is the same state machine around the one-step integrator:
//! ask for the full remaining range, accept whatever sub-range the step
//! verified, commit, invoke the callback, repeat; surface the weakest
//! status encountered and keep partial progress on failure.
//!
//! They differ in how uncertainty is carried between steps:
//! - [`odelong`]/[`odelong_autodif`] propagate the raw box (cheap,
//!   wrapping-prone);
//! - [`odelong_maffine`] keeps an affine representation and rebuilds it
//!   each step from the mean-value form `fc(h) + J·(X - c)`, re-running
//!   the center at escalating order when the deviation-free sub-problem
//!   is stubborn;
//! - [`odelong_qr`]/[`odelong_qr_lohner`] keep `X = c + Q·r` with a
//!   QR-orthogonalised (resp. inverse-midpoint) transition frame, the
//!   classic Lohner defence against rotation-induced wrapping.

use crate::affine::{self, Affine, epsilon_reduce};
use crate::autodif::AutoDif;
use crate::interval::Interval;
use crate::linalg::{IvMatrix, Matrix, enclose_inverse, iv_identity, iv_mat_mat, iv_mat_vec, mat_to_iv, mid_matrix, qr_q};
use crate::ode::step::{ode, ode_autodif};
use crate::ode::{OdeParam, OdeStatus, StepCallback, VectorField};
use crate::psa::Psa;

/// Bound on the center-step order escalation: a truly singular field must
/// fail instead of looping.
const MAX_ORDER_ESCALATION: usize = 8;

fn print_step(t1: Interval, x: &[Interval]) {
    eprintln!("t: {t1}");
    for xi in x {
        eprintln!("{xi}");
    }
}

/// Long integration of an interval box.
pub fn odelong<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<Interval>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
) -> OdeStatus {
    let mut x = init.clone();
    let mut t = start;
    let mut ret = OdeStatus::Fail;
    loop {
        let mut t1 = *end;
        let x_before = x.clone();
        let mut solution: Vec<Psa<Interval>> = Vec::new();
        let r = ode(f, &mut x, t, &mut t1, p, Some(&mut solution));
        if r == OdeStatus::Fail {
            if ret == OdeStatus::Partial {
                *init = x;
                *end = t;
                return OdeStatus::Partial;
            }
            return OdeStatus::Fail;
        }
        ret = OdeStatus::Partial;
        cb.on_step(t, t1, &x_before, &x, &solution);
        if p.verbose {
            print_step(t1, &x);
        }
        if r == OdeStatus::Complete {
            *init = x;
            return OdeStatus::Complete;
        }
        t = t1;
    }
}

/// Long integration of jets: the final gradient is the transition matrix
/// of the whole range with respect to the initial basis.
pub fn odelong_autodif<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<AutoDif<Interval>>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
) -> OdeStatus {
    let mut x = init.clone();
    let mut t = start;
    let mut ret = OdeStatus::Fail;
    loop {
        let mut t1 = *end;
        let x_before: Vec<Interval> = x.iter().map(|j| j.v).collect();
        let mut solution: Vec<Psa<AutoDif<Interval>>> = Vec::new();
        let r = ode_autodif(f, &mut x, t, &mut t1, p, Some(&mut solution));
        if r == OdeStatus::Fail {
            if ret == OdeStatus::Partial {
                *init = x;
                *end = t;
                return OdeStatus::Partial;
            }
            return OdeStatus::Fail;
        }
        ret = OdeStatus::Partial;
        let x_after: Vec<Interval> = x.iter().map(|j| j.v).collect();
        let value_psa: Vec<Psa<Interval>> = solution.iter().map(Psa::value_part).collect();
        cb.on_step(t, t1, &x_before, &x_after, &value_psa);
        if p.verbose {
            print_step(t1, &x_after);
        }
        if r == OdeStatus::Complete {
            *init = x;
            return OdeStatus::Complete;
        }
        t = t1;
    }
}

/// Center trajectory over exactly `[start, end2]`, escalating the Taylor
/// order when the fixed-width step refuses to verify. The deviation-free
/// problem must succeed whenever the inflated one did, so a bounded
/// escalation suffices; past the bound the caller gives up.
fn integrate_center<F: VectorField>(
    f: &F,
    fc: &mut Vec<Interval>,
    start: Interval,
    end2: Interval,
    p: &OdeParam,
) -> bool {
    let mut order2 = p.order;
    loop {
        let mut attempt = fc.clone();
        let mut end_c = end2;
        let pc = p.clone().with_order(order2).with_autostep(false);
        if ode(f, &mut attempt, start, &mut end_c, &pc, None) != OdeStatus::Fail {
            *fc = attempt;
            return true;
        }
        order2 += 1;
        if order2 > p.order + MAX_ORDER_ESCALATION {
            return false;
        }
        if p.verbose {
            eprintln!("increase order: {order2}");
        }
    }
}

/// One mean-value/affine step: run the jet integrator on the hull, the
/// plain integrator on the center, and rebuild the affine state as
/// `fc(h) + J·(X - c)`. Noise symbols allocated inside the step are
/// recycled through split/append (or capped by `epsilon_reduce` when the
/// parameters ask for it).
pub fn ode_maffine<F: VectorField>(
    f: &F,
    init: &mut Vec<Affine>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    mut mat: Option<&mut IvMatrix>,
    mut result_psa: Option<&mut Vec<Psa<Interval>>>,
) -> OdeStatus {
    let n = init.len();
    let hull: Vec<Interval> = init.iter().map(Affine::to_interval).collect();
    let c: Vec<f64> = hull.iter().map(Interval::mid).collect();

    let mut end2 = *end;
    let mut iad = AutoDif::init(&hull);
    let mut psa_tmp: Vec<Psa<AutoDif<Interval>>> = Vec::new();
    let want_psa = result_psa.is_some();
    let r = ode_autodif(
        f,
        &mut iad,
        start,
        &mut end2,
        p,
        if want_psa { Some(&mut psa_tmp) } else { None },
    );
    if r == OdeStatus::Fail {
        return OdeStatus::Fail;
    }
    if let Some(out) = result_psa.as_deref_mut() {
        *out = psa_tmp.iter().map(Psa::value_part).collect();
    }

    let mut fc: Vec<Interval> = c.iter().map(|&v| Interval::point(v)).collect();
    if !integrate_center(f, &mut fc, start, end2, p) {
        return OdeStatus::Fail;
    }

    let (_, jac) = AutoDif::split(&iad);

    let maxnum_save = if p.ep_reduce == 0 {
        Some(affine::maxnum())
    } else {
        None
    };

    // Mean-value reconstruction: fc + J (X - c).
    let dev: Vec<Affine> = init
        .iter()
        .zip(&c)
        .map(|(a, &ci)| a.clone() + (-ci))
        .collect();
    let mut result: Vec<Affine> = Vec::with_capacity(n);
    for i in 0..n {
        let mut acc = Affine::constant(0.0) + fc[i];
        for j in 0..n {
            acc = acc + jac[i][j] * dev[j].clone();
        }
        result.push(acc);
    }

    if let Some(msave) = maxnum_save {
        // Fold everything allocated inside this step into one fresh
        // symbol per component, then rewind the counter.
        let parts: Vec<(Affine, Interval)> = result
            .iter()
            .map(|a| {
                let (s1, s2) = a.split(msave);
                (s1, s2.to_interval())
            })
            .collect();
        affine::set_maxnum(msave);
        result = parts
            .into_iter()
            .map(|(s1, rest)| s1.append(rest))
            .collect();
    } else {
        epsilon_reduce(&mut result, p.ep_reduce, p.ep_reduce_limit);
    }

    *init = result;
    if r == OdeStatus::Partial {
        *end = end2;
    }
    if let Some(m) = mat.as_deref_mut() {
        *m = jac;
    }
    r
}

fn odelong_maffine_impl<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<Affine>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
    mut mat: Option<&mut IvMatrix>,
) -> OdeStatus {
    let s = init.len();
    let mut x = init.clone();
    let mut t = start;
    let mut ret = OdeStatus::Fail;
    let mut m_total = mat.as_ref().map(|_| iv_identity(s));

    loop {
        let mut t1 = *end;
        let mut m_step: IvMatrix = Vec::new();
        let mut solution: Vec<Psa<Interval>> = Vec::new();
        let x_before: Vec<Interval> = x.iter().map(Affine::to_interval).collect();
        let r = ode_maffine(
            f,
            &mut x,
            t,
            &mut t1,
            p,
            Some(&mut m_step),
            Some(&mut solution),
        );
        if r == OdeStatus::Fail {
            if ret == OdeStatus::Partial {
                *init = x;
                *end = t;
                if let (Some(m), Some(acc)) = (mat.as_deref_mut(), m_total.as_ref()) {
                    *m = acc.clone();
                }
                return OdeStatus::Partial;
            }
            return OdeStatus::Fail;
        }
        ret = OdeStatus::Partial;
        if let Some(acc) = m_total.as_mut() {
            *acc = iv_mat_mat(&m_step, acc);
        }
        let x_after: Vec<Interval> = x.iter().map(Affine::to_interval).collect();
        cb.on_step(t, t1, &x_before, &x_after, &solution);
        if p.verbose {
            print_step(t1, &x_after);
        }
        if r == OdeStatus::Complete {
            *init = x;
            if let (Some(m), Some(acc)) = (mat.as_deref_mut(), m_total.as_ref()) {
                *m = acc.clone();
            }
            return OdeStatus::Complete;
        }
        t = t1;
    }
}

/// Long mean-value/affine integration of an affine state vector.
pub fn odelong_maffine<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<Affine>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
) -> OdeStatus {
    odelong_maffine_impl(f, init, start, end, p, cb, None)
}

/// [`odelong_maffine`] on an interval box: the affine layer (and its
/// symbol counter) is local to the call.
pub fn odelong_maffine_interval<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<Interval>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
) -> OdeStatus {
    let save = affine::set_maxnum(0);
    let mut x: Vec<Affine> = init.iter().map(|&iv| Affine::from(iv)).collect();
    let mut end2 = *end;
    let r = odelong_maffine_impl(f, &mut x, start, &mut end2, p, cb, None);
    affine::set_maxnum(save);
    if r == OdeStatus::Fail {
        return r;
    }
    *init = x.iter().map(Affine::to_interval).collect();
    if r == OdeStatus::Partial {
        *end = end2;
    }
    r
}

/// [`odelong_maffine`] on jets: values travel through the affine layer,
/// the gradient picks up the composed step transition matrices.
pub fn odelong_maffine_autodif<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<AutoDif<Interval>>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
) -> OdeStatus {
    let (xi, m0) = AutoDif::split(init);
    let save = affine::set_maxnum(0);
    let mut x: Vec<Affine> = xi.iter().map(|&v| Affine::from(v)).collect();
    let mut end2 = *end;
    let mut m_tmp: IvMatrix = Vec::new();
    let r = odelong_maffine_impl(f, &mut x, start, &mut end2, p, cb, Some(&mut m_tmp));
    affine::set_maxnum(save);
    if r == OdeStatus::Fail {
        return r;
    }
    let m = iv_mat_mat(&m_tmp, &m0);
    for (i, jet) in init.iter_mut().enumerate() {
        jet.v = x[i].to_interval();
        jet.d = m[i].clone();
    }
    if r == OdeStatus::Partial {
        *end = end2;
    }
    r
}

/// Choice of local coordinate frame for the QR-family drivers.
#[derive(Clone, Copy, PartialEq, Eq)]
enum QrFrame {
    /// Orthogonal factor of the transition matrix (ode-qr).
    Householder,
    /// Lohner's inverse-midpoint frame (ode-qr-lohner).
    InverseMidpoint,
}

fn odelong_qr_impl<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<Interval>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
    frame: QrFrame,
) -> OdeStatus {
    let n = init.len();
    let mut t = start;
    let mut ret = OdeStatus::Fail;

    // Invariant: the reachable set at time t is contained both in
    // `x_hull` and in `c + Q·r` with r a symmetric-ish interval box.
    let mut c: Vec<f64> = init.iter().map(Interval::mid).collect();
    let mut q: Matrix = (0..n)
        .map(|i| (0..n).map(|j| f64::from(u8::from(i == j))).collect())
        .collect();
    let mut rbox: Vec<Interval> = init
        .iter()
        .zip(&c)
        .map(|(x, &ci)| *x - Interval::point(ci))
        .collect();
    let mut x_hull: Vec<Interval> = init.clone();

    loop {
        let mut t1 = *end;
        let mut iad = AutoDif::init(&x_hull);
        let mut solution_ad: Vec<Psa<AutoDif<Interval>>> = Vec::new();
        let r = ode_autodif(f, &mut iad, t, &mut t1, p, Some(&mut solution_ad));

        let mut fc: Vec<Interval> = c.iter().map(|&v| Interval::point(v)).collect();
        let step_ok = r != OdeStatus::Fail && integrate_center(f, &mut fc, t, t1, p);
        if !step_ok {
            if ret == OdeStatus::Partial {
                *init = x_hull;
                *end = t;
                return OdeStatus::Partial;
            }
            return OdeStatus::Fail;
        }

        let (direct, jac) = AutoDif::split(&iad);

        // Mean-value form: X(t1) ∈ fc + (J·Q)·r.
        let b = iv_mat_mat(&jac, &mat_to_iv(&q));
        let c_new: Vec<f64> = fc.iter().map(Interval::mid).collect();
        let z: Vec<Interval> = fc
            .iter()
            .zip(&c_new)
            .map(|(x, &ci)| *x - Interval::point(ci))
            .collect();

        // Refactor the frame and push the box through its verified
        // inverse; a degenerate frame falls back to axis alignment.
        let mid_b = mid_matrix(&b);
        let frame_mat = match frame {
            QrFrame::Householder => qr_q(&mid_b),
            QrFrame::InverseMidpoint => mid_b,
        };
        let (frame_mat, frame_inv) = match enclose_inverse(&frame_mat) {
            Some(inv) => (frame_mat, inv),
            None => {
                let id: Matrix = (0..n)
                    .map(|i| (0..n).map(|j| f64::from(u8::from(i == j))).collect())
                    .collect();
                (id, iv_identity(n))
            }
        };

        let br = iv_mat_vec(&b, &rbox);
        let v: Vec<Interval> = br.iter().zip(&z).map(|(a, b)| *a + *b).collect();
        let r_new = iv_mat_vec(&frame_inv, &v);

        let qr_vec = iv_mat_vec(&mat_to_iv(&frame_mat), &r_new);
        let hull_new: Vec<Interval> = (0..n)
            .map(|i| {
                let framed = Interval::point(c_new[i]) + qr_vec[i];
                let tight = framed.intersect(&direct[i]);
                if tight.is_empty() { direct[i] } else { tight }
            })
            .collect();

        ret = OdeStatus::Partial;
        let solution: Vec<Psa<Interval>> = solution_ad.iter().map(Psa::value_part).collect();
        cb.on_step(t, t1, &x_hull, &hull_new, &solution);
        if p.verbose {
            print_step(t1, &hull_new);
        }

        c = c_new;
        q = frame_mat;
        rbox = r_new;
        x_hull = hull_new;

        if r == OdeStatus::Complete {
            *init = x_hull;
            return OdeStatus::Complete;
        }
        t = t1;
    }
}

/// Long integration with the QR-orthogonalised transition frame.
pub fn odelong_qr<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<Interval>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
) -> OdeStatus {
    odelong_qr_impl(f, init, start, end, p, cb, QrFrame::Householder)
}

/// Long integration with Lohner's inverse-midpoint frame.
pub fn odelong_qr_lohner<F: VectorField, C: StepCallback>(
    f: &F,
    init: &mut Vec<Interval>,
    start: Interval,
    end: &mut Interval,
    p: &OdeParam,
    cb: &mut C,
) -> OdeStatus {
    odelong_qr_impl(f, init, start, end, p, cb, QrFrame::InverseMidpoint)
}
