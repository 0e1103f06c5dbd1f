#![allow(
    clippy::unwrap_used,
    reason = "soundness tests assert directly on enclosure containment"
)]

//! Ground-truth soundness of the validated integrators: whatever a
//! non-validated RK4 reference computes from a point inside the initial
//! box must land inside the returned enclosure, across drivers and
//! wrapping-control strategies.

use crate::autodif::AutoDif;
use crate::interval::Interval;
use crate::linalg::iv_vec_max_width;
use crate::ode::{
    CallbackFn, NoCallback, OdeParam, OdeStatus, ode, odelong, odelong_autodif,
    odelong_maffine_interval, odelong_qr, odelong_qr_lohner,
};
use crate::psa::Psa;
use crate::tests::problems::{Harmonic, Logistic, Lorenz, LotkaVolterra, VanDerPol, rk4};

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

fn points(v: &[f64]) -> Vec<Interval> {
    v.iter().copied().map(Interval::point).collect()
}

#[test]
fn harmonic_oscillator_full_turn() {
    let mut x = points(&[1.0, 0.0]);
    let mut end = Interval::point(TWO_PI);
    let r = odelong(
        &Harmonic,
        &mut x,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default(),
        &mut NoCallback,
    );
    assert_eq!(r, OdeStatus::Complete);
    // Solution (cos t, -sin t) evaluated at the float 2π.
    assert!(x[0].widened(2).contains(TWO_PI.cos()));
    assert!(x[1].widened(2).contains(-TWO_PI.sin()));
    assert!(x[0].contains(1.0));
    assert!(x[1].contains(0.0));
    assert!(x[0].rad() <= 1e-12, "radius {}", x[0].rad());
    assert!(x[1].rad() <= 1e-12, "radius {}", x[1].rad());
}

#[test]
fn harmonic_qr_variants_complete_and_contain() {
    for lohner in [false, true] {
        let mut x = points(&[1.0, 0.0]);
        let mut end = Interval::point(TWO_PI);
        let p = OdeParam::default().with_order(16);
        let r = if lohner {
            odelong_qr_lohner(
                &Harmonic,
                &mut x,
                Interval::point(0.0),
                &mut end,
                &p,
                &mut NoCallback,
            )
        } else {
            odelong_qr(
                &Harmonic,
                &mut x,
                Interval::point(0.0),
                &mut end,
                &p,
                &mut NoCallback,
            )
        };
        assert_eq!(r, OdeStatus::Complete, "lohner = {lohner}");
        assert!(x[0].contains(1.0) && x[1].contains(0.0));
        assert!(x[0].rad() < 1e-10 && x[1].rad() < 1e-10);
    }
}

#[test]
fn logistic_encloses_rk4_reference() {
    let mut x = points(&[0.5]);
    let mut end = Interval::point(1.0);
    let r = odelong(
        &Logistic,
        &mut x,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default().with_order(14),
        &mut NoCallback,
    );
    assert_eq!(r, OdeStatus::Complete);
    let reference = rk4(&Logistic, vec![0.5], 0.0, 1.0, 20_000);
    assert!(
        x[0].widened(4).contains(reference[0]),
        "{} misses reference {}",
        x[0],
        reference[0]
    );
    // Analytic check: y(1) = 1 / (1 + e^{-1}).
    let analytic = 1.0 / (1.0 + (-1.0f64).exp());
    assert!(x[0].widened(4).contains(analytic));
}

#[test]
fn lotka_volterra_encloses_rk4_reference() {
    let mut x = points(&[2.0, 1.0]);
    let mut end = Interval::point(2.0);
    let r = odelong(
        &LotkaVolterra,
        &mut x,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default().with_order(14),
        &mut NoCallback,
    );
    assert_eq!(r, OdeStatus::Complete);
    let reference = rk4(&LotkaVolterra, vec![2.0, 1.0], 0.0, 2.0, 40_000);
    for (enc, &point) in x.iter().zip(&reference) {
        assert!(enc.widened(4).contains(point), "{enc} misses {point}");
    }
}

#[test]
fn lorenz_qr_driver_stays_tight() {
    let mut x = points(&[15.0, 15.0, 36.0]);
    let mut end = Interval::point(1.0);
    let r = odelong_qr(
        &Lorenz,
        &mut x,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default().with_order(12),
        &mut NoCallback,
    );
    assert_eq!(r, OdeStatus::Complete);
    assert!(
        iv_vec_max_width(&x) <= 1e-3,
        "width {} too wide",
        iv_vec_max_width(&x)
    );
    let reference = rk4(&Lorenz, vec![15.0, 15.0, 36.0], 0.0, 1.0, 200_000);
    for (enc, &point) in x.iter().zip(&reference) {
        // The RK4 reference carries its own (tiny) global error.
        assert!(
            enc.widened(64).contains(point) || (enc.mid() - point).abs() < 1e-7,
            "{enc} misses {point}"
        );
    }
}

#[test]
fn lorenz_maffine_driver_completes() {
    let mut x = points(&[15.0, 15.0, 36.0]);
    let mut end = Interval::point(1.0);
    let r = odelong_maffine_interval(
        &Lorenz,
        &mut x,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default().with_order(12),
        &mut NoCallback,
    );
    assert_eq!(r, OdeStatus::Complete);
    let reference = rk4(&Lorenz, vec![15.0, 15.0, 36.0], 0.0, 1.0, 200_000);
    for (enc, &point) in x.iter().zip(&reference) {
        assert!(
            enc.widened(64).contains(point) || (enc.mid() - point).abs() < 1e-7,
            "{enc} misses {point}"
        );
    }
}

#[test]
fn maffine_with_epsilon_reduce_stays_sound() {
    let mut x = vec![
        Interval::new(0.995, 1.005),
        Interval::new(-0.005, 0.005),
    ];
    let mut end = Interval::point(4.0);
    let r = odelong_maffine_interval(
        &Harmonic,
        &mut x,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default().with_order(14).with_ep_reduce(12, 20),
        &mut NoCallback,
    );
    assert_eq!(r, OdeStatus::Complete);
    let reference = rk4(&Harmonic, vec![1.0, 0.0], 0.0, 4.0, 20_000);
    for (enc, &point) in x.iter().zip(&reference) {
        assert!(enc.contains(point), "{enc} misses {point}");
    }
}

#[test]
fn higher_order_never_loosens() {
    let run = |order: usize| {
        let mut x = points(&[0.5]);
        let mut end = Interval::point(1.0);
        let r = odelong(
            &Logistic,
            &mut x,
            Interval::point(0.0),
            &mut end,
            &OdeParam::default().with_order(order),
            &mut NoCallback,
        );
        assert_eq!(r, OdeStatus::Complete);
        x[0]
    };
    let low = run(8);
    let high = run(16);
    let analytic = 1.0 / (1.0 + (-1.0f64).exp());
    assert!(low.widened(4).contains(analytic));
    assert!(high.widened(4).contains(analytic));
    assert!(
        high.width() <= low.width(),
        "order 16 width {} vs order 8 width {}",
        high.width(),
        low.width()
    );
}

#[test]
fn more_refinement_iterations_never_loosen() {
    let run = |iter_max: usize| {
        let mut x = points(&[2.0, 1.0]);
        let mut end = Interval::point(1.0);
        let r = odelong(
            &LotkaVolterra,
            &mut x,
            Interval::point(0.0),
            &mut end,
            &OdeParam::default().with_order(12).with_iter_max(iter_max),
            &mut NoCallback,
        );
        assert_eq!(r, OdeStatus::Complete);
        x
    };
    let loose = run(1);
    let tight = run(4);
    let wl = iv_vec_max_width(&loose);
    let wt = iv_vec_max_width(&tight);
    assert!(wt <= wl * (1.0 + 1e-9) + 1e-18, "{wt} vs {wl}");
}

#[test]
fn van_der_pol_stiff_stalls_with_sound_progress() {
    let f = VanDerPol { mu: 10_000.0 };
    let p = OdeParam::default().with_order(6);
    let mut x = points(&[1.0, 1.0]);
    let mut t = Interval::point(0.0);
    let mut reached_end = false;
    for _ in 0..300 {
        let mut t1 = Interval::point(1.0e6);
        match ode(&f, &mut x, t, &mut t1, &p, None) {
            OdeStatus::Fail => break,
            OdeStatus::Partial => t = t1,
            OdeStatus::Complete => {
                reached_end = true;
                break;
            }
        }
    }
    // The stiff problem must stall far from any finite horizon...
    assert!(!reached_end);
    let progress = t.mid();
    assert!(progress < 1.0, "got to t = {progress}");
    // ...while every committed enclosure stays sound.
    if progress > 0.0 {
        let reference = rk4(&f, vec![1.0, 1.0], 0.0, progress, 50_000);
        for (enc, &point) in x.iter().zip(&reference) {
            assert!(enc.widened(4).contains(point), "{enc} misses {point}");
        }
    }
}

#[test]
fn autodif_transports_the_variational_matrix() {
    let t_end = std::f64::consts::FRAC_PI_2;
    let mut jets = AutoDif::init(&points(&[1.0, 0.0]));
    let mut end = Interval::point(t_end);
    let r = odelong_autodif(
        &Harmonic,
        &mut jets,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default().with_order(14),
        &mut NoCallback,
    );
    assert_eq!(r, OdeStatus::Complete);
    // Transition matrix of the rotation: [[cos t, sin t], [-sin t, cos t]].
    let (c, s) = (t_end.cos(), t_end.sin());
    assert!(jets[0].v.widened(2).contains(c));
    assert!(jets[1].v.widened(2).contains(-s));
    assert!(jets[0].d[0].widened(2).contains(c));
    assert!(jets[0].d[1].widened(2).contains(s));
    assert!(jets[1].d[0].widened(2).contains(-s));
    assert!(jets[1].d[1].widened(2).contains(c));
}

#[test]
fn callback_sees_every_committed_step() {
    let mut spans: Vec<(f64, f64)> = Vec::new();
    let mut cb = CallbackFn(
        |s: Interval,
         e: Interval,
         xs: &[Interval],
         xe: &[Interval],
         sol: &[Psa<Interval>]| {
            assert_eq!(xs.len(), 1);
            assert_eq!(xe.len(), 1);
            assert_eq!(sol.len(), 1);
            // The solution polynomial starts at the step's entry state.
            assert!(sol[0].eval(Interval::ZERO).overlap(&xs[0]));
            spans.push((s.mid(), e.mid()));
        },
    );
    let mut x = points(&[0.5]);
    let mut end = Interval::point(1.0);
    let r = odelong(
        &Logistic,
        &mut x,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default().with_order(10),
        &mut cb,
    );
    assert_eq!(r, OdeStatus::Complete);
    assert!(!spans.is_empty());
    assert_eq!(spans[0].0, 0.0);
    assert_eq!(spans[spans.len() - 1].1, 1.0);
    for pair in spans.windows(2) {
        assert_eq!(pair[0].1, pair[1].0, "steps must chain");
    }
}

#[test]
fn wide_initial_box_keeps_every_member_trajectory() {
    // Every point of the initial box must stay inside the tube.
    let mut x = vec![Interval::new(0.45, 0.55)];
    let mut end = Interval::point(1.0);
    let r = odelong(
        &Logistic,
        &mut x,
        Interval::point(0.0),
        &mut end,
        &OdeParam::default().with_order(12),
        &mut NoCallback,
    );
    assert_eq!(r, OdeStatus::Complete);
    for y0 in [0.45, 0.475, 0.5, 0.525, 0.55] {
        let reference = rk4(&Logistic, vec![y0], 0.0, 1.0, 10_000);
        assert!(
            x[0].widened(4).contains(reference[0]),
            "{} misses member {}",
            x[0],
            reference[0]
        );
    }
}
