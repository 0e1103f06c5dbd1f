//! Dense matrix helpers for the long-integration drivers.
//!
//! Two flavours live here: plain `f64` matrices for the *approximate*
//! frames (Householder QR, Gauss-Jordan inverse) and interval matrices
//! for everything that must stay rigorous. The bridge between them is
//! [`enclose_inverse`]: an approximate inverse plus a residual-norm bound
//! gives a verified entrywise enclosure of the true inverse, which is
//! what lets a floating-point coordinate frame participate in a sound
//! containment argument.

use crate::interval::Interval;
use crate::rounding;

/// Dense `f64` matrix, row-major.
pub type Matrix = Vec<Vec<f64>>;
/// Dense interval matrix, row-major.
pub type IvMatrix = Vec<Vec<Interval>>;

/// Interval identity matrix.
pub fn iv_identity(n: usize) -> IvMatrix {
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| if i == j { Interval::ONE } else { Interval::ZERO })
                .collect()
        })
        .collect()
}

/// Interval matrix-vector product.
pub fn iv_mat_vec(m: &[Vec<Interval>], v: &[Interval]) -> Vec<Interval> {
    m.iter()
        .map(|row| {
            let mut acc = Interval::ZERO;
            for (a, x) in row.iter().zip(v) {
                acc += *a * *x;
            }
            acc
        })
        .collect()
}

/// Interval matrix-matrix product.
pub fn iv_mat_mat(a: &[Vec<Interval>], b: &[Vec<Interval>]) -> IvMatrix {
    let cols = b.first().map_or(0, Vec::len);
    a.iter()
        .map(|row| {
            (0..cols)
                .map(|j| {
                    let mut acc = Interval::ZERO;
                    for (k, x) in row.iter().enumerate() {
                        acc += *x * b[k][j];
                    }
                    acc
                })
                .collect()
        })
        .collect()
}

/// Midpoint matrix of an interval matrix.
pub fn mid_matrix(a: &[Vec<Interval>]) -> Matrix {
    a.iter()
        .map(|row| row.iter().map(Interval::mid).collect())
        .collect()
}

/// Lift a point matrix into intervals.
pub fn mat_to_iv(a: &[Vec<f64>]) -> IvMatrix {
    a.iter()
        .map(|row| row.iter().copied().map(Interval::point).collect())
        .collect()
}

/// Orthogonal factor of a Householder QR decomposition. The result is
/// orthogonal only up to floating-point error; callers that need rigor
/// run it through [`enclose_inverse`].
pub fn qr_q(a: &[Vec<f64>]) -> Matrix {
    let n = a.len();
    let mut r: Matrix = a.to_vec();
    let mut q: Matrix = (0..n)
        .map(|i| (0..n).map(|j| f64::from(u8::from(i == j))).collect())
        .collect();

    for k in 0..n {
        let mut norm2 = 0.0;
        for row in r.iter().skip(k) {
            norm2 += row[k] * row[k];
        }
        let norm = norm2.sqrt();
        if norm == 0.0 || !norm.is_finite() {
            continue;
        }
        let alpha = if r[k][k] >= 0.0 { -norm } else { norm };
        let mut v = vec![0.0; n];
        v[k] = r[k][k] - alpha;
        for i in (k + 1)..n {
            v[i] = r[i][k];
        }
        let vtv: f64 = v.iter().map(|x| x * x).sum();
        if vtv == 0.0 {
            continue;
        }
        // r := (I - 2vv^T/v^Tv) r,  q := q (I - 2vv^T/v^Tv)
        for j in 0..n {
            let dot: f64 = (k..n).map(|i| v[i] * r[i][j]).sum();
            let scale = 2.0 * dot / vtv;
            for i in k..n {
                r[i][j] -= scale * v[i];
            }
        }
        for qrow in q.iter_mut() {
            let dot: f64 = (k..n).map(|i| v[i] * qrow[i]).sum();
            let scale = 2.0 * dot / vtv;
            for i in k..n {
                qrow[i] -= scale * v[i];
            }
        }
    }
    q
}

/// Gauss-Jordan inverse with partial pivoting; `None` on (numerical)
/// singularity.
pub fn gauss_inverse(a: &[Vec<f64>]) -> Option<Matrix> {
    let n = a.len();
    let mut work: Matrix = a.to_vec();
    let mut inv: Matrix = (0..n)
        .map(|i| (0..n).map(|j| f64::from(u8::from(i == j))).collect())
        .collect();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| {
                work[i][col]
                    .abs()
                    .partial_cmp(&work[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
        let pivot = work[pivot_row][col];
        if pivot == 0.0 || !pivot.is_finite() {
            return None;
        }
        work.swap(col, pivot_row);
        inv.swap(col, pivot_row);
        let inv_pivot = 1.0 / pivot;
        for j in 0..n {
            work[col][j] *= inv_pivot;
            inv[col][j] *= inv_pivot;
        }
        for i in 0..n {
            if i == col {
                continue;
            }
            let factor = work[i][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[i][j] -= factor * work[col][j];
                inv[i][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

/// Upper bound on the ∞-norm of an interval matrix.
fn iv_inf_norm_up(m: &[Vec<Interval>]) -> f64 {
    let mut worst = 0.0f64;
    for row in m {
        let mut s = 0.0f64;
        for x in row {
            s = rounding::add_up(s, x.mag());
        }
        worst = worst.max(s);
    }
    worst
}

/// Verified entrywise enclosure of `a⁻¹`.
///
/// With `Ra` an approximate inverse and `E = I - Ra·a` (computed in
/// interval arithmetic), `‖E‖∞ < 1` gives
/// `‖a⁻¹ - Ra‖∞ ≤ ‖Ra‖∞ ‖E‖∞ / (1 - ‖E‖∞)`, and the ∞-norm dominates
/// every entry. Returns `None` when the residual test fails (matrix too
/// ill-conditioned for this frame).
pub fn enclose_inverse(a: &[Vec<f64>]) -> Option<IvMatrix> {
    let n = a.len();
    let ra = gauss_inverse(a)?;

    let mut e_norm = 0.0f64;
    for i in 0..n {
        let mut row_sum = 0.0f64;
        for j in 0..n {
            let mut e_ij = if i == j { Interval::ONE } else { Interval::ZERO };
            for k in 0..n {
                e_ij -= Interval::point(ra[i][k]) * Interval::point(a[k][j]);
            }
            row_sum = rounding::add_up(row_sum, e_ij.mag());
        }
        e_norm = e_norm.max(row_sum);
    }
    if e_norm >= 1.0 {
        return None;
    }

    let mut ra_norm = 0.0f64;
    for row in &ra {
        let mut s = 0.0f64;
        for x in row {
            s = rounding::add_up(s, x.abs());
        }
        ra_norm = ra_norm.max(s);
    }
    let beta = rounding::div_up(
        rounding::mul_up(ra_norm, e_norm),
        rounding::sub_down(1.0, e_norm),
    );
    let ball = Interval::new(-beta, beta);
    Some(
        ra.iter()
            .map(|row| row.iter().map(|&x| Interval::point(x) + ball).collect())
            .collect(),
    )
}

/// Upper bound on the width of the widest component.
pub fn iv_vec_max_width(v: &[Interval]) -> f64 {
    v.iter().map(Interval::width).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_produces_orthogonal_q() {
        let a = vec![
            vec![2.0, -1.0, 0.5],
            vec![1.0, 3.0, -2.0],
            vec![0.0, 1.0, 1.0],
        ];
        let q = qr_q(&a);
        for i in 0..3 {
            for j in 0..3 {
                let dot: f64 = (0..3).map(|k| q[k][i] * q[k][j]).sum();
                let expect = f64::from(u8::from(i == j));
                assert!((dot - expect).abs() < 1e-12, "q^T q [{i}][{j}] = {dot}");
            }
        }
    }

    #[test]
    fn gauss_inverse_small() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let inv = gauss_inverse(&a).expect("invertible");
        assert!((inv[0][0] - 0.6).abs() < 1e-14);
        assert!((inv[0][1] + 0.2).abs() < 1e-14);
        assert!((inv[1][0] + 0.2).abs() < 1e-14);
        assert!((inv[1][1] - 0.4).abs() < 1e-14);
        assert!(gauss_inverse(&vec![vec![1.0, 2.0], vec![2.0, 4.0]]).is_none());
    }

    #[test]
    fn enclosed_inverse_contains_exact() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let m = enclose_inverse(&a).expect("well-conditioned");
        assert!(m[0][0].contains(0.6));
        assert!(m[0][1].contains(-0.2));
        assert!(m[1][0].contains(-0.2));
        assert!(m[1][1].contains(0.4));
    }

    #[test]
    fn iv_products_contain_point_products() {
        let m = vec![
            vec![Interval::new(1.0, 2.0), Interval::point(0.0)],
            vec![Interval::point(-1.0), Interval::new(0.5, 1.5)],
        ];
        let v = vec![Interval::point(2.0), Interval::point(4.0)];
        let out = iv_mat_vec(&m, &v);
        // Pick the midpoint instantiation 1.5 x + 0 y etc.
        assert!(out[0].contains(3.0));
        assert!(out[1].contains(2.0));
    }
}
