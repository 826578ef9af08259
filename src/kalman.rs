//! Generic linear Kalman-filter primitives, shared by the attitude and
//! orientation filters (spec.md §4.2–§4.3). State dimension `N` and
//! observation dimension `M` are const generics so the same code serves the
//! 6-state/3-observation accel-or-mag correction and the 6-state/6-observation
//! gyro-only correction without duplicating the algebra per filter.

use crate::matrix::{Matrix, MatrixErrors};

/// `x' = F*x` — the state transition step (spec.md §4.2). The axis filters
/// use the closed-form `fastpredict` shortcut instead of this in the hot
/// path, but this is kept as the textbook primitive for anything that wants
/// the general transition (and is exercised directly in tests).
pub fn predict_state<const N: usize>(f: &Matrix<N, N>, x: &Matrix<N, 1>) -> Matrix<N, 1> {
    f.mul(x)
}

/// `P' = F*P*F^T + Q` — covariance time update.
pub fn predict_covariance<const N: usize>(
    f: &Matrix<N, N>,
    p: &Matrix<N, N>,
    q: &Matrix<N, N>,
) -> Matrix<N, N> {
    let fp = f.mul(p);
    let fpft = fp.mul_transpose(f);
    fpft.add(q)
}

/// Result of a Joseph-form measurement update: the corrected state and
/// covariance, plus whatever sticky error accumulated (notably
/// [`MatrixErrors::SINGULAR`] if `S` could not be inverted, in which case the
/// inputs are returned unchanged).
pub struct CorrectionResult<const N: usize> {
    pub state: Matrix<N, 1>,
    pub covariance: Matrix<N, N>,
    pub errors: MatrixErrors,
}

/// Joseph-form Kalman correction:
///
/// ```text
/// y = z - H*x
/// S = H*P*H^T + R
/// K = P*H^T*S^-1
/// x' = x + K*y
/// P' = (I - K*H)*P*(I - K*H)^T + K*R*K^T
/// ```
///
/// The Joseph form is used instead of the textbook `P' = (I-KH)P` because it
/// stays symmetric and positive semi-definite under fixed-point rounding
/// error, matching the numerical-stability rationale in spec.md §4.3.
pub fn correct_joseph<const N: usize, const M: usize>(
    x: &Matrix<N, 1>,
    p: &Matrix<N, N>,
    h: &Matrix<M, N>,
    z: &Matrix<M, 1>,
    r: &Matrix<M, M>,
) -> CorrectionResult<N> {
    let hx = h.mul(x);
    let y = z.sub(&hx);

    let hp = h.mul(p);
    let s = hp.mul_transpose(h).add(r);

    let s_inv = match s.inverse() {
        Some(inv) => inv,
        None => {
            let mut errors = p.errors;
            errors.merge(s.errors);
            errors.set(MatrixErrors::SINGULAR);
            return CorrectionResult {
                state: *x,
                covariance: *p,
                errors,
            };
        }
    };

    let pht = p.mul_transpose(h);
    let k = pht.mul(&s_inv);

    let x_new = x.add(&k.mul(&y));

    let identity = Matrix::<N, N>::identity();
    let ikh = identity.sub(&k.mul(h));
    let ikh_t = ikh.transpose();
    let p_new = ikh.mul(p).mul(&ikh_t).add(&k.mul(r).mul_transpose(&k));

    let mut errors = x_new.errors;
    errors.merge(p_new.errors);

    CorrectionResult {
        state: x_new,
        covariance: p_new,
        errors,
    }
}
