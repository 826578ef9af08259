//! Shared 6-state axis filter: three states for a unit-length DCM row (the
//! "down" row for the attitude filter, the "east" row for the orientation
//! filter) and three states for the angular velocity estimate shared between
//! them. Grounded on `kf_attitude`/`kf_orientation` in
//! `original_source/sensor_fusion.c`, which are structurally identical
//! Kalman filters parameterised only by which physical axis they track — the
//! observation model against the gyroscope (`kfm_gyro`) is the exact same
//! instance reused against both in the original, which is why it lives here
//! rather than being duplicated per filter.

use crate::fixedmath::{self, Q16};
use crate::kalman::{correct_joseph, predict_covariance};
use crate::matrix::{Matrix, MatrixErrors};

/// A plain 3-vector of Q16.16 components.
pub type Vector3 = [Q16; 3];

pub const ZERO3: Vector3 = [Q16::ZERO, Q16::ZERO, Q16::ZERO];

fn vec_to_col(v: Vector3) -> Matrix<3, 1> {
    let mut m = Matrix::<3, 1>::zero();
    m.set(0, 0, v[0]);
    m.set(1, 0, v[1]);
    m.set(2, 0, v[2]);
    m
}

fn diag3(value: Q16) -> Matrix<3, 3> {
    let mut m = Matrix::<3, 3>::zero();
    m.set(0, 0, value);
    m.set(1, 1, value);
    m.set(2, 2, value);
    m
}

/// The 6-state vector, split in half: `[row_x, row_y, row_z, gyro_x, gyro_y,
/// gyro_z]`.
#[derive(Clone, Copy)]
pub struct AxisFilter {
    state: Matrix<6, 1>,
    covariance: Matrix<6, 6>,
    /// Set once the axis row has been bootstrapped from a real sample;
    /// before that the filter must not run a normal correction (spec.md
    /// §4.1 bootstrap rule).
    bootstrapped: bool,
}

impl AxisFilter {
    /// `initial_row` seeds the tracked row before bootstrap (spec.md §3
    /// lifecycle: `fusion_initialize` seeds the attitude row to `(0,0,1)`
    /// and the orientation row to `(0,1,0)`), so invariant I1 (unit-norm
    /// row) holds even before the first real sample arrives. The initial
    /// covariance diagonal is `5,5,5,1,1,1` — axis block looser than
    /// velocity block, matching spec.md §3.
    pub fn new(initial_row: Vector3) -> Self {
        let mut covariance = Matrix::<6, 6>::zero();
        for i in 0..3 {
            covariance.set(i, i, Q16::from_num(5));
        }
        for i in 3..6 {
            covariance.set(i, i, Q16::ONE);
        }
        let mut state = Matrix::<6, 1>::zero();
        state.set(0, 0, initial_row[0]);
        state.set(1, 0, initial_row[1]);
        state.set(2, 0, initial_row[2]);
        Self {
            state,
            covariance,
            bootstrapped: false,
        }
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub fn row(&self) -> Vector3 {
        [self.state.get(0, 0), self.state.get(1, 0), self.state.get(2, 0)]
    }

    pub fn angular_velocity(&self) -> Vector3 {
        [self.state.get(3, 0), self.state.get(4, 0), self.state.get(5, 0)]
    }

    /// One-shot initialisation of the tracked row from a raw sample,
    /// bypassing the Kalman correction entirely so the first, likely
    /// large innovation doesn't get filtered through a gain computed from
    /// an arbitrary prior (spec.md §4.1; `initialize_system_filter` in the
    /// original).
    pub fn bootstrap(&mut self, row: Vector3) {
        self.state.set(0, 0, row[0]);
        self.state.set(1, 0, row[1]);
        self.state.set(2, 0, row[2]);
        self.bootstrapped = true;
    }

    /// Closed-form axis-row integration under a small-angle rotation by
    /// `dt * angular_velocity`, equivalent to the original's
    /// `fusion_fastpredict_X` shortcut: rather than building and
    /// multiplying a full 6x6 state-transition matrix, the row is rotated
    /// directly via its cross product with the angular velocity.
    pub fn fast_predict(&mut self, dt: Q16) {
        let row = self.row();
        let w = self.angular_velocity();

        // delta = dt * (w x row)
        let cross = [
            w[1] * row[2] - w[2] * row[1],
            w[2] * row[0] - w[0] * row[2],
            w[0] * row[1] - w[1] * row[0],
        ];
        let new_row = [
            row[0] + dt * cross[0],
            row[1] + dt * cross[1],
            row[2] + dt * cross[2],
        ];
        self.state.set(0, 0, new_row[0]);
        self.state.set(1, 0, new_row[1]);
        self.state.set(2, 0, new_row[2]);
    }

    /// Builds the linearised state-transition matrix `F` — upper-left 3x3
    /// identity, upper-right 3x3 the skew-symmetric matrix of the *axis
    /// row* `c` scaled by `dt` (`update_state_matrix_from_state` in the
    /// original; note it is `[c]x`, not `[w]x` — `c` is held fixed as the
    /// matrix coefficient while `w` is the state component it multiplies)
    /// — and applies the covariance time update `P' = F*P*F^T + Q`.
    ///
    /// `row` must be the axis row as it stood *before* [`Self::fast_predict`]
    /// advanced it this tick, since `F` and the mean prediction both act on
    /// the same pre-step state.
    pub fn predict_covariance(&mut self, dt: Q16, q_axis: Q16, q_gyro: Q16, row: Vector3) {
        let mut f = Matrix::<6, 6>::identity();

        f.set(0, 4, dt * row[2]);
        f.set(0, 5, -dt * row[1]);
        f.set(1, 3, -dt * row[2]);
        f.set(1, 5, dt * row[0]);
        f.set(2, 3, dt * row[1]);
        f.set(2, 4, -dt * row[0]);

        let mut q = Matrix::<6, 6>::zero();
        for i in 0..3 {
            q.set(i, i, q_axis);
            q.set(i + 3, i + 3, q_gyro);
        }

        self.covariance = predict_covariance(&f, &self.covariance, &q);
    }

    /// One full time-update tick: mean via [`Self::fast_predict`],
    /// covariance via [`Self::predict_covariance`] (using the row as it
    /// stood before the mean step), then [`Self::sanitize`]. This is the
    /// entry point the attitude/orientation filters drive each tick.
    pub fn predict(&mut self, dt: Q16, q_axis: Q16, q_gyro: Q16) {
        let row = self.row();
        self.fast_predict(dt);
        self.predict_covariance(dt, q_axis, q_gyro, row);
        self.sanitize();
    }

    /// Correct the tracked row directly against a 3-axis observation (the
    /// accelerometer correcting the down row, or a TRIAD-projected east
    /// vector correcting the orientation row). `kfm_accel`/`kfm_magneto`
    /// in the original: `H` selects the first three states unmodified.
    pub fn correct_row(&mut self, z: Vector3, r_axis: Q16) -> MatrixErrors {
        let mut h = Matrix::<3, 6>::zero();
        h.set(0, 0, Q16::ONE);
        h.set(1, 1, Q16::ONE);
        h.set(2, 2, Q16::ONE);
        let r = diag3(r_axis);
        let result = correct_joseph(&self.state, &self.covariance, &h, &vec_to_col(z), &r);
        self.state = result.state;
        self.covariance = result.covariance;
        result.errors
    }

    /// Correct the angular velocity states against a raw gyroscope sample
    /// (`kfm_gyro`, reused unmodified against both filters in the
    /// original).
    pub fn correct_gyro(&mut self, z: Vector3, r_gyro: Q16) -> MatrixErrors {
        let mut h = Matrix::<3, 6>::zero();
        h.set(0, 3, Q16::ONE);
        h.set(1, 4, Q16::ONE);
        h.set(2, 5, Q16::ONE);
        let r = diag3(r_gyro);
        let result = correct_joseph(&self.state, &self.covariance, &h, &vec_to_col(z), &r);
        self.state = result.state;
        self.covariance = result.covariance;
        result.errors
    }

    /// Renormalise the tracked row back to unit length after prediction or
    /// correction has (inevitably, under fixed-point rounding) let its norm
    /// drift (`fusion_sanitize_state` in the original).
    pub fn sanitize(&mut self) {
        let row = self.row();
        let norm = fixedmath::norm3(row[0], row[1], row[2]);
        if norm == Q16::ZERO {
            return;
        }
        let inv = Q16::ONE / norm;
        self.state.set(0, 0, row[0] * inv);
        self.state.set(1, 0, row[1] * inv);
        self.state.set(2, 0, row[2] * inv);
    }
}
