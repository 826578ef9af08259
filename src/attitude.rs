//! Attitude filter: tracks the body-frame "down" DCM row plus angular
//! velocity. Grounded on `kf_attitude` + `kfm_accel`/`kfm_gyro` and
//! `fusion_update_attitude`/`fusion_update_attitude_gyro` in
//! `original_source/sensor_fusion.c`.

use crate::axis::{AxisFilter, Vector3, ZERO3};
use crate::fixedmath::{self, Q16};
use crate::fusion::{FusionPolicy, RowNoise};
use crate::matrix::MatrixErrors;

/// Which correction path an [`AttitudeFilter::update`] call actually took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttitudeBranch {
    /// First valid accelerometer sample latched the down row directly;
    /// no correction ran this cycle.
    Bootstrap,
    /// Corrected against the gyroscope only — either because no
    /// accelerometer sample was available, [`FusionPolicy::GyroOnly`] is in
    /// effect, or the accelerometer reading was judged disturbed.
    GyroOnly,
    /// Corrected against both the accelerometer and the gyroscope.
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttitudeUpdateReport {
    pub branch: AttitudeBranch,
    pub errors: MatrixErrors,
    /// Set when the accelerometer norm deviated from 1g by at least the
    /// disturbance threshold, regardless of which branch that drove.
    pub disturbed: bool,
}

pub struct AttitudeFilter {
    axis: AxisFilter,
}

impl AttitudeFilter {
    pub fn new() -> Self {
        Self {
            // Canonical default down-row per spec.md §3 lifecycle, seeded
            // before any real sample has bootstrapped the filter.
            axis: AxisFilter::new([Q16::ZERO, Q16::ZERO, Q16::ONE]),
        }
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.axis.is_bootstrapped()
    }

    /// The tracked "down" direction, expressed in the body frame.
    pub fn down_row(&self) -> Vector3 {
        self.axis.row()
    }

    pub fn angular_velocity(&self) -> Vector3 {
        self.axis.angular_velocity()
    }

    pub fn predict(&mut self, dt: Q16, q_axis: Q16, q_gyro: Q16) {
        self.axis.predict(dt, q_axis, q_gyro);
    }

    /// `|norm(accel) - 1| >= threshold` — the original's `acceleration_detected`,
    /// used to fall back to gyro-only integration whenever the platform is
    /// undergoing linear acceleration that would corrupt a "down" estimate.
    pub fn acceleration_detected(accel: Vector3, threshold: Q16) -> bool {
        let norm = fixedmath::norm3(accel[0], accel[1], accel[2]);
        fixedmath::abs(norm - Q16::ONE) >= threshold
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        gyro: Vector3,
        accel: Option<Vector3>,
        policy: FusionPolicy,
        noise: RowNoise,
        attitude_threshold: Q16,
    ) -> AttitudeUpdateReport {
        let gyro = match policy {
            FusionPolicy::AccelOnly => ZERO3,
            _ => gyro,
        };

        if accel.is_none() {
            let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
            self.axis.sanitize();
            return AttitudeUpdateReport {
                branch: AttitudeBranch::GyroOnly,
                errors,
                disturbed: false,
            };
        }

        let accel = accel.unwrap();
        let norm = fixedmath::norm3(accel[0], accel[1], accel[2]);
        if norm == Q16::ZERO {
            let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
            self.axis.sanitize();
            return AttitudeUpdateReport {
                branch: AttitudeBranch::GyroOnly,
                errors,
                disturbed: false,
            };
        }
        // The "down" row is the reference down direction in body
        // coordinates: opposite the sensed specific force, which points
        // "up" when the platform is stationary (reaction to gravity).
        let down = [-accel[0] / norm, -accel[1] / norm, -accel[2] / norm];

        // Bootstrap writes the row directly, but still falls through into
        // the same disturbance-check/correction sequence run on later
        // cycles (`fusion_update_attitude` runs unconditionally right after
        // the bootstrap write in the original) rather than skipping it for
        // this cycle.
        let just_bootstrapped = !self.axis.is_bootstrapped();
        if just_bootstrapped {
            self.axis.bootstrap(down);
            self.axis.sanitize();
        }

        // `GyroOnly` forces the fallback path only once this filter has
        // already bootstrapped, mirroring the original's `TEST_GYROS`
        // switch, which never suppresses a bootstrap that hasn't happened
        // yet (it only clears `m_have_accelerometer` once
        // `m_attitude_bootstrapped` is already true).
        if !just_bootstrapped && policy == FusionPolicy::GyroOnly {
            let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
            self.axis.sanitize();
            return AttitudeUpdateReport {
                branch: AttitudeBranch::GyroOnly,
                errors,
                disturbed: false,
            };
        }

        let disturbed = Self::acceleration_detected(accel, attitude_threshold);
        let (branch, errors) = if disturbed {
            let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
            (AttitudeBranch::GyroOnly, errors)
        } else {
            let mut errors = self.axis.correct_row(down, noise.row);
            errors.merge(self.axis.correct_gyro(gyro, noise.gyro_fused));
            (AttitudeBranch::Full, errors)
        };
        self.axis.sanitize();

        AttitudeUpdateReport {
            branch: if just_bootstrapped {
                AttitudeBranch::Bootstrap
            } else {
                branch
            },
            errors,
            disturbed,
        }
    }
}

impl Default for AttitudeFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise() -> RowNoise { RowNoise::accel() }
    fn threshold() -> Q16 { Q16::from_num(0.14) }

    #[test]
    fn first_level_sample_bootstraps_down_row() {
        let mut f = AttitudeFilter::new();
        let report = f.update(
            ZERO3,
            Some([Q16::ZERO, Q16::ZERO, Q16::ONE]),
            FusionPolicy::Full,
            noise(),
            threshold(),
        );
        assert_eq!(report.branch, AttitudeBranch::Bootstrap);
        assert!(f.is_bootstrapped());
        // down is the negated, normalised accelerometer reading.
        assert_eq!(f.down_row(), [Q16::ZERO, Q16::ZERO, -Q16::ONE]);
    }

    #[test]
    fn disturbed_accelerometer_falls_back_to_gyro_only() {
        let mut f = AttitudeFilter::new();
        f.update(
            ZERO3,
            Some([Q16::ZERO, Q16::ZERO, Q16::ONE]),
            FusionPolicy::Full,
            noise(),
            threshold(),
        );
        // 2g spike: well past the 0.14 threshold.
        let report = f.update(
            ZERO3,
            Some([Q16::ZERO, Q16::ZERO, Q16::from_num(2.0)]),
            FusionPolicy::Full,
            noise(),
            threshold(),
        );
        assert_eq!(report.branch, AttitudeBranch::GyroOnly);
        assert!(report.disturbed);
    }

    #[test]
    fn gyro_only_policy_forces_gyro_branch_even_with_clean_accel() {
        let mut f = AttitudeFilter::new();
        f.update(
            ZERO3,
            Some([Q16::ZERO, Q16::ZERO, Q16::ONE]),
            FusionPolicy::Full,
            noise(),
            threshold(),
        );
        let report = f.update(
            ZERO3,
            Some([Q16::ZERO, Q16::ZERO, Q16::ONE]),
            FusionPolicy::GyroOnly,
            noise(),
            threshold(),
        );
        assert_eq!(report.branch, AttitudeBranch::GyroOnly);
    }

    #[test]
    fn clean_accel_after_bootstrap_runs_full_correction() {
        let mut f = AttitudeFilter::new();
        f.update(
            ZERO3,
            Some([Q16::ZERO, Q16::from_num(0.02), Q16::from_num(0.999)]),
            FusionPolicy::Full,
            noise(),
            threshold(),
        );
        let report = f.update(
            ZERO3,
            Some([Q16::ZERO, Q16::ZERO, Q16::ONE]),
            FusionPolicy::Full,
            noise(),
            threshold(),
        );
        assert_eq!(report.branch, AttitudeBranch::Full);
    }
}
