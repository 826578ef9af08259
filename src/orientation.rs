//! Orientation filter: tracks the body-frame "east" DCM row plus angular
//! velocity. Grounded on `kf_orientation` + `kfm_magneto`/`kfm_gyro` and
//! `fusion_update_orientation`/`fusion_update_orientation_gyro` in
//! `original_source/sensor_fusion.c`. The magnetometer never observes the
//! east row directly — it's projected into one first via `magnetometer_project`
//! (TRIAD), which is why this filter depends on the attitude filter's down
//! row rather than standing alone.

use crate::axis::{AxisFilter, Vector3, ZERO3};
use crate::fixedmath::{self, Q16};
use crate::fusion::{FusionPolicy, RowNoise};
use crate::matrix::MatrixErrors;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OrientationBranch {
    /// Waiting on the attitude filter to bootstrap first; no down row to
    /// project the magnetometer against yet.
    WaitingForAttitude,
    Bootstrap,
    GyroOnly,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OrientationUpdateReport {
    pub branch: OrientationBranch,
    pub errors: MatrixErrors,
    /// Set when the optional singularity guard vetoed the magnetometer
    /// correction because it was nearly parallel to the down row.
    pub singular_geometry: bool,
}

pub struct OrientationFilter {
    axis: AxisFilter,
}

impl OrientationFilter {
    pub fn new() -> Self {
        Self {
            // Canonical default east-row per spec.md §3 lifecycle.
            axis: AxisFilter::new([Q16::ZERO, Q16::ONE, Q16::ZERO]),
        }
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.axis.is_bootstrapped()
    }

    /// The tracked "east" direction, expressed in the body frame.
    pub fn east_row(&self) -> Vector3 {
        self.axis.row()
    }

    pub fn angular_velocity(&self) -> Vector3 {
        self.axis.angular_velocity()
    }

    pub fn predict(&mut self, dt: Q16, q_axis: Q16, q_gyro: Q16) {
        self.axis.predict(dt, q_axis, q_gyro);
    }

    /// TRIAD projection: recovers an "east" direction orthogonal to the
    /// known "down" row from a raw magnetometer sample, via
    /// `east = normalize(down x mag)`. Returns `None` when the cross
    /// product degenerates (magnetometer reading nearly parallel to down),
    /// which the caller treats as a singular-geometry veto.
    pub fn magnetometer_project(down: Vector3, mag: Vector3) -> Option<Vector3> {
        // p = m x a (spec.md §4.4): the magnetometer crossed with the
        // attitude axis, not the other way around — order sets the sign of
        // the recovered "east" direction.
        let cross = [
            mag[1] * down[2] - mag[2] * down[1],
            mag[2] * down[0] - mag[0] * down[2],
            mag[0] * down[1] - mag[1] * down[0],
        ];
        let norm = fixedmath::norm3(cross[0], cross[1], cross[2]);
        if norm == Q16::ZERO {
            return None;
        }
        Some([cross[0] / norm, cross[1] / norm, cross[2] / norm])
    }

    fn cross_norm(down: Vector3, mag: Vector3) -> Q16 {
        let mag_norm = fixedmath::norm3(mag[0], mag[1], mag[2]);
        if mag_norm == Q16::ZERO {
            return Q16::ZERO;
        }
        let mag_unit = [mag[0] / mag_norm, mag[1] / mag_norm, mag[2] / mag_norm];
        let cross = [
            mag_unit[1] * down[2] - mag_unit[2] * down[1],
            mag_unit[2] * down[0] - mag_unit[0] * down[2],
            mag_unit[0] * down[1] - mag_unit[1] * down[0],
        ];
        fixedmath::norm3(cross[0], cross[1], cross[2])
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        gyro: Vector3,
        mag: Option<Vector3>,
        down_row: Vector3,
        attitude_ready: bool,
        policy: FusionPolicy,
        noise: RowNoise,
        singularity_guard: bool,
        singularity_cos_threshold: Q16,
    ) -> OrientationUpdateReport {
        let gyro = match policy {
            FusionPolicy::AccelOnly => ZERO3,
            _ => gyro,
        };

        if !attitude_ready {
            // No down row to project the magnetometer against yet, but the
            // angular-velocity state still tracks the gyroscope while we
            // wait (spec.md §4.3: "Otherwise (no magnetometer, or attitude
            // not ready), run the gyro-only correction on the orientation
            // filter").
            let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
            self.axis.sanitize();
            return OrientationUpdateReport {
                branch: OrientationBranch::WaitingForAttitude,
                errors,
                singular_geometry: false,
            };
        }

        if mag.is_none() {
            let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
            self.axis.sanitize();
            return OrientationUpdateReport {
                branch: OrientationBranch::GyroOnly,
                errors,
                singular_geometry: false,
            };
        }

        let mag = mag.unwrap();
        let singular = singularity_guard && Self::cross_norm(down_row, mag) < singularity_cos_threshold;
        if singular {
            let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
            self.axis.sanitize();
            return OrientationUpdateReport {
                branch: OrientationBranch::GyroOnly,
                errors,
                singular_geometry: true,
            };
        }

        let east = match Self::magnetometer_project(down_row, mag) {
            Some(e) => e,
            None => {
                let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
                self.axis.sanitize();
                return OrientationUpdateReport {
                    branch: OrientationBranch::GyroOnly,
                    errors,
                    singular_geometry: true,
                };
            }
        };

        // Bootstrap writes the row directly, but still falls through into
        // the same correction sequence run on later cycles
        // (`fusion_update_orientation` runs unconditionally right after the
        // bootstrap write in the original) rather than skipping it for this
        // cycle.
        let just_bootstrapped = !self.axis.is_bootstrapped();
        if just_bootstrapped {
            self.axis.bootstrap(east);
            self.axis.sanitize();
        }

        // `GyroOnly` forces the fallback path only once this filter has
        // already bootstrapped, mirroring the original's `TEST_GYROS`
        // switch, which never suppresses a bootstrap that hasn't happened
        // yet (it only clears `m_have_magnetometer` once
        // `m_orientation_bootstrapped` is already true).
        if !just_bootstrapped && policy == FusionPolicy::GyroOnly {
            let errors = self.axis.correct_gyro(gyro, noise.gyro_solo);
            self.axis.sanitize();
            return OrientationUpdateReport {
                branch: OrientationBranch::GyroOnly,
                errors,
                singular_geometry: false,
            };
        }

        let mut errors = self.axis.correct_row(east, noise.row);
        errors.merge(self.axis.correct_gyro(gyro, noise.gyro_fused));
        self.axis.sanitize();
        OrientationUpdateReport {
            branch: if just_bootstrapped {
                OrientationBranch::Bootstrap
            } else {
                OrientationBranch::Full
            },
            errors,
            singular_geometry: false,
        }
    }
}

impl Default for OrientationFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWN: Vector3 = [Q16::ZERO, Q16::ZERO, Q16::ONE];

    #[test]
    fn waiting_for_attitude_still_runs_gyro_correction() {
        let mut f = OrientationFilter::new();
        let report = f.update(
            [Q16::from_num(0.3), Q16::ZERO, Q16::ZERO],
            Some([Q16::ONE, Q16::ZERO, Q16::ZERO]),
            DOWN,
            false,
            FusionPolicy::Full,
            RowNoise::magneto(),
            false,
            Q16::from_num(0.17365),
        );
        assert_eq!(report.branch, OrientationBranch::WaitingForAttitude);
        assert!(!f.is_bootstrapped());
        // The row can't bootstrap without a down row to project against,
        // but the angular-velocity state must still track the gyroscope.
        assert!(f.angular_velocity()[0] > Q16::ZERO);
    }

    #[test]
    fn orientation_waits_for_attitude_before_bootstrapping() {
        let mut f = OrientationFilter::new();
        let report = f.update(
            ZERO3,
            Some([Q16::ONE, Q16::ZERO, Q16::ZERO]),
            DOWN,
            false,
            FusionPolicy::Full,
            RowNoise::magneto(),
            false,
            Q16::from_num(0.17365),
        );
        assert_eq!(report.branch, OrientationBranch::WaitingForAttitude);
        assert!(!f.is_bootstrapped());
    }

    #[test]
    fn clean_magnetometer_sample_bootstraps_east_row() {
        let mut f = OrientationFilter::new();
        let report = f.update(
            ZERO3,
            Some([Q16::ONE, Q16::ZERO, Q16::ZERO]),
            DOWN,
            true,
            FusionPolicy::Full,
            RowNoise::magneto(),
            false,
            Q16::from_num(0.17365),
        );
        assert_eq!(report.branch, OrientationBranch::Bootstrap);
        assert!(f.is_bootstrapped());
    }

    #[test]
    fn magnetometer_project_is_orthogonal_to_down() {
        let east = OrientationFilter::magnetometer_project(
            [Q16::ZERO, Q16::ZERO, Q16::ONE],
            [Q16::ONE, Q16::from_num(0.2), Q16::from_num(0.1)],
        )
        .expect("non-degenerate geometry projects cleanly");
        let dot = east[2]; // down = [0,0,1], dot = east_z
        assert!(fixedmath::abs(dot) < Q16::from_num(0.01));
    }

    #[test]
    fn singularity_guard_vetoes_nearly_parallel_magnetometer() {
        let mut f = OrientationFilter::new();
        // Bootstrap first with a clean reading.
        f.update(
            ZERO3,
            Some([Q16::ONE, Q16::ZERO, Q16::ZERO]),
            DOWN,
            true,
            FusionPolicy::Full,
            RowNoise::magneto(),
            false,
            Q16::from_num(0.17365),
        );
        // Mag now nearly parallel to down: small cross-product norm.
        let report = f.update(
            ZERO3,
            Some([Q16::from_num(0.01), Q16::from_num(0.01), Q16::ONE]),
            DOWN,
            true,
            FusionPolicy::Full,
            RowNoise::magneto(),
            true,
            Q16::from_num(0.17365),
        );
        assert!(report.singular_geometry);
        assert_eq!(report.branch, OrientationBranch::GyroOnly);
    }
}
