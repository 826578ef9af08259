//! The fusion aggregate: owns both axis filters, the latched sensor
//! samples, and the tuning constants, and drives one predict/correct cycle
//! per call. Collapses the original's two static filter instances, three
//! observation instances and six latched sample globals
//! (`kf_attitude`/`kf_orientation`, `kfm_accel`/`kfm_magneto`/`kfm_gyro`,
//! `m_accelerometer`/`m_magnetometer`/`m_gyroscope`/their `m_have_*` flags)
//! into one owned struct passed by `&mut self`, per the redesign note in
//! spec.md §9.

use crate::angles::{self, EulerAngles, Quaternion};
use crate::attitude::AttitudeFilter;
use crate::axis::Vector3;
use crate::error::FusionError;
use crate::fixedmath::Q16;
use crate::matrix::MatrixErrors;
use crate::orientation::OrientationFilter;

/// Runtime replacement for the original's `TEST_ENABLED`/`TEST_GYROS`/
/// `TEST_ACCEL` compile-time switches (spec.md §9).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FusionPolicy {
    /// Normal production behaviour: bootstrap, disturbance-gated accel
    /// correction, TRIAD-projected magnetometer correction.
    #[default]
    Full,
    /// Forces the gyro-only fallback in both filters once each has already
    /// bootstrapped, mirroring the original's `TEST_GYROS` switch (which
    /// only clears `m_have_accelerometer`/`m_have_magnetometer` after
    /// `m_attitude_bootstrapped`/`m_orientation_bootstrapped` are already
    /// true). A filter that hasn't bootstrapped yet still bootstraps
    /// normally under this policy — see `AttitudeFilter::update`/
    /// `OrientationFilter::update`.
    GyroOnly,
    /// The gyroscope contribution is zeroed before each update; accel/mag
    /// corrections still run normally.
    AccelOnly,
}

/// Tuning constants from `original_source/sensor_fusion.c`. Kept as plain
/// functions rather than `const` values: the `fixed` crate's float-to-fixed
/// conversion isn't usable in a const context, and a runtime config struct
/// isn't warranted per SPEC_FULL §7.3 — these mirror the original's
/// `static const fix16_t` tuning table exactly.
pub mod tuning {
    use super::Q16;

    /// Base noise figures, before the `tune_measurement_noise` scaling of
    /// spec.md §4.6 is applied.
    pub fn r_axis() -> Q16 {
        Q16::from_num(0.05)
    }
    pub fn r_projection() -> Q16 {
        Q16::from_num(0.02)
    }
    pub fn r_gyro() -> Q16 {
        Q16::from_num(0.02)
    }
    /// Certainty multiplier applied to the axis-row noise (`r_axis`,
    /// `r_projection`) when it's fused alongside a gyroscope reading.
    pub fn alpha1() -> Q16 {
        Q16::from_num(5)
    }
    /// Certainty multiplier applied to the gyroscope noise when it's fused
    /// alongside an axis-row observation (`kfm_accel`/`kfm_magneto`). The
    /// standalone `kfm_gyro` correction uses `r_gyro()` unscaled instead —
    /// spec.md §3 gives it as `R diagonal = r_gyro x 3`, with no `alpha2`
    /// factor.
    pub fn alpha2() -> Q16 {
        Q16::from_num(0.8)
    }
    pub fn q_axis() -> Q16 {
        Q16::ZERO
    }
    pub fn q_gyro() -> Q16 {
        Q16::ONE
    }
    pub fn attitude_threshold() -> Q16 {
        Q16::from_num(0.14)
    }
    pub fn singularity_cos_threshold() -> Q16 {
        Q16::from_num(0.17365)
    }
}

/// Measurement-noise figures for one filter's correction, already scaled by
/// `tune_measurement_noise` (spec.md §4.6): `row` feeds the axis-row
/// observation (`kfm_accel`/`kfm_magneto`), `gyro_fused` feeds the velocity
/// block of that same 6-observation correction, and `gyro_solo` feeds the
/// standalone 3-observation `kfm_gyro` correction used whenever the axis
/// observation isn't available or is distrusted.
#[derive(Clone, Copy, Debug)]
pub struct RowNoise {
    pub row: Q16,
    pub gyro_fused: Q16,
    pub gyro_solo: Q16,
}

impl RowNoise {
    pub fn accel() -> Self {
        Self {
            row: tuning::r_axis() * tuning::alpha1(),
            gyro_fused: tuning::r_gyro() * tuning::alpha2(),
            gyro_solo: tuning::r_gyro(),
        }
    }

    pub fn magneto() -> Self {
        Self {
            row: tuning::r_projection() * tuning::alpha1(),
            gyro_fused: tuning::r_gyro() * tuning::alpha2(),
            gyro_solo: tuning::r_gyro(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FusionUpdateReport {
    pub attitude: Option<crate::attitude::AttitudeUpdateReport>,
    pub orientation: Option<crate::orientation::OrientationUpdateReport>,
}

pub struct FusionCore {
    attitude: AttitudeFilter,
    orientation: OrientationFilter,
    policy: FusionPolicy,
    singularity_guard: bool,

    accel: Option<Vector3>,
    mag: Option<Vector3>,
    gyro: Vector3,
    have_gyroscope: bool,
}

impl FusionCore {
    pub fn new() -> Self {
        Self {
            attitude: AttitudeFilter::new(),
            orientation: OrientationFilter::new(),
            policy: FusionPolicy::Full,
            singularity_guard: false,
            accel: None,
            mag: None,
            gyro: [Q16::ZERO, Q16::ZERO, Q16::ZERO],
            have_gyroscope: false,
        }
    }

    pub fn with_policy(mut self, policy: FusionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Opt-in gate on the orientation update's singularity branch (`#if 0`
    /// in the original), defaulting to off (spec.md §9).
    pub fn with_singularity_guard(mut self, enabled: bool) -> Self {
        self.singularity_guard = enabled;
        self
    }

    pub fn set_accelerometer(&mut self, sample: Vector3) {
        self.accel = Some(sample);
    }

    pub fn set_magnetometer(&mut self, sample: Vector3) {
        self.mag = Some(sample);
    }

    /// Unlike the accelerometer and magnetometer latches, the gyroscope
    /// sample is not cleared at the end of `update` — the original never
    /// resets `m_have_gyroscope`, so the last known angular rate keeps
    /// driving prediction even on a cycle with no fresh gyro sample.
    pub fn set_gyroscope(&mut self, sample: Vector3) {
        self.gyro = sample;
        self.have_gyroscope = true;
    }

    pub fn attitude_euler_and_quaternion_ready(&self) -> bool {
        self.attitude.is_bootstrapped() && self.orientation.is_bootstrapped()
    }

    /// Time update: advances both axis filters' state and covariance by
    /// `dt` using the latched angular velocity.
    pub fn predict(&mut self, dt: Q16) {
        self.attitude.predict(dt, tuning::q_axis(), tuning::q_gyro());
        self.orientation.predict(dt, tuning::q_axis(), tuning::q_gyro());
    }

    /// Measurement update: corrects both filters against whatever samples
    /// are currently latched, then clears the one-shot accelerometer and
    /// magnetometer latches (`fusion_update`'s end-of-cycle
    /// `m_have_accelerometer = m_have_magnetometer = false`).
    pub fn correct(&mut self) -> Result<FusionUpdateReport, FusionError> {
        let gyro = if self.have_gyroscope {
            self.gyro
        } else {
            [Q16::ZERO, Q16::ZERO, Q16::ZERO]
        };

        let attitude_report = self.attitude.update(
            gyro,
            self.accel,
            self.policy,
            RowNoise::accel(),
            tuning::attitude_threshold(),
        );

        let orientation_report = self.orientation.update(
            gyro,
            self.mag,
            self.attitude.down_row(),
            self.attitude.is_bootstrapped(),
            self.policy,
            RowNoise::magneto(),
            self.singularity_guard,
            tuning::singularity_cos_threshold(),
        );

        self.accel = None;
        self.mag = None;

        let singular = attitude_report.errors.contains(MatrixErrors::SINGULAR)
            || orientation_report.errors.contains(MatrixErrors::SINGULAR);

        #[cfg(feature = "defmt")]
        {
            use crate::attitude::AttitudeBranch;
            use crate::orientation::OrientationBranch;

            if attitude_report.branch == AttitudeBranch::Bootstrap {
                defmt::trace!("attitude filter bootstrapped");
            }
            if attitude_report.disturbed {
                defmt::warn!("accelerometer disturbance detected, attitude correction fell back to gyro-only");
            }
            if orientation_report.branch == OrientationBranch::Bootstrap {
                defmt::trace!("orientation filter bootstrapped");
            }
            if orientation_report.singular_geometry {
                defmt::warn!("magnetometer projection near-singular, orientation correction fell back to gyro-only");
            }
            if singular {
                defmt::warn!("Kalman correction innovation covariance was singular, state left unchanged");
            }
        }

        let report = FusionUpdateReport {
            attitude: Some(attitude_report),
            orientation: Some(orientation_report),
        };

        if singular {
            Err(FusionError::Singular)
        } else {
            Ok(report)
        }
    }

    /// Runs a full predict/correct cycle for one `dt` time step.
    pub fn update(&mut self, dt: Q16) -> Result<FusionUpdateReport, FusionError> {
        self.predict(dt);
        self.correct()
    }

    pub fn fetch_angles(&self) -> EulerAngles {
        angles::euler_from_rows(self.attitude.down_row(), self.orientation.east_row())
    }

    pub fn fetch_quaternion(&self) -> Quaternion {
        angles::quaternion_from_rows(self.attitude.down_row(), self.orientation.east_row())
    }
}

impl Default for FusionCore {
    fn default() -> Self {
        Self::new()
    }
}
