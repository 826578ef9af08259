//! Extraction of Euler angles and a unit quaternion from the two tracked
//! DCM rows (spec.md §4.5). Grounded on `calculate_roll_pitch`/
//! `calculate_yaw`/`fusion_fetch_angles` and `fetch_quaternion_opt2` in
//! `original_source/sensor_fusion.c` — the trace-based Shepperd
//! decomposition. `fetch_quaternion_opt1`, the `copysign`-based method the
//! original documents as numerically unreliable near pitch=0/yaw=180, is
//! deliberately not ported.

use crate::axis::Vector3;
use crate::fixedmath::{self, Q16};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EulerAngles {
    pub roll: Q16,
    pub pitch: Q16,
    pub yaw: Q16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quaternion {
    pub w: Q16,
    pub x: Q16,
    pub y: Q16,
    pub z: Q16,
}

fn cross(u: Vector3, v: Vector3) -> Vector3 {
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

/// Roll/pitch/yaw from the attitude row `a` (down) and orientation row `b`
/// (east), following the exact formulas in spec.md §4.5:
/// `pitch = -asin(a0)`, `roll = -atan2(a1, -a2)`,
/// `yaw = atan2(b0, -r0)` where `r = b x a`.
pub fn euler_from_rows(down: Vector3, east: Vector3) -> EulerAngles {
    let a = down;
    let b = east;
    let r = cross(b, a);

    let clamped = if a[0] > Q16::ONE {
        Q16::ONE
    } else if a[0] < -Q16::ONE {
        -Q16::ONE
    } else {
        a[0]
    };
    let pitch = -fixedmath::asin(clamped);
    let roll = -fixedmath::atan2(a[1], -a[2]);
    let yaw = fixedmath::atan2(b[0], -r[0]);

    EulerAngles { roll, pitch, yaw }
}

/// Unit quaternion from the attitude row `a` (down) and orientation row `b`
/// (east), via the trace-based Shepperd decomposition (`fetch_quaternion_opt2`
/// in the original). Builds the DCM with rows `b`, `-a`, and a top row
/// `m0 = normalise(b x (-a))`: the "north" direction completing the
/// right-handed (north, east, down) frame implied by the filters' stored
/// rows (the attitude row is kept as the *negative* of the reference down
/// axis, per [`crate::attitude::AttitudeFilter`]'s bootstrap convention, so
/// `-a` recovers the natural down axis before crossing with east). The
/// opposite cross order looks plausible but yields an improper
/// (determinant -1) matrix whose Shepperd decomposition is not unit length.
pub fn quaternion_from_rows(down: Vector3, east: Vector3) -> Quaternion {
    let a = down;
    let b = east;
    let neg_a = [-a[0], -a[1], -a[2]];

    let m0_raw = cross(b, neg_a);
    let m0_norm = fixedmath::norm3(m0_raw[0], m0_raw[1], m0_raw[2]);
    let m0 = if m0_norm == Q16::ZERO {
        [Q16::ONE, Q16::ZERO, Q16::ZERO]
    } else {
        [m0_raw[0] / m0_norm, m0_raw[1] / m0_norm, m0_raw[2] / m0_norm]
    };

    // Full DCM, row-major: row 0 = m0, row 1 = b (east), row 2 = -a (-down).
    let m = [m0, b, neg_a];
    let trace = m[0][0] + m[1][1] + m[2][2];

    if trace > Q16::ZERO {
        let s = Q16::from_num(0.5) / fixedmath::sqrt(Q16::ONE + trace);
        Quaternion {
            w: Q16::from_num(0.25) / s,
            x: (m[2][1] - m[1][2]) * s,
            y: (m[0][2] - m[2][0]) * s,
            z: (m[1][0] - m[0][1]) * s,
        }
    } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
        let s = Q16::from_num(0.5) / fixedmath::sqrt(Q16::ONE + m[0][0] - m[1][1] - m[2][2]);
        Quaternion {
            w: (m[2][1] - m[1][2]) * s,
            x: Q16::from_num(0.25) / s,
            y: (m[0][1] + m[1][0]) * s,
            z: (m[0][2] + m[2][0]) * s,
        }
    } else if m[1][1] > m[2][2] {
        let s = Q16::from_num(0.5) / fixedmath::sqrt(Q16::ONE + m[1][1] - m[0][0] - m[2][2]);
        Quaternion {
            w: (m[0][2] - m[2][0]) * s,
            x: (m[0][1] + m[1][0]) * s,
            y: Q16::from_num(0.25) / s,
            z: (m[1][2] + m[2][1]) * s,
        }
    } else {
        let s = Q16::from_num(0.5) / fixedmath::sqrt(Q16::ONE + m[2][2] - m[0][0] - m[1][1]);
        Quaternion {
            w: (m[1][0] - m[0][1]) * s,
            x: (m[0][2] + m[2][0]) * s,
            y: (m[1][2] + m[2][1]) * s,
            z: Q16::from_num(0.25) / s,
        }
    }
}
