//! Fixed-point attitude/heading Kalman fusion core for a low-power MARG
//! (magnetometer, angular rate, gravity) sensor.
//!
//! Fuses accelerometer, gyroscope and magnetometer samples into a
//! body-to-reference rotation via two coupled 6-state Kalman filters — an
//! attitude filter tracking the "down" DCM row and an orientation filter
//! tracking the "east" DCM row — and exposes the result as Euler angles or
//! a unit quaternion. All arithmetic is Q16.16 fixed-point; there is no
//! floating-point path in the fused estimate.
//!
//! Sensor driver register sequences, telemetry framing and board startup
//! are out of scope: a caller feeds `I16F16` samples into [`fusion::FusionCore`]
//! and reads the fused estimate back out.
#![cfg_attr(not(test), no_std)]

pub mod angles;
pub mod attitude;
pub mod axis;
pub mod error;
pub mod fixedmath;
pub mod fusion;
pub mod kalman;
pub mod matrix;
pub mod orientation;

pub use angles::{EulerAngles, Quaternion};
pub use error::FusionError;
pub use fixedmath::Q16;
pub use fusion::{FusionCore, FusionPolicy};
