//! Q16.16 scalar math kernel.
//!
//! The spec treats this as an external dependency whose *contract* (add,
//! sub, mul, div, sqrt, sq, abs, atan2, asin, sign, sign_ex) the fusion core
//! relies on, not an implementation it owns. We satisfy that contract with
//! the `fixed` crate (arithmetic, `sq`, `abs`) and `cordic` (the
//! transcendental functions), rather than hand-rolling a CORDIC of our own.

use fixed::types::I16F16;

/// The fixed-point scalar type used throughout the fusion core: Q16.16,
/// 16 integer bits (including sign) and 16 fractional bits.
pub type Q16 = I16F16;

#[inline]
pub fn add(a: Q16, b: Q16) -> Q16 {
    a + b
}

#[inline]
pub fn sub(a: Q16, b: Q16) -> Q16 {
    a - b
}

#[inline]
pub fn mul(a: Q16, b: Q16) -> Q16 {
    a * b
}

#[inline]
pub fn div(a: Q16, b: Q16) -> Q16 {
    a / b
}

#[inline]
pub fn sq(a: Q16) -> Q16 {
    a * a
}

#[inline]
pub fn abs(a: Q16) -> Q16 {
    a.abs()
}

#[inline]
pub fn sqrt(a: Q16) -> Q16 {
    cordic::sqrt(a)
}

#[inline]
pub fn atan2(y: Q16, x: Q16) -> Q16 {
    cordic::atan2(y, x)
}

#[inline]
pub fn asin(a: Q16) -> Q16 {
    cordic::asin(a)
}

/// -1 if negative, +1 otherwise (zero counts as positive, matching `fix16_sign`).
#[inline]
pub fn sign(value: Q16) -> i32 {
    if value >= Q16::ZERO {
        1
    } else {
        -1
    }
}

/// -1/0/+1, matching `fix16_sign_ex`.
#[inline]
pub fn sign_ex(value: Q16) -> i32 {
    if value > Q16::ZERO {
        1
    } else if value < Q16::ZERO {
        -1
    } else {
        0
    }
}

/// Euclidean norm of a 3-vector.
#[inline]
pub fn norm3(a: Q16, b: Q16, c: Q16) -> Q16 {
    sqrt(sq(a) + sq(b) + sq(c))
}

/// Euclidean norm of a 2-vector.
#[inline]
pub fn norm2(a: Q16, b: Q16) -> Q16 {
    sqrt(sq(a) + sq(b))
}
