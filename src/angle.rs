//! Angle utilities used across the aggregation pipeline.
//!
//! Headings are stored internally in the signed range (-π, π] so that
//! residuals stay small around zero; output headings are reported in
//! [0, 2π).

use std::f64::consts::{PI, TAU};

/// Wraps an angle into the range (-π, π].
#[inline]
pub fn wrap_to_pi(angle: f64) -> f64 {
    let mut wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped += TAU;
    }
    wrapped
}

/// Normalizes a heading into the range [0, 2π).
#[inline]
pub fn normalize_heading(angle: f64) -> f64 {
    let norm = angle.rem_euclid(TAU);
    if norm >= TAU - 1e-12 {
        0.0
    } else {
        norm
    }
}

/// Signed smallest rotation taking `from` onto `to`, in (-π, π].
#[inline]
pub fn signed_difference(to: f64, from: f64) -> f64 {
    wrap_to_pi(to - from)
}

/// Smallest unsigned angular difference between two headings, in [0, π].
///
/// Unlike line orientations, headings are directional: opposite headings are
/// π apart, not equivalent.
#[inline]
pub fn angular_difference(a: f64, b: f64) -> f64 {
    signed_difference(a, b).abs()
}
