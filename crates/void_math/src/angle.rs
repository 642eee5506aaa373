//! Angle arithmetic on the circle
//!
//! All results are normalized to the half-open interval (-PI, PI] and all
//! differences and interpolations take the shortest arc.

use crate::consts::{PI, TAU};

/// Wrap an angle into (-PI, PI]. Non-finite input maps to 0.
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    // `%` is exact for floats, so the adjustments below cannot overshoot.
    let wrapped = angle % TAU;
    if wrapped <= -PI {
        wrapped + TAU
    } else if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Signed shortest-arc difference `to - from`, in (-PI, PI]
#[inline]
pub fn angle_difference(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Rotate `from` toward `to` by fraction `t` of the shortest arc between them
#[inline]
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    normalize_angle(from + angle_difference(from, to) * t)
}
