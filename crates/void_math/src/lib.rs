//! # void_math - Planar Math
//!
//! 2D primitives for gameplay code that lives on a flat playfield with the
//! y axis pointing down: vectors, axis-aligned rectangles, rays,
//! shortest-arc angle arithmetic and rectangle intersection tests.

pub mod angle;
pub mod bounds;
pub mod intersect;
pub mod ray;
pub mod vector;

pub use angle::*;
pub use bounds::*;
pub use intersect::*;
pub use ray::*;
pub use vector::*;

/// Angle and tolerance constants
pub mod consts {
    pub use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

    /// Parallel-direction tolerance for intersection tests
    pub const EPSILON: f32 = 1e-6;
}

/// Convert radians to degrees, for log output
#[inline]
pub fn degrees(radians: f32) -> f32 {
    radians.to_degrees()
}
