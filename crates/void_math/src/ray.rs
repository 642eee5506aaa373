//! 2D ray for sampling along a direction

use crate::vector::Vec2;

/// 2D ray with a normalized direction
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ray {
    /// Ray origin point
    pub origin: Vec2,
    /// Ray direction (normalized)
    pub direction: Vec2,
}

impl Ray {
    /// Create a new ray with normalized direction
    #[inline]
    pub fn new(origin: Vec2, direction: Vec2) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Create a ray pointing along `angle` (radians)
    #[inline]
    pub fn from_angle(origin: Vec2, angle: f32) -> Self {
        Self {
            origin,
            direction: Vec2::from_angle(angle),
        }
    }

    /// Get point at distance `t` along the ray
    #[inline]
    pub fn at(&self, t: f32) -> Vec2 {
        self.origin + self.direction * t
    }
}
