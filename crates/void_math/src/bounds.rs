//! Axis-aligned rectangles for obstacles and world bounds

use crate::vector::Vec2;

/// Axis-aligned rectangle
///
/// Edges are inclusive: points exactly on the border are contained.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Create from min and max corners
    #[inline]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Create from center and half-extents
    #[inline]
    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Create from center and full size
    #[inline]
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self::from_center_half_extents(center, size * 0.5)
    }

    /// Create from edge coordinates. Edge order does not matter.
    pub fn from_edges(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self {
            min: Vec2::new(left.min(right), top.min(bottom)),
            max: Vec2::new(left.max(right), top.max(bottom)),
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Finite corners with min <= max on both axes
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x <= self.max.x
            && self.min.y <= self.max.y
    }

    /// Grow by `amount` on every side. Negative amounts shrink.
    #[inline]
    pub fn expand(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(amount),
            max: self.max + Vec2::splat(amount),
        }
    }

    /// Shrink by `amount` on every side. The result may be invalid if the
    /// rectangle is smaller than `2 * amount`.
    #[inline]
    pub fn shrink(&self, amount: f32) -> Self {
        self.expand(-amount)
    }

    #[inline]
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Closest point on or inside the rectangle
    #[inline]
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        point.max(self.min).min(self.max)
    }

    /// Distance from `point` to the rectangle, 0 when inside
    #[inline]
    pub fn distance_to_point(&self, point: Vec2) -> f32 {
        self.closest_point(point).distance(point)
    }
}
