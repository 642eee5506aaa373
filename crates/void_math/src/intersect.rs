//! Intersection tests against axis-aligned rectangles
//!
//! Segment vs rectangle, using the slab method clipped to the segment

use crate::bounds::Rect;
use crate::consts::EPSILON;
use crate::vector::Vec2;

/// Clip the parametric line `origin + delta * t` against `rect` on both axes.
///
/// Returns the `(t_enter, t_exit)` interval overlapping `[0, 1]`.
fn clip_slabs(origin: Vec2, delta: Vec2, rect: &Rect) -> Option<(f32, f32)> {
    let mut t_min = 0.0_f32;
    let mut t_max = 1.0_f32;

    for (start, dir, lo, hi) in [
        (origin.x, delta.x, rect.min.x, rect.max.x),
        (origin.y, delta.y, rect.min.y, rect.max.y),
    ] {
        if dir.abs() < EPSILON {
            // Parallel to this slab: must already be between its planes
            if start < lo || start > hi {
                return None;
            }
        } else {
            let inv = 1.0 / dir;
            let t1 = (lo - start) * inv;
            let t2 = (hi - start) * inv;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
            if t_min > t_max {
                return None;
            }
        }
    }

    Some((t_min, t_max))
}

/// Segment-rectangle intersection using the slab method
///
/// Returns the fraction in `[0, 1]` along `start -> end` where the segment
/// first touches the rectangle, or None if they do not overlap. Touching an
/// edge counts as an intersection. A degenerate segment is treated as a point.
pub fn segment_rect(start: Vec2, end: Vec2, rect: &Rect) -> Option<f32> {
    if !start.is_finite() || !end.is_finite() || !rect.is_valid() {
        return None;
    }
    clip_slabs(start, end - start, rect).map(|(t, _)| t)
}

/// True if the segment `start -> end` overlaps the rectangle anywhere
#[inline]
pub fn segment_intersects_rect(start: Vec2, end: Vec2, rect: &Rect) -> bool {
    segment_rect(start, end, rect).is_some()
}
