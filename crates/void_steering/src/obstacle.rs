//! Static obstacles and the read-only queries steering runs against them

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use void_math::{segment_intersects_rect, Rect, Vec2};

/// An axis-aligned rectangular obstacle (wall, pillar, crate)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Center of the rectangle
    pub center: Vec2,
    /// Full width
    pub width: f32,
    /// Full height
    pub height: f32,
}

impl Obstacle {
    /// Create an obstacle from its center and size
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vec2::new(x, y),
            width,
            height,
        }
    }

    /// Create an obstacle covering `rect`
    pub fn from_rect(rect: &Rect) -> Self {
        let size = rect.size();
        Self {
            center: rect.center(),
            width: size.x,
            height: size.y,
        }
    }

    /// Bare rectangle
    pub fn rect(&self) -> Rect {
        Rect::from_center_size(self.center, Vec2::new(self.width, self.height))
    }

    /// Rectangle grown by `padding` on every side
    pub fn padded(&self, padding: f32) -> Rect {
        self.rect().expand(padding)
    }

    /// Finite center and strictly positive size. Invalid obstacles never block.
    pub fn is_valid(&self) -> bool {
        self.center.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Read-only view of the obstacles present this tick
///
/// Implementations may hand out a different set on every call; pathfinders
/// never keep obstacles across ticks.
pub trait ObstacleSource: Send + Sync {
    /// Obstacles currently in the world
    fn obstacles(&self) -> Cow<'_, [Obstacle]>;
}

impl ObstacleSource for Vec<Obstacle> {
    fn obstacles(&self) -> Cow<'_, [Obstacle]> {
        Cow::Borrowed(self.as_slice())
    }
}

impl ObstacleSource for RwLock<Vec<Obstacle>> {
    fn obstacles(&self) -> Cow<'_, [Obstacle]> {
        Cow::Owned(self.read().clone())
    }
}

/// Obstacle set shared between the room that owns the walls and every agent
/// steering around them. Writers replace or edit walls between ticks.
pub type SharedObstacles = Arc<RwLock<Vec<Obstacle>>>;

/// Wrap `obstacles` in a shared set
pub fn shared_obstacles(obstacles: Vec<Obstacle>) -> SharedObstacles {
    Arc::new(RwLock::new(obstacles))
}

/// Blocking queries over one tick's obstacles with a fixed safety padding
#[derive(Debug, Clone, Copy)]
pub struct ObstacleQuery<'a> {
    obstacles: &'a [Obstacle],
    padding: f32,
}

impl<'a> ObstacleQuery<'a> {
    pub fn new(obstacles: &'a [Obstacle], padding: f32) -> Self {
        Self { obstacles, padding }
    }

    /// Iterate over the valid obstacles only
    fn valid(&self) -> impl Iterator<Item = &'a Obstacle> + 'a {
        let obstacles: &'a [Obstacle] = self.obstacles;
        obstacles.iter().filter(|o| o.is_valid())
    }

    /// No valid obstacles at all
    pub fn is_empty(&self) -> bool {
        self.valid().next().is_none()
    }

    /// Point lies inside some padded obstacle
    pub fn is_point_blocked(&self, point: Vec2) -> bool {
        let padding = self.padding;
        self.valid().any(|o| o.padded(padding).contains_point(point))
    }

    /// Segment `from -> to` crosses some padded obstacle
    pub fn is_segment_blocked(&self, from: Vec2, to: Vec2) -> bool {
        let padding = self.padding;
        self.valid()
            .any(|o| segment_intersects_rect(from, to, &o.padded(padding)))
    }

    /// Like [`is_segment_blocked`](Self::is_segment_blocked), but an obstacle
    /// whose padding already contains an endpoint only blocks with its bare
    /// rectangle. Used for short moves of an agent hugging a wall.
    pub fn is_segment_blocked_leaving(&self, from: Vec2, to: Vec2) -> bool {
        let padding = self.padding;
        self.valid().any(|o| {
            let padded = o.padded(padding);
            if padded.contains_point(from) || padded.contains_point(to) {
                segment_intersects_rect(from, to, &o.rect())
            } else {
                segment_intersects_rect(from, to, &padded)
            }
        })
    }

    /// Distance from `point` to the nearest padded obstacle, 0 when inside one
    pub fn nearest_distance(&self, point: Vec2) -> Option<f32> {
        let padding = self.padding;
        self.valid()
            .map(|o| o.padded(padding).distance_to_point(point))
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Point lies within `distance` of some padded obstacle
    pub fn is_near(&self, point: Vec2, distance: f32) -> bool {
        self.nearest_distance(point).is_some_and(|d| d <= distance)
    }
}
