//! Void Steering - Obstacle-Aware Movement for Agents
//!
//! Per-tick velocity computation for enemies moving through rooms full of
//! axis-aligned walls.
//!
//! # Features
//!
//! - Context steering over a fixed ray fan with momentum and corner handling
//! - Stuck detection with committed escape headings
//! - No-progress detection with short waypoint detours
//! - Hot-swappable obstacle sources shared between agents
//!
//! # Example
//!
//! ```ignore
//! use void_steering::prelude::*;
//!
//! let walls = shared_obstacles(vec![Obstacle::new(100.0, 0.0, 40.0, 200.0)]);
//! let bounds = Rect::from_edges(-500.0, 500.0, -500.0, 500.0);
//!
//! let mut pathfinder = DetourController::default();
//! pathfinder.set_obstacle_source(walls.clone());
//!
//! let output = pathfinder.compute_velocity(position, player, 100.0, &bounds);
//! position += output.velocity * dt;
//! ```

pub mod config;
pub mod detour;
pub mod error;
pub mod obstacle;
pub mod steering;

pub use config::{DetourConfig, PathfinderConfig, SteeringConfig};
pub use detour::{DetourController, DetourPhase, DetourState, WaypointQueue};
pub use error::{Result, SteeringError};
pub use obstacle::{shared_obstacles, Obstacle, ObstacleQuery, ObstacleSource, SharedObstacles};
pub use steering::{ContextMap, SteeringCore, SteeringOutput, SteeringState};

pub mod prelude {
    pub use crate::config::{DetourConfig, PathfinderConfig, SteeringConfig};
    pub use crate::detour::{DetourController, DetourPhase};
    pub use crate::obstacle::{shared_obstacles, Obstacle, ObstacleSource, SharedObstacles};
    pub use crate::steering::{SteeringCore, SteeringOutput};
    pub use void_math::{Rect, Vec2};
}
