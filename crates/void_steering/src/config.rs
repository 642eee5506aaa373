//! Steering and detour configuration
//!
//! Every field has a default tuned for enemies moving at roughly 100 units per
//! second in 60 Hz rooms. All structs deserialize with `#[serde(default)]`,
//! so content files only need to list the fields they override.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SteeringError};

/// Configuration for [`SteeringCore`](crate::steering::SteeringCore)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Number of uniformly spaced sample directions over the full circle
    pub ray_count: usize,

    /// How far ahead each ray is sampled for obstacles
    pub ray_length: f32,

    /// Sample points per ray, placed at k/n of `ray_length`
    pub ray_samples: usize,

    /// Safety margin added to each obstacle's half-extents
    pub obstacle_padding: f32,

    /// Weight of "this direction is safe" in the direction score
    pub avoidance_weight: f32,

    /// Weight of "this direction points at the target" in the direction score
    pub seek_weight: f32,

    /// Fraction of the angular gap closed per tick
    pub smoothing: f32,

    /// Distance to a padded obstacle under which ray casting is always used
    pub near_distance: f32,

    /// Score bonus for re-choosing the previous ray
    pub momentum_bonus: f32,

    /// Multiplier applied to the momentum bonus while cornered
    pub corner_momentum_scale: f32,

    /// Fraction of rays with danger above 0.5 that counts as a corner
    pub corner_ratio: f32,

    /// Rays at or above this danger are never chosen
    pub danger_cutoff: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            ray_count: 16,
            ray_length: 60.0,
            ray_samples: 4,
            obstacle_padding: 25.0,
            avoidance_weight: 0.6,
            seek_weight: 0.4,
            smoothing: 0.2,
            near_distance: 40.0,
            momentum_bonus: 0.15,
            corner_momentum_scale: 0.5,
            corner_ratio: 0.4,
            danger_cutoff: 0.95,
        }
    }
}

impl SteeringConfig {
    /// Finer sampling for large bosses that must not clip scenery
    pub fn precise() -> Self {
        Self {
            ray_count: 32,
            ray_samples: 8,
            ..Default::default()
        }
    }

    /// Coarse sampling for swarms of cheap enemies
    pub fn fast() -> Self {
        Self {
            ray_count: 8,
            ray_samples: 2,
            ..Default::default()
        }
    }

    /// Set ray count
    pub fn with_ray_count(mut self, ray_count: usize) -> Self {
        self.ray_count = ray_count;
        self
    }

    /// Set ray length
    pub fn with_ray_length(mut self, ray_length: f32) -> Self {
        self.ray_length = ray_length;
        self
    }

    /// Set obstacle padding
    pub fn with_obstacle_padding(mut self, padding: f32) -> Self {
        self.obstacle_padding = padding;
        self
    }

    /// Set avoidance and seek weights
    pub fn with_weights(mut self, avoidance: f32, seek: f32) -> Self {
        self.avoidance_weight = avoidance;
        self.seek_weight = seek;
        self
    }

    /// Set heading smoothing
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Check that every field is in range
    pub fn validate(&self) -> Result<()> {
        if self.ray_count < 4 {
            return Err(SteeringError::invalid("ray_count", "must be at least 4"));
        }
        if self.ray_samples == 0 {
            return Err(SteeringError::invalid("ray_samples", "must be at least 1"));
        }
        positive("ray_length", self.ray_length)?;
        non_negative("obstacle_padding", self.obstacle_padding)?;
        non_negative("avoidance_weight", self.avoidance_weight)?;
        non_negative("seek_weight", self.seek_weight)?;
        if self.avoidance_weight + self.seek_weight <= 0.0 {
            return Err(SteeringError::invalid(
                "avoidance_weight",
                "and seek_weight must not both be zero",
            ));
        }
        unit_interval("smoothing", self.smoothing)?;
        non_negative("near_distance", self.near_distance)?;
        non_negative("momentum_bonus", self.momentum_bonus)?;
        if !(0.0..=1.0).contains(&self.corner_momentum_scale) {
            return Err(SteeringError::invalid(
                "corner_momentum_scale",
                format!("must be within [0, 1], got {}", self.corner_momentum_scale),
            ));
        }
        unit_interval("corner_ratio", self.corner_ratio)?;
        unit_interval("danger_cutoff", self.danger_cutoff)?;
        Ok(())
    }
}

/// Configuration for [`DetourController`](crate::detour::DetourController)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetourConfig {
    /// Displacement per tick below which the agent counts as not moving
    pub stuck_distance: f32,

    /// Consecutive motionless ticks before an escape is committed
    pub stuck_threshold: u32,

    /// Ticks an escape heading is held
    pub escape_duration: u32,

    /// Projection distance used to validate escape candidates
    pub escape_distance: f32,

    /// Minimum per-tick decrease in target distance that counts as progress
    pub progress_epsilon: f32,

    /// Consecutive ticks without progress before a detour is generated
    pub no_progress_threshold: u32,

    /// Distance at which a waypoint counts as reached
    pub arrival_radius: f32,

    /// Length of each detour step along a perpendicular
    pub waypoint_step: f32,

    /// Maximum waypoints chained on one side of a detour
    pub max_waypoints: usize,

    /// Distance of the single fallback waypoint
    pub fallback_waypoint_distance: f32,

    /// Generated points must stay this far inside the world bounds
    pub bounds_margin: f32,
}

impl Default for DetourConfig {
    fn default() -> Self {
        Self {
            stuck_distance: 1.5,
            stuck_threshold: 15,
            escape_duration: 20,
            escape_distance: 50.0,
            progress_epsilon: 1.0,
            no_progress_threshold: 30,
            arrival_radius: 25.0,
            waypoint_step: 60.0,
            max_waypoints: 3,
            fallback_waypoint_distance: 70.0,
            bounds_margin: 20.0,
        }
    }
}

impl DetourConfig {
    /// Set stuck detection threshold in ticks
    pub fn with_stuck_threshold(mut self, ticks: u32) -> Self {
        self.stuck_threshold = ticks;
        self
    }

    /// Set escape duration in ticks
    pub fn with_escape_duration(mut self, ticks: u32) -> Self {
        self.escape_duration = ticks;
        self
    }

    /// Set the no-progress threshold in ticks
    pub fn with_no_progress_threshold(mut self, ticks: u32) -> Self {
        self.no_progress_threshold = ticks;
        self
    }

    /// Set the waypoint arrival radius
    pub fn with_arrival_radius(mut self, radius: f32) -> Self {
        self.arrival_radius = radius;
        self
    }

    /// Check that every field is in range
    pub fn validate(&self) -> Result<()> {
        non_negative("stuck_distance", self.stuck_distance)?;
        if self.stuck_threshold == 0 {
            return Err(SteeringError::invalid("stuck_threshold", "must be at least 1"));
        }
        if self.escape_duration == 0 {
            return Err(SteeringError::invalid("escape_duration", "must be at least 1"));
        }
        positive("escape_distance", self.escape_distance)?;
        non_negative("progress_epsilon", self.progress_epsilon)?;
        if self.no_progress_threshold == 0 {
            return Err(SteeringError::invalid("no_progress_threshold", "must be at least 1"));
        }
        positive("arrival_radius", self.arrival_radius)?;
        positive("waypoint_step", self.waypoint_step)?;
        if self.max_waypoints == 0 {
            return Err(SteeringError::invalid("max_waypoints", "must be at least 1"));
        }
        positive("fallback_waypoint_distance", self.fallback_waypoint_distance)?;
        non_negative("bounds_margin", self.bounds_margin)?;
        Ok(())
    }
}

/// Complete pathfinder configuration, as stored in enemy content files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    pub steering: SteeringConfig,
    pub detour: DetourConfig,
}

impl PathfinderConfig {
    /// Validate both sections
    pub fn validate(&self) -> Result<()> {
        self.steering.validate()?;
        self.detour.validate()
    }
}

fn positive(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SteeringError::invalid(field, format!("must be positive, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SteeringError::invalid(field, format!("must be non-negative, got {}", value)))
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(SteeringError::invalid(field, format!("must be within (0, 1], got {}", value)))
    }
}
