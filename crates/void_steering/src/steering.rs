//! Context steering
//!
//! Each tick the agent samples a fixed fan of rays around itself. Every ray
//! gets an *interest* value (how well it points at the target) and a *danger*
//! value (how close along it the nearest padded obstacle sits). The best
//! scoring ray, biased toward the one chosen last tick, becomes the desired
//! heading, and the actual heading rotates toward it a fraction per tick.

use std::fmt;
use std::sync::Arc;

use void_math::consts::TAU;
use void_math::{angle_difference, lerp_angle, normalize_angle, Ray, Vec2};

use crate::config::SteeringConfig;
use crate::error::Result;
use crate::obstacle::{Obstacle, ObstacleQuery, ObstacleSource};

/// Rays within this many indices of the previous choice receive a momentum bonus
const MOMENTUM_SPREAD: usize = 2;

/// Danger above which a ray counts toward corner detection
const CORNER_DANGER: f32 = 0.5;

/// Interest and safety below which a cornered ray is penalized
const CORNER_LOW_INTEREST: f32 = 0.3;
const CORNER_LOW_SAFETY: f32 = 0.8;

/// Output of a steering computation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringOutput {
    /// Desired velocity (units per second)
    pub velocity: Vec2,
    /// Straight line to the target is free of padded obstacles
    pub has_direct_path: bool,
}

impl SteeringOutput {
    /// Zero output
    pub fn zero() -> Self {
        Self::default()
    }

    /// Velocity of magnitude `speed` along `heading`
    pub fn along(heading: f32, speed: f32, has_direct_path: bool) -> Self {
        Self {
            velocity: Vec2::from_angle(heading) * speed,
            has_direct_path,
        }
    }

    #[inline]
    pub fn vx(&self) -> f32 {
        self.velocity.x
    }

    #[inline]
    pub fn vy(&self) -> f32 {
        self.velocity.y
    }

    /// Get magnitude of the velocity
    pub fn magnitude(&self) -> f32 {
        self.velocity.length()
    }

    /// Both velocity components are finite
    pub fn is_finite(&self) -> bool {
        self.velocity.is_finite()
    }
}

/// Per-agent temporal state of a [`SteeringCore`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SteeringState {
    current_heading: f32,
    initialized: bool,
    last_chosen_ray: Option<usize>,
}

impl SteeringState {
    /// Smoothed movement angle, always in (-PI, PI]
    pub fn heading(&self) -> f32 {
        self.current_heading
    }

    /// Heading has been seeded from a target bearing
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Ray index chosen on the last ray-cast tick
    pub fn last_chosen_ray(&self) -> Option<usize> {
        self.last_chosen_ray
    }

    /// Forget heading and momentum
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Interest and danger maps from the last ray-cast tick, for debug overlays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextMap {
    /// Per-ray interest in [0, 1]
    pub interest: Vec<f32>,
    /// Per-ray danger in [0, 1]
    pub danger: Vec<f32>,
    /// Enough rays were dangerous to treat the spot as a corner
    pub in_corner: bool,
    /// Ray index that won the selection
    pub chosen: usize,
}

impl ContextMap {
    fn with_capacity(rays: usize) -> Self {
        Self {
            interest: Vec::with_capacity(rays),
            danger: Vec::with_capacity(rays),
            in_corner: false,
            chosen: 0,
        }
    }

    fn clear(&mut self) {
        self.interest.clear();
        self.danger.clear();
        self.in_corner = false;
        self.chosen = 0;
    }

    /// Number of rays whose danger exceeds `threshold`
    pub fn dangerous_rays(&self, threshold: f32) -> usize {
        self.danger.iter().filter(|&&d| d > threshold).count()
    }
}

/// Context-steering core, one per mobile agent
#[derive(Clone)]
pub struct SteeringCore {
    config: SteeringConfig,
    ray_angles: Vec<f32>,
    state: SteeringState,
    last_context: Option<ContextMap>,
    source: Option<Arc<dyn ObstacleSource>>,
}

impl fmt::Debug for SteeringCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SteeringCore")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("has_obstacle_source", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for SteeringCore {
    fn default() -> Self {
        Self::from_valid_config(SteeringConfig::default())
    }
}

impl SteeringCore {
    /// Create a steering core, rejecting out-of-range configuration
    pub fn new(config: SteeringConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            log::warn!("Rejected steering configuration: {}", e);
            return Err(e);
        }
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: SteeringConfig) -> Self {
        let step = TAU / config.ray_count as f32;
        let ray_angles = (0..config.ray_count)
            .map(|i| normalize_angle(i as f32 * step))
            .collect();

        Self {
            config,
            ray_angles,
            state: SteeringState::default(),
            last_context: None,
            source: None,
        }
    }

    /// Attach or replace the obstacle source used by [`compute_velocity`](Self::compute_velocity)
    pub fn set_obstacle_source(&mut self, source: Arc<dyn ObstacleSource>) {
        self.source = Some(source);
    }

    /// Detach the obstacle source; steering then sees an empty world
    pub fn clear_obstacle_source(&mut self) {
        self.source = None;
    }

    /// Currently attached obstacle source
    pub fn obstacle_source(&self) -> Option<Arc<dyn ObstacleSource>> {
        self.source.clone()
    }

    /// Forget heading, momentum and debug context. Call after a teleport or respawn.
    pub fn reset(&mut self) {
        self.state.reset();
        self.last_context = None;
    }

    pub fn config(&self) -> &SteeringConfig {
        &self.config
    }

    pub fn state(&self) -> &SteeringState {
        &self.state
    }

    /// Smoothed movement angle
    pub fn heading(&self) -> f32 {
        self.state.current_heading
    }

    /// Ray index chosen on the last ray-cast tick
    pub fn last_chosen_ray(&self) -> Option<usize> {
        self.state.last_chosen_ray
    }

    /// Interest/danger maps of the last tick, `None` if it took the fast path
    pub fn last_context(&self) -> Option<&ContextMap> {
        self.last_context.as_ref()
    }

    /// Angles of the fixed ray fan
    pub fn ray_angles(&self) -> &[f32] {
        &self.ray_angles
    }

    /// Blocking queries with this core's obstacle padding
    pub fn query<'a>(&self, obstacles: &'a [Obstacle]) -> ObstacleQuery<'a> {
        ObstacleQuery::new(obstacles, self.config.obstacle_padding)
    }

    /// Straight segment `from -> to` avoids every padded obstacle
    pub fn has_direct_path(&self, obstacles: &[Obstacle], from: Vec2, to: Vec2) -> bool {
        !self.query(obstacles).is_segment_blocked(from, to)
    }

    /// Point lies inside some padded obstacle
    pub fn is_point_blocked(&self, obstacles: &[Obstacle], point: Vec2) -> bool {
        self.query(obstacles).is_point_blocked(point)
    }

    /// Point lies within `near_distance` of some padded obstacle
    pub fn is_near_obstacle(&self, obstacles: &[Obstacle], point: Vec2) -> bool {
        self.query(obstacles).is_near(point, self.config.near_distance)
    }

    /// Steer against the attached obstacle source (or an empty world)
    pub fn compute_velocity(&mut self, from: Vec2, target: Vec2, speed: f32) -> SteeringOutput {
        match self.source.clone() {
            Some(source) => {
                let obstacles = source.obstacles();
                self.compute_velocity_with(&obstacles, from, target, speed)
            }
            None => self.compute_velocity_with(&[], from, target, speed),
        }
    }

    /// Steer against an explicit obstacle set
    pub fn compute_velocity_with(
        &mut self,
        obstacles: &[Obstacle],
        from: Vec2,
        target: Vec2,
        speed: f32,
    ) -> SteeringOutput {
        let speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };

        if !from.is_finite() || !target.is_finite() {
            log::debug!("Non-finite steering input from {:?} to {:?}", from, target);
            return SteeringOutput::zero();
        }

        let to_target = target - from;
        if to_target.length_squared() <= f32::EPSILON {
            return SteeringOutput {
                velocity: Vec2::ZERO,
                has_direct_path: true,
            };
        }

        let target_angle = normalize_angle(to_target.angle());
        if !self.state.initialized {
            self.state.current_heading = target_angle;
            self.state.initialized = true;
        }

        let query = self.query(obstacles);
        let has_direct_path = !query.is_segment_blocked(from, target);

        let near = query.is_near(from, self.config.near_distance);
        if query.is_empty() || (has_direct_path && !near) {
            self.last_context = None;
            self.rotate_toward(target_angle, self.config.smoothing);
            return SteeringOutput::along(self.state.current_heading, speed, has_direct_path);
        }

        let mut context = self
            .last_context
            .take()
            .unwrap_or_else(|| ContextMap::with_capacity(self.ray_angles.len()));
        self.cast_context(&query, from, target_angle, &mut context);

        let chosen = self.select_ray(&context);
        context.chosen = chosen;
        self.state.last_chosen_ray = Some(chosen);

        let rate = if context.in_corner {
            (self.config.smoothing * 2.0).min(1.0)
        } else {
            self.config.smoothing
        };
        self.rotate_toward(self.ray_angles[chosen], rate);
        self.last_context = Some(context);

        SteeringOutput::along(self.state.current_heading, speed, has_direct_path)
    }

    fn rotate_toward(&mut self, angle: f32, rate: f32) {
        self.state.current_heading = lerp_angle(self.state.current_heading, angle, rate);
    }

    /// Fill interest and danger for every ray
    fn cast_context(
        &self,
        query: &ObstacleQuery<'_>,
        from: Vec2,
        target_angle: f32,
        context: &mut ContextMap,
    ) {
        context.clear();
        let samples = self.config.ray_samples;

        for &angle in &self.ray_angles {
            let interest = angle_difference(angle, target_angle).cos() * 0.5 + 0.5;

            // Samples run near to far, so the first hit is the most dangerous one
            let ray = Ray::from_angle(from, angle);
            let danger = (1..=samples)
                .map(|k| k as f32 / samples as f32)
                .find(|&fraction| query.is_point_blocked(ray.at(self.config.ray_length * fraction)))
                .map_or(0.0, |fraction| 1.0 - 0.5 * fraction);

            context.interest.push(interest);
            context.danger.push(danger);
        }

        let dangerous = context.dangerous_rays(CORNER_DANGER) as f32;
        context.in_corner = dangerous >= self.config.corner_ratio * self.ray_angles.len() as f32;
    }

    /// Pick the best ray index for this tick
    fn select_ray(&self, context: &ContextMap) -> usize {
        let config = &self.config;
        let rays = self.ray_angles.len();
        let mut best: Option<(usize, f32)> = None;

        for i in 0..rays {
            let danger = context.danger[i];
            if danger >= config.danger_cutoff {
                continue;
            }

            let interest = context.interest[i];
            let safety = 1.0 - danger;
            let mut score = interest * config.seek_weight + safety * config.avoidance_weight;

            if let Some(last) = self.state.last_chosen_ray {
                let offset = circular_distance(i, last, rays);
                if offset <= MOMENTUM_SPREAD {
                    let closeness = 1.0 - offset as f32 / (MOMENTUM_SPREAD + 1) as f32;
                    let mut bonus = config.momentum_bonus * closeness;
                    if context.in_corner {
                        bonus *= config.corner_momentum_scale;
                    }
                    score += bonus;
                }
            }

            if context.in_corner && interest < CORNER_LOW_INTEREST && safety < CORNER_LOW_SAFETY {
                score *= 0.5;
            }

            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        match best {
            Some((i, _)) => i,
            None => least_dangerous_ray(context),
        }
    }
}

/// Distance between two indices on a ring of `len` slots
fn circular_distance(a: usize, b: usize, len: usize) -> usize {
    let d = if a > b { a - b } else { b - a };
    d.min(len - d)
}

/// Least dangerous ray, ties broken toward higher interest
fn least_dangerous_ray(context: &ContextMap) -> usize {
    let mut best = 0;
    for i in 1..context.danger.len() {
        let (danger, best_danger) = (context.danger[i], context.danger[best]);
        let more_interesting = context.interest[i] > context.interest[best];
        if danger < best_danger || (danger == best_danger && more_interesting) {
            best = i;
        }
    }
    best
}
