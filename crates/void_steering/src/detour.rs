//! Stuck detection and detour recovery
//!
//! [`DetourController`] wraps a [`SteeringCore`] and watches the agent over
//! time. Two failure modes are handled:
//!
//! - **Stuck**: the agent barely moves for several ticks (pinned in a concave
//!   corner). It commits to an escape heading for a fixed number of ticks.
//! - **No progress**: the agent moves but its distance to the target does not
//!   shrink (sliding along a long wall). A short chain of waypoints leading
//!   around the obstacle is generated and followed before seeking resumes.

use std::sync::Arc;

use void_math::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use void_math::{normalize_angle, Rect, Vec2};

use crate::config::{DetourConfig, PathfinderConfig, SteeringConfig};
use crate::error::Result;
use crate::obstacle::{Obstacle, ObstacleQuery, ObstacleSource};
use crate::steering::{SteeringCore, SteeringOutput};

/// Offsets from the target bearing tried, in order, when picking an escape heading
const ESCAPE_OFFSETS: [f32; 8] = [
    0.0,
    FRAC_PI_4,
    -FRAC_PI_4,
    FRAC_PI_2,
    -FRAC_PI_2,
    3.0 * FRAC_PI_4,
    -3.0 * FRAC_PI_4,
    PI,
];

/// What the controller is doing this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetourPhase {
    /// Steering straight for the target
    Seeking,
    /// Steering through a detour waypoint chain
    FollowingWaypoints,
    /// Holding a committed escape heading
    Escaping,
}

/// Ordered detour waypoints with a cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaypointQueue {
    waypoints: Vec<Vec2>,
    current_index: usize,
}

impl WaypointQueue {
    /// Create a queue starting at the first waypoint
    pub fn new(waypoints: Vec<Vec2>) -> Self {
        Self {
            waypoints,
            current_index: 0,
        }
    }

    /// Check if the queue holds no waypoints at all
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Check if every waypoint has been reached
    pub fn is_complete(&self) -> bool {
        self.current_index >= self.waypoints.len()
    }

    /// Waypoints remain to be visited
    pub fn is_active(&self) -> bool {
        !self.is_complete()
    }

    /// Waypoint currently steered toward
    pub fn current(&self) -> Option<Vec2> {
        self.waypoints.get(self.current_index).copied()
    }

    /// Waypoints not yet reached, current first
    pub fn remaining(&self) -> &[Vec2] {
        self.waypoints.get(self.current_index..).unwrap_or(&[])
    }

    /// Move on to the next waypoint
    pub fn advance(&mut self) {
        if self.current_index < self.waypoints.len() {
            self.current_index += 1;
        }
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.current_index = 0;
    }
}

/// A committed escape heading and how long it has been held
#[derive(Debug, Clone, Copy, PartialEq)]
struct EscapeManeuver {
    heading: f32,
    frames: u32,
}

/// Per-agent temporal state of a [`DetourController`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetourState {
    last_position: Option<Vec2>,
    stuck_frames: u32,
    last_distance_to_target: Option<f32>,
    no_progress_frames: u32,
    escape: Option<EscapeManeuver>,
    waypoints: WaypointQueue,
}

impl DetourState {
    /// Consecutive ticks with almost no displacement
    pub fn stuck_frames(&self) -> u32 {
        self.stuck_frames
    }

    /// Consecutive ticks without getting closer to the target
    pub fn no_progress_frames(&self) -> u32 {
        self.no_progress_frames
    }

    pub fn is_escaping(&self) -> bool {
        self.escape.is_some()
    }

    /// Heading of the active escape, if any
    pub fn escape_heading(&self) -> Option<f32> {
        self.escape.map(|e| e.heading)
    }

    /// Ticks the active escape has been held after the one that started it
    pub fn escape_frames(&self) -> Option<u32> {
        self.escape.map(|e| e.frames)
    }

    pub fn waypoints(&self) -> &WaypointQueue {
        &self.waypoints
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Context steering with stuck escape and waypoint detours, one per agent
#[derive(Debug, Clone)]
pub struct DetourController {
    steering: SteeringCore,
    config: DetourConfig,
    state: DetourState,
}

impl Default for DetourController {
    fn default() -> Self {
        Self {
            steering: SteeringCore::default(),
            config: DetourConfig::default(),
            state: DetourState::default(),
        }
    }
}

impl DetourController {
    /// Create a controller, rejecting out-of-range configuration
    pub fn new(steering: SteeringConfig, detour: DetourConfig) -> Result<Self> {
        let steering = SteeringCore::new(steering)?;
        Self::with_steering(steering, detour)
    }

    /// Create a controller from a combined configuration
    pub fn from_config(config: PathfinderConfig) -> Result<Self> {
        Self::new(config.steering, config.detour)
    }

    /// Wrap an existing steering core
    pub fn with_steering(steering: SteeringCore, config: DetourConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            log::warn!("Rejected detour configuration: {}", e);
            return Err(e);
        }
        Ok(Self {
            steering,
            config,
            state: DetourState::default(),
        })
    }

    /// Attach or replace the obstacle source used by [`compute_velocity`](Self::compute_velocity)
    pub fn set_obstacle_source(&mut self, source: Arc<dyn ObstacleSource>) {
        self.steering.set_obstacle_source(source);
    }

    /// Detach the obstacle source; the controller then sees an empty world
    pub fn clear_obstacle_source(&mut self) {
        self.steering.clear_obstacle_source();
    }

    /// Forget all temporal state, including the wrapped core's heading
    pub fn reset(&mut self) {
        self.steering.reset();
        self.state.reset();
    }

    pub fn steering(&self) -> &SteeringCore {
        &self.steering
    }

    pub fn config(&self) -> &DetourConfig {
        &self.config
    }

    pub fn state(&self) -> &DetourState {
        &self.state
    }

    /// Smoothed heading of the wrapped core
    pub fn heading(&self) -> f32 {
        self.steering.heading()
    }

    pub fn is_escaping(&self) -> bool {
        self.state.is_escaping()
    }

    pub fn escape_heading(&self) -> Option<f32> {
        self.state.escape_heading()
    }

    /// Detour waypoints still to be visited, current first
    pub fn waypoints(&self) -> &[Vec2] {
        self.state.waypoints.remaining()
    }

    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.state.waypoints.current()
    }

    pub fn phase(&self) -> DetourPhase {
        if self.state.escape.is_some() {
            DetourPhase::Escaping
        } else if self.state.waypoints.is_active() {
            DetourPhase::FollowingWaypoints
        } else {
            DetourPhase::Seeking
        }
    }

    /// Steer against the attached obstacle source (or an empty world)
    pub fn compute_velocity(
        &mut self,
        from: Vec2,
        target: Vec2,
        speed: f32,
        bounds: &Rect,
    ) -> SteeringOutput {
        match self.steering.obstacle_source() {
            Some(source) => {
                let obstacles = source.obstacles();
                self.compute_velocity_with(&obstacles, from, target, speed, bounds)
            }
            None => self.compute_velocity_with(&[], from, target, speed, bounds),
        }
    }

    /// Steer against an explicit obstacle set inside `bounds`
    pub fn compute_velocity_with(
        &mut self,
        obstacles: &[Obstacle],
        from: Vec2,
        target: Vec2,
        speed: f32,
        bounds: &Rect,
    ) -> SteeringOutput {
        let speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };

        if !from.is_finite() || !target.is_finite() {
            log::debug!("Non-finite detour input from {:?} to {:?}", from, target);
            return SteeringOutput::zero();
        }

        // Committed escape
        if let Some(escape) = self.state.escape.as_mut() {
            escape.frames += 1;
            if escape.frames < self.config.escape_duration {
                return SteeringOutput::along(escape.heading, speed, false);
            }
            log::debug!("Escape finished after {} ticks", escape.frames);
            self.state.escape = None;
        }

        let distance = from.distance(target);

        // Stuck detection
        if let Some(last) = self.state.last_position {
            if from.distance(last) < self.config.stuck_distance {
                self.state.stuck_frames += 1;
            } else {
                self.state.stuck_frames = 0;
            }
        }
        self.state.last_position = Some(from);

        if self.state.stuck_frames > self.config.stuck_threshold {
            self.state.stuck_frames = 0;
            self.state.last_distance_to_target = Some(distance);
            self.state.waypoints.clear();

            let heading = self.select_escape_heading(obstacles, from, target, bounds);
            log::debug!(
                "Stuck at {:?}, escaping along {:.1} degrees",
                from,
                void_math::degrees(heading)
            );
            self.state.escape = Some(EscapeManeuver { heading, frames: 0 });
            return SteeringOutput::along(heading, speed, false);
        }

        // Progress tracking
        if let Some(last) = self.state.last_distance_to_target {
            if distance >= last - self.config.progress_epsilon {
                self.state.no_progress_frames += 1;
            } else {
                self.state.no_progress_frames = 0;
                if self.state.waypoints.is_active()
                    && self.steering.has_direct_path(obstacles, from, target)
                {
                    log::debug!("Target visible again, dropping detour");
                    self.state.waypoints.clear();
                }
            }
        }
        self.state.last_distance_to_target = Some(distance);

        // Detour generation
        if self.state.no_progress_frames > self.config.no_progress_threshold
            && !self.state.waypoints.is_active()
        {
            self.state.no_progress_frames = 0;
            let detour = self.generate_detour(obstacles, from, target, bounds);
            if detour.is_empty() {
                log::debug!("No detour available around {:?}", from);
            } else {
                log::debug!("Detour with {} waypoints: {:?}", detour.len(), detour);
                self.state.waypoints = WaypointQueue::new(detour);
            }
        }

        // Waypoint following
        if let Some(waypoint) = self.state.waypoints.current() {
            if from.distance(waypoint) < self.config.arrival_radius {
                self.state.waypoints.advance();
                if self.state.waypoints.is_complete() {
                    log::debug!("Detour complete");
                    self.state.waypoints.clear();
                }
            }
            if let Some(waypoint) = self.state.waypoints.current() {
                return self.steering.compute_velocity_with(obstacles, from, waypoint, speed);
            }
        }

        self.steering.compute_velocity_with(obstacles, from, target, speed)
    }

    /// Generated points must stay `bounds_margin` inside the world.
    /// Rooms too small for the margin use the raw bounds; malformed bounds accept everything.
    fn within_bounds(&self, bounds: &Rect, point: Vec2) -> bool {
        if !bounds.is_valid() {
            return true;
        }
        let inner = bounds.shrink(self.config.bounds_margin);
        if inner.is_valid() {
            inner.contains_point(point)
        } else {
            bounds.contains_point(point)
        }
    }

    /// First candidate heading whose projection stays in bounds with a clear segment
    fn select_escape_heading(
        &self,
        obstacles: &[Obstacle],
        from: Vec2,
        target: Vec2,
        bounds: &Rect,
    ) -> f32 {
        let bearing = normalize_angle(from.angle_to(target));
        let query = self.steering.query(obstacles);

        for offset in ESCAPE_OFFSETS {
            let heading = normalize_angle(bearing + offset);
            let landing = from + Vec2::from_angle(heading) * self.config.escape_distance;
            let clear = !query.is_segment_blocked_leaving(from, landing);
            if clear && self.within_bounds(bounds, landing) {
                return heading;
            }
        }

        log::warn!("No clear escape direction at {:?}, turning left", from);
        normalize_angle(bearing - FRAC_PI_2)
    }

    /// Waypoints around whatever sits between `from` and `target`
    fn generate_detour(
        &self,
        obstacles: &[Obstacle],
        from: Vec2,
        target: Vec2,
        bounds: &Rect,
    ) -> Vec<Vec2> {
        let bearing = normalize_angle(from.angle_to(target));
        let query = self.steering.query(obstacles);

        let left_angle = normalize_angle(bearing - FRAC_PI_2);
        let right_angle = normalize_angle(bearing + FRAC_PI_2);
        let left = self.chain_waypoints(&query, from, target, bounds, left_angle);
        let right = self.chain_waypoints(&query, from, target, bounds, right_angle);

        match (left.is_empty(), right.is_empty()) {
            (false, false) if right.len() < left.len() => right,
            (false, _) => left,
            (true, false) => right,
            (true, true) => {
                log::warn!("Both detour sides blocked at {:?}, trying one waypoint", from);
                self.fallback_waypoint(&query, from, bearing, bounds)
                    .into_iter()
                    .collect()
            }
        }
    }

    /// Step sideways along `angle` until the target becomes visible or a step is blocked
    fn chain_waypoints(
        &self,
        query: &ObstacleQuery<'_>,
        from: Vec2,
        target: Vec2,
        bounds: &Rect,
        angle: f32,
    ) -> Vec<Vec2> {
        let step = Vec2::from_angle(angle) * self.config.waypoint_step;
        let mut points = Vec::with_capacity(self.config.max_waypoints);
        let mut previous = from;

        while points.len() < self.config.max_waypoints {
            let next = previous + step;
            if !self.within_bounds(bounds, next)
                || query.is_point_blocked(next)
                || query.is_segment_blocked_leaving(previous, next)
            {
                break;
            }
            points.push(next);
            if !query.is_segment_blocked(next, target) {
                break;
            }
            previous = next;
        }

        points
    }

    /// One waypoint along the first usable diagonal, perpendicular or reverse heading
    fn fallback_waypoint(
        &self,
        query: &ObstacleQuery<'_>,
        from: Vec2,
        bearing: f32,
        bounds: &Rect,
    ) -> Option<Vec2> {
        let distance = self.config.fallback_waypoint_distance;
        ESCAPE_OFFSETS[1..].iter().find_map(|&offset| {
            let heading = normalize_angle(bearing + offset);
            let point = from + Vec2::from_angle(heading) * distance;
            let usable = self.within_bounds(bounds, point)
                && !query.is_point_blocked(point)
                && !query.is_segment_blocked_leaving(from, point);
            usable.then_some(point)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn world() -> Rect {
        Rect::from_edges(-500.0, 500.0, -500.0, 500.0)
    }

    fn controller(detour: DetourConfig) -> DetourController {
        DetourController::new(SteeringConfig::default(), detour).unwrap()
    }

    #[test]
    fn test_waypoint_queue() {
        let mut queue = WaypointQueue::new(vec![
            Vec2::new(0.0, -60.0),
            Vec2::new(0.0, -120.0),
            Vec2::new(60.0, -120.0),
        ]);

        assert!(queue.is_active());
        assert_eq!(queue.current(), Some(Vec2::new(0.0, -60.0)));
        assert_eq!(queue.remaining().last(), Some(&Vec2::new(60.0, -120.0)));

        queue.advance();
        assert_eq!(queue.remaining().len(), 2);
        queue.advance();
        queue.advance();
        queue.advance();
        assert!(queue.is_complete());
        assert!(queue.remaining().is_empty());
        assert_eq!(queue.current(), None);

        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.is_active());
    }

    #[test]
    fn test_within_bounds_margin() {
        let detour = DetourController::default();
        let bounds = Rect::from_edges(0.0, 200.0, 0.0, 200.0);
        assert!(detour.within_bounds(&bounds, Vec2::new(100.0, 100.0)));
        assert!(detour.within_bounds(&bounds, Vec2::new(20.0, 180.0)));
        assert!(!detour.within_bounds(&bounds, Vec2::new(10.0, 100.0)));
        assert!(!detour.within_bounds(&bounds, Vec2::new(100.0, 250.0)));
    }

    #[test]
    fn test_within_bounds_degenerate() {
        let detour = DetourController::default();

        // Narrower than twice the margin: raw bounds apply
        let corridor = Rect::from_edges(0.0, 30.0, 0.0, 500.0);
        assert!(detour.within_bounds(&corridor, Vec2::new(5.0, 5.0)));
        assert!(!detour.within_bounds(&corridor, Vec2::new(-5.0, 5.0)));

        // Malformed bounds never reject a point
        let broken = Rect::new(Vec2::new(10.0, 10.0), Vec2::new(f32::NAN, 0.0));
        assert!(detour.within_bounds(&broken, Vec2::new(1.0e6, -1.0e6)));
    }

    #[test]
    fn test_escape_prefers_target_bearing() {
        let detour = DetourController::default();
        let target = Vec2::new(0.0, 200.0);
        let heading = detour.select_escape_heading(&[], Vec2::ZERO, target, &world());
        assert_abs_diff_eq!(heading, FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_escape_skips_blocked_candidates() {
        let detour = DetourController::default();
        // Wall directly ahead and across both diagonals
        let obstacles = vec![Obstacle::new(30.0, 0.0, 20.0, 200.0)];
        let target = Vec2::new(300.0, 0.0);
        let heading = detour.select_escape_heading(&obstacles, Vec2::ZERO, target, &world());
        assert_abs_diff_eq!(heading, FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_escape_respects_bounds() {
        let detour = DetourController::default();
        let bounds = Rect::from_edges(-500.0, 500.0, -500.0, 60.0);
        let obstacles = vec![Obstacle::new(30.0, 0.0, 20.0, 200.0)];
        let target = Vec2::new(300.0, 0.0);
        // Down (+y) would leave the room, so the search moves on to the next candidate
        let heading = detour.select_escape_heading(&obstacles, Vec2::ZERO, target, &bounds);
        assert_abs_diff_eq!(heading, -FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_escape_fallback_turns_left() {
        let detour = DetourController::default();
        // Agent buried in a huge block: every escape segment starts and ends inside the bare rect
        let obstacles = vec![Obstacle::new(0.0, 0.0, 400.0, 400.0)];
        let target = Vec2::new(100.0, 0.0);
        let heading = detour.select_escape_heading(&obstacles, Vec2::ZERO, target, &world());
        assert_abs_diff_eq!(heading, -FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_detour_chains_around_wall() {
        let detour = DetourController::default();
        let obstacles = vec![Obstacle::new(100.0, 0.0, 20.0, 60.0)];
        let target = Vec2::new(200.0, 0.0);
        let waypoints = detour.generate_detour(&obstacles, Vec2::ZERO, target, &world());

        assert_eq!(waypoints.len(), 3);
        assert_abs_diff_eq!(waypoints[0].x, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(waypoints[0].y, -60.0, epsilon = 1e-3);
        assert_abs_diff_eq!(waypoints[2].y, -180.0, epsilon = 1e-3);
    }

    #[test]
    fn test_detour_prefers_shorter_side() {
        let detour = DetourController::default();
        // Wall reaches far above the agent but only a little below it
        let obstacles = vec![Obstacle::new(100.0, -110.0, 20.0, 240.0)];
        let target = Vec2::new(200.0, 0.0);
        let waypoints = detour.generate_detour(&obstacles, Vec2::ZERO, target, &world());

        assert_eq!(waypoints.len(), 2);
        assert!(waypoints.iter().all(|p| p.y > 0.0));
    }

    #[test]
    fn test_detour_stops_at_bounds() {
        let detour = DetourController::default();
        let obstacles = vec![Obstacle::new(100.0, 0.0, 20.0, 60.0)];
        // No room for a step on the left side
        let bounds = Rect::from_edges(-500.0, 500.0, -50.0, 500.0);
        let target = Vec2::new(200.0, 0.0);
        let waypoints = detour.generate_detour(&obstacles, Vec2::ZERO, target, &bounds);

        assert!(!waypoints.is_empty());
        assert!(waypoints.iter().all(|p| p.y > 0.0));
    }

    #[test]
    fn test_detour_fallback_single_waypoint() {
        let detour = DetourController::default();
        // Both perpendiculars run straight into walls
        let obstacles = vec![
            Obstacle::new(0.0, -60.0, 300.0, 20.0),
            Obstacle::new(0.0, 60.0, 300.0, 20.0),
            Obstacle::new(100.0, 0.0, 20.0, 100.0),
        ];
        let target = Vec2::new(200.0, 0.0);
        let waypoints = detour.generate_detour(&obstacles, Vec2::ZERO, target, &world());

        assert_eq!(waypoints.len(), 1);
        assert_abs_diff_eq!(waypoints[0].x, -70.0, epsilon = 1e-3);
        assert_abs_diff_eq!(waypoints[0].y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_detour_kept_while_target_hugs_wall() {
        let obstacles = vec![Obstacle::new(100.0, 0.0, 40.0, 200.0)];
        let from = Vec2::new(0.0, 110.0);
        let bounds = world();

        let mut detour = DetourController::default();
        detour.state.waypoints = WaypointQueue::new(vec![Vec2::new(0.0, 200.0)]);
        detour.state.last_distance_to_target = Some(400.0);
        // Progress tick, but the target stands inside the wall's padding
        detour.compute_velocity_with(&obstacles, from, Vec2::new(130.0, 110.0), 100.0, &bounds);
        assert_eq!(detour.phase(), DetourPhase::FollowingWaypoints);

        detour.state.last_distance_to_target = Some(400.0);
        detour.compute_velocity_with(&obstacles, from, Vec2::new(0.0, 300.0), 100.0, &bounds);
        assert_eq!(detour.phase(), DetourPhase::Seeking);
    }

    #[test]
    fn test_escape_lasts_configured_ticks() {
        let config = DetourConfig::default()
            .with_stuck_threshold(2)
            .with_escape_duration(5);
        let mut detour = controller(config);
        let target = Vec2::new(100.0, 0.0);
        let bounds = world();

        let mut phases = Vec::new();
        for _ in 0..10 {
            phases.push(detour.phase());
            detour.compute_velocity_with(&[], Vec2::ZERO, target, 100.0, &bounds);
        }
        phases.push(detour.phase());

        // Tick 0 records the baseline, ticks 1..=3 count stuck, tick 3 commits
        let escaping: Vec<usize> = phases
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == DetourPhase::Escaping)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(escaping.first(), Some(&4));
        assert_eq!(escaping.len(), 5);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut detour = controller(DetourConfig::default().with_stuck_threshold(1));
        let bounds = world();
        for _ in 0..4 {
            detour.compute_velocity_with(&[], Vec2::ZERO, Vec2::new(100.0, 0.0), 100.0, &bounds);
        }
        assert!(detour.is_escaping());

        detour.reset();
        assert!(!detour.is_escaping());
        assert_eq!(detour.phase(), DetourPhase::Seeking);
        assert_eq!(detour.state(), &DetourState::default());
        assert!(!detour.steering().state().is_initialized());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let detour = DetourConfig::default().with_escape_duration(0);
        let result = DetourController::new(SteeringConfig::default(), detour);
        assert!(result.is_err());
        let steering = SteeringConfig::default().with_ray_count(1);
        let result = DetourController::new(steering, DetourConfig::default());
        assert!(result.is_err());
    }
}
