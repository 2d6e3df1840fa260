//! Off-route detection.
//!
//! Classifies each fix as on the current step, already on the upcoming step, or
//! off the route entirely.
//!
//! # Decision
//!
//! ```text
//! look_ahead = project(fix, speed × dead_reckoning_interval, course)
//! radius     = max(max_distance_before_recalculating, accuracy + snapping_distance)
//!
//! fix or look_ahead within radius of current step  → OnRoute
//! look_ahead within radius of upcoming step        → AdvanceStep(medium | low)
//! otherwise                                        → OffRoute
//! ```
//!
//! On the depart step of a leg, off-route is held back while the user keeps
//! getting closer to the start. A noisy first fix therefore cannot trigger a
//! reroute on its own.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::geometry::{self, Coordinate};
use crate::progress::{AlertLevel, RouteProgress};
use crate::route::{ManeuverType, Step};

use super::config::NavigationConfig;
use super::fix::Fix;

/// Outcome of evaluating a fix against the route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OffRouteDecision {
    /// Within tolerance of the current step.
    OnRoute,
    /// The user has already turned onto the upcoming step.
    AdvanceStep { alert_level: AlertLevel },
    /// Outside every tolerance; a reroute is warranted.
    OffRoute,
}

/// Depart-step jitter guard.
#[derive(Debug, Clone, Default)]
struct DepartHysteresis {
    /// Distance to the route start at the previous fix.
    last_distance: Option<f64>,
    /// When the user last got closer to the route start.
    last_closer_at: Option<DateTime<Utc>>,
}

impl DepartHysteresis {
    /// Record a fix and report whether off-route should still be suppressed.
    fn observe(
        &mut self,
        distance_to_start: f64,
        timestamp: DateTime<Utc>,
        threshold: std::time::Duration,
    ) -> bool {
        let got_closer = self.last_distance.map_or(true, |last| distance_to_start < last);
        self.last_distance = Some(distance_to_start);
        if got_closer || self.last_closer_at.is_none() {
            self.last_closer_at = Some(timestamp);
        }

        let Some(since) = self.last_closer_at else {
            return true;
        };
        let elapsed = (timestamp - since).to_std().unwrap_or_default();
        elapsed <= threshold
    }
}

/// Decides whether a fix is on the route.
///
/// Stateless apart from the depart hysteresis counters.
#[derive(Debug, Clone)]
pub struct OffRouteDetector {
    max_distance_before_recalculating: f64,
    snapping_distance: f64,
    dead_reckoning_interval: f64,
    medium_alert_interval: f64,
    depart_hysteresis: std::time::Duration,
    hysteresis: DepartHysteresis,
}

impl OffRouteDetector {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            max_distance_before_recalculating: config.max_distance_before_recalculating,
            snapping_distance: config.snapping_distance,
            dead_reckoning_interval: config.dead_reckoning_interval.as_secs_f64(),
            medium_alert_interval: config.medium_alert_interval.as_secs_f64(),
            depart_hysteresis: config.depart_hysteresis,
            hysteresis: DepartHysteresis::default(),
        }
    }

    /// On-route tolerance for a fix with the given horizontal accuracy.
    pub fn radius(&self, horizontal_accuracy: f64) -> f64 {
        self.max_distance_before_recalculating
            .max(horizontal_accuracy + self.snapping_distance)
    }

    /// Where the user will be one dead-reckoning interval from now.
    ///
    /// Falls back to the fix itself when the course is unknown.
    pub fn look_ahead(&self, fix: &Fix) -> Coordinate {
        match fix.valid_course() {
            Some(course) => geometry::project(
                fix.coordinate,
                fix.effective_speed() * self.dead_reckoning_interval,
                course,
            ),
            None => fix.coordinate,
        }
    }

    /// Forget the depart hysteresis counters.
    pub fn reset(&mut self) {
        self.hysteresis = DepartHysteresis::default();
    }

    /// Classify `fix` against the current and upcoming steps.
    pub fn evaluate(&mut self, fix: &Fix, progress: &RouteProgress) -> OffRouteDecision {
        let radius = self.radius(fix.horizontal_accuracy);
        let look_ahead = self.look_ahead(fix);
        let current = progress.current_step();

        let suppress = if is_depart_step(progress) {
            let distance_to_start = geometry::distance(fix.coordinate, current.maneuver_location);
            self.hysteresis
                .observe(distance_to_start, fix.timestamp, self.depart_hysteresis)
        } else {
            false
        };

        if within(current, fix.coordinate, radius) || within(current, look_ahead, radius) {
            return OffRouteDecision::OnRoute;
        }

        if let Some(upcoming) = progress.upcoming_step() {
            if within(upcoming, look_ahead, radius) {
                let alert_level = self.level_for_upcoming(upcoming, look_ahead, fix);
                debug!(
                    step_index = progress.step_index(),
                    alert_level = %alert_level,
                    "Fix already on upcoming step"
                );
                return OffRouteDecision::AdvanceStep { alert_level };
            }
        }

        if suppress {
            debug!(
                radius = format!("{:.1}", radius),
                "Off-route suppressed by depart hysteresis"
            );
            return OffRouteDecision::OnRoute;
        }

        OffRouteDecision::OffRoute
    }

    /// Medium if the end of the upcoming step is within the medium interval.
    fn level_for_upcoming(&self, upcoming: &Step, look_ahead: Coordinate, fix: &Fix) -> AlertLevel {
        let remaining = geometry::distance_along(&upcoming.coordinates, look_ahead)
            .unwrap_or(upcoming.distance);
        let seconds = if fix.is_stationary() {
            let fraction = if upcoming.distance > 0.0 {
                (remaining / upcoming.distance).clamp(0.0, 1.0)
            } else {
                0.0
            };
            upcoming.expected_travel_time * fraction
        } else {
            remaining / fix.effective_speed()
        };

        if seconds <= self.medium_alert_interval {
            AlertLevel::Medium
        } else {
            AlertLevel::Low
        }
    }
}

/// First step of a leg with a depart maneuver.
fn is_depart_step(progress: &RouteProgress) -> bool {
    progress.step_index() == 0 && progress.current_step().maneuver_type == ManeuverType::Depart
}

fn within(step: &Step, point: Coordinate, radius: f64) -> bool {
    geometry::closest_point(&step.coordinates, point).map_or(false, |c| c.distance <= radius)
}
