//! Alert-level state machine.
//!
//! Decides the proximity level shown to the user and when the step index
//! advances. Uses time-to-maneuver and heading alignment rather than distance
//! alone: distance-only cues fire too early on long straight approaches and too
//! late on sharp turns.
//!
//! # State Machine
//!
//! ```text
//! None ──first fix──► Depart
//!   outside zone: ──t ≤ high interval──► High ──t ≤ medium interval──► Medium
//!   inside zone:  ──aligned & not receding──► advance step, Medium | Low
//!                 ──upcoming is arrive──► Arrive (terminal for the leg)
//! ```
//!
//! A new level is only accepted if it outranks the current one or the step
//! advances, so a single noisy sample can never downgrade the level mid-step.

use tracing::debug;

use crate::geometry;
use crate::progress::{AlertLevel, RouteProgress};
use crate::route::{ManeuverType, Step, TravelProfile};

use super::config::{AlertThresholds, NavigationConfig};
use super::fix::Fix;

/// Result of one alert-machine evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertUpdate {
    /// Level before the evaluation.
    pub previous_level: AlertLevel,
    /// Level after the evaluation.
    pub level: AlertLevel,
    /// Whether the step index moved forward.
    pub step_advanced: bool,
    /// Distance from the fix to the end of the (possibly new) current step.
    pub distance_to_maneuver: f64,
}

impl AlertUpdate {
    /// Whether subscribers should hear about an alert-level change.
    pub fn is_change(&self) -> bool {
        self.step_advanced || self.level != self.previous_level
    }

    /// Whether this evaluation reached the arrive level.
    pub fn arrived(&self) -> bool {
        self.level == AlertLevel::Arrive && self.previous_level != AlertLevel::Arrive
    }
}

/// Computes alert levels and step advancement.
#[derive(Debug, Clone)]
pub struct AlertMachine {
    maneuver_zone_radius: f64,
    turn_completion_tolerance: f64,
    small_turn_threshold: f64,
    high_alert_interval: f64,
    medium_alert_interval: f64,
    thresholds: AlertThresholds,
}

impl AlertMachine {
    pub fn new(config: &NavigationConfig, profile: TravelProfile) -> Self {
        Self {
            maneuver_zone_radius: config.maneuver_zone_radius,
            turn_completion_tolerance: config.turn_completion_tolerance,
            small_turn_threshold: config.small_turn_threshold,
            high_alert_interval: config.high_alert_interval.as_secs_f64(),
            medium_alert_interval: config.medium_alert_interval.as_secs_f64(),
            thresholds: AlertThresholds::for_profile(profile),
        }
    }

    /// Switch the profile-dependent minimum distances.
    pub fn set_profile(&mut self, profile: TravelProfile) {
        self.thresholds = AlertThresholds::for_profile(profile);
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.thresholds
    }

    /// Whether the user's course confirms they have completed `maneuver`.
    ///
    /// Near-straight maneuvers cannot be confirmed by heading, so they count as
    /// completed only once the user reaches the maneuver point.
    pub fn is_heading_aligned(&self, fix: &Fix, maneuver: &Step, distance_to_maneuver: f64) -> bool {
        if maneuver.turning_angle() < self.small_turn_threshold {
            return distance_to_maneuver <= 0.0;
        }

        fix.valid_course().map_or(false, |course| {
            geometry::bearing_difference(course, maneuver.final_heading)
                <= self.turn_completion_tolerance
        })
    }

    /// Evaluate `fix` and apply any accepted change to `progress`.
    ///
    /// Returns `None` when the fix cannot be snapped to the current step.
    pub fn update(&self, fix: &Fix, progress: &mut RouteProgress) -> Option<AlertUpdate> {
        self.evaluate(fix, progress, true)
    }

    fn evaluate(
        &self,
        fix: &Fix,
        progress: &mut RouteProgress,
        allow_advance: bool,
    ) -> Option<AlertUpdate> {
        let step = progress.current_step();
        let distance_to_maneuver = geometry::distance_along(&step.coordinates, fix.coordinate)?;
        let previous_level = progress.alert_level();

        if previous_level.is_terminal() {
            progress.record_step_position(distance_to_maneuver);
            return Some(AlertUpdate {
                previous_level,
                level: previous_level,
                step_advanced: false,
                distance_to_maneuver,
            });
        }

        let last_distance = progress.current_step_progress().user_distance_to_maneuver();
        let mut level = previous_level;
        let mut advance = false;

        if distance_to_maneuver <= self.maneuver_zone_radius {
            match progress.upcoming_step() {
                Some(upcoming) if upcoming.maneuver_type == ManeuverType::Arrive => {
                    level = AlertLevel::Arrive;
                }
                Some(_) if !allow_advance => {}
                Some(upcoming) => {
                    let not_receding = last_distance.map_or(true, |last| distance_to_maneuver <= last);
                    if not_receding && self.is_heading_aligned(fix, upcoming, distance_to_maneuver) {
                        advance = true;
                        level = if upcoming.expected_travel_time <= self.medium_alert_interval {
                            AlertLevel::Medium
                        } else {
                            AlertLevel::Low
                        };
                    }
                }
                None if step.maneuver_type == ManeuverType::Arrive => {
                    level = AlertLevel::Arrive;
                }
                None => {}
            }
        } else if !fix.is_stationary() {
            let seconds = distance_to_maneuver / fix.effective_speed();
            if seconds <= self.high_alert_interval
                && step.distance > self.thresholds.high_min_distance
            {
                level = AlertLevel::High;
            } else if seconds <= self.medium_alert_interval
                && step.distance > self.thresholds.medium_min_distance
            {
                level = AlertLevel::Medium;
            }
        }

        if previous_level == AlertLevel::None && !advance {
            level = level.max(AlertLevel::Depart);
        }

        if advance {
            progress.advance_step();
            progress.set_alert_level(level);
            let new_distance = geometry::distance_along(&progress.current_step().coordinates, fix.coordinate)
                .unwrap_or(progress.current_step().distance);
            progress.record_step_position(new_distance);
            debug!(
                step_index = progress.step_index(),
                alert_level = %level,
                "Maneuver completed, step advanced"
            );
            return Some(AlertUpdate {
                previous_level,
                level,
                step_advanced: true,
                distance_to_maneuver: new_distance,
            });
        }

        progress.record_step_position(distance_to_maneuver);
        let level = if level > previous_level {
            progress.set_alert_level(level);
            level
        } else {
            previous_level
        };

        Some(AlertUpdate {
            previous_level,
            level,
            step_advanced: false,
            distance_to_maneuver,
        })
    }

    /// Move to the upcoming step at `level`, then evaluate `fix` for its level.
    ///
    /// Used when the off-route detector finds the user already on the upcoming
    /// step. The same fix never advances a second step. Returns `None` if there
    /// is no upcoming step.
    pub fn force_advance(
        &self,
        fix: &Fix,
        progress: &mut RouteProgress,
        level: AlertLevel,
    ) -> Option<AlertUpdate> {
        let previous_level = progress.alert_level();
        if !progress.advance_step() {
            return None;
        }
        progress.set_alert_level(level);

        let update = self.evaluate(fix, progress, false).unwrap_or(AlertUpdate {
            previous_level: level,
            level,
            step_advanced: false,
            distance_to_maneuver: progress.current_step().distance,
        });

        Some(AlertUpdate {
            previous_level,
            step_advanced: true,
            ..update
        })
    }
}
