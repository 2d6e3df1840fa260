//! Navigation thresholds.
//!
//! Defaults describe a typical in-car session. Every value can be overridden
//! from the `[navigation]` and `[dead_reckoning]` sections of the config file.

use std::time::Duration;

use crate::route::TravelProfile;

use super::error::SessionError;

// ==================== Off-Route Defaults ====================

/// Default floor of the on-route radius in meters.
pub const DEFAULT_MAX_DISTANCE_BEFORE_RECALCULATING_M: f64 = 50.0;

/// Default snapping slack added to horizontal accuracy in meters.
pub const DEFAULT_SNAPPING_DISTANCE_M: f64 = 15.0;

/// Default time without getting closer to the route start before off-route may
/// fire on a depart step.
pub const DEFAULT_DEPART_HYSTERESIS_SECS: u64 = 3;

// ==================== Alert Defaults ====================

/// Default radius around a maneuver inside which turn completion is evaluated.
pub const DEFAULT_MANEUVER_ZONE_RADIUS_M: f64 = 40.0;

/// Default tolerance between course and the post-maneuver heading.
pub const DEFAULT_TURN_COMPLETION_TOLERANCE_DEG: f64 = 30.0;

/// Turns below this angle are confirmed by reaching the maneuver, not by heading.
pub const DEFAULT_SMALL_TURN_THRESHOLD_DEG: f64 = 20.0;

/// Default time-to-maneuver for the high alert.
pub const DEFAULT_HIGH_ALERT_INTERVAL_SECS: u64 = 15;

/// Default time-to-maneuver for the medium alert.
pub const DEFAULT_MEDIUM_ALERT_INTERVAL_SECS: u64 = 70;

// ==================== Reroute Defaults ====================

/// A rerouted first step longer than this starts at the depart level.
pub const DEFAULT_LONG_FIRST_STEP_M: f64 = 1000.0;

/// Heading accuracy attached to reroute requests in degrees.
pub const REROUTE_HEADING_ACCURACY_DEG: f64 = 90.0;

// ==================== Dead Reckoning Defaults ====================

/// Default look-ahead and extrapolation step.
pub const DEFAULT_DEAD_RECKONING_INTERVAL_MS: u64 = 1000;

/// Default silence after which a fix is synthesized.
pub const DEFAULT_EXTRAPOLATION_DELAY_MS: u64 = 1100;

/// Speeds at or below this are treated as stationary (m/s).
pub const STATIONARY_SPEED_MPS: f64 = 0.1;

// ==================== Session Defaults ====================

/// Default number of recent fixes kept for diagnostics.
pub const DEFAULT_RECENT_FIX_CAPACITY: usize = 20;

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default capacity of the session command channel.
pub const DEFAULT_COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Minimum step lengths for the distance-gated alert levels.
///
/// A highway approach needs an earlier cue than a footpath, so these scale with
/// the travel profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Step must be longer than this for a high alert.
    pub high_min_distance: f64,
    /// Step must be longer than this for a medium alert.
    pub medium_min_distance: f64,
}

impl AlertThresholds {
    pub fn for_profile(profile: TravelProfile) -> Self {
        match profile {
            TravelProfile::Driving | TravelProfile::DrivingTraffic => Self {
                high_min_distance: 100.0,
                medium_min_distance: 400.0,
            },
            TravelProfile::Cycling => Self {
                high_min_distance: 20.0,
                medium_min_distance: 100.0,
            },
            TravelProfile::Walking => Self {
                high_min_distance: 10.0,
                medium_min_distance: 50.0,
            },
        }
    }
}

/// Thresholds for the navigation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationConfig {
    /// Floor of the on-route radius and minimum spacing between reroutes (m).
    pub max_distance_before_recalculating: f64,
    /// Added to horizontal accuracy to form the on-route radius (m).
    pub snapping_distance: f64,
    /// Depart-step off-route suppression window.
    pub depart_hysteresis: Duration,
    /// Maneuver zone radius (m).
    pub maneuver_zone_radius: f64,
    /// Course vs post-maneuver heading tolerance (degrees).
    pub turn_completion_tolerance: f64,
    /// Turning angle below which heading is not used for alignment (degrees).
    pub small_turn_threshold: f64,
    /// Time-to-maneuver for the high alert.
    pub high_alert_interval: Duration,
    /// Time-to-maneuver for the medium alert.
    pub medium_alert_interval: Duration,
    /// First-step length above which a reroute starts at the depart level (m).
    pub long_first_step_distance: f64,
    /// Whether fixes are synthesized during sensor gaps.
    pub dead_reckoning_enabled: bool,
    /// Look-ahead horizon and extrapolation step.
    pub dead_reckoning_interval: Duration,
    /// Silence after which a fix is synthesized.
    pub extrapolation_delay: Duration,
    /// Recent fixes retained in the session state.
    pub recent_fix_capacity: usize,
    /// Event broadcast capacity.
    pub event_channel_capacity: usize,
    /// Command channel capacity.
    pub command_channel_capacity: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_distance_before_recalculating: DEFAULT_MAX_DISTANCE_BEFORE_RECALCULATING_M,
            snapping_distance: DEFAULT_SNAPPING_DISTANCE_M,
            depart_hysteresis: Duration::from_secs(DEFAULT_DEPART_HYSTERESIS_SECS),
            maneuver_zone_radius: DEFAULT_MANEUVER_ZONE_RADIUS_M,
            turn_completion_tolerance: DEFAULT_TURN_COMPLETION_TOLERANCE_DEG,
            small_turn_threshold: DEFAULT_SMALL_TURN_THRESHOLD_DEG,
            high_alert_interval: Duration::from_secs(DEFAULT_HIGH_ALERT_INTERVAL_SECS),
            medium_alert_interval: Duration::from_secs(DEFAULT_MEDIUM_ALERT_INTERVAL_SECS),
            long_first_step_distance: DEFAULT_LONG_FIRST_STEP_M,
            dead_reckoning_enabled: true,
            dead_reckoning_interval: Duration::from_millis(DEFAULT_DEAD_RECKONING_INTERVAL_MS),
            extrapolation_delay: Duration::from_millis(DEFAULT_EXTRAPOLATION_DELAY_MS),
            recent_fix_capacity: DEFAULT_RECENT_FIX_CAPACITY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            command_channel_capacity: DEFAULT_COMMAND_CHANNEL_CAPACITY,
        }
    }
}

impl NavigationConfig {
    /// Disable fix synthesis.
    pub fn without_dead_reckoning(mut self) -> Self {
        self.dead_reckoning_enabled = false;
        self
    }

    /// Reject thresholds the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), SessionError> {
        let positive_distances = [
            (
                "max_distance_before_recalculating",
                self.max_distance_before_recalculating,
            ),
            ("maneuver_zone_radius", self.maneuver_zone_radius),
            ("turn_completion_tolerance", self.turn_completion_tolerance),
        ];
        for (field, value) in positive_distances {
            if !(value.is_finite() && value > 0.0) {
                return Err(SessionError::InvalidConfig {
                    field,
                    reason: format!("must be positive, got {}", value),
                });
            }
        }

        let non_negative = [
            ("snapping_distance", self.snapping_distance),
            ("small_turn_threshold", self.small_turn_threshold),
            ("long_first_step_distance", self.long_first_step_distance),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SessionError::InvalidConfig {
                    field,
                    reason: format!("must not be negative, got {}", value),
                });
            }
        }

        let intervals = [
            ("high_alert_interval", self.high_alert_interval),
            ("medium_alert_interval", self.medium_alert_interval),
            ("dead_reckoning_interval", self.dead_reckoning_interval),
            ("extrapolation_delay", self.extrapolation_delay),
        ];
        for (field, value) in intervals {
            if value.is_zero() {
                return Err(SessionError::InvalidConfig {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.high_alert_interval > self.medium_alert_interval {
            return Err(SessionError::InvalidConfig {
                field: "high_alert_interval",
                reason: "must not exceed medium_alert_interval".to_string(),
            });
        }

        let capacities = [
            ("recent_fix_capacity", self.recent_fix_capacity),
            ("event_channel_capacity", self.event_channel_capacity),
            ("command_channel_capacity", self.command_channel_capacity),
        ];
        for (field, value) in capacities {
            if value == 0 {
                return Err(SessionError::InvalidConfig {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(NavigationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_radius() {
        let config = NavigationConfig {
            max_distance_before_recalculating: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig {
                field: "max_distance_before_recalculating",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = NavigationConfig {
            extrapolation_delay: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig {
                field: "extrapolation_delay",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_alert_intervals() {
        let config = NavigationConfig {
            high_alert_interval: Duration::from_secs(90),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_thresholds_scale_with_profile() {
        let driving = AlertThresholds::for_profile(TravelProfile::Driving);
        let cycling = AlertThresholds::for_profile(TravelProfile::Cycling);
        let walking = AlertThresholds::for_profile(TravelProfile::Walking);

        assert!(driving.high_min_distance > cycling.high_min_distance);
        assert!(cycling.high_min_distance > walking.high_min_distance);
        assert_eq!(
            AlertThresholds::for_profile(TravelProfile::DrivingTraffic),
            driving
        );
    }

    #[test]
    fn test_without_dead_reckoning() {
        let config = NavigationConfig::default().without_dead_reckoning();
        assert!(!config.dead_reckoning_enabled);
    }
}
