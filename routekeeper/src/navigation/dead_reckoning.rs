//! Dead-reckoning extrapolation.
//!
//! When the location source goes quiet, a fix is synthesized by walking the
//! route polyline forward from the last snapped position at the last known
//! speed. The synthetic fix goes through the normal ingestion path.
//!
//! Scheduling lives in the session actor: every processed fix re-arms a single
//! deadline, so at most one synthetic fix is ever pending.

use std::time::Duration;

use chrono::Duration as ChronoDuration;

use crate::geometry;
use crate::progress::RouteProgress;

use super::config::NavigationConfig;
use super::fix::Fix;

/// Synthesizes fixes during sensor gaps.
#[derive(Debug, Clone)]
pub struct DeadReckoning {
    enabled: bool,
    interval: Duration,
    delay: Duration,
}

impl DeadReckoning {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            enabled: config.dead_reckoning_enabled,
            interval: config.dead_reckoning_interval,
            delay: config.extrapolation_delay,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Silence after which a fix is synthesized.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a fix should be scheduled after `fix`.
    ///
    /// Stationary users are not extrapolated.
    pub fn should_schedule(&self, fix: &Fix) -> bool {
        self.enabled && !fix.is_stationary()
    }

    /// Synthesize the fix `elapsed` after `last_fix`.
    ///
    /// Returns `None` when the user is stationary or the extrapolated point
    /// would run past the end of the route.
    pub fn extrapolate(
        &self,
        last_fix: &Fix,
        progress: &RouteProgress,
        elapsed: Duration,
    ) -> Option<Fix> {
        if last_fix.is_stationary() {
            return None;
        }

        let speed = last_fix.effective_speed();
        let polyline = progress.route().coordinates();
        let traveled = progress.distance_traveled() + speed * elapsed.as_secs_f64();
        let coordinate = geometry::point_at_distance(&polyline, traveled)?;

        // Course points at where the user will be one interval later.
        let course = geometry::point_at_distance(
            &polyline,
            traveled + speed * self.interval.as_secs_f64(),
        )
        .filter(|ahead| geometry::distance(coordinate, *ahead) > 0.0)
        .map(|ahead| geometry::bearing(coordinate, ahead))
        .or(last_fix.course);

        let elapsed = ChronoDuration::from_std(elapsed).unwrap_or_else(|_| ChronoDuration::zero());

        Some(Fix {
            coordinate,
            course,
            timestamp: last_fix.timestamp + elapsed,
            ..last_fix.clone()
        })
    }
}
