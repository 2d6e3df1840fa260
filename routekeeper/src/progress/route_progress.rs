//! Hierarchical progress state: route → leg → step → step progress.

use std::sync::Arc;

use crate::route::{Leg, Route, RouteError, Step, Waypoint};

use super::alert_level::AlertLevel;

/// Progress along the current step's polyline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepProgress {
    /// Meters traveled along the step, in `[0, step.distance]`.
    pub(crate) distance_traveled: f64,

    /// Distance to the maneuver at the end of the step at the last evaluated
    /// fix. Used to confirm the user is passing through the maneuver rather
    /// than skimming past it.
    pub(crate) user_distance_to_maneuver: Option<f64>,
}

impl StepProgress {
    pub fn distance_traveled(&self) -> f64 {
        self.distance_traveled
    }

    pub fn user_distance_to_maneuver(&self) -> Option<f64> {
        self.user_distance_to_maneuver
    }
}

/// Progress along the current leg.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegProgress {
    pub(crate) step_index: usize,
    pub(crate) alert_level: AlertLevel,
    pub(crate) step_progress: StepProgress,
}

impl LegProgress {
    fn new(alert_level: AlertLevel) -> Self {
        Self {
            step_index: 0,
            alert_level,
            step_progress: StepProgress::default(),
        }
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn alert_level(&self) -> AlertLevel {
        self.alert_level
    }

    pub fn step_progress(&self) -> &StepProgress {
        &self.step_progress
    }
}

/// Where the user is along the active route.
///
/// The single source of truth for the pipeline. Cloning is cheap (the route is
/// shared), which is how event subscribers receive immutable snapshots.
#[derive(Debug, Clone)]
pub struct RouteProgress {
    route: Arc<Route>,
    leg_index: usize,
    leg_progress: LegProgress,
}

impl RouteProgress {
    /// Start progress at step 0 of `leg_index`.
    ///
    /// The route must already be validated; only the leg index is checked here.
    pub fn new(
        route: Arc<Route>,
        leg_index: usize,
        alert_level: AlertLevel,
    ) -> Result<Self, RouteError> {
        if leg_index >= route.legs.len() {
            return Err(RouteError::LegIndexOutOfBounds {
                index: leg_index,
                len: route.legs.len(),
            });
        }

        Ok(Self {
            route,
            leg_index,
            leg_progress: LegProgress::new(alert_level),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Shared handle to the route.
    pub fn route_arc(&self) -> Arc<Route> {
        Arc::clone(&self.route)
    }

    pub fn leg_index(&self) -> usize {
        self.leg_index
    }

    pub fn leg_progress(&self) -> &LegProgress {
        &self.leg_progress
    }

    pub fn step_index(&self) -> usize {
        self.leg_progress.step_index
    }

    pub fn alert_level(&self) -> AlertLevel {
        self.leg_progress.alert_level
    }

    pub fn current_step_progress(&self) -> &StepProgress {
        &self.leg_progress.step_progress
    }

    pub fn current_leg(&self) -> &Leg {
        &self.route.legs[self.leg_index]
    }

    pub fn current_step(&self) -> &Step {
        &self.current_leg().steps[self.leg_progress.step_index]
    }

    /// Step after the current one within the leg.
    pub fn upcoming_step(&self) -> Option<&Step> {
        self.current_leg()
            .steps
            .get(self.leg_progress.step_index + 1)
    }

    /// Step after the upcoming one within the leg.
    pub fn follow_on_step(&self) -> Option<&Step> {
        self.current_leg()
            .steps
            .get(self.leg_progress.step_index + 2)
    }

    /// Whether the current leg is the last one.
    pub fn is_final_leg(&self) -> bool {
        self.leg_index + 1 == self.route.legs.len()
    }

    /// Legs not yet started.
    pub fn remaining_legs(&self) -> &[Leg] {
        &self.route.legs[self.leg_index + 1..]
    }

    /// Waypoints not yet reached: the destination of the current leg and
    /// everything after it.
    pub fn remaining_waypoints(&self) -> &[Waypoint] {
        let waypoints = &self.route.options.waypoints;
        let first_unvisited = (self.leg_index + 1).min(waypoints.len());
        &waypoints[first_unvisited..]
    }

    /// Meters remaining on the current step.
    pub fn step_distance_remaining(&self) -> f64 {
        (self.current_step().distance - self.leg_progress.step_progress.distance_traveled).max(0.0)
    }

    /// Fraction of the current step traveled, in `[0, 1]`.
    pub fn step_fraction_traveled(&self) -> f64 {
        let distance = self.current_step().distance;
        if distance <= 0.0 {
            return 1.0;
        }
        (self.leg_progress.step_progress.distance_traveled / distance).clamp(0.0, 1.0)
    }

    /// Seconds expected to remain on the current step.
    pub fn step_duration_remaining(&self) -> f64 {
        self.current_step().expected_travel_time * (1.0 - self.step_fraction_traveled())
    }

    /// Meters traveled on the current leg.
    pub fn leg_distance_traveled(&self) -> f64 {
        let completed: f64 = self.current_leg().steps[..self.leg_progress.step_index]
            .iter()
            .map(|s| s.distance)
            .sum();
        completed + self.leg_progress.step_progress.distance_traveled
    }

    /// Meters remaining on the current leg.
    pub fn leg_distance_remaining(&self) -> f64 {
        (self.current_leg().distance() - self.leg_distance_traveled()).max(0.0)
    }

    /// Cumulative meters traveled across the whole route.
    pub fn distance_traveled(&self) -> f64 {
        let completed_legs: f64 = self.route.legs[..self.leg_index]
            .iter()
            .map(Leg::distance)
            .sum();
        completed_legs + self.leg_distance_traveled()
    }

    /// Meters remaining on the whole route.
    pub fn distance_remaining(&self) -> f64 {
        (self.route.distance() - self.distance_traveled()).max(0.0)
    }

    /// Seconds expected to remain on the whole route.
    pub fn duration_remaining(&self) -> f64 {
        let leg = self.current_leg();
        let later_steps: f64 = leg.steps[self.leg_progress.step_index + 1..]
            .iter()
            .map(|s| s.expected_travel_time)
            .sum();
        let later_legs: f64 = self
            .remaining_legs()
            .iter()
            .map(Leg::expected_travel_time)
            .sum();
        self.step_duration_remaining() + later_steps + later_legs
    }

    /// Fraction of the whole route traveled, in `[0, 1]`.
    pub fn fraction_traveled(&self) -> f64 {
        let total = self.route.distance();
        if total <= 0.0 {
            return 1.0;
        }
        (self.distance_traveled() / total).clamp(0.0, 1.0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutators
    // ─────────────────────────────────────────────────────────────────────────

    /// Move to the next step of the leg and reset step progress.
    ///
    /// Returns `false` (and changes nothing) when already on the last step.
    pub fn advance_step(&mut self) -> bool {
        if self.upcoming_step().is_none() {
            return false;
        }
        self.leg_progress.step_index += 1;
        self.leg_progress.step_progress = StepProgress::default();
        true
    }

    /// Move to step 0 of the next leg with a fresh alert level.
    ///
    /// Returns `false` (and changes nothing) on the final leg.
    pub fn advance_leg(&mut self) -> bool {
        if self.is_final_leg() {
            return false;
        }
        self.leg_index += 1;
        self.leg_progress = LegProgress::new(AlertLevel::None);
        true
    }

    /// Replace the whole progress model with one for `route`.
    ///
    /// Used when a reroute succeeds. On error the current progress is kept.
    pub fn replace_route(
        &mut self,
        route: Arc<Route>,
        leg_index: usize,
        initial_alert_level: AlertLevel,
    ) -> Result<(), RouteError> {
        *self = RouteProgress::new(route, leg_index, initial_alert_level)?;
        Ok(())
    }

    pub(crate) fn set_alert_level(&mut self, level: AlertLevel) {
        self.leg_progress.alert_level = level;
    }

    /// Record the snapped position on the current step.
    pub(crate) fn record_step_position(&mut self, distance_to_maneuver: f64) {
        let step_distance = self.current_step().distance;
        let progress = &mut self.leg_progress.step_progress;
        progress.distance_traveled = (step_distance - distance_to_maneuver).clamp(0.0, step_distance);
        progress.user_distance_to_maneuver = Some(distance_to_maneuver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_route, two_leg_route};

    fn progress() -> RouteProgress {
        RouteProgress::new(Arc::new(sample_route()), 0, AlertLevel::None).unwrap()
    }

    #[test]
    fn test_new_rejects_out_of_bounds_leg() {
        let result = RouteProgress::new(Arc::new(sample_route()), 1, AlertLevel::None);
        assert!(matches!(
            result,
            Err(RouteError::LegIndexOutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_initial_state() {
        let p = progress();
        assert_eq!(p.leg_index(), 0);
        assert_eq!(p.step_index(), 0);
        assert_eq!(p.alert_level(), AlertLevel::None);
        assert_eq!(p.distance_traveled(), 0.0);
        assert!(p.upcoming_step().is_some());
        assert!(p.follow_on_step().is_some());
    }

    #[test]
    fn test_advance_step_resets_step_progress() {
        let mut p = progress();
        p.record_step_position(100.0);
        assert!(p.current_step_progress().distance_traveled() > 0.0);

        assert!(p.advance_step());
        assert_eq!(p.step_index(), 1);
        assert_eq!(p.current_step_progress(), &StepProgress::default());
    }

    #[test]
    fn test_advance_step_stops_at_last_step() {
        let mut p = progress();
        assert!(p.advance_step());
        assert!(p.advance_step());
        assert!(!p.advance_step());
        assert_eq!(p.step_index(), 2);
    }

    #[test]
    fn test_record_step_position_clamps() {
        let mut p = progress();
        let step_distance = p.current_step().distance;

        p.record_step_position(step_distance + 500.0);
        assert_eq!(p.current_step_progress().distance_traveled(), 0.0);

        p.record_step_position(-5.0);
        assert_eq!(p.current_step_progress().distance_traveled(), step_distance);
    }

    #[test]
    fn test_distance_traveled_accumulates_steps() {
        let mut p = progress();
        let first = p.current_step().distance;
        p.advance_step();
        let second = p.current_step().distance;
        p.record_step_position(second - 100.0);

        assert!((p.distance_traveled() - (first + 100.0)).abs() < 1e-6);
        assert!((p.distance_remaining() - (second - 100.0)).abs() < 1e-6);
    }

    #[test]
    fn test_remaining_waypoints() {
        let mut p = RouteProgress::new(Arc::new(two_leg_route()), 0, AlertLevel::None).unwrap();
        assert_eq!(p.remaining_waypoints().len(), 2);

        assert!(p.advance_leg());
        assert_eq!(p.remaining_waypoints().len(), 1);
        assert!(!p.advance_leg());
    }

    #[test]
    fn test_advance_leg_resets_leg_progress() {
        let mut p = RouteProgress::new(Arc::new(two_leg_route()), 0, AlertLevel::None).unwrap();
        p.advance_step();
        p.set_alert_level(AlertLevel::Arrive);
        let first_leg_distance = p.current_leg().distance();

        assert!(p.advance_leg());
        assert_eq!(p.leg_index(), 1);
        assert_eq!(p.step_index(), 0);
        assert_eq!(p.alert_level(), AlertLevel::None);
        assert!((p.distance_traveled() - first_leg_distance).abs() < 1e-6);
    }

    #[test]
    fn test_replace_route_resets_everything() {
        let mut p = RouteProgress::new(Arc::new(two_leg_route()), 1, AlertLevel::None).unwrap();
        p.advance_step();
        p.record_step_position(10.0);

        let replacement = Arc::new(sample_route());
        p.replace_route(Arc::clone(&replacement), 0, AlertLevel::Depart)
            .unwrap();

        assert_eq!(p.leg_index(), 0);
        assert_eq!(p.step_index(), 0);
        assert_eq!(p.alert_level(), AlertLevel::Depart);
        assert_eq!(p.distance_traveled(), 0.0);
        assert!(Arc::ptr_eq(&p.route_arc(), &replacement));
    }

    #[test]
    fn test_replace_route_keeps_state_on_error() {
        let mut p = progress();
        p.advance_step();

        let result = p.replace_route(Arc::new(sample_route()), 3, AlertLevel::None);
        assert!(result.is_err());
        assert_eq!(p.step_index(), 1);
    }

    #[test]
    fn test_duration_remaining_at_start_is_total() {
        let p = progress();
        assert!((p.duration_remaining() - p.route().expected_travel_time()).abs() < 1e-9);
        assert_eq!(p.fraction_traveled(), 0.0);
    }
}
