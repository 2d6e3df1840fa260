//! Synchronous fix pipeline.
//!
//! Owns the live [`RouteProgress`] and [`SessionState`] and turns each fix into
//! events. Nothing here awaits: the session actor calls in one command at a
//! time, broadcasts the returned events, and issues any reroute request.
//!
//! # Flow
//!
//! ```text
//! fix ──► qualified? ──► OffRouteDetector ──► OnRoute ──────► AlertMachine::update
//!                               │          └► AdvanceStep ──► AlertMachine::force_advance
//!                               └► OffRoute ──► veto ──► RerouteCoordinator ──► PendingReroute
//! ```
//!
//! After the leg reaches Arrive the detector is bypassed until the host
//! advances the leg or assigns a new route.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::progress::{AlertLevel, RouteProgress};
use crate::route::{Route, RouteError};
use crate::routing::RoutingError;
use crate::telemetry::{
    Feedback, ProgressSummary, TelemetryEvent, TelemetryEventKind, TelemetrySink,
    TracingTelemetrySink,
};

use super::alert_machine::{AlertMachine, AlertUpdate};
use super::config::NavigationConfig;
use super::dead_reckoning::DeadReckoning;
use super::error::SessionError;
use super::events::NavigationEvent;
use super::fix::Fix;
use super::off_route::{OffRouteDecision, OffRouteDetector};
use super::reroute::{PendingReroute, RerouteCoordinator, RerouteSkip};
use super::session_state::SessionState;

/// Host hook consulted before every reroute.
pub trait RerouteHost: Send + Sync {
    /// Return `false` to keep the current route, e.g. to let the user confirm.
    fn should_reroute(&self, _fix: &Fix) -> bool {
        true
    }
}

/// Host that always allows rerouting.
#[derive(Debug, Clone, Default)]
pub struct AlwaysReroute;

impl RerouteHost for AlwaysReroute {}

/// What one fix produced.
#[derive(Debug, Default)]
pub struct Ingested {
    /// Events to publish, in order.
    pub events: Vec<NavigationEvent>,
    /// A reroute request to issue.
    pub reroute: Option<PendingReroute>,
}

/// The navigation control loop without any I/O.
pub struct RoutePipeline {
    config: NavigationConfig,
    progress: RouteProgress,
    state: SessionState,
    detector: OffRouteDetector,
    alerts: AlertMachine,
    reroute: RerouteCoordinator,
    dead_reckoning: DeadReckoning,
    telemetry: Arc<dyn TelemetrySink>,
    host: Arc<dyn RerouteHost>,
    last_fix: Option<Fix>,
}

impl std::fmt::Debug for RoutePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePipeline")
            .field("leg_index", &self.progress.leg_index())
            .field("step_index", &self.progress.step_index())
            .field("alert_level", &self.progress.alert_level())
            .field("reroute_in_flight", &self.reroute.is_in_flight())
            .field("session_id", &self.state.id)
            .finish()
    }
}

impl RoutePipeline {
    /// Validate `route` and `config` and start at leg 0.
    pub fn new(route: Route, config: NavigationConfig) -> Result<Self, SessionError> {
        config.validate()?;
        route.validate()?;

        let profile = route.options.profile;
        let progress = RouteProgress::new(Arc::new(route), 0, AlertLevel::None)?;

        Ok(Self {
            detector: OffRouteDetector::new(&config),
            alerts: AlertMachine::new(&config, profile),
            reroute: RerouteCoordinator::new(&config),
            dead_reckoning: DeadReckoning::new(&config),
            state: SessionState::new(config.recent_fix_capacity),
            telemetry: Arc::new(TracingTelemetrySink),
            host: Arc::new(AlwaysReroute),
            last_fix: None,
            progress,
            config,
        })
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_reroute_host(mut self, host: Arc<dyn RerouteHost>) -> Self {
        self.host = host;
        self
    }

    pub fn progress(&self) -> &RouteProgress {
        &self.progress
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn dead_reckoning(&self) -> &DeadReckoning {
        &self.dead_reckoning
    }

    pub fn is_reroute_in_flight(&self) -> bool {
        self.reroute.is_in_flight()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fix ingestion
    // ─────────────────────────────────────────────────────────────────────────

    /// Process one fix, real or synthesized.
    ///
    /// `parent` is the session token; reroute requests are its children.
    pub fn ingest(&mut self, fix: Fix, parent: &CancellationToken) -> Ingested {
        let mut out = Ingested::default();
        out.events.push(NavigationEvent::FixReceived { fix: fix.clone() });

        if !fix.is_qualified() {
            debug!(
                coordinate = %fix.coordinate,
                accuracy = fix.horizontal_accuracy,
                "Skipping unqualified fix"
            );
            return out;
        }

        self.state.record_fix(&fix);
        self.last_fix = Some(fix.clone());

        if self.state.record_departure(fix.timestamp) {
            info!(session_id = %self.state.id, "Trip departed");
            self.record_telemetry(TelemetryEventKind::Depart, Some(&fix), fix.timestamp, None);
        }

        // Arrive is terminal for the leg: only read-only progress until the
        // host advances the leg or assigns a new route.
        let decision = if self.progress.alert_level().is_terminal() {
            OffRouteDecision::OnRoute
        } else {
            self.detector.evaluate(&fix, &self.progress)
        };

        let update = match decision {
            OffRouteDecision::OffRoute => {
                out.reroute = self.trigger_reroute(&fix, parent, &mut out.events);
                return out;
            }
            OffRouteDecision::AdvanceStep { alert_level } => {
                self.alerts.force_advance(&fix, &mut self.progress, alert_level)
            }
            OffRouteDecision::OnRoute => self.alerts.update(&fix, &mut self.progress),
        };

        let Some(update) = update else {
            debug!("Fix could not be snapped to the current step");
            return out;
        };

        self.publish_update(&fix, update, &mut out.events);
        out
    }

    fn publish_update(&mut self, fix: &Fix, update: AlertUpdate, events: &mut Vec<NavigationEvent>) {
        if update.is_change() {
            debug!(
                leg_index = self.progress.leg_index(),
                step_index = self.progress.step_index(),
                from = %update.previous_level,
                to = %update.level,
                distance_to_maneuver = format!("{:.1}", update.distance_to_maneuver),
                "Alert level changed"
            );
            events.push(NavigationEvent::AlertLevelChanged {
                progress: self.progress.clone(),
                distance_to_maneuver: update.distance_to_maneuver,
            });
        }

        events.push(NavigationEvent::ProgressChanged {
            progress: self.progress.clone(),
            fix: fix.clone(),
            seconds_remaining_on_step: self.progress.step_duration_remaining(),
        });

        if update.arrived() {
            self.handle_arrival(fix, events);
        }
    }

    fn handle_arrival(&mut self, fix: &Fix, events: &mut Vec<NavigationEvent>) {
        let final_leg = self.progress.is_final_leg();
        info!(
            leg_index = self.progress.leg_index(),
            final_leg,
            "Arrived at waypoint"
        );
        if final_leg {
            self.state.record_arrival(fix.timestamp);
        }
        self.record_telemetry(TelemetryEventKind::Arrive, Some(fix), fix.timestamp, None);
        events.push(NavigationEvent::DidArrive {
            progress: self.progress.clone(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rerouting
    // ─────────────────────────────────────────────────────────────────────────

    fn trigger_reroute(
        &mut self,
        fix: &Fix,
        parent: &CancellationToken,
        events: &mut Vec<NavigationEvent>,
    ) -> Option<PendingReroute> {
        if !self.host.should_reroute(fix) {
            debug!("Reroute vetoed by host");
            return None;
        }

        match self.reroute.evaluate_trigger(fix) {
            Ok(()) => {}
            Err(RerouteSkip::InFlight) => {
                debug!("Off route, reroute already in flight");
                return None;
            }
            Err(RerouteSkip::TooCloseToLastReroute { distance }) => {
                debug!(
                    distance = format!("{:.1}", distance),
                    "Off route, too close to last reroute"
                );
                return None;
            }
        }

        self.detector.reset();
        events.push(NavigationEvent::WillReroute { fix: fix.clone() });
        let pending = self.reroute.begin(fix, &self.progress, parent);
        info!(
            generation = pending.generation,
            coordinate = %fix.coordinate,
            "Off route, requesting new route"
        );
        Some(pending)
    }

    /// Apply the outcome of reroute `generation`.
    ///
    /// Stale generations produce no events. A route that fails validation is
    /// handled like any other routing failure.
    pub fn complete_reroute(
        &mut self,
        generation: u64,
        result: Result<Route, RoutingError>,
    ) -> Vec<NavigationEvent> {
        if !self.reroute.finish(generation) {
            return Vec::new();
        }
        self.detector.reset();

        match result.and_then(|route| self.adopt_route(route).map_err(RoutingError::from)) {
            Ok(route) => vec![NavigationEvent::DidReroute { route }],
            Err(error) => {
                warn!(generation, error = %error, "Reroute failed");
                vec![NavigationEvent::DidFailToReroute { error }]
            }
        }
    }

    fn adopt_route(&mut self, route: Route) -> Result<Arc<Route>, RouteError> {
        route.validate()?;
        let route = Arc::new(route);
        let discarded = self.progress.distance_traveled();
        let level = self.reroute.initial_alert_level(&route);

        self.progress.replace_route(Arc::clone(&route), 0, level)?;
        self.alerts.set_profile(route.options.profile);

        let now = self.event_time();
        self.state.record_reroute(now, discarded);
        self.record_telemetry(
            TelemetryEventKind::Reroute,
            self.last_fix.clone().as_ref(),
            now,
            None,
        );
        info!(
            reroute_count = self.state.reroute_count,
            initial_alert_level = %level,
            distance_m = format!("{:.0}", route.distance()),
            "Adopted new route"
        );
        Ok(route)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Host commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Move to the next leg after arriving at an intermediate waypoint.
    pub fn advance_leg(&mut self) -> bool {
        let advanced = self.progress.advance_leg();
        if advanced {
            self.detector.reset();
            info!(leg_index = self.progress.leg_index(), "Advanced to next leg");
        }
        advanced
    }

    /// Replace the route at the host's request.
    ///
    /// A route assigned after arrival starts a fresh session state.
    pub fn assign_route(&mut self, route: Route) -> Result<(), RouteError> {
        route.validate()?;
        let profile = route.options.profile;
        let progress = RouteProgress::new(Arc::new(route), 0, AlertLevel::None)?;

        if self.state.has_arrived() {
            info!(previous_session = %self.state.id, "New route after arrival, resetting session");
            self.state = SessionState::new(self.config.recent_fix_capacity);
        }

        self.progress = progress;
        self.alerts.set_profile(profile);
        self.detector.reset();
        self.reroute.reset();
        Ok(())
    }

    pub fn record_feedback(&mut self, feedback: Feedback) {
        let now = self.event_time();
        self.record_telemetry(
            TelemetryEventKind::Feedback,
            self.last_fix.clone().as_ref(),
            now,
            Some(feedback),
        );
    }

    /// Synthesize a fix `elapsed` after the last one.
    pub fn extrapolate(&self, elapsed: Duration) -> Option<Fix> {
        let last = self.last_fix.as_ref()?;
        self.dead_reckoning.extrapolate(last, &self.progress, elapsed)
    }

    /// Cancel outstanding work and flush session-end telemetry.
    pub fn finish(&mut self) {
        self.reroute.cancel();
        if !self.state.has_arrived() {
            let now = self.event_time();
            self.record_telemetry(
                TelemetryEventKind::Cancel,
                self.last_fix.clone().as_ref(),
                now,
                None,
            );
        }
        self.telemetry.flush();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Telemetry
    // ─────────────────────────────────────────────────────────────────────────

    fn event_time(&self) -> DateTime<Utc> {
        self.last_fix
            .as_ref()
            .map_or_else(Utc::now, |fix| fix.timestamp)
    }

    fn record_telemetry(
        &self,
        kind: TelemetryEventKind,
        fix: Option<&Fix>,
        timestamp: DateTime<Utc>,
        feedback: Option<Feedback>,
    ) {
        self.telemetry.record(TelemetryEvent {
            kind,
            session_id: self.state.id,
            timestamp,
            progress: ProgressSummary::from(&self.progress),
            fix: fix.cloned(),
            reroute_count: self.state.reroute_count,
            total_distance: self.state.total_distance(self.progress.distance_traveled()),
            feedback,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::TravelProfile;
    use crate::telemetry::MemoryTelemetrySink;
    use crate::test_support::{fix, sample_route, two_leg_route};

    const DEG_PER_M: f64 = 1.0 / 111_195.0;

    fn pipeline() -> (RoutePipeline, Arc<MemoryTelemetrySink>) {
        let telemetry = Arc::new(MemoryTelemetrySink::new());
        let pipeline = RoutePipeline::new(sample_route(), NavigationConfig::default())
            .unwrap()
            .with_telemetry(telemetry.clone());
        (pipeline, telemetry)
    }

    fn names(events: &[NavigationEvent]) -> Vec<&'static str> {
        events.iter().map(NavigationEvent::name).collect()
    }

    /// Far from every step of the sample route.
    fn far_fix(offset_ms: i64) -> Fix {
        fix(0.05, 0.05, Some(45.0), 10.0, offset_ms)
    }

    /// Drive far fixes until the depart hysteresis lets a reroute through.
    fn start_reroute(pipeline: &mut RoutePipeline, token: &CancellationToken) -> PendingReroute {
        for i in 0..10 {
            if let Some(pending) = pipeline.ingest(far_fix(i * 1000), token).reroute {
                return pending;
            }
        }
        panic!("reroute never triggered");
    }

    struct NeverReroute;

    impl RerouteHost for NeverReroute {
        fn should_reroute(&self, _fix: &Fix) -> bool {
            false
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_invalid_route_is_rejected() {
        let mut route = sample_route();
        route.legs[0].steps[0].coordinates.clear();
        let result = RoutePipeline::new(route, NavigationConfig::default());
        assert!(matches!(result, Err(SessionError::InvalidRoute(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = NavigationConfig {
            maneuver_zone_radius: -1.0,
            ..Default::default()
        };
        let result = RoutePipeline::new(sample_route(), config);
        assert!(matches!(result, Err(SessionError::InvalidConfig { .. })));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // On-route flow
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_first_fix_departs() {
        let (mut p, telemetry) = pipeline();
        let token = CancellationToken::new();
        let out = p.ingest(fix(0.0, 0.0, Some(0.0), 10.0, 0), &token);

        assert_eq!(
            names(&out.events),
            vec!["fix_received", "alert_level_changed", "progress_changed"]
        );
        assert_eq!(p.progress().alert_level(), AlertLevel::Depart);
        assert_eq!(telemetry.kinds(), vec![TelemetryEventKind::Depart]);
        assert!(p.state().departed_at.is_some());
    }

    #[test]
    fn test_unqualified_fix_only_reported() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        let bad = fix(0.0, 0.0, None, 0.0, 0).with_horizontal_accuracy(-1.0);
        let out = p.ingest(bad, &token);

        assert_eq!(names(&out.events), vec!["fix_received"]);
        assert_eq!(p.state().recent_fix_count(), 0);
        assert!(p.state().departed_at.is_none());
    }

    #[test]
    fn test_progress_changed_carries_seconds_remaining() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        let out = p.ingest(fix(0.0045, 0.0, Some(0.0), 10.0, 0), &token);

        let seconds = out
            .events
            .iter()
            .find_map(|e| match e {
                NavigationEvent::ProgressChanged {
                    seconds_remaining_on_step,
                    ..
                } => Some(*seconds_remaining_on_step),
                _ => None,
            })
            .unwrap();
        // Halfway along a 100 s step.
        assert!((seconds - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_step_index_never_decreases_on_route() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        let mut last_step = 0;

        let path = [
            (0.0, 0.0, 0.0),
            (0.003, 0.0, 0.0),
            (0.0089, 0.0, 90.0),
            (0.009, 0.002, 90.0),
            (0.009, 0.001, 90.0),
            (0.009, 0.006, 90.0),
        ];
        for (i, (lat, lon, course)) in path.into_iter().enumerate() {
            p.ingest(fix(lat, lon, Some(course), 10.0, i as i64 * 1000), &token);
            assert!(p.progress().step_index() >= last_step);
            last_step = p.progress().step_index();
        }
        assert_eq!(last_step, 1);
    }

    // Scenario E
    #[test]
    fn test_arrive_is_never_regressed() {
        let (mut p, telemetry) = pipeline();
        let token = CancellationToken::new();

        p.ingest(fix(0.0, 0.0, Some(0.0), 10.0, 0), &token);
        p.ingest(fix(0.0089, 0.0, Some(90.0), 10.0, 1000), &token);
        assert_eq!(p.progress().step_index(), 1);

        let out = p.ingest(fix(0.009, 0.0089, Some(90.0), 10.0, 2000), &token);
        assert!(names(&out.events).contains(&"did_arrive"));
        assert_eq!(p.progress().alert_level(), AlertLevel::Arrive);
        assert!(p.state().has_arrived());

        for i in 0..5 {
            let out = p.ingest(
                fix(0.009, 0.0085 + 0.0001 * i as f64, Some(90.0), 5.0, 3000 + i * 1000),
                &token,
            );
            assert_eq!(
                names(&out.events),
                vec!["fix_received", "progress_changed"]
            );
            assert_eq!(p.progress().alert_level(), AlertLevel::Arrive);
        }

        assert_eq!(
            telemetry.kinds(),
            vec![TelemetryEventKind::Depart, TelemetryEventKind::Arrive]
        );
    }

    #[test]
    fn test_off_route_after_arrival_does_not_reroute() {
        let (mut p, telemetry) = pipeline();
        let token = CancellationToken::new();

        p.ingest(fix(0.0, 0.0, Some(0.0), 10.0, 0), &token);
        p.ingest(fix(0.0089, 0.0, Some(90.0), 10.0, 1000), &token);
        p.ingest(fix(0.009, 0.0089, Some(90.0), 10.0, 2000), &token);
        assert_eq!(p.progress().alert_level(), AlertLevel::Arrive);
        let step_index = p.progress().step_index();

        // Walking away from the destination, well past the hysteresis window.
        for i in 0..8 {
            let out = p.ingest(far_fix(3000 + i * 1000), &token);
            assert!(out.reroute.is_none());
            assert_eq!(
                names(&out.events),
                vec!["fix_received", "progress_changed"]
            );
            assert_eq!(p.progress().alert_level(), AlertLevel::Arrive);
            assert_eq!(p.progress().step_index(), step_index);
        }

        assert!(!p.is_reroute_in_flight());
        assert_eq!(p.state().reroute_count, 0);
        assert_eq!(
            telemetry.kinds(),
            vec![TelemetryEventKind::Depart, TelemetryEventKind::Arrive]
        );
    }

    #[test]
    fn test_next_leg_is_rerouted_after_intermediate_arrival() {
        let mut p = RoutePipeline::new(two_leg_route(), NavigationConfig::default()).unwrap();
        let token = CancellationToken::new();

        p.ingest(fix(0.0, 0.0, Some(0.0), 10.0, 0), &token);
        p.ingest(fix(0.0089, 0.0, Some(90.0), 10.0, 1000), &token);
        p.ingest(fix(0.009, 0.0089, Some(90.0), 10.0, 2000), &token);
        assert_eq!(p.progress().alert_level(), AlertLevel::Arrive);
        assert!(p.ingest(far_fix(3000), &token).reroute.is_none());

        assert!(p.advance_leg());
        let rerouted = (4..20).any(|i| p.ingest(far_fix(i * 1000), &token).reroute.is_some());
        assert!(rerouted);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rerouting
    // ─────────────────────────────────────────────────────────────────────────

    // Scenario A
    #[test]
    fn test_far_fixes_trigger_exactly_one_reroute() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();

        // 5 km from every step; depart hysteresis holds for the first 3 s.
        let mut reroutes = 0;
        let mut will_reroute = 0;
        for i in 0..8 {
            let f = fix(0.009 + 5000.0 * DEG_PER_M, 0.0, Some(0.0), 10.0, i * 1000);
            let out = p.ingest(f, &token);
            reroutes += out.reroute.iter().count();
            will_reroute += out
                .events
                .iter()
                .filter(|e| matches!(e, NavigationEvent::WillReroute { .. }))
                .count();
        }

        assert_eq!(reroutes, 1);
        assert_eq!(will_reroute, 1);
        assert!(p.is_reroute_in_flight());
    }

    #[test]
    fn test_veto_blocks_reroute() {
        let (p, _) = pipeline();
        let mut p = p.with_reroute_host(Arc::new(NeverReroute));
        let token = CancellationToken::new();

        for i in 0..10 {
            assert!(p.ingest(far_fix(i * 1000), &token).reroute.is_none());
        }
        assert!(!p.is_reroute_in_flight());
    }

    // Round trip
    #[test]
    fn test_successful_reroute_resets_progress() {
        let (mut p, telemetry) = pipeline();
        let token = CancellationToken::new();
        let pending = start_reroute(&mut p, &token);

        assert_eq!(pending.request.waypoints.len(), 2);
        assert_eq!(pending.request.profile, TravelProfile::Driving);

        let mut replacement = two_leg_route();
        replacement.legs[0].steps[0].distance = 300.0;
        let events = p.complete_reroute(pending.generation, Ok(replacement));

        assert_eq!(names(&events), vec!["did_reroute"]);
        assert_eq!(p.progress().leg_index(), 0);
        assert_eq!(p.progress().step_index(), 0);
        assert_eq!(p.progress().distance_traveled(), 0.0);
        assert_eq!(p.progress().alert_level(), AlertLevel::None);
        assert_eq!(p.progress().route().legs.len(), 2);
        assert_eq!(p.state().reroute_count, 1);
        assert!(!p.is_reroute_in_flight());
        assert!(telemetry.kinds().contains(&TelemetryEventKind::Reroute));
    }

    #[test]
    fn test_long_first_step_starts_at_depart() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        let pending = start_reroute(&mut p, &token);

        p.complete_reroute(pending.generation, Ok(sample_route()));
        assert_eq!(p.progress().alert_level(), AlertLevel::Depart);
    }

    // Scenario D
    #[test]
    fn test_failed_reroute_keeps_progress() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        let before = p.progress().clone();
        let pending = start_reroute(&mut p, &token);

        let error = RoutingError::NoRoute("nothing".to_string());
        let events = p.complete_reroute(pending.generation, Err(error.clone()));

        match events.as_slice() {
            [NavigationEvent::DidFailToReroute { error: reported }] => {
                assert_eq!(reported, &error)
            }
            other => panic!("unexpected events: {:?}", names(other)),
        }
        assert!(Arc::ptr_eq(&p.progress().route_arc(), &before.route_arc()));
        assert_eq!(p.progress().step_index(), before.step_index());
        assert_eq!(p.state().reroute_count, 0);
        assert!(!p.is_reroute_in_flight());

        // Same place: debounced, even after the depart hysteresis expires.
        for i in 0..6 {
            assert!(p.ingest(far_fix(20_000 + i * 1000), &token).reroute.is_none());
        }

        // 100 m further on: eligible again.
        let moved = fix(0.05 + 100.0 * DEG_PER_M, 0.05, Some(45.0), 10.0, 26_000);
        assert!(p.ingest(moved, &token).reroute.is_some());
    }

    #[test]
    fn test_invalid_replacement_is_failure() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        let pending = start_reroute(&mut p, &token);

        let mut broken = sample_route();
        broken.legs.clear();
        let events = p.complete_reroute(pending.generation, Ok(broken));
        assert!(matches!(
            events.as_slice(),
            [NavigationEvent::DidFailToReroute {
                error: RoutingError::InvalidRoute(RouteError::NoLegs)
            }]
        ));
        assert_eq!(p.progress().route().legs[0].steps.len(), 3);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        let pending = start_reroute(&mut p, &token);

        assert!(p.complete_reroute(pending.generation + 7, Ok(two_leg_route())).is_empty());
        assert!(p.is_reroute_in_flight());
        assert_eq!(p.progress().route().legs.len(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Host commands
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_advance_leg() {
        let mut p = RoutePipeline::new(two_leg_route(), NavigationConfig::default()).unwrap();
        assert!(p.advance_leg());
        assert_eq!(p.progress().leg_index(), 1);
        assert!(!p.advance_leg());
    }

    #[test]
    fn test_assign_route_after_arrival_resets_session() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        p.ingest(fix(0.0, 0.0, Some(0.0), 10.0, 0), &token);
        p.ingest(fix(0.0089, 0.0, Some(90.0), 10.0, 1000), &token);
        p.ingest(fix(0.009, 0.0089, Some(90.0), 10.0, 2000), &token);
        assert!(p.state().has_arrived());
        let old_id = p.state().id;

        p.assign_route(two_leg_route()).unwrap();
        assert_ne!(p.state().id, old_id);
        assert!(!p.state().has_arrived());
        assert_eq!(p.progress().route().legs.len(), 2);
    }

    #[test]
    fn test_assign_invalid_route_keeps_current() {
        let (mut p, _) = pipeline();
        let mut broken = sample_route();
        broken.legs[0].steps.clear();
        assert!(p.assign_route(broken).is_err());
        assert_eq!(p.progress().route().legs[0].steps.len(), 3);
    }

    #[test]
    fn test_finish_records_cancel_and_flushes() {
        let (mut p, telemetry) = pipeline();
        let token = CancellationToken::new();
        let pending = start_reroute(&mut p, &token);

        p.record_feedback(Feedback {
            category: "wrong_turn".to_string(),
            description: None,
        });
        p.finish();

        assert!(pending.cancellation.is_cancelled());
        assert_eq!(
            telemetry.kinds(),
            vec![
                TelemetryEventKind::Depart,
                TelemetryEventKind::Feedback,
                TelemetryEventKind::Cancel
            ]
        );
        assert_eq!(telemetry.flush_count(), 1);
    }

    #[test]
    fn test_extrapolate_needs_a_fix() {
        let (mut p, _) = pipeline();
        let token = CancellationToken::new();
        assert!(p.extrapolate(Duration::from_secs(1)).is_none());

        p.ingest(fix(0.001, 0.0, Some(0.0), 10.0, 0), &token);
        let synthetic = p.extrapolate(Duration::from_secs(1)).unwrap();
        assert!(synthetic.coordinate.latitude > 0.001);
    }
}
