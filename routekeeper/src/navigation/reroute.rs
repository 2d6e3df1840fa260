//! Reroute coordination.
//!
//! Guards the asynchronous reroute protocol against itself:
//!
//! - **Reentrancy**: at most one request is outstanding.
//! - **Spatial debounce**: a new request needs the user to have moved at least
//!   `max_distance_before_recalculating` from where the previous one started.
//! - **Generations**: every request is numbered; a completion for anything but
//!   the current generation is stale and dropped.
//!
//! The coordinator only keeps bookkeeping. Issuing the request and adopting the
//! result are the session's job.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::geometry::{self, Coordinate};
use crate::progress::{AlertLevel, RouteProgress};
use crate::route::{Route, Waypoint};
use crate::routing::{HeadingHint, RouteRequest};

use super::config::{NavigationConfig, REROUTE_HEADING_ACCURACY_DEG};
use super::fix::Fix;

/// Why an off-route trigger did not start a reroute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RerouteSkip {
    /// A request is already outstanding.
    InFlight,
    /// Too close to where the previous reroute started.
    TooCloseToLastReroute { distance: f64 },
}

/// A reroute that has been started and must be issued.
#[derive(Debug, Clone)]
pub struct PendingReroute {
    pub generation: u64,
    pub request: RouteRequest,
    /// Cancelled when the request is superseded or the session shuts down.
    pub cancellation: CancellationToken,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    cancellation: CancellationToken,
}

/// Reroute bookkeeping owned by the pipeline.
#[derive(Debug)]
pub struct RerouteCoordinator {
    min_reroute_distance: f64,
    long_first_step_distance: f64,
    in_flight: Option<InFlight>,
    last_reroute_location: Option<Coordinate>,
    next_generation: u64,
}

impl RerouteCoordinator {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            min_reroute_distance: config.max_distance_before_recalculating,
            long_first_step_distance: config.long_first_step_distance,
            in_flight: None,
            last_reroute_location: None,
            next_generation: 1,
        }
    }

    /// Whether a request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Where the most recent reroute started.
    pub fn last_reroute_location(&self) -> Option<Coordinate> {
        self.last_reroute_location
    }

    /// Apply the reentrancy guard and spatial debounce to an off-route fix.
    pub fn evaluate_trigger(&self, fix: &Fix) -> Result<(), RerouteSkip> {
        if self.in_flight.is_some() {
            return Err(RerouteSkip::InFlight);
        }

        if let Some(last) = self.last_reroute_location {
            let distance = geometry::distance(last, fix.coordinate);
            if distance < self.min_reroute_distance {
                return Err(RerouteSkip::TooCloseToLastReroute { distance });
            }
        }

        Ok(())
    }

    /// Start a reroute from `fix`.
    ///
    /// Any previous request is cancelled first. The returned token is a child
    /// of `parent`, so shutting the session down cancels it too.
    pub fn begin(
        &mut self,
        fix: &Fix,
        progress: &RouteProgress,
        parent: &CancellationToken,
    ) -> PendingReroute {
        self.cancel();

        let generation = self.next_generation;
        self.next_generation += 1;

        let cancellation = parent.child_token();
        self.in_flight = Some(InFlight {
            generation,
            cancellation: cancellation.clone(),
        });
        self.last_reroute_location = Some(fix.coordinate);

        let request = build_request(fix, progress);
        debug!(
            generation,
            waypoints = request.waypoints.len(),
            "Reroute started"
        );

        PendingReroute {
            generation,
            request,
            cancellation,
        }
    }

    /// Clear the outstanding request if `generation` is current.
    ///
    /// Returns `false` for a stale completion, which must be ignored.
    pub fn finish(&mut self, generation: u64) -> bool {
        match &self.in_flight {
            Some(current) if current.generation == generation => {
                self.in_flight = None;
                true
            }
            _ => {
                debug!(generation, "Dropping stale reroute completion");
                false
            }
        }
    }

    /// Cancel the outstanding request, if any.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancellation.cancel();
        }
    }

    /// Forget the debounce location (a new route was assigned by the host).
    pub fn reset(&mut self) {
        self.cancel();
        self.last_reroute_location = None;
    }

    /// Alert level a replacement route starts at.
    ///
    /// A long first step gets an immediate depart cue; otherwise the next
    /// maneuver cue will fire soon anyway.
    pub fn initial_alert_level(&self, route: &Route) -> AlertLevel {
        match route.first_step() {
            Some(step) if step.distance > self.long_first_step_distance => AlertLevel::Depart,
            _ => AlertLevel::None,
        }
    }
}

/// The fix as origin plus the stops still ahead.
///
/// Routes without waypoints fall back to the end of the route as destination.
pub fn build_request(fix: &Fix, progress: &RouteProgress) -> RouteRequest {
    let mut waypoints = vec![Waypoint::new(fix.coordinate)];
    let remaining = progress.remaining_waypoints();
    if remaining.is_empty() {
        if let Some(end) = progress.route().coordinates().last() {
            waypoints.push(Waypoint::new(*end));
        }
    } else {
        waypoints.extend_from_slice(remaining);
    }

    RouteRequest {
        waypoints,
        profile: progress.route().options.profile,
        heading: fix.valid_course().map(|heading| HeadingHint {
            heading,
            accuracy: REROUTE_HEADING_ACCURACY_DEG,
        }),
    }
}
