//! Navigation session.
//!
//! Turns a stream of position fixes into route progress, alert levels and
//! reroutes.
//!
//! # Components
//!
//! - [`OffRouteDetector`] - is the fix on the current step, the next one, or neither
//! - [`AlertMachine`] - proximity levels and step advancement
//! - [`RerouteCoordinator`] - reentrancy guard, spatial debounce, generations
//! - [`DeadReckoning`] - synthetic fixes during sensor gaps
//! - [`RoutePipeline`] - the above wired together, without I/O
//! - [`SessionBuilder`] / [`SessionHandle`] - the async actor hosts talk to

mod alert_machine;
mod config;
mod dead_reckoning;
mod error;
mod events;
mod fix;
mod off_route;
mod pipeline;
mod reroute;
mod session;
mod session_state;

pub use alert_machine::{AlertMachine, AlertUpdate};
pub use config::{
    AlertThresholds, NavigationConfig, DEFAULT_COMMAND_CHANNEL_CAPACITY,
    DEFAULT_DEAD_RECKONING_INTERVAL_MS, DEFAULT_DEPART_HYSTERESIS_SECS,
    DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_EXTRAPOLATION_DELAY_MS,
    DEFAULT_HIGH_ALERT_INTERVAL_SECS, DEFAULT_LONG_FIRST_STEP_M, DEFAULT_MANEUVER_ZONE_RADIUS_M,
    DEFAULT_MAX_DISTANCE_BEFORE_RECALCULATING_M, DEFAULT_MEDIUM_ALERT_INTERVAL_SECS,
    DEFAULT_RECENT_FIX_CAPACITY, DEFAULT_SMALL_TURN_THRESHOLD_DEG, DEFAULT_SNAPPING_DISTANCE_M,
    DEFAULT_TURN_COMPLETION_TOLERANCE_DEG, REROUTE_HEADING_ACCURACY_DEG, STATIONARY_SPEED_MPS,
};
pub use dead_reckoning::DeadReckoning;
pub use error::SessionError;
pub use events::NavigationEvent;
pub use fix::Fix;
pub use off_route::{OffRouteDecision, OffRouteDetector};
pub use pipeline::{AlwaysReroute, Ingested, RerouteHost, RoutePipeline};
pub use reroute::{build_request, PendingReroute, RerouteCoordinator, RerouteSkip};
pub use session::{FixSink, SessionBuilder, SessionHandle};
pub use session_state::SessionState;
