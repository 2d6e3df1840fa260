//! Events published by a navigation session.

use std::sync::Arc;

use crate::progress::RouteProgress;
use crate::route::Route;
use crate::routing::RoutingError;

use super::fix::Fix;

/// Notifications broadcast to session subscribers.
///
/// Progress values are snapshots; the live model stays inside the session.
/// For one reroute, `WillReroute` is always delivered before the matching
/// `DidReroute` or `DidFailToReroute`.
#[derive(Debug, Clone)]
pub enum NavigationEvent {
    /// A fix arrived, before any filtering.
    FixReceived { fix: Fix },

    /// A qualified on-route fix was processed.
    ProgressChanged {
        progress: RouteProgress,
        fix: Fix,
        seconds_remaining_on_step: f64,
    },

    /// The alert level changed or the step advanced.
    AlertLevelChanged {
        progress: RouteProgress,
        distance_to_maneuver: f64,
    },

    /// The user reached the end of a leg.
    DidArrive { progress: RouteProgress },

    /// A reroute request is about to be issued from `fix`.
    WillReroute { fix: Fix },

    /// A replacement route was adopted.
    DidReroute { route: Arc<Route> },

    /// A reroute request failed; the previous route stays active.
    DidFailToReroute { error: RoutingError },
}

impl NavigationEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            NavigationEvent::FixReceived { .. } => "fix_received",
            NavigationEvent::ProgressChanged { .. } => "progress_changed",
            NavigationEvent::AlertLevelChanged { .. } => "alert_level_changed",
            NavigationEvent::DidArrive { .. } => "did_arrive",
            NavigationEvent::WillReroute { .. } => "will_reroute",
            NavigationEvent::DidReroute { .. } => "did_reroute",
            NavigationEvent::DidFailToReroute { .. } => "did_fail_to_reroute",
        }
    }
}
