//! Trip telemetry.
//!
//! The session hands lifecycle events to a [`TelemetrySink`]. What the sink
//! does with them (upload, batch, log) is its own concern.
//!
//! # Events
//!
//! ```text
//! Depart ──► [Reroute]* ──► Arrive
//!    └────────────────────► Cancel   (shutdown before arrival)
//! Feedback at any time
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::navigation::Fix;
use crate::progress::{AlertLevel, RouteProgress};

/// Kind of telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEventKind {
    Depart,
    Arrive,
    Cancel,
    Reroute,
    Feedback,
}

/// User-submitted feedback about the route or guidance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    /// Free-form category such as `"confusing_instruction"`.
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Progress fields attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub leg_index: usize,
    pub step_index: usize,
    pub alert_level: AlertLevel,
    pub distance_traveled: f64,
    pub distance_remaining: f64,
    pub duration_remaining: f64,
    pub fraction_traveled: f64,
}

impl From<&RouteProgress> for ProgressSummary {
    fn from(progress: &RouteProgress) -> Self {
        Self {
            leg_index: progress.leg_index(),
            step_index: progress.step_index(),
            alert_level: progress.alert_level(),
            distance_traveled: progress.distance_traveled(),
            distance_remaining: progress.distance_remaining(),
            duration_remaining: progress.duration_remaining(),
            fraction_traveled: progress.fraction_traveled(),
        }
    }
}

/// One telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub kind: TelemetryEventKind,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub progress: ProgressSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
    pub reroute_count: u32,
    /// Meters traveled this session, including discarded routes.
    pub total_distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

/// Receives telemetry events from a session.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);

    /// Deliver anything buffered. Called once at session shutdown.
    fn flush(&self) {}
}

/// Writes each event as a JSON `tracing` line.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(
                target: "routekeeper::telemetry",
                kind = ?event.kind,
                session_id = %event.session_id,
                event = %json,
                "Telemetry event"
            ),
            Err(e) => warn!(error = %e, "Failed to serialize telemetry event"),
        }
    }
}

/// Keeps events in memory. Useful for tests and for hosts that batch uploads.
#[derive(Debug, Default)]
pub struct MemoryTelemetrySink {
    events: Mutex<Vec<TelemetryEvent>>,
    flushes: Mutex<usize>,
}

impl MemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Kinds recorded so far, in order.
    pub fn kinds(&self) -> Vec<TelemetryEventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }
}

impl TelemetrySink for MemoryTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }

    fn flush(&self) {
        *self.flushes.lock() += 1;
    }
}
