//! Trip bookkeeping for telemetry.
//!
//! Written by the pipeline, read only through snapshots. The detector and the
//! alert machine never consult it.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::fix::Fix;

/// Per-session trip state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    /// Identifier telemetry events are keyed by.
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub departed_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub reroute_count: u32,
    pub last_reroute_at: Option<DateTime<Utc>>,
    /// Meters traveled on routes since discarded by reroutes.
    pub past_distance: f64,
    /// Most recent fixes, oldest first.
    recent_fixes: VecDeque<Fix>,
    #[serde(skip)]
    capacity: usize,
}

impl SessionState {
    pub fn new(capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            departed_at: None,
            arrived_at: None,
            reroute_count: 0,
            last_reroute_at: None,
            past_distance: 0.0,
            recent_fixes: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Remember `fix`, evicting the oldest when full.
    pub fn record_fix(&mut self, fix: &Fix) {
        if self.recent_fixes.len() >= self.capacity {
            self.recent_fixes.pop_front();
        }
        self.recent_fixes.push_back(fix.clone());
    }

    /// Record departure. Returns `true` the first time only.
    pub fn record_departure(&mut self, at: DateTime<Utc>) -> bool {
        if self.departed_at.is_some() {
            return false;
        }
        self.departed_at = Some(at);
        true
    }

    /// Record arrival at the final destination.
    pub fn record_arrival(&mut self, at: DateTime<Utc>) {
        self.arrived_at = Some(at);
    }

    /// Record an adopted reroute, keeping the distance covered on the
    /// discarded route.
    pub fn record_reroute(&mut self, at: DateTime<Utc>, discarded_distance: f64) {
        self.reroute_count += 1;
        self.last_reroute_at = Some(at);
        self.past_distance += discarded_distance.max(0.0);
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived_at.is_some()
    }

    /// Total meters traveled this session given the distance on the current route.
    pub fn total_distance(&self, current_route_distance: f64) -> f64 {
        self.past_distance + current_route_distance
    }

    pub fn recent_fixes(&self) -> impl Iterator<Item = &Fix> {
        self.recent_fixes.iter()
    }

    pub fn recent_fix_count(&self) -> usize {
        self.recent_fixes.len()
    }

    pub fn last_fix(&self) -> Option<&Fix> {
        self.recent_fixes.back()
    }
}
