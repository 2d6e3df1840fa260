//! User-facing proximity to the next maneuver.

use serde::{Deserialize, Serialize};

/// Proximity classification surfaced to the user.
///
/// Totally ordered: `None < Depart < High < Medium < Low < Arrive`. Within a
/// step the level only ever moves up this order; see the alert machine's
/// acceptance rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Nothing announced yet.
    #[default]
    None,
    /// Start of the trip.
    Depart,
    /// Maneuver is imminent.
    High,
    /// Maneuver is approaching.
    Medium,
    /// Maneuver just completed; next one is far away.
    Low,
    /// Destination reached. Terminal for the leg.
    Arrive,
}

impl AlertLevel {
    /// Human-readable name for logging/UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Depart => "depart",
            AlertLevel::High => "high",
            AlertLevel::Medium => "medium",
            AlertLevel::Low => "low",
            AlertLevel::Arrive => "arrive",
        }
    }

    /// Whether no further transitions happen on this leg.
    pub fn is_terminal(&self) -> bool {
        *self == AlertLevel::Arrive
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
