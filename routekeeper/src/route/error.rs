//! Route validation errors.

use thiserror::Error;

/// Reasons a route is rejected before it enters the navigation pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    /// The route has no legs.
    #[error("Route has no legs")]
    NoLegs,

    /// A leg has no steps.
    #[error("Leg {leg} has no steps")]
    EmptyLeg { leg: usize },

    /// A step has an empty polyline.
    #[error("Step {step} of leg {leg} has an empty polyline")]
    EmptyPolyline { leg: usize, step: usize },

    /// A step contains a non-finite or out-of-range coordinate.
    #[error("Step {step} of leg {leg} contains an invalid coordinate")]
    InvalidCoordinate { leg: usize, step: usize },

    /// A step has a negative or non-finite distance or travel time.
    #[error("Step {step} of leg {leg} has an invalid distance or travel time")]
    InvalidMeasure { leg: usize, step: usize },

    /// Waypoint count does not match the leg count.
    #[error("Route has {legs} legs but {waypoints} waypoints (expected legs + 1)")]
    WaypointMismatch { legs: usize, waypoints: usize },

    /// Leg index outside the route.
    #[error("Leg index {index} out of bounds (route has {len} legs)")]
    LegIndexOutOfBounds { index: usize, len: usize },
}
