//! Routing service boundary.
//!
//! The pipeline never computes routes itself. It hands a [`RouteRequest`] to a
//! [`RoutingService`] and adopts whatever comes back.
//!
//! # Implementations
//!
//! - [`HttpRoutingService`] - Directions HTTP API over `reqwest`
//! - [`OfflineRoutingService`] - always fails; used for replay without network

mod directions;
mod http;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::route::{Route, RouteError, TravelProfile, Waypoint};

pub use directions::parse_directions;
pub use http::HttpRoutingService;

/// Heading hint for the origin of a request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingHint {
    /// Direction of travel in degrees.
    pub heading: f64,
    /// Allowed deviation in degrees.
    pub accuracy: f64,
}

/// A request for a replacement route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Origin first, then the stops still ahead.
    pub waypoints: Vec<Waypoint>,
    pub profile: TravelProfile,
    /// Hint for the origin waypoint.
    pub heading: Option<HeadingHint>,
}

/// Errors from a routing service.
///
/// `Clone` so the error can ride the event broadcast channel.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RoutingError {
    #[error("network error: {0}")]
    Network(String),

    #[error("no route found: {0}")]
    NoRoute(String),

    #[error("invalid routing response: {0}")]
    InvalidResponse(String),

    #[error("route request cancelled")]
    Cancelled,

    #[error("routing service requires an access token")]
    MissingCredentials,

    #[error("routing service returned an unusable route: {0}")]
    InvalidRoute(#[from] RouteError),
}

/// Computes routes between waypoints.
///
/// Implementations must be cheap to call concurrently; the session issues at
/// most one request at a time but a cancelled request may still be finishing.
pub trait RoutingService: Send + Sync {
    /// Compute a route for `request`.
    fn calculate(&self, request: RouteRequest) -> BoxFuture<'_, Result<Route, RoutingError>>;
}

/// Routing service with no backend. Every request fails with
/// [`RoutingError::Network`].
#[derive(Debug, Clone, Default)]
pub struct OfflineRoutingService;

impl RoutingService for OfflineRoutingService {
    fn calculate(&self, _request: RouteRequest) -> BoxFuture<'_, Result<Route, RoutingError>> {
        Box::pin(async { Err(RoutingError::Network("routing is offline".to_string())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coordinate;

    #[tokio::test]
    async fn test_offline_service_always_fails() {
        let service = OfflineRoutingService;
        let request = RouteRequest {
            waypoints: vec![
                Waypoint::new(Coordinate::new(0.0, 0.0)),
                Waypoint::new(Coordinate::new(1.0, 1.0)),
            ],
            profile: TravelProfile::Driving,
            heading: None,
        };

        let result = service.calculate(request).await;
        assert!(matches!(result, Err(RoutingError::Network(_))));
    }

    #[test]
    fn test_invalid_route_converts() {
        let err: RoutingError = RouteError::NoLegs.into();
        assert_eq!(err, RoutingError::InvalidRoute(RouteError::NoLegs));
        assert!(err.to_string().contains("unusable route"));
    }
}
