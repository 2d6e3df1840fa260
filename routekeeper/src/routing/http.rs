//! Directions HTTP API client.

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::route::Route;

use super::directions::parse_directions;
use super::{RouteRequest, RoutingError, RoutingService};

/// Routing service backed by a Directions-compatible HTTP endpoint.
///
/// Requests `GET {base_url}/{profile}/{lon,lat;lon,lat...}` with step
/// instructions and GeoJSON geometries.
pub struct HttpRoutingService {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl std::fmt::Debug for HttpRoutingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRoutingService")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpRoutingService {
    /// Create a client from `config`.
    ///
    /// Fails with [`RoutingError::MissingCredentials`] when no access token is
    /// configured; a session must not start without a working reroute path.
    pub fn new(config: &RoutingConfig) -> Result<Self, RoutingError> {
        let access_token = config
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(RoutingError::MissingCredentials)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RoutingError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Request URL without query parameters.
    pub fn request_url(&self, request: &RouteRequest) -> String {
        let coordinates: Vec<String> = request
            .waypoints
            .iter()
            .map(|w| w.coordinate.to_lon_lat_string())
            .collect();
        format!(
            "{}/{}/{}",
            self.base_url,
            request.profile.as_str(),
            coordinates.join(";")
        )
    }

    /// Query parameters for `request`. The access token is included.
    pub fn query_params(&self, request: &RouteRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("access_token", self.access_token.clone()),
            ("steps", "true".to_string()),
            ("geometries", "geojson".to_string()),
            ("overview", "full".to_string()),
            ("alternatives", "false".to_string()),
        ];

        if let Some(hint) = request.heading {
            // One entry per waypoint; only the origin is constrained.
            let mut bearings = vec![format!("{:.0},{:.0}", hint.heading, hint.accuracy)];
            bearings.extend(std::iter::repeat(String::new()).take(request.waypoints.len().saturating_sub(1)));
            params.push(("bearings", bearings.join(";")));
        }

        params
    }

    async fn fetch(&self, request: RouteRequest) -> Result<Route, RoutingError> {
        if request.waypoints.len() < 2 {
            return Err(RoutingError::NoRoute(format!(
                "need at least two waypoints, got {}",
                request.waypoints.len()
            )));
        }

        let url = self.request_url(&request);
        debug!(url = %url, waypoints = request.waypoints.len(), "Requesting route");

        let response = self
            .client
            .get(&url)
            .query(&self.query_params(&request))
            .send()
            .await
            .map_err(|e| RoutingError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RoutingError::Network(format!("Failed to read response: {}", e)))?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(status = %status, "Routing service rejected credentials");
            return Err(RoutingError::MissingCredentials);
        }

        // Directions errors such as NoRoute come back as 4xx with a JSON body.
        match parse_directions(&body, request.profile) {
            Ok(route) => Ok(route),
            Err(RoutingError::InvalidResponse(detail)) if !status.is_success() => {
                Err(RoutingError::Network(format!("HTTP {}: {}", status, detail)))
            }
            Err(e) => Err(e),
        }
    }
}

impl RoutingService for HttpRoutingService {
    fn calculate(&self, request: RouteRequest) -> BoxFuture<'_, Result<Route, RoutingError>> {
        Box::pin(self.fetch(request))
    }
}
