//! Directions API response parsing.
//!
//! Only the fields the pipeline needs are read. Geometries must be GeoJSON
//! (`geometries=geojson`); coordinates arrive as `[longitude, latitude]`.

use serde::Deserialize;
use tracing::debug;

use crate::geometry::Coordinate;
use crate::route::{Leg, ManeuverType, Route, RouteOptions, Step, TravelProfile, Waypoint};

use super::RoutingError;

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<WireRoute>,
    #[serde(default)]
    waypoints: Vec<WireWaypoint>,
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    legs: Vec<WireLeg>,
}

#[derive(Debug, Deserialize)]
struct WireLeg {
    #[serde(default)]
    summary: String,
    steps: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
struct WireStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    geometry: WireGeometry,
    maneuver: WireManeuver,
}

#[derive(Debug, Deserialize)]
struct WireGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct WireManeuver {
    #[serde(rename = "type")]
    maneuver_type: ManeuverType,
    location: [f64; 2],
    #[serde(default)]
    bearing_before: f64,
    #[serde(default)]
    bearing_after: f64,
    #[serde(default)]
    instruction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireWaypoint {
    location: [f64; 2],
    #[serde(default)]
    name: Option<String>,
}

/// Convert a Directions JSON response into a validated [`Route`].
///
/// The first route in the response is used. Error codes such as `NoRoute` map
/// to [`RoutingError::NoRoute`]; anything structurally wrong maps to
/// [`RoutingError::InvalidResponse`].
pub fn parse_directions(json: &str, profile: TravelProfile) -> Result<Route, RoutingError> {
    let response: DirectionsResponse = serde_json::from_str(json)
        .map_err(|e| RoutingError::InvalidResponse(e.to_string()))?;

    if response.code != "Ok" {
        let detail = response.message.unwrap_or_else(|| response.code.clone());
        return Err(match response.code.as_str() {
            "NoRoute" | "NoSegment" | "NoMatch" => RoutingError::NoRoute(detail),
            _ => RoutingError::InvalidResponse(detail),
        });
    }

    let wire_route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::NoRoute("response contained no routes".to_string()))?;

    let legs: Vec<Leg> = wire_route.legs.into_iter().map(convert_leg).collect();
    let waypoints = response
        .waypoints
        .into_iter()
        .map(|w| Waypoint {
            coordinate: Coordinate::from_lon_lat(w.location),
            name: w.name.filter(|n| !n.is_empty()),
        })
        .collect();

    let route = Route {
        legs,
        options: RouteOptions { waypoints, profile },
    };
    route.validate()?;

    debug!(
        legs = route.legs.len(),
        distance_m = format!("{:.0}", route.distance()),
        "Parsed directions response"
    );
    Ok(route)
}

fn convert_leg(leg: WireLeg) -> Leg {
    Leg {
        summary: leg.summary,
        steps: leg.steps.into_iter().map(convert_step).collect(),
    }
}

fn convert_step(step: WireStep) -> Step {
    Step {
        coordinates: step
            .geometry
            .coordinates
            .into_iter()
            .map(Coordinate::from_lon_lat)
            .collect(),
        maneuver_type: step.maneuver.maneuver_type,
        maneuver_location: Coordinate::from_lon_lat(step.maneuver.location),
        initial_heading: step.maneuver.bearing_before,
        final_heading: step.maneuver.bearing_after,
        distance: step.distance,
        expected_travel_time: step.duration,
        name: step.name,
        instruction: step.maneuver.instruction,
    }
}
