//! Route, leg and step types.
//!
//! A [`Route`] is immutable once it enters the pipeline and is shared as
//! `Arc<Route>` between the live progress model and event snapshots.

use serde::{Deserialize, Serialize};

use crate::geometry::{self, Coordinate};

use super::error::RouteError;

/// Travel mode the route was computed for.
///
/// Alert distances scale with the profile (a highway approach needs a much
/// earlier cue than a footpath).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TravelProfile {
    #[default]
    Driving,
    DrivingTraffic,
    Cycling,
    Walking,
}

impl TravelProfile {
    /// Profile identifier used by the routing service.
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelProfile::Driving => "driving",
            TravelProfile::DrivingTraffic => "driving-traffic",
            TravelProfile::Cycling => "cycling",
            TravelProfile::Walking => "walking",
        }
    }
}

impl std::fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TravelProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches("mapbox/") {
            "driving" => Ok(TravelProfile::Driving),
            "driving-traffic" => Ok(TravelProfile::DrivingTraffic),
            "cycling" => Ok(TravelProfile::Cycling),
            "walking" => Ok(TravelProfile::Walking),
            other => Err(format!("unknown travel profile: {}", other)),
        }
    }
}

/// Maneuver performed at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManeuverType {
    #[serde(rename = "depart")]
    Depart,
    #[serde(rename = "turn")]
    Turn,
    #[serde(rename = "continue")]
    Continue,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "on ramp")]
    OnRamp,
    #[serde(rename = "off ramp")]
    OffRamp,
    #[serde(rename = "fork")]
    Fork,
    #[serde(rename = "end of road")]
    EndOfRoad,
    #[serde(rename = "new name")]
    NewName,
    #[serde(rename = "roundabout")]
    Roundabout,
    #[serde(rename = "rotary")]
    Rotary,
    #[serde(rename = "notification")]
    Notification,
    #[serde(rename = "arrive")]
    Arrive,
    #[serde(other)]
    Other,
}

/// One maneuver-to-maneuver segment of a leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step geometry, starting at the maneuver location.
    pub coordinates: Vec<Coordinate>,
    /// Maneuver performed at the start of this step.
    pub maneuver_type: ManeuverType,
    /// Where the maneuver happens.
    pub maneuver_location: Coordinate,
    /// Heading approaching the maneuver (degrees).
    pub initial_heading: f64,
    /// Heading leaving the maneuver (degrees).
    pub final_heading: f64,
    /// Step length in meters.
    pub distance: f64,
    /// Expected time to traverse the step in seconds.
    pub expected_travel_time: f64,
    /// Road name.
    #[serde(default)]
    pub name: String,
    /// Spoken/visual instruction, if the routing service supplied one.
    #[serde(default)]
    pub instruction: Option<String>,
}

impl Step {
    /// Net turning angle of the maneuver, in `[0, 180]`.
    pub fn turning_angle(&self) -> f64 {
        geometry::bearing_difference(self.initial_heading, self.final_heading)
    }
}

/// Steps between two consecutive waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub steps: Vec<Step>,
    #[serde(default)]
    pub summary: String,
}

impl Leg {
    /// Sum of step distances in meters.
    pub fn distance(&self) -> f64 {
        self.steps.iter().map(|s| s.distance).sum()
    }

    /// Sum of step travel times in seconds.
    pub fn expected_travel_time(&self) -> f64 {
        self.steps.iter().map(|s| s.expected_travel_time).sum()
    }
}

/// A user-specified stop the route passes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    #[serde(default)]
    pub name: Option<String>,
}

impl Waypoint {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            name: None,
        }
    }
}

/// Options the route was requested with; needed to build a reroute request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    /// Origin, intermediate stops and destination, in order.
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub profile: TravelProfile,
}

/// A precomputed multi-leg route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub legs: Vec<Leg>,
    pub options: RouteOptions,
}

impl Route {
    /// Total distance in meters.
    pub fn distance(&self) -> f64 {
        self.legs.iter().map(Leg::distance).sum()
    }

    /// Total expected travel time in seconds.
    pub fn expected_travel_time(&self) -> f64 {
        self.legs.iter().map(Leg::expected_travel_time).sum()
    }

    /// First step of the first leg.
    pub fn first_step(&self) -> Option<&Step> {
        self.legs.first()?.steps.first()
    }

    /// Whole-route polyline: every step's coordinates concatenated in order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .flat_map(|step| step.coordinates.iter().copied())
            .collect()
    }

    /// Check the route is usable by the pipeline.
    ///
    /// Every step must have a non-empty polyline of valid coordinates and
    /// finite, non-negative measures. When waypoints are given there must be
    /// exactly one more than there are legs.
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.legs.is_empty() {
            return Err(RouteError::NoLegs);
        }

        for (leg_index, leg) in self.legs.iter().enumerate() {
            if leg.steps.is_empty() {
                return Err(RouteError::EmptyLeg { leg: leg_index });
            }

            for (step_index, step) in leg.steps.iter().enumerate() {
                if step.coordinates.is_empty() {
                    return Err(RouteError::EmptyPolyline {
                        leg: leg_index,
                        step: step_index,
                    });
                }
                if !step.maneuver_location.is_valid()
                    || step.coordinates.iter().any(|c| !c.is_valid())
                {
                    return Err(RouteError::InvalidCoordinate {
                        leg: leg_index,
                        step: step_index,
                    });
                }
                let measures_ok = step.distance.is_finite()
                    && step.distance >= 0.0
                    && step.expected_travel_time.is_finite()
                    && step.expected_travel_time >= 0.0;
                if !measures_ok {
                    return Err(RouteError::InvalidMeasure {
                        leg: leg_index,
                        step: step_index,
                    });
                }
            }
        }

        let waypoints = self.options.waypoints.len();
        if waypoints != 0 && waypoints != self.legs.len() + 1 {
            return Err(RouteError::WaypointMismatch {
                legs: self.legs.len(),
                waypoints,
            });
        }

        Ok(())
    }
}
