//! Route model: legs, steps and the options needed to request a replacement.
//!
//! Routes are validated once, when they are handed to the pipeline. Per-fix
//! processing relies on every step having a non-empty polyline.

mod error;
mod model;

pub use error::RouteError;
pub use model::{
    Leg, ManeuverType, Route, RouteOptions, Step, TravelProfile, Waypoint,
};
