//! Session error types.

use thiserror::Error;

use crate::location::LocationError;
use crate::route::RouteError;

/// Errors from session setup and the session handle.
///
/// Setup errors abort construction; a session never runs degraded.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The route handed to the session failed validation.
    #[error("invalid route: {0}")]
    InvalidRoute(#[from] RouteError),

    /// No routing service was configured.
    #[error("no routing service configured")]
    MissingRoutingService,

    /// A threshold is out of range.
    #[error("invalid navigation config: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// The session was started outside a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// The location source refused to start.
    #[error("location source error: {0}")]
    Location(#[from] LocationError),

    /// The session actor has stopped.
    #[error("navigation session is closed")]
    Closed,
}
