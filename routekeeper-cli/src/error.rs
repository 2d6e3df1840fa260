//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use routekeeper::config::ConfigError;
use routekeeper::location::LocationError;
use routekeeper::logging::LoggingError;
use routekeeper::navigation::SessionError;
use routekeeper::route::RouteError;
use routekeeper::routing::RoutingError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Read { path: PathBuf, message: String },
    InvalidInput(String),
    Route(RouteError),
    Routing(RoutingError),
    Session(SessionError),
    Runtime(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "Logging setup failed: {}", e),
            CliError::Read { path, message } => {
                write!(f, "Failed to read {}: {}", path.display(), message)
            }
            CliError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CliError::Route(e) => write!(f, "Invalid route: {}", e),
            CliError::Routing(e) => write!(f, "Routing error: {}", e),
            CliError::Session(e) => write!(f, "Navigation session error: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<RouteError> for CliError {
    fn from(e: RouteError) -> Self {
        CliError::Route(e)
    }
}

impl From<RoutingError> for CliError {
    fn from(e: RoutingError) -> Self {
        CliError::Routing(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}

impl From<LocationError> for CliError {
    fn from(e: LocationError) -> Self {
        CliError::Session(SessionError::Location(e))
    }
}
