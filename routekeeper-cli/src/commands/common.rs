//! Input loading shared across CLI commands.

use std::fs;
use std::path::Path;

use routekeeper::navigation::Fix;
use routekeeper::route::{Route, TravelProfile};
use routekeeper::routing::parse_directions;

use crate::error::CliError;

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|e| CliError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load and validate a route file.
///
/// Accepts either a serialized [`Route`] or a raw Directions API response
/// (recognized by its top-level `code` field). `profile` overrides the route's
/// own profile when given.
pub fn load_route(path: &Path, profile: Option<TravelProfile>) -> Result<Route, CliError> {
    let contents = read(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| CliError::InvalidInput(format!("{}: {}", path.display(), e)))?;

    let mut route = if value.get("code").is_some() {
        parse_directions(&contents, profile.unwrap_or_default())?
    } else {
        serde_json::from_value::<Route>(value)
            .map_err(|e| CliError::InvalidInput(format!("{}: {}", path.display(), e)))?
    };

    if let Some(profile) = profile {
        route.options.profile = profile;
    }
    route.validate()?;
    Ok(route)
}

/// Load a JSON array of recorded fixes.
pub fn load_fixes(path: &Path) -> Result<Vec<Fix>, CliError> {
    let contents = read(path)?;
    let fixes: Vec<Fix> = serde_json::from_str(&contents)
        .map_err(|e| CliError::InvalidInput(format!("{}: {}", path.display(), e)))?;
    if fixes.is_empty() {
        return Err(CliError::InvalidInput(format!(
            "{}: no fixes recorded",
            path.display()
        )));
    }
    Ok(fixes)
}
