//! Configuration file support.
//!
//! Settings live in an INI file, by default at
//! `~/.config/routekeeper/config.ini`. Every key is optional; anything missing
//! keeps its default, and a missing file yields the defaults outright.
//!
//! # Example
//!
//! ```ini
//! [navigation]
//! max_distance_before_recalculating = 50
//! snapping_distance = 15
//! depart_hysteresis_secs = 3
//!
//! [dead_reckoning]
//! enabled = true
//! interval_ms = 1000
//! extrapolation_delay_ms = 1100
//!
//! [routing]
//! base_url = https://api.mapbox.com/directions/v5/mapbox
//! access_token = pk.xxx
//! timeout_secs = 10
//!
//! [logging]
//! level = info
//! file = /tmp/routekeeper.log
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::navigation::NavigationConfig;

/// Environment variable that overrides `[routing] access_token`.
pub const ACCESS_TOKEN_ENV: &str = "ROUTEKEEPER_ACCESS_TOKEN";

/// Default Directions API endpoint (profile and coordinates are appended).
pub const DEFAULT_ROUTING_BASE_URL: &str = "https://api.mapbox.com/directions/v5/mapbox";

/// Default routing request timeout in seconds.
pub const DEFAULT_ROUTING_TIMEOUT_SECS: u64 = 10;

/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors from loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for [{section}] {key}: {value:?} ({reason})")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Routing service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ROUTING_BASE_URL.to_string(),
            access_token: None,
            timeout: Duration::from_secs(DEFAULT_ROUTING_TIMEOUT_SECS),
        }
    }
}

impl RoutingConfig {
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Apply the [`ACCESS_TOKEN_ENV`] override if it is set and non-empty.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.access_token = Some(token.trim().to_string());
            }
        }
        self
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file; logs go to the console only when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// All settings loaded from one config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub navigation: NavigationConfig,
    pub routing: RoutingConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// `<config dir>/routekeeper/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("routekeeper").join("config.ini"))
    }

    /// Load from the default path, falling back to defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::with_env(Self::default())),
        }
    }

    /// Load from `path`. A missing file yields the defaults.
    ///
    /// The access-token environment override is applied after parsing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::with_env(Self::default()));
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::with_env(Self::from_ini(&ini)?))
    }

    /// Parse INI text. No environment overrides are applied.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn with_env(mut self) -> Self {
        self.routing = self.routing.with_env_override();
        self
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = ConfigFile::default();

        if let Some(props) = ini.section(Some("navigation")) {
            let nav = &mut config.navigation;
            const S: &str = "navigation";
            set(&mut nav.max_distance_before_recalculating, parse(props, S, "max_distance_before_recalculating")?);
            set(&mut nav.snapping_distance, parse(props, S, "snapping_distance")?);
            set(&mut nav.depart_hysteresis, parse_secs(props, S, "depart_hysteresis_secs")?);
            set(&mut nav.maneuver_zone_radius, parse(props, S, "maneuver_zone_radius")?);
            set(&mut nav.turn_completion_tolerance, parse(props, S, "turn_completion_tolerance")?);
            set(&mut nav.small_turn_threshold, parse(props, S, "small_turn_threshold")?);
            set(&mut nav.high_alert_interval, parse_secs(props, S, "high_alert_interval_secs")?);
            set(&mut nav.medium_alert_interval, parse_secs(props, S, "medium_alert_interval_secs")?);
            set(&mut nav.long_first_step_distance, parse(props, S, "long_first_step_distance")?);
            set(&mut nav.recent_fix_capacity, parse(props, S, "recent_fix_capacity")?);
            set(&mut nav.event_channel_capacity, parse(props, S, "event_channel_capacity")?);
        }

        if let Some(props) = ini.section(Some("dead_reckoning")) {
            let nav = &mut config.navigation;
            const S: &str = "dead_reckoning";
            set(&mut nav.dead_reckoning_enabled, parse(props, S, "enabled")?);
            set(&mut nav.dead_reckoning_interval, parse_millis(props, S, "interval_ms")?);
            set(&mut nav.extrapolation_delay, parse_millis(props, S, "extrapolation_delay_ms")?);
        }

        if let Some(props) = ini.section(Some("routing")) {
            const S: &str = "routing";
            if let Some(url) = non_empty(props, "base_url") {
                config.routing.base_url = url.trim_end_matches('/').to_string();
            }
            if let Some(token) = non_empty(props, "access_token") {
                config.routing.access_token = Some(token.to_string());
            }
            set(&mut config.routing.timeout, parse_secs(props, S, "timeout_secs")?);
        }

        if let Some(props) = ini.section(Some("logging")) {
            if let Some(level) = non_empty(props, "level") {
                config.logging.level = level.to_string();
            }
            config.logging.file = non_empty(props, "file").map(PathBuf::from);
        }

        Ok(config)
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn non_empty<'a>(props: &'a Properties, key: &str) -> Option<&'a str> {
    props.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse<T>(
    props: &Properties,
    section: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_empty(props, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            section,
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_secs(
    props: &Properties,
    section: &'static str,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(secs) = parse::<f64>(props, section, key)? else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            section,
            key,
            value: secs.to_string(),
            reason: e.to_string(),
        })
}

fn parse_millis(
    props: &Properties,
    section: &'static str,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u64>(props, section, key)?.map(Duration::from_millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = ConfigFile::parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_parse_all_sections() {
        let config = ConfigFile::parse(
            r#"
[navigation]
max_distance_before_recalculating = 75
snapping_distance = 10
depart_hysteresis_secs = 4.5
high_alert_interval_secs = 10

[dead_reckoning]
enabled = false
interval_ms = 500
extrapolation_delay_ms = 800

[routing]
base_url = http://localhost:5000/route/v1/
access_token = secret
timeout_secs = 3

[logging]
level = debug
file = /tmp/routekeeper.log
"#,
        )
        .unwrap();

        assert_eq!(config.navigation.max_distance_before_recalculating, 75.0);
        assert_eq!(config.navigation.snapping_distance, 10.0);
        assert_eq!(config.navigation.depart_hysteresis, Duration::from_millis(4500));
        assert_eq!(config.navigation.high_alert_interval, Duration::from_secs(10));
        assert!(!config.navigation.dead_reckoning_enabled);
        assert_eq!(config.navigation.dead_reckoning_interval, Duration::from_millis(500));
        assert_eq!(config.navigation.extrapolation_delay, Duration::from_millis(800));
        assert_eq!(config.routing.base_url, "http://localhost:5000/route/v1");
        assert_eq!(config.routing.access_token.as_deref(), Some("secret"));
        assert_eq!(config.routing.timeout, Duration::from_secs(3));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/routekeeper.log")));
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = ConfigFile::parse("[navigation]\nsnapping_distance = far\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                section: "navigation",
                key: "snapping_distance",
                ..
            }
        ));
    }

    #[test]
    fn test_negative_duration_is_reported() {
        let err = ConfigFile::parse("[navigation]\ndepart_hysteresis_secs = -1\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let config = ConfigFile::parse("[routing]\naccess_token =\n[logging]\nlevel =\n").unwrap();
        assert_eq!(config.routing.access_token, None);
        assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config.navigation, NavigationConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[navigation]").unwrap();
        writeln!(file, "maneuver_zone_radius = 25").unwrap();
        file.flush().unwrap();

        let config = ConfigFile::load(file.path()).unwrap();
        assert_eq!(config.navigation.maneuver_zone_radius, 25.0);
    }

    #[test]
    fn test_default_path_ends_with_config_ini() {
        if let Some(path) = ConfigFile::default_path() {
            assert!(path.ends_with("routekeeper/config.ini"));
        }
    }
}
