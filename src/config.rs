//! Runtime configuration
//!
//! Values come from a TOML file whose keys are the same names as the
//! environment variables; any key missing from the file falls back to the
//! process environment, then to the built-in default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::geo::Location;
use crate::{geocoding, open_meteo, open_weather};

pub const ENV_PRIMARY_URL: &str = "AQI_TWIN_PRIMARY_URL";
pub const ENV_SECONDARY_URL: &str = "AQI_TWIN_SECONDARY_URL";
pub const ENV_OPENWEATHER_API_KEY: &str = "AQI_TWIN_OPENWEATHER_API_KEY";
pub const ENV_GEOCODING_URL: &str = "AQI_TWIN_GEOCODING_URL";
pub const ENV_TIMEOUT_MS: &str = "AQI_TWIN_TIMEOUT_MS";
pub const ENV_REFRESH_SECS: &str = "AQI_TWIN_REFRESH_SECS";
pub const ENV_RETRY_SECS: &str = "AQI_TWIN_RETRY_SECS";
pub const ENV_DEFAULT_LAT: &str = "AQI_TWIN_DEFAULT_LAT";
pub const ENV_DEFAULT_LNG: &str = "AQI_TWIN_DEFAULT_LNG";
pub const ENV_DEFAULT_LABEL: &str = "AQI_TWIN_DEFAULT_LABEL";

pub const DEFAULT_CONFIG_FILE_NAME: &str = "aqi-twin.toml";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Placeholder shipped in sample configs instead of a real key
const API_KEY_PLACEHOLDER: &str = "INSERT";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub primary_url: String,
    pub secondary_url: String,
    /// `None` makes the secondary tier fail permanently
    pub secondary_api_key: Option<String>,
    pub geocoding_url: String,
    pub request_timeout: Duration,
    pub refresh_interval: Duration,
    pub retry_interval: Duration,
    pub default_location: Location,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_url: open_meteo::DEFAULT_BASE_URL.to_string(),
            secondary_url: open_weather::DEFAULT_BASE_URL.to_string(),
            secondary_api_key: None,
            geocoding_url: geocoding::DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            default_location: Location::default(),
        }
    }
}

impl Config {
    /// Load from `aqi-twin.toml` in the working directory if present, else from the environment
    ///
    /// # Errors
    ///
    /// * `Error::InvalidConfig` - unreadable file or unparsable value
    pub fn from_default_sources() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE_NAME);
        if path.exists() {
            return Self::from_config_file(path);
        }
        Self::from_env()
    }

    /// # Errors
    ///
    /// * `Error::InvalidConfig` - unreadable file, invalid TOML or unparsable value
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("read {} failed: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// # Errors
    ///
    /// * `Error::InvalidConfig` - invalid TOML or unparsable value
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| Error::InvalidConfig(e.message().to_string()))?;

        Self::from_env_with(|key| {
            table
                .get(key)
                .and_then(toml_value_to_string)
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// # Errors
    ///
    /// * `Error::InvalidConfig` - unparsable value
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    fn from_env_with<F>(mut getter: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut get = |key: &str| getter(key).filter(|value| !value.trim().is_empty());

        let secondary_api_key = get(ENV_OPENWEATHER_API_KEY)
            .filter(|key| !key.contains(API_KEY_PLACEHOLDER));

        let default_location = match (get(ENV_DEFAULT_LNG), get(ENV_DEFAULT_LAT)) {
            (Some(lng), Some(lat)) => Location::new(
                parse_number(ENV_DEFAULT_LNG, &lng)?,
                parse_number(ENV_DEFAULT_LAT, &lat)?,
                get(ENV_DEFAULT_LABEL).unwrap_or_else(|| format!("{lat}, {lng}")),
            ),
            (None, None) => defaults.default_location,
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "{ENV_DEFAULT_LAT} and {ENV_DEFAULT_LNG} must be set together"
                )));
            }
        };

        let request_timeout =
            parse_duration(get(ENV_TIMEOUT_MS), ENV_TIMEOUT_MS, Duration::from_millis)?;
        let refresh_interval =
            parse_duration(get(ENV_REFRESH_SECS), ENV_REFRESH_SECS, Duration::from_secs)?;
        let retry_interval =
            parse_duration(get(ENV_RETRY_SECS), ENV_RETRY_SECS, Duration::from_secs)?;

        Ok(Self {
            primary_url: get(ENV_PRIMARY_URL).unwrap_or(defaults.primary_url),
            secondary_url: get(ENV_SECONDARY_URL).unwrap_or(defaults.secondary_url),
            secondary_api_key,
            geocoding_url: get(ENV_GEOCODING_URL).unwrap_or(defaults.geocoding_url),
            request_timeout: request_timeout.unwrap_or(defaults.request_timeout),
            refresh_interval: refresh_interval.unwrap_or(defaults.refresh_interval),
            retry_interval: retry_interval.unwrap_or(defaults.retry_interval),
            default_location,
        })
    }
}

fn toml_value_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        _ => None,
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::InvalidConfig(format!("{key}: `{value}` is not a number")))
}

fn parse_duration(
    value: Option<String>,
    key: &str,
    unit: fn(u64) -> Duration,
) -> Result<Option<Duration>> {
    value
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(unit)
                .map_err(|_| Error::InvalidConfig(format!("{key}: `{value}` is not an integer")))
        })
        .transpose()
}
