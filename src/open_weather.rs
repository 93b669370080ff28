//! Secondary tier: OpenWeatherMap air-pollution API
//!
//! <https://openweathermap.org/api/air-pollution>
//!
//! CO is reported in µg/m³ by this provider and passed through unchanged.

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::geo::LngLat;
use crate::reading::PollutantReading;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/air_pollution";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    list: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    components: Option<Components>,
}

#[derive(Debug, Deserialize)]
struct Components {
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    co: Option<f64>,
    no2: Option<f64>,
}

/// Build the request URL for `at`
///
/// # Errors
///
/// * `Error::ConfigurationMissing` - no API key
/// * `Error::InvalidConfig` - `base_url` is not a valid URL
pub fn request_url(base_url: &str, at: LngLat, api_key: Option<&str>) -> Result<Url> {
    let api_key =
        api_key.ok_or_else(|| Error::ConfigurationMissing("OpenWeatherMap API key".into()))?;
    Url::parse_with_params(
        base_url,
        &[
            ("lat", at.lat.to_string()),
            ("lon", at.lng.to_string()),
            ("appid", api_key.to_string()),
        ],
    )
    .map_err(|e| Error::InvalidConfig(format!("secondary url `{base_url}`: {e}")))
}

/// Normalize an OpenWeatherMap body into a reading
///
/// # Errors
///
/// * `Error::MalformedResponse` - no `list[0].components` or a missing component
pub fn decode(body: Value) -> Result<PollutantReading> {
    let response: Response =
        serde_json::from_value(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;
    let components = response
        .list
        .into_iter()
        .next()
        .and_then(|entry| entry.components)
        .ok_or_else(|| Error::missing_field("list[0].components"))?;

    let field = |value: Option<f64>, name: &str| {
        value.ok_or_else(|| Error::missing_field(&format!("components.{name}")))
    };

    Ok(PollutantReading::new(
        field(components.pm2_5, "pm2_5")?,
        field(components.pm10, "pm10")?,
        field(components.co, "co")?,
        field(components.no2, "no2")?,
    ))
}
