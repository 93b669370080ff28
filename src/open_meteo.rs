//! Primary tier: Open-Meteo air-quality API
//!
//! <https://open-meteo.com/en/docs/air-quality-api>

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::geo::LngLat;
use crate::reading::PollutantReading;

pub const DEFAULT_BASE_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

const CURRENT_FIELDS: &str = "pm10,pm2_5,carbon_monoxide,nitrogen_dioxide";

#[derive(Debug, Deserialize)]
struct Response {
    current: Option<Current>,
}

#[derive(Debug, Deserialize)]
struct Current {
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    carbon_monoxide: Option<f64>,
    nitrogen_dioxide: Option<f64>,
}

/// Build the request URL for the current conditions at `at`
///
/// # Errors
///
/// * `Error::InvalidConfig` - `base_url` is not a valid URL
pub fn request_url(base_url: &str, at: LngLat) -> Result<Url> {
    Url::parse_with_params(
        base_url,
        &[
            ("latitude", at.lat.to_string()),
            ("longitude", at.lng.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
        ],
    )
    .map_err(|e| Error::InvalidConfig(format!("primary url `{base_url}`: {e}")))
}

/// Normalize an Open-Meteo body into a reading
///
/// # Errors
///
/// * `Error::MalformedResponse` - `current` block or one of its fields is missing
pub fn decode(body: Value) -> Result<PollutantReading> {
    let response: Response =
        serde_json::from_value(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;
    let current = response
        .current
        .ok_or_else(|| Error::missing_field("current"))?;

    Ok(PollutantReading::new(
        current.pm2_5.ok_or_else(|| Error::missing_field("current.pm2_5"))?,
        current.pm10.ok_or_else(|| Error::missing_field("current.pm10"))?,
        current
            .carbon_monoxide
            .ok_or_else(|| Error::missing_field("current.carbon_monoxide"))?,
        current
            .nitrogen_dioxide
            .ok_or_else(|| Error::missing_field("current.nitrogen_dioxide"))?,
    ))
}
