//! Free-text location search via the Open-Meteo geocoding API

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::geo::Location;

pub const DEFAULT_BASE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
    latitude: f64,
    longitude: f64,
    name: String,
    country: Option<String>,
}

/// Build a search URL for the first match of `query`
///
/// # Errors
///
/// * `Error::InvalidConfig` - `base_url` is not a valid URL
pub fn request_url(base_url: &str, query: &str) -> Result<Url> {
    Url::parse_with_params(
        base_url,
        &[
            ("name", query),
            ("count", "1"),
            ("language", "en"),
            ("format", "json"),
        ],
    )
    .map_err(|e| Error::InvalidConfig(format!("geocoding url `{base_url}`: {e}")))
}

/// Pick the first result of a geocoding body
///
/// # Errors
///
/// * `Error::LocationNotFound` - the result list is absent or empty
/// * `Error::MalformedResponse` - a result lacks coordinates or a name
pub fn decode(body: Value, query: &str) -> Result<Location> {
    let response: Response =
        serde_json::from_value(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;
    let place = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| Error::LocationNotFound(query.to_string()))?;

    let label = match place.country {
        Some(country) => format!("{}, {country}", place.name),
        None => place.name,
    };
    Ok(Location::new(place.longitude, place.latitude, label))
}
