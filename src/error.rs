//! Error types for the air-quality twin

use std::time::Duration;

use thiserror::Error;

/// Result type alias for twin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while acquiring data, simulating or reporting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A provider did not answer within the request timeout
    #[error("Request timed out after {0:?}")]
    NetworkTimeout(Duration),

    /// Transport failure or non-2xx response
    #[error("Network error: {0}")]
    Network(String),

    /// Response body is missing expected fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Reading values are out of the accepted range
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A provider cannot be used because its credential is absent
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    /// Report request without a valid identity token
    #[error("Unauthorized: {0}")]
    AuthFailure(String),

    /// Configuration file or environment could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Geocoding returned no match for the query
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// Strategy key is not part of the catalog
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// No placement exists with this marker id
    #[error("Unknown marker: {0}")]
    UnknownMarker(u64),

    /// Report payload could not be decoded
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Report persistence failed
    #[error("Storage failed: {0}")]
    Storage(String),
}

impl Error {
    /// Create a `Network` error for a non-success HTTP status
    #[must_use]
    pub fn http_status(status: u16) -> Self {
        Self::Network(format!("HTTP {status}"))
    }

    /// Create a `ValidationFailed` error for a value outside its range
    #[must_use]
    pub fn out_of_range(field: &str, value: f64, max: f64) -> Self {
        Self::ValidationFailed(format!("{field} = {value} outside 0..={max}"))
    }

    /// Create a `MalformedResponse` error for a missing field
    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::MalformedResponse(format!("missing field `{field}`"))
    }

    /// HTTP status code the report endpoint answers with for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AuthFailure(_) => 401,
            Self::InvalidPayload(_) => 400,
            _ => 500,
        }
    }
}
