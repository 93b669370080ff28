//! Geographic primitives shared by the pipeline, the scenario and the heat field

use serde::{Deserialize, Serialize};

/// Meters per degree used by the equirectangular approximation
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A longitude/latitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    #[must_use]
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Planar distance in meters, scaling both axes by [`METERS_PER_DEGREE`].
    ///
    /// Good enough for the few hundred meters the heat field cares about.
    #[must_use]
    pub fn distance_m(&self, other: &Self) -> f64 {
        let dx = (self.lng - other.lng) * METERS_PER_DEGREE;
        let dy = (self.lat - other.lat) * METERS_PER_DEGREE;
        dx.hypot(dy)
    }

    /// Distance in degrees, used for hotspot disk membership
    #[must_use]
    pub fn distance_deg(&self, other: &Self) -> f64 {
        (self.lng - other.lng).hypot(self.lat - other.lat)
    }
}

/// Pixel position of a marker on the rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// The location the twin is currently looking at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: LngLat,
    pub label: String,
}

impl Location {
    #[must_use]
    pub fn new(lng: f64, lat: f64, label: impl Into<String>) -> Self {
        Self {
            coordinates: LngLat::new(lng, lat),
            label: label.into(),
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(73.855, 18.625, "Bhosari, Pune")
    }
}
