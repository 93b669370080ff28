//! Heuristic pollution heat field for map visualization
//!
//! Five hotspot archetypes sit around the current location. Each is sampled
//! with area-uniform random points whose intensity reflects the projected
//! value, the global scenario effect and a distance-decayed local effect of
//! nearby markers. This is a visual aid, not a dispersion model.

use std::f64::consts::TAU;

use rand::Rng;
use serde::Serialize;
use serde_json::{Value, json};

use crate::geo::LngLat;
use crate::scenario::{Interventions, Projection, ViewMode};

pub const SAMPLES_PER_HOTSPOT: usize = 60;
/// Markers further away than this have no local effect
pub const INFLUENCE_RADIUS_M: f64 = 500.0;
pub const LOCAL_REDUCTION_CAP: f64 = 0.9;
/// Points at or below this intensity are dropped
pub const VISIBILITY_THRESHOLD: f64 = 0.05;
/// ±20 % multiplicative noise
pub const JITTER: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotKind {
    Industrial,
    Traffic,
    Construction,
    Residential,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hotspot {
    pub center: LngLat,
    pub kind: HotspotKind,
    pub multiplier: f64,
    /// Sampling radius in degrees
    pub radius: f64,
}

/// The fixed hotspot layout around `center`
#[must_use]
pub fn hotspots_around(center: LngLat) -> [Hotspot; 5] {
    let at = |dlng: f64, dlat: f64, kind: HotspotKind, multiplier: f64, radius: f64| Hotspot {
        center: LngLat::new(center.lng + dlng, center.lat + dlat),
        kind,
        multiplier,
        radius,
    };
    [
        at(-0.003, 0.002, HotspotKind::Industrial, 1.8, 0.008),
        at(0.002, 0.0, HotspotKind::Traffic, 1.6, 0.007),
        at(-0.001, -0.002, HotspotKind::Construction, 1.7, 0.006),
        at(0.004, 0.003, HotspotKind::Residential, 1.0, 0.009),
        at(-0.004, -0.001, HotspotKind::Traffic, 1.4, 0.006),
    ]
}

/// Scenario values that drive the field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatSignal {
    /// Projected headline value of the current view
    pub intensity: f64,
    pub view: ViewMode,
    pub total_reduction: f64,
    pub total_increase: f64,
}

impl From<&Projection> for HeatSignal {
    fn from(projection: &Projection) -> Self {
        Self {
            intensity: projection.display.projected,
            view: projection.view,
            total_reduction: projection.total_pollutant_reduction,
            total_increase: projection.total_pollutant_increase,
        }
    }
}

/// One rendered point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatPoint {
    pub position: LngLat,
    pub intensity: f64,
    /// Index of the hotspot the point was sampled from
    pub hotspot: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct LocalImpact {
    reduction: f64,
    increase: f64,
}

fn local_impact(point: LngLat, interventions: &Interventions) -> LocalImpact {
    let mut impact = LocalImpact::default();
    for placement in interventions.placements() {
        let adoption = interventions.adoption(placement.strategy);
        if adoption <= 0.0 {
            continue;
        }
        let dist = point.distance_m(&placement.position);
        if dist >= INFLUENCE_RADIUS_M {
            continue;
        }
        let effect = (1.0 - dist / INFLUENCE_RADIUS_M) * adoption * 0.5;
        if placement.strategy.strategy().is_negative() {
            impact.increase += effect;
        } else {
            impact.reduction += effect;
        }
    }
    impact.reduction = impact.reduction.min(LOCAL_REDUCTION_CAP);
    impact
}

/// Intensity of a point before jitter and clamping
fn base_intensity(signal: &HeatSignal, multiplier: f64, local_factor: f64) -> f64 {
    match signal.view {
        // AQI already reflects the global scenario
        ViewMode::Aqi => signal.intensity / 300.0 * multiplier * local_factor,
        _ => {
            signal.intensity / 100.0
                * multiplier
                * (1.0 - signal.total_reduction * 0.5)
                * (1.0 + signal.total_increase)
                * local_factor
        }
    }
}

/// Sample the heat field around `center`
pub fn render_heat_field<R: Rng>(
    rng: &mut R,
    center: LngLat,
    signal: &HeatSignal,
    interventions: &Interventions,
) -> Vec<HeatPoint> {
    let mut points = Vec::new();

    for (index, hotspot) in hotspots_around(center).iter().enumerate() {
        for _ in 0..SAMPLES_PER_HOTSPOT {
            let r = hotspot.radius * rng.r#gen::<f64>().sqrt();
            let theta = rng.r#gen::<f64>() * TAU;
            let position = LngLat::new(
                hotspot.center.lng + r * theta.cos(),
                hotspot.center.lat + r * theta.sin(),
            );

            let local = local_impact(position, interventions);
            let local_factor = (1.0 - local.reduction) * (1.0 + local.increase);
            let base = base_intensity(signal, hotspot.multiplier, local_factor);

            let jitter = 1.0 - JITTER + rng.r#gen::<f64>() * 2.0 * JITTER;
            let intensity = (base * jitter).clamp(0.0, 1.0);
            if intensity > VISIBILITY_THRESHOLD {
                points.push(HeatPoint {
                    position,
                    intensity,
                    hotspot: index,
                });
            }
        }
    }

    points
}

/// GeoJSON `FeatureCollection` of point features with an `intensity` property
#[must_use]
pub fn to_feature_collection(points: &[HeatPoint]) -> Value {
    let features: Vec<Value> = points
        .iter()
        .map(|point| {
            json!({
                "type": "Feature",
                "properties": { "intensity": point.intensity },
                "geometry": {
                    "type": "Point",
                    "coordinates": [point.position.lng, point.position.lat],
                },
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}
