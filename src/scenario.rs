//! Scenario projection: live reading + interventions → projected pollution
//!
//! A strategy only contributes when its slider is above zero **and** at least
//! one marker of it is placed. Its contribution scales with
//! `adoption × marker_count`, saturating at [`MAX_SATURATION`], and is
//! weighted by how strongly the strategy acts on the pollutant being viewed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aqi::{AqiReport, overall_aqi};
use crate::error::{Error, Result};
use crate::geo::{LngLat, ScreenPoint};
use crate::reading::{Pollutant, PollutantReading};
use crate::strategy::{Strategy, StrategyId};

/// Upper bound of the saturation factor
pub const MAX_SATURATION: f64 = 1.5;
/// Reduction fractions never reach full elimination
pub const MAX_REDUCTION: f64 = 0.95;
/// Share of a strategy's rated pollutant effect that reaches the reading
pub const POLLUTANT_EFFECT_SCALE: f64 = 0.4;
/// Share of a positive strategy's rated CO2 effect that reaches the total
pub const CO2_REDUCTION_SCALE: f64 = 0.5;

/// What the dashboard is currently showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "pollutant")]
pub enum ViewMode {
    Pollutant(Pollutant),
    Aqi,
    Co2,
}

impl ViewMode {
    /// Display unit of the headline value
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Pollutant(pollutant) => pollutant.unit(),
            Self::Aqi => "Index",
            Self::Co2 => "Tonnes",
        }
    }

    /// Relative weight of a strategy's pollutant effect under this view
    #[must_use]
    pub fn weight(self, strategy: &Strategy) -> f64 {
        match self {
            Self::Pollutant(p) if p.is_particulate() && strategy.max_pollutant > 0.4 => 1.0,
            Self::Pollutant(Pollutant::Co | Pollutant::No2) if strategy.id == StrategyId::Ev => {
                1.2
            }
            Self::Aqi if strategy.max_pollutant > 0.3 => 0.8,
            _ => 0.5,
        }
    }
}

impl Default for ViewMode {
    fn default() -> Self {
        Self::Pollutant(Pollutant::Pm2_5)
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pollutant(pollutant) => fmt::Display::fmt(pollutant, f),
            Self::Aqi => f.pad("aqi"),
            Self::Co2 => f.pad("co2"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aqi" => Ok(Self::Aqi),
            "co2" => Ok(Self::Co2),
            other => other.parse().map(Self::Pollutant),
        }
    }
}

/// Unique id of a placed marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker-{}", self.0)
    }
}

/// A strategy instance positioned on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub marker_id: MarkerId,
    pub strategy: StrategyId,
    pub position: LngLat,
    pub screen: Option<ScreenPoint>,
}

/// Slider values and placed markers, keyed by strategy and marker id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interventions {
    sliders: BTreeMap<StrategyId, u8>,
    placements: BTreeMap<MarkerId, Placement>,
    next_marker: u64,
}

impl Interventions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set adoption percentage; values above 100 are clamped
    pub fn set_slider(&mut self, strategy: StrategyId, value: u8) {
        self.sliders.insert(strategy, value.min(100));
    }

    #[must_use]
    pub fn slider(&self, strategy: StrategyId) -> u8 {
        self.sliders.get(&strategy).copied().unwrap_or(0)
    }

    /// Slider value as a fraction in `0..=1`
    #[must_use]
    pub fn adoption(&self, strategy: StrategyId) -> f64 {
        f64::from(self.slider(strategy)) / 100.0
    }

    /// Place a new marker and return its id
    pub fn place(
        &mut self,
        strategy: StrategyId,
        position: LngLat,
        screen: Option<ScreenPoint>,
    ) -> MarkerId {
        let marker_id = MarkerId(self.next_marker);
        self.next_marker += 1;
        self.placements.insert(
            marker_id,
            Placement {
                marker_id,
                strategy,
                position,
                screen,
            },
        );
        marker_id
    }

    /// Move an existing marker
    ///
    /// # Errors
    ///
    /// * `Error::UnknownMarker` - no placement with this id
    pub fn move_marker(
        &mut self,
        marker_id: MarkerId,
        position: LngLat,
        screen: Option<ScreenPoint>,
    ) -> Result<()> {
        let placement = self
            .placements
            .get_mut(&marker_id)
            .ok_or(Error::UnknownMarker(marker_id.0))?;
        placement.position = position;
        placement.screen = screen;
        Ok(())
    }

    /// Delete a marker
    ///
    /// # Errors
    ///
    /// * `Error::UnknownMarker` - no placement with this id
    pub fn remove(&mut self, marker_id: MarkerId) -> Result<Placement> {
        self.placements
            .remove(&marker_id)
            .ok_or(Error::UnknownMarker(marker_id.0))
    }

    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements.values()
    }

    #[must_use]
    pub fn placement(&self, marker_id: MarkerId) -> Option<&Placement> {
        self.placements.get(&marker_id)
    }

    #[must_use]
    pub fn placement_count(&self) -> usize {
        self.placements.len()
    }

    /// Number of markers per strategy
    #[must_use]
    pub fn marker_counts(&self) -> BTreeMap<StrategyId, usize> {
        let mut counts = BTreeMap::new();
        for placement in self.placements.values() {
            *counts.entry(placement.strategy).or_insert(0) += 1;
        }
        counts
    }
}

/// Headline value pair shown for the selected view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayValue {
    pub current: f64,
    pub projected: f64,
}

/// Result of a scenario pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub view: ViewMode,
    pub projected: PollutantReading,
    pub projected_aqi: AqiReport,
    pub net_pollutant_factor: f64,
    pub net_co2_factor: f64,
    pub total_pollutant_reduction: f64,
    pub total_pollutant_increase: f64,
    pub total_co2_reduction: f64,
    pub total_co2_increase: f64,
    pub display: DisplayValue,
}

impl Projection {
    /// Net CO2 change in percent; positive means more emissions
    #[must_use]
    pub fn co2_change_percent(&self) -> f64 {
        (self.net_co2_factor - 1.0) * 100.0
    }

    #[must_use]
    pub fn co2_increases(&self) -> bool {
        self.co2_change_percent() > 0.1
    }
}

/// Saturation factor for a strategy with `slider` percent and `markers` sites
#[must_use]
pub fn saturation(slider: u8, markers: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let count = markers as f64;
    (f64::from(slider) / 100.0 * count).min(MAX_SATURATION)
}

/// Project a reading under the given interventions
#[must_use]
pub fn project(
    reading: &PollutantReading,
    interventions: &Interventions,
    view: ViewMode,
) -> Projection {
    let counts = interventions.marker_counts();

    let mut pollutant_reduction = 0.0;
    let mut pollutant_increase = 0.0;
    let mut co2_reduction = 0.0;
    let mut co2_increase = 0.0;

    for (&id, &markers) in &counts {
        let slider = interventions.slider(id);
        if slider == 0 || markers == 0 {
            continue;
        }
        let strategy = id.strategy();
        let f = saturation(slider, markers);
        let w = view.weight(strategy);
        let pollutant_effect = strategy.max_pollutant * f * w * POLLUTANT_EFFECT_SCALE;

        if strategy.is_negative() {
            pollutant_increase += pollutant_effect;
            co2_increase += strategy.max_co2 * f;
        } else {
            pollutant_reduction += pollutant_effect;
            co2_reduction += strategy.max_co2 * f * CO2_REDUCTION_SCALE;
        }
    }

    let pollutant_reduction: f64 = f64::min(pollutant_reduction, MAX_REDUCTION);
    let co2_reduction: f64 = f64::min(co2_reduction, MAX_REDUCTION);

    let net_pollutant_factor = (1.0 - pollutant_reduction) * (1.0 + pollutant_increase);
    let net_co2_factor = (1.0 - co2_reduction) * (1.0 + co2_increase);

    let mut projected = reading.scaled(net_pollutant_factor);
    projected.co2_baseline = reading.co2_baseline * net_co2_factor;
    let projected_aqi = overall_aqi(&projected);

    let display = match view {
        ViewMode::Aqi => DisplayValue {
            current: f64::from(overall_aqi(reading).value),
            projected: f64::from(projected_aqi.value),
        },
        ViewMode::Co2 => DisplayValue {
            current: reading.co2_baseline,
            projected: projected.co2_baseline,
        },
        ViewMode::Pollutant(pollutant) => DisplayValue {
            current: reading.get(pollutant),
            projected: projected.get(pollutant),
        },
    };

    Projection {
        view,
        projected,
        projected_aqi,
        net_pollutant_factor,
        net_co2_factor,
        total_pollutant_reduction: pollutant_reduction,
        total_pollutant_increase: pollutant_increase,
        total_co2_reduction: co2_reduction,
        total_co2_increase: co2_increase,
        display,
    }
}
