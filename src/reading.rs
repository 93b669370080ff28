//! Pollutant readings as produced by the acquisition pipeline
//!
//! Provider payloads are normalized into [`PollutantReading`] by the
//! [`open_meteo`](crate::open_meteo) and [`open_weather`](crate::open_weather)
//! modules. Values are kept in the units the provider reports; CO in
//! particular is not converted between mg/m³ and µg/m³.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Synthetic CO2 baseline carried alongside every reading
pub const CO2_BASELINE: f64 = 1000.0;

/// The four pollutants the twin tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pollutant {
    /// Fine particulate matter, µg/m³
    #[serde(rename = "pm2_5")]
    Pm2_5,
    /// Coarse particulate matter, µg/m³
    Pm10,
    /// Carbon monoxide
    Co,
    /// Nitrogen dioxide, µg/m³
    No2,
}

impl Pollutant {
    pub const ALL: [Self; 4] = [Self::Pm2_5, Self::Pm10, Self::Co, Self::No2];

    /// Wire key of the pollutant
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Pm2_5 => "pm2_5",
            Self::Pm10 => "pm10",
            Self::Co => "co",
            Self::No2 => "no2",
        }
    }

    /// Display unit
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Co => "mg/m³",
            _ => "µg/m³",
        }
    }

    /// Upper bound accepted by range validation
    #[must_use]
    pub fn max_valid(self) -> f64 {
        match self {
            Self::Pm2_5 => 900.0,
            Self::Pm10 => 1000.0,
            Self::Co => 60_000.0,
            Self::No2 => 2_500.0,
        }
    }

    #[must_use]
    pub fn is_particulate(self) -> bool {
        matches!(self, Self::Pm2_5 | Self::Pm10)
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}

impl FromStr for Pollutant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.key() == s)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown pollutant `{s}`")))
    }
}

/// A full set of live (or projected) pollutant concentrations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollutantReading {
    pub pm2_5: f64,
    pub pm10: f64,
    pub co: f64,
    pub no2: f64,
    pub co2_baseline: f64,
}

impl PollutantReading {
    /// Build a reading from the four measured values and the fixed CO2 baseline
    #[must_use]
    pub const fn new(pm2_5: f64, pm10: f64, co: f64, no2: f64) -> Self {
        Self {
            pm2_5,
            pm10,
            co,
            no2,
            co2_baseline: CO2_BASELINE,
        }
    }

    #[must_use]
    pub fn get(&self, pollutant: Pollutant) -> f64 {
        match pollutant {
            Pollutant::Pm2_5 => self.pm2_5,
            Pollutant::Pm10 => self.pm10,
            Pollutant::Co => self.co,
            Pollutant::No2 => self.no2,
        }
    }

    /// Multiply the four pollutants by `factor`, leaving the CO2 baseline alone
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            pm2_5: self.pm2_5 * factor,
            pm10: self.pm10 * factor,
            co: self.co * factor,
            no2: self.no2 * factor,
            co2_baseline: self.co2_baseline,
        }
    }

    /// Check that every pollutant is finite and within `0..=max_valid`
    ///
    /// # Errors
    ///
    /// * `Error::ValidationFailed` - the first pollutant out of range
    pub fn validate(&self) -> Result<()> {
        for pollutant in Pollutant::ALL {
            let value = self.get(pollutant);
            let max = pollutant.max_valid();
            if !value.is_finite() || !(0.0..=max).contains(&value) {
                return Err(Error::out_of_range(pollutant.key(), value, max));
            }
        }
        Ok(())
    }
}

impl Default for PollutantReading {
    /// Offline reading used until the first successful fetch
    fn default() -> Self {
        Self::new(55.0, 90.0, 600.0, 40.0)
    }
}
