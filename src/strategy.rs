//! Static catalog of policy interventions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of a catalog strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyId {
    Timber,
    Cement,
    Retrofit,
    Transport,
    Ev,
    Trees,
    Ccs,
    Parali,
}

/// Whether a strategy lowers or raises emissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Negative,
}

/// Reference data for one intervention
///
/// `max_co2` and `max_pollutant` are the fractional effects of a fully
/// adopted, fully saturated deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    pub id: StrategyId,
    pub title: &'static str,
    pub description: &'static str,
    pub slider_label: &'static str,
    pub max_co2: f64,
    pub max_pollutant: f64,
    pub impact: Impact,
}

impl Strategy {
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.impact == Impact::Negative
    }
}

pub static STRATEGIES: [Strategy; 8] = [
    Strategy {
        id: StrategyId::Timber,
        title: "Timber Construction",
        description: "Replace concrete with timber.",
        slider_label: "% Adoption",
        max_co2: 0.35,
        max_pollutant: 0.10,
        impact: Impact::Positive,
    },
    Strategy {
        id: StrategyId::Cement,
        title: "Green Cement",
        description: "Use low-clinker alternatives.",
        slider_label: "% Mix",
        max_co2: 0.30,
        max_pollutant: 0.05,
        impact: Impact::Positive,
    },
    Strategy {
        id: StrategyId::Retrofit,
        title: "Retrofit Policy",
        description: "Renovate instead of demolish.",
        slider_label: "% Projects",
        max_co2: 0.90,
        max_pollutant: 0.60,
        impact: Impact::Positive,
    },
    Strategy {
        id: StrategyId::Transport,
        title: "Public Transit",
        description: "Shift to light-rail/metro.",
        slider_label: "% Shift",
        max_co2: 0.50,
        max_pollutant: 0.40,
        impact: Impact::Positive,
    },
    Strategy {
        id: StrategyId::Ev,
        title: "EV Adoption",
        description: "Electrify vehicle fleet.",
        slider_label: "% Fleet",
        max_co2: 0.65,
        max_pollutant: 0.50,
        impact: Impact::Positive,
    },
    Strategy {
        id: StrategyId::Trees,
        title: "Urban Greening",
        description: "Expand tree canopy.",
        slider_label: "% Target",
        max_co2: 0.15,
        max_pollutant: 0.20,
        impact: Impact::Positive,
    },
    Strategy {
        id: StrategyId::Ccs,
        title: "Industrial CCS",
        description: "Carbon capture on stacks.",
        slider_label: "% Stacks",
        max_co2: 0.75,
        max_pollutant: 0.30,
        impact: Impact::Positive,
    },
    // 1 tonne of burnt residue ≈ 1460 kg CO2
    Strategy {
        id: StrategyId::Parali,
        title: "Parali Burning",
        description: "Open-field crop residue burning.",
        slider_label: "Intensity",
        max_co2: 1.46,
        max_pollutant: 0.80,
        impact: Impact::Negative,
    },
];

impl StrategyId {
    pub const ALL: [Self; 8] = [
        Self::Timber,
        Self::Cement,
        Self::Retrofit,
        Self::Transport,
        Self::Ev,
        Self::Trees,
        Self::Ccs,
        Self::Parali,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timber => "timber",
            Self::Cement => "cement",
            Self::Retrofit => "retrofit",
            Self::Transport => "transport",
            Self::Ev => "ev",
            Self::Trees => "trees",
            Self::Ccs => "ccs",
            Self::Parali => "parali",
        }
    }

    /// Catalog entry for this id
    #[must_use]
    pub fn strategy(self) -> &'static Strategy {
        // STRATEGIES is declared in the same order as the enum
        &STRATEGIES[self as usize]
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| Error::UnknownStrategy(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_matches_ids() {
        for id in StrategyId::ALL {
            assert_eq!(id.strategy().id, id);
        }
    }

    #[test]
    fn only_parali_is_negative() {
        let negative: Vec<_> = STRATEGIES
            .iter()
            .filter(|s| s.is_negative())
            .map(|s| s.id)
            .collect();
        assert_eq!(negative, vec![StrategyId::Parali]);
    }

    #[test]
    fn parse_ids() {
        assert_eq!("ev".parse::<StrategyId>().unwrap(), StrategyId::Ev);
        assert_eq!(
            "solar".parse::<StrategyId>().unwrap_err(),
            Error::UnknownStrategy("solar".into())
        );
        assert_eq!(
            serde_json::to_string(&StrategyId::Ccs).unwrap(),
            "\"ccs\""
        );
    }
}
