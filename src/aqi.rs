//! Air Quality Index calculation
//!
//! Sub-indices are piecewise-linear interpolations over fixed breakpoint
//! tables; the headline AQI is the worst sub-index across the four tracked
//! pollutants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reading::{Pollutant, PollutantReading};

/// Index reported for concentrations above every table
pub const AQI_CAP: u16 = 500;

/// One row of a breakpoint table, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub c_low: f64,
    pub c_high: f64,
    pub i_low: u16,
    pub i_high: u16,
}

const fn bp(c_low: f64, c_high: f64, i_low: u16, i_high: u16) -> Breakpoint {
    Breakpoint {
        c_low,
        c_high,
        i_low,
        i_high,
    }
}

const PM2_5_TABLE: [Breakpoint; 6] = [
    bp(0.0, 12.0, 0, 50),
    bp(12.1, 35.4, 51, 100),
    bp(35.5, 55.4, 101, 150),
    bp(55.5, 150.4, 151, 200),
    bp(150.5, 250.4, 201, 300),
    bp(250.5, 500.4, 301, 500),
];

const PM10_TABLE: [Breakpoint; 6] = [
    bp(0.0, 54.0, 0, 50),
    bp(55.0, 154.0, 51, 100),
    bp(155.0, 254.0, 101, 150),
    bp(255.0, 354.0, 151, 200),
    bp(355.0, 424.0, 201, 300),
    bp(425.0, 604.0, 301, 500),
];

const CO_TABLE: [Breakpoint; 6] = [
    bp(0.0, 4400.0, 0, 50),
    bp(4500.0, 9400.0, 51, 100),
    bp(9500.0, 12400.0, 101, 150),
    bp(12500.0, 15400.0, 151, 200),
    bp(15500.0, 30400.0, 201, 300),
    bp(30500.0, 50400.0, 301, 500),
];

const NO2_TABLE: [Breakpoint; 6] = [
    bp(0.0, 53.0, 0, 50),
    bp(54.0, 100.0, 51, 100),
    bp(101.0, 360.0, 101, 150),
    bp(361.0, 649.0, 151, 200),
    bp(650.0, 1249.0, 201, 300),
    bp(1250.0, 2049.0, 301, 500),
];

impl Breakpoint {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn interpolate(&self, concentration: f64) -> u16 {
        let slope = f64::from(self.i_high - self.i_low) / (self.c_high - self.c_low);
        (slope * (concentration - self.c_low) + f64::from(self.i_low)).round() as u16
    }
}

/// Breakpoint table for a pollutant
#[must_use]
pub fn breakpoints(pollutant: Pollutant) -> &'static [Breakpoint] {
    match pollutant {
        Pollutant::Pm2_5 => &PM2_5_TABLE,
        Pollutant::Pm10 => &PM10_TABLE,
        Pollutant::Co => &CO_TABLE,
        Pollutant::No2 => &NO2_TABLE,
    }
}

/// Sub-index of a single pollutant concentration
///
/// Concentrations above the last bracket are capped at [`AQI_CAP`]; negative
/// or non-finite input yields 0. A concentration that falls in the rounding
/// gap between two brackets is interpolated on the lower bracket and never
/// reported above the next bracket's lower index.
#[must_use]
pub fn sub_index(pollutant: Pollutant, concentration: f64) -> u16 {
    let table = breakpoints(pollutant);
    let Some(last) = table.last() else {
        return 0;
    };
    if concentration > last.c_high {
        return AQI_CAP;
    }

    for (i, bracket) in table.iter().enumerate() {
        if concentration < bracket.c_low {
            break;
        }
        if concentration <= bracket.c_high {
            return bracket.interpolate(concentration);
        }
        if let Some(next) = table.get(i + 1) {
            if concentration < next.c_low {
                return bracket.interpolate(concentration).min(next.i_low);
            }
        }
    }
    0
}

/// Sub-index by wire key; unknown keys yield 0
#[must_use]
pub fn sub_index_for_key(key: &str, concentration: f64) -> u16 {
    key.parse::<Pollutant>()
        .map_or(0, |pollutant| sub_index(pollutant, concentration))
}

/// The six AQI bands, ascending and non-overlapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub const ALL: [Self; 6] = [
        Self::Good,
        Self::Moderate,
        Self::UnhealthyForSensitive,
        Self::Unhealthy,
        Self::VeryUnhealthy,
        Self::Hazardous,
    ];

    /// Inclusive index range of the band
    #[must_use]
    pub fn range(self) -> (u16, u16) {
        match self {
            Self::Good => (0, 50),
            Self::Moderate => (51, 100),
            Self::UnhealthyForSensitive => (101, 150),
            Self::Unhealthy => (151, 200),
            Self::VeryUnhealthy => (201, 300),
            Self::Hazardous => (301, 500),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitive => "Unhealthy for Sensitive",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    /// Hex color used by the dashboard badge
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Good => "#10b981",
            Self::Moderate => "#f59e0b",
            Self::UnhealthyForSensitive => "#fb923c",
            Self::Unhealthy => "#ef4444",
            Self::VeryUnhealthy => "#dc2626",
            Self::Hazardous => "#991b1b",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Good => "Air quality is satisfactory",
            Self::Moderate => "Acceptable for most people",
            Self::UnhealthyForSensitive => "Sensitive groups may be affected",
            Self::Unhealthy => "Everyone may experience effects",
            Self::VeryUnhealthy => "Health alert: serious effects",
            Self::Hazardous => "Emergency conditions: all affected",
        }
    }

    /// Band containing `value`; values above every band map to the last one
    #[must_use]
    pub fn for_value(value: u16) -> Self {
        Self::ALL
            .into_iter()
            .find(|category| {
                let (min, max) = category.range();
                (min..=max).contains(&value)
            })
            .unwrap_or(Self::Hazardous)
    }
}

/// Headline AQI with its category and per-pollutant sub-indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiReport {
    pub value: u16,
    pub category: AqiCategory,
    pub individual: BTreeMap<Pollutant, u16>,
}

impl AqiReport {
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.category.label()
    }

    #[must_use]
    pub fn color(&self) -> &'static str {
        self.category.color()
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        self.category.description()
    }
}

/// Compute the overall AQI of a reading
#[must_use]
pub fn overall_aqi(reading: &PollutantReading) -> AqiReport {
    let individual: BTreeMap<Pollutant, u16> = Pollutant::ALL
        .into_iter()
        .map(|pollutant| (pollutant, sub_index(pollutant, reading.get(pollutant))))
        .collect();
    let value = individual.values().copied().max().unwrap_or(0);

    AqiReport {
        value,
        category: AqiCategory::for_value(value),
        individual,
    }
}

/// Change between the current and the projected AQI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", content = "points", rename_all = "snake_case")]
pub enum AqiDelta {
    Improved(u16),
    Worsened(u16),
    Unchanged,
}

impl AqiDelta {
    #[must_use]
    pub fn between(current: &AqiReport, projected: &AqiReport) -> Self {
        match current.value.cmp(&projected.value) {
            std::cmp::Ordering::Greater => Self::Improved(current.value - projected.value),
            std::cmp::Ordering::Less => Self::Worsened(projected.value - current.value),
            std::cmp::Ordering::Equal => Self::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Pollutant::Pm2_5, 0.0, 0)]
    #[case(Pollutant::Pm2_5, 12.0, 50)]
    #[case(Pollutant::Pm2_5, 12.1, 51)]
    #[case(Pollutant::Pm2_5, 35.0, 99)]
    #[case(Pollutant::Pm2_5, 500.4, 500)]
    #[case(Pollutant::Pm2_5, 500.0, 500)]
    #[case(Pollutant::Pm2_5, 600.0, 500)]
    #[case(Pollutant::Pm2_5, -5.0, 0)]
    #[case(Pollutant::Pm10, 50.0, 46)]
    #[case(Pollutant::Pm10, 700.0, 500)]
    #[case(Pollutant::Co, 4000.0, 45)]
    #[case(Pollutant::No2, 40.0, 38)]
    #[case(Pollutant::No2, f64::NAN, 0)]
    fn sub_index_cases(#[case] pollutant: Pollutant, #[case] c: f64, #[case] expected: u16) {
        assert_eq!(
            sub_index(pollutant, c),
            expected,
            "sub_index({pollutant}, {c})"
        );
    }

    #[test]
    fn unknown_key_yields_zero() {
        assert_eq!(sub_index_for_key("o3", 80.0), 0);
        assert_eq!(sub_index_for_key("pm10", 50.0), 46);
    }

    #[rstest]
    fn sub_index_is_monotonic(
        #[values(Pollutant::Pm2_5, Pollutant::Pm10, Pollutant::Co, Pollutant::No2)]
        pollutant: Pollutant,
    ) {
        let max = breakpoints(pollutant).last().unwrap().c_high;
        let steps = 20_000;
        let mut previous = 0;
        for step in 0..=steps {
            let c = max * f64::from(step) / f64::from(steps);
            let index = sub_index(pollutant, c);
            assert!(
                index >= previous,
                "{pollutant} dropped from {previous} to {index} at {c}"
            );
            previous = index;
        }
        assert_eq!(previous, 500);
    }

    #[rstest]
    fn brackets_join_within_one_unit(
        #[values(Pollutant::Pm2_5, Pollutant::Pm10, Pollutant::Co, Pollutant::No2)]
        pollutant: Pollutant,
    ) {
        for pair in breakpoints(pollutant).windows(2) {
            let upper = sub_index(pollutant, pair[0].c_high);
            let lower = sub_index(pollutant, pair[1].c_low);
            assert_eq!(upper, pair[0].i_high);
            assert_eq!(lower, pair[1].i_low);
            assert!(lower - upper <= 1);
        }
    }

    #[test]
    fn overall_aqi_takes_worst_sub_index() {
        let reading = PollutantReading::new(35.0, 50.0, 4000.0, 40.0);
        let report = overall_aqi(&reading);
        assert_eq!(report.individual[&Pollutant::Pm2_5], 99);
        assert_eq!(report.individual[&Pollutant::Pm10], 46);
        assert_eq!(report.individual[&Pollutant::Co], 45);
        assert_eq!(report.individual[&Pollutant::No2], 38);
        assert_eq!(report.value, 99);
        assert_eq!(report.category, AqiCategory::Moderate);
        assert_eq!(report.label(), "Moderate");
        assert_eq!(report.color(), "#f59e0b");
    }

    #[rstest]
    #[case(0, AqiCategory::Good)]
    #[case(50, AqiCategory::Good)]
    #[case(51, AqiCategory::Moderate)]
    #[case(150, AqiCategory::UnhealthyForSensitive)]
    #[case(200, AqiCategory::Unhealthy)]
    #[case(300, AqiCategory::VeryUnhealthy)]
    #[case(500, AqiCategory::Hazardous)]
    #[case(650, AqiCategory::Hazardous)]
    fn category_bands(#[case] value: u16, #[case] expected: AqiCategory) {
        assert_eq!(AqiCategory::for_value(value), expected);
    }

    #[test]
    fn delta_direction() {
        let current = overall_aqi(&PollutantReading::new(55.0, 90.0, 600.0, 40.0));
        let cleaner = overall_aqi(&PollutantReading::new(20.0, 40.0, 300.0, 20.0));
        assert!(matches!(
            AqiDelta::between(&current, &cleaner),
            AqiDelta::Improved(_)
        ));
        assert!(matches!(
            AqiDelta::between(&cleaner, &current),
            AqiDelta::Worsened(_)
        ));
        assert_eq!(AqiDelta::between(&current, &current), AqiDelta::Unchanged);
    }
}
