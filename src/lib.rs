//! Air-Quality Digital Twin
//!
//! This crate provides the core of an air-quality twin:
//! - AQI calculation from pollutant breakpoint tables
//! - Live acquisition from two providers with validation and fallback
//! - Projection of policy interventions onto the live reading
//! - Spatial heat-field sampling of the projected scenario
//! - Report snapshots for an authenticated report endpoint
//!
//! # Example
//!
//! ```rust
//! use aqi_twin::{Interventions, LngLat, PollutantReading, StrategyId, ViewMode, overall_aqi, project};
//!
//! let reading = PollutantReading::new(35.0, 50.0, 4000.0, 40.0);
//! let current = overall_aqi(&reading);
//! assert_eq!(current.value, 99);
//! assert_eq!(current.label(), "Moderate");
//!
//! let mut interventions = Interventions::new();
//! interventions.set_slider(StrategyId::Ev, 60);
//! interventions.place(StrategyId::Ev, LngLat::new(73.855, 18.625), None);
//!
//! let projection = project(&reading, &interventions, ViewMode::default());
//! assert!(projection.net_pollutant_factor < 1.0);
//! assert!(projection.projected_aqi.value < current.value);
//! ```

pub mod aqi;
pub mod audit;
pub mod config;
pub mod error;
pub mod geo;
pub mod geocoding;
pub mod heat_field;
pub mod open_meteo;
pub mod open_weather;
pub mod pipeline;
pub mod reading;
pub mod refresh;
pub mod report;
pub mod scenario;
pub mod session;
pub mod strategy;
pub mod transport;

pub use aqi::{AqiCategory, AqiDelta, AqiReport, overall_aqi, sub_index};
pub use audit::{AuditEntry, AuditLog, AuditStatus};
pub use config::Config;
pub use error::{Error, Result};
pub use geo::{LngLat, Location, ScreenPoint};
pub use heat_field::{HeatPoint, render_heat_field, to_feature_collection};
pub use pipeline::{
    AcquisitionPipeline, CycleOutcome, CycleReport, DataSource, DataStatus, FetchCycle, FetchState,
};
pub use reading::{Pollutant, PollutantReading};
pub use refresh::{Refresher, SharedSession};
pub use report::{ReportDocument, ReportEnvelope, ReportService, ReportSnapshot};
pub use scenario::{Interventions, MarkerId, Projection, ViewMode, project};
pub use session::Session;
pub use strategy::{STRATEGIES, Strategy, StrategyId};
pub use transport::{HttpTransport, Transport};
