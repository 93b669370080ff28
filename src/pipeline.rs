//! Two-tier acquisition with validation and fallback
//!
//! A cycle always starts at the primary tier. A tier fails on timeout,
//! transport error, malformed body or out-of-range values; a failed primary
//! hands over to the secondary, a failed secondary ends the cycle in
//! fallback. The cycle never returns an error: its outcome, the audit events
//! it produced and the delay until the next cycle are all in [`CycleReport`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditStatus};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::geo::{LngLat, Location};
use crate::reading::PollutantReading;
use crate::transport::Transport;
use crate::{geocoding, open_meteo, open_weather};

/// Provider tier queried by a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Secondary,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        })
    }
}

/// Where the reading currently in use came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Primary,
    Secondary,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiHealth {
    #[default]
    Unknown,
    Healthy,
    Failed,
}

/// Provenance and health of the current reading
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStatus {
    pub last_fetch: Option<DateTime<Utc>>,
    pub is_live: bool,
    pub source: Option<DataSource>,
    pub api_health: ApiHealth,
    pub validation_passed: bool,
}

/// States of one acquisition cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    FetchingPrimary,
    FetchingSecondary,
    Success(DataSource),
    Fallback,
}

/// Inputs that move a cycle between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEvent {
    Start,
    TierSucceeded,
    TierFailed,
}

impl FetchState {
    /// Pure transition function; events that do not apply leave the state as is
    #[must_use]
    pub fn next(self, event: FetchEvent) -> Self {
        match (self, event) {
            (_, FetchEvent::Start) => Self::FetchingPrimary,
            (Self::FetchingPrimary, FetchEvent::TierSucceeded) => {
                Self::Success(DataSource::Primary)
            }
            (Self::FetchingPrimary, FetchEvent::TierFailed) => Self::FetchingSecondary,
            (Self::FetchingSecondary, FetchEvent::TierSucceeded) => {
                Self::Success(DataSource::Secondary)
            }
            (Self::FetchingSecondary, FetchEvent::TierFailed) => Self::Fallback,
            (state, _) => state,
        }
    }

    /// Tier queried while in this state
    #[must_use]
    pub fn tier(self) -> Option<Tier> {
        match self {
            Self::FetchingPrimary => Some(Tier::Primary),
            Self::FetchingSecondary => Some(Tier::Secondary),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success(_) | Self::Fallback)
    }
}

/// Identity of a cycle: results are only committed if the session still
/// holds the same generation
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCycle {
    pub generation: u64,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Live {
        source: DataSource,
        reading: PollutantReading,
    },
    Fallback {
        last_error: Error,
    },
}

/// Everything a finished cycle hands back to the session
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: FetchCycle,
    pub outcome: CycleOutcome,
    /// Audit events in the order they happened
    pub events: Vec<AuditEntry>,
    /// States visited, starting at `FetchingPrimary`
    pub trace: Vec<FetchState>,
    pub completed_at: DateTime<Utc>,
    pub next_fetch_in: Duration,
}

impl CycleReport {
    #[must_use]
    pub fn final_state(&self) -> FetchState {
        self.trace.last().copied().unwrap_or_default()
    }
}

/// Runs acquisition cycles against an injected transport
#[derive(Debug, Clone)]
pub struct AcquisitionPipeline<T> {
    transport: T,
    config: Config,
}

impl<T: Transport> AcquisitionPipeline<T> {
    #[must_use]
    pub fn new(transport: T, config: Config) -> Self {
        Self { transport, config }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one cycle to a terminal state
    pub async fn run(&self, cycle: FetchCycle) -> CycleReport {
        let label = cycle.location.label.clone();
        let mut events = vec![AuditEntry::new(
            "FETCH_INITIATED",
            format!("Starting fetch sequence for {label}"),
            AuditStatus::Initiated,
        )];
        info!(generation = cycle.generation, location = %label, "fetch cycle started");

        let mut state = FetchState::Idle.next(FetchEvent::Start);
        let mut trace = vec![state];
        let mut reading = None;
        let mut last_error = None;

        while let Some(tier) = state.tier() {
            let event = match self.fetch_tier(tier, cycle.location.coordinates).await {
                Ok(value) => {
                    reading = Some(value);
                    FetchEvent::TierSucceeded
                }
                Err(err) => {
                    warn!(%tier, error = %err, "tier failed");
                    record_tier_failure(&mut events, tier, &err);
                    last_error = Some(err);
                    FetchEvent::TierFailed
                }
            };
            state = state.next(event);
            trace.push(state);
        }

        let (outcome, next_fetch_in) = match (state, reading) {
            (FetchState::Success(source), Some(reading)) => {
                events.push(AuditEntry::new(
                    "DATA_UPDATE",
                    format!("Live data received from {} source", source_name(source)),
                    AuditStatus::Success,
                ));
                info!(?source, pm2_5 = reading.pm2_5, "live reading committed");
                (
                    CycleOutcome::Live { source, reading },
                    self.config.refresh_interval,
                )
            }
            _ => {
                events.push(AuditEntry::new(
                    "TOTAL_FAILURE",
                    "Both providers failed",
                    AuditStatus::Failed,
                ));
                events.push(AuditEntry::new(
                    "FALLBACK_ACTIVATED",
                    "Using last known reading",
                    AuditStatus::Fallback,
                ));
                warn!(location = %label, "fallback activated");
                let last_error = last_error
                    .unwrap_or_else(|| Error::Network("no tier attempted".to_string()));
                (
                    CycleOutcome::Fallback { last_error },
                    self.config.retry_interval,
                )
            }
        };

        CycleReport {
            cycle,
            outcome,
            events,
            trace,
            completed_at: Utc::now(),
            next_fetch_in,
        }
    }

    async fn fetch_tier(&self, tier: Tier, at: LngLat) -> Result<PollutantReading> {
        let url = match tier {
            Tier::Primary => open_meteo::request_url(&self.config.primary_url, at)?,
            Tier::Secondary => open_weather::request_url(
                &self.config.secondary_url,
                at,
                self.config.secondary_api_key.as_deref(),
            )?,
        };

        let body = self.get_json(url.as_str()).await?;
        let reading = match tier {
            Tier::Primary => open_meteo::decode(body)?,
            Tier::Secondary => open_weather::decode(body)?,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Resolve a free-text query to a location
    ///
    /// # Errors
    ///
    /// * `Error::LocationNotFound` - no match
    /// * `Error::NetworkTimeout` / `Error::Network` - request failed
    /// * `Error::MalformedResponse` - unexpected body
    pub async fn geocode(&self, query: &str) -> Result<Location> {
        let url = geocoding::request_url(&self.config.geocoding_url, query)?;
        let body = self.get_json(url.as_str()).await?;
        geocoding::decode(body, query)
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let timeout = self.config.request_timeout;
        tokio::time::timeout(timeout, self.transport.get_json(url))
            .await
            .map_err(|_| Error::NetworkTimeout(timeout))?
    }
}

fn source_name(source: DataSource) -> &'static str {
    match source {
        DataSource::Primary => "Open-Meteo",
        DataSource::Secondary => "OpenWeatherMap",
        DataSource::Fallback => "fallback",
    }
}

fn record_tier_failure(events: &mut Vec<AuditEntry>, tier: Tier, err: &Error) {
    if let Error::ValidationFailed(details) = err {
        events.push(AuditEntry::new(
            "VALIDATION_FAILED",
            format!("Bad data from {tier}: {details}"),
            AuditStatus::Failed,
        ));
    }
    let action = match tier {
        Tier::Primary => "PRIMARY_FAILED",
        Tier::Secondary => "SECONDARY_FAILED",
    };
    events.push(AuditEntry::new(action, err.to_string(), AuditStatus::Failed));
}
