//! Single owner of the mutable twin state
//!
//! Every mutation goes through [`Session`], which recomputes the projection
//! synchronously afterwards. Pure computation (AQI, scenario, heat field) only
//! ever sees borrowed state.

use rand::Rng;
use tracing::{debug, info};

use crate::aqi::{AqiDelta, AqiReport, overall_aqi};
use crate::audit::{AuditLog, AuditStatus};
use crate::error::Result;
use crate::geo::{LngLat, Location, ScreenPoint};
use crate::heat_field::{HeatPoint, HeatSignal, render_heat_field};
use crate::pipeline::{ApiHealth, CycleOutcome, CycleReport, DataSource, DataStatus, FetchCycle};
use crate::reading::PollutantReading;
use crate::report::ReportSnapshot;
use crate::scenario::{Interventions, MarkerId, Placement, Projection, ViewMode, project};
use crate::strategy::StrategyId;

#[derive(Debug, Clone)]
pub struct Session {
    location: Location,
    reading: PollutantReading,
    status: DataStatus,
    interventions: Interventions,
    view: ViewMode,
    audit: AuditLog,
    generation: u64,
    current_aqi: AqiReport,
    projection: Projection,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Location::default())
    }
}

impl Session {
    /// Start at `location` with the offline default reading
    #[must_use]
    pub fn new(location: Location) -> Self {
        let reading = PollutantReading::default();
        let interventions = Interventions::new();
        let view = ViewMode::default();
        Self {
            current_aqi: overall_aqi(&reading),
            projection: project(&reading, &interventions, view),
            location,
            reading,
            status: DataStatus::default(),
            interventions,
            view,
            audit: AuditLog::new(),
            generation: 0,
        }
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[must_use]
    pub fn reading(&self) -> &PollutantReading {
        &self.reading
    }

    #[must_use]
    pub fn status(&self) -> &DataStatus {
        &self.status
    }

    #[must_use]
    pub fn interventions(&self) -> &Interventions {
        &self.interventions
    }

    #[must_use]
    pub fn view(&self) -> ViewMode {
        self.view
    }

    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// AQI of the live reading
    #[must_use]
    pub fn current_aqi(&self) -> &AqiReport {
        &self.current_aqi
    }

    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    #[must_use]
    pub fn aqi_delta(&self) -> AqiDelta {
        AqiDelta::between(&self.current_aqi, &self.projection.projected_aqi)
    }

    /// Open a new fetch cycle; any cycle still in flight becomes stale
    pub fn begin_fetch(&mut self) -> FetchCycle {
        self.generation += 1;
        FetchCycle {
            generation: self.generation,
            location: self.location.clone(),
        }
    }

    /// Commit a finished cycle
    ///
    /// The cycle's audit events are always kept. Its outcome is only applied
    /// when no newer cycle or location change happened meanwhile; returns
    /// whether it was.
    pub fn apply(&mut self, report: CycleReport) -> bool {
        for entry in report.events {
            self.audit.push(entry);
        }

        if report.cycle.generation != self.generation || report.cycle.location != self.location {
            debug!(
                cycle = report.cycle.generation,
                current = self.generation,
                "discarding superseded cycle"
            );
            self.audit.record(
                "FETCH_SUPERSEDED",
                format!(
                    "Discarded result for {} (cycle {})",
                    report.cycle.location.label, report.cycle.generation
                ),
                AuditStatus::Warning,
            );
            return false;
        }

        match report.outcome {
            CycleOutcome::Live { source, reading } => {
                self.reading = reading;
                self.status = DataStatus {
                    last_fetch: Some(report.completed_at),
                    is_live: true,
                    source: Some(source),
                    api_health: ApiHealth::Healthy,
                    validation_passed: true,
                };
            }
            CycleOutcome::Fallback { .. } => {
                self.status.is_live = false;
                self.status.source = Some(DataSource::Fallback);
                self.status.api_health = ApiHealth::Failed;
                self.status.validation_passed = false;
            }
        }
        self.recompute();
        true
    }

    /// Move to a new location; in-flight cycles for the old one are discarded
    pub fn set_location(&mut self, location: Location) {
        info!(location = %location.label, "location changed");
        self.audit.record(
            "LOCATION_CHANGE",
            format!("Moved to {}", location.label),
            AuditStatus::Success,
        );
        self.location = location;
        self.generation += 1;
    }

    pub fn set_slider(&mut self, strategy: StrategyId, value: u8) {
        self.interventions.set_slider(strategy, value);
        self.recompute();
    }

    pub fn place_intervention(
        &mut self,
        strategy: StrategyId,
        position: LngLat,
        screen: Option<ScreenPoint>,
    ) -> MarkerId {
        let marker_id = self.interventions.place(strategy, position, screen);
        self.recompute();
        marker_id
    }

    /// # Errors
    ///
    /// * `Error::UnknownMarker` - no placement with this id
    pub fn move_intervention(
        &mut self,
        marker_id: MarkerId,
        position: LngLat,
        screen: Option<ScreenPoint>,
    ) -> Result<()> {
        self.interventions
            .move_marker(marker_id, position, screen)?;
        self.recompute();
        Ok(())
    }

    /// # Errors
    ///
    /// * `Error::UnknownMarker` - no placement with this id
    pub fn remove_intervention(&mut self, marker_id: MarkerId) -> Result<Placement> {
        let placement = self.interventions.remove(marker_id)?;
        self.recompute();
        Ok(placement)
    }

    pub fn set_view(&mut self, view: ViewMode) {
        self.view = view;
        self.recompute();
    }

    /// Append an event that did not come from a fetch cycle
    pub fn record(&mut self, action: &str, details: impl Into<String>, status: AuditStatus) {
        self.audit.record(action, details, status);
    }

    /// Sample the heat field for the current projection
    pub fn heat_field<R: Rng>(&self, rng: &mut R) -> Vec<HeatPoint> {
        render_heat_field(
            rng,
            self.location.coordinates,
            &HeatSignal::from(&self.projection),
            &self.interventions,
        )
    }

    #[must_use]
    pub fn snapshot(&self) -> ReportSnapshot {
        ReportSnapshot::capture(&self.location, &self.reading, &self.interventions)
    }

    fn recompute(&mut self) {
        self.current_aqi = overall_aqi(&self.reading);
        self.projection = project(&self.reading, &self.interventions, self.view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pipeline::FetchState;
    use crate::reading::Pollutant;
    use chrono::Utc;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::time::Duration;

    fn live_report(cycle: FetchCycle, reading: PollutantReading) -> CycleReport {
        CycleReport {
            cycle,
            outcome: CycleOutcome::Live {
                source: DataSource::Primary,
                reading,
            },
            events: Vec::new(),
            trace: vec![
                FetchState::FetchingPrimary,
                FetchState::Success(DataSource::Primary),
            ],
            completed_at: Utc::now(),
            next_fetch_in: Duration::from_secs(900),
        }
    }

    fn fallback_report(cycle: FetchCycle) -> CycleReport {
        CycleReport {
            cycle,
            outcome: CycleOutcome::Fallback {
                last_error: Error::http_status(500),
            },
            events: Vec::new(),
            trace: vec![
                FetchState::FetchingPrimary,
                FetchState::FetchingSecondary,
                FetchState::Fallback,
            ],
            completed_at: Utc::now(),
            next_fetch_in: Duration::from_secs(120),
        }
    }

    #[test]
    fn live_cycle_commits_reading() {
        let mut session = Session::default();
        let cycle = session.begin_fetch();
        let reading = PollutantReading::new(12.0, 20.0, 300.0, 10.0);

        assert!(session.apply(live_report(cycle, reading)));
        assert_eq!(session.reading(), &reading);
        assert!(session.status().is_live);
        assert_eq!(session.status().source, Some(DataSource::Primary));
        assert_eq!(session.status().api_health, ApiHealth::Healthy);
        assert_eq!(session.current_aqi(), &overall_aqi(&reading));
        assert_eq!(session.projection().projected, reading);
    }

    #[test]
    fn fallback_keeps_last_reading() {
        let mut session = Session::default();
        let reading = PollutantReading::new(12.0, 20.0, 300.0, 10.0);
        let cycle = session.begin_fetch();
        session.apply(live_report(cycle, reading));
        let fetched_at = session.status().last_fetch;

        let cycle = session.begin_fetch();
        assert!(session.apply(fallback_report(cycle)));

        assert_eq!(session.reading(), &reading);
        assert!(!session.status().is_live);
        assert_eq!(session.status().source, Some(DataSource::Fallback));
        assert_eq!(session.status().api_health, ApiHealth::Failed);
        assert_eq!(session.status().last_fetch, fetched_at);
    }

    #[test]
    fn stale_cycle_is_discarded() {
        let mut session = Session::default();
        let stale = session.begin_fetch();
        session.set_location(Location::new(77.21, 28.61, "Delhi, India"));

        let applied = session.apply(live_report(stale, PollutantReading::new(1.0, 1.0, 1.0, 1.0)));

        assert!(!applied);
        assert_eq!(session.reading(), &PollutantReading::default());
        assert_eq!(session.location().label, "Delhi, India");
        let actions: Vec<&str> = session.audit().iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, ["FETCH_SUPERSEDED", "LOCATION_CHANGE"]);
    }

    #[test]
    fn newer_cycle_supersedes_older() {
        let mut session = Session::default();
        let first = session.begin_fetch();
        let second = session.begin_fetch();

        assert!(!session.apply(live_report(first, PollutantReading::new(1.0, 1.0, 1.0, 1.0))));
        assert!(session.apply(live_report(second, PollutantReading::new(2.0, 2.0, 2.0, 2.0))));
        assert_eq!(session.reading().pm2_5, 2.0);
    }

    #[test]
    fn every_mutation_recomputes() {
        let mut session = Session::default();
        let baseline = session.projection().clone();

        let marker = session.place_intervention(StrategyId::Ev, LngLat::new(73.855, 18.625), None);
        assert_eq!(session.projection(), &baseline);

        session.set_slider(StrategyId::Ev, 80);
        let reduced = session.projection().clone();
        assert!(reduced.net_pollutant_factor < 1.0);
        assert!(matches!(session.aqi_delta(), AqiDelta::Improved(_)));

        session.set_view(ViewMode::Pollutant(Pollutant::No2));
        assert_eq!(session.projection().view, ViewMode::Pollutant(Pollutant::No2));

        session
            .move_intervention(marker, LngLat::new(73.86, 18.63), None)
            .unwrap();
        session.remove_intervention(marker).unwrap();
        assert_eq!(session.projection().net_pollutant_factor, 1.0);
        assert_eq!(
            session.remove_intervention(marker).unwrap_err(),
            Error::UnknownMarker(marker.0)
        );
    }

    #[test]
    fn heat_field_and_snapshot_follow_state() {
        let mut session = Session::default();
        session.set_slider(StrategyId::Trees, 50);
        session.place_intervention(StrategyId::Trees, LngLat::new(73.855, 18.625), None);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(!session.heat_field(&mut rng).is_empty());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.interventions.len(), 1);
        assert_eq!(snapshot.interventions[0].slider_value, 50);
        assert_eq!(snapshot.live_data, *session.reading());
    }
}
