//! Background refresh loop and location search
//!
//! The session lives behind a `tokio::sync::Mutex`; the lock is never held
//! across a network request. A cycle whose location was changed while it was
//! in flight is discarded by the session's generation check, and the change
//! wakes the loop for an immediate refetch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, info, warn};

use crate::audit::AuditStatus;
use crate::error::{Error, Result};
use crate::geo::Location;
use crate::pipeline::AcquisitionPipeline;
use crate::session::Session;
use crate::transport::Transport;

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug)]
pub struct Refresher<T> {
    session: SharedSession,
    pipeline: AcquisitionPipeline<T>,
    wake: Notify,
}

impl<T: Transport> Refresher<T> {
    #[must_use]
    pub fn new(session: SharedSession, pipeline: AcquisitionPipeline<T>) -> Self {
        Self {
            session,
            pipeline,
            wake: Notify::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    #[must_use]
    pub fn pipeline(&self) -> &AcquisitionPipeline<T> {
        &self.pipeline
    }

    /// Run one cycle and commit it; returns the delay before the next one
    pub async fn refresh_once(&self) -> Duration {
        let cycle = self.session.lock().await.begin_fetch();
        let report = self.pipeline.run(cycle).await;
        let next = report.next_fetch_in;

        if !self.session.lock().await.apply(report) {
            debug!("cycle superseded while in flight");
        }
        next
    }

    /// Refresh immediately, then on schedule or when woken, until `shutdown` changes
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                () = self.wake.notified() => debug!("refresh woken early"),
                () = tokio::time::sleep(delay) => {}
            }

            delay = tokio::select! {
                _ = shutdown.changed() => break,
                next = self.refresh_once() => next,
            };
            debug!(next_in = ?delay, "next refresh scheduled");
        }
        info!("refresh loop stopped");
    }

    /// Resolve `query` and make it the current location
    ///
    /// # Errors
    ///
    /// * `Error::LocationNotFound` - empty query or no match
    /// * any pipeline error from the geocoding request
    pub async fn search_location(&self, query: &str) -> Result<Location> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::LocationNotFound(String::new()));
        }

        match self.pipeline.geocode(query).await {
            Ok(location) => {
                self.session.lock().await.set_location(location.clone());
                self.wake.notify_one();
                Ok(location)
            }
            Err(err) => {
                warn!(query, error = %err, "location search failed");
                let (action, details, status) = match &err {
                    Error::LocationNotFound(_) => (
                        "SEARCH_FAILED",
                        format!("No results for \"{query}\""),
                        AuditStatus::Warning,
                    ),
                    other => ("SEARCH_ERROR", other.to_string(), AuditStatus::Failed),
                };
                self.session.lock().await.record(action, details, status);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pipeline::DataSource;
    use crate::reading::PollutantReading;
    use crate::transport::testing::{FakeTransport, Reply};
    use serde_json::{Value, json};

    const PUNE: &str = "latitude=18.625";
    const DELHI: &str = "latitude=28.61";

    fn primary_body(pm2_5: f64) -> Value {
        json!({
            "current": { "pm2_5": pm2_5, "pm10": 50.0, "carbon_monoxide": 400.0, "nitrogen_dioxide": 20.0 }
        })
    }

    fn delhi_result() -> Reply {
        Reply::Json(json!({
            "results": [{ "name": "Delhi", "country": "India", "latitude": 28.61, "longitude": 77.21 }]
        }))
    }

    fn refresher(transport: FakeTransport) -> Arc<Refresher<FakeTransport>> {
        let session = Arc::new(Mutex::new(Session::default()));
        Arc::new(Refresher::new(
            session,
            AcquisitionPipeline::new(transport, Config::default()),
        ))
    }

    fn actions(session: &Session) -> Vec<String> {
        session.audit().iter().map(|e| e.action.clone()).collect()
    }

    #[tokio::test]
    async fn refresh_once_commits_and_schedules() {
        let refresher = refresher(FakeTransport::new().route(PUNE, Reply::Json(primary_body(20.0))));

        let next = refresher.refresh_once().await;

        assert_eq!(next, Duration::from_secs(15 * 60));
        let session = refresher.session().lock().await;
        assert_eq!(session.reading().pm2_5, 20.0);
        assert_eq!(session.status().source, Some(DataSource::Primary));
    }

    #[tokio::test]
    async fn failing_providers_retry_sooner() {
        let refresher = refresher(FakeTransport::new());

        let next = refresher.refresh_once().await;

        assert_eq!(next, Duration::from_secs(2 * 60));
        let session = refresher.session().lock().await;
        assert_eq!(session.reading(), &PollutantReading::default());
        assert_eq!(session.status().source, Some(DataSource::Fallback));
        assert_eq!(
            session.audit().latest().unwrap().action,
            "FALLBACK_ACTIVATED"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn location_change_supersedes_in_flight_cycle() {
        let slow_pune = Reply::Delayed(
            Duration::from_secs(5),
            Box::new(Reply::Json(primary_body(300.0))),
        );
        let transport = FakeTransport::new()
            .route(PUNE, slow_pune)
            .route(DELHI, Reply::Json(primary_body(90.0)))
            .route("name=Delhi", delhi_result());
        let refresher = refresher(transport);

        let in_flight = tokio::spawn({
            let refresher = Arc::clone(&refresher);
            async move { refresher.refresh_once().await }
        });
        while refresher.session().lock().await.generation() == 0 {
            tokio::task::yield_now().await;
        }

        let location = refresher.search_location("  Delhi ").await.unwrap();
        assert_eq!(location.label, "Delhi, India");
        in_flight.await.unwrap();

        {
            let session = refresher.session().lock().await;
            assert_eq!(session.reading(), &PollutantReading::default());
            assert_eq!(session.location().label, "Delhi, India");
            assert!(actions(&session).contains(&"FETCH_SUPERSEDED".to_string()));
        }

        refresher.refresh_once().await;
        let session = refresher.session().lock().await;
        assert_eq!(session.reading().pm2_5, 90.0);
    }

    #[tokio::test]
    async fn search_failures_are_audited() {
        let transport = FakeTransport::new()
            .route("name=Atlantis", Reply::Json(json!({ "results": [] })))
            .route("name=Delhi", Reply::Fail(Error::http_status(502)));
        let refresher = refresher(transport);

        assert_eq!(
            refresher.search_location("   ").await.unwrap_err(),
            Error::LocationNotFound(String::new())
        );
        assert!(refresher.pipeline().transport().requests().is_empty());

        assert!(matches!(
            refresher.search_location("Atlantis").await,
            Err(Error::LocationNotFound(_))
        ));
        assert!(refresher.search_location("Delhi").await.is_err());

        let session = refresher.session().lock().await;
        let latest: Vec<_> = session
            .audit()
            .iter()
            .map(|e| (e.action.as_str(), e.status))
            .collect();
        assert_eq!(
            latest,
            [
                ("SEARCH_ERROR", AuditStatus::Failed),
                ("SEARCH_FAILED", AuditStatus::Warning)
            ]
        );
        assert_eq!(session.location(), &Location::default());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_refreshes_on_schedule_until_shutdown() {
        let transport = FakeTransport::new().route(PUNE, Reply::Json(primary_body(20.0)));
        let refresher = refresher(transport);
        let (stop, shutdown) = watch::channel(false);

        let handle = tokio::spawn({
            let refresher = Arc::clone(&refresher);
            async move { refresher.run(shutdown).await }
        });

        tokio::time::sleep(Duration::from_secs(16 * 60)).await;
        assert_eq!(refresher.pipeline().transport().count(PUNE), 2);

        stop.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(refresher.pipeline().transport().count(PUNE), 2);
    }
}
