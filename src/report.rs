//! Report generation boundary
//!
//! The client sends a [`ReportEnvelope`]: a plain snapshot of the session plus
//! an already-encrypted copy of it. The service authenticates the caller,
//! stores the ciphertext under the caller's id and renders the plain snapshot
//! as a text document. Token verification and storage are injected.

use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::geo::{LngLat, Location};
use crate::reading::PollutantReading;
use crate::scenario::Interventions;
use crate::strategy::StrategyId;

const BEARER_PREFIX: &str = "Bearer ";
const REPORT_TITLE: &str = "Air Quality Twin Report";

/// Only `label` is rendered; coordinates are carried through when present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLocation {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lon", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl From<&Location> for ReportLocation {
    fn from(location: &Location) -> Self {
        Self {
            label: location.label.clone(),
            lat: Some(location.coordinates.lat),
            lng: Some(location.coordinates.lng),
        }
    }
}

/// One placed intervention as it appears in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionSummary {
    pub id: StrategyId,
    pub title: String,
    pub slider_value: u8,
    pub center: Option<LngLat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geom: Option<Value>,
}

/// Plain snapshot of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub location: Option<ReportLocation>,
    pub live_data: PollutantReading,
    #[serde(default)]
    pub interventions: Vec<InterventionSummary>,
}

impl ReportSnapshot {
    /// One summary per placement, in marker order
    #[must_use]
    pub fn capture(
        location: &Location,
        reading: &PollutantReading,
        interventions: &Interventions,
    ) -> Self {
        let summaries = interventions
            .placements()
            .map(|placement| {
                let strategy = placement.strategy.strategy();
                InterventionSummary {
                    id: placement.strategy,
                    title: strategy.title.to_string(),
                    slider_value: interventions.slider(placement.strategy),
                    center: Some(placement.position),
                    geom: None,
                }
            })
            .collect();

        Self {
            location: Some(location.into()),
            live_data: *reading,
            interventions: summaries,
        }
    }
}

/// Request body of the report endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    #[serde(rename = "plainData")]
    pub plain_data: ReportSnapshot,
    #[serde(with = "base64_bytes")]
    pub encrypted: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
}

impl ReportEnvelope {
    /// # Errors
    ///
    /// * `Error::InvalidPayload` - not JSON, wrong shape, bad base64 or empty ciphertext
    pub fn from_json(body: &str) -> Result<Self> {
        let envelope: Self =
            serde_json::from_str(body).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        if envelope.encrypted.is_empty() || envelope.iv.is_empty() {
            return Err(Error::InvalidPayload(
                "encrypted and iv must not be empty".into(),
            ));
        }
        Ok(envelope)
    }
}

/// Maps an identity token to a user id
pub trait TokenVerifier {
    /// # Errors
    ///
    /// * `Error::AuthFailure` - token rejected
    fn verify(&self, token: &str) -> Result<String>;
}

/// Ciphertext record persisted per report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
    pub uploaded_by: String,
}

pub trait ReportStore {
    /// Persist under `reports/{user_id}/{key}`
    ///
    /// # Errors
    ///
    /// * `Error::Storage` - write failed
    fn store(&self, user_id: &str, key: i64, report: StoredReport) -> Result<()>;
}

/// In-process store, keyed by user id then millisecond timestamp
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: Mutex<Vec<(String, i64, StoredReport)>>,
}

impl MemoryReportStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports stored for `user_id`, oldest first
    #[must_use]
    pub fn reports_for(&self, user_id: &str) -> Vec<StoredReport> {
        self.reports
            .lock()
            .map(|reports| {
                reports
                    .iter()
                    .filter(|(owner, _, _)| owner == user_id)
                    .map(|(_, _, report)| report.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ReportStore for MemoryReportStore {
    fn store(&self, user_id: &str, key: i64, report: StoredReport) -> Result<()> {
        let mut reports = self
            .reports
            .lock()
            .map_err(|e| Error::Storage(e.to_string()))?;
        reports.push((user_id.to_string(), key, report));
        Ok(())
    }
}

/// Rendered plain-text report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub file_name: String,
    pub generated_at: DateTime<Utc>,
    pub lines: Vec<String>,
}

impl ReportDocument {
    #[must_use]
    pub fn render(snapshot: &ReportSnapshot, generated_at: DateTime<Utc>) -> Self {
        let mut lines = vec![
            REPORT_TITLE.to_string(),
            format!(
                "Generated: {}",
                generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            format!(
                "Location: {}",
                snapshot
                    .location
                    .as_ref()
                    .map_or("N/A", |location| location.label.as_str())
            ),
            "Live data:".to_string(),
        ];

        let data = &snapshot.live_data;
        for (key, value) in [
            ("pm2_5", data.pm2_5),
            ("pm10", data.pm10),
            ("co", data.co),
            ("no2", data.no2),
            ("co2_baseline", data.co2_baseline),
        ] {
            lines.push(format!(" - {key}: {value}"));
        }

        lines.push(String::new());
        lines.push("Interventions:".to_string());
        if snapshot.interventions.is_empty() {
            lines.push("  (none)".to_string());
        }
        for (idx, item) in snapshot.interventions.iter().enumerate() {
            lines.push(format!(
                "{}. {} ({}) - slider {}%",
                idx + 1,
                item.title,
                item.id,
                item.slider_value
            ));
            let center = item
                .center
                .map_or_else(|| "N/A".to_string(), |c| format!("{},{}", c.lat, c.lng));
            lines.push(format!("    Center: {center}"));
            if item.geom.is_some() {
                lines.push("    Geometry present (GeoJSON)".to_string());
            }
        }

        Self {
            file_name: format!("aqi-twin-report-{}.txt", generated_at.timestamp_millis()),
            generated_at,
            lines,
        }
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Authenticates, stores and renders report requests
#[derive(Debug)]
pub struct ReportService<V, S> {
    verifier: V,
    store: S,
}

impl<V: TokenVerifier, S: ReportStore> ReportService<V, S> {
    #[must_use]
    pub fn new(verifier: V, store: S) -> Self {
        Self { verifier, store }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle one report request
    ///
    /// # Errors
    ///
    /// * `Error::AuthFailure` - missing, malformed or rejected bearer token
    /// * `Error::Storage` - ciphertext could not be persisted
    pub fn generate(
        &self,
        authorization: Option<&str>,
        envelope: ReportEnvelope,
    ) -> Result<ReportDocument> {
        let token = bearer_token(authorization)?;
        let user_id = self.verifier.verify(token).map_err(|e| match e {
            Error::AuthFailure(reason) => Error::AuthFailure(format!("Invalid ID token: {reason}")),
            other => Error::AuthFailure(format!("Invalid ID token: {other}")),
        })?;

        let now = Utc::now();
        let stored = StoredReport {
            timestamp: now,
            ciphertext: envelope.encrypted,
            iv: envelope.iv,
            uploaded_by: user_id.clone(),
        };
        self.store
            .store(&user_id, now.timestamp_millis(), stored)
            .inspect_err(|e| warn!(user = %user_id, error = %e, "report store failed"))?;

        let document = ReportDocument::render(&envelope.plain_data, now);
        info!(user = %user_id, file = %document.file_name, "report generated");
        Ok(document)
    }
}

/// Standard base64 with padding, as browsers emit it via `btoa`
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.trim()).map_err(de::Error::custom)
    }
}

fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    authorization
        .and_then(|header| header.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::AuthFailure("Missing or invalid auth header".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    struct StaticVerifier;

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> Result<String> {
            match token {
                "good-token" => Ok("user-1".into()),
                _ => Err(Error::AuthFailure("token expired".into())),
            }
        }
    }

    fn snapshot() -> ReportSnapshot {
        let mut interventions = Interventions::new();
        interventions.set_slider(StrategyId::Ev, 60);
        interventions.place(StrategyId::Ev, LngLat::new(73.855, 18.625), None);
        interventions.place(StrategyId::Trees, LngLat::new(73.86, 18.63), None);
        ReportSnapshot::capture(
            &Location::default(),
            &PollutantReading::default(),
            &interventions,
        )
    }

    fn envelope() -> ReportEnvelope {
        ReportEnvelope {
            plain_data: snapshot(),
            encrypted: vec![0xde, 0xad, 0xbe, 0xef],
            iv: vec![0x00, 0xff],
        }
    }

    #[test]
    fn snapshot_wire_format() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(value["location"]["label"], "Bhosari, Pune");
        assert_eq!(value["liveData"]["pm2_5"], 55.0);
        assert_eq!(value["interventions"][0]["id"], "ev");
        assert_eq!(value["interventions"][0]["sliderValue"], 60);
        assert_eq!(value["interventions"][1]["sliderValue"], 0);
        assert!(value["interventions"][0].get("geom").is_none());
    }

    #[test]
    fn envelope_from_json() {
        let body = json!({
            "plainData": serde_json::to_value(snapshot()).unwrap(),
            "encrypted": "3q2+7w==",
            "iv": "AP8="
        })
        .to_string();
        assert_eq!(ReportEnvelope::from_json(&body).unwrap(), envelope());

        let bad_base64 = body.replace("3q2+7w==", "not-base64!");
        let err = ReportEnvelope::from_json(&bad_base64).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
        assert_eq!(err.status_code(), 400);

        let empty = body.replace("3q2+7w==", "");
        assert!(matches!(
            ReportEnvelope::from_json(&empty),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn envelope_from_browser_client() {
        let body = r#"{
            "plainData": {
                "location": { "lat": 18.625, "lon": 73.855, "label": "Bhosari, Pune" },
                "liveData": { "pm2_5": 55, "pm10": 90, "co": 600, "no2": 40, "co2_baseline": 1000 },
                "interventions": [
                    { "id": "ev", "title": "EV Adoption", "sliderValue": 60,
                      "center": { "lat": 18.625, "lng": 73.855 } }
                ]
            },
            "encrypted": "3q2+7w==",
            "iv": "AP8="
        }"#;

        let envelope = ReportEnvelope::from_json(body).unwrap();
        let location = envelope.plain_data.location.as_ref().unwrap();
        assert_eq!(location.label, "Bhosari, Pune");
        assert_eq!(location.lng, Some(73.855));
        assert_eq!(envelope.encrypted, [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(envelope.iv, [0x00, 0xff]);
        assert_eq!(envelope.plain_data.live_data, PollutantReading::default());

        let label_only = body.replace(r#""lat": 18.625, "lon": 73.855, "#, "");
        let envelope = ReportEnvelope::from_json(&label_only).unwrap();
        assert_eq!(envelope.plain_data.location.unwrap().lat, None);
    }

    #[test]
    fn stored_report_keeps_base64_on_the_wire() {
        let stored = StoredReport {
            timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
            ciphertext: vec![0xde, 0xad, 0xbe, 0xef],
            iv: vec![0x00, 0xff],
            uploaded_by: "user-1".into(),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["ciphertext"], "3q2+7w==");
        assert_eq!(value["iv"], "AP8=");
        assert_eq!(value["uploadedBy"], "user-1");
    }

    #[rstest]
    #[case(None)]
    #[case(Some("Basic dXNlcjpwYXNz"))]
    #[case(Some("Bearer "))]
    #[case(Some("Bearer bad-token"))]
    fn rejects_unauthenticated(#[case] header: Option<&str>) {
        let service = ReportService::new(StaticVerifier, MemoryReportStore::new());
        let err = service.generate(header, envelope()).unwrap_err();
        assert!(matches!(err, Error::AuthFailure(_)));
        assert_eq!(err.status_code(), 401);
        assert!(service.store().reports_for("user-1").is_empty());
    }

    #[test]
    fn stores_ciphertext_and_renders() {
        let service = ReportService::new(StaticVerifier, MemoryReportStore::new());
        let document = service
            .generate(Some("Bearer good-token"), envelope())
            .unwrap();

        let stored = service.store().reports_for("user-1");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].ciphertext, [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(stored[0].uploaded_by, "user-1");
        assert_eq!(stored[0].timestamp, document.generated_at);
        assert!(document.file_name.ends_with(".txt"));
        assert!(document.lines.contains(&"Location: Bhosari, Pune".to_string()));
    }

    #[test]
    fn render_document() {
        let mut snapshot = snapshot();
        snapshot.interventions[1].geom = Some(json!({ "type": "Point" }));
        let generated_at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();

        let document = ReportDocument::render(&snapshot, generated_at);

        insta::assert_snapshot!(document.to_text(), @r"
        Air Quality Twin Report
        Generated: 2026-10-18T09:30:00Z
        Location: Bhosari, Pune
        Live data:
         - pm2_5: 55
         - pm10: 90
         - co: 600
         - no2: 40
         - co2_baseline: 1000

        Interventions:
        1. EV Adoption (ev) - slider 60%
            Center: 18.625,73.855
        2. Urban Greening (trees) - slider 0%
            Center: 18.63,73.86
            Geometry present (GeoJSON)
        ");
    }

    #[test]
    fn render_without_location_or_interventions() {
        let snapshot = ReportSnapshot {
            location: None,
            live_data: PollutantReading::default(),
            interventions: Vec::new(),
        };
        let document = ReportDocument::render(&snapshot, Utc::now());
        assert!(document.lines.contains(&"Location: N/A".to_string()));
        assert_eq!(document.lines.last().unwrap(), "  (none)");
    }
}
