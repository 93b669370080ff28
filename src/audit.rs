//! Bounded, newest-first audit trail of pipeline and session events

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of retained entries
pub const AUDIT_LOG_CAPACITY: usize = 50;

/// Outcome tag of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    Success,
    Warning,
    Failed,
    Initiated,
    Fallback,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Failed => "FAILED",
            Self::Initiated => "INITIATED",
            Self::Fallback => "FALLBACK",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub details: String,
    pub status: AuditStatus,
}

impl AuditEntry {
    /// New entry stamped with the current time
    #[must_use]
    pub fn new(action: &str, details: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.to_string(),
            details: details.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an entry, evicting the oldest once full
    pub fn push(&mut self, entry: AuditEntry) {
        tracing::debug!(
            action = %entry.action,
            status = %entry.status,
            details = %entry.details,
            "audit"
        );
        self.entries.push_front(entry);
        self.entries.truncate(AUDIT_LOG_CAPACITY);
    }

    pub fn record(&mut self, action: &str, details: impl Into<String>, status: AuditStatus) {
        self.push(AuditEntry::new(action, details, status));
    }

    /// Entries from newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&AuditEntry> {
        self.entries.front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
