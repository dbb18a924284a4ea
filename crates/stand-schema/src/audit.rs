//! Migration audit log.
//!
//! The log is a JSON array stored under one option key. Entries are only
//! ever appended:
//!
//! ```json
//! [{"version": "1.0.1", "timestamp": "2025-05-01 12:00:00", "status": "completed"}]
//! ```
//!
//! The log is diagnostic. A stored value that is not such an array is moved
//! to `<key>_unreadable` and the log starts over.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::Clock;
use crate::error::Result;
use crate::options::OptionStore;
use crate::version::SchemaVersion;

/// Outcome recorded for a migration unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// Every operation of the unit finished.
    Completed,
    /// An operation of the unit failed.
    Failed,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Target version of the unit.
    pub version: SchemaVersion,
    /// When the unit finished or failed.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Result.
    pub status: AuditStatus,
    /// Failure text, for failed units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::value::DATETIME_FORMAT;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(DATETIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

/// Append-only log of migration runs.
#[derive(Debug, Clone)]
pub struct AuditLog {
    options: OptionStore,
    key: String,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    /// Creates a log stored under `key`.
    pub fn new(options: OptionStore, key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            options,
            key: key.into(),
            clock,
        }
    }

    /// Returns every entry in append order.
    pub async fn entries(&self) -> Result<Vec<AuditLogEntry>> {
        Ok(self.load().await?.0)
    }

    /// Reads the log. The second value is the raw text when it did not parse.
    async fn load(&self) -> Result<(Vec<AuditLogEntry>, Option<String>)> {
        let Some(raw) = self.options.get(&self.key).await? else {
            return Ok((Vec::new(), None));
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok((entries, None)),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Audit log unreadable, starting a new one");
                Ok((Vec::new(), Some(raw)))
            }
        }
    }

    /// Key the unreadable value is kept under.
    #[must_use]
    pub fn unreadable_key(&self) -> String {
        format!("{}_unreadable", self.key)
    }

    /// Returns the entries recorded for one version.
    pub async fn entries_for(&self, version: &SchemaVersion) -> Result<Vec<AuditLogEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|e| &e.version == version)
            .collect())
    }

    /// Returns the versions with a completed entry, in append order.
    pub async fn completed_versions(&self) -> Result<Vec<SchemaVersion>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.status == AuditStatus::Completed)
            .map(|e| e.version)
            .collect())
    }

    /// Appends a completed entry.
    pub async fn record_completed(&self, version: &SchemaVersion) -> Result<AuditLogEntry> {
        self.append(version, AuditStatus::Completed, None).await
    }

    /// Appends a failed entry with the failure text.
    pub async fn record_failed(
        &self,
        version: &SchemaVersion,
        error: impl Into<String>,
    ) -> Result<AuditLogEntry> {
        self.append(version, AuditStatus::Failed, Some(error.into()))
            .await
    }

    /// Appends an entry stamped with the current time.
    pub async fn append(
        &self,
        version: &SchemaVersion,
        status: AuditStatus,
        error: Option<String>,
    ) -> Result<AuditLogEntry> {
        let entry = AuditLogEntry {
            version: version.clone(),
            timestamp: self.clock.now(),
            status,
            error,
        };
        let (mut entries, unreadable) = self.load().await?;
        if let Some(raw) = unreadable {
            self.options.set(&self.unreadable_key(), &raw).await?;
        }
        entries.push(entry.clone());
        self.options.set_json(&self.key, &entries).await?;
        Ok(entry)
    }
}
