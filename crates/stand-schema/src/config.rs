//! Schema manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::migration::TableNames;
use crate::version::SchemaVersion;

/// Settings for a [`SchemaManager`](crate::SchemaManager).
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use stand_schema::SchemaConfig;
///
/// let config: SchemaConfig = serde_json::from_str(r#"{"app_version": "1.2.0"}"#).unwrap();
/// assert_eq!(config.table_prefix, "ticket_stand_");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Version of the running application.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Prefix prepended to every logical table name.
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Option key holding the installed schema version.
    #[serde(default = "default_version_option")]
    pub version_option: String,

    /// Option key holding the migration audit log.
    #[serde(default = "default_log_option")]
    pub log_option: String,

    /// Name of the migration lock row.
    #[serde(default = "default_lock_name")]
    pub lock_name: String,

    /// Seconds after which a held lock counts as abandoned.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Seconds to wait for the lock before giving up. Unset means wait as
    /// long as the holder keeps its lease alive.
    #[serde(default)]
    pub lock_wait_secs: Option<u64>,

    /// Milliseconds between lock attempts.
    #[serde(default = "default_lock_poll_ms")]
    pub lock_poll_ms: u64,
}

fn default_app_version() -> String {
    "0.0.0".to_string()
}
fn default_table_prefix() -> String {
    "ticket_stand_".to_string()
}
fn default_version_option() -> String {
    "ticket_stand_db_version".to_string()
}
fn default_log_option() -> String {
    "ticket_stand_migration_logs".to_string()
}
fn default_lock_name() -> String {
    "schema_migration".to_string()
}
fn default_lock_ttl_secs() -> u64 {
    600
}
fn default_lock_poll_ms() -> u64 {
    250
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            app_version: default_app_version(),
            table_prefix: default_table_prefix(),
            version_option: default_version_option(),
            log_option: default_log_option(),
            lock_name: default_lock_name(),
            lock_ttl_secs: default_lock_ttl_secs(),
            lock_wait_secs: None,
            lock_poll_ms: default_lock_poll_ms(),
        }
    }
}

impl SchemaConfig {
    /// Creates a configuration for the given application version.
    #[must_use]
    pub fn new(app_version: impl Into<String>) -> Self {
        Self {
            app_version: app_version.into(),
            ..Self::default()
        }
    }

    /// Sets the table prefix.
    #[must_use]
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Sets the option keys for the version and the audit log.
    #[must_use]
    pub fn option_keys(mut self, version: impl Into<String>, log: impl Into<String>) -> Self {
        self.version_option = version.into();
        self.log_option = log.into();
        self
    }

    /// Sets lock TTL, wait and poll interval.
    #[must_use]
    pub fn lock_timing(mut self, ttl: Duration, wait: Duration, poll: Duration) -> Self {
        self.lock_ttl_secs = ttl.as_secs();
        self.lock_wait_secs = Some(wait.as_secs());
        self.lock_poll_ms = u64::try_from(poll.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Parses the application version.
    pub fn parsed_app_version(&self) -> Result<SchemaVersion> {
        SchemaVersion::parse(&self.app_version)
    }

    /// Returns the table name resolver for this prefix.
    #[must_use]
    pub fn table_names(&self) -> TableNames {
        TableNames::new(self.table_prefix.clone())
    }

    /// Physical name of the option table.
    #[must_use]
    pub fn options_table(&self) -> String {
        format!("{}schema_options", self.table_prefix)
    }

    /// Physical name of the lock table.
    #[must_use]
    pub fn lock_table(&self) -> String {
        format!("{}schema_lock", self.table_prefix)
    }

    /// Lock TTL.
    #[must_use]
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// Maximum time to wait for the lock, if bounded.
    #[must_use]
    pub fn lock_wait(&self) -> Option<Duration> {
        self.lock_wait_secs.map(Duration::from_secs)
    }

    /// Interval between lock attempts.
    #[must_use]
    pub fn lock_poll(&self) -> Duration {
        Duration::from_millis(self.lock_poll_ms)
    }
}
