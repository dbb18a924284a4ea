//! Error types for the schema lifecycle manager.

use std::time::Duration;

/// Errors that can occur while installing, migrating or querying managed tables.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A migration declares a version that cannot be parsed.
    #[error("Migration '{name}' declares malformed version '{version}': {reason}")]
    MalformedMigrationVersion {
        /// Name of the offending migration.
        name: String,
        /// The version text as declared.
        version: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two migrations claim the same target version.
    #[error("Migrations '{first}' and '{second}' both target version {version}")]
    DuplicateMigrationVersion {
        /// The contested version.
        version: String,
        /// The migration registered first.
        first: String,
        /// The migration registered second.
        second: String,
    },

    /// A structural operation inside a migration unit failed.
    #[error("Migration {version} failed during '{operation}': {source}")]
    StructuralOperationFailed {
        /// Target version of the failing unit.
        version: String,
        /// Description of the failing operation.
        operation: String,
        /// Underlying failure.
        #[source]
        source: Box<SchemaError>,
    },

    /// A table could not be created during installation.
    #[error("Installing table '{table}' failed: {source}")]
    InstallFailed {
        /// Physical name of the table.
        table: String,
        /// Underlying failure.
        #[source]
        source: Box<SchemaError>,
    },

    /// A version string (configuration or stored) could not be parsed.
    #[error("Invalid version '{value}': {reason}")]
    InvalidVersion {
        /// The rejected text.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A table with the same logical name is already registered.
    #[error("Table '{0}' is already registered")]
    DuplicateTable(String),

    /// No table with this logical name is registered.
    #[error("Table '{0}' is not registered")]
    UnknownTable(String),

    /// A column used in a query or write is not declared on the table.
    #[error("Invalid field '{field}' for table '{table}'")]
    InvalidField {
        /// Physical table name.
        table: String,
        /// The rejected column name.
        field: String,
    },

    /// A record failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The migration lock could not be taken in time.
    #[error("Migration lock '{name}' still held after {waited:?}")]
    LockTimeout {
        /// Lock name.
        name: String,
        /// How long acquisition was attempted.
        waited: Duration,
    },

    /// The lease expired and another worker took the lock over.
    #[error("Migration lock '{name}' was taken over by another worker")]
    LockLost {
        /// Lock name.
        name: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SchemaError {
    /// Returns true if the error leaves the schema behind its target version.
    ///
    /// Hosts use this to decide whether to halt startup.
    #[must_use]
    pub fn is_schema_incomplete(&self) -> bool {
        matches!(
            self,
            Self::StructuralOperationFailed { .. }
                | Self::InstallFailed { .. }
                | Self::DuplicateMigrationVersion { .. }
                | Self::LockTimeout { .. }
                | Self::LockLost { .. }
        )
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
