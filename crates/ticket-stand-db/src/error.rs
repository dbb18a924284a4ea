//! Error types for the ticket store.

use stand_schema::{SchemaError, SchemaVersion};
use thiserror::Error;

/// Errors raised by the ticket store.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Schema lifecycle or query failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// No schema version is stored; the store must be activated first.
    #[error("Ticket tables are not installed (application version {app_version})")]
    NotInstalled {
        /// Version the application expected to find.
        app_version: SchemaVersion,
    },
}

impl TicketError {
    /// True when the tables may be missing or behind the application.
    #[must_use]
    pub fn is_schema_incomplete(&self) -> bool {
        match self {
            Self::Schema(e) => e.is_schema_incomplete(),
            Self::NotInstalled { .. } => true,
        }
    }
}

/// Result type for ticket store operations.
pub type Result<T> = std::result::Result<T, TicketError>;
