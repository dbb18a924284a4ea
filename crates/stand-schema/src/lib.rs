//! Versioned schema lifecycle for a family of managed tables.
//!
//! `stand-schema` creates a host's tables on first activation and evolves
//! them forward, release by release, without losing data:
//!
//! - **Tables** describe their current shape with [`TableDefinition`]
//! - **Migrations** are compiled-in units of idempotent [`SchemaOperation`]s,
//!   each targeting one semantic version
//! - **The runner** applies the units in `(installed, app]`, oldest first,
//!   and records every unit in an append-only audit log
//! - **The manager** gates everything on the stored version and serializes
//!   concurrent bootstraps with a lock row
//!
//! # Example
//!
//! ```rust,ignore
//! use stand_schema::prelude::*;
//!
//! pub struct AddVenue;
//!
//! impl Migration for AddVenue {
//!     const VERSION: &'static str = "1.1.0";
//!     const NAME: &'static str = "add_event_venue";
//!
//!     fn operations(names: &TableNames) -> Vec<SchemaOperation> {
//!         vec![SchemaOperation::add_column(
//!             names.physical("events"),
//!             ColumnSchema::new("venue", SqlType::Varchar(255)),
//!         )]
//!     }
//! }
//!
//! static MIGRATIONS: &[MigrationEntry] = &[MigrationEntry::of::<AddVenue>()];
//!
//! let mut manager = SchemaManager::new(pool, SchemaConfig::new("1.1.0"))?
//!     .with_migrations(MIGRATIONS);
//! manager.register_table(EventsTable)?;
//!
//! match manager.check_and_upgrade().await? {
//!     UpgradeOutcome::NotInstalled => {
//!         manager.install().await?;
//!     }
//!     _ => {}
//! }
//! ```

pub mod alter;
pub mod audit;
pub mod clock;
pub mod config;
pub mod dialect;
pub mod discovery;
pub mod error;
pub mod introspect;
pub mod lock;
pub mod manager;
pub mod migration;
pub mod operations;
pub mod options;
pub mod runner;
pub mod schema;
pub mod table;
pub mod value;
pub mod version;

pub use config::SchemaConfig;
pub use error::{Result, SchemaError};
pub use manager::{InstallReport, SchemaManager, UpgradeOutcome};
pub use migration::{Migration, MigrationEntry, MigrationUnit, TableNames};
pub use operations::{OperationOutcome, SchemaOperation};
pub use table::{CreateOutcome, ListQuery, OrderBy, OrderDirection, Table, TableDefinition};
pub use value::{record, Record, SqlValue, ToSqlValue};
pub use version::SchemaVersion;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::alter::SchemaAlterer;
    pub use crate::audit::{AuditLog, AuditLogEntry, AuditStatus};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::SchemaConfig;
    pub use crate::dialect::{MigrationDialect, SqliteDialect};
    pub use crate::discovery::discover;
    pub use crate::error::{Result, SchemaError};
    pub use crate::introspect::{Introspector, LiveColumn, LiveIndex, TableSnapshot};
    pub use crate::lock::{LockGuard, MigrationLock};
    pub use crate::manager::{InstallReport, SchemaManager, UpgradeOutcome};
    pub use crate::migration::{Migration, MigrationEntry, MigrationUnit, TableNames};
    pub use crate::operations::{OperationOutcome, SchemaOperation};
    pub use crate::options::OptionStore;
    pub use crate::runner::{AppliedUnit, MigrationRunner, RunReport};
    pub use crate::schema::{ColumnDefault, ColumnSchema, IndexSchema, SqlType, TableSchema};
    pub use crate::table::{
        CreateOutcome, ListQuery, OrderBy, OrderDirection, Table, TableDefinition,
    };
    pub use crate::value::{record, Record, SqlValue, ToSqlValue};
    pub use crate::version::SchemaVersion;
}
