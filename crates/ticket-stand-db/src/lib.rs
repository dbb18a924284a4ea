//! Ticket Stand storage.
//!
//! Four tables (events, ticket types, event extras and the junction that
//! bundles extras into ticket types) managed by `stand-schema`:
//!
//! - [`activate`] runs on first activation and creates every table
//! - [`bootstrap`] runs on every start and brings an older store forward
//!   through the compiled [`MIGRATIONS`](migrations::MIGRATIONS)
//!
//! ```rust,ignore
//! use ticket_stand_db::{bootstrap, activate, default_config, TicketError};
//!
//! let stand = match bootstrap(pool.clone(), default_config()).await {
//!     Ok(stand) => stand,
//!     Err(TicketError::NotInstalled { .. }) => activate(pool, default_config()).await?.0,
//!     Err(e) => return Err(e),
//! };
//! let event = stand.events()?.get_by_slug("summer-fest").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod sanitize;
pub mod tables;

use std::sync::Arc;

use sqlx::SqlitePool;
use stand_schema::clock::Clock;
use stand_schema::{InstallReport, SchemaConfig, SchemaManager, UpgradeOutcome};
use tracing::info;

pub use error::{Result, TicketError};
pub use tables::{EventExtras, Events, TicketTypeExtras, TicketTypes};

use tables::{EventExtrasTable, EventsTable, TicketTypeExtrasTable, TicketTypesTable};

/// Option flag written by [`TicketStand::activate`].
pub const ACTIVATED_OPTION: &str = "ticket_stand_activated";

/// Configuration with this crate's version as the application version.
#[must_use]
pub fn default_config() -> SchemaConfig {
    SchemaConfig::new(env!("CARGO_PKG_VERSION"))
}

/// The ticket tables registered with a schema manager.
#[derive(Debug)]
pub struct TicketStand {
    manager: SchemaManager,
}

impl TicketStand {
    /// Registers the four tables and the migration chain. Touches nothing
    /// in the store.
    pub fn new(pool: SqlitePool, config: SchemaConfig) -> Result<Self> {
        let mut manager =
            SchemaManager::new(pool, config)?.with_migrations(migrations::MIGRATIONS);
        manager.register_table(EventsTable)?;
        manager.register_table(TicketTypesTable)?;
        manager.register_table(EventExtrasTable)?;
        manager.register_table(TicketTypeExtrasTable)?;
        Ok(Self { manager })
    }

    /// Replaces the clock used for audit entries and lock expiry.
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            manager: self.manager.with_clock(clock),
        }
    }

    /// The underlying schema manager.
    #[must_use]
    pub fn manager(&self) -> &SchemaManager {
        &self.manager
    }

    /// Upgrades the store if it is behind. Fails with
    /// [`TicketError::NotInstalled`] when no version is stored.
    pub async fn bootstrap(&self) -> Result<UpgradeOutcome> {
        let outcome = self.manager.check_and_upgrade().await?;
        match &outcome {
            UpgradeOutcome::NotInstalled => {
                return Err(TicketError::NotInstalled {
                    app_version: self.manager.app_version().clone(),
                })
            }
            UpgradeOutcome::UpToDate { version } => {
                info!(version = %version, "Ticket tables up to date");
            }
            UpgradeOutcome::Upgraded { from, to, applied } => {
                info!(from = %from, to = %to, units = applied.len(), "Ticket tables upgraded");
            }
        }
        Ok(outcome)
    }

    /// Creates every table and records the activation.
    pub async fn activate(&self) -> Result<InstallReport> {
        let report = self.manager.install().await?;
        self.manager.options().set(ACTIVATED_OPTION, "1").await?;
        info!(
            version = %report.version,
            created = report.created.len(),
            "Ticket tables activated"
        );
        Ok(report)
    }

    /// True once activation has completed at least once.
    pub async fn is_activated(&self) -> Result<bool> {
        self.manager.options().ensure_table().await?;
        Ok(self.manager.options().get(ACTIVATED_OPTION).await?.as_deref() == Some("1"))
    }

    /// Event lookups.
    pub fn events(&self) -> Result<Events<'_>> {
        Ok(Events::new(self.manager.table("events")?))
    }

    /// Ticket type lookups.
    pub fn ticket_types(&self) -> Result<TicketTypes<'_>> {
        Ok(TicketTypes::new(self.manager.table("ticket_types")?))
    }

    /// Event extra lookups.
    pub fn event_extras(&self) -> Result<EventExtras<'_>> {
        Ok(EventExtras::new(self.manager.table("event_extras")?))
    }

    /// Ticket type / extra associations.
    pub fn ticket_type_extras(&self) -> Result<TicketTypeExtras<'_>> {
        Ok(TicketTypeExtras::new(
            self.manager.table("ticket_type_extras")?,
            self.manager.table("ticket_types")?,
            self.manager.table("event_extras")?,
        ))
    }
}

/// Registers the tables and upgrades the store. Run on every start.
pub async fn bootstrap(pool: SqlitePool, config: SchemaConfig) -> Result<TicketStand> {
    let stand = TicketStand::new(pool, config)?;
    stand.bootstrap().await?;
    Ok(stand)
}

/// Registers the tables and installs them. Run on activation.
pub async fn activate(pool: SqlitePool, config: SchemaConfig) -> Result<(TicketStand, InstallReport)> {
    let stand = TicketStand::new(pool, config)?;
    let report = stand.activate().await?;
    Ok((stand, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    #[test]
    fn test_default_config_uses_crate_version() {
        assert_eq!(default_config().app_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(default_config().table_prefix, "ticket_stand_");
    }

    #[tokio::test]
    async fn test_bootstrap_requires_activation() {
        let pool = create_test_pool().await;
        let err = bootstrap(pool.clone(), default_config()).await.unwrap_err();
        assert!(matches!(err, TicketError::NotInstalled { .. }));
        assert!(err.is_schema_incomplete());

        let (stand, report) = activate(pool.clone(), default_config()).await.unwrap();
        assert_eq!(report.created.len(), 4);
        assert!(stand.is_activated().await.unwrap());
        assert!(stand.manager().is_ready());

        let again = bootstrap(pool, default_config()).await.unwrap();
        assert!(again.manager().is_ready());
    }

    #[tokio::test]
    async fn test_views_resolve() {
        let stand = TicketStand::new(create_test_pool().await, default_config()).unwrap();
        assert_eq!(stand.events().unwrap().table().physical_name(), "ticket_stand_events");
        assert_eq!(
            stand.ticket_type_extras().unwrap().table().physical_name(),
            "ticket_stand_ticket_type_extras"
        );
        assert!(!stand.is_activated().await.unwrap());
    }
}
