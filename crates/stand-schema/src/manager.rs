//! Schema lifecycle manager.
//!
//! [`SchemaManager`] owns the registered tables and the two host entry
//! points: [`install`](SchemaManager::install) on first activation and
//! [`check_and_upgrade`](SchemaManager::check_and_upgrade) on every
//! bootstrap. Both run under the migration lock and only ever move the
//! stored version forward.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::sqlite::SqlitePool;
use tracing::{info, warn};

use crate::alter::SchemaAlterer;
use crate::audit::AuditLog;
use crate::clock::{Clock, SystemClock};
use crate::config::SchemaConfig;
use crate::dialect::SqliteDialect;
use crate::discovery::discover;
use crate::error::{Result, SchemaError};
use crate::lock::{LockGuard, MigrationLock};
use crate::migration::MigrationEntry;
use crate::options::OptionStore;
use crate::runner::{MigrationRunner, RunReport};
use crate::table::{Table, TableDefinition};
use crate::version::SchemaVersion;

/// Result of [`SchemaManager::check_and_upgrade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// No version is stored; nothing ran. The host should call `install`.
    NotInstalled,
    /// The stored version is already at or past the application version.
    UpToDate {
        /// The stored version.
        version: SchemaVersion,
    },
    /// Migrations ran and the stored version advanced.
    Upgraded {
        /// Version before the run.
        from: SchemaVersion,
        /// Version after the run.
        to: SchemaVersion,
        /// Target versions of the applied units.
        applied: Vec<SchemaVersion>,
    },
}

/// Result of [`SchemaManager::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Migrations run before creating tables, for stores already behind.
    pub migrated: RunReport,
    /// Physical names of the tables that did not exist before.
    pub created: Vec<String>,
    /// The stored version afterwards.
    pub version: SchemaVersion,
}

/// Owns managed tables and evolves their schema.
pub struct SchemaManager {
    pool: SqlitePool,
    config: SchemaConfig,
    app_version: SchemaVersion,
    clock: Arc<dyn Clock>,
    migrations: &'static [MigrationEntry],
    tables: Vec<Table>,
    options: OptionStore,
    ready: AtomicBool,
}

impl SchemaManager {
    /// Creates a manager. Fails if the application version does not parse.
    pub fn new(pool: SqlitePool, config: SchemaConfig) -> Result<Self> {
        let app_version = config.parsed_app_version()?;
        let options = OptionStore::new(pool.clone(), config.options_table());
        Ok(Self {
            pool,
            config,
            app_version,
            clock: Arc::new(SystemClock),
            migrations: &[],
            tables: Vec::new(),
            options,
            ready: AtomicBool::new(false),
        })
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the migration registry.
    #[must_use]
    pub fn with_migrations(mut self, migrations: &'static [MigrationEntry]) -> Self {
        self.migrations = migrations;
        self
    }

    /// Registers a table. Logical names must be unique.
    pub fn register_table(&mut self, definition: impl TableDefinition + 'static) -> Result<&Table> {
        if self
            .tables
            .iter()
            .any(|t| t.logical_name() == definition.logical_name())
        {
            return Err(SchemaError::DuplicateTable(
                definition.logical_name().to_string(),
            ));
        }
        let table = Table::new(self.pool.clone(), &self.config.table_prefix, definition)?;
        self.tables.push(table);
        let idx = self.tables.len() - 1;
        Ok(&self.tables[idx])
    }

    /// Returns a registered table by logical name.
    pub fn table(&self, logical_name: &str) -> Result<&Table> {
        self.tables
            .iter()
            .find(|t| t.logical_name() == logical_name)
            .ok_or_else(|| SchemaError::UnknownTable(logical_name.to_string()))
    }

    /// Returns the registered tables in registration order.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Returns the running application's version.
    #[must_use]
    pub fn app_version(&self) -> &SchemaVersion {
        &self.app_version
    }

    /// Returns the option store.
    #[must_use]
    pub fn options(&self) -> &OptionStore {
        &self.options
    }

    /// Returns the audit log.
    #[must_use]
    pub fn audit_log(&self) -> AuditLog {
        AuditLog::new(
            self.options.clone(),
            self.config.log_option.clone(),
            self.clock.clone(),
        )
    }

    /// Returns the migration lock.
    #[must_use]
    pub fn lock(&self) -> MigrationLock {
        MigrationLock::new(self.pool.clone(), &self.config, self.clock.clone())
    }

    /// True once install or upgrade has brought the schema to the app version.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Reads the stored schema version.
    pub async fn installed_version(&self) -> Result<Option<SchemaVersion>> {
        self.ensure_bookkeeping().await?;
        self.stored_version().await
    }

    /// Brings the stored schema up to the application version.
    ///
    /// Cheap when nothing is due: the lock is only taken when the stored
    /// version is behind.
    pub async fn check_and_upgrade(&self) -> Result<UpgradeOutcome> {
        self.ensure_bookkeeping().await?;

        let Some(stored) = self.stored_version().await? else {
            warn!(app_version = %self.app_version, "No schema version stored, install required");
            return Ok(UpgradeOutcome::NotInstalled);
        };
        if stored >= self.app_version {
            self.ready.store(true, Ordering::SeqCst);
            return Ok(UpgradeOutcome::UpToDate { version: stored });
        }

        let guard = self.lock().acquire().await?;
        let outcome = self.upgrade_locked(&guard).await;
        Self::finish(guard, outcome).await
    }

    /// Creates every registered table at its current shape.
    ///
    /// A store that already records an older version is first migrated
    /// through the pending range. Tables created before a failing one stay.
    pub async fn install(&self) -> Result<InstallReport> {
        self.ensure_bookkeeping().await?;

        let guard = self.lock().acquire().await?;
        let outcome = self.install_locked(&guard).await;
        Self::finish(guard, outcome).await
    }

    async fn upgrade_locked(&self, lease: &LockGuard) -> Result<UpgradeOutcome> {
        // Another worker may have finished while we waited for the lock
        let Some(stored) = self.stored_version().await? else {
            return Ok(UpgradeOutcome::NotInstalled);
        };
        if stored >= self.app_version {
            info!(version = %stored, "Schema upgraded by another worker");
            self.ready.store(true, Ordering::SeqCst);
            return Ok(UpgradeOutcome::UpToDate { version: stored });
        }

        info!(from = %stored, to = %self.app_version, "Upgrading schema");
        let report = self.migrate(&stored, lease).await?;
        self.advance_version(&stored, lease).await?;
        self.ready.store(true, Ordering::SeqCst);

        Ok(UpgradeOutcome::Upgraded {
            from: stored,
            to: self.app_version.clone(),
            applied: report.versions(),
        })
    }

    async fn install_locked(&self, lease: &LockGuard) -> Result<InstallReport> {
        let stored = self.stored_version().await?;

        let migrated = match &stored {
            Some(version) if version < &self.app_version => self.migrate(version, lease).await?,
            _ => RunReport::default(),
        };

        lease.renew().await?;
        let mut created = Vec::new();
        for table in &self.tables {
            let existed = table.exists().await.map_err(|source| SchemaError::InstallFailed {
                table: table.physical_name().to_string(),
                source: Box::new(source),
            })?;
            table
                .create()
                .await
                .map_err(|source| SchemaError::InstallFailed {
                    table: table.physical_name().to_string(),
                    source: Box::new(source),
                })?;
            if !existed {
                created.push(table.physical_name().to_string());
            }
        }

        let version = match &stored {
            Some(version) => self.advance_version(version, lease).await?,
            None => {
                lease.renew().await?;
                self.write_version(&self.app_version).await?;
                self.app_version.clone()
            }
        };
        self.ready.store(true, Ordering::SeqCst);
        info!(version = %version, created = created.len(), "Schema installed");

        Ok(InstallReport {
            migrated,
            created,
            version,
        })
    }

    async fn migrate(&self, from: &SchemaVersion, lease: &LockGuard) -> Result<RunReport> {
        let units = discover(self.migrations, &self.config.table_names())?;
        let alterer = SchemaAlterer::new(self.pool.clone(), SqliteDialect::new());
        let audit = self.audit_log();
        MigrationRunner::new(&alterer, &audit)
            .with_lease(lease)
            .run(&units, from, &self.app_version)
            .await
    }

    /// Writes the app version unless the stored one is already newer.
    ///
    /// The lease is checked first so a worker that lost the lock never
    /// records a version it did not finish.
    async fn advance_version(
        &self,
        stored: &SchemaVersion,
        lease: &LockGuard,
    ) -> Result<SchemaVersion> {
        if stored == &self.app_version {
            return Ok(stored.clone());
        }
        if stored > &self.app_version {
            warn!(
                stored = %stored,
                app_version = %self.app_version,
                "Stored schema version is newer than the application, leaving it"
            );
            return Ok(stored.clone());
        }
        lease.renew().await?;
        self.write_version(&self.app_version).await?;
        Ok(self.app_version.clone())
    }

    async fn write_version(&self, version: &SchemaVersion) -> Result<()> {
        self.options
            .set(&self.config.version_option, &version.to_string())
            .await
    }

    async fn stored_version(&self) -> Result<Option<SchemaVersion>> {
        self.options
            .get(&self.config.version_option)
            .await?
            .map(|text| SchemaVersion::parse(&text))
            .transpose()
    }

    async fn ensure_bookkeeping(&self) -> Result<()> {
        self.options.ensure_table().await?;
        self.lock().ensure_table().await
    }

    /// Releases the lock whatever the outcome, keeping the first error.
    async fn finish<T>(guard: LockGuard, outcome: Result<T>) -> Result<T> {
        let released = guard.release().await;
        let value = outcome?;
        released?;
        Ok(value)
    }
}

impl std::fmt::Debug for SchemaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaManager")
            .field("app_version", &self.app_version)
            .field("tables", &self.tables)
            .field("migrations", &self.migrations.len())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}
