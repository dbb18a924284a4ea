//! Migration runner.
//!
//! Applies the units whose target version lies in `(from, to]`, in
//! ascending order, recording each finished unit in the audit log. Audit
//! writes never decide the outcome of a run.
//!
//! When run under a migration lock the lease is renewed before every unit,
//! and a lost lease stops the run before the next unit touches the store.

use tracing::{debug, error, info, warn};

use crate::alter::SchemaAlterer;
use crate::audit::AuditLog;
use crate::dialect::MigrationDialect;
use crate::error::{Result, SchemaError};
use crate::lock::LockGuard;
use crate::migration::MigrationUnit;
use crate::version::SchemaVersion;

/// What one unit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUnit {
    /// Target version of the unit.
    pub version: SchemaVersion,
    /// Unit name.
    pub name: String,
    /// Operations that changed the store.
    pub applied_ops: usize,
    /// Operations that found nothing to do.
    pub skipped_ops: usize,
}

/// Result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Units applied, in order.
    pub applied: Vec<AppliedUnit>,
}

impl RunReport {
    /// Returns the target versions of the applied units.
    #[must_use]
    pub fn versions(&self) -> Vec<SchemaVersion> {
        self.applied.iter().map(|u| u.version.clone()).collect()
    }

    /// Returns true if no unit was in range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Runs migration units against the store.
pub struct MigrationRunner<'a, D: MigrationDialect> {
    alterer: &'a SchemaAlterer<D>,
    audit: &'a AuditLog,
    lease: Option<&'a LockGuard>,
}

impl<'a, D: MigrationDialect> MigrationRunner<'a, D> {
    /// Creates a runner.
    pub fn new(alterer: &'a SchemaAlterer<D>, audit: &'a AuditLog) -> Self {
        Self {
            alterer,
            audit,
            lease: None,
        }
    }

    /// Renews `lease` before each unit.
    #[must_use]
    pub fn with_lease(mut self, lease: &'a LockGuard) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Returns the units with `from < target_version <= to`, ascending.
    #[must_use]
    pub fn select<'u>(
        units: &'u [MigrationUnit],
        from: &SchemaVersion,
        to: &SchemaVersion,
    ) -> Vec<&'u MigrationUnit> {
        let mut selected: Vec<&MigrationUnit> = units
            .iter()
            .filter(|u| u.target_version.in_range(from, to))
            .collect();
        selected.sort_by(|a, b| a.target_version.cmp(&b.target_version));
        selected
    }

    /// Applies every unit in `(from, to]`.
    ///
    /// Stops at the first failing operation: a `failed` entry is appended for
    /// that unit and [`SchemaError::StructuralOperationFailed`] is returned.
    /// Units before it keep their `completed` entries. A lost lease ends the
    /// run with [`SchemaError::LockLost`].
    pub async fn run(
        &self,
        units: &[MigrationUnit],
        from: &SchemaVersion,
        to: &SchemaVersion,
    ) -> Result<RunReport> {
        let selected = Self::select(units, from, to);
        info!(from = %from, to = %to, pending = selected.len(), "Running migrations");

        let mut report = RunReport::default();
        for unit in selected {
            if let Some(lease) = self.lease {
                lease.renew().await?;
            }
            report.applied.push(self.run_unit(unit).await?);
        }
        Ok(report)
    }

    async fn run_unit(&self, unit: &MigrationUnit) -> Result<AppliedUnit> {
        info!(version = %unit.target_version, name = %unit.name, "Applying migration");

        let mut applied_ops = 0;
        let mut skipped_ops = 0;
        for operation in &unit.operations {
            match self.alterer.apply(operation).await {
                Ok(outcome) if outcome.is_applied() => applied_ops += 1,
                Ok(_) => {
                    debug!(operation = %operation.description(), "Already in place, skipping");
                    skipped_ops += 1;
                }
                Err(source) => {
                    error!(
                        version = %unit.target_version,
                        operation = %operation.description(),
                        error = %source,
                        "Migration failed"
                    );
                    if let Err(e) = self
                        .audit
                        .record_failed(&unit.target_version, source.to_string())
                        .await
                    {
                        warn!(version = %unit.target_version, error = %e, "Could not record failed migration");
                    }
                    return Err(SchemaError::StructuralOperationFailed {
                        version: unit.target_version.to_string(),
                        operation: operation.description(),
                        source: Box::new(source),
                    });
                }
            }
        }

        // The unit's changes are in place whether or not the log accepts them
        if let Err(e) = self.audit.record_completed(&unit.target_version).await {
            warn!(version = %unit.target_version, error = %e, "Could not record completed migration");
        }
        info!(
            version = %unit.target_version,
            applied = applied_ops,
            skipped = skipped_ops,
            "Migration applied successfully"
        );

        Ok(AppliedUnit {
            version: unit.target_version.clone(),
            name: unit.name.clone(),
            applied_ops,
            skipped_ops,
        })
    }
}
