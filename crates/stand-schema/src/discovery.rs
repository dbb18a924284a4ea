//! Migration discovery and ordering.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Result, SchemaError};
use crate::migration::{MigrationEntry, MigrationUnit, TableNames};
use crate::version::SchemaVersion;

/// Turns registered entries into units sorted by ascending target version.
///
/// Entries whose version does not parse are skipped with a warning. Two
/// entries with the same target version abort discovery with
/// [`SchemaError::DuplicateMigrationVersion`].
pub fn discover(entries: &[MigrationEntry], names: &TableNames) -> Result<Vec<MigrationUnit>> {
    let mut found: BTreeMap<SchemaVersion, &MigrationEntry> = BTreeMap::new();

    for entry in entries {
        let version = match SchemaVersion::parse(entry.version) {
            Ok(version) => version,
            Err(err) => {
                let skipped = SchemaError::MalformedMigrationVersion {
                    name: entry.name.to_string(),
                    version: entry.version.to_string(),
                    reason: err.to_string(),
                };
                warn!(error = %skipped, "Skipping migration");
                continue;
            }
        };

        if let Some(first) = found.get(&version) {
            return Err(SchemaError::DuplicateMigrationVersion {
                version: version.to_string(),
                first: first.name.to_string(),
                second: entry.name.to_string(),
            });
        }
        found.insert(version, entry);
    }

    let units: Vec<MigrationUnit> = found
        .into_iter()
        .map(|(version, entry)| {
            MigrationUnit::new(version, entry.name).operations(entry.operations(names))
        })
        .collect();

    debug!(count = units.len(), "Discovered migrations");
    Ok(units)
}
