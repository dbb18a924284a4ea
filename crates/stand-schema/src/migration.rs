//! Migration units and their static registration.
//!
//! A migration is a zero-sized type implementing [`Migration`]. Hosts list
//! them in a `&'static [MigrationEntry]`, built at compile time with
//! [`MigrationEntry::of`]:
//!
//! ```ignore
//! pub static MIGRATIONS: &[MigrationEntry] = &[
//!     MigrationEntry::of::<V1_0_1>(),
//!     MigrationEntry::of::<V1_1_0>(),
//! ];
//! ```

use crate::operations::SchemaOperation;
use crate::version::SchemaVersion;

/// Resolves logical table names to physical ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    prefix: String,
}

impl TableNames {
    /// Creates a resolver for the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the table prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the physical name of a logical table.
    #[must_use]
    pub fn physical(&self, logical: &str) -> String {
        format!("{}{logical}", self.prefix)
    }
}

/// A versioned schema change.
pub trait Migration {
    /// Target version, as text. Parsed during discovery.
    const VERSION: &'static str;

    /// Human-readable name.
    const NAME: &'static str;

    /// The ordered operations of this unit.
    fn operations(names: &TableNames) -> Vec<SchemaOperation>;
}

/// A registered migration, before its version has been parsed.
#[derive(Debug, Clone, Copy)]
pub struct MigrationEntry {
    /// Target version text.
    pub version: &'static str,
    /// Migration name.
    pub name: &'static str,
    build: fn(&TableNames) -> Vec<SchemaOperation>,
}

impl MigrationEntry {
    /// Registers a [`Migration`] implementation.
    #[must_use]
    pub const fn of<M: Migration>() -> Self {
        Self {
            version: M::VERSION,
            name: M::NAME,
            build: M::operations,
        }
    }

    /// Creates an entry from parts.
    #[must_use]
    pub const fn new(
        version: &'static str,
        name: &'static str,
        build: fn(&TableNames) -> Vec<SchemaOperation>,
    ) -> Self {
        Self {
            version,
            name,
            build,
        }
    }

    /// Builds the operations against physical table names.
    #[must_use]
    pub fn operations(&self, names: &TableNames) -> Vec<SchemaOperation> {
        (self.build)(names)
    }
}

/// A discovered migration with a parsed version.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationUnit {
    /// Target version.
    pub target_version: SchemaVersion,
    /// Migration name.
    pub name: String,
    /// Operations in order.
    pub operations: Vec<SchemaOperation>,
}

impl MigrationUnit {
    /// Creates a new unit.
    #[must_use]
    pub fn new(target_version: SchemaVersion, name: impl Into<String>) -> Self {
        Self {
            target_version,
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Adds an operation to this unit.
    #[must_use]
    pub fn operation(mut self, op: SchemaOperation) -> Self {
        self.operations.push(op);
        self
    }

    /// Adds operations to this unit.
    #[must_use]
    pub fn operations(mut self, ops: Vec<SchemaOperation>) -> Self {
        self.operations.extend(ops);
        self
    }
}
