//! Migration operations.
//!
//! This module defines the structural changes a migration unit can express.
//! Every operation is guarded by an existence check against the live store,
//! so running it a second time changes nothing.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSchema, IndexSchema, TableSchema};

/// A single structural change scoped to one physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaOperation {
    /// Create a table (with its indexes) if it does not exist.
    CreateTable {
        /// Full table definition, named by its physical name.
        table: TableSchema,
    },

    /// Add a column if it is absent.
    AddColumn {
        /// Physical table name.
        table: String,
        /// Column definition.
        column: ColumnSchema,
    },

    /// Redefine a column if it is present.
    ModifyColumn {
        /// Physical table name.
        table: String,
        /// New column definition; `column.name` selects the column.
        column: ColumnSchema,
    },

    /// Drop a column if it is present.
    DropColumn {
        /// Physical table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Add an index if no index with its physical name exists.
    AddIndex {
        /// Physical table name.
        table: String,
        /// Index definition (declared name).
        index: IndexSchema,
    },

    /// Drop an index if it exists.
    DropIndex {
        /// Physical table name.
        table: String,
        /// Declared index name.
        index_name: String,
    },
}

impl SchemaOperation {
    /// Creates a CreateTable operation.
    #[must_use]
    pub fn create_table(table: TableSchema) -> Self {
        Self::CreateTable { table }
    }

    /// Creates an AddColumn operation.
    #[must_use]
    pub fn add_column(table: impl Into<String>, column: ColumnSchema) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Creates a ModifyColumn operation.
    #[must_use]
    pub fn modify_column(table: impl Into<String>, column: ColumnSchema) -> Self {
        Self::ModifyColumn {
            table: table.into(),
            column,
        }
    }

    /// Creates a DropColumn operation.
    #[must_use]
    pub fn drop_column(table: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self::DropColumn {
            table: table.into(),
            column_name: column_name.into(),
        }
    }

    /// Creates an AddIndex operation.
    #[must_use]
    pub fn add_index(table: impl Into<String>, index: IndexSchema) -> Self {
        Self::AddIndex {
            table: table.into(),
            index,
        }
    }

    /// Creates a DropIndex operation.
    #[must_use]
    pub fn drop_index(table: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self::DropIndex {
            table: table.into(),
            index_name: index_name.into(),
        }
    }

    /// Returns the physical table this operation targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table } => &table.name,
            Self::AddColumn { table, .. }
            | Self::ModifyColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AddIndex { table, .. }
            | Self::DropIndex { table, .. } => table,
        }
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table } => format!("Create table '{}'", table.name),
            Self::AddColumn { table, column } => {
                format!("Add column '{}' to table '{table}'", column.name)
            }
            Self::ModifyColumn { table, column } => {
                format!("Modify column '{}' in table '{table}'", column.name)
            }
            Self::DropColumn { table, column_name } => {
                format!("Drop column '{column_name}' from table '{table}'")
            }
            Self::AddIndex { table, index } => {
                format!("Add index '{}' on table '{table}'", index.name)
            }
            Self::DropIndex { table, index_name } => {
                format!("Drop index '{index_name}' from table '{table}'")
            }
        }
    }
}

/// What an operation did when it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The store was changed.
    Applied,
    /// The store was already in the desired state.
    NotApplied,
}

impl OperationOutcome {
    /// Returns true if the store was changed.
    #[must_use]
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}
