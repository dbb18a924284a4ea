//! Declared table shapes.
//!
//! A [`TableSchema`] is what a table definition says the store should look
//! like. Migration operations carry the same pieces ([`ColumnSchema`],
//! [`IndexSchema`]) for the parts they add or change, and the dialect turns
//! them into DDL.

use serde::{Deserialize, Serialize};

/// Logical column types. The dialect maps each to a storage type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Integer,
    BigInt,
    Boolean,
    Text,
    /// Length is advisory in SQLite.
    Varchar(usize),
    /// Stored as `YYYY-MM-DD HH:MM:SS` text.
    DateTime,
    Double,
    /// Precision and scale.
    Decimal(u8, u8),
}

/// Value a column takes when an insert leaves it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnDefault {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    /// Time of the insert, filled in by the store.
    CurrentTimestamp,
}

impl ColumnDefault {
    /// The literal that follows `DEFAULT` in a column definition.
    #[must_use]
    pub fn sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub default: Option<ColumnDefault>,
    pub primary_key: bool,
    /// Only meaningful on a single-column integer key.
    pub auto_increment: bool,
    pub unique: bool,
}

impl ColumnSchema {
    /// A nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            default: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
        }
    }

    #[must_use]
    pub fn not_null(self) -> Self {
        Self {
            not_null: true,
            ..self
        }
    }

    #[must_use]
    pub fn default(self, value: ColumnDefault) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }

    /// Marks the column as (part of) the primary key. Key columns never
    /// hold NULL.
    #[must_use]
    pub fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            not_null: true,
            ..self
        }
    }

    #[must_use]
    pub fn auto_increment(self) -> Self {
        Self {
            auto_increment: true,
            ..self
        }
    }

    #[must_use]
    pub fn unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }
}

/// An explicit index. `name` is the declared name; the store sees
/// [`IndexSchema::physical_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique: false,
        }
    }

    #[must_use]
    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            unique: true,
            ..Self::new(name, columns)
        }
    }

    /// Name of the index in the store.
    #[must_use]
    pub fn physical_name(&self, table: &str) -> String {
        physical_index_name(table, &self.name)
    }
}

/// Index names share one namespace per store, so they carry the table name.
#[must_use]
pub fn physical_index_name(table: &str, index: &str) -> String {
    format!("{table}_{index}")
}

/// Columns and indexes of one table, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: Vec<ColumnSchema>) -> Self {
        self.columns.extend(columns);
        self
    }

    #[must_use]
    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub fn indexes(mut self, indexes: Vec<IndexSchema>) -> Self {
        self.indexes.extend(indexes);
        self
    }

    /// Names of the key columns. More than one means a composite key.
    #[must_use]
    pub fn key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }
}
