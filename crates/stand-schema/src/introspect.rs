//! Live schema introspection.
//!
//! Every structural operation decides whether it has work to do by asking
//! the store, never by trusting the recorded version. Table and index names
//! are bound as parameters to the catalog queries.

use sqlx::sqlite::SqlitePool;

use crate::error::Result;

/// A column as the store currently has it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    /// Column name.
    pub name: String,
    /// Declared type text (may be empty).
    pub declared_type: String,
    /// NOT NULL constraint.
    pub not_null: bool,
    /// Default expression text, as stored.
    pub default: Option<String>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Primary key declared AUTOINCREMENT.
    pub auto_increment: bool,
}

/// An explicitly created index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveIndex {
    /// Physical index name.
    pub name: String,
    /// UNIQUE index.
    pub unique: bool,
    /// Indexed columns in order.
    pub columns: Vec<String>,
}

/// Comparable structure of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    /// Columns in declaration order.
    pub columns: Vec<LiveColumn>,
    /// Explicit indexes, sorted by name.
    pub indexes: Vec<LiveIndex>,
    /// Column groups covered by UNIQUE constraints, sorted.
    pub unique_constraints: Vec<Vec<String>>,
}

impl TableSnapshot {
    /// Returns the column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Reads structure from the SQLite catalog.
#[derive(Debug, Clone)]
pub struct Introspector {
    pool: SqlitePool,
}

impl Introspector {
    /// Creates an introspector over a pool.
    #[must_use]
    pub fn new(pool: &SqlitePool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Returns true if the table exists.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Returns true if the column exists on the table.
    pub async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
                .bind(table)
                .bind(column)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// Returns true if an index with this physical name exists.
    pub async fn index_exists(&self, physical_name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?",
        )
        .bind(physical_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Returns the stored CREATE TABLE statement.
    pub async fn table_sql(&self, table: &str) -> Result<Option<String>> {
        let sql: Option<String> = sqlx::query_scalar(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sql)
    }

    /// Returns the table's columns in declaration order.
    pub async fn columns(&self, table: &str) -> Result<Vec<LiveColumn>> {
        let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
            "SELECT \"name\", \"type\", \"notnull\", \"dflt_value\", \"pk\" \
             FROM pragma_table_info(?) ORDER BY \"cid\"",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let auto_increment = self
            .table_sql(table)
            .await?
            .is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));

        Ok(rows
            .into_iter()
            .map(|(name, declared_type, not_null, default, pk)| LiveColumn {
                name,
                declared_type,
                not_null: not_null != 0,
                default,
                primary_key: pk > 0,
                auto_increment: pk > 0 && auto_increment,
            })
            .collect())
    }

    /// Returns the stored CREATE INDEX statements for explicit indexes.
    pub async fn index_statements(&self, table: &str) -> Result<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT sql FROM sqlite_master \
             WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL ORDER BY name",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Returns the table's explicitly created indexes, sorted by name.
    pub async fn indexes(&self, table: &str) -> Result<Vec<LiveIndex>> {
        let mut indexes = Vec::new();
        for (name, unique, origin) in self.index_list(table).await? {
            if origin != "c" {
                continue;
            }
            let columns = self.index_columns(&name).await?;
            indexes.push(LiveIndex {
                name,
                unique,
                columns,
            });
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    /// Returns the column groups covered by UNIQUE constraints.
    pub async fn unique_constraints(&self, table: &str) -> Result<Vec<Vec<String>>> {
        let mut groups = Vec::new();
        for (name, _, origin) in self.index_list(table).await? {
            if origin == "u" {
                groups.push(self.index_columns(&name).await?);
            }
        }
        groups.sort();
        Ok(groups)
    }

    /// Captures a comparable snapshot of the table.
    pub async fn snapshot(&self, table: &str) -> Result<TableSnapshot> {
        Ok(TableSnapshot {
            columns: self.columns(table).await?,
            indexes: self.indexes(table).await?,
            unique_constraints: self.unique_constraints(table).await?,
        })
    }

    async fn index_list(&self, table: &str) -> Result<Vec<(String, bool, String)>> {
        let rows: Vec<(String, i64, String)> = sqlx::query_as(
            "SELECT \"name\", \"unique\", \"origin\" FROM pragma_index_list(?) ORDER BY \"name\"",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(name, unique, origin)| (name, unique != 0, origin))
            .collect())
    }

    async fn index_columns(&self, index: &str) -> Result<Vec<String>> {
        let columns: Vec<String> = sqlx::query_scalar(
            "SELECT \"name\" FROM pragma_index_info(?) ORDER BY \"seqno\"",
        )
        .bind(index)
        .fetch_all(&self.pool)
        .await?;
        Ok(columns)
    }
}
