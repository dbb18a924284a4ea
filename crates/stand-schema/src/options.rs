//! Key/value option store.
//!
//! Holds the installed schema version and the audit log. Each write is a
//! single-row upsert, so the last writer wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::dialect::{MigrationDialect, SqliteDialect};
use crate::error::Result;

/// Options persisted in `<prefix>schema_options`.
#[derive(Debug, Clone)]
pub struct OptionStore {
    pool: SqlitePool,
    table: String,
}

impl OptionStore {
    /// Creates a store over the named table.
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Returns the physical table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Ensures the options table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  \
             name TEXT PRIMARY KEY NOT NULL,\n  \
             value TEXT NOT NULL\n)",
            self.quoted()
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Reads an option.
    pub async fn get(&self, name: &str) -> Result<Option<String>> {
        let sql = format!("SELECT value FROM {} WHERE name = ?", self.quoted());
        let value: Option<String> = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Reads an option, falling back to `default` when missing.
    pub async fn get_or(&self, name: &str, default: &str) -> Result<String> {
        Ok(self
            .get(name)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Writes an option, replacing any previous value.
    pub async fn set(&self, name: &str, value: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (name, value) VALUES (?, ?) \
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            self.quoted()
        );
        sqlx::query(&sql)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reads a JSON-encoded option.
    pub async fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name).await? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Writes a JSON-encoded option.
    pub async fn set_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.set(name, &text).await
    }

    fn quoted(&self) -> String {
        SqliteDialect::new().quote_identifier(&self.table)
    }
}
