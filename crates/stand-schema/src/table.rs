//! Managed tables.
//!
//! A host describes each table with a [`TableDefinition`]. Registering it
//! yields a [`Table`]: the definition bound to a pool and a physical name,
//! with a `create()` that lands on the current shape and a small set of
//! parameterized CRUD helpers.

use std::fmt;

use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

use crate::alter::SchemaAlterer;
use crate::dialect::{MigrationDialect, SqliteDialect};
use crate::error::{Result, SchemaError};
use crate::operations::OperationOutcome;
use crate::schema::{ColumnSchema, IndexSchema, TableSchema};
use crate::value::{bound_query, decode_row, Record, SqlValue, ToSqlValue};
use crate::version::SchemaVersion;

/// Describes one managed table at its current version.
pub trait TableDefinition: Send + Sync {
    /// Name without prefix. Unique within a manager.
    fn logical_name(&self) -> &'static str;

    /// Primary key column.
    fn primary_key(&self) -> &'static str {
        "id"
    }

    /// Version the current definition corresponds to.
    fn schema_version(&self) -> &'static str;

    /// Columns in order.
    fn columns(&self) -> Vec<ColumnSchema>;

    /// Indexes, by declared name.
    fn indexes(&self) -> Vec<IndexSchema> {
        Vec::new()
    }

    /// Cleans a record before it is written. Must be idempotent.
    fn sanitize(&self, record: Record) -> Result<Record> {
        Ok(record)
    }

    /// Builds the full schema under the given physical name.
    fn schema(&self, physical_name: &str) -> TableSchema {
        TableSchema::new(physical_name)
            .columns(self.columns())
            .indexes(self.indexes())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (ASC)
    Asc,
    /// Descending order (DESC)
    Desc,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to order by
    pub column: String,
    /// Order direction
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Ascending on `column`.
    #[must_use]
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Asc,
        }
    }

    /// Descending on `column`.
    #[must_use]
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Desc,
        }
    }
}

/// Arguments for [`Table::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// Maximum rows returned.
    pub limit: u32,
    /// Rows skipped.
    pub offset: u32,
    /// Ordering; the primary key descending when unset.
    pub order_by: Option<OrderBy>,
    /// Equality filters, AND-combined.
    pub filters: Record,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            order_by: None,
            filters: Record::new(),
        }
    }
}

impl ListQuery {
    /// Creates a query with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the row limit.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.filters.insert(column.into(), value.to_sql_value());
        self
    }
}

/// What [`Table::create`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The table did not exist and was created.
    Created,
    /// The table existed; missing columns and indexes were added.
    Reconciled {
        /// Columns added.
        added_columns: Vec<String>,
        /// Indexes added, by declared name.
        added_indexes: Vec<String>,
    },
}

/// A registered table.
pub struct Table {
    definition: Box<dyn TableDefinition>,
    physical_name: String,
    version: SchemaVersion,
    schema: TableSchema,
    pool: SqlitePool,
    alterer: SchemaAlterer<SqliteDialect>,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("physical_name", &self.physical_name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Table {
    /// Binds a definition to a pool under `prefix`.
    pub fn new(
        pool: SqlitePool,
        prefix: &str,
        definition: impl TableDefinition + 'static,
    ) -> Result<Self> {
        Self::from_boxed(pool, prefix, Box::new(definition))
    }

    /// Binds a boxed definition to a pool under `prefix`.
    pub fn from_boxed(
        pool: SqlitePool,
        prefix: &str,
        definition: Box<dyn TableDefinition>,
    ) -> Result<Self> {
        let physical_name = format!("{prefix}{}", definition.logical_name());
        let version = SchemaVersion::parse(definition.schema_version())?;
        let schema = definition.schema(&physical_name);
        let alterer = SchemaAlterer::new(pool.clone(), SqliteDialect::new());
        Ok(Self {
            definition,
            physical_name,
            version,
            schema,
            pool,
            alterer,
        })
    }

    /// Name without prefix.
    #[must_use]
    pub fn logical_name(&self) -> &'static str {
        self.definition.logical_name()
    }

    /// Name in the store.
    #[must_use]
    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }

    /// Primary key column.
    #[must_use]
    pub fn primary_key(&self) -> &'static str {
        self.definition.primary_key()
    }

    /// Version of the current definition.
    #[must_use]
    pub fn schema_version(&self) -> &SchemaVersion {
        &self.version
    }

    /// The current schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Cleans a record with the definition's rules.
    pub fn sanitize(&self, record: Record) -> Result<Record> {
        self.definition.sanitize(record)
    }

    /// Creates the table at its current shape, or adds what is missing.
    ///
    /// Existing columns are never dropped or retyped.
    pub async fn create(&self) -> Result<CreateOutcome> {
        if self.alterer.create_table(&self.schema).await? == OperationOutcome::Applied {
            info!(table = %self.physical_name, version = %self.version, "Created table");
            return Ok(CreateOutcome::Created);
        }

        let mut added_columns = Vec::new();
        for column in &self.schema.columns {
            if self
                .alterer
                .add_column(&self.physical_name, column)
                .await?
                .is_applied()
            {
                added_columns.push(column.name.clone());
            }
        }

        let mut added_indexes = Vec::new();
        for index in &self.schema.indexes {
            if self
                .alterer
                .add_index(&self.physical_name, index)
                .await?
                .is_applied()
            {
                added_indexes.push(index.name.clone());
            }
        }

        if !added_columns.is_empty() || !added_indexes.is_empty() {
            info!(
                table = %self.physical_name,
                columns = ?added_columns,
                indexes = ?added_indexes,
                "Reconciled table"
            );
        }
        Ok(CreateOutcome::Reconciled {
            added_columns,
            added_indexes,
        })
    }

    /// Returns true if the table exists in the store.
    pub async fn exists(&self) -> Result<bool> {
        self.alterer
            .introspector()
            .table_exists(&self.physical_name)
            .await
    }

    /// Fetches one row by primary key.
    pub async fn get(&self, id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            self.quoted_table(),
            self.quote(self.primary_key())
        );
        self.query_one(&sql, vec![SqlValue::Int(id)]).await
    }

    /// Lists rows.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<Record>> {
        let (where_sql, mut params) = self.where_clause(&query.filters)?;
        let order = query
            .order_by
            .clone()
            .unwrap_or_else(|| OrderBy::desc(self.primary_key()));
        self.check_field(&order.column)?;

        let direction = match order.direction {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        let sql = format!(
            "SELECT * FROM {}{where_sql} ORDER BY {} {direction} LIMIT ? OFFSET ?",
            self.quoted_table(),
            self.quote(&order.column)
        );
        params.push(SqlValue::Int(i64::from(query.limit)));
        params.push(SqlValue::Int(i64::from(query.offset)));
        self.query(&sql, params).await
    }

    /// Counts rows matching the filters.
    pub async fn count(&self, filters: &Record) -> Result<i64> {
        let (where_sql, params) = self.where_clause(filters)?;
        let sql = format!("SELECT COUNT(*) AS n FROM {}{where_sql}", self.quoted_table());
        let row = self.query_one(&sql, params).await?;
        Ok(row
            .and_then(|r| r.get("n").and_then(SqlValue::as_i64))
            .unwrap_or(0))
    }

    /// Sanitizes and inserts a record, returning the new row id.
    pub async fn insert(&self, record: Record) -> Result<i64> {
        let record = self.sanitize(record)?;
        for column in record.keys() {
            self.check_field(column)?;
        }

        let sql = if record.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.quoted_table())
        } else {
            let columns: Vec<String> = record.keys().map(|c| self.quote(c)).collect();
            let placeholders = vec!["?"; record.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                self.quoted_table(),
                columns.join(", ")
            )
        };

        debug!(sql = %sql, "Executing SQL");
        let result = bound_query(&sql, record.into_values().collect())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Sanitizes `data` and applies it to the rows matching `filters`.
    pub async fn update(&self, data: Record, filters: &Record) -> Result<u64> {
        if filters.is_empty() {
            return Err(SchemaError::Validation(format!(
                "refusing to update every row of '{}'",
                self.physical_name
            )));
        }
        let data = self.sanitize(data)?;
        if data.is_empty() {
            return Ok(0);
        }

        let mut assignments = Vec::with_capacity(data.len());
        for column in data.keys() {
            self.check_field(column)?;
            assignments.push(format!("{} = ?", self.quote(column)));
        }
        let (where_sql, filter_params) = self.where_clause(filters)?;

        let sql = format!(
            "UPDATE {} SET {}{where_sql}",
            self.quoted_table(),
            assignments.join(", ")
        );
        let mut params: Vec<SqlValue> = data.into_values().collect();
        params.extend(filter_params);
        self.execute(&sql, params).await
    }

    /// Deletes the rows matching `filters`.
    pub async fn delete(&self, filters: &Record) -> Result<u64> {
        if filters.is_empty() {
            return Err(SchemaError::Validation(format!(
                "refusing to delete every row of '{}'",
                self.physical_name
            )));
        }
        let (where_sql, params) = self.where_clause(filters)?;
        let sql = format!("DELETE FROM {}{where_sql}", self.quoted_table());
        self.execute(&sql, params).await
    }

    /// Runs a parameterized SELECT and decodes every row.
    pub async fn query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Record>> {
        debug!(sql = %sql, "Executing SQL");
        let rows = bound_query(sql, params).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| decode_row(row).map_err(SchemaError::from))
            .collect()
    }

    /// Runs a parameterized SELECT and decodes the first row.
    pub async fn query_one(&self, sql: &str, params: Vec<SqlValue>) -> Result<Option<Record>> {
        debug!(sql = %sql, "Executing SQL");
        let row = bound_query(sql, params).fetch_optional(&self.pool).await?;
        row.as_ref()
            .map(decode_row)
            .transpose()
            .map_err(SchemaError::from)
    }

    /// Runs a parameterized statement, returning the affected row count.
    pub async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let result = bound_query(sql, params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Quotes an identifier for use in hand-written queries.
    #[must_use]
    pub fn quote(&self, identifier: &str) -> String {
        self.alterer.dialect().quote_identifier(identifier)
    }

    /// The quoted physical name.
    #[must_use]
    pub fn quoted_table(&self) -> String {
        self.quote(&self.physical_name)
    }

    /// Fails unless `column` is declared on this table.
    pub fn check_field(&self, column: &str) -> Result<()> {
        if self.schema.has_column(column) {
            Ok(())
        } else {
            Err(SchemaError::InvalidField {
                table: self.physical_name.clone(),
                field: column.to_string(),
            })
        }
    }

    fn where_clause(&self, filters: &Record) -> Result<(String, Vec<SqlValue>)> {
        if filters.is_empty() {
            return Ok((String::new(), Vec::new()));
        }
        let mut conditions = Vec::with_capacity(filters.len());
        let mut params = Vec::with_capacity(filters.len());
        for (column, value) in filters {
            self.check_field(column)?;
            if value.is_null() {
                conditions.push(format!("{} IS NULL", self.quote(column)));
            } else {
                conditions.push(format!("{} = ?", self.quote(column)));
                params.push(value.clone());
            }
        }
        Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
    }
}
