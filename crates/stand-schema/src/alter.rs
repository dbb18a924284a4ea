//! Idempotent structural changes.
//!
//! [`SchemaAlterer`] applies one [`SchemaOperation`] at a time. Each
//! operation first checks the live store and reports
//! [`OperationOutcome::NotApplied`] when there is nothing to do.
//!
//! SQLite cannot alter a column in place. `ModifyColumn` therefore rebuilds
//! the table inside a single transaction:
//!
//! 1. create `<table>__rebuild` from the live columns, with the modified
//!    column replaced by its new definition
//! 2. copy every row
//! 3. drop the old table and rename the new one into place
//! 4. recreate the explicit indexes from their stored statements

use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::dialect::MigrationDialect;
use crate::error::Result;
use crate::introspect::Introspector;
use crate::operations::{OperationOutcome, SchemaOperation};
use crate::schema::{physical_index_name, ColumnSchema, IndexSchema, TableSchema};

/// Applies structural operations against a pool.
pub struct SchemaAlterer<D: MigrationDialect> {
    pool: SqlitePool,
    dialect: D,
    inspect: Introspector,
}

impl<D: MigrationDialect> SchemaAlterer<D> {
    /// Creates a new alterer.
    pub fn new(pool: SqlitePool, dialect: D) -> Self {
        let inspect = Introspector::new(&pool);
        Self {
            pool,
            dialect,
            inspect,
        }
    }

    /// Returns the introspector used for existence checks.
    #[must_use]
    pub fn introspector(&self) -> &Introspector {
        &self.inspect
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Applies one operation.
    pub async fn apply(&self, operation: &SchemaOperation) -> Result<OperationOutcome> {
        match operation {
            SchemaOperation::CreateTable { table } => self.create_table(table).await,
            SchemaOperation::AddColumn { table, column } => self.add_column(table, column).await,
            SchemaOperation::ModifyColumn { table, column } => {
                self.modify_column(table, column).await
            }
            SchemaOperation::DropColumn { table, column_name } => {
                self.drop_column(table, column_name).await
            }
            SchemaOperation::AddIndex { table, index } => self.add_index(table, index).await,
            SchemaOperation::DropIndex { table, index_name } => {
                self.drop_index(table, index_name).await
            }
        }
    }

    /// Creates a table and its indexes unless the table exists.
    pub async fn create_table(&self, table: &TableSchema) -> Result<OperationOutcome> {
        if self.inspect.table_exists(&table.name).await? {
            return Ok(OperationOutcome::NotApplied);
        }

        let mut statements = vec![self.dialect.create_table_sql(table)];
        statements.extend(
            table
                .indexes
                .iter()
                .map(|index| self.dialect.create_index_sql(&table.name, index)),
        );

        let mut tx = self.pool.begin().await?;
        for sql in &statements {
            debug!(sql = %sql, "Executing SQL");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(OperationOutcome::Applied)
    }

    /// Adds a column unless it is already present.
    pub async fn add_column(&self, table: &str, column: &ColumnSchema) -> Result<OperationOutcome> {
        if self.inspect.column_exists(table, &column.name).await? {
            return Ok(OperationOutcome::NotApplied);
        }
        self.execute(&self.dialect.add_column_sql(table, column))
            .await?;
        Ok(OperationOutcome::Applied)
    }

    /// Drops a column if it is present.
    pub async fn drop_column(&self, table: &str, column_name: &str) -> Result<OperationOutcome> {
        if !self.inspect.column_exists(table, column_name).await? {
            return Ok(OperationOutcome::NotApplied);
        }
        self.execute(&self.dialect.drop_column_sql(table, column_name))
            .await?;
        Ok(OperationOutcome::Applied)
    }

    /// Adds an index unless its physical name is taken.
    pub async fn add_index(&self, table: &str, index: &IndexSchema) -> Result<OperationOutcome> {
        if self.inspect.index_exists(&index.physical_name(table)).await? {
            return Ok(OperationOutcome::NotApplied);
        }
        self.execute(&self.dialect.create_index_sql(table, index))
            .await?;
        Ok(OperationOutcome::Applied)
    }

    /// Drops an index if it exists.
    pub async fn drop_index(&self, table: &str, index_name: &str) -> Result<OperationOutcome> {
        let physical = physical_index_name(table, index_name);
        if !self.inspect.index_exists(&physical).await? {
            return Ok(OperationOutcome::NotApplied);
        }
        self.execute(&self.dialect.drop_index_sql(&physical)).await?;
        Ok(OperationOutcome::Applied)
    }

    /// Redefines a column if it is present, rebuilding the table.
    pub async fn modify_column(
        &self,
        table: &str,
        column: &ColumnSchema,
    ) -> Result<OperationOutcome> {
        let live = self.inspect.columns(table).await?;
        let Some(current) = live.iter().find(|c| c.name == column.name) else {
            return Ok(OperationOutcome::NotApplied);
        };

        let key: Vec<&str> = live
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect();
        let single_key = key.len() == 1;

        // A single-column UNIQUE shows up as a constraint, not on the column
        let (unique_groups, own_unique): (Vec<_>, Vec<_>) = self
            .inspect
            .unique_constraints(table)
            .await?
            .into_iter()
            .partition(|group| !(group.len() == 1 && group[0] == column.name));
        let bare = ColumnSchema {
            unique: false,
            ..column.clone()
        };
        if self.dialect.live_column_definition(current, single_key)
            == self.dialect.column_definition(&bare)
            && column.unique == !own_unique.is_empty()
        {
            return Ok(OperationOutcome::NotApplied);
        }

        let index_statements = self.inspect.index_statements(table).await?;

        let mut body: Vec<String> = live
            .iter()
            .map(|c| {
                if c.name == column.name {
                    self.dialect.column_definition(column)
                } else {
                    self.dialect.live_column_definition(c, single_key)
                }
            })
            .collect();
        if !single_key && !key.is_empty() {
            body.push(format!("PRIMARY KEY ({})", self.dialect.quote_list(&key)));
        }
        for group in &unique_groups {
            let names: Vec<&str> = group.iter().map(String::as_str).collect();
            body.push(format!("UNIQUE ({})", self.dialect.quote_list(&names)));
        }

        let rebuild = format!("{table}__rebuild");
        let names: Vec<&str> = live.iter().map(|c| c.name.as_str()).collect();

        let mut statements = vec![
            self.dialect.assemble_create_table(&rebuild, &body),
            self.dialect.copy_rows_sql(table, &rebuild, &names),
            self.dialect.drop_table_sql(table),
            self.dialect.rename_table_sql(&rebuild, table),
        ];
        statements.extend(index_statements);

        let mut tx = self.pool.begin().await?;
        for sql in &statements {
            debug!(sql = %sql, "Executing SQL");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(OperationOutcome::Applied)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql = %sql, "Executing SQL");
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }
}
