//! DDL text generation.
//!
//! A dialect turns declared shapes into statements. Only identifiers are
//! interpolated, always quoted; row values go through bind parameters
//! elsewhere.

mod sqlite;

pub use sqlite::SqliteDialect;

use crate::introspect::LiveColumn;
use crate::schema::{ColumnSchema, IndexSchema, SqlType, TableSchema};

/// Spells structural statements for one storage engine.
pub trait MigrationDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Storage type for a logical type.
    fn type_name(&self, sql_type: &SqlType) -> &'static str;

    /// Keyword placed after an inline `PRIMARY KEY` for generated ids.
    fn auto_increment_keyword(&self) -> &'static str;

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Definition of a column that is alone in its key, or not a key.
    fn column_definition(&self, column: &ColumnSchema) -> String {
        self.render_column(column, column.primary_key)
    }

    /// `inline_key` puts `PRIMARY KEY` on the column itself. Members of a
    /// composite key pass false and get a table constraint instead.
    fn render_column(&self, column: &ColumnSchema, inline_key: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type)
        );
        if inline_key {
            sql.push_str(" PRIMARY KEY");
            if column.auto_increment {
                sql.push(' ');
                sql.push_str(self.auto_increment_keyword());
            }
        } else {
            if column.not_null {
                sql.push_str(" NOT NULL");
            }
            if column.unique {
                sql.push_str(" UNIQUE");
            }
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.sql());
        }
        sql
    }

    /// Definition of a column as the store reports it. Used when a table is
    /// rebuilt, so columns that are not being changed keep their shape.
    fn live_column_definition(&self, column: &LiveColumn, single_primary_key: bool) -> String;

    /// `CREATE TABLE name (body...)` where body holds column definitions
    /// followed by table constraints.
    fn assemble_create_table(&self, name: &str, body: &[String]) -> String {
        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(name),
            body.join(",\n  ")
        )
    }

    /// Table statement only; indexes are created separately.
    fn create_table_sql(&self, table: &TableSchema) -> String {
        let key = table.key_columns();
        let composite = key.len() > 1;

        let mut body: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.render_column(c, c.primary_key && !composite))
            .collect();
        if composite {
            body.push(format!("PRIMARY KEY ({})", self.quote_list(&key)));
        }
        self.assemble_create_table(&table.name, &body)
    }

    fn create_index_sql(&self, table: &str, index: &IndexSchema) -> String {
        let columns: Vec<&str> = index.columns.iter().map(String::as_str).collect();
        let kind = if index.unique { "UNIQUE INDEX" } else { "INDEX" };
        format!(
            "CREATE {kind} {} ON {} ({})",
            self.quote_identifier(&index.physical_name(table)),
            self.quote_identifier(table),
            self.quote_list(&columns)
        )
    }

    fn add_column_sql(&self, table: &str, column: &ColumnSchema) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Takes the physical index name.
    fn drop_index_sql(&self, index: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(index))
    }

    fn rename_table_sql(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// Copies the listed columns of every row from `from` into `to`.
    fn copy_rows_sql(&self, from: &str, to: &str, columns: &[&str]) -> String {
        let list = self.quote_list(columns);
        format!(
            "INSERT INTO {} ({list}) SELECT {list} FROM {}",
            self.quote_identifier(to),
            self.quote_identifier(from)
        )
    }

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Quoted, comma separated.
    fn quote_list(&self, names: &[&str]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
