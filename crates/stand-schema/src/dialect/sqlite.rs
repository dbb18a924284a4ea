//! SQLite spelling.
//!
//! SQLite keeps a small set of storage classes, so several logical types
//! share one declared type. Columns are never altered in place; see
//! [`crate::alter`] for the rebuild.

use crate::introspect::LiveColumn;
use crate::schema::SqlType;

use super::MigrationDialect;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, sql_type: &SqlType) -> &'static str {
        match sql_type {
            // Booleans are 0/1
            SqlType::Integer | SqlType::BigInt | SqlType::Boolean => "INTEGER",
            SqlType::Text | SqlType::Varchar(_) | SqlType::DateTime => "TEXT",
            SqlType::Double => "REAL",
            SqlType::Decimal(..) => "NUMERIC",
        }
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn live_column_definition(&self, column: &LiveColumn, single_primary_key: bool) -> String {
        let inline_key = column.primary_key && single_primary_key;
        let mut sql = self.quote_identifier(&column.name);
        if !column.declared_type.is_empty() {
            sql.push(' ');
            sql.push_str(&column.declared_type);
        }
        if inline_key {
            sql.push_str(" PRIMARY KEY");
            if column.auto_increment {
                sql.push_str(" AUTOINCREMENT");
            }
        } else if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefault, ColumnSchema, IndexSchema, TableSchema};

    fn events() -> TableSchema {
        TableSchema::new("ts_events")
            .column(
                ColumnSchema::new("id", SqlType::BigInt)
                    .primary_key()
                    .auto_increment(),
            )
            .column(ColumnSchema::new("slug", SqlType::Varchar(200)).not_null().unique())
            .column(ColumnSchema::new("name", SqlType::Varchar(255)).not_null())
            .column(
                ColumnSchema::new("created_at", SqlType::DateTime)
                    .default(ColumnDefault::CurrentTimestamp),
            )
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            SqliteDialect.create_table_sql(&events()),
            "CREATE TABLE \"ts_events\" (\n  \
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \
             \"slug\" TEXT NOT NULL UNIQUE,\n  \
             \"name\" TEXT NOT NULL,\n  \
             \"created_at\" TEXT DEFAULT CURRENT_TIMESTAMP\n)"
        );
    }

    #[test]
    fn test_composite_key_becomes_constraint() {
        let pairs = TableSchema::new("pairs")
            .column(ColumnSchema::new("a", SqlType::BigInt).primary_key())
            .column(ColumnSchema::new("b", SqlType::BigInt).primary_key());

        let sql = SqliteDialect.create_table_sql(&pairs);
        assert!(sql.contains("\"a\" INTEGER NOT NULL,"));
        assert!(sql.contains("\"b\" INTEGER NOT NULL,"));
        assert!(sql.ends_with("PRIMARY KEY (\"a\", \"b\")\n)"));
    }

    #[test]
    fn test_add_column_with_default() {
        let capacity = ColumnSchema::new("capacity", SqlType::Integer)
            .not_null()
            .default(ColumnDefault::Int(0));
        assert_eq!(
            SqliteDialect.add_column_sql("ts_ticket_types", &capacity),
            "ALTER TABLE \"ts_ticket_types\" ADD COLUMN \"capacity\" INTEGER NOT NULL DEFAULT 0"
        );
    }

    #[test]
    fn test_index_statements_use_physical_name() {
        let slug = IndexSchema::unique("slug", &["slug"]);
        assert_eq!(
            SqliteDialect.create_index_sql("ts_events", &slug),
            "CREATE UNIQUE INDEX \"ts_events_slug\" ON \"ts_events\" (\"slug\")"
        );
        let window = IndexSchema::new("availability", &["availability_start", "availability_end"]);
        assert_eq!(
            SqliteDialect.create_index_sql("ts_ticket_types", &window),
            "CREATE INDEX \"ts_ticket_types_availability\" ON \"ts_ticket_types\" \
             (\"availability_start\", \"availability_end\")"
        );
        assert_eq!(
            SqliteDialect.drop_index_sql("ts_events_slug"),
            "DROP INDEX \"ts_events_slug\""
        );
    }

    #[test]
    fn test_rebuild_statements() {
        let d = SqliteDialect;
        assert_eq!(
            d.copy_rows_sql("t", "t__rebuild", &["id", "name"]),
            "INSERT INTO \"t__rebuild\" (\"id\", \"name\") SELECT \"id\", \"name\" FROM \"t\""
        );
        assert_eq!(d.drop_table_sql("t"), "DROP TABLE \"t\"");
        assert_eq!(
            d.rename_table_sql("t__rebuild", "t"),
            "ALTER TABLE \"t__rebuild\" RENAME TO \"t\""
        );
        assert_eq!(
            d.drop_column_sql("ts_events", "post_id"),
            "ALTER TABLE \"ts_events\" DROP COLUMN \"post_id\""
        );
    }

    #[test]
    fn test_quote_identifier_doubles_quotes() {
        assert_eq!(SqliteDialect.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_live_definition_matches_declared() {
        let declared = ColumnSchema::new("price", SqlType::Decimal(10, 2))
            .not_null()
            .default(ColumnDefault::Int(0));
        let live = LiveColumn {
            name: "price".to_string(),
            declared_type: "NUMERIC".to_string(),
            not_null: true,
            default: Some("0".to_string()),
            primary_key: false,
            auto_increment: false,
        };
        assert_eq!(
            SqliteDialect.live_column_definition(&live, true),
            SqliteDialect.column_definition(&declared)
        );

        let id = LiveColumn {
            name: "id".to_string(),
            declared_type: "INTEGER".to_string(),
            not_null: false,
            default: None,
            primary_key: true,
            auto_increment: true,
        };
        assert_eq!(
            SqliteDialect.live_column_definition(&id, true),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );
        // Part of a composite key
        assert_eq!(
            SqliteDialect.live_column_definition(&LiveColumn { not_null: true, ..id }, false),
            "\"id\" INTEGER NOT NULL"
        );
    }

    #[test]
    fn test_storage_types() {
        assert_eq!(SqliteDialect.type_name(&SqlType::BigInt), "INTEGER");
        assert_eq!(SqliteDialect.type_name(&SqlType::Boolean), "INTEGER");
        assert_eq!(SqliteDialect.type_name(&SqlType::Varchar(255)), "TEXT");
        assert_eq!(SqliteDialect.type_name(&SqlType::DateTime), "TEXT");
        assert_eq!(SqliteDialect.type_name(&SqlType::Double), "REAL");
        assert_eq!(SqliteDialect.type_name(&SqlType::Decimal(10, 2)), "NUMERIC");
    }
}
