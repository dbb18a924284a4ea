#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use stand_schema::prelude::*;

pub const PREFIX: &str = "ts_";

pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

pub async fn file_pool(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap_or_else(|e| panic!("Failed to open {}: {e}", path.display()))
}

pub fn v(s: &str) -> SchemaVersion {
    SchemaVersion::parse(s).unwrap_or_else(|e| panic!("bad version {s}: {e}"))
}

pub fn config(app_version: &str) -> SchemaConfig {
    SchemaConfig::new(app_version).table_prefix(PREFIX)
}

pub fn names() -> TableNames {
    TableNames::new(PREFIX)
}

pub fn units() -> Vec<MigrationUnit> {
    discover(CHAIN, &names()).expect("chain discovers")
}

pub struct CreateEvents;

impl Migration for CreateEvents {
    const VERSION: &'static str = "1.0.0";
    const NAME: &'static str = "create_events";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        vec![SchemaOperation::create_table(
            TableSchema::new(names.physical("events"))
                .column(
                    ColumnSchema::new("id", SqlType::BigInt)
                        .primary_key()
                        .auto_increment(),
                )
                .column(ColumnSchema::new("slug", SqlType::Varchar(200)).not_null().unique())
                .column(ColumnSchema::new("name", SqlType::Varchar(255)).not_null())
                .column(ColumnSchema::new("post_id", SqlType::BigInt))
                .index(IndexSchema::new("post_id", &["post_id"])),
        )]
    }
}

pub struct AddSummary;

impl Migration for AddSummary {
    const VERSION: &'static str = "1.0.1";
    const NAME: &'static str = "add_summary";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        vec![SchemaOperation::add_column(
            names.physical("events"),
            ColumnSchema::new("summary", SqlType::Text),
        )]
    }
}

pub struct AddStartsAt;

impl Migration for AddStartsAt {
    const VERSION: &'static str = "1.1.0";
    const NAME: &'static str = "add_starts_at";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        let table = names.physical("events");
        vec![
            SchemaOperation::add_column(&table, ColumnSchema::new("starts_at", SqlType::DateTime)),
            SchemaOperation::add_index(&table, IndexSchema::new("starts_at", &["starts_at"])),
        ]
    }
}

pub struct RelaxName;

impl Migration for RelaxName {
    const VERSION: &'static str = "1.2.0";
    const NAME: &'static str = "relax_name";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        vec![SchemaOperation::modify_column(
            names.physical("events"),
            ColumnSchema::new("name", SqlType::Text)
                .not_null()
                .default(ColumnDefault::Text(String::new())),
        )]
    }
}

pub struct DropPostId;

impl Migration for DropPostId {
    const VERSION: &'static str = "2.0.0";
    const NAME: &'static str = "drop_post_id";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        let table = names.physical("events");
        vec![
            SchemaOperation::drop_index(&table, "post_id"),
            SchemaOperation::drop_column(&table, "post_id"),
        ]
    }
}

/// Registered out of order on purpose.
pub static CHAIN: &[MigrationEntry] = &[
    MigrationEntry::of::<RelaxName>(),
    MigrationEntry::of::<CreateEvents>(),
    MigrationEntry::of::<DropPostId>(),
    MigrationEntry::of::<AddSummary>(),
    MigrationEntry::of::<AddStartsAt>(),
];

/// The events table as of 2.0.0.
pub struct Events;

impl TableDefinition for Events {
    fn logical_name(&self) -> &'static str {
        "events"
    }

    fn schema_version(&self) -> &'static str {
        "2.0.0"
    }

    fn columns(&self) -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::new("id", SqlType::BigInt)
                .primary_key()
                .auto_increment(),
            ColumnSchema::new("slug", SqlType::Varchar(200)).not_null().unique(),
            ColumnSchema::new("name", SqlType::Text)
                .not_null()
                .default(ColumnDefault::Text(String::new())),
            ColumnSchema::new("summary", SqlType::Text),
            ColumnSchema::new("starts_at", SqlType::DateTime),
        ]
    }

    fn indexes(&self) -> Vec<IndexSchema> {
        vec![IndexSchema::new("starts_at", &["starts_at"])]
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub alterer: SchemaAlterer<SqliteDialect>,
    pub audit: AuditLog,
}

impl Harness {
    pub async fn new(pool: SqlitePool) -> Self {
        let options = OptionStore::new(pool.clone(), format!("{PREFIX}schema_options"));
        options.ensure_table().await.expect("options table");
        let audit = AuditLog::new(options, "ticket_stand_migration_logs", Arc::new(SystemClock));
        let alterer = SchemaAlterer::new(pool.clone(), SqliteDialect::new());
        Self {
            pool,
            alterer,
            audit,
        }
    }

    pub async fn run(
        &self,
        units: &[MigrationUnit],
        from: &str,
        to: &str,
    ) -> stand_schema::Result<RunReport> {
        MigrationRunner::new(&self.alterer, &self.audit)
            .run(units, &v(from), &v(to))
            .await
    }

    pub async fn snapshot(&self, logical: &str) -> TableSnapshot {
        Introspector::new(&self.pool)
            .snapshot(&names().physical(logical))
            .await
            .expect("snapshot")
    }
}
