#![allow(dead_code)]

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use stand_schema::introspect::{Introspector, TableSnapshot};
use stand_schema::{SchemaConfig, SchemaVersion};
use ticket_stand_db::TicketStand;

pub const PREFIX: &str = "ts_";

pub const TABLES: &[&str] = &["events", "ticket_types", "event_extras", "ticket_type_extras"];

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

pub fn stand(pool: &SqlitePool, app_version: &str) -> TicketStand {
    TicketStand::new(pool.clone(), config(app_version)).expect("tables register")
}

/// Brings an empty store to `to` through the migration chain alone.
pub async fn migrate_fresh(pool: &SqlitePool, to: &str) -> TicketStand {
    let stand = stand(pool, to);
    let options = stand.manager().options();
    options.ensure_table().await.expect("options table");
    options
        .set("ticket_stand_db_version", "0.0.0")
        .await
        .expect("seed version");
    stand.bootstrap().await.expect("chain runs");
    stand
}

pub async fn snapshot(pool: &SqlitePool, logical: &str) -> TableSnapshot {
    Introspector::new(pool)
        .snapshot(&format!("{PREFIX}{logical}"))
        .await
        .expect("snapshot")
}
