//! Migration chain for the ticket tables.
//!
//! Units are frozen once released: they spell out the columns they touch
//! rather than borrowing from the current table definitions, which keep
//! moving. Running the chain from `0.0.0` lands on exactly the shape
//! `install` creates.

use stand_schema::schema::{ColumnDefault, ColumnSchema, IndexSchema, SqlType, TableSchema};
use stand_schema::{Migration, MigrationEntry, SchemaOperation, TableNames};

fn id() -> ColumnSchema {
    ColumnSchema::new("id", SqlType::BigInt)
        .primary_key()
        .auto_increment()
}

fn created_at() -> ColumnSchema {
    ColumnSchema::new("created_at", SqlType::DateTime)
        .not_null()
        .default(ColumnDefault::CurrentTimestamp)
}

fn updated_at() -> ColumnSchema {
    ColumnSchema::new("updated_at", SqlType::DateTime)
}

fn price() -> ColumnSchema {
    ColumnSchema::new("price", SqlType::Decimal(10, 2)).not_null()
}

/// Base events, ticket types and event extras.
pub struct CreateBaseTables;

impl Migration for CreateBaseTables {
    const VERSION: &'static str = "1.0.0";
    const NAME: &'static str = "create_base_tables";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        vec![
            SchemaOperation::create_table(
                TableSchema::new(names.physical("events"))
                    .column(id())
                    .column(
                        ColumnSchema::new("slug", SqlType::Varchar(200))
                            .not_null()
                            .unique(),
                    )
                    .column(ColumnSchema::new("name", SqlType::Varchar(255)).not_null())
                    .column(ColumnSchema::new("post_id", SqlType::BigInt))
                    .column(created_at())
                    .column(updated_at())
                    .index(IndexSchema::new("post_id", &["post_id"])),
            ),
            SchemaOperation::create_table(
                TableSchema::new(names.physical("ticket_types"))
                    .column(id())
                    .column(ColumnSchema::new("event_id", SqlType::BigInt).not_null())
                    .column(ColumnSchema::new("name", SqlType::Varchar(255)).not_null())
                    .column(price().default(ColumnDefault::Int(0)))
                    .column(created_at())
                    .column(updated_at())
                    .index(IndexSchema::new("event_id", &["event_id"])),
            ),
            SchemaOperation::create_table(
                TableSchema::new(names.physical("event_extras"))
                    .column(id())
                    .column(ColumnSchema::new("event_id", SqlType::BigInt).not_null())
                    .column(ColumnSchema::new("name", SqlType::Varchar(255)).not_null())
                    .column(price())
                    .column(created_at())
                    .column(updated_at())
                    .index(IndexSchema::new("event_id", &["event_id"])),
            ),
        ]
    }
}

/// Event summaries.
pub struct AddEventSummary;

impl Migration for AddEventSummary {
    const VERSION: &'static str = "1.0.1";
    const NAME: &'static str = "add_event_summary";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        vec![SchemaOperation::add_column(
            names.physical("events"),
            ColumnSchema::new("summary", SqlType::Text),
        )]
    }
}

/// Sale windows on ticket types.
pub struct AddTicketAvailability;

impl Migration for AddTicketAvailability {
    const VERSION: &'static str = "1.1.0";
    const NAME: &'static str = "add_ticket_availability";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        let table = names.physical("ticket_types");
        vec![
            SchemaOperation::add_column(
                &table,
                ColumnSchema::new("availability_start", SqlType::DateTime),
            ),
            SchemaOperation::add_column(
                &table,
                ColumnSchema::new("availability_end", SqlType::DateTime),
            ),
            SchemaOperation::add_index(
                &table,
                IndexSchema::new("availability", &["availability_start", "availability_end"]),
            ),
        ]
    }
}

/// Extras bundled into ticket types; extra prices default to zero.
pub struct AddTicketTypeExtras;

impl Migration for AddTicketTypeExtras {
    const VERSION: &'static str = "1.2.0";
    const NAME: &'static str = "add_ticket_type_extras";

    fn operations(names: &TableNames) -> Vec<SchemaOperation> {
        vec![
            SchemaOperation::create_table(
                TableSchema::new(names.physical("ticket_type_extras"))
                    .column(id())
                    .column(ColumnSchema::new("ticket_type_id", SqlType::BigInt).not_null())
                    .column(ColumnSchema::new("event_extra_id", SqlType::BigInt).not_null())
                    .column(created_at())
                    .index(IndexSchema::unique(
                        "ticket_extra",
                        &["ticket_type_id", "event_extra_id"],
                    ))
                    .index(IndexSchema::new("ticket_type_id", &["ticket_type_id"]))
                    .index(IndexSchema::new("event_extra_id", &["event_extra_id"])),
            ),
            SchemaOperation::modify_column(
                names.physical("event_extras"),
                price().default(ColumnDefault::Int(0)),
            ),
        ]
    }
}

/// Every released migration.
pub static MIGRATIONS: &[MigrationEntry] = &[
    MigrationEntry::of::<CreateBaseTables>(),
    MigrationEntry::of::<AddEventSummary>(),
    MigrationEntry::of::<AddTicketAvailability>(),
    MigrationEntry::of::<AddTicketTypeExtras>(),
];

#[cfg(test)]
mod tests {
    use super::*;
    use stand_schema::discovery::discover;

    #[test]
    fn test_chain_is_ordered_and_unique() {
        let units = discover(MIGRATIONS, &TableNames::new("ticket_stand_")).unwrap();
        let versions: Vec<String> = units
            .iter()
            .map(|u| u.target_version.to_string())
            .collect();
        assert_eq!(versions, vec!["1.0.0", "1.0.1", "1.1.0", "1.2.0"]);
    }

    #[test]
    fn test_chain_ends_at_crate_version() {
        let last = MIGRATIONS.last().map(|m| m.version);
        assert_eq!(last, Some(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_units_use_physical_names() {
        let units = discover(MIGRATIONS, &TableNames::new("wp_ts_")).unwrap();
        assert!(units
            .iter()
            .flat_map(|u| &u.operations)
            .all(|op| op.table().starts_with("wp_ts_")));
    }
}
