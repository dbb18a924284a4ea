//! The four ticket tables and their lookups.
//!
//! Each module pairs a [`TableDefinition`](stand_schema::TableDefinition)
//! describing the table at the current release with a borrowed view that
//! adds the table's domain queries on top of the generic CRUD helpers.

pub mod event_extras;
pub mod events;
pub mod ticket_type_extras;
pub mod ticket_types;

pub use event_extras::{EventExtras, EventExtrasTable};
pub use events::{Events, EventsTable};
pub use ticket_type_extras::{TicketTypeExtras, TicketTypeExtrasTable};
pub use ticket_types::{TicketTypes, TicketTypesTable};

use stand_schema::schema::{ColumnDefault, ColumnSchema, SqlType};
use stand_schema::{ListQuery, OrderBy, OrderDirection, Result, SqlValue, Table};

pub(crate) fn id_column() -> ColumnSchema {
    ColumnSchema::new("id", SqlType::BigInt)
        .primary_key()
        .auto_increment()
}

pub(crate) fn created_at_column() -> ColumnSchema {
    ColumnSchema::new("created_at", SqlType::DateTime)
        .not_null()
        .default(ColumnDefault::CurrentTimestamp)
}

pub(crate) fn updated_at_column() -> ColumnSchema {
    ColumnSchema::new("updated_at", SqlType::DateTime)
}

/// Renders `ORDER BY .. LIMIT ? OFFSET ?` for a query, falling back to
/// `default` when it has no ordering. Pushes the limit and offset params.
pub(crate) fn paging_sql(
    table: &Table,
    query: &ListQuery,
    default: OrderBy,
    qualifier: Option<&str>,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    let order = query.order_by.clone().unwrap_or(default);
    table.check_field(&order.column)?;
    let direction = match order.direction {
        OrderDirection::Asc => "ASC",
        OrderDirection::Desc => "DESC",
    };
    let column = match qualifier {
        Some(alias) => format!("{alias}.{}", table.quote(&order.column)),
        None => table.quote(&order.column),
    };
    params.push(SqlValue::Int(i64::from(query.limit)));
    params.push(SqlValue::Int(i64::from(query.offset)));
    Ok(format!(" ORDER BY {column} {direction} LIMIT ? OFFSET ?"))
}

/// `%term%` with LIKE wildcards in `term` escaped by `\`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
