//! Junction between ticket types and the event extras they include.

use stand_schema::schema::{ColumnSchema, IndexSchema, SqlType};
use stand_schema::{record, Record, SqlValue, Table, TableDefinition};
use tracing::debug;

use super::{created_at_column, id_column};
use crate::error::Result;
use crate::sanitize::id_field;

/// Definition of the `ticket_type_extras` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketTypeExtrasTable;

impl TableDefinition for TicketTypeExtrasTable {
    fn logical_name(&self) -> &'static str {
        "ticket_type_extras"
    }

    fn schema_version(&self) -> &'static str {
        "1.2.0"
    }

    fn columns(&self) -> Vec<ColumnSchema> {
        vec![
            id_column(),
            ColumnSchema::new("ticket_type_id", SqlType::BigInt).not_null(),
            ColumnSchema::new("event_extra_id", SqlType::BigInt).not_null(),
            created_at_column(),
        ]
    }

    fn indexes(&self) -> Vec<IndexSchema> {
        vec![
            IndexSchema::unique("ticket_extra", &["ticket_type_id", "event_extra_id"]),
            IndexSchema::new("ticket_type_id", &["ticket_type_id"]),
            IndexSchema::new("event_extra_id", &["event_extra_id"]),
        ]
    }

    fn sanitize(&self, mut record: Record) -> stand_schema::Result<Record> {
        id_field(&mut record, "ticket_type_id");
        id_field(&mut record, "event_extra_id");
        Ok(record)
    }
}

/// Associations between ticket types and event extras.
#[derive(Debug, Clone, Copy)]
pub struct TicketTypeExtras<'a> {
    table: &'a Table,
    ticket_types: &'a Table,
    extras: &'a Table,
}

impl<'a> TicketTypeExtras<'a> {
    pub(crate) fn new(table: &'a Table, ticket_types: &'a Table, extras: &'a Table) -> Self {
        Self {
            table,
            ticket_types,
            extras,
        }
    }

    /// The underlying table, for generic CRUD.
    #[must_use]
    pub fn table(&self) -> &'a Table {
        self.table
    }

    fn pair(ticket_type_id: i64, event_extra_id: i64) -> Record {
        record([
            ("ticket_type_id", ticket_type_id),
            ("event_extra_id", event_extra_id),
        ])
    }

    /// Links a ticket type to an extra. Returns the new row id, or `None`
    /// when the pair was already linked.
    pub async fn associate(&self, ticket_type_id: i64, event_extra_id: i64) -> Result<Option<i64>> {
        let pair = Self::pair(ticket_type_id, event_extra_id);
        if self.table.count(&pair).await? > 0 {
            debug!(ticket_type_id, event_extra_id, "Extra already associated");
            return Ok(None);
        }
        Ok(Some(self.table.insert(pair).await?))
    }

    /// Unlinks a ticket type from an extra. Returns the rows removed.
    pub async fn dissociate(&self, ticket_type_id: i64, event_extra_id: i64) -> Result<u64> {
        Ok(self
            .table
            .delete(&Self::pair(ticket_type_id, event_extra_id))
            .await?)
    }

    /// Extras included with a ticket type, by name.
    pub async fn extras_for_ticket_type(&self, ticket_type_id: i64) -> Result<Vec<Record>> {
        let q = |c: &str| self.table.quote(c);
        let sql = format!(
            "SELECT e.* FROM {} e JOIN {} te ON e.{} = te.{} \
             WHERE te.{} = ? ORDER BY e.{} ASC",
            self.extras.quoted_table(),
            self.table.quoted_table(),
            q("id"),
            q("event_extra_id"),
            q("ticket_type_id"),
            q("name")
        );
        Ok(self
            .table
            .query(&sql, vec![SqlValue::Int(ticket_type_id)])
            .await?)
    }

    /// Ticket types that include an extra, by name.
    pub async fn ticket_types_for_extra(&self, event_extra_id: i64) -> Result<Vec<Record>> {
        let q = |c: &str| self.table.quote(c);
        let sql = format!(
            "SELECT t.* FROM {} t JOIN {} te ON t.{} = te.{} \
             WHERE te.{} = ? ORDER BY t.{} ASC",
            self.ticket_types.quoted_table(),
            self.table.quoted_table(),
            q("id"),
            q("ticket_type_id"),
            q("event_extra_id"),
            q("name")
        );
        Ok(self
            .table
            .query(&sql, vec![SqlValue::Int(event_extra_id)])
            .await?)
    }
}
