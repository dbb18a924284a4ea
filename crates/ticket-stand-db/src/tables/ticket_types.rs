//! Ticket types table.

use chrono::{DateTime, Utc};
use stand_schema::schema::{ColumnDefault, ColumnSchema, IndexSchema, SqlType};
use stand_schema::{ListQuery, OrderBy, Record, SqlValue, Table, TableDefinition, ToSqlValue};

use super::{created_at_column, id_column, paging_sql, updated_at_column};
use crate::error::Result;
use crate::sanitize::{float_field, id_field, optional_text_field, sanitize_text_field, text_field};

/// Definition of the `ticket_types` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketTypesTable;

impl TableDefinition for TicketTypesTable {
    fn logical_name(&self) -> &'static str {
        "ticket_types"
    }

    fn schema_version(&self) -> &'static str {
        "1.1.0"
    }

    fn columns(&self) -> Vec<ColumnSchema> {
        vec![
            id_column(),
            ColumnSchema::new("event_id", SqlType::BigInt).not_null(),
            ColumnSchema::new("name", SqlType::Varchar(255)).not_null(),
            ColumnSchema::new("price", SqlType::Decimal(10, 2))
                .not_null()
                .default(ColumnDefault::Int(0)),
            created_at_column(),
            updated_at_column(),
            ColumnSchema::new("availability_start", SqlType::DateTime),
            ColumnSchema::new("availability_end", SqlType::DateTime),
        ]
    }

    fn indexes(&self) -> Vec<IndexSchema> {
        vec![
            IndexSchema::new("event_id", &["event_id"]),
            IndexSchema::new("availability", &["availability_start", "availability_end"]),
        ]
    }

    fn sanitize(&self, mut record: Record) -> stand_schema::Result<Record> {
        text_field(&mut record, "name", sanitize_text_field);
        float_field(&mut record, "price");
        id_field(&mut record, "event_id");
        optional_text_field(&mut record, "availability_start", sanitize_text_field);
        optional_text_field(&mut record, "availability_end", sanitize_text_field);
        Ok(record)
    }
}

/// Ticket type lookups.
#[derive(Debug, Clone, Copy)]
pub struct TicketTypes<'a> {
    table: &'a Table,
}

impl<'a> TicketTypes<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// The underlying table, for generic CRUD.
    #[must_use]
    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Ticket types of one event, cheapest first by default.
    pub async fn get_by_event(&self, event_id: i64, query: &ListQuery) -> Result<Vec<Record>> {
        let mut params = vec![SqlValue::Int(event_id)];
        let paging = paging_sql(self.table, query, OrderBy::asc("price"), None, &mut params)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?{paging}",
            self.table.quoted_table(),
            self.table.quote("event_id")
        );
        Ok(self.table.query(&sql, params).await?)
    }

    /// Ticket types of one event on sale at `now`. A missing window bound
    /// leaves that side open.
    pub async fn get_available(
        &self,
        event_id: i64,
        now: DateTime<Utc>,
        query: &ListQuery,
    ) -> Result<Vec<Record>> {
        let start = self.table.quote("availability_start");
        let end = self.table.quote("availability_end");
        let now = now.to_sql_value();

        let mut params = vec![SqlValue::Int(event_id), now.clone(), now];
        let paging = paging_sql(self.table, query, OrderBy::asc("price"), None, &mut params)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ? \
             AND ({start} IS NULL OR {start} <= ?) \
             AND ({end} IS NULL OR {end} >= ?){paging}",
            self.table.quoted_table(),
            self.table.quote("event_id")
        );
        Ok(self.table.query(&sql, params).await?)
    }
}
