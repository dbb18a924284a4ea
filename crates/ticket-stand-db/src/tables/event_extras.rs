//! Event extras table: add-ons sold alongside tickets.

use stand_schema::schema::{ColumnDefault, ColumnSchema, IndexSchema, SqlType};
use stand_schema::{ListQuery, OrderBy, Record, SqlValue, Table, TableDefinition};

use super::{created_at_column, id_column, paging_sql, updated_at_column};
use crate::error::Result;
use crate::sanitize::{float_field, id_field, sanitize_text_field, text_field};

/// Definition of the `event_extras` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventExtrasTable;

impl TableDefinition for EventExtrasTable {
    fn logical_name(&self) -> &'static str {
        "event_extras"
    }

    fn schema_version(&self) -> &'static str {
        "1.2.0"
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
        ]
    }

    fn indexes(&self) -> Vec<IndexSchema> {
        vec![IndexSchema::new("event_id", &["event_id"])]
    }

    fn sanitize(&self, mut record: Record) -> stand_schema::Result<Record> {
        text_field(&mut record, "name", sanitize_text_field);
        float_field(&mut record, "price");
        id_field(&mut record, "event_id");
        Ok(record)
    }
}

/// Event extra lookups.
#[derive(Debug, Clone, Copy)]
pub struct EventExtras<'a> {
    table: &'a Table,
}

impl<'a> EventExtras<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// The underlying table, for generic CRUD.
    #[must_use]
    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Extras offered for one event, by name unless the query says otherwise.
    pub async fn get_by_event(&self, event_id: i64, query: &ListQuery) -> Result<Vec<Record>> {
        let mut params = vec![SqlValue::Int(event_id)];
        let paging = paging_sql(self.table, query, OrderBy::asc("name"), None, &mut params)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?{paging}",
            self.table.quoted_table(),
            self.table.quote("event_id")
        );
        Ok(self.table.query(&sql, params).await?)
    }
}
