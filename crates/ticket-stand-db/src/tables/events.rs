//! Events table.

use stand_schema::schema::{ColumnSchema, IndexSchema, SqlType};
use stand_schema::{ListQuery, OrderBy, Record, SqlValue, Table, TableDefinition};

use super::{created_at_column, id_column, like_pattern, paging_sql, updated_at_column};
use crate::error::Result;
use crate::sanitize::{id_field, kses_post, sanitize_text_field, sanitize_title, text_field};

/// Definition of the `events` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventsTable;

impl TableDefinition for EventsTable {
    fn logical_name(&self) -> &'static str {
        "events"
    }

    fn schema_version(&self) -> &'static str {
        "1.0.1"
    }

    fn columns(&self) -> Vec<ColumnSchema> {
        vec![
            id_column(),
            ColumnSchema::new("slug", SqlType::Varchar(200))
                .not_null()
                .unique(),
            ColumnSchema::new("name", SqlType::Varchar(255)).not_null(),
            ColumnSchema::new("post_id", SqlType::BigInt),
            created_at_column(),
            updated_at_column(),
            ColumnSchema::new("summary", SqlType::Text),
        ]
    }

    fn indexes(&self) -> Vec<IndexSchema> {
        vec![IndexSchema::new("post_id", &["post_id"])]
    }

    fn sanitize(&self, mut record: Record) -> stand_schema::Result<Record> {
        text_field(&mut record, "slug", sanitize_title);
        text_field(&mut record, "name", sanitize_text_field);
        text_field(&mut record, "summary", kses_post);
        id_field(&mut record, "post_id");
        Ok(record)
    }
}

/// Event lookups.
#[derive(Debug, Clone, Copy)]
pub struct Events<'a> {
    table: &'a Table,
}

impl<'a> Events<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// The underlying table, for generic CRUD.
    #[must_use]
    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Finds an event by slug. The slug is normalized first, so a title
    /// finds the event it was slugged from.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            self.table.quoted_table(),
            self.table.quote("slug")
        );
        Ok(self
            .table
            .query_one(&sql, vec![SqlValue::Text(sanitize_title(slug))])
            .await?)
    }

    /// Finds the event attached to a host post.
    pub async fn get_by_post_id(&self, post_id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {} LIMIT 1",
            self.table.quoted_table(),
            self.table.quote("post_id"),
            self.table.quote("id")
        );
        Ok(self
            .table
            .query_one(&sql, vec![SqlValue::Int(post_id)])
            .await?)
    }

    /// Substring search over name, slug and summary. Ordered by name
    /// ascending unless the query says otherwise.
    pub async fn search(&self, term: &str, query: &ListQuery) -> Result<Vec<Record>> {
        let pattern = like_pattern(term);
        let conditions: Vec<String> = ["name", "slug", "summary"]
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", self.table.quote(c)))
            .collect();
        let mut params = vec![SqlValue::Text(pattern); conditions.len()];
        let paging = paging_sql(self.table, query, OrderBy::asc("name"), None, &mut params)?;

        let sql = format!(
            "SELECT * FROM {} WHERE {}{paging}",
            self.table.quoted_table(),
            conditions.join(" OR ")
        );
        Ok(self.table.query(&sql, params).await?)
    }
}
