//! Read-only raw SQL over the store's tables and views.

use rusqlite::Batch;

use super::Store;
use super::helpers::value_ref_to_json;
use crate::error::{Error, Result};
use crate::types::QueryResult;

impl Store {
    /// Run one read-only SQL statement and return its rows as JSON values.
    ///
    /// Unknown tables or columns, syntax errors, multiple statements and
    /// anything that would write are reported as [`Error::InvalidQuery`].
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.connection()?;
        let invalid = |e: rusqlite::Error| Error::InvalidQuery(e.to_string());

        let mut batch = Batch::new(&conn, sql);
        let Some(mut stmt) = batch.next().map_err(invalid)? else {
            return Err(Error::InvalidQuery("query is empty".to_string()));
        };
        if batch.next().map_err(invalid)?.is_some() {
            return Err(Error::InvalidQuery(
                "only a single statement is allowed".to_string(),
            ));
        }
        if !stmt.readonly() {
            return Err(Error::InvalidQuery(
                "only read-only statements are allowed".to_string(),
            ));
        }

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        let mut result = QueryResult {
            columns,
            rows: Vec::new(),
        };
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(value_ref_to_json(row.get_ref(i)?));
            }
            result.rows.push(values);
        }
        Ok(result)
    }
}
