//! Reference CRUD operations.

use rusqlite::{Connection, params};

use super::Store;
use super::helpers::{REFS_COLUMNS, qualify_columns, row_to_reference};
use super::ids::IdAllocator;
use crate::analyzer::RawReference;
use crate::error::Result;
use crate::types::{FileId, Reference};

/// Batch-insert a file's references.
pub(super) fn insert_references(
    conn: &Connection,
    ids: &IdAllocator,
    file_id: FileId,
    references: &[RawReference],
) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO refs (id, file_id, definition_id, name, line, col, context,
             target_full_name, target_module_path, is_call, call_order, call_depth)
         VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    for r in references {
        stmt.execute(params![
            ids.next_id(),
            file_id.as_i64(),
            r.name,
            r.line,
            r.col,
            r.context,
            r.target_full_name,
            r.target_module_path,
            r.is_call,
            r.call_order,
            r.call_depth,
        ])?;
    }

    Ok(references.len())
}

impl Store {
    /// References to a name, with the path of the file they appear in.
    ///
    /// Matches the written name or the resolved target's qualified name.
    pub fn find_references(&self, name: &str, limit: usize) -> Result<Vec<(Reference, String)>> {
        let conn = self.connection()?;
        let columns = qualify_columns(REFS_COLUMNS, "r");
        let mut stmt = conn.prepare(&format!(
            "SELECT {columns}, f.path
             FROM refs r JOIN files f ON f.id = r.file_id
             WHERE r.name = ?1 OR r.target_full_name = ?1
             ORDER BY f.path, r.line, r.col
             LIMIT ?2"
        ))?;

        let rows = stmt
            .query_map(
                params![name, i64::try_from(limit).unwrap_or(i64::MAX)],
                |row| Ok((row_to_reference(row)?, row.get(12)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All references in a file, in source order.
    pub fn references_in_file(&self, file_id: FileId) -> Result<Vec<Reference>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REFS_COLUMNS} FROM refs WHERE file_id = ?1 ORDER BY line, col, id"
        ))?;

        let refs = stmt
            .query_map([file_id.as_i64()], row_to_reference)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(refs)
    }
}
