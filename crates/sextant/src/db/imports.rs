//! Import CRUD operations.

use rusqlite::{Connection, params};

use super::Store;
use super::helpers::{IMPORTS_COLUMNS, row_to_import};
use super::ids::IdAllocator;
use crate::analyzer::RawImport;
use crate::error::Result;
use crate::types::{FileId, Import};

/// Batch-insert a file's imports.
pub(super) fn insert_imports(
    conn: &Connection,
    ids: &IdAllocator,
    file_id: FileId,
    imports: &[RawImport],
) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO imports (id, file_id, module, name, alias, line)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for import in imports {
        stmt.execute(params![
            ids.next_id(),
            file_id.as_i64(),
            import.module,
            import.name,
            import.alias,
            import.line,
        ])?;
    }

    Ok(imports.len())
}

impl Store {
    /// Imports declared in a file, in source order.
    pub fn imports_in_file(&self, file_id: FileId) -> Result<Vec<Import>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {IMPORTS_COLUMNS} FROM imports WHERE file_id = ?1 ORDER BY line, id"
        ))?;

        let imports = stmt
            .query_map([file_id.as_i64()], row_to_import)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(imports)
    }
}
