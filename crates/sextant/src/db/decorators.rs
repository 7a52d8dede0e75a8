//! Decorator CRUD operations.

use rusqlite::{Connection, params};

use super::Store;
use super::definitions::OwnerLookup;
use super::helpers::{DECORATORS_COLUMNS, row_to_decorator};
use super::ids::IdAllocator;
use crate::analyzer::RawDecorator;
use crate::error::Result;
use crate::types::{Decorator, DefinitionId, FileId};

/// Link decorators to their owning definitions and insert them.
///
/// Returns `(inserted, dropped)`; decorators whose owner is not among the
/// file's definitions are dropped.
pub(super) fn insert_decorators(
    conn: &Connection,
    ids: &IdAllocator,
    file_id: FileId,
    owners: &OwnerLookup,
    decorators: &[RawDecorator],
) -> Result<(usize, usize)> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO decorators (id, definition_id, file_id, name, arguments, line)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    let mut inserted = 0;
    for decorator in decorators {
        let Some(owner) = owners.decorated(&decorator.owner_full_name, decorator.line) else {
            continue;
        };
        stmt.execute(params![
            ids.next_id(),
            owner,
            file_id.as_i64(),
            decorator.name,
            decorator.arguments,
            decorator.line,
        ])?;
        inserted += 1;
    }

    Ok((inserted, decorators.len() - inserted))
}

impl Store {
    /// Decorators applied to a definition, top to bottom.
    pub fn decorators_of(&self, definition_id: DefinitionId) -> Result<Vec<Decorator>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DECORATORS_COLUMNS} FROM decorators WHERE definition_id = ?1 ORDER BY line, id"
        ))?;

        let decorators = stmt
            .query_map([definition_id.as_i64()], row_to_decorator)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(decorators)
    }
}
