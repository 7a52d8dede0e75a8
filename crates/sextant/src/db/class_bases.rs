//! Class base CRUD operations and inheritance lookups.

use rusqlite::{Connection, params};

use super::Store;
use super::definitions::OwnerLookup;
use super::helpers::{CLASS_BASES_COLUMNS, qualify_columns, row_to_class_base};
use super::ids::IdAllocator;
use crate::analyzer::RawClassBase;
use crate::error::Result;
use crate::types::{ClassBase, FileId};

/// Link class bases to their declaring classes and insert them.
///
/// Returns `(inserted, dropped)`. When the base is a class in the same file
/// its `base_id` is set immediately; the consistency builder re-links every
/// base across files afterwards.
pub(super) fn insert_class_bases(
    conn: &Connection,
    ids: &IdAllocator,
    file_id: FileId,
    owners: &OwnerLookup,
    bases: &[RawClassBase],
) -> Result<(usize, usize)> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO class_bases (id, class_id, file_id, base_name, base_full_name, base_id, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    let mut inserted = 0;
    for base in bases {
        let Some(class_id) = owners.class(&base.class_full_name) else {
            continue;
        };
        let base_id = base
            .base_full_name
            .as_deref()
            .and_then(|name| owners.class(name));
        stmt.execute(params![
            ids.next_id(),
            class_id,
            file_id.as_i64(),
            base.base_name,
            base.base_full_name,
            base_id,
            base.position,
        ])?;
        inserted += 1;
    }

    Ok((inserted, bases.len() - inserted))
}

impl Store {
    /// Bases of every class named `class` (short or qualified), in
    /// declaration order.
    pub fn bases_of(&self, class: &str) -> Result<Vec<ClassBase>> {
        let conn = self.connection()?;
        let columns = qualify_columns(CLASS_BASES_COLUMNS, "b");
        let mut stmt = conn.prepare(&format!(
            "SELECT {columns} FROM class_bases b
             JOIN definitions c ON c.id = b.class_id
             WHERE c.kind = 'class' AND (c.full_name = ?1 OR c.name = ?1)
             ORDER BY c.id, b.position"
        ))?;

        let bases = stmt
            .query_map([class], row_to_class_base)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bases)
    }

    /// Direct subclasses of `class`, as `(class full name, file path)`.
    ///
    /// Matches linked bases and, for unlinked ones, the written or resolved
    /// base name.
    pub fn subclasses_of(&self, class: &str) -> Result<Vec<(String, String)>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT c.full_name, f.path
             FROM class_bases b
             JOIN definitions c ON c.id = b.class_id
             JOIN files f ON f.id = c.file_id
             LEFT JOIN definitions base ON base.id = b.base_id
             WHERE base.full_name = ?1 OR base.name = ?1
                OR b.base_full_name = ?1 OR b.base_name = ?1
             ORDER BY c.full_name",
        )?;

        let rows = stmt
            .query_map([class], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
