//! Definition CRUD operations.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, ToSql, params};

use super::Store;
use super::helpers::{DEFINITIONS_COLUMNS, DEFINITIONS_COLUMNS_D, row_to_definition};
use super::ids::IdAllocator;
use crate::analyzer::RawDefinition;
use crate::error::Result;
use crate::text::make_search_text;
use crate::types::{Definition, DefinitionId, DefinitionKind, FileId};

/// Ordering that puts the longest-bodied definition first, so a body-less
/// binding (an import alias, say) never shadows the real definition. Ties
/// go to classes and functions, then to the oldest row.
pub(crate) const LONGEST_BODY_FIRST: &str = "(COALESCE(d.end_line, d.line) - d.line) DESC, \
     (d.kind IN ('class', 'function', 'property')) DESC, d.id ASC";

/// Batch-insert a file's definitions, deriving `parent_full_name`,
/// `is_public` and `search_text`.
pub(super) fn insert_definitions(
    conn: &Connection,
    ids: &IdAllocator,
    file_id: FileId,
    definitions: &[RawDefinition],
) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO definitions (id, file_id, name, full_name, kind, line, col, end_line, end_col,
             signature, docstring, parent_full_name, parent_id, is_public, search_text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, ?13, ?14)",
    )?;

    for def in definitions {
        let search_text =
            make_search_text(&def.name, Some(&def.full_name), def.docstring.as_deref());
        stmt.execute(params![
            ids.next_id(),
            file_id.as_i64(),
            def.name,
            def.full_name,
            def.kind.as_str(),
            def.line,
            def.col,
            def.end_line,
            def.end_col,
            def.signature,
            def.docstring,
            def.parent_full_name(),
            def.is_public(),
            search_text,
        ])?;
    }

    Ok(definitions.len())
}

/// A file's definitions keyed by `full_name`, for linking decorators and
/// class bases to their owners right after insert.
#[derive(Debug, Default)]
pub(super) struct OwnerLookup {
    by_full_name: HashMap<String, Vec<Owner>>,
}

#[derive(Debug, Clone, Copy)]
struct Owner {
    id: i64,
    line: u32,
    kind: DefinitionKind,
}

impl OwnerLookup {
    /// One lookup query per file.
    pub(super) fn load(conn: &Connection, file_id: FileId) -> Result<Self> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, full_name, line, kind FROM definitions
             WHERE file_id = ?1 AND kind IN ('class', 'function', 'property')
             ORDER BY line, id",
        )?;
        let rows = stmt.query_map([file_id.as_i64()], |row| {
            Ok((
                row.get::<_, String>(1)?,
                Owner {
                    id: row.get(0)?,
                    line: row.get(2)?,
                    kind: super::helpers::parse_definition_kind(&row.get::<_, String>(3)?)?,
                },
            ))
        })?;

        let mut lookup = Self::default();
        for row in rows {
            let (full_name, owner) = row?;
            lookup.by_full_name.entry(full_name).or_default().push(owner);
        }
        Ok(lookup)
    }

    /// Owner of a decorator: the first definition with that name declared at
    /// or below the decorator line, else the first with that name.
    pub(super) fn decorated(&self, full_name: &str, decorator_line: u32) -> Option<i64> {
        let owners = self.by_full_name.get(full_name)?;
        owners
            .iter()
            .find(|o| o.line >= decorator_line)
            .or_else(|| owners.first())
            .map(|o| o.id)
    }

    /// The first class definition with that name.
    pub(super) fn class(&self, full_name: &str) -> Option<i64> {
        self.by_full_name
            .get(full_name)?
            .iter()
            .find(|o| o.kind == DefinitionKind::Class)
            .map(|o| o.id)
    }
}

/// Filters for [`Store::list_definitions`].
#[derive(Debug, Clone, Default)]
pub struct DefinitionFilter<'a> {
    /// Only this kind
    pub kind: Option<DefinitionKind>,
    /// Only definitions in this file
    pub file_path: Option<&'a str>,
    /// Include names starting with `_`
    pub include_private: bool,
    /// Maximum rows
    pub limit: usize,
    /// Rows to skip
    pub offset: usize,
}

impl Store {
    /// Get a definition by id.
    pub fn get_definition_by_id(&self, id: DefinitionId) -> Result<Option<Definition>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {DEFINITIONS_COLUMNS} FROM definitions WHERE id = ?1"),
            [id.as_i64()],
            row_to_definition,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Definitions whose `full_name` or `name` equals `name`.
    ///
    /// Exact `full_name` matches come first, then longest body first.
    pub fn definitions_named(&self, name: &str) -> Result<Vec<(Definition, String)>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DEFINITIONS_COLUMNS_D}, f.path
             FROM definitions d JOIN files f ON f.id = d.file_id
             WHERE d.full_name = ?1 OR d.name = ?1
             ORDER BY (d.full_name = ?1) DESC, {LONGEST_BODY_FIRST}"
        ))?;

        let rows = stmt
            .query_map([name], |row| Ok((row_to_definition(row)?, row.get(15)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All definitions in a file, in source order.
    pub fn definitions_in_file(&self, file_id: FileId) -> Result<Vec<Definition>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DEFINITIONS_COLUMNS} FROM definitions WHERE file_id = ?1 ORDER BY line, col, id"
        ))?;

        let defs = stmt
            .query_map([file_id.as_i64()], row_to_definition)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(defs)
    }

    /// Page through definitions with optional filters, ordered by file and line.
    pub fn list_definitions(
        &self,
        filter: &DefinitionFilter<'_>,
    ) -> Result<Vec<(Definition, String)>> {
        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(kind) = filter.kind {
            values.push(Box::new(kind.as_str()));
            conditions.push(format!("d.kind = ?{}", values.len()));
        }
        if let Some(path) = filter.file_path {
            values.push(Box::new(path.to_string()));
            conditions.push(format!("f.path = ?{}", values.len()));
        }
        if !filter.include_private {
            conditions.push("d.is_public = 1".to_string());
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        values.push(Box::new(i64::try_from(filter.limit).unwrap_or(i64::MAX)));
        let limit = values.len();
        values.push(Box::new(i64::try_from(filter.offset).unwrap_or(i64::MAX)));
        let offset = values.len();

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DEFINITIONS_COLUMNS_D}, f.path
             FROM definitions d JOIN files f ON f.id = d.file_id
             {where_clause}
             ORDER BY f.path, d.line, d.col, d.id
             LIMIT ?{limit} OFFSET ?{offset}"
        ))?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                Ok((row_to_definition(row)?, row.get(15)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
