//! File CRUD operations and the per-file replace transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::helpers::{FILES_COLUMNS, format_timestamp, row_to_indexed_file};
use super::schema::Table;
use super::{Store, class_bases, decorators, definitions, imports, references};
use crate::analyzer::FileAnalysis;
use crate::error::Result;
use crate::types::{FileId, IndexedFile};

/// File metadata written alongside a file's records.
#[derive(Debug, Clone)]
pub struct FileRecord<'a> {
    /// Path relative to the source root
    pub path: &'a str,
    /// SHA-256 hex digest of the content
    pub content_hash: &'a str,
    /// Size in bytes
    pub size: u64,
    /// Modification time on disk
    pub modified_at: Option<DateTime<Utc>>,
}

/// Rows written by [`Store::replace_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileWriteStats {
    /// The new file row
    pub file_id: FileId,
    /// Definitions inserted
    pub definitions: usize,
    /// References inserted
    pub references: usize,
    /// Imports inserted
    pub imports: usize,
    /// Decorators inserted
    pub decorators: usize,
    /// Class bases inserted
    pub class_bases: usize,
    /// Decorators and class bases dropped for lack of an owner
    pub dropped: usize,
}

impl Store {
    /// Get a file by relative path.
    pub fn get_file(&self, path: &str) -> Result<Option<IndexedFile>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {FILES_COLUMNS} FROM files WHERE path = ?1"),
            [path],
            row_to_indexed_file,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get a file by its id.
    pub fn get_file_by_id(&self, id: FileId) -> Result<Option<IndexedFile>> {
        let conn = self.connection()?;

        conn.query_row(
            &format!("SELECT {FILES_COLUMNS} FROM files WHERE id = ?1"),
            [id.as_i64()],
            row_to_indexed_file,
        )
        .optional()
        .map_err(Into::into)
    }

    /// All indexed files, ordered by path.
    pub fn list_files(&self) -> Result<Vec<IndexedFile>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT {FILES_COLUMNS} FROM files ORDER BY path"))?;

        let files = stmt
            .query_map([], row_to_indexed_file)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Stored content hash for every indexed path, in one read.
    pub fn file_hashes(&self) -> Result<HashMap<String, String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT path, content_hash FROM files")?;

        let hashes = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(hashes)
    }

    /// Replace everything indexed for one file in a single transaction.
    ///
    /// Any existing row for the path is deleted with all its dependents, a
    /// fresh file row is inserted, then definitions, decorators and class
    /// bases (linked to the new definitions), references and imports.
    /// Either all of it lands or none of it does.
    pub fn replace_file(
        &self,
        record: &FileRecord<'_>,
        analysis: &FileAnalysis,
    ) -> Result<FileWriteStats> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row("SELECT id FROM files WHERE path = ?1", [record.path], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            delete_file_cascade(&tx, FileId::from(id))?;
        }

        let file_id = FileId::from(self.ids.get(Table::Files).next_id());
        tx.execute(
            "INSERT INTO files (id, path, content_hash, size, modified_at, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file_id.as_i64(),
                record.path,
                record.content_hash,
                i64::try_from(record.size).unwrap_or(i64::MAX),
                record.modified_at.as_ref().map(format_timestamp),
                format_timestamp(&Utc::now()),
            ],
        )?;

        let definitions = definitions::insert_definitions(
            &tx,
            self.ids.get(Table::Definitions),
            file_id,
            &analysis.definitions,
        )?;

        let owners = definitions::OwnerLookup::load(&tx, file_id)?;
        let (decorators, dropped_decorators) = decorators::insert_decorators(
            &tx,
            self.ids.get(Table::Decorators),
            file_id,
            &owners,
            &analysis.decorators,
        )?;
        let (class_bases, dropped_bases) = class_bases::insert_class_bases(
            &tx,
            self.ids.get(Table::ClassBases),
            file_id,
            &owners,
            &analysis.class_bases,
        )?;

        let references = references::insert_references(
            &tx,
            self.ids.get(Table::Refs),
            file_id,
            &analysis.references,
        )?;
        let imports =
            imports::insert_imports(&tx, self.ids.get(Table::Imports), file_id, &analysis.imports)?;

        tx.commit()?;

        let stats = FileWriteStats {
            file_id,
            definitions,
            references,
            imports,
            decorators,
            class_bases,
            dropped: dropped_decorators + dropped_bases,
        };
        if stats.dropped > 0 {
            tracing::debug!(
                path = record.path,
                dropped = stats.dropped,
                "Dropped decorators/class bases without a resolvable owner"
            );
        }
        Ok(stats)
    }

    /// Delete a file and every row that depends on it.
    pub fn delete_file(&self, id: FileId) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        delete_file_cascade(&tx, id)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a file by path. Returns `false` if it was not indexed.
    pub fn delete_file_by_path(&self, path: &str) -> Result<bool> {
        match self.get_file(path)? {
            Some(file) => {
                self.delete_file(file.id)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Remove a file's dependents in dependency order, then the file row.
pub(super) fn delete_file_cascade(conn: &Connection, id: FileId) -> Result<()> {
    let id = id.as_i64();
    conn.execute(
        "DELETE FROM decorators
         WHERE definition_id IN (SELECT id FROM definitions WHERE file_id = ?1)",
        [id],
    )?;
    conn.execute(
        "DELETE FROM class_bases
         WHERE class_id IN (SELECT id FROM definitions WHERE file_id = ?1 AND kind = 'class')",
        [id],
    )?;
    conn.execute("DELETE FROM calls WHERE file_id = ?1", [id])?;
    conn.execute("DELETE FROM refs WHERE file_id = ?1", [id])?;
    conn.execute("DELETE FROM imports WHERE file_id = ?1", [id])?;
    conn.execute("DELETE FROM definitions WHERE file_id = ?1", [id])?;
    conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
    Ok(())
}
