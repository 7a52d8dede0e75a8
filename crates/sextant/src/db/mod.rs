//! The Snapshot Store: an in-memory `SQLite` database plus its columnar
//! snapshot on disk.
//!
//! The live store is always in memory. Durability comes from
//! [`Store::export`], which writes one compressed, column-oriented file per
//! table, and [`Store::from_snapshot`], which loads those files into a fresh
//! store and resumes the id allocators.
//!
//! ## Module Structure
//!
//! - `schema` - Tables, indexes, views and the term index DDL
//! - `ids` - Per-table id allocators
//! - `helpers` - Row conversion and parsing utilities
//! - `files` - File CRUD, manual cascade and the per-file replace transaction
//! - `definitions` / `references` / `imports` / `decorators` / `class_bases` - Per-table CRUD
//! - `calls` - Derived call graph storage and traversal
//! - `snapshot` - Export and hydration
//! - `query` - Read-only raw SQL

mod calls;
mod class_bases;
mod decorators;
mod definitions;
mod files;
mod helpers;
mod ids;
mod imports;
mod query;
mod references;
mod schema;
mod snapshot;

pub use definitions::DefinitionFilter;
pub use files::{FileRecord, FileWriteStats};
pub use schema::Table;
pub use snapshot::{
    SNAPSHOT_EXTENSION, has_snapshot, remove_snapshot, snapshot_path, snapshot_size,
};

pub(crate) use calls::{NewCall, insert_calls};
pub(crate) use definitions::LONGEST_BODY_FIRST;
pub(crate) use helpers::{
    DEFINITIONS_COLUMNS_D, escape_like, parse_timestamp, row_to_definition,
};
pub(crate) use schema::{SCHEMA, TERM_INDEX};

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::types::{DatabaseStats, DefinitionKind};
use ids::IdAllocators;

/// In-memory index store.
///
/// The connection is wrapped in a `Mutex` so the indexer and search layers can
/// share one `&Store`; there is still only ever one writer.
pub struct Store {
    conn: Mutex<Connection>,
    ids: IdAllocators,
}

impl Store {
    /// Create an empty store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            ids: IdAllocators::new(),
        })
    }

    /// Open the snapshot in `dir` if there is one, otherwise an empty store.
    pub fn open(dir: &Path) -> Result<Self> {
        if has_snapshot(dir) {
            Self::from_snapshot(dir)
        } else {
            tracing::debug!(dir = %dir.display(), "No snapshot found, starting empty");
            Self::open_in_memory()
        }
    }

    /// Acquire the connection lock.
    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::Internal(format!(
                "database connection mutex poisoned (a thread panicked while holding the lock): {e}"
            ))
        })
    }

    /// The id the next insert into `table` will receive.
    #[must_use]
    pub fn peek_next_id(&self, table: Table) -> i64 {
        self.ids.get(table).peek()
    }

    pub(crate) fn ids(&self) -> &IdAllocators {
        &self.ids
    }

    /// Delete every row and the term index; allocators restart at 1.
    pub fn clear(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch("DROP TABLE IF EXISTS definitions_fts;")?;
        for table in Table::ALL.iter().rev() {
            conn.execute(&format!("DELETE FROM {}", table.name()), [])?;
        }
        self.ids.resume_from(&conn)?;
        tracing::info!("Store cleared");
        Ok(())
    }

    /// Drop and rebuild the full-text term index from `definitions`.
    ///
    /// On failure the index is left absent and search falls back to
    /// substring matching.
    pub fn rebuild_term_index(&self) -> Result<()> {
        let conn = self.connection()?;
        if let Err(e) = conn.execute_batch(TERM_INDEX) {
            conn.execute_batch("DROP TABLE IF EXISTS definitions_fts;")?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Whether the term index exists and can serve queries.
    pub fn term_index_available(&self) -> Result<bool> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'definitions_fts'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Row count of one table.
    pub fn count(&self, table: Table) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Get statistics about the store contents.
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let mut stats = DatabaseStats {
            files: self.count(Table::Files)?,
            definitions: self.count(Table::Definitions)?,
            references: self.count(Table::Refs)?,
            imports: self.count(Table::Imports)?,
            decorators: self.count(Table::Decorators)?,
            class_bases: self.count(Table::ClassBases)?,
            calls: self.count(Table::Calls)?,
            term_index_available: self.term_index_available()?,
            ..DatabaseStats::default()
        };

        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT kind, COUNT(*) FROM definitions GROUP BY kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            match kind.parse::<DefinitionKind>() {
                Ok(kind) => {
                    stats
                        .definitions_by_kind
                        .insert(kind, usize::try_from(count).unwrap_or_default());
                }
                Err(_) => {
                    tracing::warn!(kind = %kind, count, "Unknown definition kind in store, skipping from stats");
                }
            }
        }

        let last: Option<String> =
            conn.query_row("SELECT MAX(indexed_at) FROM files", [], |row| row.get(0))?;
        stats.last_indexed = last.map(|s| parse_timestamp(&s)).transpose()?;

        Ok(stats)
    }
}
