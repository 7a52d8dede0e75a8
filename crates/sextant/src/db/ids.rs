//! Per-table identity allocation.
//!
//! Every insert binds an explicit id taken from the table's allocator. After
//! loading a snapshot each allocator resumes at `max(id) + 1` of the loaded
//! rows; counters are never read from the snapshot itself.

use std::sync::atomic::{AtomicI64, Ordering};

use rusqlite::Connection;

use super::schema::Table;
use crate::error::Result;

/// Monotonic id source for one table.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: AtomicI64,
}

impl IdAllocator {
    fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    /// Take the next id.
    pub(crate) fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next call to [`Self::next_id`] will return.
    pub(crate) fn peek(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }

    fn resume_after(&self, max_id: i64) {
        self.next.store(max_id.max(0) + 1, Ordering::SeqCst);
    }
}

/// One allocator per table.
#[derive(Debug)]
pub(crate) struct IdAllocators {
    files: IdAllocator,
    definitions: IdAllocator,
    refs: IdAllocator,
    imports: IdAllocator,
    decorators: IdAllocator,
    class_bases: IdAllocator,
    calls: IdAllocator,
}

impl IdAllocators {
    /// Allocators for an empty store, all starting at 1.
    pub(crate) fn new() -> Self {
        Self {
            files: IdAllocator::new(),
            definitions: IdAllocator::new(),
            refs: IdAllocator::new(),
            imports: IdAllocator::new(),
            decorators: IdAllocator::new(),
            class_bases: IdAllocator::new(),
            calls: IdAllocator::new(),
        }
    }

    pub(crate) fn get(&self, table: Table) -> &IdAllocator {
        match table {
            Table::Files => &self.files,
            Table::Definitions => &self.definitions,
            Table::Refs => &self.refs,
            Table::Imports => &self.imports,
            Table::Decorators => &self.decorators,
            Table::ClassBases => &self.class_bases,
            Table::Calls => &self.calls,
        }
    }

    /// Resume every allocator from the rows currently in the store.
    pub(crate) fn resume_from(&self, conn: &Connection) -> Result<()> {
        for table in Table::ALL {
            let max_id: i64 = conn.query_row(
                &format!("SELECT COALESCE(MAX(id), 0) FROM {}", table.name()),
                [],
                |row| row.get(0),
            )?;
            self.get(table).resume_after(max_id);
            tracing::debug!(table = table.name(), next_id = max_id + 1, "Resumed id allocator");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::SCHEMA;

    #[test]
    fn allocators_are_independent_and_monotonic() {
        let ids = IdAllocators::new();

        assert_eq!(ids.get(Table::Definitions).next_id(), 1);
        assert_eq!(ids.get(Table::Definitions).next_id(), 2);
        assert_eq!(ids.get(Table::Refs).next_id(), 1);
        assert_eq!(ids.get(Table::Definitions).peek(), 3);
    }

    #[test]
    fn resume_starts_after_highest_id() {
        let conn = Connection::open_in_memory().expect("should open connection");
        conn.execute_batch(SCHEMA).expect("should apply schema");
        conn.execute(
            "INSERT INTO imports (id, file_id, module, line) VALUES (41, 1, 'os', 1)",
            [],
        )
        .expect("should insert import");

        let ids = IdAllocators::new();
        ids.get(Table::Imports).next_id();
        ids.resume_from(&conn).expect("should resume");

        assert_eq!(ids.get(Table::Imports).next_id(), 42);
        assert_eq!(ids.get(Table::Files).next_id(), 1);
    }
}
