//! Derived data: parent links, reference links, the call graph and the
//! term index.
//!
//! Every pass is a full rebuild over the whole store. Running it twice gives
//! the same result as running it once, so a run interrupted before this
//! point is repaired by the next one.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::{LONGEST_BODY_FIRST, NewCall, Store, Table, insert_calls};
use crate::error::Result;
use crate::types::DerivedStats;

/// Rebuild all derived data.
///
/// Parent links, reference links, base links and the call graph are written
/// in one transaction. The term index is rebuilt afterwards; a failure there
/// is logged and reported in [`DerivedStats::term_index_ready`] only.
pub fn rebuild(store: &Store) -> Result<DerivedStats> {
    let mut stats = {
        let mut conn = store.connection()?;
        let tx = conn.transaction()?;

        let parents_linked = link_parents(&tx)?;
        let (references_linked, bases_linked) = link_targets(&tx)?;
        let calls_built = rebuild_calls(&tx, store)?;

        tx.commit()?;
        DerivedStats {
            parents_linked,
            references_linked,
            bases_linked,
            calls_built,
            term_index_ready: false,
        }
    };

    stats.term_index_ready = match store.rebuild_term_index() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Term index rebuild failed; search will use substring matching");
            false
        }
    };

    info!(
        parents = stats.parents_linked,
        references = stats.references_linked,
        bases = stats.bases_linked,
        calls = stats.calls_built,
        term_index = stats.term_index_ready,
        "Derived data rebuilt"
    );
    Ok(stats)
}

/// Set `parent_id` from `parent_full_name`, same file only.
fn link_parents(conn: &Connection) -> Result<usize> {
    conn.execute("UPDATE definitions SET parent_id = NULL", [])?;
    conn.execute(
        "UPDATE definitions SET parent_id = (
             SELECT p.id FROM definitions p
             WHERE p.full_name = definitions.parent_full_name
               AND p.file_id = definitions.file_id
             ORDER BY p.id
             LIMIT 1
         )
         WHERE parent_full_name IS NOT NULL",
        [],
    )?;

    let linked = count(conn, "SELECT COUNT(*) FROM definitions WHERE parent_id IS NOT NULL")?;
    debug!(linked, "Linked definitions to parents");
    Ok(linked)
}

/// Set `refs.definition_id` and `class_bases.base_id` across files.
fn link_targets(conn: &Connection) -> Result<(usize, usize)> {
    conn.execute("UPDATE refs SET definition_id = NULL", [])?;
    conn.execute(
        &format!(
            "UPDATE refs SET definition_id = (
                 SELECT d.id FROM definitions d
                 WHERE d.full_name = refs.target_full_name
                 ORDER BY {LONGEST_BODY_FIRST}
                 LIMIT 1
             )
             WHERE target_full_name IS NOT NULL"
        ),
        [],
    )?;

    conn.execute(
        &format!(
            "UPDATE class_bases SET base_id = (
                 SELECT d.id FROM definitions d
                 WHERE d.kind = 'class' AND d.full_name = class_bases.base_full_name
                 ORDER BY {LONGEST_BODY_FIRST}
                 LIMIT 1
             )"
        ),
        [],
    )?;

    let references = count(conn, "SELECT COUNT(*) FROM refs WHERE definition_id IS NOT NULL")?;
    let bases = count(conn, "SELECT COUNT(*) FROM class_bases WHERE base_id IS NOT NULL")?;
    debug!(references, bases, "Linked references and class bases");
    Ok((references, bases))
}

/// Regenerate every call row from call references.
///
/// The caller is the function or class in the same file with the smallest
/// line range containing the call. Calls outside any such range produce no
/// row. Unresolved targets keep a row with a null callee.
fn rebuild_calls(conn: &Connection, store: &Store) -> Result<usize> {
    conn.execute("DELETE FROM calls", [])?;

    let mut stmt = conn.prepare(&format!(
        "WITH candidates AS (
             SELECT r.id AS ref_id, r.file_id, r.name, r.line, r.col, r.context,
                    r.target_full_name, r.call_order, r.call_depth,
                    c.id AS caller_id, c.full_name AS caller_full_name,
                    ROW_NUMBER() OVER (
                        PARTITION BY r.id
                        ORDER BY COALESCE(c.end_line, 999999) - c.line ASC, c.line DESC, c.id ASC
                    ) AS rn
             FROM refs r
             JOIN definitions c
               ON c.file_id = r.file_id
              AND c.kind IN ('function', 'class')
              AND r.line BETWEEN c.line AND COALESCE(c.end_line, 999999)
             WHERE r.is_call = 1
         )
         SELECT k.file_id, k.caller_full_name, k.caller_id, k.target_full_name,
                (SELECT d.id FROM definitions d
                 WHERE d.full_name = k.target_full_name
                 ORDER BY {LONGEST_BODY_FIRST}
                 LIMIT 1),
                k.name, k.line, k.col, k.context, k.call_order, k.call_depth
         FROM candidates k
         WHERE k.rn = 1
         ORDER BY k.ref_id"
    ))?;

    let calls = stmt
        .query_map([], |row| {
            Ok(NewCall {
                file_id: row.get(0)?,
                caller_full_name: row.get(1)?,
                caller_id: row.get(2)?,
                callee_full_name: row.get(3)?,
                callee_id: row.get(4)?,
                callee_name: row.get(5)?,
                line: row.get(6)?,
                col: row.get(7)?,
                context: row.get(8)?,
                call_order: row.get(9)?,
                call_depth: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let built = insert_calls(conn, store.ids().get(Table::Calls), &calls)?;
    debug!(calls = built, "Rebuilt call graph");
    Ok(built)
}

fn count(conn: &Connection, sql: &str) -> Result<usize> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(usize::try_from(n).unwrap_or_default())
}
