//! Call graph storage and traversal.
//!
//! Rows here are derived: the consistency builder deletes and regenerates
//! all of them from call references after every change.

use std::collections::HashSet;

use rusqlite::{Connection, params};

use super::Store;
use super::helpers::{CALLS_COLUMNS, row_to_call};
use super::ids::IdAllocator;
use crate::error::Result;
use crate::types::{Call, CallNode};

/// A call site before insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewCall {
    pub file_id: i64,
    pub caller_full_name: String,
    pub caller_id: i64,
    pub callee_full_name: Option<String>,
    pub callee_id: Option<i64>,
    pub callee_name: String,
    pub line: u32,
    pub col: u32,
    pub context: String,
    pub call_order: u32,
    pub call_depth: u32,
}

/// Insert derived call rows.
pub(crate) fn insert_calls(conn: &Connection, ids: &IdAllocator, calls: &[NewCall]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO calls (id, file_id, caller_full_name, caller_id, callee_full_name, callee_id,
             callee_name, line, col, context, call_order, call_depth)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;

    for call in calls {
        stmt.execute(params![
            ids.next_id(),
            call.file_id,
            call.caller_full_name,
            call.caller_id,
            call.callee_full_name,
            call.callee_id,
            call.callee_name,
            call.line,
            call.col,
            call.context,
            call.call_order,
            call.call_depth,
        ])?;
    }

    Ok(calls.len())
}

impl Store {
    /// Calls made by a definition, in execution order.
    ///
    /// With `top_level_only`, calls nested inside other calls' arguments
    /// are left out.
    pub fn calls_from(&self, caller_full_name: &str, top_level_only: bool) -> Result<Vec<Call>> {
        let conn = self.connection()?;
        let depth_filter = if top_level_only {
            "AND call_depth = 1"
        } else {
            ""
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {CALLS_COLUMNS} FROM calls
             WHERE caller_full_name = ?1 {depth_filter}
             ORDER BY call_order, line, col, id"
        ))?;

        let calls = stmt
            .query_map([caller_full_name], row_to_call)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(calls)
    }

    /// Call sites whose resolved callee is `callee_full_name`.
    pub fn callers_of(&self, callee_full_name: &str) -> Result<Vec<Call>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CALLS_COLUMNS} FROM calls
             WHERE callee_full_name = ?1
             ORDER BY caller_full_name, line, col"
        ))?;

        let calls = stmt
            .query_map([callee_full_name], row_to_call)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(calls)
    }

    /// Calls made by a definition, expanded into the callees' own calls down
    /// to `max_depth` levels. A callee already on the current path is not
    /// expanded again.
    pub fn call_tree(
        &self,
        caller_full_name: &str,
        max_depth: usize,
        top_level_only: bool,
    ) -> Result<Vec<CallNode>> {
        let mut path = HashSet::new();
        path.insert(caller_full_name.to_string());
        self.call_tree_inner(caller_full_name, max_depth, top_level_only, &mut path)
    }

    fn call_tree_inner(
        &self,
        caller_full_name: &str,
        depth_left: usize,
        top_level_only: bool,
        path: &mut HashSet<String>,
    ) -> Result<Vec<CallNode>> {
        if depth_left == 0 {
            return Ok(Vec::new());
        }

        let mut nodes = Vec::new();
        for call in self.calls_from(caller_full_name, top_level_only)? {
            let children = match call.callee_full_name.clone() {
                Some(callee) if !path.contains(&callee) => {
                    path.insert(callee.clone());
                    let children =
                        self.call_tree_inner(&callee, depth_left - 1, top_level_only, path)?;
                    path.remove(&callee);
                    children
                }
                _ => Vec::new(),
            };
            nodes.push(CallNode { call, children });
        }
        Ok(nodes)
    }
}
