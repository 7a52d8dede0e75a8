//! Columnar snapshot export and hydration.
//!
//! Each table is written to `<dir>/<table>.snap`:
//!
//! ```text
//! +--------+----------------+-----------------+---------------------------+
//! | "SXTS" | format (u32 LE)| length (u64 LE) | zstd(JSON table segment)  |
//! +--------+----------------+-----------------+---------------------------+
//! ```
//!
//! The JSON segment stores the table column by column, so any tool that
//! can decompress zstd and read JSON can consume a snapshot without this
//! crate. Id counters are not stored; hydration derives them from the rows.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::Store;
use super::helpers::{json_to_value, value_ref_to_json};
use super::schema::{SCHEMA_VERSION, Table};
use crate::error::{Error, Result};

/// File extension of snapshot segments.
pub const SNAPSHOT_EXTENSION: &str = "snap";

const MAGIC: &[u8; 4] = b"SXTS";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

/// One table, column-oriented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TableSegment {
    table: String,
    schema_version: u32,
    row_count: usize,
    columns: Vec<ColumnData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnData {
    name: String,
    values: Vec<serde_json::Value>,
}

/// Why a segment could not be decoded.
#[derive(Debug)]
enum SegmentError {
    /// Bytes are damaged or truncated
    Corrupt(String),
    /// Written by a different format or schema version
    Incompatible { expected: String, found: String },
}

/// Path of a table's segment inside a snapshot directory.
#[must_use]
pub fn snapshot_path(dir: &Path, table: Table) -> PathBuf {
    dir.join(format!("{}.{SNAPSHOT_EXTENSION}", table.name()))
}

/// Whether `dir` holds a snapshot (its `files` segment exists).
#[must_use]
pub fn has_snapshot(dir: &Path) -> bool {
    snapshot_path(dir, Table::Files).is_file()
}

/// Total size in bytes of the snapshot segments present in `dir`.
#[must_use]
pub fn snapshot_size(dir: &Path) -> u64 {
    Table::ALL
        .iter()
        .filter_map(|&table| std::fs::metadata(snapshot_path(dir, table)).ok())
        .map(|m| m.len())
        .sum()
}

/// Delete every snapshot segment in `dir`. Returns how many were removed.
pub fn remove_snapshot(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for table in Table::ALL {
        let path = snapshot_path(dir, table);
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete snapshot segment");
                return Err(Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to delete {}: {e}", path.display()),
                )));
            }
        }
    }
    Ok(removed)
}

impl Store {
    /// Write every table to `dir` as a compressed columnar segment.
    ///
    /// All segments are written to temporary names first, then renamed into
    /// place with `files` last. Until that final rename the old file hashes
    /// stay on disk, so an interrupted export is reported stale on the next
    /// run. Returns the total number of bytes written.
    pub fn export(&self, dir: &Path, compression_level: i32) -> Result<u64> {
        std::fs::create_dir_all(dir)?;

        let segments = {
            let conn = self.connection()?;
            export_order()
                .map(|table| Ok((table, read_segment(&conn, table)?)))
                .collect::<Result<Vec<_>>>()?
        };

        let mut staged = Vec::with_capacity(segments.len());
        let mut total = 0u64;
        for (table, segment) in segments {
            let bytes = encode_segment(&segment, compression_level)?;
            let path = snapshot_path(dir, table);
            let tmp = temp_path(&path);
            std::fs::write(&tmp, &bytes)?;

            debug!(
                table = table.name(),
                rows = segment.row_count,
                bytes = bytes.len(),
                "Staged snapshot segment"
            );
            total += bytes.len() as u64;
            staged.push((tmp, path));
        }

        for (tmp, path) in staged {
            std::fs::rename(&tmp, &path)?;
        }

        info!(dir = %dir.display(), bytes = total, "Snapshot exported");
        Ok(total)
    }

    /// Load a snapshot into a fresh in-memory store.
    ///
    /// Required tables must be present and readable. Optional tables that
    /// are missing or unreadable are left empty. Rows whose file is not in
    /// the `files` segment are dropped. A segment written under a
    /// different format or schema fails with [`Error::SchemaMismatch`]. Id
    /// allocators resume after the highest loaded id, and the term index is
    /// rebuilt (failure there only degrades search).
    pub fn from_snapshot(dir: &Path) -> Result<Self> {
        let store = Self::open_in_memory()?;

        {
            let mut conn = store.connection()?;
            let tx = conn.transaction()?;

            for table in Table::ALL {
                let Some(segment) = read_segment_file(dir, table)? else {
                    continue;
                };
                let rows = load_segment(&tx, table, &segment)?;
                debug!(table = table.name(), rows, "Loaded snapshot segment");
            }
            prune_orphans(&tx)?;

            tx.commit()?;
            store.ids.resume_from(&conn)?;
        }

        if let Err(e) = store.rebuild_term_index() {
            warn!(error = %e, "Term index rebuild after hydration failed; search will use the fallback");
        }

        info!(dir = %dir.display(), "Snapshot loaded");
        Ok(store)
    }
}

/// Tables in the order their segments are committed. `files` holds the
/// content hashes that staleness is judged by, so it goes last.
fn export_order() -> impl Iterator<Item = Table> {
    Table::ALL
        .into_iter()
        .filter(|&t| t != Table::Files)
        .chain(std::iter::once(Table::Files))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Delete rows that belong to no loaded file.
///
/// These are left behind when an export stopped before `files` was
/// committed; the file they came from is then reported stale.
fn prune_orphans(conn: &Connection) -> Result<usize> {
    let mut pruned = 0;
    for table in Table::ALL.into_iter().filter(|&t| t != Table::Files) {
        let n = conn.execute(
            &format!(
                "DELETE FROM {} WHERE file_id NOT IN (SELECT id FROM files)",
                table.name()
            ),
            [],
        )?;
        if n > 0 {
            warn!(table = table.name(), rows = n, "Dropped rows of files missing from the snapshot");
        }
        pruned += n;
    }
    Ok(pruned)
}

/// Read and decode one segment, applying the required/optional policy.
///
/// `Ok(None)` means the table should stay empty.
fn read_segment_file(dir: &Path, table: Table) -> Result<Option<TableSegment>> {
    let path = snapshot_path(dir, table);

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if table.is_required() => {
            let message = if e.kind() == std::io::ErrorKind::NotFound {
                format!("segment {} is missing", path.display())
            } else {
                format!("cannot read {}: {e}", path.display())
            };
            return Err(Error::Snapshot {
                table: table.name().to_string(),
                message,
            });
        }
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                debug!(table = table.name(), "Segment absent, synthesizing empty table");
            } else {
                warn!(table = table.name(), error = %e, "Cannot read optional segment, leaving table empty");
            }
            return Ok(None);
        }
    };

    match decode_segment(&bytes, table) {
        Ok(segment) => Ok(Some(segment)),
        Err(SegmentError::Incompatible { expected, found }) => Err(Error::SchemaMismatch {
            table: table.name().to_string(),
            expected,
            found,
        }),
        Err(SegmentError::Corrupt(message)) if table.is_required() => Err(Error::Snapshot {
            table: table.name().to_string(),
            message,
        }),
        Err(SegmentError::Corrupt(message)) => {
            warn!(table = table.name(), error = %message, "Optional segment is corrupt, leaving table empty");
            Ok(None)
        }
    }
}

fn read_segment(conn: &Connection, table: Table) -> Result<TableSegment> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY id", table.name()))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut columns: Vec<ColumnData> = names
        .into_iter()
        .map(|name| ColumnData {
            name,
            values: Vec::new(),
        })
        .collect();

    let mut row_count = 0;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for (i, column) in columns.iter_mut().enumerate() {
            column.values.push(value_ref_to_json(row.get_ref(i)?));
        }
        row_count += 1;
    }

    Ok(TableSegment {
        table: table.name().to_string(),
        schema_version: SCHEMA_VERSION,
        row_count,
        columns,
    })
}

fn encode_segment(segment: &TableSegment, compression_level: i32) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(segment)
        .map_err(|e| Error::Internal(format!("failed to serialize {}: {e}", segment.table)))?;
    let payload = zstd::encode_all(json.as_slice(), compression_level)?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode_segment(bytes: &[u8], table: Table) -> std::result::Result<TableSegment, SegmentError> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(SegmentError::Corrupt("not a snapshot segment".to_string()));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(SegmentError::Incompatible {
            expected: format!("format {FORMAT_VERSION}"),
            found: format!("format {version}"),
        });
    }

    let mut length = [0u8; 8];
    length.copy_from_slice(&bytes[8..HEADER_LEN]);
    let length = u64::from_le_bytes(length);
    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != length {
        return Err(SegmentError::Corrupt(format!(
            "truncated payload: header says {length} bytes, found {}",
            payload.len()
        )));
    }

    let json = zstd::decode_all(payload)
        .map_err(|e| SegmentError::Corrupt(format!("decompression failed: {e}")))?;
    let segment: TableSegment = serde_json::from_slice(&json)
        .map_err(|e| SegmentError::Corrupt(format!("invalid segment: {e}")))?;

    if segment.schema_version != SCHEMA_VERSION {
        return Err(SegmentError::Incompatible {
            expected: format!("schema {SCHEMA_VERSION}"),
            found: format!("schema {}", segment.schema_version),
        });
    }
    if segment.table != table.name() {
        return Err(SegmentError::Corrupt(format!(
            "segment holds table '{}'",
            segment.table
        )));
    }
    if let Some(column) = segment
        .columns
        .iter()
        .find(|c| c.values.len() != segment.row_count)
    {
        return Err(SegmentError::Corrupt(format!(
            "column '{}' has {} values for {} rows",
            column.name,
            column.values.len(),
            segment.row_count
        )));
    }

    Ok(segment)
}

/// Insert a decoded segment, checking its columns against the live schema.
fn load_segment(conn: &Connection, table: Table, segment: &TableSegment) -> Result<usize> {
    let live = live_columns(conn, table)?;
    let mismatch = |found: String| Error::SchemaMismatch {
        table: table.name().to_string(),
        expected: format!(
            "columns {}",
            live.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        ),
        found,
    };

    if let Some(unknown) = segment
        .columns
        .iter()
        .find(|c| !live.iter().any(|l| l.name == c.name))
    {
        return Err(mismatch(format!("unknown column '{}'", unknown.name)));
    }
    if let Some(missing) = live
        .iter()
        .filter(|l| l.required)
        .find(|l| !segment.columns.iter().any(|c| c.name == l.name))
    {
        return Err(mismatch(format!("missing column '{}'", missing.name)));
    }
    if segment.columns.is_empty() || segment.row_count == 0 {
        return Ok(0);
    }

    let names: Vec<&str> = segment.columns.iter().map(|c| c.name.as_str()).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name(),
        names.join(", "),
        placeholders.join(", ")
    ))?;

    let corrupt = |message: String| Error::Snapshot {
        table: table.name().to_string(),
        message,
    };
    for row in 0..segment.row_count {
        let values = segment
            .columns
            .iter()
            .map(|c| {
                json_to_value(&c.values[row]).ok_or_else(|| {
                    corrupt(format!("column '{}' row {row} is not a scalar", c.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        stmt.execute(rusqlite::params_from_iter(values))
            .map_err(|e| corrupt(format!("row {row}: {e}")))?;
    }

    Ok(segment.row_count)
}

struct LiveColumn {
    name: String,
    /// NOT NULL without a default: a segment must supply it
    required: bool,
}

fn live_columns(conn: &Connection, table: Table) -> Result<Vec<LiveColumn>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table.name()))?;
    let columns = stmt
        .query_map([], |row| {
            let not_null: bool = row.get(3)?;
            let default: Option<String> = row.get(4)?;
            let pk: i64 = row.get(5)?;
            Ok(LiveColumn {
                name: row.get(1)?,
                required: (not_null && default.is_none()) || pk > 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}
