//! Integration tests for snapshot export, hydration and recovery.

use std::fs;

use sextant::db::snapshot_path;
use sextant::{Error, Sextant, Store, Table};
use tempfile::TempDir;

/// Create a temporary project with the given files.
fn workspace_with_files(files: &[(&str, &str)]) -> (TempDir, Sextant) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("failed to write file");
    }
    let sextant = Sextant::open(dir.path()).expect("failed to open Sextant");
    (dir, sextant)
}

const PROJECT: &[(&str, &str)] = &[
    ("models.py", "class Base:\n    pass\n\n\nclass User(Base):\n    @property\n    def name(self):\n        return 'x'\n"),
    ("app.py", "from models import User\n\n\ndef main():\n    return User()\n"),
];

fn counts(store: &Store) -> Vec<usize> {
    Table::ALL
        .iter()
        .map(|&t| store.count(t).expect("count failed"))
        .collect()
}

fn indexed_project() -> (TempDir, Sextant) {
    let (dir, sextant) = workspace_with_files(PROJECT);
    let stats = sextant.index(&[], false).expect("index failed");
    assert!(stats.snapshot_bytes.is_some_and(|b| b > 0));
    (dir, sextant)
}

// -- Round trip --

#[test]
fn reopening_restores_every_table() {
    let (dir, sextant) = indexed_project();
    let before = counts(sextant.store());
    let definition = sextant
        .get_definition("models.User")
        .expect("lookup failed")
        .expect("User is defined");
    drop(sextant);

    let reopened = Sextant::open(dir.path()).expect("failed to reopen");

    assert_eq!(counts(reopened.store()), before);
    assert_eq!(
        reopened.get_definition("models.User").expect("lookup failed"),
        Some(definition)
    );
    assert!(reopened.store().term_index_available().expect("term index check failed"));
    assert!(!reopened.check_staleness(&[]).expect("staleness failed").is_stale());
}

#[test]
fn ids_resume_after_snapshot_maximum() {
    let (_dir, sextant) = indexed_project();
    let max_id = sextant
        .query("SELECT MAX(id) FROM definitions")
        .expect("query failed")
        .rows[0][0]
        .as_i64()
        .expect("max id is an integer");

    let store = Store::from_snapshot(sextant.index_dir()).expect("failed to load snapshot");

    assert!(store.peek_next_id(Table::Definitions) > max_id);
}

#[test]
fn new_rows_after_reopen_never_reuse_ids() {
    let (dir, sextant) = indexed_project();
    let old_ids: Vec<i64> = sextant
        .query("SELECT id FROM definitions")
        .expect("query failed")
        .rows
        .iter()
        .filter_map(|row| row[0].as_i64())
        .collect();
    drop(sextant);

    fs::write(dir.path().join("extra.py"), "def extra():\n    return 1\n").expect("failed to add file");
    let reopened = Sextant::open(dir.path()).expect("failed to reopen");
    reopened.index(&[], false).expect("reindex failed");

    let (extra, _) = reopened
        .get_definition("extra.extra")
        .expect("lookup failed")
        .expect("extra is defined");
    assert!(old_ids.iter().all(|&id| id < extra.id.as_i64()));
}

#[test]
fn stats_report_snapshot_size() {
    let (_dir, sextant) = indexed_project();

    let stats = sextant.stats().expect("stats failed");

    assert_eq!(stats.files, 2);
    assert!(stats.snapshot_bytes > 0);
    assert!(stats.last_indexed.is_some());
}

// -- Missing and damaged segments --

#[test]
fn missing_optional_segment_loads_empty() {
    let (dir, sextant) = indexed_project();
    let index_dir = sextant.index_dir().to_path_buf();
    assert!(sextant.store().count(Table::Decorators).expect("count failed") > 0);
    drop(sextant);

    fs::remove_file(snapshot_path(&index_dir, Table::Decorators)).expect("failed to delete segment");
    let reopened = Sextant::open(dir.path()).expect("optional segment may be missing");

    assert_eq!(reopened.store().count(Table::Decorators).expect("count failed"), 0);
    assert_eq!(reopened.store().count(Table::Files).expect("count failed"), 2);
}

#[test]
fn missing_required_segment_fails() {
    let (dir, sextant) = indexed_project();
    let index_dir = sextant.index_dir().to_path_buf();
    drop(sextant);

    fs::remove_file(snapshot_path(&index_dir, Table::Definitions)).expect("failed to delete segment");
    let result = Sextant::open(dir.path());

    match result {
        Err(Error::Snapshot { table, .. }) => assert_eq!(table, "definitions"),
        other => panic!("expected snapshot error, got {other:?}"),
    }
}

#[test]
fn corrupt_required_segment_fails() {
    let (dir, sextant) = indexed_project();
    let index_dir = sextant.index_dir().to_path_buf();
    drop(sextant);

    fs::write(snapshot_path(&index_dir, Table::Refs), b"not a snapshot").expect("failed to corrupt segment");

    assert!(matches!(Sextant::open(dir.path()), Err(Error::Snapshot { .. })));
}

#[test]
fn newer_format_version_is_a_schema_mismatch() {
    let (dir, sextant) = indexed_project();
    let index_dir = sextant.index_dir().to_path_buf();
    drop(sextant);

    let mut bytes = b"SXTS".to_vec();
    bytes.extend_from_slice(&99u32.to_le_bytes());
    bytes.extend_from_slice(&4u64.to_le_bytes());
    bytes.extend_from_slice(b"junk");
    fs::write(snapshot_path(&index_dir, Table::Files), bytes).expect("failed to write segment");

    let err = Sextant::open(dir.path()).expect_err("open should fail");
    assert!(err.is_schema_mismatch(), "unexpected error: {err}");
    assert!(err.to_string().contains("reset"));
}

#[test]
fn reset_dir_recovers_from_schema_mismatch() {
    let (dir, sextant) = indexed_project();
    let index_dir = sextant.index_dir().to_path_buf();
    drop(sextant);

    let mut bytes = b"SXTS".to_vec();
    bytes.extend_from_slice(&99u32.to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes());
    fs::write(snapshot_path(&index_dir, Table::Files), bytes).expect("failed to write segment");
    assert!(Sextant::open(dir.path()).is_err());

    let removed = Sextant::reset_dir(&index_dir).expect("reset failed");
    assert_eq!(removed, Table::ALL.len());

    let sextant = Sextant::open(dir.path()).expect("open after reset failed");
    assert_eq!(sextant.store().count(Table::Files).expect("count failed"), 0);
    let stats = sextant.index(&[], false).expect("reindex failed");
    assert_eq!(stats.files_indexed, 2);
}

#[test]
fn reset_empties_store_and_snapshot() {
    let (_dir, sextant) = indexed_project();

    sextant.reset().expect("reset failed");

    for table in Table::ALL {
        assert_eq!(sextant.store().count(table).expect("count failed"), 0);
    }
    assert!(!snapshot_path(sextant.index_dir(), Table::Files).exists());
}

// -- Interrupted export --

#[test]
fn export_stopped_before_files_segment_is_repaired() {
    let (dir, sextant) = workspace_with_files(&[("app.py", "def old_name():\n    return 1\n")]);
    sextant.index(&[], false).expect("index failed");
    let index_dir = sextant.index_dir().to_path_buf();
    let old_files = fs::read(snapshot_path(&index_dir, Table::Files)).expect("failed to read segment");

    fs::write(dir.path().join("app.py"), "def new_name():\n    return 2\n").expect("failed to write file");
    sextant.index(&[], false).expect("reindex failed");
    drop(sextant);

    // Every other segment holds the new analysis; files still holds the old hashes.
    fs::write(snapshot_path(&index_dir, Table::Files), old_files).expect("failed to write segment");
    let reopened = Sextant::open(dir.path()).expect("failed to reopen");

    let report = reopened.check_staleness(&[]).expect("staleness check failed");
    assert_eq!(report.changed, vec!["app.py"]);

    let stats = reopened.index(&[], false).expect("repair run failed");
    assert!(!stats.index_skipped);
    let functions = reopened
        .query("SELECT full_name FROM definitions WHERE kind = 'function'")
        .expect("query failed");
    assert_eq!(functions.rows, vec![vec![serde_json::json!("app.new_name")]]);
}

// -- Snapshot layout --

#[test]
fn segments_share_magic_and_format_header() {
    let (_dir, sextant) = indexed_project();

    for table in Table::ALL {
        let bytes = fs::read(snapshot_path(sextant.index_dir(), table)).expect("segment should exist");
        assert_eq!(&bytes[..4], b"SXTS", "{}", table.name());
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 1);
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[8..16]);
        assert_eq!(u64::from_le_bytes(len) as usize, bytes.len() - 16);
    }
}

#[test]
fn segments_decode_with_plain_zstd_and_json() {
    let (_dir, sextant) = indexed_project();

    let bytes = fs::read(snapshot_path(sextant.index_dir(), Table::Files)).expect("segment should exist");
    let json = zstd::decode_all(&bytes[16..]).expect("payload is zstd");
    let segment: serde_json::Value = serde_json::from_slice(&json).expect("payload is JSON");

    assert_eq!(segment["table"], "files");
    assert_eq!(segment["row_count"], 2);
    let columns = segment["columns"].as_array().expect("columns array");
    assert!(columns.iter().any(|c| c["name"] == "content_hash"));
}
