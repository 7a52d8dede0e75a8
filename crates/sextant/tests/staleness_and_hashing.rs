//! Integration tests for change detection and incremental updates.

use std::fs;
use std::path::PathBuf;

use sextant::Sextant;
use sextant::indexer::content_hash;
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

fn indexed_paths(sextant: &Sextant) -> Vec<String> {
    let mut paths: Vec<String> = sextant
        .store()
        .list_files()
        .expect("list files failed")
        .into_iter()
        .map(|f| f.path)
        .collect();
    paths.sort();
    paths
}

// -- Hashing --

#[test]
fn stored_hash_is_sha256_of_content() {
    let content = "def f():\n    return 1\n";
    let (_dir, sextant) = workspace_with_files(&[("f.py", content)]);
    sextant.index(&[], false).expect("index failed");

    let file = sextant
        .store()
        .get_file("f.py")
        .expect("lookup failed")
        .expect("file is indexed");

    assert_eq!(file.content_hash, content_hash(content.as_bytes()));
    assert_eq!(file.content_hash.len(), 64);
    assert_eq!(file.size, content.len() as u64);
}

#[test]
fn touching_a_file_without_changing_content_is_not_stale() {
    let (dir, sextant) = workspace_with_files(&[("f.py", "x = 1\n")]);
    sextant.index(&[], false).expect("index failed");

    fs::write(dir.path().join("f.py"), "x = 1\n").expect("failed to rewrite file");
    let report = sextant.check_staleness(&[]).expect("staleness failed");

    assert!(!report.is_stale());
}

// -- Staleness --

#[test]
fn fresh_project_reports_everything_added() {
    let (_dir, sextant) = workspace_with_files(&[("b.py", "y = 2\n"), ("a.py", "x = 1\n")]);

    let report = sextant.check_staleness(&[]).expect("staleness failed");

    assert_eq!(report.added, vec!["a.py", "b.py"]);
    assert!(report.changed.is_empty());
    assert!(report.removed.is_empty());
}

#[test]
fn staleness_classifies_changed_added_and_removed() {
    let (dir, sextant) = workspace_with_files(&[
        ("keep.py", "a = 1\n"),
        ("edit.py", "b = 1\n"),
        ("gone.py", "c = 1\n"),
    ]);
    sextant.index(&[], false).expect("index failed");

    fs::write(dir.path().join("edit.py"), "b = 2\n").expect("failed to edit file");
    fs::remove_file(dir.path().join("gone.py")).expect("failed to delete file");
    fs::write(dir.path().join("new.py"), "d = 1\n").expect("failed to add file");

    let report = sextant.check_staleness(&[]).expect("staleness failed");

    assert!(report.is_stale());
    assert_eq!(report.changed, vec!["edit.py"]);
    assert_eq!(report.added, vec!["new.py"]);
    assert_eq!(report.removed, vec!["gone.py"]);
}

#[test]
fn checking_staleness_does_not_write() {
    let (_dir, sextant) = workspace_with_files(&[("a.py", "x = 1\n")]);

    sextant.check_staleness(&[]).expect("staleness failed");

    assert!(indexed_paths(&sextant).is_empty());
    assert!(!sextant.index_dir().join("files.snap").exists());
}

#[test]
fn stale_run_reindexes_everything() {
    let (dir, sextant) = workspace_with_files(&[("a.py", "x = 1\n"), ("b.py", "y = 1\n")]);
    sextant.index(&[], false).expect("index failed");

    fs::write(dir.path().join("a.py"), "x = 2\n").expect("failed to edit file");
    let stats = sextant.index(&[], false).expect("reindex failed");

    assert!(!stats.index_skipped);
    assert_eq!(stats.files_indexed, 2);
    assert!(stats.snapshot_bytes.is_some());
}

#[test]
fn force_reindexes_unchanged_project() {
    let (_dir, sextant) = workspace_with_files(&[("a.py", "x = 1\n")]);
    sextant.index(&[], false).expect("index failed");

    let stats = sextant.index(&[], true).expect("forced run failed");

    assert!(!stats.index_skipped);
    assert_eq!(stats.files_indexed, 1);
}

#[test]
fn skipped_run_does_not_rewrite_snapshot() {
    let (_dir, sextant) = workspace_with_files(&[("a.py", "x = 1\n")]);
    sextant.index(&[], false).expect("index failed");

    let stats = sextant.index(&[], false).expect("second run failed");

    assert!(stats.index_skipped);
    assert!(stats.snapshot_bytes.is_none());
}

// -- Incremental updates --

#[test]
fn apply_changes_handles_edits_creations_and_deletions() {
    let (dir, sextant) = workspace_with_files(&[
        ("a.py", "def helper():\n    return 1\n"),
        ("b.py", "from a import helper\n\n\ndef main():\n    return helper()\n"),
    ]);
    sextant.index(&[], false).expect("index failed");

    fs::remove_file(dir.path().join("a.py")).expect("failed to delete file");
    fs::write(dir.path().join("c.py"), "def other():\n    return 2\n").expect("failed to add file");

    let stats = sextant
        .apply_changes(&[PathBuf::from("a.py"), PathBuf::from("c.py")])
        .expect("apply failed");

    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.files_removed, 1);
    assert!(stats.derived.is_some(), "derived data is rebuilt");
    assert_eq!(indexed_paths(&sextant), vec!["b.py", "c.py"]);

    let calls = sextant.callers_of("a.helper").expect("callers failed");
    assert_eq!(calls.len(), 1);
    let (alias, path) = sextant
        .get_definition("a.helper")
        .expect("lookup failed")
        .expect("the import alias remains");
    assert_eq!(path, "b.py");
    assert_eq!(calls[0].callee_id, Some(alias.id));
}

#[test]
fn apply_changes_with_deleted_directory_drops_its_files() {
    let (dir, sextant) = workspace_with_files(&[
        ("pkg/__init__.py", ""),
        ("pkg/mod.py", "x = 1\n"),
        ("pkgextra.py", "y = 1\n"),
    ]);
    sextant.index(&[], false).expect("index failed");

    fs::remove_dir_all(dir.path().join("pkg")).expect("failed to delete directory");
    let stats = sextant
        .apply_changes(&[sextant.root().join("pkg")])
        .expect("apply failed");

    assert_eq!(stats.files_removed, 2);
    assert_eq!(indexed_paths(&sextant), vec!["pkgextra.py"]);
}

#[test]
fn apply_changes_skips_excluded_paths() {
    let (_dir, sextant) = workspace_with_files(&[("__pycache__/junk.py", "x = 1\n")]);

    let stats = sextant
        .apply_changes(&[PathBuf::from("__pycache__/junk.py")])
        .expect("apply failed");

    assert_eq!(stats.files_indexed, 0);
    assert!(indexed_paths(&sextant).is_empty());
}

#[test]
fn index_file_bypasses_patterns() {
    let (_dir, sextant) = workspace_with_files(&[("app.py", "x = 1\n"), ("tests/test_app.py", "y = 1\n")]);
    let sextant = sextant
        .with_patterns(&[], &["tests/".to_string()])
        .expect("patterns failed");
    sextant.index(&[], false).expect("index failed");
    assert_eq!(indexed_paths(&sextant), vec!["app.py"]);

    let stats = sextant
        .index_file(&sextant.root().join("tests/test_app.py"))
        .expect("index_file failed");

    assert_eq!(stats.files_indexed, 1);
    assert_eq!(indexed_paths(&sextant), vec!["app.py", "tests/test_app.py"]);
}

#[test]
fn index_file_ignores_non_source_files() {
    let (_dir, sextant) = workspace_with_files(&[("notes.txt", "hello\n")]);

    let stats = sextant
        .index_file(&sextant.root().join("notes.txt"))
        .expect("index_file failed");

    assert_eq!(stats.files_indexed, 0);
}

#[test]
fn remove_file_drops_rows_and_reports_absence() {
    let (_dir, sextant) = workspace_with_files(&[("a.py", "def f():\n    return 1\n")]);
    sextant.index(&[], false).expect("index failed");

    assert!(sextant.remove_file("a.py").expect("remove failed"));
    assert!(indexed_paths(&sextant).is_empty());
    assert!(sextant.get_definition("a.f").expect("lookup failed").is_none());

    assert!(!sextant.remove_file("a.py").expect("second remove failed"));
}
