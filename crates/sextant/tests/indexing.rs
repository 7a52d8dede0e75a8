//! Integration tests for indexing Python projects end to end.
//!
//! Covers the derived data the consistency builder produces (call graph,
//! parent links, class bases) and the per-file failure policy.

use std::fs;
use std::path::PathBuf;

use sextant::{DefinitionKind, IndexErrorKind, Sextant, Table};
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

fn count(sextant: &Sextant, table: Table) -> usize {
    sextant.store().count(table).expect("count failed")
}

// -- Call graph --

const HELPER: &str = "def helper():\n    return 1\n";
const CALLER: &str = "from a import helper\n\n\ndef main():\n    return helper()\n";

#[test]
fn cross_file_call_resolves_callee() {
    let (_dir, sextant) = workspace_with_files(&[("a.py", HELPER), ("b.py", CALLER)]);

    let stats = sextant.index(&[], false).expect("index failed");
    assert_eq!(stats.files_indexed, 2);
    assert!(stats.errors.is_empty(), "unexpected errors: {:?}", stats.errors);

    let calls = sextant.callers_of("a.helper").expect("callers failed");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].callee_name, "helper");
    assert_eq!(calls[0].caller_full_name, "b.main");

    let (helper, path) = sextant
        .get_definition("a.helper")
        .expect("lookup failed")
        .expect("helper is defined");
    assert_eq!(path, "a.py");
    assert_eq!(helper.kind, DefinitionKind::Function);
    assert_eq!(calls[0].callee_id, Some(helper.id));
}

#[test]
fn emptied_callee_file_drops_stale_callee_link() {
    let (dir, sextant) = workspace_with_files(&[("a.py", HELPER), ("b.py", CALLER)]);
    sextant.index(&[], false).expect("index failed");
    let old_id = sextant.callers_of("a.helper").expect("callers failed")[0]
        .callee_id
        .expect("callee linked");

    fs::write(dir.path().join("a.py"), "").expect("failed to empty file");
    let stats = sextant.index(&[], false).expect("reindex failed");
    assert_eq!(stats.files_indexed, 2);

    let calls = sextant.callers_of("a.helper").expect("callers failed");
    assert_eq!(calls.len(), 1, "the call site itself remains");
    assert_ne!(calls[0].callee_id, Some(old_id));

    let stale: Vec<_> = sextant
        .query(&format!("SELECT id FROM calls WHERE callee_id = {}", old_id.as_i64()))
        .expect("query failed")
        .rows;
    assert!(stale.is_empty());
}

#[test]
fn deleted_callee_file_is_cleaned_up() {
    let (dir, sextant) = workspace_with_files(&[("a.py", HELPER), ("b.py", CALLER)]);
    sextant.index(&[], false).expect("index failed");

    fs::remove_file(dir.path().join("a.py")).expect("failed to delete file");
    let stats = sextant.index(&[], false).expect("reindex failed");

    assert_eq!(stats.files_removed, 1);
    assert!(sextant.store().get_file("a.py").expect("lookup failed").is_none());
    let functions = sextant
        .query("SELECT full_name FROM definitions WHERE kind = 'function'")
        .expect("query failed");
    assert_eq!(functions.rows, vec![vec![serde_json::json!("b.main")]]);
}

#[test]
fn innermost_function_owns_each_call() {
    let (_dir, sextant) = workspace_with_files(&[(
        "app.py",
        "def outer():\n    def inner():\n        return work()\n    return inner()\n\n\ndef work():\n    return 0\n",
    )]);
    sextant.index(&[], false).expect("index failed");

    let work = sextant.callers_of("app.work").expect("callers failed");
    assert_eq!(work.len(), 1);
    assert_eq!(work[0].caller_full_name, "app.outer.inner");

    let inner = sextant.callers_of("app.outer.inner").expect("callers failed");
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].caller_full_name, "app.outer");
}

#[test]
fn call_tree_follows_callees() {
    let (_dir, sextant) = workspace_with_files(&[(
        "app.py",
        "def a():\n    return b()\n\n\ndef b():\n    return c()\n\n\ndef c():\n    return len([])\n",
    )]);
    sextant.index(&[], false).expect("index failed");

    let tree = sextant.calls_from("app.a", 3, false).expect("call tree failed");

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].call.callee_full_name.as_deref(), Some("app.b"));
    let c = &tree[0].children[0];
    assert_eq!(c.call.callee_full_name.as_deref(), Some("app.c"));
    let len = &c.children[0];
    assert_eq!(len.call.callee_full_name.as_deref(), Some("builtins.len"));
    assert!(len.call.callee_id.is_none(), "builtins are not indexed");
}

// -- Inheritance --

#[test]
fn class_base_links_to_imported_class() {
    let (_dir, sextant) = workspace_with_files(&[
        ("models.py", "class BaseModel:\n    pass\n"),
        ("app.py", "from models import BaseModel\n\n\nclass User(BaseModel):\n    pass\n"),
    ]);
    sextant.index(&[], false).expect("index failed");

    let bases = sextant.bases_of("User").expect("bases failed");
    assert_eq!(bases.len(), 1);
    assert_eq!(bases[0].base_name, "BaseModel");
    assert_eq!(bases[0].position, 0);
    assert_eq!(bases[0].base_full_name.as_deref(), Some("models.BaseModel"));

    let (user, _) = sextant
        .get_definition("app.User")
        .expect("lookup failed")
        .expect("User is defined");
    assert_eq!(bases[0].class_id, user.id);

    let (base, _) = sextant
        .get_definition("models.BaseModel")
        .expect("lookup failed")
        .expect("BaseModel is defined");
    assert_eq!(base.kind, DefinitionKind::Class);
    assert_eq!(bases[0].base_id, Some(base.id));

    let subclasses = sextant.subclasses_of("models.BaseModel").expect("subclasses failed");
    assert_eq!(subclasses, vec![("app.User".to_string(), "app.py".to_string())]);
}

// -- Definitions --

#[test]
fn methods_link_to_their_class() {
    let (_dir, sextant) = workspace_with_files(&[(
        "pkg/models.py",
        "class User:\n    \"\"\"A user.\"\"\"\n\n    @property\n    def name(self):\n        return self._name\n\n    def save(self, force=False):\n        pass\n",
    )]);
    sextant.index(&[], false).expect("index failed");

    let (user, _) = sextant
        .get_definition("pkg.models.User")
        .expect("lookup failed")
        .expect("User is defined");
    assert_eq!(user.docstring.as_deref(), Some("A user."));

    let (save, _) = sextant
        .get_definition("pkg.models.User.save")
        .expect("lookup failed")
        .expect("save is defined");
    assert_eq!(save.parent_id, Some(user.id));
    assert_eq!(save.signature.as_deref(), Some("save(self, force=False)"));

    let (name, _) = sextant
        .get_definition("pkg.models.User.name")
        .expect("lookup failed")
        .expect("name is defined");
    assert_eq!(name.kind, DefinitionKind::Property);
    let decorators = sextant.decorators_of(name.id).expect("decorators failed");
    assert_eq!(decorators.len(), 1);
    assert_eq!(decorators[0].name, "property");
}

#[test]
fn imports_and_references_are_stored_per_file() {
    let (_dir, sextant) = workspace_with_files(&[
        ("pkg/__init__.py", ""),
        ("pkg/util.py", "def tidy(x):\n    return x\n"),
        (
            "pkg/app.py",
            "import os\nfrom .util import tidy as clean\n\n\ndef run():\n    return clean(os.getcwd())\n",
        ),
    ]);
    sextant.index(&[], false).expect("index failed");
    let file = sextant
        .store()
        .get_file("pkg/app.py")
        .expect("lookup failed")
        .expect("app is indexed");

    let imports = sextant.store().imports_in_file(file.id).expect("imports failed");
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].module, "os");
    assert_eq!(imports[1].module, "pkg.util");
    assert_eq!(imports[1].name.as_deref(), Some("tidy"));
    assert_eq!(imports[1].alias.as_deref(), Some("clean"));

    let references = sextant.store().references_in_file(file.id).expect("references failed");
    let clean = references
        .iter()
        .find(|r| r.name == "clean")
        .expect("clean is referenced");
    assert!(clean.is_call);
    assert_eq!(clean.target_full_name.as_deref(), Some("pkg.util.tidy"));
    assert_eq!(clean.context, "return clean(os.getcwd())");
}

// -- Idempotence and cascade --

#[test]
fn forced_reindex_yields_identical_counts() {
    let (_dir, sextant) = workspace_with_files(&[
        ("a.py", HELPER),
        ("b.py", CALLER),
        ("models.py", "class Base:\n    pass\n\n\nclass User(Base):\n    @staticmethod\n    def make():\n        return User()\n"),
    ]);
    sextant.index(&[], false).expect("index failed");
    let before: Vec<usize> = Table::ALL.iter().map(|&t| count(&sextant, t)).collect();

    let stats = sextant.index(&[], true).expect("reindex failed");
    let after: Vec<usize> = Table::ALL.iter().map(|&t| count(&sextant, t)).collect();

    assert_eq!(stats.files_indexed, 3);
    assert_eq!(before, after);

    let skipped = sextant.index(&[], false).expect("third run failed");
    assert_eq!(skipped.files_indexed, 0);
    assert_eq!(skipped.files_skipped, 3);
    assert_eq!(before, Table::ALL.iter().map(|&t| count(&sextant, t)).collect::<Vec<_>>());
}

#[test]
fn removing_every_file_leaves_no_rows() {
    let (dir, sextant) = workspace_with_files(&[
        ("a.py", HELPER),
        ("models.py", "class Base:\n    pass\n\n\nclass User(Base):\n    @staticmethod\n    def make():\n        return User()\n"),
    ]);
    sextant.index(&[], false).expect("index failed");
    assert!(count(&sextant, Table::Calls) > 0);

    fs::remove_file(dir.path().join("a.py")).expect("failed to delete file");
    fs::remove_file(dir.path().join("models.py")).expect("failed to delete file");
    sextant.index(&[], false).expect("reindex failed");

    for table in Table::ALL {
        assert_eq!(count(&sextant, table), 0, "{} not empty", table.name());
    }
}

// -- Scope --

#[test]
fn explicit_paths_limit_discovery() {
    let (_dir, sextant) = workspace_with_files(&[
        ("src/app.py", "x = 1\n"),
        ("scripts/tool.py", "y = 2\n"),
    ]);

    let stats = sextant
        .index(&[PathBuf::from("src")], false)
        .expect("index failed");

    assert_eq!(stats.files_indexed, 1);
    assert!(sextant.store().get_file("src/app.py").expect("lookup failed").is_some());
    assert!(sextant.store().get_file("scripts/tool.py").expect("lookup failed").is_none());
}

#[test]
fn configured_excludes_are_honored() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    fs::create_dir_all(dir.path().join(".sextant")).expect("failed to create index dir");
    fs::write(dir.path().join(".sextant/config.yaml"), "exclude:\n  - test_\n")
        .expect("failed to write config");
    fs::write(dir.path().join("app.py"), "x = 1\n").expect("failed to write file");
    fs::write(dir.path().join("test_app.py"), "y = 1\n").expect("failed to write file");

    let sextant = Sextant::open(dir.path()).expect("failed to open Sextant");
    let stats = sextant.index(&[], false).expect("index failed");

    assert_eq!(stats.files_indexed, 1);
    assert!(sextant.store().get_file("test_app.py").expect("lookup failed").is_none());
}

#[test]
fn cli_patterns_add_to_configured_ones() {
    let (_dir, sextant) = workspace_with_files(&[
        ("app.py", "x = 1\n"),
        ("vendor/lib.py", "y = 1\n"),
    ]);
    let sextant = sextant
        .with_patterns(&[], &["vendor/".to_string()])
        .expect("patterns failed");

    let stats = sextant.index(&[], false).expect("index failed");

    assert_eq!(stats.files_indexed, 1);
}

// -- Per-file failures --

#[test]
fn invalid_utf8_is_reported_and_run_continues() {
    let (dir, sextant) = workspace_with_files(&[("good.py", "x = 1\n")]);
    fs::write(dir.path().join("bad.py"), [0x78, 0x20, 0x3d, 0x20, 0xff, 0xfe, 0x0a])
        .expect("failed to write file");

    let stats = sextant.index(&[], false).expect("index failed");

    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.errors.len(), 1);
    assert_eq!(stats.errors[0].path, PathBuf::from("bad.py"));
    assert_eq!(stats.errors[0].kind, IndexErrorKind::EncodingError);
    assert!(stats.errors[0].kind.is_input_error());
}

#[test]
fn syntax_errors_still_index_what_parses() {
    let (_dir, sextant) = workspace_with_files(&[(
        "broken.py",
        "def ok():\n    return 1\n\ndef broken(:\n    pass\n",
    )]);

    let stats = sextant.index(&[], false).expect("index failed");

    assert!(stats.errors.is_empty());
    assert!(sextant.get_definition("broken.ok").expect("lookup failed").is_some());
}
