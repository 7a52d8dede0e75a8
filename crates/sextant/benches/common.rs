//! Shared utilities for Sextant benchmarks.

// Benchmark utilities - pedantic lints not critical here
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use sextant::Sextant;
use tempfile::TempDir;

/// A project ready for benchmarking with Sextant already indexed.
pub struct IndexedProject {
    /// Must be kept alive for the duration of the benchmark.
    pub dir: TempDir,
    /// Sextant instance with the project indexed.
    pub sextant: Sextant,
}

/// Create a temporary project with the given files.
pub fn create_project(files: &[(String, String)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("failed to write file");
    }

    let path = dir.path().to_path_buf();
    (dir, path)
}

/// Create a project, open Sextant, and index it.
pub fn create_indexed_project(files: &[(String, String)]) -> IndexedProject {
    let (dir, path) = create_project(files);
    let sextant = Sextant::open(&path).expect("failed to open Sextant");
    sextant.index(&[], false).expect("index failed");
    IndexedProject { dir, sextant }
}

/// A Python module with a class, methods and cross-module calls.
pub fn generate_python_module(index: usize, num_functions: usize) -> String {
    let mut code = String::new();

    if index > 0 {
        let _ = writeln!(code, "from pkg.module{} import Service{}, helper{}_0\n", index - 1, index - 1, index - 1);
    }

    let base = if index > 0 {
        format!("Service{}", index - 1)
    } else {
        "object".to_string()
    };
    let _ = writeln!(code, "class Service{index}({base}):");
    let _ = writeln!(code, "    \"\"\"Service number {index}.\"\"\"\n");
    let _ = writeln!(code, "    def __init__(self, name, retries=3):");
    let _ = writeln!(code, "        self.name = name");
    let _ = writeln!(code, "        self.retries = retries\n");
    let _ = writeln!(code, "    @property");
    let _ = writeln!(code, "    def label(self):");
    let _ = writeln!(code, "        return self.name.upper()\n");
    let _ = writeln!(code, "    def run(self, items):");
    let _ = writeln!(code, "        total = 0");
    let _ = writeln!(code, "        for item in items:");
    let _ = writeln!(code, "            total += helper{index}_0(len(str(item)))");
    let _ = writeln!(code, "        return total\n");

    for f in 0..num_functions {
        let _ = writeln!(code, "\ndef helper{index}_{f}(value):");
        let _ = writeln!(code, "    \"\"\"Helper {f} of module {index}.\"\"\"");
        if index > 0 && f == 0 {
            let _ = writeln!(code, "    return helper{}_0(value) + {f}", index - 1);
        } else {
            let _ = writeln!(code, "    return max(value, {f})");
        }
    }
    code
}

/// A package of `num_modules` modules, each importing the previous one.
pub fn generate_package(num_modules: usize) -> Vec<(String, String)> {
    let mut files = vec![("pkg/__init__.py".to_string(), String::new())];
    for i in 0..num_modules {
        files.push((format!("pkg/module{i}.py"), generate_python_module(i, 8)));
    }
    files
}
