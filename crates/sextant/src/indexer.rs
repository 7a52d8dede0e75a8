//! Indexing runs: discovery, staleness, per-file replacement and cleanup.
//!
//! ```text
//! Discover ─► CheckStaleness ─┬─► skip (nothing stale, not forced)
//!                             └─► ReindexAll ─► Cleanup ─► Rebuild
//! ```
//!
//! Re-indexing is all-or-nothing: when any file is stale, every discovered
//! file is analyzed again, because one changed file can change what names
//! in other files resolve to.
//!
//! Within a chunk of `batch_size` files, analysis runs in parallel with
//! rayon and the writes happen sequentially on the calling thread, one
//! transaction per file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::analyzer::{AnalysisRequest, Analyzer, FileAnalysis};
use crate::config::Config;
use crate::consistency;
use crate::db::{FileRecord, Store};
use crate::error::{IndexError, Result};
use crate::paths::{self, PathFilter};
use crate::types::{IndexStats, StalenessReport};

/// SHA-256 of file content as lowercase hex.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// One file, analyzed and ready to write.
#[derive(Debug)]
struct ParsedFile {
    relative_path: String,
    content_hash: String,
    size: u64,
    modified_at: Option<DateTime<Utc>>,
    analysis: FileAnalysis,
}

/// Drives indexing runs against one store.
pub struct Indexer<'a> {
    root: &'a Path,
    store: &'a Store,
    analyzer: &'a dyn Analyzer,
    config: &'a Config,
    filter: &'a PathFilter,
}

impl<'a> Indexer<'a> {
    /// Bind the pieces of one run.
    pub fn new(
        root: &'a Path,
        store: &'a Store,
        analyzer: &'a dyn Analyzer,
        config: &'a Config,
        filter: &'a PathFilter,
    ) -> Self {
        Self {
            root,
            store,
            analyzer,
            config,
            filter,
        }
    }

    /// Compare disk against the index without changing anything.
    ///
    /// `paths` narrows discovery the same way it does for [`Indexer::index`].
    pub fn check_staleness(&self, paths: &[PathBuf]) -> Result<StalenessReport> {
        let discovery = paths::discover(self.root, paths, self.filter)?;
        self.staleness_of(&discovery.files)
    }

    /// Run a full indexing pass.
    ///
    /// Returns without writing when nothing is stale and `force` is false.
    pub fn index(&self, paths: &[PathBuf], force: bool) -> Result<IndexStats> {
        let start = Instant::now();
        let discovery = paths::discover(self.root, paths, self.filter)?;
        let mut stats = IndexStats {
            directories_skipped: discovery.directories_skipped,
            ..IndexStats::default()
        };

        let report = self.staleness_of(&discovery.files)?;
        if !force && !report.is_stale() {
            stats.files_skipped = discovery.files.len();
            stats.index_skipped = true;
            stats.duration = start.elapsed();
            info!(files = stats.files_skipped, "Index is up to date");
            return Ok(stats);
        }

        debug!(
            changed = report.changed.len(),
            added = report.added.len(),
            removed = report.removed.len(),
            force,
            "Re-indexing all discovered files"
        );

        let processed = self.write_files(&discovery.files, &mut stats);
        stats.files_removed = self.remove_unprocessed(&processed)?;

        if stats.changed_store() {
            stats.derived = Some(consistency::rebuild(self.store)?);
        }

        stats.duration = start.elapsed();
        info!(
            indexed = stats.files_indexed,
            removed = stats.files_removed,
            errors = stats.errors.len(),
            duration_ms = stats.duration.as_millis(),
            "Indexing complete"
        );
        Ok(stats)
    }

    /// Apply a batch of changed paths, as reported by a file watcher.
    ///
    /// Paths that exist and pass the filter are re-indexed, paths that no
    /// longer exist are removed (with everything indexed under them when
    /// the path was a directory). Derived data is rebuilt once at the end.
    pub fn apply_changes(&self, paths: &[PathBuf]) -> Result<IndexStats> {
        self.apply(paths, |rel| self.filter.accepts(rel))
    }

    /// Re-index one explicit file, bypassing include/exclude patterns.
    pub fn index_file(&self, path: &Path) -> Result<IndexStats> {
        self.apply(&[path.to_path_buf()], |rel| self.filter.is_source(rel))
    }

    /// Drop one file from the index and rebuild derived data.
    ///
    /// Returns `false` when the path was not indexed.
    pub fn remove_file(&self, relative_path: &str) -> Result<bool> {
        if !self.store.delete_file_by_path(relative_path)? {
            return Ok(false);
        }
        consistency::rebuild(self.store)?;
        Ok(true)
    }

    fn apply(&self, paths: &[PathBuf], wanted: impl Fn(&str) -> bool) -> Result<IndexStats> {
        let start = Instant::now();
        let mut stats = IndexStats::default();
        let mut to_index = Vec::new();
        let mut to_remove = Vec::new();

        for path in paths {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                self.root.join(path)
            };
            let Some(rel) = paths::relative_path(self.root, &absolute) else {
                warn!(path = %absolute.display(), "Path is outside the source root, skipping");
                continue;
            };

            if absolute.is_file() {
                if wanted(&rel) {
                    to_index.push(rel);
                } else {
                    debug!(path = %rel, "Path is filtered out, skipping");
                }
            } else if !absolute.exists() {
                to_remove.push(rel);
            }
        }
        to_index.sort();
        to_index.dedup();

        self.write_files(&to_index, &mut stats);
        stats.files_removed = self.remove_under(&to_remove)?;

        if stats.changed_store() {
            stats.derived = Some(consistency::rebuild(self.store)?);
        }
        stats.duration = start.elapsed();
        debug!(
            indexed = stats.files_indexed,
            removed = stats.files_removed,
            errors = stats.errors.len(),
            "Applied changes"
        );
        Ok(stats)
    }

    /// Hash every file in parallel and compare with the stored hashes.
    ///
    /// A file that cannot be read counts as changed (or added), so the next
    /// run analyzes it and reports the failure.
    fn staleness_of(&self, files: &[String]) -> Result<StalenessReport> {
        let stored = self.store.file_hashes()?;

        let hashes: Vec<(&String, Option<String>)> = files
            .par_iter()
            .map(|rel| {
                let hash = match std::fs::read(self.root.join(rel)) {
                    Ok(content) => Some(content_hash(&content)),
                    Err(e) => {
                        debug!(path = %rel, error = %e, "Cannot hash file");
                        None
                    }
                };
                (rel, hash)
            })
            .collect();

        let mut report = StalenessReport::default();
        for (rel, hash) in hashes {
            match stored.get(rel) {
                None => report.added.push(rel.clone()),
                Some(old) if hash.as_ref() != Some(old) => report.changed.push(rel.clone()),
                Some(_) => {}
            }
        }

        let discovered: HashSet<&str> = files.iter().map(String::as_str).collect();
        report.removed = stored
            .into_keys()
            .filter(|path| !discovered.contains(path.as_str()))
            .collect();
        report.removed.sort();

        Ok(report)
    }

    /// Analyze and write files chunk by chunk. Returns every path that was
    /// attempted, including those that failed.
    fn write_files(&self, files: &[String], stats: &mut IndexStats) -> HashSet<String> {
        let mut processed = HashSet::with_capacity(files.len());

        for chunk in files.chunks(self.config.batch_size.max(1)) {
            let parsed: Vec<std::result::Result<ParsedFile, IndexError>> =
                chunk.par_iter().map(|rel| self.parse_file(rel)).collect();

            for (rel, outcome) in chunk.iter().zip(parsed) {
                processed.insert(rel.clone());
                match outcome.and_then(|file| self.write_file(&file, stats)) {
                    Ok(()) => stats.files_indexed += 1,
                    Err(e) => {
                        warn!(path = %rel, error = %e.message, kind = %e.kind, "Failed to index file");
                        stats.errors.push(e);
                    }
                }
            }
        }

        processed
    }

    fn parse_file(&self, relative_path: &str) -> std::result::Result<ParsedFile, IndexError> {
        let path = self.root.join(relative_path);
        let content =
            std::fs::read(&path).map_err(|e| IndexError::io_error(relative_path.into(), &e))?;
        let modified_at = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let analysis = self
            .analyzer
            .analyze(&AnalysisRequest {
                path: &path,
                relative_path,
                resolve_refs: self.config.resolve_refs,
            })
            .map_err(|e| e.into_index_error(relative_path.into()))?;

        Ok(ParsedFile {
            relative_path: relative_path.to_string(),
            content_hash: content_hash(&content),
            size: content.len() as u64,
            modified_at,
            analysis,
        })
    }

    fn write_file(
        &self,
        file: &ParsedFile,
        stats: &mut IndexStats,
    ) -> std::result::Result<(), IndexError> {
        let record = FileRecord {
            path: &file.relative_path,
            content_hash: &file.content_hash,
            size: file.size,
            modified_at: file.modified_at,
        };
        let written = self
            .store
            .replace_file(&record, &file.analysis)
            .map_err(|e| IndexError::database_error(file.relative_path.clone().into(), &e))?;

        stats.definitions_added += written.definitions;
        stats.references_added += written.references;
        stats.imports_added += written.imports;
        stats.decorators_added += written.decorators;
        stats.class_bases_added += written.class_bases;
        if written.dropped > 0 {
            debug!(
                path = %file.relative_path,
                dropped = written.dropped,
                "Dropped decorators or bases without an owner"
            );
        }
        Ok(())
    }

    /// Remove every indexed file that this run did not attempt.
    fn remove_unprocessed(&self, processed: &HashSet<String>) -> Result<usize> {
        let mut removed = 0;
        for path in self.store.file_hashes()?.into_keys() {
            if !processed.contains(&path) && self.store.delete_file_by_path(&path)? {
                debug!(path = %path, "Removed file no longer in scope");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove indexed files at, or beneath, each of the given paths.
    fn remove_under(&self, gone: &[String]) -> Result<usize> {
        if gone.is_empty() {
            return Ok(0);
        }
        let mut removed = 0;
        for path in self.store.file_hashes()?.into_keys() {
            let matches = gone.iter().any(|g| {
                path == *g
                    || path
                        .strip_prefix(g.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            });
            if matches && self.store.delete_file_by_path(&path)? {
                debug!(path = %path, "Removed deleted file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
