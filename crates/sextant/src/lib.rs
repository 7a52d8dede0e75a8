//! # Sextant: a queryable index of Python source facts
//!
//! Sextant extracts definitions, references, imports, decorators, class
//! bases and call sites from a Python codebase, keeps them in an in-memory
//! `SQLite` store, and persists that store as a compressed, column-oriented
//! snapshot next to the code.
//!
//! ## Design Philosophy
//!
//! - **Rebuild, don't patch** - Any stale file re-indexes every file, and
//!   derived data (parent links, call graph) is recomputed from scratch
//! - **Facts, not guesses** - Unresolved names stay `None`; nothing is invented
//! - **Failures are per file** - One bad file is reported, the run continues
//! - **Library first, CLI second**
//!
//! ## Quick Start
//!
//! ```no_run
//! use sextant::{SearchOptions, Sextant};
//! use std::path::Path;
//!
//! let sextant = Sextant::open(Path::new("/path/to/project"))?;
//!
//! let stats = sextant.index(&[], false)?;
//! println!("Indexed {} files, {} definitions", stats.files_indexed, stats.definitions_added);
//!
//! for hit in sextant.search("user service", &SearchOptions::default())? {
//!     println!("{} {}:{}", hit.definition.full_name, hit.file_path, hit.definition.line);
//! }
//! # Ok::<(), sextant::Error>(())
//! ```

pub mod analyzer;
pub mod config;
pub mod consistency;
pub mod db;
mod error;
pub mod indexer;
pub mod paths;
pub mod search;
pub mod text;
mod types;

pub use analyzer::{AnalysisRequest, AnalyzeError, Analyzer, FileAnalysis, PythonAnalyzer};
pub use config::Config;
pub use db::{DefinitionFilter, Store, Table};
pub use error::{Error, IndexError, IndexErrorKind, Result};
pub use indexer::Indexer;
pub use paths::PathFilter;
pub use search::{SearchEngine, SearchOptions, Strategy};
pub use types::{
    Call, CallId, CallNode, ClassBase, ClassBaseId, DatabaseStats, Decorator, DecoratorId,
    Definition, DefinitionId, DefinitionKind, DerivedStats, FileId, Import, ImportId,
    IndexStats, IndexedFile, QueryResult, Reference, ReferenceId, SearchResult,
    StalenessReport,
};

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// A source root bound to its index.
///
/// Owns the store, the analyzer and the configuration. Every operation that
/// changes the store exports a fresh snapshot before returning.
pub struct Sextant {
    root: PathBuf,
    index_dir: PathBuf,
    config: Config,
    filter: PathFilter,
    store: Store,
    analyzer: Box<dyn Analyzer>,
}

impl std::fmt::Debug for Sextant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sextant")
            .field("root", &self.root)
            .field("index_dir", &self.index_dir)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Sextant {
    /// Open the index for a source root, in `<root>/.sextant`.
    ///
    /// Loads `config.yaml` and the snapshot when they exist.
    ///
    /// # Errors
    ///
    /// Fails when the root does not exist, the config is invalid, or the
    /// snapshot cannot be loaded ([`Error::SchemaMismatch`] when it was
    /// written by an incompatible build; see [`Sextant::reset_dir`]).
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with(root, None)
    }

    /// Open with an explicit index directory.
    ///
    /// # Errors
    ///
    /// See [`Sextant::open`].
    pub fn open_with(root: &Path, index_dir: Option<&Path>) -> Result<Self> {
        let root = root.canonicalize().map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("source root not found: {}", root.display()),
            ))
        })?;
        let index_dir = index_dir.map_or_else(
            || root.join(config::INDEX_DIR_NAME),
            |dir| {
                if dir.is_absolute() {
                    dir.to_path_buf()
                } else {
                    root.join(dir)
                }
            },
        );

        let config = Config::load(&index_dir)?;
        let analyzer: Box<dyn Analyzer> = Box::new(PythonAnalyzer::new());
        let filter = PathFilter::new(&config.include, &config.exclude)?
            .with_extensions(analyzer.extensions());
        let store = Store::open(&index_dir)?;

        debug!(
            root = %root.display(),
            index_dir = %index_dir.display(),
            "Opened index"
        );
        Ok(Self {
            root,
            index_dir,
            config,
            filter,
            store,
            analyzer,
        })
    }

    /// Replace the analyzer. The path filter follows its extensions.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Box<dyn Analyzer>) -> Self {
        self.filter = self.filter.with_extensions(analyzer.extensions());
        self.analyzer = analyzer;
        self
    }

    /// Add include/exclude patterns on top of the configured ones.
    ///
    /// # Errors
    ///
    /// Fails when a pattern does not compile.
    pub fn with_patterns(mut self, include: &[String], exclude: &[String]) -> Result<Self> {
        self.config = self.config.with_patterns(include, exclude);
        self.filter = PathFilter::new(&self.config.include, &self.config.exclude)?
            .with_extensions(self.analyzer.extensions());
        Ok(self)
    }

    /// The canonical source root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the snapshot and `config.yaml` live.
    #[must_use]
    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Filter deciding which paths are indexed; usable by file watchers.
    #[must_use]
    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn indexer(&self) -> Indexer<'_> {
        Indexer::new(
            &self.root,
            &self.store,
            self.analyzer.as_ref(),
            &self.config,
            &self.filter,
        )
    }

    // === Indexing ===

    /// Index the root (or only `paths` under it).
    ///
    /// A no-op when nothing is stale, unless `force` is set.
    ///
    /// # Errors
    ///
    /// Per-file failures are collected in [`IndexStats::errors`]; only
    /// discovery, store and snapshot failures are returned as errors.
    pub fn index(&self, paths: &[PathBuf], force: bool) -> Result<IndexStats> {
        let mut stats = self.indexer().index(paths, force)?;
        self.export_if_changed(&mut stats)?;
        Ok(stats)
    }

    /// Report what differs between disk and the index, without writing.
    ///
    /// # Errors
    ///
    /// Fails on discovery or store errors.
    pub fn check_staleness(&self, paths: &[PathBuf]) -> Result<StalenessReport> {
        self.indexer().check_staleness(paths)
    }

    /// Apply one batch of watcher-reported paths.
    ///
    /// # Errors
    ///
    /// See [`Indexer::apply_changes`].
    pub fn apply_changes(&self, paths: &[PathBuf]) -> Result<IndexStats> {
        let mut stats = self.indexer().apply_changes(paths)?;
        self.export_if_changed(&mut stats)?;
        Ok(stats)
    }

    /// Re-index one file, ignoring include/exclude patterns.
    ///
    /// # Errors
    ///
    /// See [`Indexer::index_file`].
    pub fn index_file(&self, path: &Path) -> Result<IndexStats> {
        let mut stats = self.indexer().index_file(path)?;
        self.export_if_changed(&mut stats)?;
        Ok(stats)
    }

    /// Drop one file (path relative to the root) from the index.
    ///
    /// # Errors
    ///
    /// Fails on store or snapshot errors.
    pub fn remove_file(&self, relative_path: &str) -> Result<bool> {
        let removed = self.indexer().remove_file(relative_path)?;
        if removed {
            self.export()?;
        }
        Ok(removed)
    }

    fn export_if_changed(&self, stats: &mut IndexStats) -> Result<()> {
        if stats.changed_store() {
            stats.snapshot_bytes = Some(self.export()?);
        }
        Ok(())
    }

    /// Write the snapshot now. Returns its size in bytes.
    ///
    /// # Errors
    ///
    /// Fails when the index directory cannot be written.
    pub fn export(&self) -> Result<u64> {
        self.store.export(&self.index_dir, self.config.compression_level)
    }

    /// Empty the store and delete the snapshot.
    ///
    /// # Errors
    ///
    /// Fails when snapshot files cannot be deleted.
    pub fn reset(&self) -> Result<()> {
        let removed = remove_snapshot_in(&self.index_dir)?;
        self.store.clear()?;
        info!(segments = removed, "Index reset");
        Ok(())
    }

    /// Delete the snapshot in an index directory without opening it.
    ///
    /// This is the recovery path for [`Error::SchemaMismatch`], where
    /// [`Sextant::open`] itself fails.
    ///
    /// # Errors
    ///
    /// Fails when snapshot files cannot be deleted.
    pub fn reset_dir(index_dir: &Path) -> Result<usize> {
        remove_snapshot_in(index_dir)
    }

    // === Queries ===

    fn search_engine(&self) -> SearchEngine<'_> {
        SearchEngine::new(&self.store)
    }

    /// Ranked definition search.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.search_engine().search(query, options)
    }

    /// The best definition for a name or qualified name, with its file path.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn get_definition(&self, name: &str) -> Result<Option<(Definition, String)>> {
        self.search_engine().get_definition(name)
    }

    /// A definition by id.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn get_definition_by_id(&self, id: DefinitionId) -> Result<Option<Definition>> {
        self.search_engine().get_definition_by_id(id)
    }

    /// Decorators applied to a definition.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn decorators_of(&self, id: DefinitionId) -> Result<Vec<Decorator>> {
        self.store.decorators_of(id)
    }

    /// Uses of a name or qualified name, with file paths.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn references(&self, name: &str, limit: usize) -> Result<Vec<(Reference, String)>> {
        self.search_engine().find_references(name, limit)
    }

    /// Page through definitions.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn list_definitions(
        &self,
        filter: &DefinitionFilter<'_>,
    ) -> Result<Vec<(Definition, String)>> {
        self.search_engine().list_definitions(filter)
    }

    /// What a definition calls, expanded `depth` levels into the callees.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn calls_from(
        &self,
        full_name: &str,
        depth: usize,
        top_level_only: bool,
    ) -> Result<Vec<CallNode>> {
        self.store.call_tree(full_name, depth, top_level_only)
    }

    /// Call sites whose callee resolved to `full_name`.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn callers_of(&self, full_name: &str) -> Result<Vec<Call>> {
        self.store.callers_of(full_name)
    }

    /// Bases of a class, in declaration order.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn bases_of(&self, class: &str) -> Result<Vec<ClassBase>> {
        self.store.bases_of(class)
    }

    /// Classes deriving from `class`, as `(full_name, file path)`.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn subclasses_of(&self, class: &str) -> Result<Vec<(String, String)>> {
        self.store.subclasses_of(class)
    }

    /// Row counts and summary figures, including snapshot size.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn stats(&self) -> Result<DatabaseStats> {
        let mut stats = self.store.get_stats()?;
        stats.snapshot_bytes = db::snapshot_size(&self.index_dir);
        Ok(stats)
    }

    /// Run a read-only SQL statement.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidQuery`] for writes or unknown tables and columns.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        self.store.query(sql)
    }
}

fn remove_snapshot_in(index_dir: &Path) -> Result<usize> {
    let removed = db::remove_snapshot(index_dir)?;
    debug!(dir = %index_dir.display(), segments = removed, "Removed snapshot segments");
    Ok(removed)
}
