//! CLI command implementations.

mod display;

pub mod calls;
pub mod index;
pub mod search;
pub mod stats;

use std::path::{Path, PathBuf};

use sextant::Sextant;

/// Where the command operates.
pub struct Context {
    root: PathBuf,
    index_dir: Option<PathBuf>,
}

impl Context {
    pub fn new(root: PathBuf, index_dir: Option<PathBuf>) -> Self {
        Self { root, index_dir }
    }

    /// Open the index for this root.
    pub fn open(&self) -> sextant::Result<Sextant> {
        Sextant::open_with(&self.root, self.index_dir.as_deref())
    }

    /// The index directory, resolved the same way [`Sextant::open_with`] does.
    pub fn index_dir(&self) -> PathBuf {
        match &self.index_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.root.join(dir),
            None => self.root.join(sextant::config::INDEX_DIR_NAME),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
