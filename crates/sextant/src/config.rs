//! Index-directory configuration.
//!
//! Settings live in `<index_dir>/config.yaml`. Every field is optional; a
//! missing file means defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default name of the index directory under the source root
pub const INDEX_DIR_NAME: &str = ".sextant";

/// Name of the configuration file inside the index directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default number of files analyzed in parallel before their writes
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default zstd level for snapshot export
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 19;

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Simplified include patterns (expanded by the path matcher)
    pub include: Vec<String>,

    /// Simplified exclude patterns, applied on top of the built-in excludes
    pub exclude: Vec<String>,

    /// Ask the analyzer to resolve reference targets
    #[serde(rename = "resolve-refs")]
    pub resolve_refs: bool,

    /// Files analyzed in parallel per chunk
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// zstd level used when exporting the snapshot
    #[serde(rename = "compression-level")]
    pub compression_level: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            resolve_refs: true,
            batch_size: DEFAULT_BATCH_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl Config {
    /// Load `config.yaml` from an index directory, falling back to defaults.
    pub fn load(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `<index_dir>/config.yaml`.
    pub fn save(&self, index_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(index_dir)?;
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        std::fs::write(index_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }

    /// Append command-line patterns to the configured ones.
    #[must_use]
    pub fn with_patterns(mut self, include: &[String], exclude: &[String]) -> Self {
        self.include.extend(include.iter().cloned());
        self.exclude.extend(exclude.iter().cloned());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch-size must be at least 1".to_string()));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(Error::Config(format!(
                "compression-level must be between 1 and 22, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("should create temp directory");

        let config = Config::load(dir.path()).expect("should load defaults");

        assert_eq!(config, Config::default());
        assert!(config.resolve_refs);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("should create temp directory");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "exclude:\n  - tests/\nresolve-refs: false\n",
        )
        .expect("should write config");

        let config = Config::load(dir.path()).expect("should load config");

        assert_eq!(config.exclude, vec!["tests/".to_string()]);
        assert!(!config.resolve_refs);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().expect("should create temp directory");
        let config = Config {
            include: vec!["src/".to_string()],
            compression_level: 3,
            ..Config::default()
        };

        config.save(dir.path()).expect("should save config");
        let loaded = Config::load(dir.path()).expect("should load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_yaml_is_config_error() {
        let dir = tempfile::tempdir().expect("should create temp directory");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "include: [unterminated")
            .expect("should write config");

        let err = Config::load(dir.path()).expect_err("should reject invalid YAML");

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().expect("should create temp directory");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "batch-size: 0\n")
            .expect("should write config");

        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn with_patterns_appends() {
        let config = Config {
            exclude: vec!["build/".to_string()],
            ..Config::default()
        }
        .with_patterns(&["src/".to_string()], &["tests/".to_string()]);

        assert_eq!(config.include, vec!["src/".to_string()]);
        assert_eq!(config.exclude, vec!["build/".to_string(), "tests/".to_string()]);
    }
}
