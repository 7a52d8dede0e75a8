//! Path matching and source-file discovery.
//!
//! Users write simplified patterns (`tests/`, `test_`, `_test`, `Testing`)
//! that [`expand_pattern`] turns into globs. Globs understand `**` as zero or
//! more whole path segments, `*` as any run of non-separator characters and
//! `?` as one non-separator character. Everything else is literal.
//!
//! All matching happens on paths relative to the source root with `/` as the
//! separator.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};

/// Extension of the files the bundled analyzer understands.
pub const SOURCE_EXTENSION: &str = "py";

/// Directories never descended into, whatever the user patterns say.
pub const BUILTIN_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".sextant",
    ".venv",
    "venv",
    ".tox",
    ".nox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "__pycache__",
    "node_modules",
    "build",
    "dist",
];

/// Expand a simplified pattern into a glob for `.py` sources.
///
/// See [`expand_pattern_for`] for the rules.
#[must_use]
pub fn expand_pattern(pattern: &str) -> String {
    expand_pattern_for(pattern, SOURCE_EXTENSION)
}

/// Expand a simplified pattern into a glob for files with `extension`.
///
/// Patterns containing `/` are explicit paths:
/// - trailing `/` matches the directory's contents (`tests/` → `tests/**`)
/// - a source file gets a `**/` prefix unless already rooted
/// - anything with `*` is used as-is
/// - otherwise it is a directory (`src/api` → `src/api/**`)
///
/// Patterns without `/`:
/// - with `*`: a file name anywhere (`test_*` → `**/test_*.py`)
/// - ending in `_`: a file-name prefix (`test_` → `**/test_*.py`)
/// - starting with `_`: a file-name suffix (`_test` → `**/*_test.py`)
/// - otherwise a directory anywhere (`Testing` → `**/Testing/**`)
#[must_use]
pub fn expand_pattern_for(pattern: &str, extension: &str) -> String {
    let dotted = format!(".{extension}");

    if pattern.contains('/') {
        if pattern.ends_with('/') {
            return format!("{pattern}**");
        }
        if pattern.ends_with(&dotted) {
            if pattern.starts_with("**/") || pattern.starts_with('/') {
                return pattern.to_string();
            }
            return format!("**/{pattern}");
        }
        if pattern.contains('*') {
            return pattern.to_string();
        }
        return format!("{pattern}/**");
    }

    if pattern.contains('*') {
        let prefix = if pattern.starts_with("**/") { "" } else { "**/" };
        let suffix = if pattern.ends_with(&dotted) {
            ""
        } else {
            dotted.as_str()
        };
        return format!("{prefix}{pattern}{suffix}");
    }
    if pattern.ends_with('_') {
        return format!("**/{pattern}*{dotted}");
    }
    if pattern.starts_with('_') {
        return format!("**/*{pattern}{dotted}");
    }
    format!("**/{pattern}/**")
}

/// A compiled glob.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    /// Compile a glob pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern))
            .map_err(|e| Error::Config(format!("invalid pattern '{pattern}': {e}")))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Whether a relative path matches.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The pattern this glob was compiled from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Match a relative path against a glob pattern.
///
/// A pattern that fails to compile matches nothing.
#[must_use]
pub fn glob_match(path: &str, pattern: &str) -> bool {
    Glob::new(pattern).is_ok_and(|glob| glob.is_match(path))
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    // `**/` may also match nothing at all
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }

    out.push('$');
    out
}

/// Whether a directory name is in the built-in exclude set.
#[must_use]
pub fn is_builtin_excluded_dir(name: &str) -> bool {
    BUILTIN_EXCLUDED_DIRS.contains(&name) || name.ends_with(".egg-info")
}

/// Convert a path under `root` to the relative, `/`-separated form stored in
/// the index. Returns `None` for paths outside the root.
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Include/exclude filter over relative paths.
///
/// A path is accepted when it has a source extension, no directory component
/// is built-in excluded, no exclude glob matches, and either there are no
/// include globs or one of them matches. Excludes win over includes.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Vec<Glob>,
    exclude: Vec<Glob>,
    extensions: Vec<String>,
}

impl PathFilter {
    /// Build a filter from simplified include/exclude patterns.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Glob>> {
            patterns
                .iter()
                .map(|p| Glob::new(&expand_pattern(p)))
                .collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
            extensions: vec![SOURCE_EXTENSION.to_string()],
        })
    }

    /// Replace the accepted source extensions.
    #[must_use]
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| (*e).to_string()).collect();
        self
    }

    /// Whether the path has one of the accepted extensions.
    #[must_use]
    pub fn is_source(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|accepted| accepted == ext))
    }

    /// Whether a relative path should be indexed.
    #[must_use]
    pub fn accepts(&self, relative: &str) -> bool {
        if !self.is_source(relative) {
            return false;
        }
        let mut dirs = relative.split('/').rev().skip(1);
        if dirs.any(is_builtin_excluded_dir) {
            return false;
        }
        if self.exclude.iter().any(|g| g.is_match(relative)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|g| g.is_match(relative))
    }

    /// Watch-side check for an absolute or root-relative path.
    #[must_use]
    pub fn accepts_path(&self, root: &Path, path: &Path) -> bool {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        relative_path(root, &absolute).is_some_and(|rel| self.accepts(&rel))
    }
}

/// Result of a discovery walk.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Relative paths, sorted and deduplicated
    pub files: Vec<String>,
    /// Directories that could not be read (path, error reason)
    pub directories_skipped: Vec<(PathBuf, String)>,
}

/// Find source files under `root`.
///
/// With no explicit `paths`, the whole root is scanned. An explicit file is
/// included directly when it has a source extension; an explicit directory is
/// scanned with the filter applied.
pub fn discover(root: &Path, paths: &[PathBuf], filter: &PathFilter) -> Result<Discovery> {
    let mut discovery = Discovery::default();

    if paths.is_empty() {
        walk_dir(root, root, filter, &mut discovery);
    } else {
        for path in paths {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            };

            if absolute.is_file() {
                match relative_path(root, &absolute) {
                    Some(rel) if filter.is_source(&rel) => discovery.files.push(rel),
                    Some(rel) => {
                        tracing::debug!(path = %rel, "Explicit path is not a source file, skipping");
                    }
                    None => warn!(path = %absolute.display(), "Path is outside the source root, skipping"),
                }
            } else if absolute.is_dir() {
                if absolute.starts_with(root) {
                    walk_dir(root, &absolute, filter, &mut discovery);
                } else {
                    warn!(path = %absolute.display(), "Directory is outside the source root, skipping");
                }
            } else {
                warn!(path = %absolute.display(), "Path does not exist, skipping");
                discovery
                    .directories_skipped
                    .push((absolute, "path does not exist".to_string()));
            }
        }
    }

    discovery.files.sort();
    discovery.files.dedup();
    Ok(discovery)
}

/// Recursively walk a directory, collecting accepted source files.
fn walk_dir(root: &Path, dir: &Path, filter: &PathFilter, discovery: &mut Discovery) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(
                directory = %dir.display(),
                error = %e,
                "Cannot read directory, skipping"
            );
            discovery
                .directories_skipped
                .push((dir.to_path_buf(), e.to_string()));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(
                    directory = %dir.display(),
                    error = %e,
                    "Failed to read directory entry, skipping"
                );
                continue;
            }
        };

        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if path.is_dir() {
            if !is_builtin_excluded_dir(name) {
                walk_dir(root, &path, filter, discovery);
            }
        } else if path.is_file()
            && let Some(rel) = relative_path(root, &path)
            && filter.accepts(&rel)
        {
            discovery.files.push(rel);
        }
    }
}
