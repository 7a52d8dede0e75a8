//! Source analysis: turning one file into raw index records.
//!
//! An [`Analyzer`] reads a single file and returns a [`FileAnalysis`]. The
//! records it produces carry no ids. Decorators and class bases name their
//! owner by `full_name`; the store links them to definition ids after the
//! owning definitions have been inserted.
//!
//! ## Adding a New Language
//!
//! 1. Create a module (e.g., `javascript.rs`) implementing [`Analyzer`]
//! 2. Pass it to [`Sextant::with_analyzer`](crate::Sextant::with_analyzer)

pub mod python;
pub(crate) mod tree_sitter_utils;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::IndexError;
use crate::types::DefinitionKind;

pub use python::PythonAnalyzer;

/// Maximum characters of a source line kept as reference context.
pub const CONTEXT_MAX_CHARS: usize = 200;

/// Input to [`Analyzer::analyze`].
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    /// File to read
    pub path: &'a Path,
    /// Path relative to the source root, `/`-separated
    pub relative_path: &'a str,
    /// Resolve reference targets (`target_full_name`, `target_module_path`)
    pub resolve_refs: bool,
}

/// Why a file could not be analyzed.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The file could not be read
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid UTF-8
    #[error("file is not valid UTF-8")]
    Encoding,

    /// The file could not be parsed at all
    #[error("parse failed: {0}")]
    Parse(String),
}

impl AnalyzeError {
    /// Convert into a per-file indexing error.
    #[must_use]
    pub fn into_index_error(self, path: PathBuf) -> IndexError {
        match self {
            Self::Io(e) => IndexError::io_error(path, &e),
            Self::Encoding => IndexError::encoding_error(path),
            Self::Parse(message) => IndexError::parse_failed(path, message),
        }
    }
}

/// Extracts raw records from a source file.
///
/// Implementations must be usable from several threads at once; the indexer
/// analyzes files in parallel and writes them sequentially.
pub trait Analyzer: Send + Sync {
    /// File extensions this analyzer handles, without the dot.
    fn extensions(&self) -> &[&'static str];

    /// Analyze one file.
    fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<FileAnalysis, AnalyzeError>;
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileAnalysis {
    /// Named bindings
    pub definitions: Vec<RawDefinition>,
    /// Name uses
    pub references: Vec<RawReference>,
    /// Import bindings
    pub imports: Vec<RawImport>,
    /// Decorators, owned by name
    pub decorators: Vec<RawDecorator>,
    /// Class bases, owned by name
    pub class_bases: Vec<RawClassBase>,
}

/// A definition before insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDefinition {
    /// Short name
    pub name: String,
    /// Dotted qualified name
    pub full_name: String,
    /// What the name binds
    pub kind: DefinitionKind,
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub col: u32,
    /// Last line of the body
    pub end_line: Option<u32>,
    /// Column where the body ends
    pub end_col: Option<u32>,
    /// Call signature
    pub signature: Option<String>,
    /// Docstring
    pub docstring: Option<String>,
}

impl RawDefinition {
    /// A definition with only a name and position; other fields empty.
    #[must_use]
    pub fn new(name: &str, full_name: &str, kind: DefinitionKind, line: u32, col: u32) -> Self {
        Self {
            name: name.to_string(),
            full_name: full_name.to_string(),
            kind,
            line,
            col,
            end_line: None,
            end_col: None,
            signature: None,
            docstring: None,
        }
    }

    /// Dotted prefix of `full_name`, if it has one.
    #[must_use]
    pub fn parent_full_name(&self) -> Option<&str> {
        self.full_name.rsplit_once('.').map(|(parent, _)| parent)
    }

    /// Name does not start with an underscore.
    #[must_use]
    pub fn is_public(&self) -> bool {
        !self.name.starts_with('_')
    }
}

/// A reference before insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawReference {
    /// The name as written
    pub name: String,
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub col: u32,
    /// Stripped source line, truncated
    pub context: String,
    /// Resolved qualified name of the target
    pub target_full_name: Option<String>,
    /// Module path of the target
    pub target_module_path: Option<String>,
    /// Name is immediately followed by `(`
    pub is_call: bool,
    /// Post-order call position within the enclosing scope
    pub call_order: u32,
    /// Call nesting level
    pub call_depth: u32,
}

/// An import before insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImport {
    /// Dotted module or module member
    pub module: String,
    /// Member name for `from m import name`
    pub name: Option<String>,
    /// `as` alias
    pub alias: Option<String>,
    /// 1-based line
    pub line: u32,
}

/// A decorator before its owner is linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDecorator {
    /// `full_name` of the decorated definition
    pub owner_full_name: String,
    /// Decorator expression without arguments
    pub name: String,
    /// Raw argument text
    pub arguments: Option<String>,
    /// 1-based line
    pub line: u32,
}

/// A class base before its class is linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawClassBase {
    /// `full_name` of the declaring class
    pub class_full_name: String,
    /// Base expression as written
    pub base_name: String,
    /// Best-effort resolved qualified name
    pub base_full_name: Option<String>,
    /// Declaration order, from 0
    pub position: u32,
}

/// Trim a source line into reference context.
#[must_use]
pub fn make_context(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() > CONTEXT_MAX_CHARS {
        let mut truncated: String = trimmed.chars().take(CONTEXT_MAX_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        trimmed.to_string()
    }
}

/// Whether the text after a name, ignoring leading whitespace, opens a call.
#[must_use]
pub fn is_call_site(line: &str, name_end_byte: usize) -> bool {
    line.get(name_end_byte..)
        .is_some_and(|rest| rest.trim_start().starts_with('('))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_stripped_and_truncated() {
        assert_eq!(make_context("    return helper(x)  "), "return helper(x)");

        let long = format!("x = '{}'", "a".repeat(300));
        let context = make_context(&long);
        assert_eq!(context.chars().count(), CONTEXT_MAX_CHARS + 3);
        assert!(context.ends_with("..."));
    }

    #[test]
    fn call_site_detection() {
        assert!(is_call_site("helper(1)", 6));
        assert!(is_call_site("helper  (1)", 6));
        assert!(!is_call_site("helper.attr", 6));
        assert!(!is_call_site("helper", 6));
        assert!(!is_call_site("helper", 60));
    }

    #[test]
    fn raw_definition_derived_fields() {
        let def = RawDefinition::new("_save", "app.User._save", DefinitionKind::Function, 3, 8);
        assert_eq!(def.parent_full_name(), Some("app.User"));
        assert!(!def.is_public());

        let top = RawDefinition::new("app", "app", DefinitionKind::Module, 1, 0);
        assert_eq!(top.parent_full_name(), None);
        assert!(top.is_public());
    }

    #[test]
    fn analyze_error_maps_to_index_error_kind() {
        use crate::error::IndexErrorKind;

        let err = AnalyzeError::Parse("bad".to_string()).into_index_error(PathBuf::from("a.py"));
        assert_eq!(err.kind, IndexErrorKind::ParseFailed);

        let err = AnalyzeError::Encoding.into_index_error(PathBuf::from("a.py"));
        assert_eq!(err.kind, IndexErrorKind::EncodingError);
    }
}
