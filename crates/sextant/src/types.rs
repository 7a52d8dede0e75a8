//! Domain types for the Sextant index.
//!
//! - **Entities**: `IndexedFile`, `Definition`, `Reference`, `Import`,
//!   `Decorator`, `ClassBase` (extracted, stored per file) and `Call` (derived)
//! - **Results**: `IndexStats`, `StalenessReport`, `DerivedStats`,
//!   `DatabaseStats`, `SearchResult`, `CallNode`, `QueryResult`
//!
//! Paths stored in the index are relative to the source root and always use
//! `/` as the separator.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

// ============================================================================
// Strongly-typed ID wrappers
// ============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Extract the raw i64 value.
            #[must_use]
            pub fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a row in `files`.
    FileId
);
id_type!(
    /// Identity of a row in `definitions`.
    DefinitionId
);
id_type!(
    /// Identity of a row in `refs`.
    ReferenceId
);
id_type!(
    /// Identity of a row in `imports`.
    ImportId
);
id_type!(
    /// Identity of a row in `decorators`.
    DecoratorId
);
id_type!(
    /// Identity of a row in `class_bases`.
    ClassBaseId
);
id_type!(
    /// Identity of a row in `calls`.
    CallId
);

// ============================================================================
// Enums
// ============================================================================

/// What a definition binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// A module, or a name bound by `import x`
    Module,
    /// `class` statement
    Class,
    /// `def` statement (functions and methods)
    Function,
    /// Function parameter
    Param,
    /// Assignment target or other bound name
    Variable,
    /// Method decorated with `@property`
    Property,
}

impl DefinitionKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 6] = [
        Self::Module,
        Self::Class,
        Self::Function,
        Self::Param,
        Self::Variable,
        Self::Property,
    ];

    /// Convert to database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Param => "param",
            Self::Variable => "variable",
            Self::Property => "property",
        }
    }

    /// Whether this kind can own a call site in the call graph.
    #[must_use]
    pub fn is_scope(&self) -> bool {
        matches!(self, Self::Class | Self::Function)
    }
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefinitionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown definition kind '{s}'"))
    }
}

// ============================================================================
// Stored entities
// ============================================================================

/// A source file that has been indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedFile {
    /// Row identity
    pub id: FileId,
    /// Path relative to the source root
    pub path: String,
    /// SHA-256 hex digest of the content at index time
    pub content_hash: String,
    /// Size in bytes
    pub size: u64,
    /// File modification time
    pub modified_at: Option<DateTime<Utc>>,
    /// When this row was written
    pub indexed_at: DateTime<Utc>,
}

/// A named binding extracted from a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    /// Row identity
    pub id: DefinitionId,
    /// Owning file
    pub file_id: FileId,
    /// Short name
    pub name: String,
    /// Dotted qualified name; not unique
    pub full_name: String,
    /// What the name binds
    pub kind: DefinitionKind,
    /// 1-based line of the name
    pub line: u32,
    /// 0-based column of the name
    pub col: u32,
    /// Last line of the body, when the binding has one
    pub end_line: Option<u32>,
    /// Column where the body ends
    pub end_col: Option<u32>,
    /// Call signature for functions and classes
    pub signature: Option<String>,
    /// First string statement of the body
    pub docstring: Option<String>,
    /// Dotted prefix of `full_name`
    pub parent_full_name: Option<String>,
    /// Same-file definition named `parent_full_name`, linked post-hoc
    pub parent_id: Option<DefinitionId>,
    /// Name does not start with `_`
    pub is_public: bool,
    /// Lowercase search tokens
    pub search_text: String,
}

impl Definition {
    /// Number of lines spanned by the body (0 for bindings without one).
    #[must_use]
    pub fn body_len(&self) -> u32 {
        self.end_line.unwrap_or(self.line).saturating_sub(self.line)
    }
}

/// A use of a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Row identity
    pub id: ReferenceId,
    /// File the use appears in
    pub file_id: FileId,
    /// Definition named by `target_full_name`, linked post-hoc
    pub definition_id: Option<DefinitionId>,
    /// The name as written
    pub name: String,
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub col: u32,
    /// Stripped source line, truncated to 200 characters
    pub context: String,
    /// Resolved qualified name of what the name refers to
    pub target_full_name: Option<String>,
    /// Module path of the resolved target
    pub target_module_path: Option<String>,
    /// Name is immediately followed by `(`
    pub is_call: bool,
    /// Post-order position among calls of the enclosing scope (0 when not a call)
    pub call_order: u32,
    /// Nesting level of the call (1 for top-level calls, 0 when not a call)
    pub call_depth: u32,
}

/// An import statement binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    /// Row identity
    pub id: ImportId,
    /// Importing file
    pub file_id: FileId,
    /// Dotted module (or module member) being imported
    pub module: String,
    /// Imported member name for `from m import name`
    pub name: Option<String>,
    /// `as` alias
    pub alias: Option<String>,
    /// 1-based line
    pub line: u32,
}

/// A decorator applied to a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decorator {
    /// Row identity
    pub id: DecoratorId,
    /// Decorated definition
    pub definition_id: DefinitionId,
    /// File the decorator appears in
    pub file_id: FileId,
    /// Decorator expression without arguments (`app.route`)
    pub name: String,
    /// Raw argument text, without the surrounding parentheses
    pub arguments: Option<String>,
    /// 1-based line
    pub line: u32,
}

/// A base class in a class statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassBase {
    /// Row identity
    pub id: ClassBaseId,
    /// The class declaring the base
    pub class_id: DefinitionId,
    /// File of the class
    pub file_id: FileId,
    /// Base expression as written
    pub base_name: String,
    /// Best-effort resolved qualified name of the base
    pub base_full_name: Option<String>,
    /// Class definition named `base_full_name`, linked post-hoc
    pub base_id: Option<DefinitionId>,
    /// Declaration order, starting at 0
    pub position: u32,
}

/// A call site attributed to its innermost enclosing function or class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    /// Row identity
    pub id: CallId,
    /// File the call appears in
    pub file_id: FileId,
    /// Qualified name of the calling definition
    pub caller_full_name: String,
    /// The calling definition
    pub caller_id: DefinitionId,
    /// Resolved qualified name of the callee, if any
    pub callee_full_name: Option<String>,
    /// Definition of the callee, if it is indexed
    pub callee_id: Option<DefinitionId>,
    /// The called name as written
    pub callee_name: String,
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub col: u32,
    /// Source line
    pub context: String,
    /// Copied from the reference
    pub call_order: u32,
    /// Copied from the reference
    pub call_depth: u32,
}

// ============================================================================
// Results
// ============================================================================

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// The matching definition
    pub definition: Definition,
    /// Path of the defining file
    pub file_path: String,
    /// Relevance, higher is better
    pub score: f64,
}

/// Files that differ between disk and the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StalenessReport {
    /// Indexed files whose content hash changed
    pub changed: Vec<String>,
    /// Discovered files that are not indexed
    pub added: Vec<String>,
    /// Indexed files that were not discovered
    pub removed: Vec<String>,
}

impl StalenessReport {
    /// Whether anything needs re-indexing.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        !(self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty())
    }
}

/// Counts produced by one pass of the consistency builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DerivedStats {
    /// Definitions whose `parent_id` was set
    pub parents_linked: usize,
    /// References whose `definition_id` was set
    pub references_linked: usize,
    /// Class bases whose `base_id` was set
    pub bases_linked: usize,
    /// Call rows generated
    pub calls_built: usize,
    /// Whether the term index was rebuilt successfully
    pub term_index_ready: bool,
}

/// Statistics from an indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Files analyzed and written
    pub files_indexed: usize,
    /// Files left untouched because nothing was stale
    pub files_skipped: usize,
    /// Index rows removed for files no longer present
    pub files_removed: usize,
    /// Definitions inserted
    pub definitions_added: usize,
    /// References inserted
    pub references_added: usize,
    /// Imports inserted
    pub imports_added: usize,
    /// Decorators inserted (unresolved owners are dropped)
    pub decorators_added: usize,
    /// Class bases inserted (unresolved owners are dropped)
    pub class_bases_added: usize,
    /// Derived data produced by the rebuild, when it ran
    pub derived: Option<DerivedStats>,
    /// The run was a no-op because nothing was stale
    pub index_skipped: bool,
    /// Wall-clock time of the run
    pub duration: Duration,
    /// Directories that could not be read (path, error reason)
    pub directories_skipped: Vec<(PathBuf, String)>,
    /// Per-file failures
    pub errors: Vec<IndexError>,
    /// Size of the exported snapshot, when one was written
    pub snapshot_bytes: Option<u64>,
}

impl IndexStats {
    /// Whether the run changed the store.
    #[must_use]
    pub fn changed_store(&self) -> bool {
        self.files_indexed > 0 || self.files_removed > 0
    }
}

/// Row counts and summary figures for the whole store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseStats {
    /// Indexed files
    pub files: usize,
    /// Definitions
    pub definitions: usize,
    /// References
    pub references: usize,
    /// Imports
    pub imports: usize,
    /// Decorators
    pub decorators: usize,
    /// Class bases
    pub class_bases: usize,
    /// Call rows
    pub calls: usize,
    /// Definition counts per kind
    pub definitions_by_kind: BTreeMap<DefinitionKind, usize>,
    /// Most recent `indexed_at`
    pub last_indexed: Option<DateTime<Utc>>,
    /// Whether the term index can serve queries
    pub term_index_available: bool,
    /// Bytes on disk of the last exported snapshot
    pub snapshot_bytes: u64,
}

/// A call and the calls made by its callee, to a bounded depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallNode {
    /// The call site
    pub call: Call,
    /// Calls made from inside the callee
    pub children: Vec<CallNode>,
}

/// Result of a raw read-only query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names in select order
    pub columns: Vec<String>,
    /// Row values in column order
    pub rows: Vec<Vec<serde_json::Value>>,
}
