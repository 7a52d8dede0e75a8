//! Database schema definition for the Sextant store.
//!
//! Relationships are enforced by the store's manual cascade rather than
//! foreign keys: rows are bulk-loaded from snapshots in table order and
//! derived links are rebuilt after the fact.

/// Version of the table layout below. Snapshots written under a different
/// version are rejected with `Error::SchemaMismatch`.
pub(crate) const SCHEMA_VERSION: u32 = 1;

/// Tables, indexes and views.
pub(crate) const SCHEMA: &str = r"
-- Indexed source files
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    content_hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    modified_at TEXT,
    indexed_at TEXT NOT NULL
);

-- Named bindings
-- parent_id is linked after insert from parent_full_name (same file only)
CREATE TABLE IF NOT EXISTS definitions (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL,
    kind TEXT NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    end_line INTEGER,
    end_col INTEGER,
    signature TEXT,
    docstring TEXT,
    parent_full_name TEXT,
    parent_id INTEGER,
    is_public INTEGER NOT NULL,
    search_text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_definitions_file ON definitions(file_id);
CREATE INDEX IF NOT EXISTS idx_definitions_name ON definitions(name);
CREATE INDEX IF NOT EXISTS idx_definitions_full_name ON definitions(full_name);
CREATE INDEX IF NOT EXISTS idx_definitions_kind ON definitions(kind);

-- Name uses; definition_id is linked after insert from target_full_name
CREATE TABLE IF NOT EXISTS refs (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL,
    definition_id INTEGER,
    name TEXT NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    context TEXT NOT NULL,
    target_full_name TEXT,
    target_module_path TEXT,
    is_call INTEGER NOT NULL,
    call_order INTEGER NOT NULL DEFAULT 0,
    call_depth INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_refs_file ON refs(file_id);
CREATE INDEX IF NOT EXISTS idx_refs_name ON refs(name);
CREATE INDEX IF NOT EXISTS idx_refs_target ON refs(target_full_name);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL,
    module TEXT NOT NULL,
    name TEXT,
    alias TEXT,
    line INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_imports_file ON imports(file_id);
CREATE INDEX IF NOT EXISTS idx_imports_module ON imports(module);

CREATE TABLE IF NOT EXISTS decorators (
    id INTEGER PRIMARY KEY,
    definition_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    arguments TEXT,
    line INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_decorators_definition ON decorators(definition_id);
CREATE INDEX IF NOT EXISTS idx_decorators_name ON decorators(name);

-- base_id is linked after insert from base_full_name (any file)
CREATE TABLE IF NOT EXISTS class_bases (
    id INTEGER PRIMARY KEY,
    class_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    base_name TEXT NOT NULL,
    base_full_name TEXT,
    base_id INTEGER,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_class_bases_class ON class_bases(class_id);
CREATE INDEX IF NOT EXISTS idx_class_bases_base_full_name ON class_bases(base_full_name);

-- Derived from refs; rebuilt wholesale
CREATE TABLE IF NOT EXISTS calls (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL,
    caller_full_name TEXT NOT NULL,
    caller_id INTEGER NOT NULL,
    callee_full_name TEXT,
    callee_id INTEGER,
    callee_name TEXT NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    context TEXT NOT NULL,
    call_order INTEGER NOT NULL,
    call_depth INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_calls_file ON calls(file_id);
CREATE INDEX IF NOT EXISTS idx_calls_caller ON calls(caller_full_name);
CREATE INDEX IF NOT EXISTS idx_calls_callee ON calls(callee_full_name);

-- Convenience views for raw queries
CREATE VIEW IF NOT EXISTS definitions_with_path AS
    SELECT d.*, f.path AS file_path
    FROM definitions d JOIN files f ON f.id = d.file_id;

CREATE VIEW IF NOT EXISTS functions AS
    SELECT * FROM definitions_with_path WHERE kind = 'function';

CREATE VIEW IF NOT EXISTS classes AS
    SELECT * FROM definitions_with_path WHERE kind = 'class';

CREATE VIEW IF NOT EXISTS class_hierarchy AS
    SELECT c.id AS class_id, c.name AS class_name, c.full_name AS class_full_name,
           b.base_name, b.base_full_name, b.base_id, b.position, f.path AS file_path
    FROM definitions c
    JOIN files f ON f.id = c.file_id
    LEFT JOIN class_bases b ON b.class_id = c.id
    WHERE c.kind = 'class';

CREATE VIEW IF NOT EXISTS decorated_definitions AS
    SELECT d.id, d.name, d.full_name, d.kind, d.line,
           dec.name AS decorator_name, dec.arguments AS decorator_arguments,
           dec.line AS decorator_line, f.path AS file_path
    FROM decorators dec
    JOIN definitions d ON d.id = dec.definition_id
    JOIN files f ON f.id = d.file_id;

CREATE VIEW IF NOT EXISTS calls_with_context AS
    SELECT c.*, f.path AS file_path
    FROM calls c JOIN files f ON f.id = c.file_id;

CREATE VIEW IF NOT EXISTS refs_with_path AS
    SELECT r.*, f.path AS file_path
    FROM refs r JOIN files f ON f.id = r.file_id;

CREATE VIEW IF NOT EXISTS imports_with_path AS
    SELECT i.*, f.path AS file_path
    FROM imports i JOIN files f ON f.id = i.file_id;
";

/// Term index over `definitions.search_text`.
///
/// `unicode61` folds case only: no stemming, no stop words.
pub(crate) const TERM_INDEX: &str = r"
DROP TABLE IF EXISTS definitions_fts;
CREATE VIRTUAL TABLE definitions_fts USING fts5(
    search_text,
    content = 'definitions',
    content_rowid = 'id',
    tokenize = 'unicode61'
);
INSERT INTO definitions_fts(definitions_fts) VALUES ('rebuild');
";

/// The seven persisted record sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// `files`
    Files,
    /// `definitions`
    Definitions,
    /// `refs`
    Refs,
    /// `imports`
    Imports,
    /// `decorators`
    Decorators,
    /// `class_bases`
    ClassBases,
    /// `calls`
    Calls,
}

impl Table {
    /// All tables, in load order.
    pub const ALL: [Self; 7] = [
        Self::Files,
        Self::Definitions,
        Self::Refs,
        Self::Imports,
        Self::Decorators,
        Self::ClassBases,
        Self::Calls,
    ];

    /// Table name in the schema and in snapshot file names.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Definitions => "definitions",
            Self::Refs => "refs",
            Self::Imports => "imports",
            Self::Decorators => "decorators",
            Self::ClassBases => "class_bases",
            Self::Calls => "calls",
        }
    }

    /// Whether a snapshot must contain this table.
    ///
    /// Optional tables are synthesized empty when their segment is missing.
    #[must_use]
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Self::Files | Self::Definitions | Self::Refs | Self::Imports
        )
    }
}
