//! The Search Engine: ranked lookup over indexed definitions.
//!
//! The query's shape picks the strategy:
//!
//! - contains `*`: wildcard match over the raw name
//! - otherwise: term search through the FTS5 index, falling back to a
//!   substring scan of `search_text` when the term index is missing or
//!   rejects the query
//!
//! Every strategy honors [`SearchOptions::kind`] and
//! [`SearchOptions::include_private`].

use rusqlite::ToSql;
use tracing::{debug, trace};

use crate::db::{
    DEFINITIONS_COLUMNS_D, DefinitionFilter, Store, escape_like, row_to_definition,
};
use crate::error::Result;
use crate::text::query_terms;
use crate::types::{Definition, DefinitionId, DefinitionKind, Reference, SearchResult};

/// Default number of search results.
pub const DEFAULT_LIMIT: usize = 20;

/// Score for an exact name match in wildcard and substring search.
const EXACT_SCORE: f64 = 1.0;
/// Score for a name that starts with the query in substring search.
const PREFIX_SCORE: f64 = 0.75;
/// Score for any other wildcard or substring match.
const OTHER_SCORE: f64 = 0.5;

/// Filters shared by all search strategies.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Only definitions of this kind
    pub kind: Option<DefinitionKind>,
    /// Include names starting with `_`
    pub include_private: bool,
    /// Maximum results
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            kind: None,
            include_private: false,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Which strategy served a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `*` wildcard over names
    Wildcard,
    /// FTS5 term match
    Term,
    /// Substring scan of `search_text`
    Substring,
}

/// Read-side queries over a [`Store`].
pub struct SearchEngine<'a> {
    store: &'a Store,
}

impl<'a> SearchEngine<'a> {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Search definitions, best match first.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        Ok(self.search_with_strategy(query, options)?.0)
    }

    /// Like [`SearchEngine::search`], also reporting which strategy answered.
    pub fn search_with_strategy(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<(Vec<SearchResult>, Strategy)> {
        let query = query.trim();
        if query.is_empty() || options.limit == 0 {
            return Ok((Vec::new(), Strategy::Substring));
        }

        if query.contains('*') {
            return Ok((self.wildcard(query, options)?, Strategy::Wildcard));
        }

        if self.store.term_index_available()? {
            match self.term(query, options) {
                Ok(results) => return Ok((results, Strategy::Term)),
                Err(e) => debug!(error = %e, query, "Term search failed, using substring match"),
            }
        }
        Ok((self.substring(query, options)?, Strategy::Substring))
    }

    /// The best definition for a name or qualified name.
    ///
    /// An exact `full_name` wins over a short-name match; among equals the
    /// longest body wins, so `from models import User` does not shadow the
    /// class it imports.
    pub fn get_definition(&self, name: &str) -> Result<Option<(Definition, String)>> {
        Ok(self.store.definitions_named(name)?.into_iter().next())
    }

    /// Look up a definition by id.
    pub fn get_definition_by_id(&self, id: DefinitionId) -> Result<Option<Definition>> {
        self.store.get_definition_by_id(id)
    }

    /// Uses of a name, or of a resolved qualified name.
    pub fn find_references(&self, name: &str, limit: usize) -> Result<Vec<(Reference, String)>> {
        self.store.find_references(name, limit)
    }

    /// Page through definitions.
    pub fn list_definitions(
        &self,
        filter: &DefinitionFilter<'_>,
    ) -> Result<Vec<(Definition, String)>> {
        self.store.list_definitions(filter)
    }

    fn wildcard(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let pattern = escape_like(query).replace('*', "%");
        let prefix = query.split('*').next().unwrap_or_default().to_lowercase();

        let mut params = SqlParams::new(options);
        let pattern = params.push(pattern);
        let filters = params.filters();
        let limit = params.limit();

        let mut results = self.run(
            &format!(
                "SELECT {DEFINITIONS_COLUMNS_D}, f.path, 0.0
                 FROM definitions d JOIN files f ON f.id = d.file_id
                 WHERE d.name LIKE ?{pattern} ESCAPE '\\' {filters}
                 ORDER BY length(d.name), d.name, f.path, d.line
                 LIMIT ?{limit}"
            ),
            &params,
        )?;

        for result in &mut results {
            result.score = if result.definition.name.to_lowercase() == prefix {
                EXACT_SCORE
            } else {
                OTHER_SCORE
            };
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        trace!(query, hits = results.len(), "Wildcard search");
        Ok(results)
    }

    fn term(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let expression = terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");

        let mut params = SqlParams::new(options);
        let expression = params.push(expression);
        let filters = params.filters();
        let limit = params.limit();

        let results = self.run(
            &format!(
                "SELECT {DEFINITIONS_COLUMNS_D}, f.path, -bm25(definitions_fts) AS score
                 FROM definitions_fts
                 JOIN definitions d ON d.id = definitions_fts.rowid
                 JOIN files f ON f.id = d.file_id
                 WHERE definitions_fts MATCH ?{expression} {filters}
                 ORDER BY score DESC, d.name, d.id
                 LIMIT ?{limit}"
            ),
            &params,
        )?;
        trace!(query, hits = results.len(), "Term search");
        Ok(results)
    }

    fn substring(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let lowered = query.to_lowercase();

        let mut params = SqlParams::new(options);
        let contains = params.push(format!("%{}%", escape_like(&lowered)));
        let exact = params.push(lowered.clone());
        let prefix = params.push(format!("{}%", escape_like(&lowered)));
        let filters = params.filters();
        let limit = params.limit();

        let results = self.run(
            &format!(
                "SELECT {DEFINITIONS_COLUMNS_D}, f.path,
                     CASE
                         WHEN lower(d.name) = ?{exact} THEN {EXACT_SCORE:.2}
                         WHEN lower(d.name) LIKE ?{prefix} ESCAPE '\\' THEN {PREFIX_SCORE:.2}
                         ELSE {OTHER_SCORE:.2}
                     END AS score
                 FROM definitions d JOIN files f ON f.id = d.file_id
                 WHERE d.search_text LIKE ?{contains} ESCAPE '\\' {filters}
                 ORDER BY score DESC, d.name, f.path, d.line
                 LIMIT ?{limit}"
            ),
            &params,
        )?;
        trace!(query, hits = results.len(), "Substring search");
        Ok(results)
    }

    fn run(&self, sql: &str, params: &SqlParams) -> Result<Vec<SearchResult>> {
        let conn = self.store.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let results = stmt
            .query_map(rusqlite::params_from_iter(params.values.iter()), |row| {
                Ok(SearchResult {
                    definition: row_to_definition(row)?,
                    file_path: row.get(15)?,
                    score: row.get(16)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }
}

/// Positional parameters for one search statement.
struct SqlParams {
    values: Vec<Box<dyn ToSql>>,
    kind: Option<DefinitionKind>,
    include_private: bool,
    limit: usize,
}

impl SqlParams {
    fn new(options: &SearchOptions) -> Self {
        Self {
            values: Vec::new(),
            kind: options.kind,
            include_private: options.include_private,
            limit: options.limit,
        }
    }

    /// Bind a value and return its 1-based position.
    fn push(&mut self, value: impl ToSql + 'static) -> usize {
        self.values.push(Box::new(value));
        self.values.len()
    }

    /// `AND ...` conditions for kind and visibility.
    fn filters(&mut self) -> String {
        let mut sql = String::new();
        if let Some(kind) = self.kind {
            let position = self.push(kind.as_str());
            sql.push_str(&format!(" AND d.kind = ?{position}"));
        }
        if !self.include_private {
            sql.push_str(" AND d.is_public = 1");
        }
        sql
    }

    fn limit(&mut self) -> usize {
        let limit = i64::try_from(self.limit).unwrap_or(i64::MAX);
        self.push(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{FileAnalysis, RawDefinition};
    use crate::db::FileRecord;

    fn def(name: &str, full_name: &str, kind: DefinitionKind, line: u32, end: u32) -> RawDefinition {
        let mut def = RawDefinition::new(name, full_name, kind, line, 0);
        def.end_line = Some(end);
        def
    }

    fn store_with(files: &[(&str, Vec<RawDefinition>)]) -> Store {
        let store = Store::open_in_memory().expect("should open store");
        for (path, definitions) in files {
            let analysis = FileAnalysis {
                definitions: definitions.clone(),
                ..FileAnalysis::default()
            };
            let record = FileRecord {
                path,
                content_hash: "hash",
                size: 0,
                modified_at: None,
            };
            store.replace_file(&record, &analysis).expect("should write file");
        }
        store.rebuild_term_index().expect("should build term index");
        store
    }

    fn sample() -> Store {
        store_with(&[
            (
                "app/users.py",
                vec![
                    def("UserService", "app.users.UserService", DefinitionKind::Class, 1, 30),
                    def("get_user_by_id", "app.users.UserService.get_user_by_id", DefinitionKind::Function, 3, 10),
                    def("_cache", "app.users._cache", DefinitionKind::Variable, 40, 40),
                    def("get", "app.users.get", DefinitionKind::Function, 42, 44),
                ],
            ),
            (
                "app/orders.py",
                vec![
                    def("User", "app.users.User", DefinitionKind::Variable, 1, 1),
                    def("OrderService", "app.orders.OrderService", DefinitionKind::Class, 3, 20),
                ],
            ),
            (
                "app/models.py",
                vec![def("User", "app.users.User", DefinitionKind::Class, 5, 25)],
            ),
        ])
    }

    fn names(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.definition.name.as_str()).collect()
    }

    // -- Strategy selection --

    #[test]
    fn empty_query_returns_nothing() {
        let store = sample();
        let engine = SearchEngine::new(&store);

        assert!(engine.search("   ", &SearchOptions::default()).expect("should search").is_empty());
    }

    #[test]
    fn wildcard_ranks_exact_prefix_first() {
        let store = sample();
        let engine = SearchEngine::new(&store);

        let (results, strategy) = engine
            .search_with_strategy("get*", &SearchOptions::default())
            .expect("should search");

        assert_eq!(strategy, Strategy::Wildcard);
        assert_eq!(names(&results), vec!["get", "get_user_by_id"]);
        assert!((results[0].score - EXACT_SCORE).abs() < f64::EPSILON);
        assert!((results[1].score - OTHER_SCORE).abs() < f64::EPSILON);
    }

    #[test]
    fn wildcard_escapes_like_metacharacters() {
        let store = sample();
        let engine = SearchEngine::new(&store);

        // `_` must not act as a single-character wildcard
        let results = engine
            .search("get_*", &SearchOptions::default())
            .expect("should search");

        assert_eq!(names(&results), vec!["get_user_by_id"]);
    }

    #[test]
    fn term_search_matches_split_identifiers() {
        let store = sample();
        let engine = SearchEngine::new(&store);

        let (results, strategy) = engine
            .search_with_strategy("userById", &SearchOptions::default())
            .expect("should search");

        assert_eq!(strategy, Strategy::Term);
        assert_eq!(results.first().map(|r| r.definition.name.as_str()), Some("get_user_by_id"));
        assert!(results.iter().all(|r| r.score > 0.0));
    }

    #[test]
    fn substring_fallback_without_term_index() {
        let store = sample();
        store
            .connection()
            .expect("should lock")
            .execute_batch("DROP TABLE definitions_fts;")
            .expect("should drop term index");
        let engine = SearchEngine::new(&store);

        let (results, strategy) = engine
            .search_with_strategy("service", &SearchOptions::default())
            .expect("should search");

        assert_eq!(strategy, Strategy::Substring);
        // the method matches through its qualified name
        assert_eq!(names(&results), vec!["OrderService", "UserService", "get_user_by_id"]);
    }

    #[test]
    fn substring_ranks_exact_then_prefix() {
        let store = sample();
        store
            .connection()
            .expect("should lock")
            .execute_batch("DROP TABLE definitions_fts;")
            .expect("should drop term index");
        let engine = SearchEngine::new(&store);

        let results = engine
            .search("user", &SearchOptions::default())
            .expect("should search");

        assert_eq!(results[0].definition.name, "User");
        assert!((results[0].score - EXACT_SCORE).abs() < f64::EPSILON);
        let service = results
            .iter()
            .find(|r| r.definition.name == "UserService")
            .expect("UserService matches");
        assert!((service.score - PREFIX_SCORE).abs() < f64::EPSILON);
    }

    // -- Filters --

    #[test]
    fn kind_filter_and_privacy_apply_to_every_strategy() {
        let store = sample();
        let engine = SearchEngine::new(&store);
        let classes = SearchOptions {
            kind: Some(DefinitionKind::Class),
            ..SearchOptions::default()
        };

        let results = engine.search("*Service", &classes).expect("should search");
        assert_eq!(results.len(), 2);

        let results = engine.search("user", &classes).expect("should search");
        assert!(results.iter().all(|r| r.definition.kind == DefinitionKind::Class));

        let public = engine.search("cache", &SearchOptions::default()).expect("should search");
        assert!(public.is_empty());
        let private = engine
            .search(
                "cache",
                &SearchOptions {
                    include_private: true,
                    ..SearchOptions::default()
                },
            )
            .expect("should search");
        assert_eq!(names(&private), vec!["_cache"]);
    }

    #[test]
    fn limit_caps_results() {
        let store = sample();
        let engine = SearchEngine::new(&store);

        let results = engine
            .search(
                "*",
                &SearchOptions {
                    limit: 2,
                    ..SearchOptions::default()
                },
            )
            .expect("should search");

        assert_eq!(results.len(), 2);
    }

    // -- Lookup --

    #[test]
    fn get_definition_prefers_longest_body_over_import_alias() {
        let store = sample();
        let engine = SearchEngine::new(&store);

        let (definition, path) = engine
            .get_definition("app.users.User")
            .expect("should look up")
            .expect("User is defined");

        assert_eq!(definition.kind, DefinitionKind::Class);
        assert_eq!(path, "app/models.py");
    }

    #[test]
    fn get_definition_by_short_name_and_id() {
        let store = sample();
        let engine = SearchEngine::new(&store);

        let (definition, _) = engine
            .get_definition("OrderService")
            .expect("should look up")
            .expect("OrderService is defined");
        let by_id = engine
            .get_definition_by_id(definition.id)
            .expect("should look up")
            .expect("id exists");

        assert_eq!(by_id, definition);
        assert!(engine.get_definition("Missing").expect("should look up").is_none());
    }
}
