//! Python analysis with tree-sitter-python.
//!
//! Extraction runs in two passes over one syntax tree. The first pass walks
//! scopes and records definitions, imports, decorators and class bases, and
//! remembers every identifier that *binds* a name. The second pass emits a
//! reference for every other identifier, numbering call sites per scope and
//! resolving targets against the bindings the first pass collected.
//!
//! Resolution is lexical and best-effort: enclosing scopes (class bodies are
//! only visible from directly inside them), then module bindings and imports,
//! then `self.attr` inside methods, then Python builtins.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use tree_sitter::{Node, Parser};

use super::tree_sitter_utils::{
    collapse_whitespace, end_position, identifiers, named_children, node_text, start_position,
};
use super::{
    AnalysisRequest, AnalyzeError, Analyzer, FileAnalysis, RawClassBase, RawDecorator,
    RawDefinition, RawImport, RawReference, is_call_site, make_context,
};
use crate::types::DefinitionKind;

/// Node kinds of the tree-sitter-python grammar used here.
mod node_kinds {
    pub const CLASS_DEFINITION: &str = "class_definition";
    pub const FUNCTION_DEFINITION: &str = "function_definition";
    pub const DECORATED_DEFINITION: &str = "decorated_definition";
    pub const DECORATOR: &str = "decorator";

    pub const IMPORT_STATEMENT: &str = "import_statement";
    pub const IMPORT_FROM_STATEMENT: &str = "import_from_statement";
    pub const FUTURE_IMPORT_STATEMENT: &str = "future_import_statement";
    pub const ALIASED_IMPORT: &str = "aliased_import";
    pub const DOTTED_NAME: &str = "dotted_name";
    pub const WILDCARD_IMPORT: &str = "wildcard_import";

    pub const ASSIGNMENT: &str = "assignment";
    pub const FOR_STATEMENT: &str = "for_statement";
    pub const FOR_IN_CLAUSE: &str = "for_in_clause";
    pub const NAMED_EXPRESSION: &str = "named_expression";
    pub const AS_PATTERN: &str = "as_pattern";
    pub const GLOBAL_STATEMENT: &str = "global_statement";
    pub const NONLOCAL_STATEMENT: &str = "nonlocal_statement";
    pub const KEYWORD_ARGUMENT: &str = "keyword_argument";
    pub const LAMBDA: &str = "lambda";

    pub const PATTERN_LIST: &str = "pattern_list";
    pub const TUPLE_PATTERN: &str = "tuple_pattern";
    pub const LIST_PATTERN: &str = "list_pattern";
    pub const LIST_SPLAT_PATTERN: &str = "list_splat_pattern";
    pub const TUPLE: &str = "tuple";
    pub const LIST: &str = "list";
    pub const LIST_SPLAT: &str = "list_splat";
    pub const PARENTHESIZED_EXPRESSION: &str = "parenthesized_expression";

    pub const TYPED_PARAMETER: &str = "typed_parameter";
    pub const DEFAULT_PARAMETER: &str = "default_parameter";
    pub const TYPED_DEFAULT_PARAMETER: &str = "typed_default_parameter";
    pub const DICTIONARY_SPLAT_PATTERN: &str = "dictionary_splat_pattern";

    pub const EXPRESSION_STATEMENT: &str = "expression_statement";
    pub const STRING: &str = "string";
    pub const CALL: &str = "call";
    pub const ATTRIBUTE: &str = "attribute";
    pub const IDENTIFIER: &str = "identifier";
}

use node_kinds::{
    ALIASED_IMPORT, AS_PATTERN, ASSIGNMENT, ATTRIBUTE, CALL, CLASS_DEFINITION,
    DECORATED_DEFINITION, DECORATOR, DEFAULT_PARAMETER, DICTIONARY_SPLAT_PATTERN, DOTTED_NAME,
    EXPRESSION_STATEMENT, FOR_IN_CLAUSE, FOR_STATEMENT, FUNCTION_DEFINITION,
    FUTURE_IMPORT_STATEMENT, GLOBAL_STATEMENT, IDENTIFIER, IMPORT_FROM_STATEMENT,
    IMPORT_STATEMENT, KEYWORD_ARGUMENT, LAMBDA, LIST, LIST_PATTERN, LIST_SPLAT,
    LIST_SPLAT_PATTERN, NAMED_EXPRESSION, NONLOCAL_STATEMENT, PARENTHESIZED_EXPRESSION,
    PATTERN_LIST, STRING, TUPLE, TUPLE_PATTERN, TYPED_DEFAULT_PARAMETER, TYPED_PARAMETER,
    WILDCARD_IMPORT,
};

/// Decorators that turn a method into a `property` definition.
const PROPERTY_DECORATORS: &[&str] = &["property", "cached_property", "functools.cached_property"];

/// Names resolved to `builtins.<name>` when nothing else binds them.
const BUILTINS: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "breakpoint", "bytearray", "bytes", "callable",
    "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir", "divmod", "enumerate",
    "eval", "exec", "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr",
    "hash", "help", "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "locals", "map", "max", "memoryview", "min", "next", "object", "oct", "open", "ord", "pow",
    "print", "property", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
    "BaseException", "Exception", "ArithmeticError", "AssertionError", "AttributeError",
    "ImportError", "IndexError", "KeyError", "LookupError", "NotImplementedError", "OSError",
    "RuntimeError", "StopIteration", "TypeError", "ValueError", "NotImplemented", "Ellipsis",
];

/// Analyzer for `.py` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonAnalyzer;

impl PythonAnalyzer {
    /// Create a Python analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for PythonAnalyzer {
    fn extensions(&self) -> &[&'static str] {
        &["py"]
    }

    fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<FileAnalysis, AnalyzeError> {
        let bytes = std::fs::read(request.path)?;
        let source = String::from_utf8(bytes).map_err(|_| AnalyzeError::Encoding)?;
        analyze_source(&source, request.relative_path, request.resolve_refs)
    }
}

/// Analyze Python source text as if it lived at `relative_path`.
pub fn analyze_source(
    source: &str,
    relative_path: &str,
    resolve_refs: bool,
) -> Result<FileAnalysis, AnalyzeError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| AnalyzeError::Parse(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AnalyzeError::Parse("parser produced no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        debug!(path = relative_path, "Syntax errors present, extracting what parsed");
    }

    let mut extractor = Extractor::new(source, relative_path, resolve_refs);
    extractor.collect(root, MODULE_SCOPE);
    extractor.resolve_bases();
    let mut frames = vec![CallFrame::default()];
    extractor.walk_references(root, MODULE_SCOPE, &mut frames);

    Ok(extractor.analysis)
}

/// Dotted module name and package for a relative path.
///
/// `pkg/mod.py` is `pkg.mod` in package `pkg`; `pkg/__init__.py` is `pkg`
/// and is its own package.
#[must_use]
pub fn module_name(relative_path: &str) -> (String, String) {
    let trimmed = relative_path.strip_suffix(".py").unwrap_or(relative_path);
    let mut parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();

    if parts.last() == Some(&"__init__") && parts.len() > 1 {
        parts.pop();
        let module = parts.join(".");
        return (module.clone(), module);
    }

    let module = parts.join(".");
    let package = parts[..parts.len().saturating_sub(1)].join(".");
    (module, package)
}

/// Resolve a `from .x import y` module against the importing package.
fn resolve_relative(package: &str, module: &str) -> String {
    let dots = module.chars().take_while(|&c| c == '.').count();
    if dots == 0 {
        return module.to_string();
    }

    let rest = &module[dots..];
    let mut base: Vec<&str> = package.split('.').filter(|p| !p.is_empty()).collect();
    for _ in 1..dots {
        base.pop();
    }
    if !rest.is_empty() {
        base.push(rest);
    }
    base.join(".")
}

/// Strip quotes and string prefixes from a docstring literal and dedent it.
fn clean_docstring(raw: &str) -> Option<String> {
    let unprefixed = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find_map(|quote| {
            unprefixed
                .strip_prefix(quote)
                .map(|rest| rest.strip_suffix(quote).unwrap_or(rest))
        })?;

    let mut lines = inner.lines();
    let first = lines.next().unwrap_or_default().trim();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned = first.to_string();
    for line in rest {
        cleaned.push('\n');
        cleaned.push_str(line.get(indent..).unwrap_or("").trim_end());
    }

    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

const MODULE_SCOPE: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    Function,
}

#[derive(Debug)]
struct Scope {
    full_name: String,
    kind: ScopeKind,
    parent: Option<usize>,
    bindings: HashMap<String, Binding>,
}

#[derive(Debug, Clone)]
struct Binding {
    full_name: String,
    module: String,
    kind: DefinitionKind,
    imported: bool,
}

#[derive(Debug)]
struct PendingBase {
    class_full_name: String,
    base_name: String,
    scope: usize,
    position: u32,
}

/// Call numbering state for one scope.
#[derive(Debug, Default)]
struct CallFrame {
    order: u32,
    depth: u32,
}

struct Extractor<'s> {
    source: &'s str,
    lines: Vec<&'s str>,
    module: String,
    package: String,
    resolve_refs: bool,
    scopes: Vec<Scope>,
    /// Definition node id -> the scope its body opens
    scope_by_node: HashMap<usize, usize>,
    /// Identifier node ids that bind a name rather than use one
    binding_nodes: HashSet<usize>,
    /// Identifier node id -> index into `analysis.references`
    reference_by_node: HashMap<usize, usize>,
    pending_bases: Vec<PendingBase>,
    analysis: FileAnalysis,
}

impl<'s> Extractor<'s> {
    fn new(source: &'s str, relative_path: &str, resolve_refs: bool) -> Self {
        let (module, package) = module_name(relative_path);
        Self {
            source,
            lines: source.lines().collect(),
            scopes: vec![Scope {
                full_name: module.clone(),
                kind: ScopeKind::Module,
                parent: None,
                bindings: HashMap::new(),
            }],
            module,
            package,
            resolve_refs,
            scope_by_node: HashMap::new(),
            binding_nodes: HashSet::new(),
            reference_by_node: HashMap::new(),
            pending_bases: Vec::new(),
            analysis: FileAnalysis::default(),
        }
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        node_text(node, self.source).unwrap_or_default()
    }

    fn qualify(&self, scope: usize, name: &str) -> String {
        let prefix = &self.scopes[scope].full_name;
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        }
    }

    /// Record a definition bound in `scope` and return its index.
    fn define(
        &mut self,
        scope: usize,
        name_node: Node<'_>,
        extent: Node<'_>,
        kind: DefinitionKind,
    ) -> usize {
        let name = self.text(name_node).to_string();
        let full_name = self.qualify(scope, &name);
        self.define_as(scope, name_node, extent, kind, &name, full_name, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn define_as(
        &mut self,
        scope: usize,
        name_node: Node<'_>,
        extent: Node<'_>,
        kind: DefinitionKind,
        name: &str,
        full_name: String,
        imported: bool,
    ) -> usize {
        let (line, col) = start_position(name_node);
        let (end_line, end_col) = end_position(extent);

        let module = match (kind, imported) {
            (DefinitionKind::Module, _) => full_name.clone(),
            (_, true) => full_name
                .rsplit_once('.')
                .map_or_else(|| full_name.clone(), |(m, _)| m.to_string()),
            _ => self.module.clone(),
        };
        self.scopes[scope].bindings.insert(
            name.to_string(),
            Binding {
                full_name: full_name.clone(),
                module,
                kind,
                imported,
            },
        );
        self.binding_nodes.insert(name_node.id());

        let mut def = RawDefinition::new(name, &full_name, kind, line, col);
        def.end_line = Some(end_line);
        def.end_col = Some(end_col);
        self.analysis.definitions.push(def);
        self.analysis.definitions.len() - 1
    }

    fn push_scope(&mut self, node: Node<'_>, full_name: String, kind: ScopeKind, parent: usize) -> usize {
        self.scopes.push(Scope {
            full_name,
            kind,
            parent: Some(parent),
            bindings: HashMap::new(),
        });
        let index = self.scopes.len() - 1;
        self.scope_by_node.insert(node.id(), index);
        index
    }

    fn mark_bindings(&mut self, node: Node<'_>) {
        for ident in identifiers(node) {
            self.binding_nodes.insert(ident.id());
        }
    }

    // -- First pass: definitions --

    fn collect(&mut self, node: Node<'_>, scope: usize) {
        match node.kind() {
            CLASS_DEFINITION => {
                self.collect_class(node, scope, &[]);
                return;
            }
            FUNCTION_DEFINITION => {
                self.collect_function(node, scope, &[]);
                return;
            }
            DECORATED_DEFINITION => {
                self.collect_decorated(node, scope);
                return;
            }
            IMPORT_STATEMENT => {
                self.collect_import(node, scope);
                return;
            }
            IMPORT_FROM_STATEMENT => {
                self.collect_import_from(node, scope);
                return;
            }
            FUTURE_IMPORT_STATEMENT => {
                self.mark_bindings(node);
                return;
            }
            ASSIGNMENT => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.collect_targets(left, node, scope);
                }
            }
            FOR_STATEMENT => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.collect_targets(left, left, scope);
                }
            }
            NAMED_EXPRESSION => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.collect_targets(name, node, scope);
                }
            }
            AS_PATTERN => {
                if let Some(alias) = node.child_by_field_name("alias") {
                    for ident in identifiers(alias) {
                        self.define(scope, ident, ident, DefinitionKind::Variable);
                    }
                }
            }
            FOR_IN_CLAUSE => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.mark_bindings(left);
                }
            }
            LAMBDA => {
                if let Some(params) = node.child_by_field_name("parameters") {
                    self.mark_bindings(params);
                }
            }
            KEYWORD_ARGUMENT => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.binding_nodes.insert(name.id());
                }
            }
            GLOBAL_STATEMENT | NONLOCAL_STATEMENT => {
                self.mark_bindings(node);
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect(child, scope);
        }
    }

    /// Bind assignment-like targets. `extent` is the statement whose end
    /// becomes the definition's end.
    fn collect_targets(&mut self, target: Node<'_>, extent: Node<'_>, scope: usize) {
        match target.kind() {
            IDENTIFIER => {
                self.define(scope, target, extent, DefinitionKind::Variable);
            }
            PATTERN_LIST | TUPLE_PATTERN | LIST_PATTERN | TUPLE | LIST | LIST_SPLAT_PATTERN
            | LIST_SPLAT | PARENTHESIZED_EXPRESSION => {
                for child in named_children(target) {
                    self.collect_targets(child, extent, scope);
                }
            }
            ATTRIBUTE => self.collect_self_attribute(target, extent, scope),
            _ => {}
        }
    }

    /// `self.name = ...` inside a method defines `Class.name`.
    fn collect_self_attribute(&mut self, target: Node<'_>, extent: Node<'_>, scope: usize) {
        let (Some(object), Some(attr)) = (
            target.child_by_field_name("object"),
            target.child_by_field_name("attribute"),
        ) else {
            return;
        };
        if object.kind() != IDENTIFIER || self.text(object) != "self" {
            return;
        }
        let Some(class_scope) = self.enclosing_class(scope) else {
            return;
        };
        self.define(class_scope, attr, extent, DefinitionKind::Variable);
    }

    /// The class whose method body `scope` is.
    fn enclosing_class(&self, scope: usize) -> Option<usize> {
        let current = &self.scopes[scope];
        if current.kind != ScopeKind::Function {
            return None;
        }
        let parent = current.parent?;
        (self.scopes[parent].kind == ScopeKind::Class).then_some(parent)
    }

    fn collect_decorated(&mut self, node: Node<'_>, scope: usize) {
        let decorators: Vec<Node<'_>> = named_children(node)
            .into_iter()
            .filter(|child| child.kind() == DECORATOR)
            .collect();
        for &decorator in &decorators {
            self.collect(decorator, scope);
        }

        match node.child_by_field_name("definition") {
            Some(def) if def.kind() == CLASS_DEFINITION => {
                self.collect_class(def, scope, &decorators);
            }
            Some(def) if def.kind() == FUNCTION_DEFINITION => {
                self.collect_function(def, scope, &decorators);
            }
            _ => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.collect(child, scope);
                }
            }
        }
    }

    /// Split a decorator into its name and raw argument text.
    fn parse_decorator(&self, decorator: Node<'_>) -> Option<(String, Option<String>)> {
        let expr = named_children(decorator).into_iter().next()?;
        if expr.kind() == CALL {
            let function = expr.child_by_field_name("function")?;
            let arguments = expr.child_by_field_name("arguments").map(|args| {
                let text = self.text(args);
                let inner = text
                    .strip_prefix('(')
                    .and_then(|t| t.strip_suffix(')'))
                    .unwrap_or(text);
                collapse_whitespace(inner)
            });
            Some((collapse_whitespace(self.text(function)), arguments))
        } else {
            Some((collapse_whitespace(self.text(expr)), None))
        }
    }

    fn record_decorators(&mut self, owner_full_name: &str, decorators: &[(String, Option<String>, u32)]) {
        for (name, arguments, line) in decorators {
            self.analysis.decorators.push(RawDecorator {
                owner_full_name: owner_full_name.to_string(),
                name: name.clone(),
                arguments: arguments.clone(),
                line: *line,
            });
        }
    }

    fn parsed_decorators(&self, decorators: &[Node<'_>]) -> Vec<(String, Option<String>, u32)> {
        decorators
            .iter()
            .filter_map(|&dec| {
                let (name, arguments) = self.parse_decorator(dec)?;
                Some((name, arguments, start_position(dec).0))
            })
            .collect()
    }

    fn collect_function(&mut self, node: Node<'_>, scope: usize, decorators: &[Node<'_>]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let decorators = self.parsed_decorators(decorators);
        let kind = if decorators
            .iter()
            .any(|(name, _, _)| PROPERTY_DECORATORS.contains(&name.as_str()))
        {
            DefinitionKind::Property
        } else {
            DefinitionKind::Function
        };

        let index = self.define(scope, name_node, node, kind);
        let full_name = self.analysis.definitions[index].full_name.clone();
        let signature = self.function_signature(node);
        let docstring = self.docstring(node.child_by_field_name("body"));
        let def = &mut self.analysis.definitions[index];
        def.signature = signature;
        def.docstring = docstring;
        self.record_decorators(&full_name, &decorators);

        let inner = self.push_scope(node, full_name, ScopeKind::Function, scope);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.collect_parameters(params, scope, inner);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.collect(body, inner);
        }
    }

    /// Parameters bind in the function scope; defaults evaluate outside it.
    fn collect_parameters(&mut self, params: Node<'_>, outer: usize, inner: usize) {
        for param in named_children(params) {
            let name = match param.kind() {
                IDENTIFIER => Some(param),
                TYPED_PARAMETER | LIST_SPLAT_PATTERN | DICTIONARY_SPLAT_PATTERN => {
                    named_children(param).into_iter().find(|c| c.kind() == IDENTIFIER)
                }
                DEFAULT_PARAMETER | TYPED_DEFAULT_PARAMETER => param.child_by_field_name("name"),
                _ => None,
            };
            if let Some(name) = name {
                self.define(inner, name, param, DefinitionKind::Param);
            }
            if let Some(value) = param.child_by_field_name("value") {
                self.collect(value, outer);
            }
        }
    }

    fn collect_class(&mut self, node: Node<'_>, scope: usize, decorators: &[Node<'_>]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let decorators = self.parsed_decorators(decorators);
        let body = node.child_by_field_name("body");

        let index = self.define(scope, name_node, node, DefinitionKind::Class);
        let full_name = self.analysis.definitions[index].full_name.clone();
        let signature = self.class_signature(self.text(name_node), body);
        let docstring = self.docstring(body);
        let def = &mut self.analysis.definitions[index];
        def.signature = Some(signature);
        def.docstring = docstring;
        self.record_decorators(&full_name, &decorators);

        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut position = 0;
            for base in named_children(superclasses) {
                match base.kind() {
                    KEYWORD_ARGUMENT => {
                        if let Some(name) = base.child_by_field_name("name") {
                            self.binding_nodes.insert(name.id());
                        }
                    }
                    LIST_SPLAT | "dictionary_splat" => {}
                    _ => {
                        self.pending_bases.push(PendingBase {
                            class_full_name: full_name.clone(),
                            base_name: collapse_whitespace(self.text(base)),
                            scope,
                            position,
                        });
                        position += 1;
                    }
                }
            }
        }

        let inner = self.push_scope(node, full_name, ScopeKind::Class, scope);
        if let Some(body) = body {
            self.collect(body, inner);
        }
    }

    fn collect_import(&mut self, node: Node<'_>, scope: usize) {
        self.mark_bindings(node);
        let line = start_position(node).0;

        let mut cursor = node.walk();
        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for item in names {
            let (module_node, alias_node) = match item.kind() {
                DOTTED_NAME => (item, None),
                ALIASED_IMPORT => match item.child_by_field_name("name") {
                    Some(name) => (name, item.child_by_field_name("alias")),
                    None => continue,
                },
                _ => continue,
            };
            let module = self.text(module_node).to_string();

            // `import a.b` binds `a`; `import a.b as c` binds `c` to `a.b`
            let (name_node, bound, full_name) = match alias_node {
                Some(alias) => (alias, self.text(alias).to_string(), module.clone()),
                None => {
                    let head = module.split('.').next().unwrap_or_default().to_string();
                    let first = named_children(module_node).into_iter().next().unwrap_or(module_node);
                    (first, head.clone(), head)
                }
            };
            self.define_as(scope, name_node, node, DefinitionKind::Module, &bound, full_name, true);

            self.analysis.imports.push(RawImport {
                module,
                name: None,
                alias: alias_node.map(|a| self.text(a).to_string()),
                line,
            });
        }
    }

    fn collect_import_from(&mut self, node: Node<'_>, scope: usize) {
        self.mark_bindings(node);
        let line = start_position(node).0;
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = resolve_relative(&self.package, self.text(module_node));

        if named_children(node).iter().any(|c| c.kind() == WILDCARD_IMPORT) {
            self.analysis.imports.push(RawImport {
                module,
                name: Some("*".to_string()),
                alias: None,
                line,
            });
            return;
        }

        let mut cursor = node.walk();
        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for item in names {
            let (name_node, alias_node) = match item.kind() {
                DOTTED_NAME => (item, None),
                ALIASED_IMPORT => match item.child_by_field_name("name") {
                    Some(name) => (name, item.child_by_field_name("alias")),
                    None => continue,
                },
                _ => continue,
            };
            let imported = self.text(name_node).to_string();
            let alias = alias_node.map(|a| self.text(a).to_string());
            let bound = alias
                .clone()
                .unwrap_or_else(|| imported.rsplit('.').next().unwrap_or_default().to_string());
            let full_name = if module.is_empty() {
                imported.clone()
            } else {
                format!("{module}.{imported}")
            };
            let binder = alias_node.unwrap_or(name_node);
            self.define_as(scope, binder, node, DefinitionKind::Variable, &bound, full_name, true);

            self.analysis.imports.push(RawImport {
                module: module.clone(),
                name: Some(imported),
                alias,
                line,
            });
        }
    }

    /// `name(params) -> ret`.
    fn function_signature(&self, node: Node<'_>) -> Option<String> {
        let name = self.text(node.child_by_field_name("name")?);
        let params = collapse_whitespace(self.text(node.child_by_field_name("parameters")?));
        let mut signature = format!("{name}{params}");
        if let Some(ret) = node.child_by_field_name("return_type") {
            signature.push_str(" -> ");
            signature.push_str(&collapse_whitespace(self.text(ret)));
        }
        Some(signature)
    }

    /// A class is called with its `__init__` parameters, minus `self`.
    fn class_signature(&self, name: &str, body: Option<Node<'_>>) -> String {
        let init = body.and_then(|body| {
            named_children(body).into_iter().find_map(|stmt| {
                let func = match stmt.kind() {
                    FUNCTION_DEFINITION => stmt,
                    DECORATED_DEFINITION => stmt.child_by_field_name("definition")?,
                    _ => return None,
                };
                let is_init = func
                    .child_by_field_name("name")
                    .is_some_and(|n| self.text(n) == "__init__");
                is_init.then_some(func)
            })
        });

        let params: Vec<String> = init
            .and_then(|init| init.child_by_field_name("parameters"))
            .map(|params| {
                named_children(params)
                    .into_iter()
                    .skip(1)
                    .map(|p| collapse_whitespace(self.text(p)))
                    .collect()
            })
            .unwrap_or_default();

        format!("{name}({})", params.join(", "))
    }

    /// The first statement of a body, when it is a string literal.
    fn docstring(&self, body: Option<Node<'_>>) -> Option<String> {
        let first = named_children(body?).into_iter().next()?;
        if first.kind() != EXPRESSION_STATEMENT {
            return None;
        }
        let string = named_children(first).into_iter().next()?;
        if string.kind() != STRING {
            return None;
        }
        clean_docstring(self.text(string))
    }

    fn resolve_bases(&mut self) {
        for pending in std::mem::take(&mut self.pending_bases) {
            let base_full_name = self.resolve_dotted(pending.scope, &pending.base_name);
            self.analysis.class_bases.push(RawClassBase {
                class_full_name: pending.class_full_name,
                base_name: pending.base_name,
                base_full_name,
                position: pending.position,
            });
        }
    }

    // -- Resolution --

    fn lookup(&self, scope: usize, name: &str) -> Option<&Binding> {
        let mut current = Some(scope);
        let mut innermost = true;
        while let Some(index) = current {
            let s = &self.scopes[index];
            if (innermost || s.kind != ScopeKind::Class)
                && let Some(binding) = s.bindings.get(name)
            {
                return Some(binding);
            }
            innermost = false;
            current = s.parent;
        }
        None
    }

    /// Resolve `a.b.C` (subscripts ignored) through the bindings visible in `scope`.
    fn resolve_dotted(&self, scope: usize, text: &str) -> Option<String> {
        let text = text.split('[').next().unwrap_or(text).trim();
        let (head, rest) = match text.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (text, None),
        };
        if !is_identifier(head) {
            return None;
        }

        if let Some(binding) = self.lookup(scope, head) {
            return Some(match rest {
                Some(rest) => format!("{}.{rest}", binding.full_name),
                None => binding.full_name.clone(),
            });
        }
        (rest.is_none() && BUILTINS.contains(&head)).then(|| format!("builtins.{head}"))
    }

    /// `(target_full_name, target_module_path)` for an identifier use.
    fn resolve_reference(
        &self,
        node: Node<'_>,
        name: &str,
        scope: usize,
    ) -> (Option<String>, Option<String>) {
        if let Some(parent) = node.parent()
            && parent.kind() == ATTRIBUTE
            && parent.child_by_field_name("attribute").map(|a| a.id()) == Some(node.id())
        {
            return self.resolve_attribute(parent, name, scope);
        }

        if let Some(binding) = self.lookup(scope, name) {
            return (Some(binding.full_name.clone()), Some(binding.module.clone()));
        }
        if BUILTINS.contains(&name) {
            return (Some(format!("builtins.{name}")), Some("builtins".to_string()));
        }
        (None, None)
    }

    fn resolve_attribute(
        &self,
        attribute: Node<'_>,
        name: &str,
        scope: usize,
    ) -> (Option<String>, Option<String>) {
        let Some(object) = attribute.child_by_field_name("object") else {
            return (None, None);
        };
        if object.kind() != IDENTIFIER {
            return (None, None);
        }
        let object_name = self.text(object);

        if matches!(object_name, "self" | "cls")
            && let Some(class_scope) = self.enclosing_class(scope)
        {
            let class = &self.scopes[class_scope];
            return (
                Some(format!("{}.{name}", class.full_name)),
                Some(self.module.clone()),
            );
        }

        match self.lookup(scope, object_name) {
            Some(binding)
                if binding.imported
                    || matches!(binding.kind, DefinitionKind::Module | DefinitionKind::Class) =>
            {
                let module = if binding.kind == DefinitionKind::Module {
                    binding.full_name.clone()
                } else {
                    binding.module.clone()
                };
                (Some(format!("{}.{name}", binding.full_name)), Some(module))
            }
            _ => (None, None),
        }
    }

    // -- Second pass: references --

    fn walk_references(&mut self, node: Node<'_>, scope: usize, frames: &mut Vec<CallFrame>) {
        match node.kind() {
            IDENTIFIER => {
                if !self.binding_nodes.contains(&node.id()) {
                    self.push_reference(node, scope);
                }
                return;
            }
            IMPORT_STATEMENT | IMPORT_FROM_STATEMENT | FUTURE_IMPORT_STATEMENT => return,
            CLASS_DEFINITION | FUNCTION_DEFINITION => {
                let body_id = node.child_by_field_name("body").map(|b| b.id());
                let inner = self.scope_by_node.get(&node.id()).copied();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match inner {
                        Some(inner) if Some(child.id()) == body_id => {
                            frames.push(CallFrame::default());
                            self.walk_references(child, inner, frames);
                            frames.pop();
                        }
                        _ => self.walk_references(child, scope, frames),
                    }
                }
                return;
            }
            CALL => {
                self.walk_call(node, scope, frames);
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_references(child, scope, frames);
        }
    }

    /// Depth rises on entry; order is assigned once the call's subtree is done.
    fn walk_call(&mut self, node: Node<'_>, scope: usize, frames: &mut Vec<CallFrame>) {
        let depth = match frames.last_mut() {
            Some(frame) => {
                frame.depth += 1;
                frame.depth
            }
            None => return,
        };

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_references(child, scope, frames);
        }

        let order = match frames.last_mut() {
            Some(frame) => {
                frame.depth -= 1;
                frame.order += 1;
                frame.order
            }
            None => return,
        };

        let callee = node.child_by_field_name("function").and_then(|f| match f.kind() {
            IDENTIFIER => Some(f),
            ATTRIBUTE => f.child_by_field_name("attribute"),
            _ => None,
        });
        if let Some(callee) = callee
            && let Some(&index) = self.reference_by_node.get(&callee.id())
        {
            let reference = &mut self.analysis.references[index];
            reference.call_order = order;
            reference.call_depth = depth;
        }
    }

    fn push_reference(&mut self, node: Node<'_>, scope: usize) {
        let name = self.text(node);
        if name.is_empty() {
            return;
        }
        let (line, col) = start_position(node);
        let line_text = self
            .lines
            .get(node.start_position().row)
            .copied()
            .unwrap_or_default();
        let is_call = is_call_site(line_text, node.start_position().column + name.len());

        let (target_full_name, target_module_path) = if self.resolve_refs {
            self.resolve_reference(node, name, scope)
        } else {
            (None, None)
        };

        self.reference_by_node
            .insert(node.id(), self.analysis.references.len());
        self.analysis.references.push(RawReference {
            name: name.to_string(),
            line,
            col,
            context: make_context(line_text),
            target_full_name,
            target_module_path,
            is_call,
            call_order: 0,
            call_depth: 0,
        });
    }
}
