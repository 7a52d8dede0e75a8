//! Shared tree-sitter helpers for analyzers.
//!
//! Positions are reported as 1-based lines and 0-based byte columns.

// Tree-sitter returns usize for positions, but we store u32 for compactness.
// This is safe for practical source files (no file has 4 billion lines).
#![allow(clippy::cast_possible_truncation)]

use tree_sitter::Node;

/// Source text covered by a node.
///
/// Returns `None` if the byte range does not fall on character boundaries.
pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    let text = source.get(node.byte_range());
    if text.is_none() {
        tracing::trace!(
            byte_range = ?node.byte_range(),
            node_kind = %node.kind(),
            "Node range is not on a character boundary"
        );
    }
    text
}

/// `(line, column)` where a node starts.
pub(crate) fn start_position(node: Node<'_>) -> (u32, u32) {
    let point = node.start_position();
    (point.row as u32 + 1, point.column as u32)
}

/// `(line, column)` where a node ends.
pub(crate) fn end_position(node: Node<'_>) -> (u32, u32) {
    let point = node.end_position();
    (point.row as u32 + 1, point.column as u32)
}

/// Named children of a node, comments excluded.
pub(crate) fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

/// Every `identifier` node at or below `node`.
pub(crate) fn identifiers(node: Node<'_>) -> Vec<Node<'_>> {
    let mut found = Vec::new();
    collect_identifiers(node, &mut found);
    found
}

fn collect_identifiers<'t>(node: Node<'t>, found: &mut Vec<Node<'t>>) {
    if node.kind() == "identifier" {
        found.push(node);
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_identifiers(child, found);
    }
}

/// Collapse runs of whitespace to single spaces and tighten brackets.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("( ", "(")
        .replace(" )", ")")
        .replace(",)", ")")
}
