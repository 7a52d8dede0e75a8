//! Identifier tokenization and precomputed search text.
//!
//! `search_text` carries both the raw lowercase identifiers (for prefix and
//! substring matching) and their split tokens (for term matching), so queries
//! never re-tokenize stored rows.

/// Split an identifier into lowercase, space-separated tokens.
///
/// Handles camelCase, PascalCase, acronyms (`XMLParser` → `xml parser`),
/// snake_case and kebab-case.
#[must_use]
pub fn split_identifier(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();

    // lowercase followed by uppercase: getUser -> get User
    let mut camel: Vec<char> = Vec::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && chars[i - 1].is_ascii_lowercase() && c.is_ascii_uppercase() {
            camel.push(' ');
        }
        camel.push(c);
    }

    // acronym followed by a capitalized word: XMLParser -> XML Parser
    let mut split = String::with_capacity(camel.len() + 4);
    for (i, &c) in camel.iter().enumerate() {
        let acronym_end = i > 0
            && camel[i - 1].is_ascii_uppercase()
            && c.is_ascii_uppercase()
            && camel.get(i + 1).is_some_and(char::is_ascii_lowercase);
        if acronym_end {
            split.push(' ');
        }
        split.push(match c {
            '_' | '-' => ' ',
            other => other,
        });
    }

    normalize(&split)
}

/// Build the `search_text` column for a definition.
///
/// Joins the lowercase name, its split tokens, the dotted full name with dots
/// as spaces, its split tokens, and the lowercase docstring.
#[must_use]
pub fn make_search_text(name: &str, full_name: Option<&str>, docstring: Option<&str>) -> String {
    let mut parts = vec![name.to_lowercase(), split_identifier(name)];

    if let Some(full_name) = full_name.filter(|f| !f.is_empty()) {
        let spaced = full_name.replace('.', " ");
        parts.push(spaced.to_lowercase());
        parts.push(split_identifier(&spaced));
    }

    if let Some(doc) = docstring.filter(|d| !d.trim().is_empty()) {
        parts.push(doc.to_lowercase());
    }

    normalize(&parts.join(" "))
}

/// Tokens a term query should match: each query word as typed (lowercased)
/// followed by its identifier split, without duplicates.
#[must_use]
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let raw = word.to_lowercase();
        if !terms.contains(&raw) {
            terms.push(raw);
        }
        for token in split_identifier(word).split(' ').filter(|t| !t.is_empty()) {
            if !terms.iter().any(|t| t == token) {
                terms.push(token.to_string());
            }
        }
    }
    terms
}

fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}
