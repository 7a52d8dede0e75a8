//! Helper functions for database row conversion and parsing.
//!
//! Also provides SQL column list constants so every query module reads rows
//! in the same order as the `row_to_*` converters expect.

use chrono::{DateTime, Utc};
use rusqlite::types::{Value, ValueRef};

use crate::types::{
    Call, CallId, ClassBase, ClassBaseId, Decorator, DecoratorId, Definition, DefinitionId,
    DefinitionKind, FileId, Import, ImportId, IndexedFile, Reference, ReferenceId,
};

/// SQL column list for files table.
pub(crate) const FILES_COLUMNS: &str = "id, path, content_hash, size, modified_at, indexed_at";

/// SQL column list for definitions table.
pub(crate) const DEFINITIONS_COLUMNS: &str = "id, file_id, name, full_name, kind, line, col, \
     end_line, end_col, signature, docstring, parent_full_name, parent_id, is_public, search_text";

/// [`DEFINITIONS_COLUMNS`] qualified with the `d` alias, for joins.
pub(crate) const DEFINITIONS_COLUMNS_D: &str = "d.id, d.file_id, d.name, d.full_name, d.kind, \
     d.line, d.col, d.end_line, d.end_col, d.signature, d.docstring, d.parent_full_name, \
     d.parent_id, d.is_public, d.search_text";

/// SQL column list for refs table.
pub(crate) const REFS_COLUMNS: &str = "id, file_id, definition_id, name, line, col, context, \
     target_full_name, target_module_path, is_call, call_order, call_depth";

/// SQL column list for imports table.
pub(crate) const IMPORTS_COLUMNS: &str = "id, file_id, module, name, alias, line";

/// SQL column list for decorators table.
pub(crate) const DECORATORS_COLUMNS: &str = "id, definition_id, file_id, name, arguments, line";

/// SQL column list for `class_bases` table.
pub(crate) const CLASS_BASES_COLUMNS: &str =
    "id, class_id, file_id, base_name, base_full_name, base_id, position";

/// SQL column list for calls table.
pub(crate) const CALLS_COLUMNS: &str = "id, file_id, caller_full_name, caller_id, \
     callee_full_name, callee_id, callee_name, line, col, context, call_order, call_depth";

/// Parse a definition kind string from the database.
///
/// Returns an error for unrecognized values, indicating possible snapshot corruption.
pub(crate) fn parse_definition_kind(s: &str) -> rusqlite::Result<DefinitionKind> {
    s.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("Unknown definition kind '{s}' in database. Snapshot may be corrupted or from a newer version.").into(),
        )
    })
}

/// Parse an RFC 3339 timestamp from the database.
pub(crate) fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Format a timestamp for storage.
pub(crate) fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339()
}

/// Convert a database row to an [`IndexedFile`].
pub(crate) fn row_to_indexed_file(row: &rusqlite::Row) -> rusqlite::Result<IndexedFile> {
    let modified_at = row
        .get::<_, Option<String>>(4)?
        .map(|s| parse_timestamp(&s))
        .transpose()?;

    Ok(IndexedFile {
        id: FileId::from(row.get::<_, i64>(0)?),
        path: row.get(1)?,
        content_hash: row.get(2)?,
        size: u64::try_from(row.get::<_, i64>(3)?).unwrap_or_default(),
        modified_at,
        indexed_at: parse_timestamp(&row.get::<_, String>(5)?)?,
    })
}

/// Convert a database row to a [`Definition`].
pub(crate) fn row_to_definition(row: &rusqlite::Row) -> rusqlite::Result<Definition> {
    Ok(Definition {
        id: DefinitionId::from(row.get::<_, i64>(0)?),
        file_id: FileId::from(row.get::<_, i64>(1)?),
        name: row.get(2)?,
        full_name: row.get(3)?,
        kind: parse_definition_kind(&row.get::<_, String>(4)?)?,
        line: row.get(5)?,
        col: row.get(6)?,
        end_line: row.get(7)?,
        end_col: row.get(8)?,
        signature: row.get(9)?,
        docstring: row.get(10)?,
        parent_full_name: row.get(11)?,
        parent_id: row.get::<_, Option<i64>>(12)?.map(DefinitionId::from),
        is_public: row.get(13)?,
        search_text: row.get(14)?,
    })
}

/// Convert a database row to a [`Reference`].
pub(crate) fn row_to_reference(row: &rusqlite::Row) -> rusqlite::Result<Reference> {
    Ok(Reference {
        id: ReferenceId::from(row.get::<_, i64>(0)?),
        file_id: FileId::from(row.get::<_, i64>(1)?),
        definition_id: row.get::<_, Option<i64>>(2)?.map(DefinitionId::from),
        name: row.get(3)?,
        line: row.get(4)?,
        col: row.get(5)?,
        context: row.get(6)?,
        target_full_name: row.get(7)?,
        target_module_path: row.get(8)?,
        is_call: row.get(9)?,
        call_order: row.get(10)?,
        call_depth: row.get(11)?,
    })
}

/// Convert a database row to an [`Import`].
pub(crate) fn row_to_import(row: &rusqlite::Row) -> rusqlite::Result<Import> {
    Ok(Import {
        id: ImportId::from(row.get::<_, i64>(0)?),
        file_id: FileId::from(row.get::<_, i64>(1)?),
        module: row.get(2)?,
        name: row.get(3)?,
        alias: row.get(4)?,
        line: row.get(5)?,
    })
}

/// Convert a database row to a [`Decorator`].
pub(crate) fn row_to_decorator(row: &rusqlite::Row) -> rusqlite::Result<Decorator> {
    Ok(Decorator {
        id: DecoratorId::from(row.get::<_, i64>(0)?),
        definition_id: DefinitionId::from(row.get::<_, i64>(1)?),
        file_id: FileId::from(row.get::<_, i64>(2)?),
        name: row.get(3)?,
        arguments: row.get(4)?,
        line: row.get(5)?,
    })
}

/// Convert a database row to a [`ClassBase`].
pub(crate) fn row_to_class_base(row: &rusqlite::Row) -> rusqlite::Result<ClassBase> {
    Ok(ClassBase {
        id: ClassBaseId::from(row.get::<_, i64>(0)?),
        class_id: DefinitionId::from(row.get::<_, i64>(1)?),
        file_id: FileId::from(row.get::<_, i64>(2)?),
        base_name: row.get(3)?,
        base_full_name: row.get(4)?,
        base_id: row.get::<_, Option<i64>>(5)?.map(DefinitionId::from),
        position: row.get(6)?,
    })
}

/// Convert a database row to a [`Call`].
pub(crate) fn row_to_call(row: &rusqlite::Row) -> rusqlite::Result<Call> {
    Ok(Call {
        id: CallId::from(row.get::<_, i64>(0)?),
        file_id: FileId::from(row.get::<_, i64>(1)?),
        caller_full_name: row.get(2)?,
        caller_id: DefinitionId::from(row.get::<_, i64>(3)?),
        callee_full_name: row.get(4)?,
        callee_id: row.get::<_, Option<i64>>(5)?.map(DefinitionId::from),
        callee_name: row.get(6)?,
        line: row.get(7)?,
        col: row.get(8)?,
        context: row.get(9)?,
        call_order: row.get(10)?,
        call_depth: row.get(11)?,
    })
}

/// Convert a column value into JSON.
///
/// Blobs become lowercase hex strings; non-finite reals become `null`.
pub(crate) fn value_ref_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        ValueRef::Text(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Blob(bytes) => {
            serde_json::Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect())
        }
    }
}

/// Convert a JSON scalar back into a bindable column value.
///
/// Returns `None` for arrays and objects, which no column holds.
pub(crate) fn json_to_value(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Integer(i64::from(*b))),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Real)),
        serde_json::Value::String(s) => Some(Value::Text(s.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

/// Prefix every column in a `*_COLUMNS` list with a table alias.
pub(crate) fn qualify_columns(columns: &str, alias: &str) -> String {
    columns
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_definition_kind_rejects_unknown() {
        assert_eq!(
            parse_definition_kind("class").expect("should parse"),
            DefinitionKind::Class
        );
        assert!(parse_definition_kind("struct").is_err());
    }

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(&now)).expect("should parse");
        assert_eq!(parsed, now);
    }

    #[test]
    fn json_values_convert_both_ways() {
        assert_eq!(value_ref_to_json(ValueRef::Integer(7)), serde_json::json!(7));
        assert_eq!(value_ref_to_json(ValueRef::Text(b"abc")), serde_json::json!("abc"));
        assert_eq!(value_ref_to_json(ValueRef::Blob(&[0, 255])), serde_json::json!("00ff"));
        assert_eq!(value_ref_to_json(ValueRef::Null), serde_json::Value::Null);

        assert_eq!(json_to_value(&serde_json::json!(7)), Some(Value::Integer(7)));
        assert_eq!(json_to_value(&serde_json::json!(true)), Some(Value::Integer(1)));
        assert_eq!(json_to_value(&serde_json::json!(1.5)), Some(Value::Real(1.5)));
        assert_eq!(json_to_value(&serde_json::json!([1])), None);
    }

    #[test]
    fn qualify_columns_prefixes_alias() {
        assert_eq!(qualify_columns("id, name", "d"), "d.id, d.name");
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("get_user%"), "get\\_user\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
