//! Shorthand column lists.
//!
//! Columns, ORDER BY, GROUP BY and aggregates all accept the same family of
//! input shapes:
//!
//! ```text
//! ["a", "b"]                        positional columns of the primary table
//! {"alias": "a"}                    keyed scalar (alias or table, see KeyRole)
//! {"t": ["a", "b"]}                 columns of table t
//! {"t": {"alias": "a"}}             aliased columns of table t
//! ```
//!
//! [`Shorthand`] is the typed form of that union. [`Shorthand::from_json`]
//! sniffs a JSON document into it. [`flatten`] turns either into [`Leaf`]s.

use crate::error::{BlueprintError, BlueprintResult};
use crate::value::Value;

/// A column-list shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shorthand {
    /// Positional column names.
    List(Vec<String>),
    /// Keyed entries, in insertion order.
    Map(Vec<(String, ShorthandValue)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShorthandValue {
    Column(String),
    Nested(Shorthand),
}

impl Shorthand {
    pub fn list<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Shorthand::List(columns.into_iter().map(Into::into).collect())
    }

    /// Keyed scalars: `key -> column`.
    pub fn keyed<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Shorthand::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), ShorthandValue::Column(v.into())))
                .collect(),
        )
    }

    /// Nested entries: `table -> inner shorthand`.
    pub fn tables<I, K, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Shorthand>,
    {
        Shorthand::Map(
            tables
                .into_iter()
                .map(|(k, s)| (k.into(), ShorthandValue::Nested(s.into())))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Shorthand::List(v) => v.is_empty(),
            Shorthand::Map(v) => v.is_empty(),
        }
    }

    /// Read a shorthand from JSON.
    ///
    /// Strings and arrays of strings are positional; objects are keyed. Any
    /// non-string column name is a shape error.
    pub fn from_json(value: &serde_json::Value) -> BlueprintResult<Self> {
        Self::from_json_at(value, 0)
    }

    fn from_json_at(value: &serde_json::Value, depth: usize) -> BlueprintResult<Self> {
        match value {
            serde_json::Value::String(s) => Ok(Shorthand::List(vec![s.clone()])),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s.clone()),
                    other => Err(BlueprintError::shape(format!(
                        "Column names must be strings, got {other}"
                    ))),
                })
                .collect::<BlueprintResult<Vec<_>>>()
                .map(Shorthand::List),
            serde_json::Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, v) in map {
                    let entry = match v {
                        serde_json::Value::String(s) => ShorthandValue::Column(s.clone()),
                        serde_json::Value::Array(_) | serde_json::Value::Object(_) if depth == 0 => {
                            ShorthandValue::Nested(Self::from_json_at(v, depth + 1)?)
                        }
                        other => {
                            return Err(BlueprintError::shape(format!(
                                "Unexpected value under '{key}': {other}"
                            )));
                        }
                    };
                    entries.push((key.clone(), entry));
                }
                Ok(Shorthand::Map(entries))
            }
            other => Err(BlueprintError::shape(format!(
                "Expected a column list, got {other}"
            ))),
        }
    }
}

impl From<&str> for Shorthand {
    fn from(column: &str) -> Self {
        Shorthand::List(vec![column.to_string()])
    }
}

impl From<String> for Shorthand {
    fn from(column: String) -> Self {
        Shorthand::List(vec![column])
    }
}

impl From<Vec<String>> for Shorthand {
    fn from(columns: Vec<String>) -> Self {
        Shorthand::List(columns)
    }
}

impl From<Vec<&str>> for Shorthand {
    fn from(columns: Vec<&str>) -> Self {
        Shorthand::list(columns)
    }
}

impl From<&[&str]> for Shorthand {
    fn from(columns: &[&str]) -> Self {
        Shorthand::list(columns.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Shorthand {
    fn from(columns: [&str; N]) -> Self {
        Shorthand::list(columns)
    }
}

/// What the key of a keyed scalar entry means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyRole {
    /// `{"alias": "col"}` (columns, aggregates)
    Alias,
    /// `{"table": "col"}` (ORDER BY, GROUP BY)
    Table,
}

/// One normalized column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Leaf {
    pub table: Option<String>,
    pub column: String,
    pub alias: Option<String>,
}

/// Normalize a shorthand into leaves.
///
/// An empty list, at the top or under a table key, is a shape error.
pub(crate) fn flatten(shorthand: &Shorthand, role: KeyRole) -> BlueprintResult<Vec<Leaf>> {
    let mut out = Vec::new();
    match shorthand {
        Shorthand::List(cols) => {
            for col in cols {
                out.push(leaf(None, col, None)?);
            }
        }
        Shorthand::Map(entries) => {
            for (key, value) in entries {
                match value {
                    ShorthandValue::Column(col) => match role {
                        KeyRole::Alias => out.push(leaf(None, col, Some(key))?),
                        KeyRole::Table => out.push(leaf(Some(key), col, None)?),
                    },
                    ShorthandValue::Nested(inner) if inner.is_empty() => {
                        return Err(BlueprintError::shape(format!(
                            "Column list under '{key}' cannot be empty"
                        )));
                    }
                    ShorthandValue::Nested(Shorthand::List(cols)) => {
                        for col in cols {
                            out.push(leaf(Some(key), col, None)?);
                        }
                    }
                    ShorthandValue::Nested(Shorthand::Map(inner)) => {
                        for (alias, v) in inner {
                            let ShorthandValue::Column(col) = v else {
                                return Err(BlueprintError::shape(format!(
                                    "Column lists under '{key}' cannot nest further"
                                )));
                            };
                            out.push(leaf(Some(key), col, Some(alias))?);
                        }
                    }
                }
            }
        }
    }
    if out.is_empty() {
        return Err(BlueprintError::shape("Column list cannot be empty"));
    }
    Ok(out)
}

fn leaf(table: Option<&String>, column: &str, alias: Option<&String>) -> BlueprintResult<Leaf> {
    if column.trim().is_empty() {
        return Err(BlueprintError::shape("Column name cannot be empty"));
    }
    if table.is_some_and(|t| t.trim().is_empty()) {
        return Err(BlueprintError::shape("Table name cannot be empty"));
    }
    Ok(Leaf {
        table: table.cloned(),
        column: column.to_string(),
        alias: alias.cloned(),
    })
}

/// Read a `column -> value` record from a JSON object.
pub fn record_from_json(value: &serde_json::Value) -> BlueprintResult<Vec<(String, Value)>> {
    let serde_json::Value::Object(map) = value else {
        return Err(BlueprintError::shape(format!(
            "Expected a column -> value map, got {value}"
        )));
    };
    map.iter()
        .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(v: serde_json::Value, role: KeyRole) -> Vec<Leaf> {
        flatten(&Shorthand::from_json(&v).unwrap(), role).unwrap()
    }

    fn l(table: Option<&str>, column: &str, alias: Option<&str>) -> Leaf {
        Leaf {
            table: table.map(str::to_string),
            column: column.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    #[test]
    fn positional_list() {
        assert_eq!(
            flatten(&Shorthand::from("a"), KeyRole::Alias).unwrap(),
            vec![l(None, "a", None)]
        );
        assert_eq!(
            flat(json!(["a", "b"]), KeyRole::Alias),
            vec![l(None, "a", None), l(None, "b", None)]
        );
    }

    #[test]
    fn keyed_scalar_role() {
        assert_eq!(
            flat(json!({"x": "a"}), KeyRole::Alias),
            vec![l(None, "a", Some("x"))]
        );
        assert_eq!(
            flat(json!({"t": "a"}), KeyRole::Table),
            vec![l(Some("t"), "a", None)]
        );
    }

    #[test]
    fn nested_tables() {
        assert_eq!(
            flat(json!({"t": ["a", "b"], "u": {"al": "c"}}), KeyRole::Alias),
            vec![
                l(Some("t"), "a", None),
                l(Some("t"), "b", None),
                l(Some("u"), "c", Some("al")),
            ]
        );
    }

    #[test]
    fn typed_builder_matches_json() {
        let typed = Shorthand::tables([
            ("t", Shorthand::from(["a", "b"])),
            ("u", Shorthand::keyed([("al", "c")])),
        ]);
        let json = Shorthand::from_json(&json!({"t": ["a", "b"], "u": {"al": "c"}})).unwrap();
        assert_eq!(typed, json);
    }

    #[test]
    fn non_string_names_are_shape_errors() {
        assert!(Shorthand::from_json(&json!([1, 2])).is_err());
        assert!(Shorthand::from_json(&json!({"t": 5})).is_err());
        assert!(Shorthand::from_json(&json!({"t": {"u": ["a"]}})).is_err());
        assert!(Shorthand::from_json(&json!(null)).is_err());
    }

    #[test]
    fn empty_names_are_rejected() {
        let err = flatten(&Shorthand::from(""), KeyRole::Alias).unwrap_err();
        assert!(matches!(err, BlueprintError::Shape(_)));
    }

    #[test]
    fn empty_lists_are_shape_errors() {
        for value in [json!([]), json!({}), json!({"t": []}), json!({"t": {}})] {
            let shorthand = Shorthand::from_json(&value).unwrap();
            for role in [KeyRole::Alias, KeyRole::Table] {
                let err = flatten(&shorthand, role).unwrap_err();
                assert!(matches!(err, BlueprintError::Shape(_)), "{value}");
            }
        }

        let mixed = Shorthand::tables([("t", Shorthand::from(["a"])), ("u", Shorthand::list(Vec::<String>::new()))]);
        let err = flatten(&mixed, KeyRole::Alias).unwrap_err();
        assert!(err.to_string().contains("'u'"));
    }

    #[test]
    fn record_requires_object() {
        let rec = record_from_json(&json!({"a": 1, "b": "x"})).unwrap();
        assert_eq!(rec, vec![("a".into(), Value::Int(1)), ("b".into(), Value::from("x"))]);
        assert!(record_from_json(&json!([1, 2])).is_err());
        assert!(record_from_json(&json!({"a": [1]})).is_err());
    }
}
