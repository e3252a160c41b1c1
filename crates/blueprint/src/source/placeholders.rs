//! Named-to-positional placeholder rewriting.
//!
//! The compiler emits `:wh0`-style names. Drivers want `$1` (PostgreSQL) or
//! `?` (MySQL). Quoted identifiers and string literals are copied verbatim, and
//! a PostgreSQL `::type` cast is never mistaken for a placeholder.

use crate::dialect::PositionalStyle;
use crate::error::{BlueprintError, BlueprintResult};
use crate::query::Bindings;
use crate::value::Value;
use indexmap::IndexMap;

/// Rewrite `sql` for `style`, returning the values in parameter order.
///
/// With `$n` numbering a repeated name reuses its number; with `?` every
/// occurrence gets its own parameter.
pub fn to_positional(
    sql: &str,
    bindings: &Bindings,
    style: PositionalStyle,
) -> BlueprintResult<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut params = Vec::with_capacity(bindings.len());
    let mut numbered: IndexMap<&str, usize> = IndexMap::new();

    let bytes = sql.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some(q) = quote {
            if q == b'\'' && b == b'\\' && i + 1 < bytes.len() {
                let next = next_boundary(sql, i + 1);
                out.push_str(&sql[i..next]);
                i = next;
                continue;
            }
            if b == q {
                quote = None;
            }
            let next = next_boundary(sql, i);
            out.push_str(&sql[i..next]);
            i = next;
            continue;
        }

        match b {
            b'\'' | b'"' | b'`' => {
                quote = Some(b);
                out.push(b as char);
                i += 1;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                out.push_str("::");
                i += 2;
            }
            b':' if bytes.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_') => {
                let start = i;
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let name = &sql[start..i];
                let value = bindings.get(name).ok_or_else(|| {
                    BlueprintError::configuration(format!("Unknown placeholder '{name}'"))
                })?;

                match style {
                    PositionalStyle::QuestionMark => {
                        out.push('?');
                        params.push(value.clone());
                    }
                    PositionalStyle::DollarNumbered => {
                        let n = match numbered.get(name) {
                            Some(n) => *n,
                            None => {
                                params.push(value.clone());
                                numbered.insert(name, params.len());
                                params.len()
                            }
                        };
                        out.push('$');
                        out.push_str(&n.to_string());
                    }
                }
            }
            _ => {
                let next = next_boundary(sql, i);
                out.push_str(&sql[i..next]);
                i = next;
            }
        }
    }

    Ok((out, params))
}

fn next_boundary(s: &str, i: usize) -> usize {
    let mut j = i + 1;
    while j < s.len() && !s.is_char_boundary(j) {
        j += 1;
    }
    j
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, Value)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn dollar_numbering_follows_occurrence() {
        let b = bindings(&[(":wh0", Value::Int(1)), (":up0", Value::from("x"))]);
        let (sql, params) = to_positional(
            r#"UPDATE "t" SET "c" = :up0 WHERE ("t"."id" = :wh0) "#,
            &b,
            PositionalStyle::DollarNumbered,
        )
        .unwrap();
        assert_eq!(sql, r#"UPDATE "t" SET "c" = $1 WHERE ("t"."id" = $2) "#);
        assert_eq!(params, vec![Value::from("x"), Value::Int(1)]);
    }

    #[test]
    fn question_marks() {
        let b = bindings(&[(":wh0", Value::Int(1)), (":wh1", Value::Int(2))]);
        let (sql, params) = to_positional(
            "SELECT * FROM `t` WHERE (`t`.`id` IN (:wh0, :wh1)) ",
            &b,
            PositionalStyle::QuestionMark,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM `t` WHERE (`t`.`id` IN (?, ?)) ");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn quoted_text_is_untouched() {
        let b = bindings(&[(":wh0", Value::Int(1))]);
        let (sql, params) = to_positional(
            r#"SELECT ':wh0', "a:wh0", `b:x`, 'it''s :x' FROM "t" WHERE "c" = :wh0"#,
            &b,
            PositionalStyle::DollarNumbered,
        )
        .unwrap();
        assert_eq!(
            sql,
            r#"SELECT ':wh0', "a:wh0", `b:x`, 'it''s :x' FROM "t" WHERE "c" = $1"#
        );
        assert_eq!(params, vec![Value::Int(1)]);
    }

    #[test]
    fn casts_are_not_placeholders() {
        let (sql, params) =
            to_positional("SELECT '1'::int", &Bindings::new(), PositionalStyle::DollarNumbered)
                .unwrap();
        assert_eq!(sql, "SELECT '1'::int");
        assert!(params.is_empty());
    }

    #[test]
    fn repeated_name_reuses_number() {
        let b = bindings(&[(":id", Value::Int(7))]);
        let (sql, params) =
            to_positional("SELECT :id, :id", &b, PositionalStyle::DollarNumbered).unwrap();
        assert_eq!(sql, "SELECT $1, $1");
        assert_eq!(params.len(), 1);

        let (sql, params) = to_positional("SELECT :id, :id", &b, PositionalStyle::QuestionMark).unwrap();
        assert_eq!(sql, "SELECT ?, ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn unknown_placeholder_is_configuration_error() {
        let err = to_positional("SELECT :nope", &Bindings::new(), PositionalStyle::QuestionMark)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn multibyte_text_survives() {
        let b = bindings(&[(":wh0", Value::from("é"))]);
        let (sql, _) =
            to_positional(r#"SELECT "é" FROM "ü" WHERE x = :wh0"#, &b, PositionalStyle::QuestionMark)
                .unwrap();
        assert_eq!(sql, r#"SELECT "é" FROM "ü" WHERE x = ?"#);
    }
}
