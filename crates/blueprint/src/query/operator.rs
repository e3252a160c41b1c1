//! Comparison operators and the key-suffix microsyntax.
//!
//! A condition key may carry a trailing operator: `"age >"`, `"name like"`,
//! `"id not in"`. [`split_key`] separates the column from the operator. The
//! column keeps its original case.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
}

impl Operator {
    /// SQL token.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    /// `IN`/`NOT IN` take a list on the right-hand side.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql())
    }
}

// Longest match first: "!==" before "!=", ">=" before ">".
const SYMBOL_SUFFIXES: &[(&str, Operator)] = &[
    ("!==", Operator::NotEq),
    ("!=", Operator::NotEq),
    ("<>", Operator::NotEq),
    (">=", Operator::Gte),
    ("<=", Operator::Lte),
    ("=", Operator::Eq),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

// Word operators need a separating space; "not like" before "like".
const WORD_SUFFIXES: &[(&str, Operator)] = &[
    (" not like", Operator::NotLike),
    (" like", Operator::Like),
    (" not in", Operator::NotIn),
    (" in", Operator::In),
];

/// Split `"column op"` into the column name and its operator.
///
/// Keys with no recognized suffix return `None` for the operator, which
/// renders as `=` (or `IS` against NULL).
pub fn split_key(key: &str) -> (&str, Option<Operator>) {
    let trimmed = key.trim();

    for (suffix, op) in SYMBOL_SUFFIXES {
        if let Some(column) = trimmed.strip_suffix(suffix) {
            return (column.trim_end(), Some(*op));
        }
    }

    for (suffix, op) in WORD_SUFFIXES {
        if ends_with_ignore_case(trimmed, suffix) {
            let column = &trimmed[..trimmed.len() - suffix.len()];
            return (column.trim_end(), Some(*op));
        }
    }

    (trimmed, None)
}

/// Whether the key carries an `IN`/`NOT IN` suffix.
pub fn is_list_key(key: &str) -> bool {
    matches!(split_key(key).1, Some(op) if op.takes_list())
}

fn ends_with_ignore_case(haystack: &str, suffix: &str) -> bool {
    haystack.len() >= suffix.len()
        && haystack.is_char_boundary(haystack.len() - suffix.len())
        && haystack[haystack.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_key_has_no_operator() {
        assert_eq!(split_key("col0"), ("col0", None));
        assert_eq!(split_key("  col0 "), ("col0", None));
    }

    #[test]
    fn symbol_suffixes() {
        assert_eq!(split_key("col1 >"), ("col1", Some(Operator::Gt)));
        assert_eq!(split_key("col1>="), ("col1", Some(Operator::Gte)));
        assert_eq!(split_key("col1 <="), ("col1", Some(Operator::Lte)));
        assert_eq!(split_key("col1 <"), ("col1", Some(Operator::Lt)));
        assert_eq!(split_key("col1 !="), ("col1", Some(Operator::NotEq)));
        assert_eq!(split_key("col1 !=="), ("col1", Some(Operator::NotEq)));
        assert_eq!(split_key("col1 ="), ("col1", Some(Operator::Eq)));
    }

    #[test]
    fn word_suffixes_any_case() {
        assert_eq!(split_key("name LIKE"), ("name", Some(Operator::Like)));
        assert_eq!(split_key("name not like"), ("name", Some(Operator::NotLike)));
        assert_eq!(split_key("id IN"), ("id", Some(Operator::In)));
        assert_eq!(split_key("id Not In"), ("id", Some(Operator::NotIn)));
    }

    #[test]
    fn column_case_is_preserved() {
        assert_eq!(split_key("UserName like"), ("UserName", Some(Operator::Like)));
    }

    #[test]
    fn word_suffix_requires_space() {
        assert_eq!(split_key("login"), ("login", None));
        assert_eq!(split_key("unlike"), ("unlike", None));
    }

    #[test]
    fn list_keys() {
        assert!(is_list_key("col2 in"));
        assert!(is_list_key("col2 NOT IN"));
        assert!(!is_list_key("col2 >"));
    }
}
