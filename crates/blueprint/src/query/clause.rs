//! Canonical clause records.
//!
//! Every shorthand input form is normalized into these types before it is
//! stored on a [`Query`](super::Query). A `table` of `None` means "the
//! statement's primary table", resolved at render time.

use crate::error::{BlueprintError, BlueprintResult};
use crate::query::operator::Operator;
use serde::Serialize;
use std::str::FromStr;

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, $allowed:literal {
            $($variant:ident => $kw:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "UPPERCASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// SQL keyword for this value.
            pub fn keyword(self) -> &'static str {
                match self {
                    $($name::$variant => $kw),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.keyword())
            }
        }

        impl FromStr for $name {
            type Err = BlueprintError;

            fn from_str(s: &str) -> BlueprintResult<Self> {
                $(
                    if s.trim().eq_ignore_ascii_case($kw) {
                        return Ok($name::$variant);
                    }
                )+
                Err(BlueprintError::Enum {
                    kind: $kind,
                    value: s.to_string(),
                    allowed: $allowed,
                })
            }
        }
    };
}

keyword_enum! {
    /// Statement kind. Required before compiling.
    StatementType, "query type", "SELECT|UPDATE|INSERT|DELETE" {
        Select => "SELECT",
        Update => "UPDATE",
        Insert => "INSERT",
        Delete => "DELETE",
    }
}

keyword_enum! {
    JoinKind, "JOIN type", "INNER|OUTER|LEFT|RIGHT" {
        Inner => "INNER",
        Outer => "OUTER",
        Left => "LEFT",
        Right => "RIGHT",
    }
}

keyword_enum! {
    /// ORDER BY direction, shared by every entry of the clause.
    Direction, "ORDER BY direction", "ASC|DESC" {
        Asc => "ASC",
        Desc => "DESC",
    }
}

keyword_enum! {
    /// Connective between predicates.
    Joiner, "condition joiner", "AND|OR" {
        And => "AND",
        Or => "OR",
    }
}

keyword_enum! {
    AggregateFunction, "aggregate function", "SUM|COUNT|AVG|MIN|MAX" {
        Sum => "SUM",
        Count => "COUNT",
        Avg => "AVG",
        Min => "MIN",
        Max => "MAX",
    }
}

impl Default for JoinKind {
    fn default() -> Self {
        JoinKind::Inner
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Asc
    }
}

impl Default for Joiner {
    fn default() -> Self {
        Joiner::And
    }
}

/// A projected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinSpec {
    pub left: String,
    pub right: String,
    /// left column -> right column, ANDed together
    pub relations: Vec<(String, String)>,
    pub kind: JoinKind,
}

/// One ORDER BY term.
///
/// `is_alias` entries reference a SELECT alias and are never table-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderEntry {
    pub table: Option<String>,
    pub column: String,
    pub is_alias: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupEntry {
    pub table: Option<String>,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateSpec {
    pub function: AggregateFunction,
    pub table: Option<String>,
    pub column: String,
    /// Rendered as the column name when absent.
    pub alias: Option<String>,
}

/// Right-hand side of a stored predicate, after binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Placeholder(String),
    List(Vec<String>),
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredicateEntry {
    pub column: String,
    pub operator: Option<Operator>,
    pub bound: Bound,
}

impl PredicateEntry {
    /// Operator token as rendered, with the NULL overrides applied.
    pub fn operator_sql(&self) -> &'static str {
        match (&self.bound, self.operator) {
            (Bound::Null, None | Some(Operator::Eq)) => "IS",
            (Bound::Null, Some(Operator::NotEq)) => "IS NOT",
            (_, None) => "=",
            (_, Some(op)) => op.sql(),
        }
    }
}

/// Entries for one table inside a predicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredicateBlock {
    pub table: Option<String>,
    pub entries: Vec<PredicateEntry>,
}

/// One `set_where` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredicateGroup {
    pub blocks: Vec<PredicateBlock>,
    pub inner: Joiner,
    pub outer: Joiner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateAssignment {
    pub column: String,
    pub placeholder: String,
}

/// Placeholders of one INSERT row, in column order.
pub type InsertRow = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limit {
    pub rows: i64,
    pub offset: i64,
}
