//! Per-dialect syntax table.
//!
//! Everything the renderer needs to know about a dialect lives in a
//! [`DialectSpec`]; there is no dialect-specific rendering code elsewhere.

use crate::error::{BlueprintError, BlueprintResult};
use serde::Deserialize;
use std::str::FromStr;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql", alias = "pgsql")]
    Postgres,
}

/// How the pagination clause is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT <offset>, <rows>`
    OffsetCommaRows,
    /// `OFFSET <offset> LIMIT <rows>`
    OffsetThenLimit,
}

/// How the execution adapter spells a positional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionalStyle {
    /// `?`
    QuestionMark,
    /// `$1`, `$2`, ...
    DollarNumbered,
}

/// Static syntax record for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectSpec {
    pub identifier_quote: char,
    pub limit_style: LimitStyle,
    pub default_projection: &'static str,
    pub count_projection: &'static str,
    /// Whether INSERT column lists are written `table.column`.
    pub qualify_insert_columns: bool,
    pub positional: PositionalStyle,
}

const MYSQL: DialectSpec = DialectSpec {
    identifier_quote: '`',
    limit_style: LimitStyle::OffsetCommaRows,
    default_projection: "*",
    count_projection: "COUNT(*) AS count",
    qualify_insert_columns: true,
    positional: PositionalStyle::QuestionMark,
};

const POSTGRES: DialectSpec = DialectSpec {
    identifier_quote: '"',
    limit_style: LimitStyle::OffsetThenLimit,
    default_projection: "*",
    count_projection: "COUNT(*) AS \"count\"",
    qualify_insert_columns: false,
    positional: PositionalStyle::DollarNumbered,
};

impl Dialect {
    pub fn spec(self) -> &'static DialectSpec {
        match self {
            Dialect::MySql => &MYSQL,
            Dialect::Postgres => &POSTGRES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = BlueprintError;

    fn from_str(s: &str) -> BlueprintResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" | "pgsql" => Ok(Dialect::Postgres),
            _ => Err(BlueprintError::Enum {
                kind: "dialect",
                value: s.to_string(),
                allowed: "mysql|postgres",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dialect_names() {
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("pgsql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn dialects_differ_where_expected() {
        let my = Dialect::MySql.spec();
        let pg = Dialect::Postgres.spec();
        assert_ne!(my.identifier_quote, pg.identifier_quote);
        assert_ne!(my.limit_style, pg.limit_style);
        assert_eq!(my.default_projection, pg.default_projection);
    }
}
