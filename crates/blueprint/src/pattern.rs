//! Reusable statement shapes.

use crate::error::{BlueprintError, BlueprintResult};
use crate::query::{AggregateFunction, JoinKind, Query, Shorthand};

#[derive(Debug, Clone, PartialEq)]
struct PatternJoin {
    left: String,
    right: String,
    on: Vec<(String, String)>,
    kind: JoinKind,
}

/// A recorded table, column list, joins, aggregates and grouping.
///
/// Nothing is validated until the pattern is applied to a [`Query`], so the
/// query's whitelists decide what is allowed.
///
/// ```ignore
/// let users = Pattern::new()
///     .table("users")
///     .columns(["id", "email"])
///     .join("users", "profiles", [("id", "user_id")], JoinKind::Left)
///     .aggregate(AggregateFunction::Count, "id");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    table: Option<String>,
    columns: Option<Shorthand>,
    joins: Vec<PatternJoin>,
    aggregates: Vec<(AggregateFunction, Shorthand)>,
    group: Option<Shorthand>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Replace the column list.
    pub fn columns(mut self, columns: impl Into<Shorthand>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn join<I, L, R>(mut self, left: &str, right: &str, on: I, kind: JoinKind) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        self.joins.push(PatternJoin {
            left: left.to_string(),
            right: right.to_string(),
            on: on.into_iter().map(|(l, r)| (l.into(), r.into())).collect(),
            kind,
        });
        self
    }

    pub fn aggregate(mut self, function: AggregateFunction, columns: impl Into<Shorthand>) -> Self {
        self.aggregates.push((function, columns.into()));
        self
    }

    /// Replace the GROUP BY list.
    pub fn group_by(mut self, columns: impl Into<Shorthand>) -> Self {
        self.group = Some(columns.into());
        self
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Set table, joins, aggregates, columns and grouping on `query`, in that order.
    ///
    /// A table already set on `query` is kept, so the pattern's table is
    /// only a default.
    pub fn apply(&self, query: &mut Query) -> BlueprintResult<()> {
        if query.table().is_none() {
            let table = self
                .table
                .as_deref()
                .ok_or_else(|| BlueprintError::configuration("Pattern has no table"))?;
            query.set_table(table)?;
        }
        for join in &self.joins {
            query.set_join(&join.left, &join.right, join.on.iter().cloned(), join.kind)?;
        }
        for (function, columns) in &self.aggregates {
            query.set_aggregate(*function, columns.clone())?;
        }
        if let Some(columns) = &self.columns {
            query.set_columns(columns.clone())?;
        }
        if let Some(group) = &self.group {
            query.set_group_by(group.clone())?;
        }
        Ok(())
    }
}
