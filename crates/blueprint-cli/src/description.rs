//! JSON statement descriptions.
//!
//! ```json
//! {
//!   "type": "select",
//!   "table": "users",
//!   "whitelist": { "tables": ["users", "posts"], "columns": ["id", "name"] },
//!   "columns": { "users": ["id", "name"] },
//!   "joins": [{ "left": "users", "right": "posts", "on": { "id": "user_id" }, "kind": "left" }],
//!   "where": [{ "conditions": { "id >": 10 }, "inner": "and", "outer": "and" }],
//!   "order": { "columns": ["name"], "direction": "desc" },
//!   "limit": { "rows": 10, "offset": 0 }
//! }
//! ```

use anyhow::Context;
use blueprint::query::record_from_json;
use blueprint::{
    AggregateFunction, Dialect, Direction, JoinKind, Joiner, Query, Shorthand, StatementType,
    Where,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Description {
    #[serde(rename = "type")]
    pub statement: String,
    pub table: String,
    #[serde(default)]
    pub whitelist: Option<WhitelistSection>,
    #[serde(default)]
    pub columns: Option<serde_json::Value>,
    #[serde(default)]
    pub joins: Vec<JoinSection>,
    #[serde(default, rename = "where")]
    pub wheres: Vec<WhereSection>,
    #[serde(default)]
    pub order: Option<OrderSection>,
    #[serde(default)]
    pub group: Option<serde_json::Value>,
    #[serde(default)]
    pub aggregates: Vec<AggregateSection>,
    #[serde(default)]
    pub set: Option<serde_json::Value>,
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
    #[serde(default)]
    pub limit: Option<LimitSection>,
    #[serde(default)]
    pub count: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhitelistSection {
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinSection {
    pub left: String,
    pub right: String,
    pub on: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhereSection {
    pub conditions: serde_json::Value,
    #[serde(default)]
    pub inner: Option<String>,
    #[serde(default)]
    pub outer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderSection {
    pub columns: serde_json::Value,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub aliases: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSection {
    pub function: String,
    pub columns: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitSection {
    pub rows: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Description {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("failed to parse statement description")
    }

    /// Build a query in `dialect`, applying sections in a fixed order.
    ///
    /// The whitelist goes first so every later section is checked against it.
    pub fn to_query(&self, dialect: Dialect) -> anyhow::Result<Query> {
        let mut q = Query::new(dialect);

        if let Some(whitelist) = &self.whitelist {
            q.add_to_table_whitelist(whitelist.tables.as_slice())
                .add_to_column_whitelist(whitelist.columns.as_slice());
        }

        let statement: StatementType = self.statement.parse()?;
        q.set_type(statement);
        q.set_table(&self.table)?;

        for join in &self.joins {
            let mut on = Vec::with_capacity(join.on.len());
            for (left, right) in &join.on {
                let Some(right) = right.as_str() else {
                    anyhow::bail!("join column for '{left}' must be a string, got {right}");
                };
                on.push((left.clone(), right.to_string()));
            }
            let kind = match &join.kind {
                Some(k) => k.parse::<JoinKind>()?,
                None => JoinKind::default(),
            };
            q.set_join(&join.left, &join.right, on, kind)?;
        }

        if let Some(columns) = &self.columns {
            q.set_columns(Shorthand::from_json(columns)?)?;
        }
        for aggregate in &self.aggregates {
            let function: AggregateFunction = aggregate.function.parse()?;
            q.set_aggregate(function, Shorthand::from_json(&aggregate.columns)?)?;
        }

        for section in &self.wheres {
            let inner = parse_joiner(section.inner.as_deref())?;
            let outer = parse_joiner(section.outer.as_deref())?;
            q.set_where(Where::from_json(&section.conditions)?, inner, outer)?;
        }

        if let Some(group) = &self.group {
            q.set_group_by(Shorthand::from_json(group)?)?;
        }
        if let Some(order) = &self.order {
            let direction = match &order.direction {
                Some(d) => d.parse::<Direction>()?,
                None => Direction::default(),
            };
            q.set_order_by(Shorthand::from_json(&order.columns)?, direction, order.aliases)?;
        }
        if let Some(limit) = &self.limit {
            q.set_limit(limit.rows, limit.offset);
        }

        if let Some(set) = &self.set {
            q.set_updates(record_from_json(set)?)?;
        }
        for record in &self.records {
            q.add_insert_record(record_from_json(record)?)?;
        }

        q.set_count(self.count);
        Ok(q)
    }
}

fn parse_joiner(raw: Option<&str>) -> anyhow::Result<Joiner> {
    Ok(match raw {
        Some(j) => j.parse()?,
        None => Joiner::default(),
    })
}
