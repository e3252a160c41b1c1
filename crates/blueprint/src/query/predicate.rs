//! WHERE input.
//!
//! [`Where`] collects conditions grouped by table. Conditions added directly
//! apply to the primary table; [`Where::on`] scopes them to another table.
//!
//! ```ignore
//! let w = Where::new()
//!     .key("col1 >", 10)
//!     .key_in("col2 in", [1, 2, 3])
//!     .on("other", |w| w.eq("flag", true));
//! ```

use crate::error::{BlueprintError, BlueprintResult};
use crate::query::operator::{self, Operator};
use crate::value::Value;

/// Right-hand side of a condition before binding.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereValue {
    Scalar(Value),
    List(Vec<Value>),
}

/// One column condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Option<Operator>,
    pub value: WhereValue,
}

/// Conditions for a single table; `table: None` is the primary table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionBlock {
    pub table: Option<String>,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    blocks: Vec<ConditionBlock>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[ConditionBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.conditions.is_empty())
    }

    /// Add a condition using the key-suffix syntax (`"age >="`, `"name like"`).
    pub fn key(self, key: &str, value: impl Into<Value>) -> Self {
        let (column, op) = operator::split_key(key);
        self.push(None, column, op, WhereValue::Scalar(value.into()))
    }

    /// Add a list condition using the key-suffix syntax (`"id in"`).
    pub fn key_in<I, V>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let (column, op) = operator::split_key(key);
        let list = values.into_iter().map(Into::into).collect();
        self.push(None, column, op, WhereValue::List(list))
    }

    /// Add a condition with an explicit operator.
    pub fn with(self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.push(None, column, Some(op), WhereValue::Scalar(value.into()))
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Eq, value)
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Operator::NotEq, value)
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Gt, value)
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Gte, value)
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Lt, value)
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Lte, value)
    }

    pub fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.with(column, Operator::Like, pattern)
    }

    pub fn not_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.with(column, Operator::NotLike, pattern)
    }

    pub fn is_null(self, column: &str) -> Self {
        self.push(None, column, None, WhereValue::Scalar(Value::Null))
    }

    pub fn is_not_null(self, column: &str) -> Self {
        self.push(None, column, Some(Operator::NotEq), WhereValue::Scalar(Value::Null))
    }

    pub fn in_list<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = values.into_iter().map(Into::into).collect();
        self.push(None, column, Some(Operator::In), WhereValue::List(list))
    }

    pub fn not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = values.into_iter().map(Into::into).collect();
        self.push(None, column, Some(Operator::NotIn), WhereValue::List(list))
    }

    /// Scope the conditions built by `f` to `table`.
    pub fn on(mut self, table: &str, f: impl FnOnce(Where) -> Where) -> Self {
        let scoped = f(Where::new());
        for block in scoped.blocks {
            let target = block.table.unwrap_or_else(|| table.to_string());
            for cond in block.conditions {
                self.block_mut(Some(target.as_str())).conditions.push(cond);
            }
        }
        self
    }

    fn push(mut self, table: Option<&str>, column: &str, operator: Option<Operator>, value: WhereValue) -> Self {
        self.block_mut(table).conditions.push(Condition {
            column: column.to_string(),
            operator,
            value,
        });
        self
    }

    fn block_mut(&mut self, table: Option<&str>) -> &mut ConditionBlock {
        let pos = self.blocks.iter().position(|b| b.table.as_deref() == table);
        let idx = match pos {
            Some(i) => i,
            None => {
                self.blocks.push(ConditionBlock {
                    table: table.map(str::to_string),
                    conditions: Vec::new(),
                });
                self.blocks.len() - 1
            }
        };
        &mut self.blocks[idx]
    }

    /// Read conditions from JSON.
    ///
    /// The shape is decided by the first entry: an object value means
    /// `{table: {key: value}}`, anything else means a flat `{key: value}` map
    /// for the primary table. Arrays are only accepted under `IN`/`NOT IN`
    /// keys.
    pub fn from_json(value: &serde_json::Value) -> BlueprintResult<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(BlueprintError::shape(format!(
                "WHERE conditions must be a keyed map, got {value}"
            )));
        };
        let Some((first_key, first_value)) = map.iter().next() else {
            return Ok(Where::new());
        };

        let nested = match first_value {
            serde_json::Value::Object(_) => true,
            serde_json::Value::Array(_) if !operator::is_list_key(first_key) => {
                return Err(BlueprintError::shape(format!(
                    "WHERE entry '{first_key}' holds a list without an IN operator"
                )));
            }
            _ => false,
        };

        let mut out = Where::new();
        if nested {
            for (table, inner) in map {
                let serde_json::Value::Object(conds) = inner else {
                    return Err(BlueprintError::shape(format!(
                        "WHERE conditions for table '{table}' must be a keyed map"
                    )));
                };
                out = conds.iter().try_fold(out, |w, (k, v)| w.push_json(Some(table.as_str()), k, v))?;
            }
        } else {
            out = map.iter().try_fold(out, |w, (k, v)| w.push_json(None, k, v))?;
        }
        Ok(out)
    }

    fn push_json(self, table: Option<&str>, key: &str, value: &serde_json::Value) -> BlueprintResult<Self> {
        let (column, op) = operator::split_key(key);
        let value = match value {
            serde_json::Value::Array(items) => {
                WhereValue::List(items.iter().map(Value::from_json).collect::<BlueprintResult<_>>()?)
            }
            serde_json::Value::Object(_) => {
                return Err(BlueprintError::shape(format!(
                    "WHERE entry '{key}' mixes tables and columns"
                )));
            }
            scalar => WhereValue::Scalar(Value::from_json(scalar)?),
        };
        Ok(self.push(table, column, op, value))
    }
}
