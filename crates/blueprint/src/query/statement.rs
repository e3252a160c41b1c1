//! Statement assembler.
//!
//! A [`Query`] accumulates clause state through its `set_*` methods. Every
//! setter validates its input against the whitelists and the shorthand rules
//! before touching any state, so a rejected call leaves the query exactly as
//! it was. Values are bound to placeholders as they are set; [`Query::compile`]
//! only renders and can be called any number of times.

use crate::dialect::Dialect;
use crate::error::{BlueprintError, BlueprintResult};
use crate::query::bind::{BindRegistry, Bindings, Namespace};
use crate::query::clause::{
    AggregateFunction, AggregateSpec, Bound, ColumnRef, Direction, GroupEntry, InsertRow, JoinKind,
    JoinSpec, Joiner, Limit, OrderEntry, PredicateBlock, PredicateEntry, PredicateGroup,
    StatementType, UpdateAssignment,
};
use crate::query::predicate::{Where, WhereValue};
use crate::query::shorthand::{self, KeyRole, Shorthand};
use crate::query::whitelist::{Names, Whitelist};
use crate::value::Value;
use serde::Serialize;

/// Compiled SQL with its named bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compiled {
    pub sql: String,
    pub bindings: Bindings,
}

/// A statement under construction.
#[derive(Debug, Clone)]
pub struct Query {
    pub(super) dialect: Dialect,
    pub(super) whitelist: Whitelist,
    pub(super) statement: Option<StatementType>,
    pub(super) table: Option<String>,
    pub(super) columns: Vec<ColumnRef>,
    pub(super) joins: Vec<JoinSpec>,
    pub(super) wheres: Vec<PredicateGroup>,
    pub(super) order: Vec<OrderEntry>,
    pub(super) direction: Direction,
    pub(super) group: Vec<GroupEntry>,
    pub(super) aggregates: Vec<AggregateSpec>,
    pub(super) updates: Vec<UpdateAssignment>,
    pub(super) records: Vec<InsertRow>,
    pub(super) limit: Option<Limit>,
    pub(super) count: bool,
    pub(super) bindings: BindRegistry,
}

impl Query {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            whitelist: Whitelist::new(),
            statement: None,
            table: None,
            columns: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            order: Vec::new(),
            direction: Direction::Asc,
            group: Vec::new(),
            aggregates: Vec::new(),
            updates: Vec::new(),
            records: Vec::new(),
            limit: None,
            count: false,
            bindings: BindRegistry::new(),
        }
    }

    pub fn mysql() -> Self {
        Self::new(Dialect::MySql)
    }

    pub fn postgres() -> Self {
        Self::new(Dialect::Postgres)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn statement_type(&self) -> Option<StatementType> {
        self.statement
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    // ==================== statement / table ====================

    pub fn set_type(&mut self, statement: StatementType) -> &mut Self {
        self.statement = Some(statement);
        self
    }

    pub fn set_table(&mut self, table: &str) -> BlueprintResult<&mut Self> {
        let name = table.trim();
        if name.is_empty() {
            return Err(BlueprintError::shape("Table name cannot be empty"));
        }
        self.whitelist.check_table(name, "FROM")?;
        self.table = Some(name.to_string());
        Ok(self)
    }

    // ==================== projection ====================

    /// Append projected columns.
    pub fn set_columns(&mut self, columns: impl Into<Shorthand>) -> BlueprintResult<&mut Self> {
        let columns = columns.into();
        if columns.is_empty() {
            return Err(BlueprintError::shape("Column list cannot be empty"));
        }
        let mut refs = Vec::new();
        for leaf in shorthand::flatten(&columns, KeyRole::Alias)? {
            self.whitelist.check_scope(leaf.table.as_deref(), "SELECT")?;
            self.whitelist.check_column(&leaf.column, "SELECT")?;
            refs.push(ColumnRef {
                table: leaf.table,
                name: leaf.column,
                alias: leaf.alias,
            });
        }
        self.columns.extend(refs);
        Ok(self)
    }

    /// Append one already-structured column.
    pub fn add_column(&mut self, column: ColumnRef) -> BlueprintResult<&mut Self> {
        if column.name.trim().is_empty() {
            return Err(BlueprintError::shape("Column name cannot be empty"));
        }
        self.whitelist.check_scope(column.table.as_deref(), "SELECT")?;
        self.whitelist.check_column(&column.name, "SELECT")?;
        self.columns.push(column);
        Ok(self)
    }

    pub fn set_aggregate(
        &mut self,
        function: AggregateFunction,
        columns: impl Into<Shorthand>,
    ) -> BlueprintResult<&mut Self> {
        let mut specs = Vec::new();
        for leaf in shorthand::flatten(&columns.into(), KeyRole::Alias)? {
            self.whitelist.check_scope(leaf.table.as_deref(), "AGGREGATE")?;
            self.whitelist.check_column(&leaf.column, "AGGREGATE")?;
            specs.push(AggregateSpec {
                function,
                table: leaf.table,
                column: leaf.column,
                alias: leaf.alias,
            });
        }
        self.aggregates.extend(specs);
        Ok(self)
    }

    pub fn set_count(&mut self, count: bool) -> &mut Self {
        self.count = count;
        self
    }

    // ==================== joins ====================

    /// Append a join of `left` to `right` on `left.col = right.col` pairs.
    pub fn set_join<I, L, R>(
        &mut self,
        left: &str,
        right: &str,
        on: I,
        kind: JoinKind,
    ) -> BlueprintResult<&mut Self>
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        let relations: Vec<(String, String)> =
            on.into_iter().map(|(l, r)| (l.into(), r.into())).collect();
        if left.trim().is_empty() || right.trim().is_empty() {
            return Err(BlueprintError::shape("JOIN tables cannot be empty"));
        }
        if relations.is_empty() {
            return Err(BlueprintError::shape(format!(
                "JOIN of '{left}' and '{right}' needs at least one column pair"
            )));
        }
        self.whitelist.check_table(left, "JOIN")?;
        self.whitelist.check_table(right, "JOIN")?;
        for (l, r) in &relations {
            if l.trim().is_empty() || r.trim().is_empty() {
                return Err(BlueprintError::shape("JOIN column cannot be empty"));
            }
            self.whitelist.check_column(l, "JOIN")?;
            self.whitelist.check_column(r, "JOIN")?;
        }
        self.joins.push(JoinSpec {
            left: left.to_string(),
            right: right.to_string(),
            relations,
            kind,
        });
        Ok(self)
    }

    // ==================== WHERE ====================

    /// Append a predicate group.
    ///
    /// `inner` joins the conditions inside each table block; `outer` joins this
    /// group to whatever follows it.
    pub fn set_where(
        &mut self,
        conditions: Where,
        inner: Joiner,
        outer: Joiner,
    ) -> BlueprintResult<&mut Self> {
        if conditions.is_empty() {
            return Err(BlueprintError::shape("WHERE conditions cannot be empty"));
        }

        for block in conditions.blocks() {
            self.whitelist.check_scope(block.table.as_deref(), "WHERE")?;
            for cond in &block.conditions {
                if cond.column.is_empty() {
                    return Err(BlueprintError::shape("WHERE column cannot be empty"));
                }
                self.whitelist.check_column(&cond.column, "WHERE")?;
                let takes_list = cond.operator.is_some_and(|op| op.takes_list());
                match (&cond.value, takes_list) {
                    (WhereValue::List(items), true) if items.is_empty() => {
                        return Err(BlueprintError::shape(format!(
                            "IN list for '{}' cannot be empty",
                            cond.column
                        )));
                    }
                    (WhereValue::List(_), false) => {
                        return Err(BlueprintError::shape(format!(
                            "List value for '{}' needs an IN or NOT IN operator",
                            cond.column
                        )));
                    }
                    (WhereValue::Scalar(_), true) => {
                        return Err(BlueprintError::shape(format!(
                            "IN operator on '{}' needs a list value",
                            cond.column
                        )));
                    }
                    _ => {}
                }
            }
        }

        let mut blocks = Vec::with_capacity(conditions.blocks().len());
        for block in conditions.blocks() {
            let mut entries = Vec::with_capacity(block.conditions.len());
            for cond in &block.conditions {
                let bound = match &cond.value {
                    WhereValue::Scalar(Value::Null) => Bound::Null,
                    WhereValue::Scalar(v) => Bound::Placeholder(self.bindings.bind(Namespace::Where, v.clone())),
                    WhereValue::List(items) => Bound::List(
                        items
                            .iter()
                            .map(|v| self.bindings.bind(Namespace::Where, v.clone()))
                            .collect(),
                    ),
                };
                entries.push(PredicateEntry {
                    column: cond.column.clone(),
                    operator: cond.operator,
                    bound,
                });
            }
            blocks.push(PredicateBlock {
                table: block.table.clone(),
                entries,
            });
        }

        self.wheres.push(PredicateGroup { blocks, inner, outer });
        Ok(self)
    }

    // ==================== ORDER BY / GROUP BY ====================

    /// Append ORDER BY entries. The direction applies to the whole clause.
    ///
    /// With `aliases` set, positional entries name SELECT aliases and are
    /// written without a table qualifier.
    pub fn set_order_by(
        &mut self,
        columns: impl Into<Shorthand>,
        direction: Direction,
        aliases: bool,
    ) -> BlueprintResult<&mut Self> {
        let mut entries = Vec::new();
        for leaf in shorthand::flatten(&columns.into(), KeyRole::Table)? {
            self.whitelist.check_scope(leaf.table.as_deref(), "ORDER BY")?;
            self.whitelist.check_column(&leaf.column, "ORDER BY")?;
            let is_alias = aliases && leaf.table.is_none();
            entries.push(OrderEntry {
                table: leaf.table,
                column: leaf.column,
                is_alias,
            });
        }
        self.order.extend(entries);
        self.direction = direction;
        Ok(self)
    }

    pub fn set_group_by(&mut self, columns: impl Into<Shorthand>) -> BlueprintResult<&mut Self> {
        let mut entries = Vec::new();
        for leaf in shorthand::flatten(&columns.into(), KeyRole::Table)? {
            self.whitelist.check_scope(leaf.table.as_deref(), "GROUP BY")?;
            self.whitelist.check_column(&leaf.column, "GROUP BY")?;
            entries.push(GroupEntry {
                table: leaf.table,
                column: leaf.column,
            });
        }
        self.group.extend(entries);
        Ok(self)
    }

    // ==================== writes ====================

    /// Append `column = value` assignments for an UPDATE.
    pub fn set_updates<I, K, V>(&mut self, updates: I) -> BlueprintResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let updates: Vec<(String, Value)> =
            updates.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        if updates.is_empty() {
            return Err(BlueprintError::shape("UPDATE assignments cannot be empty"));
        }
        for (column, _) in &updates {
            if column.trim().is_empty() {
                return Err(BlueprintError::shape("UPDATE column cannot be empty"));
            }
            self.whitelist.check_column(column, "UPDATE")?;
            self.check_pattern("UPDATE", column)?;
        }
        for (column, value) in updates {
            let placeholder = self.bindings.bind(Namespace::Update, value);
            self.updates.push(UpdateAssignment { column, placeholder });
        }
        Ok(self)
    }

    /// Append one INSERT row.
    ///
    /// The first row must fit the declared columns (if any) and then becomes
    /// the column list. Every later row must carry exactly the same columns.
    pub fn add_insert_record<I, K, V>(&mut self, record: I) -> BlueprintResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let record: Vec<(String, Value)> =
            record.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        if record.is_empty() {
            return Err(BlueprintError::shape("INSERT record cannot be empty"));
        }
        for (i, (column, _)) in record.iter().enumerate() {
            if column.trim().is_empty() {
                return Err(BlueprintError::shape("INSERT column cannot be empty"));
            }
            if record[..i].iter().any(|(c, _)| c == column) {
                return Err(BlueprintError::shape(format!(
                    "INSERT column '{column}' appears twice in one record"
                )));
            }
            self.whitelist.check_column(column, "INSERT")?;
        }

        if self.records.is_empty() {
            for (column, _) in &record {
                self.check_pattern("INSERT", column)?;
            }
            self.columns = record.iter().map(|(c, _)| ColumnRef::new(c.clone())).collect();
            let row = record
                .into_iter()
                .map(|(_, v)| self.bindings.bind(Namespace::Insert, v))
                .collect();
            self.records.push(row);
            return Ok(self);
        }

        for (column, _) in &record {
            if !self.columns.iter().any(|c| &c.name == column) {
                return Err(self.mismatch("INSERT", column));
            }
        }
        if let Some(missing) = self
            .columns
            .iter()
            .find(|c| !record.iter().any(|(k, _)| k == &c.name))
        {
            return Err(self.mismatch("INSERT", &missing.name));
        }

        let mut record = record;
        let mut row = Vec::with_capacity(self.columns.len());
        for i in 0..self.columns.len() {
            let pos = record
                .iter()
                .position(|(k, _)| k == &self.columns[i].name)
                .ok_or_else(|| self.mismatch("INSERT", &self.columns[i].name))?;
            let (_, value) = record.swap_remove(pos);
            row.push(self.bindings.bind(Namespace::Insert, value));
        }
        self.records.push(row);
        Ok(self)
    }

    // ==================== pagination ====================

    /// Negative values are clamped to zero when rendered.
    pub fn set_limit(&mut self, rows: i64, offset: i64) -> &mut Self {
        self.limit = Some(Limit { rows, offset });
        self
    }

    // ==================== whitelists ====================

    /// Allow one table name or a list of them.
    pub fn add_to_table_whitelist(&mut self, tables: impl Into<Names>) -> &mut Self {
        self.whitelist.add_tables(tables.into());
        self
    }

    /// Allow one column name or a list of them.
    pub fn add_to_column_whitelist(&mut self, columns: impl Into<Names>) -> &mut Self {
        self.whitelist.add_columns(columns.into());
        self
    }

    // ==================== output ====================

    /// Render the statement. Does not modify the query.
    pub fn compile(&self) -> BlueprintResult<String> {
        self.render()
    }

    /// Render and pair with the bindings.
    pub fn to_compiled(&self) -> BlueprintResult<Compiled> {
        Ok(Compiled {
            sql: self.render()?,
            bindings: self.bindings(),
        })
    }

    /// Every binding: WHERE first, then UPDATE, then INSERT.
    pub fn bindings(&self) -> Bindings {
        self.bindings.all()
    }

    /// Inspect one clause's stored state. Unknown names yield an empty array.
    pub fn section(&self, name: &str) -> serde_json::Value {
        let value = match name {
            "type" => serde_json::to_value(self.statement),
            "table" => serde_json::to_value(&self.table),
            "columns" => serde_json::to_value(&self.columns),
            "joins" => serde_json::to_value(&self.joins),
            "where" => serde_json::to_value(&self.wheres),
            "order" => serde_json::to_value(&self.order),
            "direction" => serde_json::to_value(self.direction),
            "group" => serde_json::to_value(&self.group),
            "aggregates" => serde_json::to_value(&self.aggregates),
            "updates" => serde_json::to_value(&self.updates),
            "records" => serde_json::to_value(&self.records),
            "limit" => serde_json::to_value(self.limit),
            "count" => serde_json::to_value(self.count),
            "bindings" => serde_json::to_value(self.bindings.all()),
            "whitelist" => serde_json::to_value(&self.whitelist),
            _ => Ok(serde_json::Value::Array(Vec::new())),
        };
        value.unwrap_or_default()
    }

    /// Clear clause state and bindings. The dialect and whitelists survive.
    pub fn reset(&mut self) -> &mut Self {
        let whitelist = std::mem::take(&mut self.whitelist);
        *self = Self {
            whitelist,
            ..Self::new(self.dialect)
        };
        self
    }

    // ==================== pattern checks ====================

    pub(super) fn check_pattern(&self, statement: &'static str, column: &str) -> BlueprintResult<()> {
        if self.columns.is_empty() {
            return Ok(());
        }
        let declared = self
            .columns
            .iter()
            .any(|c| c.name == column && self.in_primary_scope(c.table.as_deref()));
        if declared {
            Ok(())
        } else {
            Err(self.mismatch(statement, column))
        }
    }

    fn in_primary_scope(&self, table: Option<&str>) -> bool {
        match (table, self.table.as_deref()) {
            (None, _) => true,
            (Some(t), Some(primary)) => t == primary,
            (Some(_), None) => false,
        }
    }

    pub(super) fn mismatch(&self, statement: &'static str, column: &str) -> BlueprintError {
        tracing::trace!(target: "blueprint.compile", statement, column, "column outside declared pattern");
        BlueprintError::pattern_mismatch(statement, self.table.clone().unwrap_or_default(), column)
    }
}
