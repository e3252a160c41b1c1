//! Named patterns, filters and transformations over a [`Source`].
//!
//! A [`Blueprint`] keeps registries of reusable statement pieces. Each
//! interaction picks a pattern (required), any number of filters and
//! transformations, optionally adds ad-hoc clauses, then runs one terminal:
//! [`one`](Blueprint::one), [`many`](Blueprint::many),
//! [`count`](Blueprint::count) or [`execute`](Blueprint::execute).
//! [`table`](Blueprint::table) points a single interaction at another table
//! while keeping the pattern's columns and joins.
//!
//! ```ignore
//! let mut users = Blueprint::new(PgSource::new(client));
//! users
//!     .add_pattern("list", Pattern::new().table("users").columns(["id", "email"]))
//!     .add_filter("active", Filter::new().where_(Where::new().eq("active", true), Joiner::And, Joiner::And))
//!     .add_transformation("lower", |mut r| { /* ... */ r });
//!
//! let rows = users
//!     .select()
//!     .with_pattern("list")?
//!     .with_filter("active")?
//!     .limit(20, 0)
//!     .many()
//!     .await?;
//! ```
//!
//! After every terminal, successful or not, the active elements, ad-hoc
//! clauses and write payloads are cleared. Registries and whitelists stay.

use crate::error::{BlueprintError, BlueprintResult};
use crate::filter::Filter;
use crate::pattern::Pattern;
use crate::query::{
    Compiled, Direction, JoinKind, Joiner, Names, Query, Shorthand, StatementType, Where,
};
use crate::source::Source;
use crate::value::{Record, Value};
use indexmap::IndexMap;
use std::sync::Arc;

/// A record mapper applied after fetching and before writing.
pub type Transformation = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// A mapper over a whole result set (or the whole list of write payloads).
pub type BatchTransformation = Arc<dyn Fn(Vec<Record>) -> Vec<Record> + Send + Sync>;

#[derive(Clone)]
enum Transform {
    Each(Transformation),
    Batch(BatchTransformation),
}

impl Transform {
    fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        match self {
            Transform::Each(f) => records.into_iter().map(|r| f(r)).collect(),
            Transform::Batch(f) => f(records),
        }
    }
}

pub struct Blueprint<S> {
    source: S,
    query: Query,
    patterns: IndexMap<String, Pattern>,
    filters: IndexMap<String, Filter>,
    transformations: IndexMap<String, Transform>,
    active_pattern: Option<String>,
    active_filters: Vec<String>,
    active_transformations: Vec<String>,
    set: Record,
    records: Vec<Record>,
}

impl<S> std::fmt::Debug for Blueprint<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint").finish_non_exhaustive()
    }
}

impl<S: Source> Blueprint<S> {
    pub fn new(source: S) -> Self {
        let query = Query::new(source.dialect());
        Self {
            source,
            query,
            patterns: IndexMap::new(),
            filters: IndexMap::new(),
            transformations: IndexMap::new(),
            active_pattern: None,
            active_filters: Vec::new(),
            active_transformations: Vec::new(),
            set: Record::new(),
            records: Vec::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The in-flight statement with ad-hoc clauses only.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn add_to_table_whitelist(&mut self, tables: impl Into<Names>) -> &mut Self {
        self.query.add_to_table_whitelist(tables);
        self
    }

    pub fn add_to_column_whitelist(&mut self, columns: impl Into<Names>) -> &mut Self {
        self.query.add_to_column_whitelist(columns);
        self
    }

    // ==================== registries ====================

    /// Register `pattern` under `name`, replacing any previous one.
    pub fn add_pattern(&mut self, name: impl Into<String>, pattern: Pattern) -> &mut Self {
        self.patterns.insert(name.into(), pattern);
        self
    }

    pub fn add_filter(&mut self, name: impl Into<String>, filter: Filter) -> &mut Self {
        self.filters.insert(name.into(), filter);
        self
    }

    pub fn add_transformation<F>(&mut self, name: impl Into<String>, transform: F) -> &mut Self
    where
        F: Fn(Record) -> Record + Send + Sync + 'static,
    {
        self.transformations
            .insert(name.into(), Transform::Each(Arc::new(transform)));
        self
    }

    /// Register a transformation that sees every record of a result set (or
    /// every write payload) at once.
    pub fn add_batch_transformation<F>(&mut self, name: impl Into<String>, transform: F) -> &mut Self
    where
        F: Fn(Vec<Record>) -> Vec<Record> + Send + Sync + 'static,
    {
        self.transformations
            .insert(name.into(), Transform::Batch(Arc::new(transform)));
        self
    }

    // ==================== active elements ====================

    /// Use the named pattern for the next terminal. A later call replaces it.
    pub fn with_pattern(&mut self, name: &str) -> BlueprintResult<&mut Self> {
        if !self.patterns.contains_key(name) {
            return Err(not_registered("pattern", name));
        }
        self.active_pattern = Some(name.to_string());
        Ok(self)
    }

    /// Add the named filter for the next terminal. Filters apply in call order.
    pub fn with_filter(&mut self, name: &str) -> BlueprintResult<&mut Self> {
        if !self.filters.contains_key(name) {
            return Err(not_registered("filter", name));
        }
        self.active_filters.push(name.to_string());
        Ok(self)
    }

    /// Add the named transformation for the next terminal.
    pub fn with_transformation(&mut self, name: &str) -> BlueprintResult<&mut Self> {
        if !self.transformations.contains_key(name) {
            return Err(not_registered("transformation", name));
        }
        self.active_transformations.push(name.to_string());
        Ok(self)
    }

    // ==================== statement type ====================

    pub fn select(&mut self) -> &mut Self {
        self.query.set_type(StatementType::Select);
        self
    }

    pub fn update(&mut self) -> &mut Self {
        self.query.set_type(StatementType::Update);
        self
    }

    pub fn insert(&mut self) -> &mut Self {
        self.query.set_type(StatementType::Insert);
        self
    }

    pub fn delete(&mut self) -> &mut Self {
        self.query.set_type(StatementType::Delete);
        self
    }

    // ==================== ad-hoc clauses ====================

    /// Run the next terminal against `table` instead of the pattern's table.
    pub fn table(&mut self, table: &str) -> BlueprintResult<&mut Self> {
        self.query.set_table(table)?;
        Ok(self)
    }

    pub fn columns(&mut self, columns: impl Into<Shorthand>) -> BlueprintResult<&mut Self> {
        self.query.set_columns(columns)?;
        Ok(self)
    }

    pub fn where_(
        &mut self,
        conditions: Where,
        inner: Joiner,
        outer: Joiner,
    ) -> BlueprintResult<&mut Self> {
        self.query.set_where(conditions, inner, outer)?;
        Ok(self)
    }

    pub fn order_by(
        &mut self,
        columns: impl Into<Shorthand>,
        direction: Direction,
        aliases: bool,
    ) -> BlueprintResult<&mut Self> {
        self.query.set_order_by(columns, direction, aliases)?;
        Ok(self)
    }

    pub fn group_by(&mut self, columns: impl Into<Shorthand>) -> BlueprintResult<&mut Self> {
        self.query.set_group_by(columns)?;
        Ok(self)
    }

    pub fn join<I, L, R>(
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
        self.query.set_join(left, right, on, kind)?;
        Ok(self)
    }

    pub fn limit(&mut self, rows: i64, offset: i64) -> &mut Self {
        self.query.set_limit(rows, offset);
        self
    }

    // ==================== write payloads ====================

    /// Replace the UPDATE assignments.
    pub fn set<I, K, V>(&mut self, assignments: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.set = assignments
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Append an INSERT record.
    pub fn add<I, K, V>(&mut self, record: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.records.push(
            record
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    // ==================== terminals ====================

    /// Compile the statement the next terminal would run, without running it.
    pub fn compile(&self) -> BlueprintResult<Compiled> {
        self.prepare()?.to_compiled()
    }

    /// Fetch the first row, transformed.
    pub async fn one(&mut self) -> BlueprintResult<Option<Record>> {
        let compiled = self.take_compiled();
        let transforms = self.take_transformations();
        let compiled = compiled?;
        let row = self
            .source
            .fetch_one(&compiled.sql, &compiled.bindings)
            .await?;
        Ok(row.and_then(|r| apply_all(&transforms, vec![r]).into_iter().next()))
    }

    /// Fetch every row, transformed.
    pub async fn many(&mut self) -> BlueprintResult<Vec<Record>> {
        let compiled = self.take_compiled();
        let transforms = self.take_transformations();
        let compiled = compiled?;
        let rows = self
            .source
            .fetch_all(&compiled.sql, &compiled.bindings)
            .await?;
        Ok(apply_all(&transforms, rows))
    }

    /// Count matching rows.
    ///
    /// Switches the statement to count mode (and to SELECT if no type was
    /// chosen) and reads the `count` column of the single result row.
    pub async fn count(&mut self) -> BlueprintResult<i64> {
        if self.query.statement_type().is_none() {
            self.query.set_type(StatementType::Select);
        }
        self.query.set_count(true);
        let compiled = self.take_compiled();
        self.take_transformations();
        let compiled = compiled?;

        let row = self
            .source
            .fetch_one(&compiled.sql, &compiled.bindings)
            .await?
            .ok_or_else(|| BlueprintError::NotFound("count query returned no row".to_string()))?;
        row.get("count").and_then(Value::as_i64).ok_or_else(|| {
            BlueprintError::decode("count", "result does not contain a count column")
        })
    }

    /// Run an UPDATE, INSERT or DELETE and return the affected row count.
    ///
    /// Active transformations are applied to the SET payload and to every
    /// INSERT record before they are bound.
    pub async fn execute(&mut self) -> BlueprintResult<u64> {
        let compiled = self.take_compiled();
        self.take_transformations();
        let compiled = compiled?;
        self.source
            .execute(&compiled.sql, &compiled.bindings)
            .await
    }

    /// Id generated by the last INSERT into `table` on this blueprint's source.
    pub async fn last_insert_id(&self, table: &str) -> BlueprintResult<i64> {
        self.source.last_insert_id(table).await
    }

    // ==================== internals ====================

    /// Copy of the in-flight query with the pattern, filters and write
    /// payloads applied.
    fn prepare(&self) -> BlueprintResult<Query> {
        let name = self.active_pattern.as_deref().ok_or_else(|| {
            BlueprintError::configuration("Could not start database interaction: pattern not set")
        })?;
        let pattern = self
            .patterns
            .get(name)
            .ok_or_else(|| not_registered("pattern", name))?;

        let mut query = self.query.clone();
        pattern.apply(&mut query)?;
        for name in &self.active_filters {
            let filter = self
                .filters
                .get(name)
                .ok_or_else(|| not_registered("filter", name))?;
            filter.apply(&mut query)?;
        }

        let transforms = self.active_transforms()?;
        if !self.set.is_empty() {
            let set = apply_all(&transforms, vec![self.set.clone()]);
            if let Some(set) = set.into_iter().next() {
                query.set_updates(set)?;
            }
        }
        if !self.records.is_empty() {
            for record in apply_all(&transforms, self.records.clone()) {
                query.add_insert_record(record)?;
            }
        }
        Ok(query)
    }

    fn active_transforms(&self) -> BlueprintResult<Vec<Transform>> {
        self.active_transformations
            .iter()
            .map(|name| {
                self.transformations
                    .get(name)
                    .cloned()
                    .ok_or_else(|| not_registered("transformation", name))
            })
            .collect()
    }

    /// Compile, then clear the per-interaction state whatever the outcome.
    fn take_compiled(&mut self) -> BlueprintResult<Compiled> {
        let compiled = self.prepare().and_then(|q| q.to_compiled());
        if let Err(e) = &compiled {
            tracing::debug!(target: "blueprint.compile", error = %e, "statement not compiled");
        }
        self.query.reset();
        self.active_pattern = None;
        self.active_filters.clear();
        self.set.clear();
        self.records.clear();
        compiled
    }

    fn take_transformations(&mut self) -> Vec<Transform> {
        let transforms = self.active_transforms().unwrap_or_default();
        self.active_transformations.clear();
        transforms
    }
}

fn apply_all(transforms: &[Transform], records: Vec<Record>) -> Vec<Record> {
    transforms.iter().fold(records, |rs, t| t.apply(rs))
}

fn not_registered(kind: &'static str, name: &str) -> BlueprintError {
    BlueprintError::NotRegistered {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests;
