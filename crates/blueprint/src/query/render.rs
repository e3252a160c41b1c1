//! SQL rendering.
//!
//! Pure function of the stored clause state and the dialect's
//! [`DialectSpec`]. Every clause ends with a single trailing space.

use crate::dialect::{DialectSpec, LimitStyle};
use crate::error::{BlueprintError, BlueprintResult};
use crate::ident::{write_column, write_ident, write_qualified};
use crate::query::clause::{Bound, StatementType};
use crate::query::statement::Query;

impl Query {
    pub(super) fn render(&self) -> BlueprintResult<String> {
        let Some(statement) = self.statement else {
            return Err(BlueprintError::configuration("No query type set"));
        };
        let Some(table) = self.table.as_deref() else {
            return Err(BlueprintError::configuration("No table set"));
        };
        let spec = self.dialect.spec();

        let mut sql = String::with_capacity(128);
        match statement {
            StatementType::Select => {
                sql.push_str("SELECT ");
                self.write_projection(&mut sql, spec, table);
                sql.push_str("FROM ");
                write_ident(&mut sql, table, spec.identifier_quote);
                sql.push(' ');
                self.write_joins(&mut sql, spec);
                self.write_where(&mut sql, spec, table);
                self.write_group_by(&mut sql, spec, table);
                self.write_order_by(&mut sql, spec, table);
                self.write_limit(&mut sql, spec);
            }
            StatementType::Update => {
                if self.updates.is_empty() {
                    return Err(BlueprintError::configuration(
                        "UPDATE needs at least one assignment",
                    ));
                }
                for assignment in &self.updates {
                    self.check_pattern("UPDATE", &assignment.column)?;
                }
                sql.push_str("UPDATE ");
                write_ident(&mut sql, table, spec.identifier_quote);
                sql.push_str(" SET ");
                for (i, assignment) in self.updates.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    write_ident(&mut sql, &assignment.column, spec.identifier_quote);
                    sql.push_str(" = ");
                    sql.push_str(&assignment.placeholder);
                }
                sql.push(' ');
                self.write_where(&mut sql, spec, table);
            }
            StatementType::Insert => {
                if self.records.is_empty() {
                    return Err(BlueprintError::configuration(
                        "INSERT needs at least one record",
                    ));
                }
                for column in &self.columns {
                    self.check_pattern("INSERT", &column.name)?;
                }
                // columns appended after the first record have no value in any row
                if let Some(row) = self.records.iter().find(|r| r.len() != self.columns.len()) {
                    let column = self.columns.get(row.len()).map_or("", |c| c.name.as_str());
                    return Err(self.mismatch("INSERT", column));
                }
                sql.push_str("INSERT INTO ");
                write_ident(&mut sql, table, spec.identifier_quote);
                sql.push_str(" (");
                for (i, column) in self.columns.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    if spec.qualify_insert_columns {
                        let t = column.table.as_deref().unwrap_or(table);
                        write_qualified(&mut sql, t, &column.name, spec.identifier_quote);
                    } else {
                        write_column(&mut sql, &column.name, spec.identifier_quote);
                    }
                }
                sql.push_str(" ) VALUES ");
                for (i, row) in self.records.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('(');
                    sql.push_str(&row.join(", "));
                    sql.push(')');
                }
                sql.push(' ');
            }
            StatementType::Delete => {
                sql.push_str("DELETE FROM ");
                write_ident(&mut sql, table, spec.identifier_quote);
                sql.push(' ');
                self.write_where(&mut sql, spec, table);
            }
        }

        tracing::trace!(target: "blueprint.compile", %statement, dialect = %self.dialect, sql = %sql, "compiled");
        Ok(sql)
    }

    fn write_projection(&self, sql: &mut String, spec: &DialectSpec, table: &str) {
        let q = spec.identifier_quote;
        let mut wrote = false;

        for column in &self.columns {
            if wrote {
                sql.push_str(", ");
            }
            write_qualified(sql, column.table.as_deref().unwrap_or(table), &column.name, q);
            if let Some(alias) = &column.alias {
                sql.push_str(" AS ");
                write_ident(sql, alias, q);
            }
            wrote = true;
        }

        for agg in &self.aggregates {
            if wrote {
                sql.push_str(", ");
            }
            sql.push_str(agg.function.keyword());
            sql.push('(');
            write_qualified(sql, agg.table.as_deref().unwrap_or(table), &agg.column, q);
            sql.push_str(") AS ");
            write_ident(sql, agg.alias.as_deref().unwrap_or(&agg.column), q);
            wrote = true;
        }

        if !wrote {
            if self.count {
                sql.push_str(spec.count_projection);
            } else {
                sql.push_str(spec.default_projection);
            }
        }
        sql.push(' ');
    }

    fn write_joins(&self, sql: &mut String, spec: &DialectSpec) {
        let q = spec.identifier_quote;
        for join in &self.joins {
            sql.push_str(join.kind.keyword());
            sql.push_str(" JOIN ");
            write_ident(sql, &join.right, q);
            sql.push_str(" ON ");
            for (i, (l, r)) in join.relations.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                write_qualified(sql, &join.left, l, q);
                sql.push_str(" = ");
                write_qualified(sql, &join.right, r, q);
            }
            sql.push(' ');
        }
    }

    fn write_where(&self, sql: &mut String, spec: &DialectSpec, table: &str) {
        if self.wheres.is_empty() {
            return;
        }
        let q = spec.identifier_quote;
        sql.push_str("WHERE ");

        let mut pending_outer: Option<&str> = None;
        for group in &self.wheres {
            for block in &group.blocks {
                if let Some(outer) = pending_outer {
                    sql.push(' ');
                    sql.push_str(outer);
                    sql.push(' ');
                }
                let block_table = block.table.as_deref().unwrap_or(table);
                sql.push('(');
                for (i, entry) in block.entries.iter().enumerate() {
                    if i > 0 {
                        sql.push(' ');
                        sql.push_str(group.inner.keyword());
                        sql.push(' ');
                    }
                    write_qualified(sql, block_table, &entry.column, q);
                    sql.push(' ');
                    sql.push_str(entry.operator_sql());
                    sql.push(' ');
                    match &entry.bound {
                        Bound::Null => sql.push_str("NULL"),
                        Bound::Placeholder(p) => sql.push_str(p),
                        Bound::List(items) => {
                            sql.push('(');
                            sql.push_str(&items.join(", "));
                            sql.push(')');
                        }
                    }
                }
                sql.push(')');
                pending_outer = Some(group.outer.keyword());
            }
        }
        sql.push(' ');
    }

    fn write_group_by(&self, sql: &mut String, spec: &DialectSpec, table: &str) {
        if self.group.is_empty() {
            return;
        }
        sql.push_str("GROUP BY ");
        for (i, entry) in self.group.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let t = entry.table.as_deref().unwrap_or(table);
            write_qualified(sql, t, &entry.column, spec.identifier_quote);
        }
        sql.push(' ');
    }

    fn write_order_by(&self, sql: &mut String, spec: &DialectSpec, table: &str) {
        if self.order.is_empty() {
            return;
        }
        let q = spec.identifier_quote;
        sql.push_str("ORDER BY ");
        for (i, entry) in self.order.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            if entry.is_alias {
                write_column(sql, &entry.column, q);
            } else {
                write_qualified(sql, entry.table.as_deref().unwrap_or(table), &entry.column, q);
            }
        }
        sql.push(' ');
        sql.push_str(self.direction.keyword());
        sql.push(' ');
    }

    fn write_limit(&self, sql: &mut String, spec: &DialectSpec) {
        let Some(limit) = self.limit else {
            return;
        };
        let rows = limit.rows.max(0);
        let offset = limit.offset.max(0);
        match spec.limit_style {
            LimitStyle::OffsetCommaRows => {
                sql.push_str(&format!("LIMIT {offset}, {rows} "));
            }
            LimitStyle::OffsetThenLimit => {
                sql.push_str(&format!("OFFSET {offset} LIMIT {rows} "));
            }
        }
    }
}
