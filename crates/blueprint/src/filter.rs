//! Reusable predicate, ordering and pagination fragments.

use crate::error::BlueprintResult;
use crate::query::{Direction, Joiner, Query, Shorthand, Where};

#[derive(Debug, Clone, PartialEq)]
struct FilterOrder {
    columns: Shorthand,
    direction: Direction,
    aliases: bool,
}

/// Conditions, an ordering and a limit that can be layered onto a pattern.
///
/// Where groups accumulate. Ordering and limit keep only the last call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    wheres: Vec<(Where, Joiner, Joiner)>,
    order: Option<FilterOrder>,
    limit: Option<(i64, i64)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_(mut self, conditions: Where, inner: Joiner, outer: Joiner) -> Self {
        self.wheres.push((conditions, inner, outer));
        self
    }

    pub fn order_by(mut self, columns: impl Into<Shorthand>, direction: Direction, aliases: bool) -> Self {
        self.order = Some(FilterOrder {
            columns: columns.into(),
            direction,
            aliases,
        });
        self
    }

    pub fn limit(mut self, rows: i64, offset: i64) -> Self {
        self.limit = Some((rows, offset));
        self
    }

    /// Set ordering, then limit, then each where group on `query`.
    pub fn apply(&self, query: &mut Query) -> BlueprintResult<()> {
        if let Some(order) = &self.order {
            query.set_order_by(order.columns.clone(), order.direction, order.aliases)?;
        }
        if let Some((rows, offset)) = self.limit {
            query.set_limit(rows, offset);
        }
        for (conditions, inner, outer) in &self.wheres {
            query.set_where(conditions.clone(), *inner, *outer)?;
        }
        Ok(())
    }
}
