//! Execution adapters.
//!
//! A [`Source`] runs one compiled statement per call against a database and
//! hands back [`Record`]s. Named placeholders are rewritten to the driver's
//! positional form by [`to_positional`] before anything reaches the wire.
//!
//! ```ignore
//! use blueprint::source::{PgSource, Source};
//!
//! let source = PgSource::new(client);
//! let compiled = query.to_compiled()?;
//! let rows = source.fetch_all(&compiled.sql, &compiled.bindings).await?;
//! ```

mod config;
#[cfg(feature = "mysql")]
mod mysql;
mod placeholders;
#[cfg(feature = "pool")]
mod pool;
mod postgres;
mod recording;

pub use config::{ConnectionConfig, Driver, expand_env_vars};
#[cfg(feature = "mysql")]
pub use mysql::{MySqlSource, MySqlTransaction};
pub use placeholders::to_positional;
#[cfg(feature = "pool")]
pub use pool::create_pool;
pub use postgres::{GenericClient, PgSource};
pub use recording::{RecordedStatement, RecordingSource};

use crate::dialect::Dialect;
use crate::error::{BlueprintError, BlueprintResult};
use crate::query::Bindings;
use crate::value::Record;
use std::future::Future;

/// A database that can run compiled statements.
pub trait Source: Send + Sync {
    /// Dialect the statements sent here must be compiled for.
    fn dialect(&self) -> Dialect;

    /// Run a statement and return every row.
    fn fetch_all(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> impl Future<Output = BlueprintResult<Vec<Record>>> + Send;

    /// Run a statement and return the first row, if any.
    ///
    /// Extra rows are ignored.
    fn fetch_one(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> impl Future<Output = BlueprintResult<Option<Record>>> + Send {
        async move {
            let rows = self.fetch_all(sql, bindings).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> impl Future<Output = BlueprintResult<u64>> + Send;

    /// Id generated for `table` by the most recent INSERT on this source.
    ///
    /// Fails with [`BlueprintError::NotFound`] when no id is available.
    fn last_insert_id(&self, table: &str) -> impl Future<Output = BlueprintResult<i64>> + Send {
        let message = format!("this source does not report generated ids (table '{table}')");
        async move { Err(BlueprintError::NotFound(message)) }
    }
}

impl<S: Source> Source for &S {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn fetch_all(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> impl Future<Output = BlueprintResult<Vec<Record>>> + Send {
        (**self).fetch_all(sql, bindings)
    }

    fn fetch_one(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> impl Future<Output = BlueprintResult<Option<Record>>> + Send {
        (**self).fetch_one(sql, bindings)
    }

    fn execute(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> impl Future<Output = BlueprintResult<u64>> + Send {
        (**self).execute(sql, bindings)
    }

    fn last_insert_id(&self, table: &str) -> impl Future<Output = BlueprintResult<i64>> + Send {
        (**self).last_insert_id(table)
    }
}

const LOG_SQL_MAX: usize = 200;

/// First keyword of a statement, for log fields.
pub(crate) fn statement_kind(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("")
}

/// SQL shortened for logging, cut on a char boundary.
pub(crate) fn truncate_sql(sql: &str) -> &str {
    if sql.len() <= LOG_SQL_MAX {
        return sql;
    }
    let mut end = LOG_SQL_MAX;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_kind_is_first_word() {
        assert_eq!(statement_kind("  SELECT * FROM t"), "SELECT");
        assert_eq!(statement_kind(""), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(150);
        let cut = truncate_sql(&long);
        assert!(cut.len() <= LOG_SQL_MAX);
        assert!(long.starts_with(cut));
        assert_eq!(truncate_sql("short"), "short");
    }
}
