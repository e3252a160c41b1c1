//! MySQL adapter over an sqlx pool.

use crate::dialect::{Dialect, PositionalStyle};
use crate::error::{BlueprintError, BlueprintResult};
use crate::query::Bindings;
use crate::source::{ConnectionConfig, Driver, Source, statement_kind, to_positional, truncate_sql};
use crate::value::{Record, Value};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::types::JsonValue;
use sqlx::{Column, MySql, Row};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// [`Source`] over a [`MySqlPool`].
///
/// Clones share the pool and the last generated insert id.
#[derive(Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
    query_timeout: Option<Duration>,
    last_id: Arc<LastInsertId>,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            query_timeout: None,
            last_id: Arc::default(),
        }
    }

    /// Open a pool for a MySQL [`ConnectionConfig`].
    ///
    /// The config's pool size and query timeout are applied.
    pub async fn connect(config: &ConnectionConfig) -> BlueprintResult<Self> {
        config.validate()?;
        if config.driver != Driver::MySql {
            return Err(BlueprintError::configuration(format!(
                "cannot open a MySQL pool for driver '{}'",
                config.driver
            )));
        }

        let url = config.url()?;
        let max = u32::try_from(config.max_pool_size).unwrap_or(u32::MAX);
        let pool = MySqlPoolOptions::new()
            .max_connections(max)
            .connect(&url)
            .await
            .map_err(|e| BlueprintError::Connection(e.to_string()))?;

        let redacted = config.redacted_url()?;
        tracing::debug!(
            target: "blueprint.sql",
            url = %redacted,
            max_connections = max,
            "mysql pool opened"
        );
        Ok(Self {
            pool,
            query_timeout: config.query_timeout(),
            last_id: Arc::default(),
        })
    }

    /// Fail statements that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Start a transaction on a connection taken from the pool.
    ///
    /// The connection stays checked out until the transaction is committed,
    /// rolled back or dropped. Dropping it rolls back.
    pub async fn begin(&self) -> BlueprintResult<MySqlTransaction> {
        let tx = self.pool.begin().await?;
        tracing::debug!(target: "blueprint.sql", "mysql transaction started");
        Ok(MySqlTransaction {
            tx: Mutex::new(tx),
            query_timeout: self.query_timeout,
            last_id: LastInsertId::default(),
        })
    }

    /// Column names of `table` in the current schema, in ordinal order.
    pub async fn table_columns(&self, table: &str) -> BlueprintResult<Vec<String>> {
        let mut bindings = Bindings::new();
        bindings.insert(":table_name".to_string(), Value::from(table));
        let rows = self
            .fetch_all(
                "SELECT COLUMN_NAME AS column_name FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = :table_name \
                 ORDER BY ordinal_position",
                &bindings,
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut r| match r.shift_remove("column_name") {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Primary key column of `table`, if it has one.
    ///
    /// For a composite key the first column is returned.
    pub async fn primary_key(&self, table: &str) -> BlueprintResult<Option<String>> {
        let mut bindings = Bindings::new();
        bindings.insert(":table_name".to_string(), Value::from(table));
        let row = self
            .fetch_one(
                "SELECT COLUMN_NAME AS column_name FROM information_schema.key_column_usage \
                 WHERE table_schema = DATABASE() AND table_name = :table_name \
                 AND constraint_name = 'PRIMARY' ORDER BY ordinal_position",
                &bindings,
            )
            .await?;
        Ok(row.and_then(|mut r| match r.shift_remove("column_name") {
            Some(Value::Text(name)) => Some(name),
            _ => None,
        }))
    }
}

impl Source for MySqlSource {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn fetch_all(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<Vec<Record>> {
        let (sql, values) = to_positional(sql, bindings, PositionalStyle::QuestionMark)?;
        log_statement("mysql fetch", &sql, values.len());

        let query = bind_values(sqlx::query(&sql), &values);
        let rows = run_with_timeout(self.query_timeout, async {
            Ok(query.fetch_all(&self.pool).await?)
        })
        .await
        .inspect_err(|e| tracing::warn!(target: "blueprint.sql", error = %e, "mysql fetch failed"))?;

        decode_rows(&rows)
    }

    async fn execute(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<u64> {
        let (sql, values) = to_positional(sql, bindings, PositionalStyle::QuestionMark)?;
        log_statement("mysql execute", &sql, values.len());

        let query = bind_values(sqlx::query(&sql), &values);
        let result = run_with_timeout(self.query_timeout, async {
            Ok(query.execute(&self.pool).await?)
        })
        .await
        .inspect_err(|e| tracing::warn!(target: "blueprint.sql", error = %e, "mysql execute failed"))?;

        self.last_id.record(result.last_insert_id());
        Ok(result.rows_affected())
    }

    /// The AUTO_INCREMENT id generated by the last INSERT run through this
    /// source. `table` is not needed on MySQL.
    async fn last_insert_id(&self, _table: &str) -> BlueprintResult<i64> {
        self.last_id.get()
    }
}

/// A MySQL transaction that runs statements as a [`Source`].
///
/// ```ignore
/// let tx = source.begin().await?;
/// let mut accounts = Blueprint::new(&tx);
/// accounts.update().with_pattern("balance")?.set([("amount", 0)]).execute().await?;
/// tx.commit().await?;
/// ```
pub struct MySqlTransaction {
    tx: Mutex<sqlx::Transaction<'static, MySql>>,
    query_timeout: Option<Duration>,
    last_id: LastInsertId,
}

impl MySqlTransaction {
    pub async fn commit(self) -> BlueprintResult<()> {
        self.tx.into_inner().commit().await?;
        tracing::debug!(target: "blueprint.sql", "mysql transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> BlueprintResult<()> {
        self.tx.into_inner().rollback().await?;
        tracing::debug!(target: "blueprint.sql", "mysql transaction rolled back");
        Ok(())
    }
}

impl Source for MySqlTransaction {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn fetch_all(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<Vec<Record>> {
        let (sql, values) = to_positional(sql, bindings, PositionalStyle::QuestionMark)?;
        log_statement("mysql fetch (tx)", &sql, values.len());

        let query = bind_values(sqlx::query(&sql), &values);
        let rows = run_with_timeout(self.query_timeout, async {
            let mut tx = self.tx.lock().await;
            Ok(query.fetch_all(&mut **tx).await?)
        })
        .await
        .inspect_err(|e| tracing::warn!(target: "blueprint.sql", error = %e, "mysql fetch failed"))?;

        decode_rows(&rows)
    }

    async fn execute(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<u64> {
        let (sql, values) = to_positional(sql, bindings, PositionalStyle::QuestionMark)?;
        log_statement("mysql execute (tx)", &sql, values.len());

        let query = bind_values(sqlx::query(&sql), &values);
        let result = run_with_timeout(self.query_timeout, async {
            let mut tx = self.tx.lock().await;
            Ok(query.execute(&mut **tx).await?)
        })
        .await
        .inspect_err(|e| tracing::warn!(target: "blueprint.sql", error = %e, "mysql execute failed"))?;

        self.last_id.record(result.last_insert_id());
        Ok(result.rows_affected())
    }

    async fn last_insert_id(&self, _table: &str) -> BlueprintResult<i64> {
        self.last_id.get()
    }
}

fn log_statement(message: &'static str, sql: &str, params: usize) {
    tracing::debug!(
        target: "blueprint.sql",
        kind = statement_kind(sql),
        sql = truncate_sql(sql),
        params,
        "{message}"
    );
}

async fn run_with_timeout<T, F>(timeout: Option<Duration>, future: F) -> BlueprintResult<T>
where
    F: Future<Output = BlueprintResult<T>> + Send,
{
    match timeout {
        // dropping the future releases the connection back to the pool
        Some(timeout) => tokio::time::timeout(timeout, future)
            .await
            .map_err(|_| BlueprintError::Timeout(timeout))?,
        None => future.await,
    }
}

/// Last AUTO_INCREMENT id reported by the server; zero means none yet.
#[derive(Debug, Default)]
struct LastInsertId(AtomicU64);

impl LastInsertId {
    /// Statements that generate no id report zero and leave the previous one.
    fn record(&self, id: u64) {
        if id != 0 {
            self.0.store(id, Ordering::Relaxed);
        }
    }

    fn get(&self) -> BlueprintResult<i64> {
        match self.0.load(Ordering::Relaxed) {
            0 => Err(BlueprintError::NotFound(
                "no INSERT on this source has generated an id".to_string(),
            )),
            id => i64::try_from(id).map_err(|_| {
                BlueprintError::decode("last_insert_id", format!("{id} does not fit in a signed integer"))
            }),
        }
    }
}

// ==================== binding ====================

fn bind_values<'q>(mut query: MySqlQuery<'q>, values: &'q [Value]) -> MySqlQuery<'q> {
    for value in values {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(x) => query.bind(*x),
            Value::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

// ==================== decoding ====================

/// How a column is read, chosen from its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnClass {
    Bool,
    Unsigned,
    Signed,
    Float,
    Decimal,
    DateTime,
    Date,
    Time,
    Json,
    Bytes,
    Text,
}

fn classify(type_name: &str) -> ColumnClass {
    match type_name {
        "BOOL" | "BOOLEAN" | "TINYINT(1)" => ColumnClass::Bool,
        name if name.contains("INT") && name.contains("UNSIGNED") => ColumnClass::Unsigned,
        name if name.contains("INT") => ColumnClass::Signed,
        name if name.contains("DOUBLE") || name.contains("FLOAT") || name.contains("REAL") => {
            ColumnClass::Float
        }
        name if name.contains("DECIMAL") || name.contains("NUMERIC") => ColumnClass::Decimal,
        name if name.contains("DATETIME") || name.contains("TIMESTAMP") => ColumnClass::DateTime,
        "DATE" => ColumnClass::Date,
        "TIME" => ColumnClass::Time,
        "JSON" => ColumnClass::Json,
        name if name.contains("BLOB") || name.contains("BINARY") => ColumnClass::Bytes,
        _ => ColumnClass::Text,
    }
}

/// Column name and read strategy, computed once per result set.
struct ColumnMeta {
    name: String,
    class: ColumnClass,
}

fn decode_rows(rows: &[MySqlRow]) -> BlueprintResult<Vec<Record>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Vec<ColumnMeta> = first
        .columns()
        .iter()
        .map(|c| ColumnMeta {
            name: c.name().to_string(),
            class: classify(&c.type_info().to_string().to_uppercase()),
        })
        .collect();

    rows.iter()
        .map(|row| -> BlueprintResult<Record> {
            let mut record = Record::with_capacity(columns.len());
            for (idx, col) in columns.iter().enumerate() {
                let value = decode_cell(row, idx, col.class)
                    .map_err(|e| BlueprintError::decode(&col.name, e.to_string()))?;
                record.insert(col.name.clone(), value);
            }
            Ok(record)
        })
        .collect()
}

fn get<'r, T>(row: &'r MySqlRow, idx: usize) -> Result<Option<T>, sqlx::Error>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get::<Option<T>, _>(idx)
}

fn decode_cell(row: &MySqlRow, idx: usize, class: ColumnClass) -> Result<Value, sqlx::Error> {
    let value = match class {
        ColumnClass::Bool => get::<bool>(row, idx)?.map(Value::Bool),
        ColumnClass::Unsigned => get::<u64>(row, idx)?.map(unsigned_value),
        ColumnClass::Signed => get::<i64>(row, idx)?.map(Value::Int),
        ColumnClass::Float => get::<f64>(row, idx)?.map(Value::Float),
        // exact digits as text
        ColumnClass::Decimal => get::<Decimal>(row, idx)?.map(|d| Value::Text(d.to_string())),
        ColumnClass::DateTime => get::<NaiveDateTime>(row, idx)?
            .map(|t| Value::Text(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        ColumnClass::Date => {
            get::<NaiveDate>(row, idx)?.map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
        }
        ColumnClass::Time => {
            get::<NaiveTime>(row, idx)?.map(|t| Value::Text(t.format("%H:%M:%S%.f").to_string()))
        }
        ColumnClass::Json => get::<JsonValue>(row, idx)?.map(|j| Value::Text(j.to_string())),
        ColumnClass::Bytes => get::<Vec<u8>>(row, idx)?.map(lossy_text),
        // String only accepts utf8 collations; other charsets come through as bytes
        ColumnClass::Text => match get::<String>(row, idx) {
            Ok(v) => v.map(Value::Text),
            Err(_) => get::<Vec<u8>>(row, idx)?.map(lossy_text),
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

fn unsigned_value(v: u64) -> Value {
    i64::try_from(v).map_or_else(|_| Value::Text(v.to_string()), Value::Int)
}

fn lossy_text(bytes: Vec<u8>) -> Value {
    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
}
