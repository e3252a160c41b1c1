//! PostgreSQL adapter over tokio-postgres.

use crate::dialect::{Dialect, PositionalStyle};
use crate::error::{BlueprintError, BlueprintResult};
use crate::query::Bindings;
use crate::source::{Source, statement_kind, to_positional, truncate_sql};
use crate::value::{Record, Value};
use bytes::BytesMut;
use rust_decimal::Decimal;
use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

/// A trait that unifies PostgreSQL clients and transactions.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = BlueprintResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = BlueprintResult<u64>> + Send;

    /// Return a cancellation token for the underlying connection, if supported.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> BlueprintResult<Vec<Row>> {
        Ok(tokio_postgres::Client::query(self, sql, params).await?)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> BlueprintResult<u64> {
        Ok(tokio_postgres::Client::execute(self, sql, params).await?)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Client::cancel_token(self))
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> BlueprintResult<Vec<Row>> {
        Ok(tokio_postgres::Transaction::query(self, sql, params).await?)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> BlueprintResult<u64> {
        Ok(tokio_postgres::Transaction::execute(self, sql, params).await?)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Transaction::cancel_token(self))
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> BlueprintResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper -> tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        GenericClient::query(client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> BlueprintResult<u64> {
        let client: &tokio_postgres::Client = self;
        GenericClient::execute(client, sql, params).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        let client: &tokio_postgres::Client = self;
        GenericClient::cancel_token(client)
    }
}

/// [`Source`] over any [`GenericClient`].
pub struct PgSource<C> {
    client: C,
    query_timeout: Option<Duration>,
}

impl<C: GenericClient> PgSource<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            query_timeout: None,
        }
    }

    /// Fail statements that run longer than `timeout`.
    ///
    /// On timeout a best-effort cancel is sent to the server.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    /// Column names of `table` in the current database, in ordinal order.
    pub async fn table_columns(&self, table: &str) -> BlueprintResult<Vec<String>> {
        let mut bindings = Bindings::new();
        bindings.insert(":table_name".to_string(), Value::from(table));
        let rows = self
            .fetch_all(
                "SELECT column_name::text AS column_name FROM information_schema.columns \
                 WHERE table_name = :table_name AND table_catalog = current_database() \
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

    /// Primary key column of `table`, if it has a single-column one.
    pub async fn primary_key(&self, table: &str) -> BlueprintResult<Option<String>> {
        let mut bindings = Bindings::new();
        bindings.insert(":table_name".to_string(), Value::from(table));
        let row = self
            .fetch_one(
                "SELECT a.attname::text AS attname FROM pg_index i \
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
                 WHERE i.indrelid = :table_name::text::regclass AND i.indisprimary",
                &bindings,
            )
            .await?;
        Ok(row.and_then(|mut r| match r.shift_remove("attname") {
            Some(Value::Text(name)) => Some(name),
            _ => None,
        }))
    }

    async fn run_with_timeout<T, F>(&self, future: F) -> BlueprintResult<T>
    where
        F: Future<Output = BlueprintResult<T>> + Send,
    {
        match self.query_timeout {
            Some(timeout) => tokio::time::timeout(timeout, future).await.map_err(|_| {
                if let Some(cancel_token) = self.client.cancel_token() {
                    tokio::spawn(async move {
                        let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                    });
                }
                BlueprintError::Timeout(timeout)
            })?,
            None => future.await,
        }
    }
}

impl PgSource<tokio_postgres::Client> {
    /// Start a transaction on this connection.
    ///
    /// The returned source runs statements inside it and keeps the query
    /// timeout. Dropping it without [`commit`](PgSource::commit) rolls back.
    pub async fn transaction(&mut self) -> BlueprintResult<PgSource<tokio_postgres::Transaction<'_>>> {
        let tx = self.client.transaction().await?;
        tracing::debug!(target: "blueprint.sql", "postgres transaction started");
        Ok(PgSource {
            client: tx,
            query_timeout: self.query_timeout,
        })
    }
}

#[cfg(feature = "pool")]
impl PgSource<deadpool_postgres::Client> {
    /// Start a transaction on the pooled connection.
    pub async fn transaction(&mut self) -> BlueprintResult<PgSource<tokio_postgres::Transaction<'_>>> {
        let client: &mut tokio_postgres::Client = &mut self.client;
        let tx = client.transaction().await?;
        tracing::debug!(target: "blueprint.sql", "postgres transaction started");
        Ok(PgSource {
            client: tx,
            query_timeout: self.query_timeout,
        })
    }
}

impl PgSource<tokio_postgres::Transaction<'_>> {
    pub async fn commit(self) -> BlueprintResult<()> {
        self.client.commit().await?;
        tracing::debug!(target: "blueprint.sql", "postgres transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> BlueprintResult<()> {
        self.client.rollback().await?;
        tracing::debug!(target: "blueprint.sql", "postgres transaction rolled back");
        Ok(())
    }
}

impl<C: GenericClient> Source for PgSource<C> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_all(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<Vec<Record>> {
        let (sql, values) = to_positional(sql, bindings, PositionalStyle::DollarNumbered)?;
        let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        tracing::debug!(
            target: "blueprint.sql",
            kind = statement_kind(&sql),
            sql = truncate_sql(&sql),
            params = params.len(),
            "postgres fetch"
        );
        let rows = self
            .run_with_timeout(self.client.query(&sql, &params))
            .await
            .inspect_err(|e| tracing::warn!(target: "blueprint.sql", error = %e, "postgres fetch failed"))?;

        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<u64> {
        let (sql, values) = to_positional(sql, bindings, PositionalStyle::DollarNumbered)?;
        let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        tracing::debug!(
            target: "blueprint.sql",
            kind = statement_kind(&sql),
            sql = truncate_sql(&sql),
            params = params.len(),
            "postgres execute"
        );
        self.run_with_timeout(self.client.execute(&sql, &params))
            .await
            .inspect_err(|e| tracing::warn!(target: "blueprint.sql", error = %e, "postgres execute failed"))
    }

    /// Current value of the sequence behind `table`'s primary key in this
    /// session.
    async fn last_insert_id(&self, table: &str) -> BlueprintResult<i64> {
        let key = self.primary_key(table).await?.ok_or_else(|| {
            BlueprintError::NotFound(format!("table '{table}' has no single-column primary key"))
        })?;

        let mut bindings = Bindings::new();
        bindings.insert(":table_name".to_string(), Value::from(table));
        bindings.insert(":column_name".to_string(), Value::from(key.as_str()));
        let row = self
            .fetch_one(
                "SELECT currval(pg_get_serial_sequence(:table_name, :column_name)) AS id",
                &bindings,
            )
            .await?;
        match row.and_then(|mut r| r.shift_remove("id")) {
            Some(Value::Int(id)) => Ok(id),
            _ => Err(BlueprintError::NotFound(format!(
                "no sequence behind '{table}.{key}'"
            ))),
        }
    }
}

// ==================== binding ====================

fn bind_err(value: &Value, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot bind {value} to a {ty} parameter").into()
}

fn is_textual(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                Type::INT2 => i16::from(*b).to_sql(ty, out),
                Type::INT4 => i32::from(*b).to_sql(ty, out),
                Type::INT8 => i64::from(*b).to_sql(ty, out),
                _ if is_textual(ty) => b.to_string().to_sql(ty, out),
                _ => Err(bind_err(self, ty)),
            },
            Value::Int(i) => match *ty {
                Type::INT8 => i.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                _ if is_textual(ty) => i.to_string().to_sql(ty, out),
                _ => Err(bind_err(self, ty)),
            },
            Value::Float(x) => match *ty {
                Type::FLOAT8 => x.to_sql(ty, out),
                Type::FLOAT4 => (*x as f32).to_sql(ty, out),
                _ if is_textual(ty) => x.to_string().to_sql(ty, out),
                _ => Err(bind_err(self, ty)),
            },
            Value::Text(s) => match *ty {
                _ if is_textual(ty) => s.to_sql(ty, out),
                Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
                Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
                Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
                Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
                Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
                Type::BOOL => parse_bool(s).ok_or_else(|| bind_err(self, ty))?.to_sql(ty, out),
                Type::UUID => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
                Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(s.trim())?
                    .with_timezone(&chrono::Utc)
                    .to_sql(ty, out),
                Type::TIMESTAMP => parse_naive_datetime(s)
                    .ok_or_else(|| bind_err(self, ty))?
                    .to_sql(ty, out),
                Type::DATE => chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?.to_sql(ty, out),
                _ => Err(bind_err(self, ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // type checks happen per value in to_sql
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_naive_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
}

// ==================== decoding ====================

fn decode_row(row: &Row) -> BlueprintResult<Record> {
    let mut record = Record::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let value = decode_column(row, idx, name, column.type_())?;
        record.insert(name.to_string(), value);
    }
    Ok(record)
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, name: &str) -> BlueprintResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| BlueprintError::decode(name, e.to_string()))
}

fn decode_column(row: &Row, idx: usize, name: &str, ty: &Type) -> BlueprintResult<Value> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx, name)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx, name)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx, name)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx, name)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx, name)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx, name)?.map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx, name)?.map(Value::Float),
        Type::NUMERIC => get::<NumericText>(row, idx, name)?.map(|n| Value::Text(n.0)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => get::<String>(row, idx, name)?.map(Value::Text),
        Type::JSON | Type::JSONB => {
            get::<serde_json::Value>(row, idx, name)?.map(|j| Value::Text(j.to_string()))
        }
        Type::UUID => get::<uuid::Uuid>(row, idx, name)?.map(|u| Value::Text(u.to_string())),
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx, name)?
            .map(|t| Value::Text(t.to_rfc3339())),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx, name)?
            .map(|t| Value::Text(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::DATE => get::<chrono::NaiveDate>(row, idx, name)?.map(|d| Value::Text(d.to_string())),
        Type::TIME => get::<chrono::NaiveTime>(row, idx, name)?.map(|t| Value::Text(t.to_string())),
        _ => {
            return Err(BlueprintError::decode(
                name,
                format!("unsupported column type {ty}"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// NUMERIC decoded to its exact decimal text.
///
/// rust_decimal has no NaN or infinities, so those are read from the sign
/// word before handing the rest over.
struct NumericText(String);

const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let sign = raw.get(4..6).map(|w| u16::from_be_bytes([w[0], w[1]]));
        let text = match sign {
            Some(NUMERIC_NAN) => "NaN".to_string(),
            Some(NUMERIC_PINF) => "Infinity".to_string(),
            Some(NUMERIC_NINF) => "-Infinity".to_string(),
            _ => Decimal::from_sql(ty, raw)?.to_string(),
        };
        Ok(NumericText(text))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn numeric_text(raw: &[u8]) -> String {
        NumericText::from_sql(&Type::NUMERIC, raw).unwrap().0
    }

    #[test]
    fn numeric_keeps_exact_digits() {
        assert_eq!(numeric_text(&numeric(1, 0, 3, &[1, 2345, 6780])), "12345.678");
        assert_eq!(numeric_text(&numeric(-1, 0, 2, &[500])), "0.05");
        assert_eq!(numeric_text(&numeric(0, 0x4000, 1, &[7, 5000])), "-7.5");
    }

    #[test]
    fn numeric_special_values() {
        assert_eq!(numeric_text(&numeric(0, NUMERIC_NAN, 0, &[])), "NaN");
        assert_eq!(numeric_text(&numeric(0, NUMERIC_PINF, 0, &[])), "Infinity");
        assert_eq!(numeric_text(&numeric(0, NUMERIC_NINF, 0, &[])), "-Infinity");
        assert!(NumericText::from_sql(&Type::NUMERIC, &[0, 1]).is_err());
        assert!(!<NumericText as FromSql<'_>>::accepts(&Type::INT4));
    }

    #[test]
    fn value_binds_by_target_type() {
        let mut out = BytesMut::new();
        assert!(matches!(Value::Null.to_sql(&Type::INT4, &mut out), Ok(IsNull::Yes)));

        out.clear();
        Value::Int(7).to_sql(&Type::INT4, &mut out).unwrap();
        assert_eq!(&out[..], &7i32.to_be_bytes());

        out.clear();
        Value::from("12").to_sql(&Type::INT8, &mut out).unwrap();
        assert_eq!(&out[..], &12i64.to_be_bytes());

        out.clear();
        Value::Bool(true).to_sql(&Type::BOOL, &mut out).unwrap();
        assert_eq!(&out[..], &[1]);
    }

    #[test]
    fn value_bind_failures() {
        let mut out = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql(&Type::INT2, &mut out).is_err());
        assert!(Value::from("abc").to_sql(&Type::INT4, &mut out).is_err());
        assert!(Value::Float(1.0).to_sql(&Type::BOOL, &mut out).is_err());
    }

    #[test]
    fn bool_text_forms() {
        assert_eq!(parse_bool("T"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
