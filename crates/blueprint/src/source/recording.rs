//! Statement recording for tests and debugging.

use crate::dialect::Dialect;
use crate::error::BlueprintResult;
use crate::query::Bindings;
use crate::source::Source;
use crate::value::Record;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One statement seen by a [`RecordingSource`] while recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedStatement {
    pub sql: String,
    pub bindings: Bindings,
    /// Error message if the statement failed.
    pub error: Option<String>,
}

/// Wraps a [`Source`] and keeps the SQL, bindings and outcome of every
/// statement run between [`start`](Self::start) and [`stop`](Self::stop).
///
/// ```ignore
/// let source = RecordingSource::new(PgSource::new(client));
/// source.start();
/// blueprint_over(&source).select().with_pattern("users")?.many().await?;
/// for stmt in source.recorded() {
///     println!("{} {:?}", stmt.sql, stmt.error);
/// }
/// ```
pub struct RecordingSource<S> {
    inner: S,
    recording: AtomicBool,
    output: Mutex<Vec<RecordedStatement>>,
}

impl<S: Source> RecordingSource<S> {
    /// Wrap `inner`. Recording starts switched off.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            recording: AtomicBool::new(false),
            output: Mutex::new(Vec::new()),
        }
    }

    /// Clear previous output and start recording.
    pub fn start(&self) {
        self.output().clear();
        self.recording.store(true, Ordering::Relaxed);
    }

    /// Stop recording. Output recorded so far is kept.
    pub fn stop(&self) {
        self.recording.store(false, Ordering::Relaxed);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    /// Snapshot of everything recorded since the last [`start`](Self::start).
    pub fn recorded(&self) -> Vec<RecordedStatement> {
        self.output().clone()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn output(&self) -> MutexGuard<'_, Vec<RecordedStatement>> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record<T>(&self, sql: &str, bindings: &Bindings, result: &BlueprintResult<T>) {
        if !self.is_recording() {
            return;
        }
        self.output().push(RecordedStatement {
            sql: sql.to_string(),
            bindings: bindings.clone(),
            error: result.as_ref().err().map(ToString::to_string),
        });
    }
}

impl<S: Source> Source for RecordingSource<S> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn fetch_all(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<Vec<Record>> {
        let result = self.inner.fetch_all(sql, bindings).await;
        self.record(sql, bindings, &result);
        result
    }

    async fn fetch_one(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<Option<Record>> {
        let result = self.inner.fetch_one(sql, bindings).await;
        self.record(sql, bindings, &result);
        result
    }

    async fn execute(&self, sql: &str, bindings: &Bindings) -> BlueprintResult<u64> {
        let result = self.inner.execute(sql, bindings).await;
        self.record(sql, bindings, &result);
        result
    }

    async fn last_insert_id(&self, table: &str) -> BlueprintResult<i64> {
        self.inner.last_insert_id(table).await
    }
}
