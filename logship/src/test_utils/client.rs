use std::time::Duration;

use tokio::sync::Mutex;

use crate::client::{ColumnSpec, InsertFormat, SinkClient};
use crate::columns::ColumnValue;
use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;

/// A bulk insert captured by [`TestClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedInsert {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<ColumnValue>>,
    pub format: InsertFormat,
}

impl RecordedInsert {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

/// A call received by [`TestClient`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOperation {
    Execute(String),
    ExecuteScalar(String),
    Insert(RecordedInsert),
    Close,
}

#[derive(Debug)]
struct Inner {
    operations: Vec<RecordedOperation>,
    failing_prefixes: Vec<String>,
    /// Number of upcoming statements that fail regardless of their text.
    failing_statements: usize,
    /// Number of upcoming inserts that fail; `None` fails every insert.
    failing_inserts: Option<usize>,
    insert_delay: Option<Duration>,
    scalar_answer: Option<ColumnValue>,
}

/// In-memory [`SinkClient`] that records every call.
///
/// Failed calls are recorded too, before their error is returned. Configure the client
/// before sharing it; the configuration methods consume and return it.
#[derive(Debug)]
pub struct TestClient {
    inner: Mutex<Inner>,
}

impl TestClient {
    /// Creates a client whose statements succeed and whose `EXISTS` checks answer `1`.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                operations: Vec::new(),
                failing_prefixes: Vec::new(),
                failing_statements: 0,
                failing_inserts: Some(0),
                insert_delay: None,
                scalar_answer: Some(ColumnValue::UInt8(1)),
            }),
        }
    }

    /// Fails every statement starting with `prefix` (case-sensitive).
    pub fn fail_statements_starting_with(mut self, prefix: impl Into<String>) -> Self {
        self.inner.get_mut().failing_prefixes.push(prefix.into());
        self
    }

    /// Fails the next `count` statements, then lets statements through again.
    pub fn fail_next_statements(mut self, count: usize) -> Self {
        self.inner.get_mut().failing_statements = count;
        self
    }

    /// Fails every insert.
    pub fn fail_inserts(mut self) -> Self {
        self.inner.get_mut().failing_inserts = None;
        self
    }

    /// Fails the next `count` inserts, then lets inserts through again.
    pub fn fail_next_inserts(mut self, count: usize) -> Self {
        self.inner.get_mut().failing_inserts = Some(count);
        self
    }

    /// Delays every insert by `delay` before it completes.
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.inner.get_mut().insert_delay = Some(delay);
        self
    }

    /// Sets the value returned by `execute_scalar`.
    pub fn with_scalar_answer(mut self, answer: Option<ColumnValue>) -> Self {
        self.inner.get_mut().scalar_answer = answer;
        self
    }

    pub async fn operations(&self) -> Vec<RecordedOperation> {
        self.inner.lock().await.operations.clone()
    }

    /// Returns the SQL of every `execute` and `execute_scalar` call.
    pub async fn statements(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .operations
            .iter()
            .filter_map(|operation| match operation {
                RecordedOperation::Execute(sql) | RecordedOperation::ExecuteScalar(sql) => {
                    Some(sql.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub async fn inserts(&self) -> Vec<RecordedInsert> {
        self.inner
            .lock()
            .await
            .operations
            .iter()
            .filter_map(|operation| match operation {
                RecordedOperation::Insert(insert) => Some(insert.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn close_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .operations
            .iter()
            .filter(|operation| matches!(operation, RecordedOperation::Close))
            .count()
    }

    async fn record_statement(&self, operation: RecordedOperation, sql: &str) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.operations.push(operation);

        let prefix_matches = inner
            .failing_prefixes
            .iter()
            .any(|prefix| sql.starts_with(prefix.as_str()));
        if inner.failing_statements > 0 {
            inner.failing_statements -= 1;
            return Err(injected_failure(sql));
        }
        if prefix_matches {
            return Err(injected_failure(sql));
        }

        Ok(())
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

fn injected_failure(statement: &str) -> crate::error::SinkError {
    sink_error!(
        ErrorKind::DestinationQueryFailed,
        "Injected test failure",
        statement
    )
}

impl SinkClient for TestClient {
    async fn execute(&self, sql: &str) -> SinkResult<()> {
        self.record_statement(RecordedOperation::Execute(sql.to_string()), sql)
            .await
    }

    async fn execute_scalar(&self, sql: &str) -> SinkResult<Option<ColumnValue>> {
        self.record_statement(RecordedOperation::ExecuteScalar(sql.to_string()), sql)
            .await?;

        Ok(self.inner.lock().await.scalar_answer.clone())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        rows: Vec<Vec<ColumnValue>>,
        format: InsertFormat,
    ) -> SinkResult<u64> {
        let row_count = rows.len() as u64;
        let delay = {
            let mut inner = self.inner.lock().await;
            inner.operations.push(RecordedOperation::Insert(RecordedInsert {
                table: table.to_string(),
                columns: columns.to_vec(),
                rows,
                format,
            }));

            let fail = match &mut inner.failing_inserts {
                None => true,
                Some(0) => false,
                Some(remaining) => {
                    *remaining -= 1;
                    true
                }
            };
            if fail {
                return Err(injected_failure(table));
            }

            inner.insert_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(row_count)
    }

    async fn close(&self) -> SinkResult<()> {
        self.inner.lock().await.operations.push(RecordedOperation::Close);

        Ok(())
    }
}
