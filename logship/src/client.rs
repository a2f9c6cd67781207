use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::columns::ColumnValue;
use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;

/// Wire format of a bulk insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertFormat {
    /// `RowBinary` with a leading per-column flag that asks the server to apply the column
    /// default instead of reading a value.
    #[default]
    RowBinaryWithDefaults,
}

impl InsertFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsertFormat::RowBinaryWithDefaults => "RowBinaryWithDefaults",
        }
    }
}

/// Name and declared type of an inserted column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Database operations the sink and the schema manager rely on.
///
/// [`crate::clickhouse::ClickHouseClient`] talks to a real server; `test_utils::TestClient`
/// records calls in memory.
pub trait SinkClient: Send + Sync {
    /// Executes a statement that returns no rows.
    fn execute(&self, sql: &str) -> impl Future<Output = SinkResult<()>> + Send;

    /// Executes a query returning a single value, or `None` when it returns no rows.
    fn execute_scalar(
        &self,
        sql: &str,
    ) -> impl Future<Output = SinkResult<Option<ColumnValue>>> + Send;

    /// Inserts `rows` into `table` (already escaped and qualified) in one request and returns
    /// the number of rows written. Each row holds one value per entry of `columns`, in order.
    fn insert_rows(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        rows: Vec<Vec<ColumnValue>>,
        format: InsertFormat,
    ) -> impl Future<Output = SinkResult<u64>> + Send;

    /// Releases the underlying connection. The default implementation is a no-op.
    fn close(&self) -> impl Future<Output = SinkResult<()>> + Send {
        async { Ok(()) }
    }
}

/// Runs `operation`, returning [`ErrorKind::OperationCanceled`] if `cancel` fires first.
pub(crate) async fn run_cancellable<T, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    future: F,
) -> SinkResult<T>
where
    F: Future<Output = SinkResult<T>>,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(sink_error!(
            ErrorKind::OperationCanceled,
            "Operation canceled",
            operation
        )),
        result = future => result,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn completed_operation_returns_its_result() {
        let cancel = CancellationToken::new();

        let result = run_cancellable(&cancel, "test", async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_pending_operation() {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });

        let result: SinkResult<()> = run_cancellable(&cancel, "insert", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationCanceled);
        assert_eq!(err.detail(), Some("insert"));
    }
}
