use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::clickhouse::ClickHouseClient;
use crate::clickhouse::metrics::{
    LOGSHIP_BATCH_FAILURES_TOTAL, LOGSHIP_COLUMN_EXTRACTION_FAILURES_TOTAL,
    LOGSHIP_ROWS_WRITTEN_TOTAL, register_metrics,
};
use crate::client::{ColumnSpec, InsertFormat, SinkClient, run_cancellable};
use crate::columns::ColumnValue;
use crate::error::{ErrorKind, SinkResult};
use crate::event::{LogEvent, LogLevel};
use crate::format::FormatProvider;
use crate::schema::sql::escape_qualified_name;
use crate::schema::{SchemaManager, TableSchema};
use crate::sink::{
    BatchFailedCallback, BatchWrittenCallback, BatchedLogSink, ClickHouseSinkOptions,
    TableCreationOptions,
};

/// Writes batches of log events into one ClickHouse table.
///
/// The table is provisioned on the first batch, according to the configured
/// [`TableCreationOptions`]. A failed provisioning is retried on the next batch. Each
/// batch is written with a single bulk insert; nothing is retried.
pub struct ClickHouseSink<C = ClickHouseClient> {
    client: Arc<C>,
    schema_manager: SchemaManager<C>,
    schema: Arc<TableSchema>,
    /// Escaped, database-qualified table name.
    table: String,
    columns: Vec<ColumnSpec>,
    table_creation: TableCreationOptions,
    minimum_level: LogLevel,
    format_provider: Arc<dyn FormatProvider>,
    on_batch_written: Option<BatchWrittenCallback>,
    on_batch_failed: Option<BatchFailedCallback>,
    table_provisioned: AtomicBool,
    disposed: AtomicBool,
    /// Whether the client was created by the sink and is closed on dispose.
    owns_client: bool,
}

impl ClickHouseSink<ClickHouseClient> {
    /// Creates a sink with its own [`ClickHouseClient`] built from `options.connection`.
    ///
    /// The client is closed when the sink is disposed.
    pub fn new(options: ClickHouseSinkOptions) -> SinkResult<Self> {
        options.validate()?;

        let Some(connection) = &options.connection else {
            bail!(
                ErrorKind::ConfigError,
                "ClickHouse connection is required",
                "set `ClickHouseSinkOptions::connection` or hand in a client with `ClickHouseSink::with_client`"
            );
        };
        let client = Arc::new(ClickHouseClient::new(connection));

        Self::build(client, options, true)
    }
}

impl<C> ClickHouseSink<C>
where
    C: SinkClient,
{
    /// Creates a sink writing through a caller-owned client.
    ///
    /// The sink never closes `client`; `options.connection` is ignored.
    pub fn with_client(client: Arc<C>, options: ClickHouseSinkOptions) -> SinkResult<Self> {
        options.validate()?;

        Self::build(client, options, false)
    }

    fn build(client: Arc<C>, options: ClickHouseSinkOptions, owns_client: bool) -> SinkResult<Self> {
        let Some(schema) = options.schema else {
            bail!(ErrorKind::ConfigError, "Table schema is required");
        };

        register_metrics();

        let table = escape_qualified_name(&schema.full_table_name())?;
        let columns = schema
            .columns
            .iter()
            .map(|column| ColumnSpec::new(column.name(), column.column_type().map(str::to_string)))
            .collect();

        Ok(Self {
            schema_manager: SchemaManager::new(client.clone()),
            client,
            schema: Arc::new(schema),
            table,
            columns,
            table_creation: options.table_creation,
            minimum_level: options.minimum_level,
            format_provider: options.format_provider,
            on_batch_written: options.on_batch_written,
            on_batch_failed: options.on_batch_failed,
            table_provisioned: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            owns_client,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Lowest level the host should forward to this sink.
    pub fn minimum_level(&self) -> LogLevel {
        self.minimum_level
    }

    pub fn is_table_provisioned(&self) -> bool {
        self.table_provisioned.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Writes `events` as one bulk insert.
    ///
    /// Provisions the table first if no earlier batch did. A provisioning failure is
    /// returned without invoking `on_batch_failed`. An insert failure invokes
    /// `on_batch_failed` and is then returned. After [`ClickHouseSink::dispose`] this is a
    /// no-op.
    pub async fn emit_batch(
        &self,
        events: Vec<LogEvent>,
        cancel: &CancellationToken,
    ) -> SinkResult<()> {
        if self.is_disposed() {
            debug!(table = %self.table, events = events.len(), "sink disposed, ignoring batch");
            return Ok(());
        }

        let start = Instant::now();

        if !self.is_table_provisioned() {
            if let Err(err) = self
                .schema_manager
                .ensure_table(&self.schema, &self.table_creation, cancel)
                .await
            {
                metrics::counter!(
                    LOGSHIP_BATCH_FAILURES_TOTAL,
                    "table" => self.table.clone(),
                    "stage" => "provision"
                )
                .increment(1);
                error!(
                    table = %self.table,
                    events = events.len(),
                    error = %err,
                    "table provisioning failed, batch not written"
                );

                return Err(err);
            }

            self.table_provisioned.store(true, Ordering::Release);
        }

        let event_count = events.len();
        let rows = self.build_rows(&events);

        let result = run_cancellable(
            cancel,
            "insert rows",
            self.client.insert_rows(
                &self.table,
                &self.columns,
                rows,
                InsertFormat::RowBinaryWithDefaults,
            ),
        )
        .await;
        let elapsed = start.elapsed();

        match result {
            Ok(rows_written) => {
                metrics::counter!(LOGSHIP_ROWS_WRITTEN_TOTAL, "table" => self.table.clone())
                    .increment(rows_written);
                debug!(
                    table = %self.table,
                    rows = rows_written,
                    duration_ms = elapsed.as_millis() as u64,
                    "wrote batch"
                );

                if let Some(callback) = &self.on_batch_written {
                    callback(event_count, elapsed);
                }

                Ok(())
            }
            Err(err) => {
                metrics::counter!(
                    LOGSHIP_BATCH_FAILURES_TOTAL,
                    "table" => self.table.clone(),
                    "stage" => "insert"
                )
                .increment(1);
                error!(
                    table = %self.table,
                    events = event_count,
                    duration_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "failed to write batch"
                );

                if let Some(callback) = &self.on_batch_failed {
                    callback(&err, event_count);
                }

                Err(err)
            }
        }
    }

    /// Called by the host when a flush finds no pending events.
    pub async fn on_empty_batch(&self) -> SinkResult<()> {
        Ok(())
    }

    /// Stops the sink. Later batches are ignored.
    ///
    /// Closes the client only if the sink created it. Calling this again has no effect.
    pub async fn dispose(&self) -> SinkResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!(table = %self.table, owns_client = self.owns_client, "disposing sink");

        if self.owns_client {
            self.client.close().await?;
        }

        Ok(())
    }

    /// One row per event, one value per column, both in order.
    fn build_rows(&self, events: &[LogEvent]) -> Vec<Vec<ColumnValue>> {
        events
            .iter()
            .map(|event| {
                self.schema
                    .columns
                    .iter()
                    .map(|column| {
                        match column.get_value(event, self.format_provider.as_ref()) {
                            Ok(value) => value,
                            Err(err) => {
                                metrics::counter!(
                                    LOGSHIP_COLUMN_EXTRACTION_FAILURES_TOTAL,
                                    "table" => self.table.clone(),
                                    "column" => column.name().to_string()
                                )
                                .increment(1);
                                warn!(
                                    table = %self.table,
                                    column = column.name(),
                                    error = %err,
                                    "column extraction failed, writing column default"
                                );

                                ColumnValue::Default
                            }
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

impl<C> BatchedLogSink for ClickHouseSink<C>
where
    C: SinkClient,
{
    async fn emit_batch(&self, events: Vec<LogEvent>, cancel: &CancellationToken) -> SinkResult<()> {
        ClickHouseSink::emit_batch(self, events, cancel).await
    }

    async fn on_empty_batch(&self) -> SinkResult<()> {
        ClickHouseSink::on_empty_batch(self).await
    }

    async fn dispose(&self) -> SinkResult<()> {
        ClickHouseSink::dispose(self).await
    }
}

impl<C> fmt::Debug for ClickHouseSink<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseSink")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("table_creation", &self.table_creation)
            .field("table_provisioned", &self.table_provisioned)
            .field("disposed", &self.disposed)
            .field("owns_client", &self.owns_client)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;
    use logship_config::shared::TableCreationMode;

    use super::*;
    use crate::columns::{ColumnWriter, PropertyWriteMethod};
    use crate::error::SinkError;
    use crate::schema::SchemaBuilder;
    use crate::sink_error;
    use crate::test_utils::event::{fixed_timestamp, numbered_events, request_event, test_event};
    use crate::test_utils::{RecordedOperation, TestClient};

    fn failing_extractor(
        _event: &LogEvent,
        _format_provider: &dyn FormatProvider,
    ) -> SinkResult<ColumnValue> {
        Err(sink_error!(
            ErrorKind::ConversionError,
            "Extractor failed on purpose"
        ))
    }

    fn basic_schema() -> TableSchema {
        SchemaBuilder::new("logs")
            .add_timestamp_column(true)
            .add_level_column(true)
            .add_rendered_message_column()
            .build()
            .unwrap()
    }

    fn options(mode: TableCreationMode, validate_on_startup: bool) -> ClickHouseSinkOptions {
        ClickHouseSinkOptions::new(basic_schema()).with_table_creation(TableCreationOptions {
            mode,
            validate_on_startup,
        })
    }

    #[derive(Default)]
    struct Calls {
        written: Mutex<Vec<(usize, Duration)>>,
        failed: Mutex<Vec<(ErrorKind, usize)>>,
    }

    fn with_callbacks(options: ClickHouseSinkOptions, calls: &Arc<Calls>) -> ClickHouseSinkOptions {
        let written = calls.clone();
        let failed = calls.clone();

        options
            .on_batch_written(move |count, elapsed| {
                written.written.lock().unwrap().push((count, elapsed));
            })
            .on_batch_failed(move |err: &SinkError, count| {
                failed.failed.lock().unwrap().push((err.kind(), count));
            })
    }

    #[tokio::test]
    async fn first_batch_creates_table_then_inserts_one_row() {
        let client = Arc::new(TestClient::new());
        let calls = Arc::new(Calls::default());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            with_callbacks(options(TableCreationMode::CreateIfNotExists, false), &calls),
        )
        .unwrap();

        sink.emit_batch(
            vec![test_event(LogLevel::Warning, "hello")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let operations = client.operations().await;
        assert_eq!(operations.len(), 2);
        assert!(matches!(
            &operations[0],
            RecordedOperation::Execute(sql) if sql.starts_with("CREATE TABLE IF NOT EXISTS logs (")
        ));

        let RecordedOperation::Insert(insert) = &operations[1] else {
            panic!("expected an insert, got {:?}", operations[1]);
        };
        assert_eq!(insert.table, "logs");
        assert_eq!(insert.column_names(), ["timestamp", "level", "message"]);
        assert_eq!(insert.format, InsertFormat::RowBinaryWithDefaults);
        assert_eq!(
            insert.rows,
            [vec![
                ColumnValue::DateTime(fixed_timestamp().with_timezone(&Utc).fixed_offset()),
                ColumnValue::String("Warning".to_string()),
                ColumnValue::String("hello".to_string()),
            ]]
        );

        assert_eq!(calls.written.lock().unwrap().len(), 1);
        assert_eq!(calls.written.lock().unwrap()[0].0, 1);
        assert!(calls.failed.lock().unwrap().is_empty());
        assert!(sink.is_table_provisioned());
    }

    #[tokio::test]
    async fn table_is_provisioned_once() {
        let client = Arc::new(TestClient::new());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            options(TableCreationMode::CreateIfNotExists, false),
        )
        .unwrap();
        let cancel = CancellationToken::new();

        sink.emit_batch(numbered_events(2), &cancel).await.unwrap();
        sink.emit_batch(numbered_events(3), &cancel).await.unwrap();

        assert_eq!(client.statements().await.len(), 1);
        let inserts = client.inserts().await;
        assert_eq!(inserts.len(), 2);
        assert_eq!(inserts[1].rows.len(), 3);
    }

    #[tokio::test]
    async fn rows_follow_event_order() {
        let client = Arc::new(TestClient::new());
        let schema = SchemaBuilder::new("logs")
            .add_property_column("Index", Some("Int64"), PropertyWriteMethod::Raw)
            .build()
            .unwrap();
        let sink =
            ClickHouseSink::with_client(client.clone(), ClickHouseSinkOptions::new(schema)).unwrap();

        sink.emit_batch(numbered_events(4), &CancellationToken::new())
            .await
            .unwrap();

        let inserts = client.inserts().await;
        let rows = &inserts[0].rows;
        assert_eq!(
            rows,
            &[
                vec![ColumnValue::Int64(0)],
                vec![ColumnValue::Int64(1)],
                vec![ColumnValue::Int64(2)],
                vec![ColumnValue::Int64(3)],
            ]
        );
    }

    #[tokio::test]
    async fn missing_table_fails_before_insert_without_failure_callback() {
        let client = Arc::new(TestClient::new().with_scalar_answer(Some(ColumnValue::UInt8(0))));
        let calls = Arc::new(Calls::default());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            with_callbacks(options(TableCreationMode::None, true), &calls),
        )
        .unwrap();

        let err = sink
            .emit_batch(
                vec![test_event(LogLevel::Information, "hello")],
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationTableMissing);
        assert_eq!(
            client.operations().await,
            [RecordedOperation::ExecuteScalar("EXISTS logs".to_string())]
        );
        assert!(calls.failed.lock().unwrap().is_empty());
        assert!(calls.written.lock().unwrap().is_empty());
        assert!(!sink.is_table_provisioned());
    }

    #[tokio::test]
    async fn failed_provisioning_is_retried_on_next_batch() {
        let client = Arc::new(TestClient::new().fail_next_statements(1));
        let sink = ClickHouseSink::with_client(
            client.clone(),
            options(TableCreationMode::CreateIfNotExists, false),
        )
        .unwrap();
        let cancel = CancellationToken::new();

        let err = sink
            .emit_batch(numbered_events(1), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
        assert!(client.inserts().await.is_empty());
        assert!(!sink.is_table_provisioned());

        sink.emit_batch(numbered_events(1), &cancel).await.unwrap();

        assert_eq!(client.statements().await.len(), 2);
        assert_eq!(client.inserts().await.len(), 1);
        assert!(sink.is_table_provisioned());
    }

    #[tokio::test]
    async fn insert_failure_invokes_callback_and_is_returned() {
        let client = Arc::new(TestClient::new().fail_next_inserts(1));
        let calls = Arc::new(Calls::default());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            with_callbacks(options(TableCreationMode::CreateIfNotExists, false), &calls),
        )
        .unwrap();
        let cancel = CancellationToken::new();

        let err = sink
            .emit_batch(numbered_events(3), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
        assert_eq!(
            *calls.failed.lock().unwrap(),
            [(ErrorKind::DestinationQueryFailed, 3)]
        );
        assert!(calls.written.lock().unwrap().is_empty());

        // The table stays provisioned and the next batch goes straight to the insert.
        sink.emit_batch(numbered_events(1), &cancel).await.unwrap();
        assert_eq!(client.statements().await.len(), 1);
        assert_eq!(client.inserts().await.len(), 2);
        assert_eq!(calls.written.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_failed_insert_reaches_the_failure_callback() {
        let client = Arc::new(TestClient::new().fail_inserts());
        let calls = Arc::new(Calls::default());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            with_callbacks(options(TableCreationMode::CreateIfNotExists, false), &calls),
        )
        .unwrap();
        let cancel = CancellationToken::new();

        for count in [2, 1] {
            let err = sink
                .emit_batch(numbered_events(count), &cancel)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
        }

        assert_eq!(
            *calls.failed.lock().unwrap(),
            [
                (ErrorKind::DestinationQueryFailed, 2),
                (ErrorKind::DestinationQueryFailed, 1)
            ]
        );
        assert!(calls.written.lock().unwrap().is_empty());
        assert_eq!(client.inserts().await.len(), 2);
        assert_eq!(client.statements().await.len(), 1);
    }

    #[tokio::test]
    async fn failing_column_is_replaced_by_default() {
        let client = Arc::new(TestClient::new());
        let schema = SchemaBuilder::new("logs")
            .add_rendered_message_column()
            .add_column(ColumnWriter::custom(
                "broken",
                Some("String".to_string()),
                failing_extractor,
            ))
            .add_property_column("RequestId", Some("String"), PropertyWriteMethod::Raw)
            .build()
            .unwrap();
        let sink =
            ClickHouseSink::with_client(client.clone(), ClickHouseSinkOptions::new(schema)).unwrap();

        sink.emit_batch(
            vec![
                request_event("req-1", 12),
                test_event(LogLevel::Information, "no properties"),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let inserts = client.inserts().await;
        let rows = &inserts[0].rows;
        assert_eq!(
            rows,
            &[
                vec![
                    ColumnValue::String("Handled \"req-1\" in 12 ms".to_string()),
                    ColumnValue::Default,
                    ColumnValue::String("req-1".to_string()),
                ],
                vec![
                    ColumnValue::String("no properties".to_string()),
                    ColumnValue::Default,
                    ColumnValue::Default,
                ],
            ]
        );
        assert!(rows.iter().all(|row| row[1].is_default()));
    }

    #[tokio::test]
    async fn oversized_template_alignment_renders_placeholder_unchanged() {
        let client = Arc::new(TestClient::new());
        let schema = SchemaBuilder::new("logs")
            .add_rendered_message_column()
            .add_property_column("N", Some("Int64"), PropertyWriteMethod::Raw)
            .build()
            .unwrap();
        let sink =
            ClickHouseSink::with_client(client.clone(), ClickHouseSinkOptions::new(schema)).unwrap();
        let event = test_event(LogLevel::Information, "padded {N,70000} took {N:F70000}")
            .with_property("N", 1);

        sink.emit_batch(vec![event], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            client.inserts().await[0].rows,
            [vec![
                ColumnValue::String("padded {N,70000} took 1".to_string()),
                ColumnValue::Int64(1),
            ]]
        );
    }

    #[tokio::test]
    async fn null_values_stay_null() {
        let client = Arc::new(TestClient::new());
        let schema = SchemaBuilder::new("logs")
            .add_exception_column()
            .build()
            .unwrap();
        let sink =
            ClickHouseSink::with_client(client.clone(), ClickHouseSinkOptions::new(schema)).unwrap();

        sink.emit_batch(
            vec![test_event(LogLevel::Error, "no exception")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(client.inserts().await[0].rows, [vec![ColumnValue::Null]]);
    }

    #[tokio::test]
    async fn qualified_name_is_escaped() {
        let client = Arc::new(TestClient::new());
        let schema = SchemaBuilder::new("my-logs")
            .with_database("obs")
            .add_rendered_message_column()
            .build()
            .unwrap();
        let sink =
            ClickHouseSink::with_client(client.clone(), ClickHouseSinkOptions::new(schema)).unwrap();

        sink.emit_batch(numbered_events(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(client.inserts().await[0].table, "obs.`my-logs`");
    }

    #[tokio::test]
    async fn disposed_sink_ignores_batches() {
        let client = Arc::new(TestClient::new());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            options(TableCreationMode::CreateIfNotExists, false),
        )
        .unwrap();

        sink.dispose().await.unwrap();
        sink.emit_batch(numbered_events(5), &CancellationToken::new())
            .await
            .unwrap();

        assert!(client.operations().await.is_empty());
        assert!(sink.is_disposed());
    }

    #[tokio::test]
    async fn caller_owned_client_is_never_closed() {
        let client = Arc::new(TestClient::new());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            options(TableCreationMode::CreateIfNotExists, false),
        )
        .unwrap();

        sink.dispose().await.unwrap();
        sink.dispose().await.unwrap();

        assert_eq!(client.close_count().await, 0);
    }

    #[tokio::test]
    async fn owned_client_is_closed_once() {
        let client = Arc::new(TestClient::new());
        let sink = ClickHouseSink::build(
            client.clone(),
            options(TableCreationMode::CreateIfNotExists, false),
            true,
        )
        .unwrap();

        sink.dispose().await.unwrap();
        sink.dispose().await.unwrap();

        assert_eq!(client.close_count().await, 1);
    }

    #[tokio::test]
    async fn on_empty_batch_touches_nothing() {
        let client = Arc::new(TestClient::new());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            options(TableCreationMode::CreateIfNotExists, false),
        )
        .unwrap();

        sink.on_empty_batch().await.unwrap();

        assert!(client.operations().await.is_empty());
    }

    #[tokio::test]
    async fn cancellation_during_provisioning_leaves_table_unprovisioned() {
        let client = Arc::new(TestClient::new());
        let calls = Arc::new(Calls::default());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            with_callbacks(options(TableCreationMode::CreateIfNotExists, false), &calls),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = sink
            .emit_batch(numbered_events(1), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OperationCanceled);
        assert!(!sink.is_table_provisioned());
        assert!(calls.failed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_insert_goes_through_failure_callback() {
        let client = Arc::new(TestClient::new().with_insert_delay(Duration::from_secs(30)));
        let calls = Arc::new(Calls::default());
        let sink = ClickHouseSink::with_client(
            client.clone(),
            with_callbacks(options(TableCreationMode::CreateIfNotExists, false), &calls),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = sink
            .emit_batch(numbered_events(2), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OperationCanceled);
        assert_eq!(
            *calls.failed.lock().unwrap(),
            [(ErrorKind::OperationCanceled, 2)]
        );
        assert!(sink.is_table_provisioned());
    }

    #[test]
    fn new_requires_connection() {
        let err = ClickHouseSink::new(ClickHouseSinkOptions::new(basic_schema())).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(err.description(), "ClickHouse connection is required");
    }

    #[test]
    fn with_client_rejects_missing_schema() {
        let err = ClickHouseSink::with_client(
            Arc::new(TestClient::new()),
            ClickHouseSinkOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
