#![cfg(feature = "test-utils")]

use std::sync::{Arc, Once};

use logship::columns::{ColumnWriter, PropertyWriteMethod};
use logship::error::ErrorKind;
use logship::event::{LogException, LogLevel};
use logship::schema::{SchemaBuilder, TableSchema};
use logship::sink::{ClickHouseSink, ClickHouseSinkOptions, TableCreationMode, TableCreationOptions};
use logship::test_utils::clickhouse::{ClickHouseTestDatabase, skip_if_missing_clickhouse_env_vars};
use logship::test_utils::event::{request_event, test_event};
use logship_telemetry::tracing::init_test_tracing;
use tokio_util::sync::CancellationToken;

/// Ensures the rustls crypto provider is only installed once across all tests.
static INIT_CRYPTO: Once = Once::new();

fn install_crypto_provider() {
    INIT_CRYPTO.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("failed to install default crypto provider");
    });
}

fn request_schema(database: &str) -> TableSchema {
    SchemaBuilder::new("request_logs")
        .with_database(database)
        .add_timestamp_column(true)
        .add_level_column(true)
        .add_rendered_message_column()
        .add_exception_column()
        .add_column(ColumnWriter::all_properties_as_json().with_type("String"))
        .add_property_column("RequestId", Some("String DEFAULT 'none'"), PropertyWriteMethod::Raw)
        .add_property_column("Elapsed", Some("Nullable(Int64)"), PropertyWriteMethod::Raw)
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_is_written_to_created_table() {
    if skip_if_missing_clickhouse_env_vars() {
        return;
    }

    init_test_tracing();
    install_crypto_provider();

    let database = ClickHouseTestDatabase::create().await;
    let sink = ClickHouseSink::new(
        ClickHouseSinkOptions::new(request_schema(database.database()))
            .with_connection(database.connection()),
    )
    .unwrap();

    sink.emit_batch(
        vec![
            request_event("req-1", 12),
            test_event(LogLevel::Error, "Request failed")
                .with_exception(LogException::new("TimeoutError", "upstream timed out")),
        ],
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let table = format!("`{}`.request_logs", database.database());
    assert_eq!(database.count_rows(&table).await, 2);

    let rows = database
        .fetch_strings(&format!(
            "SELECT concat(level, '|', message, '|', RequestId, '|', ifNull(toString(Elapsed), 'NULL'), '|', ifNull(exception, '')) FROM {table} ORDER BY message"
        ))
        .await;
    assert_eq!(
        rows,
        [
            "Information|Handled \"req-1\" in 12 ms|req-1|12|",
            "Error|Request failed|none|NULL|TimeoutError: upstream timed out",
        ]
    );

    sink.dispose().await.unwrap();
    database.drop_database().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn untyped_columns_use_existing_table_types() {
    if skip_if_missing_clickhouse_env_vars() {
        return;
    }

    init_test_tracing();
    install_crypto_provider();

    let database = ClickHouseTestDatabase::create().await;
    database
        .execute(
            "CREATE TABLE managed_logs (message String, RequestId LowCardinality(String), Elapsed UInt32) ENGINE = MergeTree ORDER BY tuple()",
        )
        .await;

    let schema = SchemaBuilder::new("managed_logs")
        .with_database(database.database())
        .add_rendered_message_column()
        .add_property_column("RequestId", None, PropertyWriteMethod::Raw)
        .add_property_column("Elapsed", None, PropertyWriteMethod::Raw)
        .build()
        .unwrap();
    let sink = ClickHouseSink::new(
        ClickHouseSinkOptions::new(schema)
            .with_connection(database.connection())
            .with_table_creation(TableCreationOptions {
                mode: TableCreationMode::None,
                validate_on_startup: true,
            }),
    )
    .unwrap();

    sink.emit_batch(vec![request_event("req-9", 250)], &CancellationToken::new())
        .await
        .unwrap();

    let rows = database
        .fetch_strings(&format!(
            "SELECT concat(RequestId, '|', toString(Elapsed)) FROM `{}`.managed_logs",
            database.database()
        ))
        .await;
    assert_eq!(rows, ["req-9|250"]);

    sink.dispose().await.unwrap();
    database.drop_database().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_table_is_reported_when_validation_is_enabled() {
    if skip_if_missing_clickhouse_env_vars() {
        return;
    }

    init_test_tracing();
    install_crypto_provider();

    let database = ClickHouseTestDatabase::create().await;
    let failures = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = failures.clone();
    let sink = ClickHouseSink::new(
        ClickHouseSinkOptions::new(request_schema(database.database()))
            .with_connection(database.connection())
            .with_table_creation(TableCreationOptions {
                mode: TableCreationMode::None,
                validate_on_startup: true,
            })
            .on_batch_failed(move |_, _| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
    )
    .unwrap();

    let err = sink
        .emit_batch(vec![request_event("req-1", 1)], &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationTableMissing);
    assert_eq!(failures.load(std::sync::atomic::Ordering::SeqCst), 0);

    sink.dispose().await.unwrap();
    database.drop_database().await;
}
