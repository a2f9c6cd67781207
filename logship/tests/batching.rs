#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use logship::event::LogLevel;
use logship::schema::SchemaBuilder;
use logship::sink::{BatchingSink, ClickHouseSink, ClickHouseSinkOptions};
use logship::test_utils::TestClient;
use logship::test_utils::event::{numbered_events, test_event};
use logship_config::shared::BatchConfig;
use logship_telemetry::tracing::init_test_tracing;

fn sink(client: &Arc<TestClient>) -> Arc<ClickHouseSink<TestClient>> {
    let schema = SchemaBuilder::new("logs")
        .add_timestamp_column(true)
        .add_rendered_message_column()
        .build()
        .unwrap();

    Arc::new(ClickHouseSink::with_client(client.clone(), ClickHouseSinkOptions::new(schema)).unwrap())
}

fn batch_config(max_size: usize, flush_interval_ms: u64, queue_limit: usize) -> BatchConfig {
    BatchConfig {
        max_size,
        flush_interval_ms,
        queue_limit,
    }
}

async fn insert_sizes(client: &TestClient) -> Vec<usize> {
    client
        .inserts()
        .await
        .iter()
        .map(|insert| insert.rows.len())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn full_batches_are_flushed_and_remainder_on_shutdown() {
    init_test_tracing();

    let client = Arc::new(TestClient::new());
    let sink = sink(&client);
    let batching =
        BatchingSink::spawn(sink.clone(), batch_config(3, 60_000, 100), LogLevel::Verbose).unwrap();

    for event in numbered_events(7) {
        assert!(batching.log(event));
    }
    batching.shutdown().await.unwrap();

    assert_eq!(insert_sizes(&client).await, [3, 3, 1]);
    assert_eq!(client.statements().await.len(), 1);
    assert!(sink.is_disposed());
}

#[tokio::test(start_paused = true)]
async fn partial_batch_is_flushed_on_interval() {
    init_test_tracing();

    let client = Arc::new(TestClient::new());
    let batching = BatchingSink::spawn(
        sink(&client),
        batch_config(100, 1_000, 1_000),
        LogLevel::Verbose,
    )
    .unwrap();

    for event in numbered_events(2) {
        batching.log(event);
    }
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(insert_sizes(&client).await, [2]);

    batching.log(test_event(LogLevel::Information, "late"));
    batching.shutdown().await.unwrap();

    assert_eq!(insert_sizes(&client).await, [2, 1]);
}

#[tokio::test]
async fn events_below_minimum_level_are_dropped() {
    let client = Arc::new(TestClient::new());
    let batching =
        BatchingSink::spawn(sink(&client), batch_config(10, 60_000, 10), LogLevel::Warning)
            .unwrap();

    assert!(!batching.log(test_event(LogLevel::Information, "ignored")));
    assert!(batching.log(test_event(LogLevel::Warning, "kept")));
    assert!(batching.log(test_event(LogLevel::Fatal, "kept too")));
    batching.shutdown().await.unwrap();

    let inserts = client.inserts().await;
    assert_eq!(inserts.len(), 1);
    assert_eq!(inserts[0].rows.len(), 2);
}

#[tokio::test]
async fn full_queue_drops_new_events() {
    let client = Arc::new(TestClient::new());
    let batching =
        BatchingSink::spawn(sink(&client), batch_config(2, 60_000, 2), LogLevel::Verbose).unwrap();

    let accepted: Vec<bool> = numbered_events(3)
        .into_iter()
        .map(|event| batching.log(event))
        .collect();
    batching.shutdown().await.unwrap();

    assert_eq!(accepted, [true, true, false]);
    assert_eq!(insert_sizes(&client).await, [2]);
}

#[tokio::test]
async fn failed_batch_is_dropped_and_next_batch_proceeds() {
    init_test_tracing();

    let client = Arc::new(TestClient::new().fail_next_inserts(1));
    let sink = sink(&client);
    let batching =
        BatchingSink::spawn(sink.clone(), batch_config(1, 60_000, 10), LogLevel::Verbose).unwrap();

    for event in numbered_events(2) {
        batching.log(event);
    }
    batching.shutdown().await.unwrap();

    assert_eq!(insert_sizes(&client).await, [1, 1]);
    assert_eq!(client.close_count().await, 0);
    assert!(sink.is_disposed());
}

#[tokio::test]
async fn invalid_batch_config_is_rejected() {
    let client = Arc::new(TestClient::new());

    let err = BatchingSink::spawn(sink(&client), batch_config(0, 1_000, 10), LogLevel::Verbose)
        .unwrap_err();

    assert_eq!(err.kind(), logship::error::ErrorKind::ConfigError);
}
