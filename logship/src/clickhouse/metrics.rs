use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

/// Duration of provisioning DDL statements sent to ClickHouse.
/// Labels: `table`.
pub const LOGSHIP_CH_DDL_DURATION_SECONDS: &str = "logship_ch_ddl_duration_seconds";

/// Duration of a single bulk INSERT from first write to server acknowledgement.
/// Labels: `table`.
pub const LOGSHIP_CH_INSERT_DURATION_SECONDS: &str = "logship_ch_insert_duration_seconds";

/// Rows acknowledged by ClickHouse.
/// Labels: `table`.
pub const LOGSHIP_ROWS_WRITTEN_TOTAL: &str = "logship_rows_written_total";

/// Column values replaced by the column default after extraction failed.
/// Labels: `table`, `column`.
pub const LOGSHIP_COLUMN_EXTRACTION_FAILURES_TOTAL: &str =
    "logship_column_extraction_failures_total";

/// Batches that failed to provision or insert.
/// Labels: `table`, `stage` (`provision` or `insert`).
pub const LOGSHIP_BATCH_FAILURES_TOTAL: &str = "logship_batch_failures_total";

/// Events dropped by the batching driver before reaching the sink.
/// Labels: `reason` (`queue_full` or `closed`).
pub const LOGSHIP_EVENTS_DROPPED_TOTAL: &str = "logship_events_dropped_total";

/// Registers the sink metrics.
///
/// Safe to call multiple times; registration happens only once.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_histogram!(
            LOGSHIP_CH_DDL_DURATION_SECONDS,
            Unit::Seconds,
            "Duration of provisioning DDL statements sent to ClickHouse, labeled by table"
        );

        describe_histogram!(
            LOGSHIP_CH_INSERT_DURATION_SECONDS,
            Unit::Seconds,
            "Duration of bulk INSERT statements from first write to server acknowledgement, labeled by table"
        );

        describe_counter!(
            LOGSHIP_ROWS_WRITTEN_TOTAL,
            Unit::Count,
            "Rows written to ClickHouse, labeled by table"
        );

        describe_counter!(
            LOGSHIP_COLUMN_EXTRACTION_FAILURES_TOTAL,
            Unit::Count,
            "Column values replaced by the column default after extraction failed, labeled by table and column"
        );

        describe_counter!(
            LOGSHIP_BATCH_FAILURES_TOTAL,
            Unit::Count,
            "Batches that failed to provision the table or insert rows, labeled by table and stage"
        );

        describe_counter!(
            LOGSHIP_EVENTS_DROPPED_TOTAL,
            Unit::Count,
            "Events dropped by the batching driver before reaching the sink, labeled by reason"
        );
    });
}
