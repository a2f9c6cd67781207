//! The ClickHouse log sink and its host-facing surface.

mod base;
mod batching;
mod core;
mod options;

pub use base::BatchedLogSink;
pub use batching::BatchingSink;
pub use core::ClickHouseSink;
pub use logship_config::shared::{TableCreationConfig as TableCreationOptions, TableCreationMode};
pub use options::{BatchFailedCallback, BatchWrittenCallback, ClickHouseSinkOptions};
