//! Shared configuration types for logship sinks.

mod base;
mod batch;
mod connection;
mod sink;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use connection::ClickHouseConnectionConfig;
pub use sink::{SinkConfig, TableConfig, TableCreationConfig, TableCreationMode};
