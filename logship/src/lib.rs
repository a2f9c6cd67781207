//! Structured log delivery into ClickHouse.
//!
//! A [`sink::ClickHouseSink`] turns batches of [`event::LogEvent`]s into rows of a table
//! described by a [`schema::TableSchema`]. Each column is produced by a
//! [`columns::ColumnWriter`], and all rows of a batch go out in one bulk insert. The
//! table is provisioned before the first batch is written.
//!
//! The sink does not queue or retry. Hosts hand it pre-batched events, or use
//! [`sink::BatchingSink`] for a minimal size/interval driver.

pub mod clickhouse;
pub mod client;
pub mod columns;
pub mod error;
pub mod event;
pub mod format;
mod macros;
pub mod schema;
pub mod sink;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
