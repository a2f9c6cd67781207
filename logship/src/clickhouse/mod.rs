//! ClickHouse implementation of [`crate::client::SinkClient`].

mod client;
mod encoding;
pub mod metrics;

pub use client::ClickHouseClient;
