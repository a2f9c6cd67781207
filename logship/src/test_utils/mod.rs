//! Testing utilities for logship sinks.
//!
//! - [`client`] provides [`client::TestClient`], an in-memory [`crate::client::SinkClient`]
//!   that records every call and can be told to fail.
//! - [`event`] builds log events with fixed timestamps.
//! - [`clickhouse`] reads the connection of a live ClickHouse server from the environment
//!   and creates throwaway databases on it.

pub mod clickhouse;
pub mod client;
pub mod event;

pub use client::{RecordedInsert, RecordedOperation, TestClient};
