//! Tracing set-up shared by logship binaries and tests.

pub mod tracing;
