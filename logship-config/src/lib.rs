//! Configuration for logship sinks.
//!
//! Hosts the serde-deserializable configuration types shared by the sink crate and the
//! binaries, together with the layered file + environment loader.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
