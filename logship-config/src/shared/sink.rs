use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{BatchConfig, ClickHouseConnectionConfig, ValidationError};

/// How the destination table is provisioned before the first batch is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableCreationMode {
    /// Issue `CREATE TABLE IF NOT EXISTS`.
    #[default]
    CreateIfNotExists,
    /// Issue no DDL; the table is managed externally.
    None,
    /// Drop the table and create it again. Destroys existing data.
    DropAndRecreate,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCreationConfig {
    #[serde(default)]
    pub mode: TableCreationMode,
    /// When `mode` is [`TableCreationMode::None`], check that the table exists before writing.
    #[serde(default)]
    pub validate_on_startup: bool,
}

/// Identity and DDL options of the destination table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    pub database: Option<String>,
    pub comment: Option<String>,
    /// Raw engine clause replacing the default `MergeTree` clause.
    pub engine: Option<String>,
}

fn default_minimum_level() -> String {
    SinkConfig::DEFAULT_MINIMUM_LEVEL.to_string()
}

/// Top-level configuration of a ClickHouse log sink.
#[derive(Clone, Debug, Deserialize)]
pub struct SinkConfig {
    pub connection: ClickHouseConnectionConfig,
    pub table: TableConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub table_creation: TableCreationConfig,
    /// Name of the lowest level forwarded to the sink (`verbose` ... `fatal`).
    #[serde(default = "default_minimum_level")]
    pub minimum_level: String,
}

impl SinkConfig {
    pub const DEFAULT_MINIMUM_LEVEL: &'static str = "verbose";

    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()?;
        self.batch.validate()?;

        if self.table.name.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "table.name".to_string(),
                constraint: "must not be blank".to_string(),
            });
        }

        Ok(())
    }
}

impl Config for SinkConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
