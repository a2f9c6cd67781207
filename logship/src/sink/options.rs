use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use logship_config::shared::{ClickHouseConnectionConfig, SinkConfig};

use crate::bail;
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::event::LogLevel;
use crate::format::{FormatProvider, InvariantFormatProvider};
use crate::schema::{SchemaBuilder, TableSchema};
use crate::sink::TableCreationOptions;

/// Called after a batch was written with the number of events and the time it took,
/// provisioning included.
pub type BatchWrittenCallback = Arc<dyn Fn(usize, Duration) + Send + Sync>;

/// Called after an insert failed with the error and the number of events in the batch.
pub type BatchFailedCallback = Arc<dyn Fn(&SinkError, usize) + Send + Sync>;

/// Everything needed to build a [`crate::sink::ClickHouseSink`].
#[derive(Clone)]
pub struct ClickHouseSinkOptions {
    /// Required when the sink creates its own client.
    pub connection: Option<ClickHouseConnectionConfig>,
    pub schema: Option<TableSchema>,
    pub table_creation: TableCreationOptions,
    /// Lowest level the host should forward. The sink itself writes every event it is given.
    pub minimum_level: LogLevel,
    pub format_provider: Arc<dyn FormatProvider>,
    pub on_batch_written: Option<BatchWrittenCallback>,
    pub on_batch_failed: Option<BatchFailedCallback>,
}

impl ClickHouseSinkOptions {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// Builds options from a loaded [`SinkConfig`] with the default column set.
    pub fn from_config(config: &SinkConfig) -> SinkResult<Self> {
        config.validate()?;

        let mut builder = SchemaBuilder::new(&config.table.name).with_default_columns();
        if let Some(database) = &config.table.database {
            builder = builder.with_database(database);
        }
        if let Some(comment) = &config.table.comment {
            builder = builder.with_comment(comment);
        }
        if let Some(engine) = &config.table.engine {
            builder = builder.with_custom_engine(engine);
        }

        Ok(Self {
            connection: Some(config.connection.clone()),
            schema: Some(builder.build()?),
            table_creation: config.table_creation.clone(),
            minimum_level: config.minimum_level.parse()?,
            ..Self::default()
        })
    }

    pub fn with_connection(mut self, connection: ClickHouseConnectionConfig) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_table_creation(mut self, table_creation: TableCreationOptions) -> Self {
        self.table_creation = table_creation;
        self
    }

    pub fn with_minimum_level(mut self, minimum_level: LogLevel) -> Self {
        self.minimum_level = minimum_level;
        self
    }

    pub fn with_format_provider(mut self, format_provider: Arc<dyn FormatProvider>) -> Self {
        self.format_provider = format_provider;
        self
    }

    pub fn on_batch_written<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.on_batch_written = Some(Arc::new(callback));
        self
    }

    pub fn on_batch_failed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&SinkError, usize) + Send + Sync + 'static,
    {
        self.on_batch_failed = Some(Arc::new(callback));
        self
    }

    /// Checks that a valid schema is present and that the connection, when set, is valid.
    pub fn validate(&self) -> SinkResult<()> {
        let Some(schema) = &self.schema else {
            bail!(
                ErrorKind::ConfigError,
                "Table schema is required",
                "build one with `SchemaBuilder` and set `ClickHouseSinkOptions::schema`"
            );
        };
        schema.validate()?;

        if let Some(connection) = &self.connection {
            connection.validate()?;
        }

        Ok(())
    }
}

impl Default for ClickHouseSinkOptions {
    fn default() -> Self {
        Self {
            connection: None,
            schema: None,
            table_creation: TableCreationOptions::default(),
            minimum_level: LogLevel::default(),
            format_provider: Arc::new(InvariantFormatProvider),
            on_batch_written: None,
            on_batch_failed: None,
        }
    }
}

impl fmt::Debug for ClickHouseSinkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseSinkOptions")
            .field("connection", &self.connection)
            .field("schema", &self.schema)
            .field("table_creation", &self.table_creation)
            .field("minimum_level", &self.minimum_level)
            .field("format_provider", &self.format_provider)
            .field("on_batch_written", &self.on_batch_written.is_some())
            .field("on_batch_failed", &self.on_batch_failed.is_some())
            .finish()
    }
}
