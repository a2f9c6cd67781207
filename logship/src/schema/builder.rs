use crate::bail;
use crate::columns::{ColumnWriter, PropertyWriteMethod};
use crate::error::{ErrorKind, SinkResult};
use crate::schema::{TableEngine, TableSchema};

/// Accumulates columns and table options into a validated [`TableSchema`].
///
/// Columns appear in the table in the order they were added.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    table_name: String,
    database: Option<String>,
    columns: Vec<ColumnWriter>,
    engine: TableEngine,
    comment: Option<String>,
}

impl SchemaBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            database: None,
            columns: Vec::new(),
            engine: TableEngine::Default,
            comment: None,
        }
    }

    /// Timestamp, level, message, message template, exception and properties columns.
    pub fn with_default_columns(self) -> Self {
        self.add_timestamp_column(true)
            .add_level_column(true)
            .add_rendered_message_column()
            .add_message_template_column()
            .add_exception_column()
            .add_properties_column()
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_engine(mut self, engine: TableEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Replaces the default engine with a raw clause, e.g.
    /// `ENGINE = ReplacingMergeTree ORDER BY (timestamp, level) TTL timestamp + INTERVAL 30 DAY`.
    pub fn with_custom_engine(self, clause: impl Into<String>) -> Self {
        self.with_engine(TableEngine::Custom(clause.into()))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn add_timestamp_column(self, use_utc: bool) -> Self {
        self.add_column(ColumnWriter::timestamp(use_utc))
    }

    pub fn add_level_column(self, as_string: bool) -> Self {
        self.add_column(ColumnWriter::level(as_string))
    }

    pub fn add_rendered_message_column(self) -> Self {
        self.add_column(ColumnWriter::rendered_message())
    }

    pub fn add_message_template_column(self) -> Self {
        self.add_column(ColumnWriter::message_template())
    }

    pub fn add_exception_column(self) -> Self {
        self.add_column(ColumnWriter::exception())
    }

    pub fn add_properties_column(self) -> Self {
        self.add_column(ColumnWriter::all_properties_as_json())
    }

    /// Adds a column named after `property_name` holding that property.
    pub fn add_property_column(
        self,
        property_name: impl Into<String>,
        column_type: Option<&str>,
        write_method: PropertyWriteMethod,
    ) -> Self {
        let column = ColumnWriter::single_property(property_name, write_method);
        let column = match column_type {
            Some(column_type) => column.with_type(column_type),
            None => column,
        };
        self.add_column(column)
    }

    pub fn add_log_event_column(self) -> Self {
        self.add_column(ColumnWriter::full_event_as_json())
    }

    pub fn add_column(mut self, column: ColumnWriter) -> Self {
        self.columns.push(column);
        self
    }

    /// Finalizes the schema, failing when no columns were added or validation fails.
    pub fn build(self) -> SinkResult<TableSchema> {
        if self.columns.is_empty() {
            bail!(
                ErrorKind::ValidationError,
                "Table schema must contain at least one column",
                format!("no columns were added for table `{}`", self.table_name)
            );
        }

        let schema = TableSchema {
            database: self.database,
            table_name: self.table_name,
            columns: self.columns,
            engine: self.engine,
            comment: self.comment,
        };
        schema.validate()?;

        Ok(schema)
    }
}
