//! Column writers: rules extracting one typed value per log event for one table column.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use crate::error::SinkResult;
use crate::event::{
    LogEvent, LogEventPropertyValue, ScalarValue, full_event_to_json, properties_to_json,
    property_value_to_json, render_property_value,
};
use crate::format::FormatProvider;

pub const DEFAULT_TIMESTAMP_COLUMN: &str = "timestamp";
pub const DEFAULT_LEVEL_COLUMN: &str = "level";
pub const DEFAULT_MESSAGE_COLUMN: &str = "message";
pub const DEFAULT_MESSAGE_TEMPLATE_COLUMN: &str = "message_template";
pub const DEFAULT_EXCEPTION_COLUMN: &str = "exception";
pub const DEFAULT_PROPERTIES_COLUMN: &str = "properties";
pub const DEFAULT_LOG_EVENT_COLUMN: &str = "log_event";

/// A single cell of a row headed for ClickHouse.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Lets the server apply the column's declared default.
    Default,
    /// Explicit `NULL`.
    Null,
    Bool(bool),
    UInt8(u8),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    String(String),
    DateTime(DateTime<FixedOffset>),
    Uuid(Uuid),
}

impl ColumnValue {
    pub fn is_default(&self) -> bool {
        matches!(self, ColumnValue::Default)
    }
}

impl From<&ScalarValue> for ColumnValue {
    fn from(scalar: &ScalarValue) -> Self {
        match scalar {
            ScalarValue::Null => ColumnValue::Null,
            ScalarValue::Bool(value) => ColumnValue::Bool(*value),
            ScalarValue::Int(value) => ColumnValue::Int64(*value),
            ScalarValue::UInt(value) => ColumnValue::UInt64(*value),
            ScalarValue::Float(value) => ColumnValue::Float64(*value),
            ScalarValue::String(value) => ColumnValue::String(value.clone()),
            ScalarValue::DateTime(value) => ColumnValue::DateTime(*value),
            ScalarValue::Uuid(value) => ColumnValue::Uuid(*value),
        }
    }
}

/// How a [`ColumnKind::SingleProperty`] column converts the property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyWriteMethod {
    /// Scalars keep their native type. Other values are rendered to a string.
    #[default]
    Raw,
    /// String form using the format provider. Strings are written without quotes.
    ToString,
    /// JSON form. Strings keep their quotes.
    Json,
}

/// Custom extraction logic for columns added through [`crate::schema::SchemaBuilder::add_column`].
///
/// Implemented for every `Fn(&LogEvent, &dyn FormatProvider) -> SinkResult<ColumnValue>`.
pub trait ValueExtractor: Send + Sync {
    fn extract(
        &self,
        event: &LogEvent,
        format_provider: &dyn FormatProvider,
    ) -> SinkResult<ColumnValue>;
}

impl<F> ValueExtractor for F
where
    F: Fn(&LogEvent, &dyn FormatProvider) -> SinkResult<ColumnValue> + Send + Sync,
{
    fn extract(
        &self,
        event: &LogEvent,
        format_provider: &dyn FormatProvider,
    ) -> SinkResult<ColumnValue> {
        self(event, format_provider)
    }
}

/// Extraction rule of a column.
#[derive(Clone)]
pub enum ColumnKind {
    Timestamp {
        use_utc: bool,
    },
    Level {
        as_string: bool,
    },
    RenderedMessage,
    MessageTemplate,
    Exception,
    AllPropertiesAsJson,
    SingleProperty {
        property_name: String,
        write_method: PropertyWriteMethod,
    },
    FullEventAsJson,
    Custom(Arc<dyn ValueExtractor>),
}

impl fmt::Debug for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Timestamp { use_utc } => f
                .debug_struct("Timestamp")
                .field("use_utc", use_utc)
                .finish(),
            ColumnKind::Level { as_string } => f
                .debug_struct("Level")
                .field("as_string", as_string)
                .finish(),
            ColumnKind::RenderedMessage => f.write_str("RenderedMessage"),
            ColumnKind::MessageTemplate => f.write_str("MessageTemplate"),
            ColumnKind::Exception => f.write_str("Exception"),
            ColumnKind::AllPropertiesAsJson => f.write_str("AllPropertiesAsJson"),
            ColumnKind::SingleProperty {
                property_name,
                write_method,
            } => f
                .debug_struct("SingleProperty")
                .field("property_name", property_name)
                .field("write_method", write_method)
                .finish(),
            ColumnKind::FullEventAsJson => f.write_str("FullEventAsJson"),
            ColumnKind::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// One output column: its name, optional ClickHouse type and extraction rule.
///
/// Writers are immutable and shared across batches.
#[derive(Debug, Clone)]
pub struct ColumnWriter {
    name: String,
    column_type: Option<String>,
    kind: ColumnKind,
}

impl ColumnWriter {
    pub fn new(name: impl Into<String>, column_type: Option<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            column_type,
            kind,
        }
    }

    /// `timestamp DateTime64(3)`, converted to UTC unless `use_utc` is false.
    pub fn timestamp(use_utc: bool) -> Self {
        Self::new(
            DEFAULT_TIMESTAMP_COLUMN,
            Some("DateTime64(3)".to_string()),
            ColumnKind::Timestamp { use_utc },
        )
    }

    /// `level LowCardinality(String)`, or `level UInt8` holding the ordinal.
    pub fn level(as_string: bool) -> Self {
        let column_type = if as_string {
            "LowCardinality(String)"
        } else {
            "UInt8"
        };
        Self::new(
            DEFAULT_LEVEL_COLUMN,
            Some(column_type.to_string()),
            ColumnKind::Level { as_string },
        )
    }

    pub fn rendered_message() -> Self {
        Self::new(
            DEFAULT_MESSAGE_COLUMN,
            Some("String".to_string()),
            ColumnKind::RenderedMessage,
        )
    }

    pub fn message_template() -> Self {
        Self::new(
            DEFAULT_MESSAGE_TEMPLATE_COLUMN,
            Some("String".to_string()),
            ColumnKind::MessageTemplate,
        )
    }

    pub fn exception() -> Self {
        Self::new(
            DEFAULT_EXCEPTION_COLUMN,
            Some("Nullable(String)".to_string()),
            ColumnKind::Exception,
        )
    }

    pub fn all_properties_as_json() -> Self {
        Self::new(
            DEFAULT_PROPERTIES_COLUMN,
            Some("JSON".to_string()),
            ColumnKind::AllPropertiesAsJson,
        )
    }

    /// A column holding one named property. The column is named after the property and
    /// has no declared type.
    pub fn single_property(
        property_name: impl Into<String>,
        write_method: PropertyWriteMethod,
    ) -> Self {
        let property_name = property_name.into();
        Self::new(
            property_name.clone(),
            None,
            ColumnKind::SingleProperty {
                property_name,
                write_method,
            },
        )
    }

    pub fn full_event_as_json() -> Self {
        Self::new(
            DEFAULT_LOG_EVENT_COLUMN,
            Some("String".to_string()),
            ColumnKind::FullEventAsJson,
        )
    }

    pub fn custom(
        name: impl Into<String>,
        column_type: Option<String>,
        extractor: impl ValueExtractor + 'static,
    ) -> Self {
        Self::new(name, column_type, ColumnKind::Custom(Arc::new(extractor)))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    pub fn without_type(mut self) -> Self {
        self.column_type = None;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type, or `None` when absent or blank.
    pub fn column_type(&self) -> Option<&str> {
        self.column_type
            .as_deref()
            .filter(|column_type| !column_type.trim().is_empty())
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// Extracts this column's value from `event`.
    ///
    /// Errors are per-column failures; the sink replaces them with [`ColumnValue::Default`].
    pub fn get_value(
        &self,
        event: &LogEvent,
        format_provider: &dyn FormatProvider,
    ) -> SinkResult<ColumnValue> {
        let value = match &self.kind {
            ColumnKind::Timestamp { use_utc: true } => {
                ColumnValue::DateTime(event.timestamp.with_timezone(&Utc).fixed_offset())
            }
            ColumnKind::Timestamp { use_utc: false } => ColumnValue::DateTime(event.timestamp),
            ColumnKind::Level { as_string: true } => {
                ColumnValue::String(event.level.as_str().to_string())
            }
            ColumnKind::Level { as_string: false } => ColumnValue::UInt8(event.level.as_u8()),
            ColumnKind::RenderedMessage => {
                ColumnValue::String(event.render_message(format_provider))
            }
            ColumnKind::MessageTemplate => ColumnValue::String(event.message_template.clone()),
            ColumnKind::Exception => match &event.exception {
                Some(exception) => ColumnValue::String(exception.to_string()),
                None => ColumnValue::Null,
            },
            ColumnKind::AllPropertiesAsJson => {
                ColumnValue::String(serde_json::to_string(&properties_to_json(
                    event.properties(),
                ))?)
            }
            ColumnKind::SingleProperty {
                property_name,
                write_method,
            } => match event.property(property_name) {
                Some(value) => property_value(value, *write_method, format_provider)?,
                None => ColumnValue::Default,
            },
            ColumnKind::FullEventAsJson => {
                ColumnValue::String(serde_json::to_string(&full_event_to_json(event))?)
            }
            ColumnKind::Custom(extractor) => extractor.extract(event, format_provider)?,
        };

        Ok(value)
    }
}

fn property_value(
    value: &LogEventPropertyValue,
    write_method: PropertyWriteMethod,
    format_provider: &dyn FormatProvider,
) -> SinkResult<ColumnValue> {
    let value = match (write_method, value) {
        (PropertyWriteMethod::Raw, LogEventPropertyValue::Scalar(scalar)) => {
            ColumnValue::from(scalar)
        }
        (PropertyWriteMethod::Raw, other) => {
            ColumnValue::String(render_property_value(other, None, format_provider))
        }
        (PropertyWriteMethod::ToString, LogEventPropertyValue::Scalar(ScalarValue::String(s))) => {
            ColumnValue::String(s.clone())
        }
        (PropertyWriteMethod::ToString, other) => {
            ColumnValue::String(render_property_value(other, None, format_provider))
        }
        (PropertyWriteMethod::Json, other) => {
            ColumnValue::String(serde_json::to_string(&property_value_to_json(other))?)
        }
    };

    Ok(value)
}
