//! Structured log events as handed to the sink by the host logger.

mod json;
mod render;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::format::FormatProvider;

pub use json::{full_event_to_json, properties_to_json, property_value_to_json};
pub use render::{render_message_template, render_property_value};

/// Severity of a log event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum LogLevel {
    #[default]
    Verbose = 0,
    Debug = 1,
    Information = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Verbose,
        LogLevel::Debug,
        LogLevel::Information,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Verbose => "Verbose",
            LogLevel::Debug => "Debug",
            LogLevel::Information => "Information",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Fatal => "Fatal",
        }
    }

    /// Ordinal written to `UInt8` level columns.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = SinkError;

    /// Parses a level name case-insensitively. The short forms `info` and `warn` are accepted.
    fn from_str(s: &str) -> SinkResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verbose" | "trace" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            "information" | "info" => Ok(LogLevel::Information),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            _ => bail!(
                ErrorKind::ConfigError,
                "Unknown log level",
                format!("`{s}` is not one of verbose, debug, information, warning, error, fatal")
            ),
        }
    }
}

/// A single primitive property value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    DateTime(DateTime<FixedOffset>),
    Uuid(Uuid),
}

macro_rules! impl_scalar_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for ScalarValue {
                fn from($v: $ty) -> Self {
                    $body
                }
            }

            impl From<$ty> for LogEventPropertyValue {
                fn from(value: $ty) -> Self {
                    LogEventPropertyValue::Scalar(ScalarValue::from(value))
                }
            }
        )*
    };
}

impl_scalar_from! {
    bool => |v| ScalarValue::Bool(v),
    i32 => |v| ScalarValue::Int(i64::from(v)),
    i64 => |v| ScalarValue::Int(v),
    u32 => |v| ScalarValue::UInt(u64::from(v)),
    u64 => |v| ScalarValue::UInt(v),
    f64 => |v| ScalarValue::Float(v),
    &str => |v| ScalarValue::String(v.to_string()),
    String => |v| ScalarValue::String(v),
    DateTime<FixedOffset> => |v| ScalarValue::DateTime(v),
    DateTime<Utc> => |v| ScalarValue::DateTime(v.fixed_offset()),
    Uuid => |v| ScalarValue::Uuid(v),
}

/// A property value attached to a [`LogEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum LogEventPropertyValue {
    Scalar(ScalarValue),
    Sequence(Vec<LogEventPropertyValue>),
    /// A destructured object. `type_tag` carries the source type name, if known.
    Structure {
        type_tag: Option<String>,
        properties: Vec<(String, LogEventPropertyValue)>,
    },
    Dictionary(Vec<(ScalarValue, LogEventPropertyValue)>),
}

impl LogEventPropertyValue {
    pub fn null() -> Self {
        LogEventPropertyValue::Scalar(ScalarValue::Null)
    }
}

impl From<ScalarValue> for LogEventPropertyValue {
    fn from(value: ScalarValue) -> Self {
        LogEventPropertyValue::Scalar(value)
    }
}

impl<T> From<Option<T>> for LogEventPropertyValue
where
    T: Into<LogEventPropertyValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or_else(LogEventPropertyValue::null, Into::into)
    }
}

impl<T> From<Vec<T>> for LogEventPropertyValue
where
    T: Into<LogEventPropertyValue>,
{
    fn from(values: Vec<T>) -> Self {
        LogEventPropertyValue::Sequence(values.into_iter().map(Into::into).collect())
    }
}

/// Exception information carried by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogException {
    pub type_name: String,
    pub message: String,
    pub stack_trace: Option<String>,
    pub inner: Option<Box<LogException>>,
}

impl LogException {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
            inner: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn with_inner(mut self, inner: LogException) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }
}

/// Writes `Type: message`, then each inner exception after ` ---> `, then the stack traces
/// innermost first.
impl fmt::Display for LogException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)?;

        if let Some(inner) = &self.inner {
            write!(f, " ---> {inner}")?;
            write!(f, "\n   --- End of inner exception stack trace ---")?;
        }

        if let Some(stack_trace) = self.stack_trace.as_deref().filter(|s| !s.is_empty()) {
            write!(f, "\n{stack_trace}")?;
        }

        Ok(())
    }
}

/// A structured log event.
///
/// Properties keep their insertion order. Adding a property under an existing name
/// replaces the value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub level: LogLevel,
    pub message_template: String,
    pub exception: Option<LogException>,
    properties: Vec<(String, LogEventPropertyValue)>,
}

impl LogEvent {
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        level: LogLevel,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            message_template: message_template.into(),
            exception: None,
            properties: Vec::new(),
        }
    }

    /// Creates an event stamped with the current UTC time.
    pub fn now(level: LogLevel, message_template: impl Into<String>) -> Self {
        Self::new(Utc::now().fixed_offset(), level, message_template)
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<LogEventPropertyValue>,
    ) -> Self {
        self.add_or_update_property(name, value);
        self
    }

    pub fn with_exception(mut self, exception: LogException) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn add_or_update_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<LogEventPropertyValue>,
    ) {
        let name = name.into();
        let value = value.into();

        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.properties.push((name, value)),
        }
    }

    /// Adds the property only when no property with that name exists yet.
    pub fn add_property_if_absent(
        &mut self,
        name: impl Into<String>,
        value: impl Into<LogEventPropertyValue>,
    ) {
        let name = name.into();
        if self.property(&name).is_none() {
            self.properties.push((name, value.into()));
        }
    }

    pub fn remove_property(&mut self, name: &str) -> Option<LogEventPropertyValue> {
        let index = self.properties.iter().position(|(n, _)| n == name)?;
        Some(self.properties.remove(index).1)
    }

    pub fn property(&self, name: &str) -> Option<&LogEventPropertyValue> {
        self.properties
            .iter()
            .find_map(|(n, value)| (n == name).then_some(value))
    }

    pub fn properties(&self) -> &[(String, LogEventPropertyValue)] {
        &self.properties
    }

    pub fn render_message(&self, format_provider: &dyn FormatProvider) -> String {
        render_message_template(&self.message_template, &self.properties, format_provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_and_ordinals() {
        let names: Vec<_> = LogLevel::ALL.iter().map(LogLevel::as_str).collect();
        assert_eq!(
            names,
            ["Verbose", "Debug", "Information", "Warning", "Error", "Fatal"]
        );
        assert_eq!(LogLevel::Verbose.as_u8(), 0);
        assert_eq!(LogLevel::Fatal.as_u8(), 5);
        assert!(LogLevel::Warning > LogLevel::Information);
    }

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Information);
        assert_eq!(
            "loud".parse::<LogLevel>().unwrap_err().kind(),
            ErrorKind::ConfigError
        );
    }

    #[test]
    fn property_replacement_keeps_position() {
        let mut event = LogEvent::now(LogLevel::Information, "test")
            .with_property("A", 1)
            .with_property("B", "x");

        event.add_or_update_property("A", 2);
        event.add_property_if_absent("B", "ignored");

        let names: Vec<_> = event.properties().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(event.property("A"), Some(&LogEventPropertyValue::from(2)));
        assert_eq!(event.property("B"), Some(&LogEventPropertyValue::from("x")));
    }

    #[test]
    fn remove_property_returns_value() {
        let mut event = LogEvent::now(LogLevel::Debug, "test").with_property("Id", 7u64);

        assert_eq!(
            event.remove_property("Id"),
            Some(LogEventPropertyValue::Scalar(ScalarValue::UInt(7)))
        );
        assert!(event.property("Id").is_none());
    }

    #[test]
    fn exception_display_includes_inner_chain_and_stack() {
        let exception = LogException::new("System.InvalidOperationException", "outer failed")
            .with_stack_trace("   at Worker.Run()")
            .with_inner(LogException::new("System.IO.IOException", "disk full"));

        assert_eq!(
            exception.to_string(),
            "System.InvalidOperationException: outer failed ---> System.IO.IOException: disk full\n   --- End of inner exception stack trace ---\n   at Worker.Run()"
        );
    }
}
