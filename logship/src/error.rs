//! Error types and result definitions for sink operations.
//!
//! [`SinkError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, an optional source error and the callsite where it was raised.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used throughout the sink.
pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for sink operations.
///
/// Cloning is cheap: the source and backtrace are shared.
#[derive(Debug, Clone)]
pub struct SinkError {
    payload: Box<ErrorPayload>,
}

/// Categories of errors raised by the sink.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    ConfigError,
    ValidationError,

    // Destination Errors
    DestinationConnectionFailed,
    DestinationQueryFailed,
    DestinationIoError,
    DestinationTableMissing,
    DestinationError,

    // Schema & SQL Errors
    SqlGenerationError,
    UnsupportedValueInDestination,

    // Data & Transformation Errors
    ConversionError,
    InvalidData,
    SerializationError,
    IoError,

    // State & Lifecycle Errors
    InvalidState,
    OperationCanceled,

    Unknown,
}

impl SinkError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the callsite where this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SinkError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for SinkError {
    fn eq(&self, other: &SinkError) -> bool {
        self.payload.kind == other.payload.kind
            && self.payload.description == other.payload.description
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = &self.payload;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            payload.kind,
            payload.description,
            payload.location.file(),
            payload.location.line(),
            payload.location.column()
        )?;

        if let Some(detail) = payload.detail.as_deref() {
            if detail.trim().is_empty() {
                write!(f, "\n  Detail: <empty>")?;
            } else {
                write!(f, "\n  Detail:")?;
                for line in detail.lines() {
                    write!(f, "\n    {line}")?;
                }
            }
        }

        let rendered_backtrace = payload.backtrace.to_string();
        if !rendered_backtrace.trim().is_empty() {
            write!(f, "\n  Backtrace:")?;
            for line in rendered_backtrace.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for SinkError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for SinkError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SinkError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for SinkError {
    #[track_caller]
    fn from(err: std::io::Error) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for SinkError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::SerializationError,
            Cow::Borrowed("JSON serialization failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Maps ClickHouse client errors onto destination error kinds.
impl From<clickhouse::error::Error> for SinkError {
    #[track_caller]
    fn from(err: clickhouse::error::Error) -> SinkError {
        let (kind, description) = match &err {
            clickhouse::error::Error::Network(_) => (
                ErrorKind::DestinationConnectionFailed,
                "ClickHouse network request failed",
            ),
            clickhouse::error::Error::BadResponse(_) => (
                ErrorKind::DestinationQueryFailed,
                "ClickHouse rejected the request",
            ),
            clickhouse::error::Error::TimedOut => {
                (ErrorKind::DestinationIoError, "ClickHouse request timed out")
            }
            _ => (ErrorKind::DestinationError, "ClickHouse client error"),
        };

        let detail = err.to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<logship_config::shared::ValidationError> for SinkError {
    #[track_caller]
    fn from(err: logship_config::shared::ValidationError) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid sink configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
