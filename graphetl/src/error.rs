//! Error types and result definitions for graph builds.
//!
//! [`EtlError`] carries a classification ([`ErrorKind`]), a static description, optional dynamic
//! detail, the originating error and the call site that raised it. Errors raised by concurrent
//! workers can be aggregated into a single value.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used throughout the crate.
pub type EtlResult<T> = Result<T, EtlError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
#[derive(Debug, Clone)]
pub struct EtlError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Errors collected from several workers or entity types.
    Many {
        errors: Vec<EtlError>,
        location: &'static Location<'static>,
    },
}

/// Classification of failures, grouped by the stage that raises them.
///
/// The kind decides how far a failure propagates: see [`ErrorKind::scope`].
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash, serde::Serialize)]
#[non_exhaustive]
pub enum ErrorKind {
    // Schema & Mapping Errors
    SchemaConflict,
    UnknownType,

    // Source Errors
    SourceUnavailable,
    UnsupportedSourceKind,
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceStreamFailed,

    // Data & Transformation Errors
    RowCoercionFailed,
    ConversionError,

    // Destination Errors
    TableCreationFailed,
    DestinationWriteFailed,
    DestinationConnectionFailed,
    DestinationClosed,

    // Configuration Errors
    ConfigError,
    ValidationError,

    // Workflow Errors
    UnsupportedOperation,
    BuildCanceled,
    EntityAborted,
    IngestionWorkerPanic,
    InvalidState,

    // IO & Serialization Errors
    IoError,
    SerializationError,

    Unknown,
}

/// How far a failure of a given [`ErrorKind`] propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Aborts the whole build.
    Build,
    /// Aborts one entity type, others continue.
    Entity,
    /// Stops or skips one source of an entity type.
    Source,
    /// Discards one row, the stream continues.
    Row,
}

impl ErrorKind {
    /// Returns the propagation scope of this kind.
    pub fn scope(&self) -> ErrorScope {
        match self {
            ErrorKind::SchemaConflict
            | ErrorKind::ConfigError
            | ErrorKind::ValidationError
            | ErrorKind::DestinationConnectionFailed
            | ErrorKind::BuildCanceled
            | ErrorKind::InvalidState
            | ErrorKind::IoError
            | ErrorKind::SerializationError
            | ErrorKind::Unknown => ErrorScope::Build,
            ErrorKind::TableCreationFailed
            | ErrorKind::DestinationWriteFailed
            | ErrorKind::DestinationClosed
            | ErrorKind::UnsupportedOperation => ErrorScope::Entity,
            ErrorKind::UnknownType
            | ErrorKind::SourceUnavailable
            | ErrorKind::UnsupportedSourceKind
            | ErrorKind::SourceConnectionFailed
            | ErrorKind::SourceQueryFailed
            | ErrorKind::SourceStreamFailed
            | ErrorKind::EntityAborted
            | ErrorKind::IngestionWorkerPanic => ErrorScope::Source,
            ErrorKind::RowCoercionFailed | ErrorKind::ConversionError => ErrorScope::Row,
        }
    }
}

impl EtlError {
    /// Returns the kind of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every kind contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description, or the first one of an aggregate.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("multiple errors"),
        }
    }

    /// Returns the dynamic detail, or the first available one of an aggregate.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, or this error alone.
    pub fn errors(&self) -> Vec<&EtlError> {
        match self.repr {
            ErrorRepr::Single(_) => vec![self],
            ErrorRepr::Many { ref errors, .. } => errors.iter().collect(),
        }
    }

    /// Returns the captured backtrace of a single error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the call site that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the originating error. Has no effect on aggregates.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// A compact one-line rendering without location or backtrace, used in reports.
    pub fn summary(&self) -> String {
        match &self.repr {
            ErrorRepr::Single(payload) => match payload.detail.as_deref() {
                Some(detail) => format!("{}: {}", payload.description, detail),
                None => payload.description.to_string(),
            },
            ErrorRepr::Many { errors, .. } => errors
                .iter()
                .map(|err| err.summary())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        EtlError {
            repr: ErrorRepr::Single(ErrorPayload {
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

impl PartialEq for EtlError {
    fn eq(&self, other: &EtlError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail:")?;
                    for line in detail.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for EtlError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for EtlError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for EtlError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned unwrapped.
impl<E> From<Vec<E>> for EtlError
where
    E: Into<EtlError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> EtlError {
        let location = Location::caller();

        let mut errors: Vec<EtlError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        EtlError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for EtlError {
    #[track_caller]
    fn from(err: std::io::Error) -> EtlError {
        let detail = err.to_string();
        EtlError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for EtlError {
    #[track_caller]
    fn from(err: serde_json::Error) -> EtlError {
        let detail = err.to_string();
        EtlError::from_components(
            ErrorKind::SerializationError,
            Cow::Borrowed("JSON serialization failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Maps sqlx failures onto source kinds: connection-level failures make a source unavailable.
impl From<sqlx::Error> for EtlError {
    #[track_caller]
    fn from(err: sqlx::Error) -> EtlError {
        let (kind, description) = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => {
                (ErrorKind::SourceConnectionFailed, "Source connection failed")
            }
            sqlx::Error::Database(_) => (ErrorKind::SourceQueryFailed, "Source query failed"),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                (ErrorKind::ConversionError, "Source value could not be decoded")
            }
            _ => (ErrorKind::SourceQueryFailed, "Source operation failed"),
        };

        let detail = err.to_string();
        EtlError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<duckdb::Error> for EtlError {
    #[track_caller]
    fn from(err: duckdb::Error) -> EtlError {
        let detail = err.to_string();
        EtlError::from_components(
            ErrorKind::DestinationWriteFailed,
            Cow::Borrowed("DuckDB operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<graphetl_config::shared::ValidationErrors> for EtlError {
    #[track_caller]
    fn from(err: graphetl_config::shared::ValidationErrors) -> EtlError {
        let detail = err.to_string();
        EtlError::from_components(
            ErrorKind::ValidationError,
            Cow::Borrowed("Configuration is invalid"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<graphetl_mysql::option_file::OptionFileError> for EtlError {
    #[track_caller]
    fn from(err: graphetl_mysql::option_file::OptionFileError) -> EtlError {
        let detail = err.to_string();
        EtlError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("MySQL option file could not be used"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, etl_error};

    fn fails() -> EtlResult<()> {
        bail!(
            ErrorKind::SourceUnavailable,
            "Source table is missing",
            "table `people`"
        );
    }

    #[test]
    fn test_single_error_accessors() {
        let err = fails().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert_eq!(err.detail(), Some("table `people`"));
        assert_eq!(err.summary(), "Source table is missing: table `people`");
        assert!(err.to_string().starts_with("[SourceUnavailable] Source table is missing @"));
    }

    #[test]
    fn test_aggregation_flattens_single_error() {
        let single: EtlError = vec![etl_error!(ErrorKind::Unknown, "one")].into();
        assert_eq!(single.kinds(), vec![ErrorKind::Unknown]);
        assert_eq!(single.errors().len(), 1);

        let many: EtlError = vec![
            etl_error!(ErrorKind::SchemaConflict, "first"),
            etl_error!(ErrorKind::TableCreationFailed, "second"),
        ]
        .into();
        assert_eq!(many.kind(), ErrorKind::SchemaConflict);
        assert_eq!(
            many.kinds(),
            vec![ErrorKind::SchemaConflict, ErrorKind::TableCreationFailed]
        );
        assert!(many.to_string().contains("2 errors aggregated"));
    }

    #[test]
    fn test_scopes() {
        assert_eq!(ErrorKind::SchemaConflict.scope(), ErrorScope::Build);
        assert_eq!(ErrorKind::DestinationWriteFailed.scope(), ErrorScope::Entity);
        assert_eq!(ErrorKind::SourceStreamFailed.scope(), ErrorScope::Source);
        assert_eq!(ErrorKind::RowCoercionFailed.scope(), ErrorScope::Row);
    }
}
