//! Error types and result definitions for load operations.
//!
//! [`WharfError`] carries an [`ErrorKind`] for classification, a static description,
//! optional dynamic detail, an optional source error, and the callsite location at
//! which it was created. Batch runs abort on the first error, so there is no
//! aggregation: one failure is one error.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for load operations using [`WharfError`] as the error type.
pub type WharfResult<T> = Result<T, WharfError>;

/// Main error type for load operations.
#[derive(Debug, Clone)]
pub struct WharfError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Specific categories of errors that can occur during a load run.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No metadata mapping row exists for an entity.
    MappingNotFound,
    /// A staged row's arity disagrees with the mapping's declared columns.
    SchemaMismatch,
    /// The target or source store rejected a statement.
    QueryExecutionFailed,
    /// A database connection could not be established or was lost.
    ConnectionFailed,
    /// A value could not be converted between store and in-memory representations.
    ConversionError,
    /// A schema, table, or column name from metadata is not a valid identifier.
    InvalidIdentifier,
    /// Metadata content is structurally invalid (arity, unknown columns).
    InvalidData,
    /// A source extract could not be decoded or finalized.
    ExtractError,
    /// Configuration is missing or inconsistent.
    ConfigError,
    /// An I/O operation failed.
    IoError,
    /// Uncategorized failure.
    Unknown,
}

impl WharfError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the callsite location at which this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating error to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`WharfError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        WharfError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }
    }
}

impl fmt::Display for WharfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = &self.detail {
            write!(f, "\n  Detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for WharfError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Creates a [`WharfError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for WharfError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> WharfError {
        WharfError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`WharfError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for WharfError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> WharfError {
        WharfError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`WharfError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for WharfError {
    #[track_caller]
    fn from(err: std::io::Error) -> WharfError {
        let detail = err.to_string();
        WharfError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`tokio_postgres::Error`] to [`WharfError`].
///
/// Connection-phase failures map to [`ErrorKind::ConnectionFailed`], everything else
/// to [`ErrorKind::QueryExecutionFailed`].
impl From<tokio_postgres::Error> for WharfError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> WharfError {
        let kind = if err.is_closed() {
            ErrorKind::ConnectionFailed
        } else {
            ErrorKind::QueryExecutionFailed
        };
        let detail = err.to_string();
        WharfError::from_components(
            kind,
            Cow::Borrowed("postgres statement failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`csv::Error`] to [`WharfError`] with [`ErrorKind::ExtractError`].
impl From<csv::Error> for WharfError {
    #[track_caller]
    fn from(err: csv::Error) -> WharfError {
        let detail = err.to_string();
        WharfError::from_components(
            ErrorKind::ExtractError,
            Cow::Borrowed("failed to decode extract file"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`chrono::ParseError`] to [`WharfError`] with [`ErrorKind::ConversionError`].
impl From<calamine::XlsxError> for WharfError {
    #[track_caller]
    fn from(err: calamine::XlsxError) -> WharfError {
        let detail = err.to_string();
        WharfError::from_components(
            ErrorKind::ExtractError,
            Cow::Borrowed("failed to decode workbook"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<chrono::ParseError> for WharfError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> WharfError {
        let detail = err.to_string();
        WharfError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("date parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
