//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{CourseError, DeckError, LessonError, ProgressError};
use course_core::pagination::{CursorError, PaginationError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Coarse classification callers map onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidCursor,
    NotFound,
    Conflict,
    Internal,
}

/// Errors emitted by the course services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid cursor: {0}")]
    InvalidCursor(CursorError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("traversal check failed: {0}")]
    Traversal(String),
    #[error(transparent)]
    Storage(StorageError),
}

impl ServiceError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidCursor(_) => ErrorKind::InvalidCursor,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Traversal(_) | Self::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Maps a storage miss onto a named `NotFound`, passing other failures through.
pub(crate) fn missing(what: &'static str) -> impl FnOnce(StorageError) -> ServiceError {
    move |e| match e {
        StorageError::NotFound => ServiceError::not_found(what),
        other => ServiceError::from(other),
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::not_found("record"),
            StorageError::Conflict => Self::Conflict("record already exists".into()),
            other => Self::Storage(other),
        }
    }
}

impl From<PaginationError> for ServiceError {
    fn from(e: PaginationError) -> Self {
        match e {
            PaginationError::Cursor(cursor) => Self::InvalidCursor(cursor),
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

impl From<CourseError> for ServiceError {
    fn from(e: CourseError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<LessonError> for ServiceError {
    fn from(e: LessonError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<DeckError> for ServiceError {
    fn from(e: DeckError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<ProgressError> for ServiceError {
    fn from(e: ProgressError) -> Self {
        Self::NotFound(e.to_string())
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Paging(#[from] PaginationError),
}
