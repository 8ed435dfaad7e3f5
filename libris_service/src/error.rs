use std::fmt::{self, Display, Formatter};

use libris_ingest::{IngestError, TransportAbort};
use libris_loader::LoadError;
use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// A point lookup addressed an entity that does not exist.
    #[error("resource `{0}` not found")]
    NotFound(String),

    /// A write referenced a parent entity that does not exist.
    #[error("referenced resource `{0}` not found")]
    ReferenceNotFound(String),

    #[error("`{field}` value `{value}` already exists")]
    DuplicateKey { field: &'static str, value: String },

    #[error("invalid `{field}`: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error(transparent)]
    BatchFetch(#[from] LoadError),

    #[error("transport aborted: {0}")]
    TransportAbort(#[from] TransportAbort),

    #[error("internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub type AppResult<T> = Result<T, AppError>;

/// Protocol-independent classification of an [`AppError`], for gateways that
/// translate errors into their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    ReferenceNotFound,
    DuplicateKey,
    InvalidArgument,
    BatchFetchFailure,
    TransportAbort,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "NOT_FOUND",
            Self::ReferenceNotFound => "REFERENCE_NOT_FOUND",
            Self::DuplicateKey => "DUPLICATE_KEY",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::BatchFetchFailure => "BATCH_FETCH_FAILURE",
            Self::TransportAbort => "TRANSPORT_ABORT",
            Self::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ReferenceNotFound(_) => ErrorKind::ReferenceNotFound,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::BatchFetch(_) => ErrorKind::BatchFetchFailure,
            Self::TransportAbort(_) => ErrorKind::TransportAbort,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

macro_rules! impl_internal_errors {
    ( $( $type:ty ),* $(,)? ) => {
        $(
        impl From<$type> for AppError {
            fn from(err: $type) -> Self {
                AppError::Internal(Box::new(err))
            }
        }
        )*
    };
}
impl_internal_errors!(config::ConfigError, std::io::Error);

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::TransportAbort(abort) => Self::TransportAbort(abort),
            err => Self::Internal(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use libris_ingest::SessionState;

    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            AppError::NotFound("books/1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::from(LoadError::Cancelled).kind(),
            ErrorKind::BatchFetchFailure
        );
        assert_eq!(
            AppError::from(IngestError::TransportAbort(TransportAbort::new("reset"))).kind(),
            ErrorKind::TransportAbort
        );
        assert_eq!(
            AppError::from(IngestError::SessionClosed(SessionState::Closed)).kind(),
            ErrorKind::Internal
        );
        assert_eq!(ErrorKind::DuplicateKey.to_string(), "DUPLICATE_KEY");
    }
}
