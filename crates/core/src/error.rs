use crate::{cursor::CursorError, store::StoreError, version::VersionError};

/// Broad class of a [`RelayError`], used by the transport to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input is structurally invalid.
    Validation,
    /// Cursor could not be decoded. A specialization of `Validation`.
    Format,
    /// The store reported that the key never existed.
    NotFound,
    /// The store is unreachable or failed.
    Storage,
    /// The store handed back a version that cannot be a cursor.
    Encoding,
}

/// Errors returned by [`crate::Relay`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Namespace and key are required")]
    MissingIdentifier,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Value must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),

    #[error("Failed to encode version: {0}")]
    Encoding(VersionError),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::MissingIdentifier
            | RelayError::InvalidJson(_)
            | RelayError::NotAnObject(_) => ErrorKind::Validation,
            RelayError::InvalidCursor(_) => ErrorKind::Format,
            RelayError::NotFound(_) => ErrorKind::NotFound,
            RelayError::Storage(_) => ErrorKind::Storage,
            RelayError::Encoding(_) => ErrorKind::Encoding,
        }
    }

    /// Whether the caller has to change the request before trying again.
    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::Format)
    }

    /// Whether the same request may succeed if simply retried.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}

impl From<StoreError> for RelayError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(key) => RelayError::NotFound(key),
            StoreError::InvalidVersion(e) => RelayError::Encoding(e),
            other => RelayError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        RelayError::InvalidJson(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_their_kind() {
        let not_found: RelayError = StoreError::NotFound("k".into()).into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let bad_version: RelayError = StoreError::InvalidVersion(VersionError::InvalidLength(8)).into();
        assert_eq!(bad_version.kind(), ErrorKind::Encoding);

        let unavailable: RelayError = StoreError::Unavailable("down".into()).into();
        assert_eq!(unavailable.kind(), ErrorKind::Storage);
        assert!(unavailable.is_retryable());
        assert!(!unavailable.is_validation());
    }

    #[test]
    fn test_cursor_errors_are_validation() {
        let error: RelayError = CursorError::InvalidLength(3).into();
        assert_eq!(error.kind(), ErrorKind::Format);
        assert!(error.is_validation());
        assert!(!error.is_retryable());
    }
}
