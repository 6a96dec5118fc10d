//! Storage error handling
//!
//! Provides typed errors for store operations with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store file could not be created or opened
    #[error("Failed to open store '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another process held the store lock past the wait bound
    #[error("Timed out after {timeout:?} waiting for the lock on '{path}'")]
    LockTimeout { path: PathBuf, timeout: Duration },

    /// Failed to read the store file
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write the store file
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File is not a store of the expected format
    #[error("Invalid store format in '{path}': {details}")]
    InvalidFormat { path: PathBuf, details: String },

    /// A committed frame failed validation
    #[error("Store '{path}' is corrupted at offset {offset}: {details}")]
    Corrupt {
        path: PathBuf,
        offset: u64,
        details: String,
    },

    /// Keys must be non-empty
    #[error("Key must not be empty")]
    KeyEmpty,

    /// Bucket names must be non-empty
    #[error("Bucket name must not be empty")]
    BucketNameEmpty,

    /// Bucket has not been created
    #[error("Bucket not found: '{name}'")]
    BucketNotFound { name: String },

    /// Write attempted through a read-only handle
    #[error("Store was opened read-only")]
    ReadOnly,

    /// Transaction is no longer active
    #[error("Transaction is closed")]
    TxClosed,

    /// Commit record could not be encoded
    #[error("Failed to encode commit: {0}")]
    Encode(String),
}

impl StoreError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.).
    /// Anything unclassified is reported as a write failure.
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match classify(error, path) {
            Ok(err) => err,
            Err((path, source)) => StoreError::Write { path, source },
        }
    }

    /// Like [`StoreError::from_io`], but unclassified errors become `Open`
    pub fn open_failed(error: io::Error, path: PathBuf) -> Self {
        match classify(error, path) {
            Ok(err) => err,
            Err((path, source)) => StoreError::Open { path, source },
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::DiskFull { .. } => Some("Free up disk space and try again."),
            StoreError::PermissionDenied { .. } => {
                Some("Check file and directory permissions. You may need to run with different permissions or change ownership.")
            }
            StoreError::LockTimeout { .. } => {
                Some("Another dh process is using the store. Wait for it to finish and try again.")
            }
            StoreError::Open { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::Corrupt { .. } => {
                Some("Move the store file aside to start fresh; committed frames before the reported offset are intact.")
            }
            _ => None,
        }
    }
}

fn classify(error: io::Error, path: PathBuf) -> Result<StoreError, (PathBuf, io::Error)> {
    match error.kind() {
        io::ErrorKind::PermissionDenied => Ok(StoreError::PermissionDenied {
            path,
            source: error,
        }),
        // StorageFull is not stable on all toolchains, so also check the message
        _ if is_disk_full_error(&error) => Ok(StoreError::DiskFull {
            path,
            source: error,
        }),
        _ => Err((path, error)),
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StoreError::from_io(io_err, PathBuf::from("/test/dh.db"));

        assert!(matches!(err, StoreError::PermissionDenied { .. }));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_disk_full_detection() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = StoreError::from_io(io_err, PathBuf::from("/full/dh.db"));

        assert!(matches!(err, StoreError::DiskFull { .. }));
    }

    #[test]
    fn test_unclassified_errors() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such directory");
        let err = StoreError::open_failed(io_err, PathBuf::from("/missing/dh.db"));
        assert!(matches!(err, StoreError::Open { .. }));

        let io_err = io::Error::new(io::ErrorKind::Other, "bad descriptor");
        let err = StoreError::from_io(io_err, PathBuf::from("/x/dh.db"));
        assert!(matches!(err, StoreError::Write { .. }));
    }

    #[test]
    fn test_lock_timeout_display() {
        let err = StoreError::LockTimeout {
            path: PathBuf::from("/home/alice/dh.db"),
            timeout: Duration::from_secs(1),
        };

        let msg = err.to_string();
        assert!(msg.contains("Timed out"));
        assert!(msg.contains("/home/alice/dh.db"));
    }
}
