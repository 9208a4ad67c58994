//! Error types and Result alias.
//!
//! Mirrors the error kinds enumerated in the design: storage inconsistency
//! and format mismatch are fatal at open, rule installation and I/O errors
//! are surfaced to the caller, and traversal errors indicate an internal
//! logic bug (following a zero block pointer as if it were valid).

use std::fmt;

/// The kind of failure that produced an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Exactly one of the two store files exists, or a file's size is not
    /// a multiple of its block size.
    StorageInconsistent,
    /// A store's format-version byte does not match what this crate writes.
    FormatMismatch,
    /// A creation-rule install/remove request could not be satisfied.
    RuleInstallation,
    /// A zero block pointer was followed as if it were a valid block.
    Traversal,
    /// Underlying I/O failure.
    Io,
    /// A block was written with the wrong number of bytes for the store.
    BlockSizeMismatch,
    /// The requested block index does not exist in the store.
    NoSuchBlock,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::StorageInconsistent => "storage inconsistent",
            ErrorCode::FormatMismatch => "format mismatch",
            ErrorCode::RuleInstallation => "rule installation error",
            ErrorCode::Traversal => "traversal error",
            ErrorCode::Io => "I/O error",
            ErrorCode::BlockSizeMismatch => "block size mismatch",
            ErrorCode::NoSuchBlock => "no such block",
        }
    }
}

/// Crate-wide error type: a code plus an optional human-readable detail.
#[derive(Debug)]
pub struct Error {
    code: ErrorCode,
    detail: Option<String>,
    source: Option<std::io::Error>,
}

impl Error {
    pub fn new(code: ErrorCode) -> Self {
        Error {
            code,
            detail: None,
            source: None,
        }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Error {
            code,
            detail: Some(detail.into()),
            source: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.code.as_str(), detail),
            None => write!(f, "{}", self.code.as_str()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            code: ErrorCode::Io,
            detail: None,
            source: Some(err),
        }
    }
}

/// This call follows a zero block pointer as if it were valid, an internal
/// logic bug, not a recoverable I/O or data condition. Debug builds trap
/// eagerly; release builds still surface a proper [`Error`] to the caller.
pub(crate) fn traversal_bug(where_: &'static str) -> Error {
    debug_assert!(false, "followed a null block pointer in {where_}");
    Error::with_detail(ErrorCode::Traversal, where_)
}

pub type Result<T> = std::result::Result<T, Error>;
