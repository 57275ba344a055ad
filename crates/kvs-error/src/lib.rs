use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for the KVS conformance harness.
///
/// Covers three layers with one enum: payload/parameter decoding, the
/// external engine behind the boundary client, and scenario dispatch.
/// Every variant maps to exactly one [`ErrorKind`], whose name is what the
/// trace records render (`Err(FileNotFound)`, `Err(InvalidSnapshotId)`, ...).
#[derive(Error, Debug)]
pub enum KvsError {
    // === Input Errors ===
    /// Payload is not valid JSON (or not the expected JSON shape at all).
    #[error("malformed JSON payload: {detail}")]
    Parse { detail: String },

    /// A configuration field is missing, of the wrong type, or out of range.
    #[error("invalid parameter '{field}': {detail}")]
    Param { field: String, detail: String },

    // === Validation Errors ===
    /// Key violates the charset/length rule.
    #[error("key rejected: '{key}'")]
    KeyRejected { key: String },

    /// Value violates the size or type rule.
    #[error("value rejected for key '{key}': {reason}")]
    ValueRejected { key: String, reason: String },

    // === Engine Errors ===
    /// Key has neither an explicit value nor a default.
    #[error("key not found: '{key}'")]
    KeyNotFound { key: String },

    /// Generic engine failure (open, flush, rotation, ...).
    #[error("KVS operation failed: {detail}")]
    KvsOperation { detail: String },

    /// Snapshot id is 0 or beyond the current snapshot count.
    #[error("invalid snapshot id: {id}")]
    InvalidSnapshotId { id: usize },

    /// No backing artifact exists for the requested snapshot.
    #[error("file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Engine error with no dedicated kind.
    #[error("unmapped engine error: {0}")]
    Unmapped(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Dispatch Errors ===
    /// A path segment matched nothing in the scenario tree.
    #[error("scenario path not found: '{path}'")]
    PathNotFound { path: String },

    /// The path names a group; only leaf scenarios can run.
    #[error("path names a group, not a scenario: '{path}'")]
    AmbiguousTarget { path: String },

    /// Two siblings share a name while the tree is being built.
    #[error("duplicate name '{name}' under '{parent}'")]
    DuplicateName { parent: String, name: String },

    // === Oracle Errors ===
    /// Observed engine behavior disagrees with the expected-behavior model.
    #[error("{check}: expected {expected}, observed {observed}")]
    OracleMismatch {
        check: String,
        expected: String,
        observed: String,
    },
}

/// Coarse error classification.
///
/// `Display` yields the bare kind name; this is the exact text that appears
/// inside `Err(..)` in trace records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    ParamError,
    KeyRejected,
    ValueRejected,
    KeyNotFound,
    KvsOperationError,
    InvalidSnapshotId,
    FileNotFound,
    UnmappedError,
    IoError,
    PathNotFound,
    AmbiguousTarget,
    DuplicateName,
    OracleMismatch,
}

impl ErrorKind {
    /// Name used in trace records and on stderr.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ParseError => "ParseError",
            Self::ParamError => "ParamError",
            Self::KeyRejected => "KeyRejected",
            Self::ValueRejected => "ValueRejected",
            Self::KeyNotFound => "KeyNotFound",
            Self::KvsOperationError => "KvsOperationError",
            Self::InvalidSnapshotId => "InvalidSnapshotId",
            Self::FileNotFound => "FileNotFound",
            Self::UnmappedError => "UnmappedError",
            Self::IoError => "IoError",
            Self::PathNotFound => "PathNotFound",
            Self::AmbiguousTarget => "AmbiguousTarget",
            Self::DuplicateName => "DuplicateName",
            Self::OracleMismatch => "OracleMismatch",
        }
    }

    /// Whether this kind originates behind the KVS boundary.
    #[must_use]
    pub const fn is_engine_kind(self) -> bool {
        matches!(
            self,
            Self::KeyRejected
                | Self::ValueRejected
                | Self::KeyNotFound
                | Self::KvsOperationError
                | Self::InvalidSnapshotId
                | Self::FileNotFound
                | Self::UnmappedError
                | Self::IoError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl KvsError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::ParseError,
            Self::Param { .. } => ErrorKind::ParamError,
            Self::KeyRejected { .. } => ErrorKind::KeyRejected,
            Self::ValueRejected { .. } => ErrorKind::ValueRejected,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::KvsOperation { .. } => ErrorKind::KvsOperationError,
            Self::InvalidSnapshotId { .. } => ErrorKind::InvalidSnapshotId,
            Self::FileNotFound { .. } => ErrorKind::FileNotFound,
            Self::Unmapped(_) => ErrorKind::UnmappedError,
            Self::Io(_) => ErrorKind::IoError,
            Self::PathNotFound { .. } => ErrorKind::PathNotFound,
            Self::AmbiguousTarget { .. } => ErrorKind::AmbiguousTarget,
            Self::DuplicateName { .. } => ErrorKind::DuplicateName,
            Self::OracleMismatch { .. } => ErrorKind::OracleMismatch,
        }
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Parse { .. } => Some("Pass the payload as a single JSON object argument"),
            Self::Param { .. } => Some("Check the fields inside \"kvs_parameters\""),
            Self::PathNotFound { .. } => Some("Run with --list to see every scenario path"),
            Self::AmbiguousTarget { .. } => Some("Append a scenario name to the group path"),
            Self::KvsOperation { .. } => Some("Check that the storage directory exists"),
            _ => None,
        }
    }

    /// Process exit code for this error (for CLI use).
    ///
    /// Every uncaught error exits with 1; the kind is reported on stderr.
    pub const fn exit_code(&self) -> i32 {
        1
    }

    /// Create a parse error.
    pub fn parse(detail: impl fmt::Display) -> Self {
        Self::Parse {
            detail: detail.to_string(),
        }
    }

    /// Create a parameter error for `field`.
    pub fn param(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Param {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Create a generic engine error.
    pub fn operation(detail: impl Into<String>) -> Self {
        Self::KvsOperation {
            detail: detail.into(),
        }
    }

    /// Create an oracle mismatch.
    pub fn mismatch(
        check: impl Into<String>,
        expected: impl fmt::Debug,
        observed: impl fmt::Debug,
    ) -> Self {
        Self::OracleMismatch {
            check: check.into(),
            expected: format!("{expected:?}"),
            observed: format!("{observed:?}"),
        }
    }
}

/// Result type alias using `KvsError`.
pub type Result<T> = std::result::Result<T, KvsError>;
