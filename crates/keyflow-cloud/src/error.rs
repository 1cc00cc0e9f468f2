//! Provider error types and error classification
//!
//! The classification table maps provider error messages onto the small
//! set of classes the retry executor understands. Providers surface
//! human-readable messages (CLI stderr, API error bodies), so matching is
//! by lowercase substring. This is fragile coupling to the provider's
//! message format; if a provider exposes structured error codes they
//! should be mapped here instead of matched as text.

use thiserror::Error;

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// Classification of a failed provider operation.
///
/// Drives the backoff policy for a single work item and nothing else;
/// one item's class never influences how another item is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider-side rate limit or quota; retry with a longer backoff
    RateLimited,
    /// Transient failure (network, 5xx, flaky CLI); retry with standard backoff
    Transient,
    /// Caller lacks permission; never retried
    PermissionDenied,
    /// Malformed request or identifier; never retried
    InvalidArgument,
    /// Resource already present; never retried, usually treated as success
    AlreadyExists,
    /// Retry attempts exhausted without success
    Exhausted,
}

impl ErrorClass {
    /// Whether further attempts can possibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::RateLimited | ErrorClass::Transient)
    }

    /// Fatal classes terminate an item on the first attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorClass::PermissionDenied | ErrorClass::InvalidArgument | ErrorClass::AlreadyExists
        )
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::RateLimited => write!(f, "rate-limited"),
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::PermissionDenied => write!(f, "permission-denied"),
            ErrorClass::InvalidArgument => write!(f, "invalid-argument"),
            ErrorClass::AlreadyExists => write!(f, "already-exists"),
            ErrorClass::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Pattern table for classifying provider error messages.
///
/// Checked in order; the first matching substring wins. Patterns are
/// matched against the lowercased message.
const CLASSIFICATION_TABLE: &[(&str, ErrorClass)] = &[
    // Quota / rate limiting
    ("quota exceeded", ErrorClass::RateLimited),
    ("quota has been exceeded", ErrorClass::RateLimited),
    ("rate limit", ErrorClass::RateLimited),
    ("resource_exhausted", ErrorClass::RateLimited),
    ("resource exhausted", ErrorClass::RateLimited),
    ("too many requests", ErrorClass::RateLimited),
    ("429", ErrorClass::RateLimited),
    // Permission / auth
    ("permission denied", ErrorClass::PermissionDenied),
    ("permission_denied", ErrorClass::PermissionDenied),
    ("caller does not have permission", ErrorClass::PermissionDenied),
    ("unauthenticated", ErrorClass::PermissionDenied),
    ("credentials were not found", ErrorClass::PermissionDenied),
    ("billing account", ErrorClass::PermissionDenied),
    // Duplicates
    ("already exists", ErrorClass::AlreadyExists),
    ("alreadyexists", ErrorClass::AlreadyExists),
    ("already enabled", ErrorClass::AlreadyExists),
    ("duplicate", ErrorClass::AlreadyExists),
    // Bad input
    ("invalid argument", ErrorClass::InvalidArgument),
    ("invalid_argument", ErrorClass::InvalidArgument),
    ("invalid project id", ErrorClass::InvalidArgument),
    ("malformed", ErrorClass::InvalidArgument),
];

/// Classify a provider error message.
///
/// Anything the table does not recognize is treated as transient, which
/// errs on the side of retrying unknown failures.
pub fn classify(message: &str) -> ErrorClass {
    let lowered = message.to_lowercase();
    for (pattern, class) in CLASSIFICATION_TABLE {
        if lowered.contains(pattern) {
            return *class;
        }
    }
    ErrorClass::Transient
}
