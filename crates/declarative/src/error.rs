//! Error types shared by the engine and every backend.
//!
//! Operational errors (anything a backend primitive returns) are turned into
//! failed outcomes at the resource boundary. Configuration errors are the
//! only ones callers see as `Err`, and they are raised before any backend
//! call is made.

use thiserror::Error;

/// Categories of backend errors for retry logic and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or API failure that may succeed on retry
    Transient,
    /// The addressed object does not exist
    NotFound,
    /// The object exists already or is in use by another object
    Conflict,
    /// Credentials or permissions are insufficient
    Permission,
    /// The control plane binary or daemon is not reachable
    Unavailable,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Transient backend failure",
            Self::NotFound => "Object not found",
            Self::Conflict => "Object conflict",
            Self::Permission => "Permission denied",
            Self::Unavailable => "Backend unavailable",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors produced while building or reconciling resources.
#[derive(Debug, Error)]
pub enum Error {
    /// The declared spec is invalid or incomplete
    #[error("configuration error: {0}")]
    Config(String),

    /// A resource cannot determine its remote identity
    #[error("cannot resolve identity of {resource}: {reason}")]
    IdentityUnresolved {
        /// Display form of the resource (`<kind> <name>`)
        resource: String,
        /// Why the identity could not be resolved
        reason: String,
    },

    /// A backend primitive failed
    #[error("{backend}: {message}")]
    Backend {
        /// Backend name (e.g. "docker", "kubernetes")
        backend: String,
        /// Error category
        category: ErrorCategory,
        /// Detailed message, usually the trimmed stderr of the failed call
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an identity resolution error
    pub fn identity_unresolved(resource: impl ToString, reason: impl Into<String>) -> Self {
        Self::IdentityUnresolved {
            resource: resource.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a backend error
    pub fn backend(
        backend: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            category,
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Backend { category, .. } => *category,
            Self::Io(_) => ErrorCategory::Unavailable,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this is a configuration error (raised before any backend call).
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
