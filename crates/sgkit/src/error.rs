//! Error types for security group operations.

use thiserror::Error;

/// Errors that can occur while modelling or reconciling security groups.
#[derive(Debug, Error)]
pub enum Error {
    /// A group reference did not match any group on the control-plane
    #[error("unknown security group: {query}")]
    UnknownGroup {
        /// Name or id that was looked up
        query: String,
    },

    /// A port range in configuration could not be parsed
    #[error("invalid port range '{value}': {reason}")]
    InvalidPortRange {
        /// The configured value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// A group that must be created has no VPC configured
    #[error("security group {name} has no vpc configured")]
    MissingVpc {
        /// Group name
        name: String,
    },

    /// A rule without a live handle was asked to revoke itself
    #[error("rule has no live permission to revoke")]
    MissingHandle,

    /// The control-plane rejected a call
    #[error("{code}: {message}")]
    Provider {
        /// Provider error code, e.g. `InvalidPermission.NotFound`
        code: String,
        /// Provider error message
        message: String,
    },

    /// Authentication or CLI failure
    #[error(transparent)]
    Auth(#[from] authkit::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a provider error.
    pub fn provider(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Convert an aws CLI error, surfacing provider codes as [`Error::Provider`].
    pub fn from_cli(err: authkit::Error) -> Self {
        match err {
            authkit::Error::Service { code, message } => Error::Provider { code, message },
            other => Error::Auth(other),
        }
    }

    /// Short class name used in operator output.
    pub fn class(&self) -> &str {
        match self {
            Error::UnknownGroup { .. } => "UnknownGroup",
            Error::InvalidPortRange { .. } => "InvalidPortRange",
            Error::MissingVpc { .. } => "MissingVpc",
            Error::MissingHandle => "MissingHandle",
            Error::Provider { code, .. } => code,
            Error::Auth(e) => e.class(),
            Error::Json(_) => "Json",
            Error::Other(_) => "Error",
        }
    }

    /// Whether the run cannot continue, e.g. a session could not be
    /// renewed because MFA is not configured.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth(e) if e.category().is_fatal())
    }
}

/// Result type for security group operations.
pub type Result<T> = std::result::Result<T, Error>;
