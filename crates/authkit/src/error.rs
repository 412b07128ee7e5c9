//! Error types for authentication and AWS CLI operations.
//!
//! Errors are categorized so callers can tell a hard setup stop (MFA not
//! configured, CLI missing) from a provider rejection that only affects
//! the single call that produced it.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Categories of authentication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Setup problem that must stop the run before any mutation
    Setup,
    /// The provider rejected a call (bad request, permission, conflict)
    Service,
    /// Could not reach the provider
    Network,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this category should abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Setup)
    }
}

/// Errors that can occur while authenticating or calling the AWS CLI.
#[derive(Debug, Error)]
pub enum Error {
    /// The identity has no MFA device registered, but MFA is required
    #[error("MFA is not configured on your account! (Profile: {profile}, Account: {account})")]
    MfaNotConfigured {
        /// Profile the session was requested for
        profile: String,
        /// Account alias, or "no alias"
        account: String,
    },

    /// The token source produced a malformed token and cannot be asked again
    #[error("invalid MFA token: expected exactly 6 digits")]
    InvalidToken,

    /// The `aws` executable could not be located
    #[error("aws CLI not found in PATH. Install it from https://aws.amazon.com/cli/")]
    CliNotFound,

    /// The provider answered with an error code
    #[error("{code}: {message}")]
    Service {
        /// Provider error code, e.g. `InvalidPermission.Duplicate`
        code: String,
        /// Provider error message
        message: String,
    },

    /// A CLI invocation failed without a recognizable provider error
    #[error("command failed: {message}")]
    CommandFailed {
        /// What was being run
        message: String,
        /// Standard error of the failed command
        stderr: String,
    },

    /// Reading the MFA token failed
    #[error("token prompt failed: {0}")]
    Prompt(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

static SERVICE_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"An error occurred \(([^)]+)\)[^:]*:\s*(.*)").expect("valid service error regex")
});

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MfaNotConfigured { .. }
            | Error::InvalidToken
            | Error::CliNotFound
            | Error::Prompt(_) => ErrorCategory::Setup,
            Error::Service { .. } => ErrorCategory::Service,
            Error::CommandFailed { stderr, .. } if is_network_failure(stderr) => {
                ErrorCategory::Network
            }
            _ => ErrorCategory::Other,
        }
    }

    /// Short class name used in operator output.
    ///
    /// Provider errors report their own code; everything else reports
    /// the variant name.
    pub fn class(&self) -> &str {
        match self {
            Error::MfaNotConfigured { .. } => "MfaNotConfigured",
            Error::InvalidToken => "InvalidToken",
            Error::CliNotFound => "CliNotFound",
            Error::Service { code, .. } => code,
            Error::CommandFailed { .. } => "CommandFailed",
            Error::Prompt(_) => "Prompt",
            Error::Json(_) => "Json",
        }
    }

    /// Create an error from aws CLI stderr.
    ///
    /// Recognizes `An error occurred (Code) when calling the Op operation: message`.
    pub fn from_cli_output(stderr: &str, operation: &str) -> Self {
        if let Some(caps) = SERVICE_ERROR.captures(stderr) {
            return Error::Service {
                code: caps[1].to_string(),
                message: caps[2].trim().to_string(),
            };
        }

        Error::CommandFailed {
            message: format!("aws {operation}"),
            stderr: stderr.trim().to_string(),
        }
    }
}

fn is_network_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("could not connect")
        || lower.contains("connect timeout")
        || lower.contains("read timeout")
        || lower.contains("name resolution")
}

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cli_output_service_error() {
        let err = Error::from_cli_output(
            "\nAn error occurred (InvalidPermission.Duplicate) when calling the \
             AuthorizeSecurityGroupIngress operation: the specified rule already exists\n",
            "ec2 authorize-security-group-ingress",
        );
        assert_eq!(err.class(), "InvalidPermission.Duplicate");
        assert_eq!(err.category(), ErrorCategory::Service);
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_from_cli_output_network() {
        let err = Error::from_cli_output(
            "Could not connect to the endpoint URL: \"https://ec2.us-east-1.amazonaws.com/\"",
            "ec2 describe-security-groups",
        );
        assert_eq!(err.class(), "CommandFailed");
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_mfa_not_configured_is_fatal() {
        let err = Error::MfaNotConfigured {
            profile: "default".to_string(),
            account: "no alias".to_string(),
        };
        assert!(err.category().is_fatal());
        assert!(err.to_string().contains("Profile: default"));
    }

    #[test]
    fn test_failed_prompt_is_fatal() {
        assert!(Error::Prompt("no MFA token source available".to_string()).category().is_fatal());
        let service = Error::Service {
            code: "AccessDenied".to_string(),
            message: "denied".to_string(),
        };
        assert!(!service.category().is_fatal());
    }
}
