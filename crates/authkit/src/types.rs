//! Core types for clients, credentials and sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;

/// Region used when neither the settings nor the caller name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Session duration requested from STS when not configured, in seconds.
pub const DEFAULT_SESSION_DURATION: u32 = 900;

/// AWS services the broker can build clients for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Security groups and their permissions
    Ec2,
    /// Users, MFA devices, account aliases
    Iam,
    /// Session tokens
    Sts,
}

impl Service {
    /// Name of the service as the aws CLI spells it.
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Ec2 => "ec2",
            Self::Iam => "iam",
            Self::Sts => "sts",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

/// Per-call client options. Two option sets that are equal by value
/// share one cached client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClientOptions {
    /// Profile override. When set, the profile's own credentials are used
    /// and no MFA session is attached.
    pub profile: Option<String>,
    /// Region override
    pub region: Option<String>,
}

impl ClientOptions {
    /// Options with a region override only.
    pub fn in_region(region: impl Into<String>) -> Self {
        Self {
            profile: None,
            region: Some(region.into()),
        }
    }
}

/// Run-wide authentication policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Default region for clients
    pub region: String,
    /// Default profile (None = the CLI's default chain)
    pub profile: Option<String>,
    /// Whether API calls must use an MFA-backed session
    pub mfa: bool,
    /// Requested session lifetime in seconds
    pub mfa_duration: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            profile: None,
            mfa: false,
            mfa_duration: DEFAULT_SESSION_DURATION,
        }
    }
}

/// Temporary credentials minted by STS.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl Credentials {
    /// Whether these credentials are unusable at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// An STS session bound to one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Profile the session was minted for
    pub profile: Option<String>,
    pub credentials: Credentials,
}

impl Session {
    /// Expiration instant of the session credentials.
    pub fn expiration(&self) -> DateTime<Utc> {
        self.credentials.expiration
    }

    /// Whether the session may no longer be used.
    pub fn is_expired(&self) -> bool {
        self.credentials.is_expired_at(Utc::now())
    }
}

/// A registered MFA device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MfaDevice {
    pub user_name: String,
    pub serial_number: String,
}

/// Everything a client needs to authenticate one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub region: String,
    pub profile: Option<String>,
    /// Session credentials, attached when MFA is enforced
    pub credentials: Option<Credentials>,
}

impl AuthContext {
    /// Context without session credentials.
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
            credentials: None,
        }
    }

    /// Whether attached session credentials have expired.
    pub fn is_expired(&self) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|c| c.is_expired_at(Utc::now()))
    }

    /// Attach region, profile and credentials to an aws CLI invocation.
    pub fn apply(&self, cmd: &mut Command) {
        cmd.args(["--region", &self.region]);

        match &self.credentials {
            // --profile would take precedence over the session variables
            Some(creds) => {
                cmd.env("AWS_ACCESS_KEY_ID", &creds.access_key_id)
                    .env("AWS_SECRET_ACCESS_KEY", &creds.secret_access_key)
                    .env("AWS_SESSION_TOKEN", &creds.session_token);
            }
            None => {
                if let Some(profile) = &self.profile {
                    cmd.args(["--profile", profile]);
                }
            }
        }
    }
}
