//! # authkit
//!
//! Authenticated AWS clients for command-line tools, driven through the
//! `aws` executable.
//!
//! This crate provides:
//! - A [`CredentialBroker`] that caches one client per (service, options)
//!   pair and one STS session per profile
//! - Transparent MFA challenges when the policy requires a session
//! - An [`IdentityProvider`] seam for the IAM/STS calls that mint sessions
//!
//! ## Example
//!
//! ```no_run
//! use authkit::{AuthSettings, AwsCli, ClientOptions, CredentialBroker, StaticToken};
//! use authkit::identity::aws::AwsCliIdentity;
//!
//! let cli = AwsCli::locate().expect("aws CLI not installed");
//! let settings = AuthSettings { mfa: true, ..Default::default() };
//! let identity = AwsCliIdentity::new(cli.clone(), settings.region.clone());
//! let tokens = StaticToken::new("123456").unwrap();
//!
//! let mut broker = CredentialBroker::new(settings, cli, identity, tokens);
//! let ec2 = broker.ec2(&ClientOptions::default()).unwrap();
//! let groups = ec2.run("describe-security-groups", &[]).unwrap();
//! println!("{groups}");
//! ```

#![warn(clippy::all)]

pub mod broker;
pub mod cache;
pub mod cli;
pub mod error;
pub mod identity;
pub mod token;
pub mod types;

pub use broker::CredentialBroker;
pub use cache::{ClientCache, SessionCache};
pub use cli::{AwsCli, ServiceClient};
pub use error::{Error, ErrorCategory, Result};
pub use identity::IdentityProvider;
pub use token::{NoToken, StaticToken, TokenSource, is_valid_token};
pub use types::{
    AuthContext, AuthSettings, ClientOptions, Credentials, DEFAULT_REGION,
    DEFAULT_SESSION_DURATION, MfaDevice, Service, Session,
};
