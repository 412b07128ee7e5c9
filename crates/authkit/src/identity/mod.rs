//! Identity-service seam used to mint MFA sessions.
//!
//! These calls run with the profile's long-lived credentials only; they
//! establish the session and must never require one.

pub mod aws;

use crate::error::{Error, Result};
use crate::types::{Credentials, MfaDevice, Session};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Identity and token service operations.
pub trait IdentityProvider {
    /// User name of the caller behind `profile`.
    fn current_user(&self, profile: Option<&str>) -> Result<String>;

    /// MFA devices registered for `user`.
    fn list_mfa_devices(&self, profile: Option<&str>, user: &str) -> Result<Vec<MfaDevice>>;

    /// First account alias, if any.
    fn account_alias(&self, profile: Option<&str>) -> Result<Option<String>>;

    /// Exchange a device serial and token for session credentials.
    fn session_token(
        &self,
        profile: Option<&str>,
        serial_number: &str,
        token_code: &str,
        duration_seconds: u32,
    ) -> Result<Session>;
}

/// Calls recorded by [`MockIdentity`].
#[derive(Debug, Clone, Default)]
pub struct IdentityCalls {
    pub list_mfa_devices: usize,
    /// (profile, serial, token, duration) per `session_token` call
    pub session_tokens: Vec<(Option<String>, String, String, u32)>,
}

/// In-memory identity service for tests.
#[derive(Debug, Clone, Default)]
pub struct MockIdentity {
    devices: Arc<Mutex<HashMap<Option<String>, Vec<MfaDevice>>>>,
    aliases: Arc<Mutex<HashMap<Option<String>, String>>>,
    credentials: Arc<Mutex<Vec<Credentials>>>,
    calls: Arc<Mutex<IdentityCalls>>,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an MFA device for a profile.
    pub fn add_device(&self, profile: Option<&str>, serial_number: &str) {
        let mut devices = self.devices.lock().unwrap();
        devices
            .entry(profile.map(str::to_string))
            .or_default()
            .push(MfaDevice {
                user_name: "test.user".to_string(),
                serial_number: serial_number.to_string(),
            });
    }

    pub fn set_alias(&self, profile: Option<&str>, alias: &str) {
        let mut aliases = self.aliases.lock().unwrap();
        aliases.insert(profile.map(str::to_string), alias.to_string());
    }

    /// Queue credentials handed out by the next `session_token` calls.
    pub fn push_credentials(&self, credentials: Credentials) {
        self.credentials.lock().unwrap().push(credentials);
    }

    pub fn calls(&self) -> IdentityCalls {
        self.calls.lock().unwrap().clone()
    }
}

impl IdentityProvider for MockIdentity {
    fn current_user(&self, _profile: Option<&str>) -> Result<String> {
        Ok("test.user".to_string())
    }

    fn list_mfa_devices(&self, profile: Option<&str>, _user: &str) -> Result<Vec<MfaDevice>> {
        self.calls.lock().unwrap().list_mfa_devices += 1;
        let devices = self.devices.lock().unwrap();
        Ok(devices
            .get(&profile.map(str::to_string))
            .cloned()
            .unwrap_or_default())
    }

    fn account_alias(&self, profile: Option<&str>) -> Result<Option<String>> {
        let aliases = self.aliases.lock().unwrap();
        Ok(aliases.get(&profile.map(str::to_string)).cloned())
    }

    fn session_token(
        &self,
        profile: Option<&str>,
        serial_number: &str,
        token_code: &str,
        duration_seconds: u32,
    ) -> Result<Session> {
        self.calls.lock().unwrap().session_tokens.push((
            profile.map(str::to_string),
            serial_number.to_string(),
            token_code.to_string(),
            duration_seconds,
        ));

        let mut queued = self.credentials.lock().unwrap();
        if queued.is_empty() {
            return Err(Error::Service {
                code: "AccessDenied".to_string(),
                message: "no session queued".to_string(),
            });
        }
        Ok(Session {
            profile: profile.map(str::to_string),
            credentials: queued.remove(0),
        })
    }
}
