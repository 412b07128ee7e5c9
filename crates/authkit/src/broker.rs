//! Credential broker: cached clients and MFA-backed sessions.
//!
//! The broker is the only writer of both caches. Clients are built once
//! per (service, options) pair; sessions once per profile, until they
//! expire.

use crate::cache::{ClientCache, SessionCache, display_profile};
use crate::cli::{AwsCli, ServiceClient};
use crate::error::{Error, Result};
use crate::identity::IdentityProvider;
use crate::token::{TokenSource, is_valid_token};
use crate::types::{AuthContext, AuthSettings, ClientOptions, Credentials, Service, Session};
use std::sync::Arc;

/// Builds and caches authenticated clients.
pub struct CredentialBroker<I, T> {
    settings: AuthSettings,
    cli: AwsCli,
    identity: I,
    tokens: T,
    clients: ClientCache,
    sessions: SessionCache,
}

impl<I: IdentityProvider, T: TokenSource> CredentialBroker<I, T> {
    /// Create a broker with empty caches.
    pub fn new(settings: AuthSettings, cli: AwsCli, identity: I, tokens: T) -> Self {
        Self::with_caches(
            settings,
            cli,
            identity,
            tokens,
            ClientCache::new(),
            SessionCache::new(),
        )
    }

    /// Create a broker around caches owned by the caller.
    pub fn with_caches(
        settings: AuthSettings,
        cli: AwsCli,
        identity: I,
        tokens: T,
        clients: ClientCache,
        sessions: SessionCache,
    ) -> Self {
        Self {
            settings,
            cli,
            identity,
            tokens,
            clients,
            sessions,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub fn clients(&self) -> &ClientCache {
        &self.clients
    }

    /// Authenticated EC2 client.
    pub fn ec2(&mut self, options: &ClientOptions) -> Result<Arc<ServiceClient>> {
        self.client(Service::Ec2, options)
    }

    /// Get a client for `service`, reusing one built for equal options.
    pub fn client(&mut self, service: Service, options: &ClientOptions) -> Result<Arc<ServiceClient>> {
        if let Some(client) = self.clients.get_live(service, options) {
            log::debug!("Reusing cached {service} client");
            return Ok(client);
        }

        let auth = self.authenticate(options)?;
        let client = Arc::new(ServiceClient::new(self.cli.clone(), service, auth));
        self.clients.insert(options.clone(), Arc::clone(&client));
        log::debug!("Built {service} client ({} cached)", self.clients.len());
        Ok(client)
    }

    /// Resolve region/profile and attach session credentials when MFA applies.
    fn authenticate(&mut self, options: &ClientOptions) -> Result<AuthContext> {
        let region = options
            .region
            .clone()
            .unwrap_or_else(|| self.settings.region.clone());
        let profile = options
            .profile
            .clone()
            .or_else(|| self.settings.profile.clone());

        let mut auth = AuthContext::new(region, profile);

        // An explicit profile override brings its own credentials.
        if self.settings.mfa && options.profile.is_none() {
            let profile = self.settings.profile.clone();
            auth.credentials = Some(self.session_credentials(profile.as_deref())?);
        }

        Ok(auth)
    }

    fn session_credentials(&mut self, profile: Option<&str>) -> Result<Credentials> {
        Ok(self.session(profile)?.credentials)
    }

    /// A live session for `profile`, challenging for MFA when none is cached.
    pub fn session(&mut self, profile: Option<&str>) -> Result<Session> {
        if let Some(session) = self.sessions.get_live(profile) {
            log::debug!("Reusing session for profile {}", display_profile(profile));
            return Ok(session.clone());
        }

        let serial_number = self.mfa_serial_number(profile)?;
        let token = self.mfa_token(profile)?;
        let session = self.identity.session_token(
            profile,
            &serial_number,
            &token,
            self.settings.mfa_duration,
        )?;

        log::debug!(
            "Minted session for profile {} expiring at {}",
            display_profile(profile),
            session.expiration()
        );
        self.sessions.insert(session.clone());
        Ok(session)
    }

    fn mfa_serial_number(&self, profile: Option<&str>) -> Result<String> {
        let user = self.identity.current_user(profile)?;
        let devices = self.identity.list_mfa_devices(profile, &user)?;

        match devices.into_iter().next() {
            Some(device) => Ok(device.serial_number),
            None => Err(Error::MfaNotConfigured {
                profile: display_profile(profile).to_string(),
                account: self.account_alias(profile),
            }),
        }
    }

    fn mfa_token(&mut self, profile: Option<&str>) -> Result<String> {
        let prompt = format!("Enter MFA token for {}", self.account_alias(profile));

        loop {
            let token = self.tokens.next_token(&prompt)?;
            let token = token.trim();
            if is_valid_token(token) {
                return Ok(token.to_string());
            }
            if !self.tokens.can_retry() {
                return Err(Error::InvalidToken);
            }
            log::warn!("MFA token must be exactly 6 digits");
        }
    }

    fn account_alias(&self, profile: Option<&str>) -> String {
        match self.identity.account_alias(profile) {
            Ok(Some(alias)) => alias,
            Ok(None) => "no alias".to_string(),
            Err(e) => {
                log::debug!("Could not read account alias: {e}");
                "no alias".to_string()
            }
        }
    }
}
