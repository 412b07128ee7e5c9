//! Explicit caches for clients and sessions.
//!
//! Both caches are plain owned values handed to the broker, so a run (or
//! a test) decides their lifetime. Neither is persisted.

use crate::cli::ServiceClient;
use crate::types::{ClientOptions, Service, Session};
use std::collections::HashMap;
use std::sync::Arc;

/// STS sessions keyed by profile. `None` is the default profile.
#[derive(Debug, Default)]
pub struct SessionCache {
    sessions: HashMap<Option<String>, Session>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A live session for `profile`, evicting it first if it has expired.
    pub fn get_live(&mut self, profile: Option<&str>) -> Option<&Session> {
        let key = profile.map(str::to_string);
        if self.sessions.get(&key).is_some_and(Session::is_expired) {
            log::debug!("Session for profile {} expired, evicting", display_profile(profile));
            self.sessions.remove(&key);
        }
        self.sessions.get(&key)
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.profile.clone(), session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Authenticated clients keyed by service and option set.
#[derive(Debug, Default)]
pub struct ClientCache {
    clients: HashMap<(Service, ClientOptions), Arc<ServiceClient>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cached client whose credentials are still valid.
    ///
    /// A client carrying an expired session is dropped so the caller
    /// rebuilds it.
    pub fn get_live(&mut self, service: Service, options: &ClientOptions) -> Option<Arc<ServiceClient>> {
        let key = (service, options.clone());
        if self.clients.get(&key).is_some_and(|c| c.auth().is_expired()) {
            log::debug!("Cached {service} client holds an expired session, evicting");
            self.clients.remove(&key);
        }
        self.clients.get(&key).cloned()
    }

    pub fn insert(&mut self, options: ClientOptions, client: Arc<ServiceClient>) {
        self.clients.insert((client.service(), options), client);
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

pub(crate) fn display_profile(profile: Option<&str>) -> &str {
    profile.unwrap_or("default")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::AwsCli;
    use crate::types::{AuthContext, Credentials};
    use chrono::{Duration, Utc};

    fn session(profile: Option<&str>, ttl: Duration) -> Session {
        Session {
            profile: profile.map(str::to_string),
            credentials: Credentials {
                access_key_id: "ASIA".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: "token".to_string(),
                expiration: Utc::now() + ttl,
            },
        }
    }

    #[test]
    fn test_session_cache_is_per_profile() {
        let mut cache = SessionCache::new();
        cache.insert(session(Some("prod"), Duration::minutes(10)));

        assert!(cache.get_live(Some("prod")).is_some());
        assert!(cache.get_live(Some("staging")).is_none());
        assert!(cache.get_live(None).is_none());
    }

    #[test]
    fn test_session_cache_evicts_expired() {
        let mut cache = SessionCache::new();
        cache.insert(session(None, Duration::seconds(-5)));
        assert_eq!(cache.len(), 1);

        assert!(cache.get_live(None).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_client_cache_evicts_expired_session_client() {
        let mut auth = AuthContext::new("us-east-1", None);
        auth.credentials = Some(session(None, Duration::seconds(-1)).credentials);
        let client = Arc::new(ServiceClient::new(AwsCli::at("aws"), Service::Ec2, auth));

        let mut cache = ClientCache::new();
        cache.insert(ClientOptions::default(), client);

        assert!(cache.get_live(Service::Ec2, &ClientOptions::default()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_client_cache_keys_by_service() {
        let client = Arc::new(ServiceClient::new(
            AwsCli::at("aws"),
            Service::Iam,
            AuthContext::new("us-east-1", None),
        ));
        let mut cache = ClientCache::new();
        cache.insert(ClientOptions::default(), client);

        assert!(cache.get_live(Service::Iam, &ClientOptions::default()).is_some());
        assert!(cache.get_live(Service::Ec2, &ClientOptions::default()).is_none());
    }
}
