//! Auth configuration and shared state.

use secrecy::SecretString;
use std::sync::Arc;

use super::role::AdminAllowList;
use super::session_store::SessionStore;

pub(crate) const DEFAULT_NEXT_PATH: &str = "/studio";
const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_SESSION_SECRET: &str = "dev-session-secret";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    production: bool,
    session_secret: SecretString,
    session_ttl_seconds: i64,
    admin_emails: AdminAllowList,
    google_client_id: Option<String>,
    google_client_secret: Option<SecretString>,
    google_redirect_uri: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        let google_redirect_uri = format!(
            "{}/auth/google/callback",
            frontend_base_url.trim_end_matches('/')
        );
        Self {
            frontend_base_url,
            production: false,
            session_secret: SecretString::from(DEFAULT_SESSION_SECRET),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            admin_emails: AdminAllowList::default(),
            google_client_id: None,
            google_client_secret: None,
            google_redirect_uri,
        }
    }

    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    #[must_use]
    pub fn with_session_secret(mut self, secret: SecretString) -> Self {
        self.session_secret = secret;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_admin_emails(mut self, allow_list: AdminAllowList) -> Self {
        self.admin_emails = allow_list;
        self
    }

    #[must_use]
    pub fn with_google_client_id(mut self, client_id: Option<String>) -> Self {
        self.google_client_id = client_id.filter(|value| !value.is_empty());
        self
    }

    #[must_use]
    pub fn with_google_client_secret(mut self, client_secret: Option<SecretString>) -> Self {
        self.google_client_secret = client_secret;
        self
    }

    #[must_use]
    pub fn with_google_redirect_uri(mut self, redirect_uri: String) -> Self {
        self.google_redirect_uri = redirect_uri;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Cookies only carry `Secure` when the deployment serves HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.production
    }

    pub(crate) fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn admin_emails(&self) -> &AdminAllowList {
        &self.admin_emails
    }

    pub(crate) fn google_client_id(&self) -> Option<&str> {
        self.google_client_id.as_deref()
    }

    pub(crate) fn google_client_secret(&self) -> Option<&SecretString> {
        self.google_client_secret.as_ref()
    }

    pub(crate) fn google_redirect_uri(&self) -> &str {
        &self.google_redirect_uri
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: Arc<dyn SessionStore>,
}

impl AuthState {
    pub(crate) fn new(config: AuthConfig, sessions: Arc<dyn SessionStore>) -> Self {
        Self { config, sessions }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::role::Role;
    use secrecy::ExposeSecret;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("http://localhost:5000".to_string());

        assert_eq!(config.frontend_base_url(), "http://localhost:5000");
        assert!(!config.session_cookie_secure());
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert_eq!(
            config.google_redirect_uri(),
            "http://localhost:5000/auth/google/callback"
        );
        assert!(config.google_client_id().is_none());

        let config = config
            .with_production(true)
            .with_session_ttl_seconds(120)
            .with_session_secret(SecretString::from("s3cret"))
            .with_admin_emails(AdminAllowList::from_csv("root@x.com"))
            .with_google_client_id(Some("client-id".to_string()))
            .with_google_redirect_uri("https://studio.example/cb".to_string());

        assert!(config.session_cookie_secure());
        assert_eq!(config.session_ttl_seconds(), 120);
        assert_eq!(config.session_secret().expose_secret(), "s3cret");
        assert_eq!(
            config.admin_emails().role_for_email("root@x.com"),
            Role::Admin
        );
        assert_eq!(config.google_client_id(), Some("client-id"));
        assert_eq!(config.google_redirect_uri(), "https://studio.example/cb");
    }

    #[test]
    fn empty_google_client_id_counts_as_unconfigured() {
        let config = AuthConfig::new("http://localhost:5000".to_string())
            .with_google_client_id(Some(String::new()));
        assert!(config.google_client_id().is_none());
    }
}
