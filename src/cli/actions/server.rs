use crate::api;
use crate::api::handlers::auth::{AdminAllowList, AuthConfig, SessionBackend};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub admin_emails: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub session_store: SessionBackend,
    pub session_sweep_seconds: u64,
    pub production: bool,
    pub frontend_base_url: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<SecretString>,
    pub google_redirect_uri: String,
    pub upstream_api_url: Url,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let admin_emails = AdminAllowList::from_csv(&args.admin_emails);
    if admin_emails.is_empty() {
        info!("admin allow-list is empty; no account can reach /admin routes");
    } else {
        info!(admins = admin_emails.len(), "admin allow-list loaded");
    }

    if args.google_client_id.is_none() {
        info!("Google OAuth not configured; /auth/google will report an error");
    }

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_production(args.production)
        .with_session_secret(args.session_secret)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_admin_emails(admin_emails)
        .with_google_client_id(args.google_client_id)
        .with_google_client_secret(args.google_client_secret)
        .with_google_redirect_uri(args.google_redirect_uri);

    api::new(
        args.port,
        args.dsn,
        auth_config,
        args.session_store,
        args.session_sweep_seconds,
        args.upstream_api_url,
    )
    .await
}
