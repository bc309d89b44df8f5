//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the appropriate action, such
//! as starting the API server with its full configuration state.

use crate::api::handlers::auth::SessionBackend;
use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(5000);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let session_store = matches
        .get_one::<String>("session-store")
        .map(String::as_str)
        .unwrap_or("memory");
    let session_store = SessionBackend::parse(session_store).map_err(|err| anyhow!(err))?;

    let upstream_api_url = matches
        .get_one::<String>("upstream-api-url")
        .context("missing required argument: --upstream-api-url")?;
    let upstream_api_url =
        Url::parse(upstream_api_url).context("invalid VOICEFORGE_UPSTREAM_API_URL")?;

    let session_secret = matches
        .get_one::<String>("session-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --session-secret")?;

    Ok(Action::Server(Box::new(Args {
        port,
        dsn,
        admin_emails: matches
            .get_one::<String>("admin-emails")
            .cloned()
            .unwrap_or_default(),
        session_secret,
        session_ttl_seconds: matches
            .get_one::<i64>("session-ttl-seconds")
            .copied()
            .unwrap_or(604_800),
        session_store,
        session_sweep_seconds: matches
            .get_one::<u64>("session-sweep-seconds")
            .copied()
            .unwrap_or(3600),
        production: matches.get_flag("production"),
        frontend_base_url: matches
            .get_one::<String>("frontend-base-url")
            .cloned()
            .context("missing required argument: --frontend-base-url")?,
        google_client_id: matches.get_one::<String>("google-client-id").cloned(),
        google_client_secret: matches
            .get_one::<String>("google-client-secret")
            .cloned()
            .map(SecretString::from),
        google_redirect_uri: matches
            .get_one::<String>("google-redirect-uri")
            .cloned()
            .context("missing required argument: --google-redirect-uri")?,
        upstream_api_url,
    })))
}
