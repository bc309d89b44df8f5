//! # VoiceForge Backend
//!
//! `voiceforge` is the backend of a text-to-speech studio. It owns user
//! identity and cookie-backed sessions, and fronts the external synthesis
//! vendor with a thin HTTP proxy.
//!
//! ## Authentication
//!
//! Accounts are either `local` (salted, memory-hard password credential) or
//! `google` (OAuth authorization-code flow with CSRF-state validation).
//! Sessions are random tokens carried in an `HttpOnly` cookie; the server
//! stores only a keyed hash of each token.
//!
//! ## Authorization
//!
//! Roles (`user`, `admin`) are derived from a configured admin email
//! allow-list at every authentication event, never taken from client input.
//! Admin-only routes (`/admin/*`) re-check the role on each request.
//!
//! ## Out of scope
//!
//! Speech synthesis, translation, and voice cloning happen in the upstream
//! vendor API; requests under `/api/*` are proxied there verbatim.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
