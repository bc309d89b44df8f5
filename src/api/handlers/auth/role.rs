//! Roles, providers, and allow-list based role derivation.
//!
//! The admin allow-list is loaded once at startup and passed around as an
//! immutable value; role derivation is a pure lookup so it stays trivially
//! testable. Roles are re-derived at signup, every local login, and every
//! OAuth callback, never taken from client input.

use std::collections::HashSet;

/// Coarse authorization tier of a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Parse a stored role; unknown values fall back to the least privilege.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value == "admin" { Self::Admin } else { Self::User }
    }
}

/// Authentication method that owns a user record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Local,
    Google,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Google => "google",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value == "google" {
            Self::Google
        } else {
            Self::Local
        }
    }
}

/// Immutable set of admin emails, lowercased at load time.
#[derive(Clone, Debug, Default)]
pub struct AdminAllowList {
    emails: HashSet<String>,
}

impl AdminAllowList {
    /// Build from a comma-separated list; entries are trimmed, lowercased,
    /// and empty entries dropped.
    #[must_use]
    pub fn from_csv(raw: &str) -> Self {
        let emails = raw
            .split(',')
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        Self { emails }
    }

    /// Derive the role for an email against this allow-list.
    #[must_use]
    pub fn role_for_email(&self, email: &str) -> Role {
        if self.emails.contains(&email.trim().to_lowercase()) {
            Role::Admin
        } else {
            Role::User
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}
