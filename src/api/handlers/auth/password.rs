//! Password credential derivation and verification.
//!
//! Stored credentials are self-describing `saltHex:derivedKeyHex` strings:
//! a fresh random salt plus an Argon2id derived key. Verification recomputes
//! the key from the embedded salt and compares in constant time.

use anyhow::{Context, Result, anyhow};
use argon2::Argon2;
use rand::{RngCore, rngs::OsRng};
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Derive a storable credential string from a plaintext password.
///
/// # Errors
/// Returns an error if the system RNG or the key derivation fails.
pub(crate) fn hash(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate password salt")?;

    let mut key = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(password.as_bytes(), &salt, &mut key)
        .map_err(|err| anyhow!("failed to derive password key: {err}"))?;

    Ok(format!("{}:{}", hex::encode(salt), hex::encode(key)))
}

/// Check a plaintext password against a stored credential.
///
/// Absent or malformed stored values verify as `false`; this function never
/// fails, so login handlers cannot be distinguished by error shape.
pub(crate) fn verify(password: &str, stored: Option<&str>) -> bool {
    let Some(stored) = stored else {
        return false;
    };
    let Some((salt_hex, key_hex)) = stored.split_once(':') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(key_hex) else {
        return false;
    };
    // Argon2 rejects salts under 8 bytes; length is also re-checked here so a
    // truncated credential can never reach the comparison.
    if salt.len() < 8 || expected.len() != KEY_LEN {
        return false;
    }

    let mut derived = [0u8; KEY_LEN];
    if Argon2::default()
        .hash_password_into(password.as_bytes(), &salt, &mut derived)
        .is_err()
    {
        return false;
    }

    // Equal lengths are guaranteed above; ct_eq keeps the comparison flat.
    derived.as_slice().ct_eq(expected.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_round_trips() {
        let stored = hash("correct horse battery").expect("hash should succeed");
        assert!(verify("correct horse battery", Some(&stored)));
        assert!(!verify("wrong horse battery", Some(&stored)));
    }

    #[test]
    fn hash_uses_fresh_salts() {
        let first = hash("same password").expect("hash should succeed");
        let second = hash("same password").expect("hash should succeed");
        assert_ne!(first, second);
        assert!(verify("same password", Some(&first)));
        assert!(verify("same password", Some(&second)));
    }

    #[test]
    fn hash_format_is_salt_colon_key() {
        let stored = hash("anything").expect("hash should succeed");
        let (salt_hex, key_hex) = stored.split_once(':').expect("missing separator");
        assert_eq!(salt_hex.len(), SALT_LEN * 2);
        assert_eq!(key_hex.len(), KEY_LEN * 2);
        assert!(stored.chars().all(|c| c.is_ascii_hexdigit() || c == ':'));
    }

    #[test]
    fn verify_rejects_missing_or_malformed_without_panicking() {
        assert!(!verify("anything", None));
        assert!(!verify("anything", Some("")));
        assert!(!verify("anything", Some("no-separator")));
        assert!(!verify("anything", Some("deadbeef")));
        assert!(!verify("anything", Some("not-hex:not-hex")));
        assert!(!verify("anything", Some("ab:cd")));
        assert!(!verify("anything", Some(":")));
    }

    #[test]
    fn verify_is_case_sensitive() {
        let stored = hash("Password123").expect("hash should succeed");
        assert!(verify("Password123", Some(&stored)));
        assert!(!verify("password123", Some(&stored)));
    }
}
