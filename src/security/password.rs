//! Stored password formats.
//!
//! Two formats are accepted in the credential database:
//!
//! * `sha256$<salt>$<digest>`: hex-encoded SHA-256 of the salt followed by
//!   the password. Produced by `verso encode-password`.
//! * anything else is read as the legacy format, the standard base64 encoding
//!   of the cleartext. It is reversible and kept only so existing databases
//!   keep working.

use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

const SHA256_PREFIX: &str = "sha256$";

/// Check `candidate` against a stored password in either format.
pub fn verify(stored: &str, candidate: &str) -> bool {
    match stored.strip_prefix(SHA256_PREFIX) {
        Some(rest) => {
            let Some((salt, digest)) = rest.split_once('$') else {
                return false;
            };
            let computed = salted_digest(salt, candidate);
            computed.as_bytes().ct_eq(digest.as_bytes()).into()
        }
        None => {
            let encoded = encode_base64(candidate);
            encoded.as_bytes().ct_eq(stored.as_bytes()).into()
        }
    }
}

/// Legacy reversible encoding.
pub fn encode_base64(cleartext: &str) -> String {
    STANDARD.encode(cleartext.as_bytes())
}

/// Salted digest with a fresh random salt.
pub fn hash_sha256(cleartext: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, cleartext);
    format!("{SHA256_PREFIX}{salt}${digest}")
}

fn salted_digest(salt: &str, cleartext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(cleartext.as_bytes());
    hex::encode(hasher.finalize().as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_base64_round_trips() {
        assert_eq!(encode_base64("password"), "cGFzc3dvcmQ=");
        assert!(verify("cGFzc3dvcmQ=", "password"));
        assert!(!verify("cGFzc3dvcmQ=", "Password"));
    }

    #[test]
    fn salted_hash_verifies() {
        let stored = hash_sha256("s3cret");
        assert!(stored.starts_with("sha256$"));
        assert!(verify(&stored, "s3cret"));
        assert!(!verify(&stored, "s3cret "));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_sha256("same"), hash_sha256("same"));
    }

    #[test]
    fn malformed_salted_value_never_matches() {
        assert!(!verify("sha256$nosalt", "nosalt"));
    }
}
