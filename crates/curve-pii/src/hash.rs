//! HASH strategy: HMAC-SHA256 keyed by a process-wide salt (§4.2).

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Once;

type HmacSha256 = Hmac<Sha256>;

/// Fallback salt used when none is configured. Emitting HASH output with
/// this salt is a deployment misconfiguration, not a crash — but it is
/// loud: [`warn_once_if_default`] logs a prominent warning the first time
/// it is used.
pub const PROCESS_DEFAULT_SALT: &[u8] = b"curve-default-hash-salt-do-not-use-in-production";

static DEFAULT_SALT_WARNING: Once = Once::new();

/// Emit a one-time warning that the process-default HASH salt is in use.
/// Safe to call on every HASH invocation; the underlying log call fires at
/// most once per process.
pub fn warn_once_if_default(salt: &[u8]) {
    if salt == PROCESS_DEFAULT_SALT {
        DEFAULT_SALT_WARNING.call_once(|| {
            tracing::warn!(
                "pii.crypto.salt is not configured; falling back to the process-default HASH salt. \
                 This is not suitable for production use."
            );
        });
    }
}

/// HMAC-SHA256 `input` keyed by `salt`, Base64-encoded. Deterministic given
/// a fixed salt; empty input passes through unchanged.
pub fn hash(salt: &[u8], input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    warn_once_if_default(salt);

    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC accepts keys of any length");
    mac.update(input.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_passes_through() {
        assert_eq!(hash(b"salt", ""), "");
    }

    #[test]
    fn hash_is_deterministic_given_fixed_salt() {
        let a = hash(b"salt", "jane.doe@example.com");
        let b = hash(b"salt", "jane.doe@example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let a = hash(b"salt-a", "jane.doe@example.com");
        let b = hash(b"salt-b", "jane.doe@example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn output_is_valid_base64() {
        let encoded = hash(b"salt", "value");
        assert!(STANDARD.decode(&encoded).is_ok());
    }
}
