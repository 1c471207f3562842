//! Delivery receipt signature verification.
//!
//! Vendors sign receipt callbacks with HMAC-SHA256 over `timestamp + token`
//! and send the hex digest alongside the two inputs as headers.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "X-Receipt-Timestamp";
pub const TOKEN_HEADER: &str = "X-Receipt-Token";
pub const SIGNATURE_HEADER: &str = "X-Receipt-Signature";

/// Compute the hex signature a vendor is expected to send.
pub fn sign_receipt(signing_key: &str, timestamp: &str, token: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signed delivery receipt.
///
/// Returns `false` when any input is missing, the timestamp is not Unix
/// seconds, the timestamp is more than `max_age_seconds` away from now in
/// either direction, or the digest does not match.
pub fn verify_receipt_signature(
    signing_key: &str,
    timestamp: &str,
    token: &str,
    signature: &str,
    max_age_seconds: u64,
) -> bool {
    if signing_key.is_empty() || timestamp.is_empty() || token.is_empty() || signature.is_empty() {
        warn!(
            has_timestamp = !timestamp.is_empty(),
            has_token = !token.is_empty(),
            has_signature = !signature.is_empty(),
            "receipt_signature_missing_fields"
        );
        return false;
    }

    let sent_at: i64 = match timestamp.parse() {
        Ok(t) => t,
        Err(_) => {
            warn!(timestamp = %timestamp, "receipt_signature_invalid_timestamp");
            return false;
        }
    };

    let age = Utc::now().timestamp().abs_diff(sent_at);
    if age > max_age_seconds {
        warn!(
            age_seconds = age,
            max_age_seconds = max_age_seconds,
            "receipt_signature_stale"
        );
        return false;
    }

    let provided = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(signature_length = signature.len(), "receipt_signature_not_hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(signing_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("receipt_signature_invalid_key");
            return false;
        }
    };
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());

    // verify_slice compares in constant time
    let valid = mac.verify_slice(&provided).is_ok();
    if !valid {
        warn!("receipt_signature_mismatch");
    }
    valid
}

/// Signature checks only run when a non-blank key is configured.
pub fn is_signature_verification_enabled(signing_key: Option<&str>) -> bool {
    signing_key.map(|k| !k.trim().is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> String {
        Utc::now().timestamp().to_string()
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(!verify_receipt_signature("", "123", "token", "ab", 300));
        assert!(!verify_receipt_signature("key", "", "token", "ab", 300));
        assert!(!verify_receipt_signature("key", "123", "", "ab", 300));
        assert!(!verify_receipt_signature("key", "123", "token", "", 300));
    }

    #[test]
    fn test_non_numeric_timestamp_rejected() {
        assert!(!verify_receipt_signature("key", "yesterday", "token", "ab", 300));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let signature = sign_receipt("key", "946684800", "token").unwrap();
        assert!(!verify_receipt_signature(
            "key",
            "946684800",
            "token",
            &signature,
            300
        ));
    }

    #[test]
    fn test_valid_signature_accepted() {
        let timestamp = now();
        let signature = sign_receipt("vendor-key", &timestamp, "tok-1").unwrap();
        assert!(verify_receipt_signature(
            "vendor-key",
            &timestamp,
            "tok-1",
            &signature,
            300
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let timestamp = now();
        let signature = sign_receipt("other-key", &timestamp, "tok-1").unwrap();
        assert!(!verify_receipt_signature(
            "vendor-key",
            &timestamp,
            "tok-1",
            &signature,
            300
        ));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        assert!(!verify_receipt_signature("key", &now(), "tok", "zz-not-hex", 300));
    }

    #[test]
    fn test_is_signature_verification_enabled() {
        assert!(!is_signature_verification_enabled(None));
        assert!(!is_signature_verification_enabled(Some("  ")));
        assert!(is_signature_verification_enabled(Some("key123")));
    }
}
