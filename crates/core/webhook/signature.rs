//! HMAC-SHA256 payload signatures.
//!
//! Receivers recompute the HMAC of the raw request body with the shared
//! secret and compare it with the `X-Webhook-Signature` header, which has
//! the form `sha256=<hex>`.

use crate::error::{GeopinError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const SIGNATURE_PREFIX: &str = "sha256=";

fn mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GeopinError::InvalidInput(format!("Failed to initialize HMAC: {}", e)))
}

/// Hex-encoded HMAC-SHA256 of `payload`.
///
/// ```rust
/// use geopin::webhook::signature::{sign_payload, verify_signature};
///
/// let body = br#"{"event":"route.completed"}"#;
/// let signature = sign_payload(body, "s3cret")?;
/// assert_eq!(signature.len(), 64);
/// assert!(verify_signature(body, "s3cret", &format!("sha256={}", signature)));
/// # Ok::<(), geopin::GeopinError>(())
/// ```
pub fn sign_payload(payload: &[u8], secret: &str) -> Result<String> {
    let mut mac = mac(secret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Header value for a signed payload: `sha256=<hex>`.
pub fn signature_header(payload: &[u8], secret: &str) -> Result<String> {
    Ok(format!("{}{}", SIGNATURE_PREFIX, sign_payload(payload, secret)?))
}

/// Check a signature in constant time. Accepts the value with or without
/// the `sha256=` prefix; malformed hex never verifies.
pub fn verify_signature(payload: &[u8], secret: &str, signature: &str) -> bool {
    let hex_digest = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = mac(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_payload() {
        let signature = sign_payload(b"test payload", "supersecretkey123").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload(b"what do ya want for nothing?", "Jefe").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_roundtrip_and_tamper() {
        let body = br#"{"event":"batch.completed","data":{}}"#;
        let header = signature_header(body, "k").unwrap();
        assert!(header.starts_with("sha256="));

        assert!(verify_signature(body, "k", &header));
        assert!(verify_signature(body, "k", header.trim_start_matches("sha256=")));
        assert!(!verify_signature(body, "other", &header));
        assert!(!verify_signature(b"{}", "k", &header));
        assert!(!verify_signature(body, "k", "sha256=zz"));
        assert!(!verify_signature(body, "k", ""));
    }
}
