//! Webhook Signature Verification
//!
//! Validates the `stripe-signature` header before any event is parsed or
//! dispatched. The header carries a unix timestamp and one or more
//! HMAC-SHA256 signatures over `"{timestamp}.{raw body}"` under the
//! shared signing secret:
//!
//! ```text
//! stripe-signature: t=1614556800,v1=5257a869e7...
//! ```
//!
//! A signature is accepted when any `v1` entry matches (allowing secret
//! rotation) and the timestamp is within the configured tolerance of the
//! current clock. Comparison is constant-time.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default allowed skew between the signature timestamp and now.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Reasons a signature header is rejected
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    /// The header did not contain a `t=` and at least one `v1=` entry
    #[error("malformed signature header")]
    MalformedHeader,

    /// The timestamp is too far from the current clock
    #[error("signature timestamp outside tolerance of {0}s")]
    TimestampOutOfTolerance(u64),

    /// No `v1` entry matched the expected signature
    #[error("signature mismatch")]
    Mismatch,

    /// The signing secret could not be used as an HMAC key
    #[error("invalid signing secret")]
    InvalidSecret,
}

/// Verifies `stripe-signature` headers against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl SignatureVerifier {
    /// Create a verifier with the given secret and timestamp tolerance.
    pub fn new(secret: impl Into<Vec<u8>>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Verify a header against a payload, using the current clock.
    pub fn verify(&self, header: &str, payload: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(header, payload, Utc::now().timestamp())
    }

    /// Verify against an explicit "now", in epoch seconds.
    fn verify_at(&self, header: &str, payload: &[u8], now: i64) -> Result<(), SignatureError> {
        let parsed = ParsedHeader::parse(header)?;

        let tolerance_secs = self.tolerance.as_secs();
        if now.abs_diff(parsed.timestamp) > tolerance_secs {
            return Err(SignatureError::TimestampOutOfTolerance(tolerance_secs));
        }

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        for candidate in &parsed.signatures {
            if let Ok(bytes) = hex::decode(candidate) {
                if constant_time_compare(&bytes, expected.as_slice()) {
                    return Ok(());
                }
            }
        }

        Err(SignatureError::Mismatch)
    }
}

/// The `t` and `v1` entries of a signature header.
struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl ParsedHeader {
    fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = value.parse::<i64>().ok();
                }
                Some(("v1", value)) => signatures.push(value.to_string()),
                _ => {}
            }
        }

        match (timestamp, signatures.is_empty()) {
            (Some(timestamp), false) => Ok(Self {
                timestamp,
                signatures,
            }),
            _ => Err(SignatureError::MalformedHeader),
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &[u8], timestamp: i64, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET.as_bytes().to_vec(), DEFAULT_TOLERANCE)
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id": "evt_1"}"#;
        let header = sign(payload, 1614556800, SECRET);

        assert_eq!(verifier().verify_at(&header, payload, 1614556800), Ok(()));
    }

    #[test]
    fn test_skew_within_tolerance_accepted() {
        let payload = b"payload";
        let header = sign(payload, 1614556800, SECRET);

        assert_eq!(verifier().verify_at(&header, payload, 1614556800 + 299), Ok(()));
        assert_eq!(verifier().verify_at(&header, payload, 1614556800 - 299), Ok(()));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"payload";
        let header = sign(payload, 1614556800, SECRET);

        assert_eq!(
            verifier().verify_at(&header, payload, 1614556800 + 301),
            Err(SignatureError::TimestampOutOfTolerance(300))
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(b"original", 1614556800, SECRET);

        assert_eq!(
            verifier().verify_at(&header, b"tampered", 1614556800),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"payload";
        let header = sign(payload, 1614556800, "whsec_other_secret");

        assert_eq!(
            verifier().verify_at(&header, payload, 1614556800),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let payload = b"payload";
        let good = sign(payload, 1614556800, SECRET);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1614556800,v1={},v1={}", "00".repeat(32), good_sig);

        assert_eq!(verifier().verify_at(&header, payload, 1614556800), Ok(()));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let v = verifier();
        for header in ["", "t=123", "v1=abcd", "t=notanumber,v1=abcd", "nonsense"] {
            assert_eq!(
                v.verify_at(header, b"payload", 0),
                Err(SignatureError::MalformedHeader),
                "header {:?} should be malformed",
                header
            );
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2]));
    }
}
