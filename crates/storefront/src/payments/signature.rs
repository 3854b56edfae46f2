//! Verification of payment notification signatures.
//!
//! The gateway sends `x-signature: ts=<unix>,v1=<hex>` together with an
//! `x-request-id`. The signature is an HMAC-SHA256 of the manifest
//! `id:<data.id>;request-id:<x-request-id>;ts:<ts>;` keyed with the webhook
//! secret.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

/// Notifications older (or further in the future) than this are rejected.
pub const MAX_AGE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("malformed signature header")]
    Malformed,
    #[error("notification timestamp outside the accepted window")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

/// Parsed `x-signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader<'a> {
    pub ts: &'a str,
    pub v1: &'a str,
}

impl<'a> SignatureHeader<'a> {
    /// Parse `ts=...,v1=...` (order and surrounding whitespace ignored).
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::Malformed` when either part is missing.
    pub fn parse(header: &'a str) -> Result<Self, SignatureError> {
        let mut ts = None;
        let mut v1 = None;
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("ts", value)) => ts = Some(value.trim()),
                Some(("v1", value)) => v1 = Some(value.trim()),
                _ => {}
            }
        }
        match (ts, v1) {
            (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok(Self { ts, v1 }),
            _ => Err(SignatureError::Malformed),
        }
    }
}

/// The string the gateway signs.
#[must_use]
pub fn manifest(data_id: &str, request_id: &str, ts: &str) -> String {
    // Alphanumeric ids are signed in lowercase.
    format!(
        "id:{};request-id:{request_id};ts:{ts};",
        data_id.to_ascii_lowercase()
    )
}

/// Verify a notification signature.
///
/// `now` is the current unix time in seconds. Timestamps may be sent in
/// milliseconds; both are accepted.
///
/// # Errors
///
/// Returns the reason the notification must be rejected.
pub fn verify(
    secret: &SecretString,
    header: Option<&str>,
    request_id: &str,
    data_id: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let header = SignatureHeader::parse(header.ok_or(SignatureError::Missing)?)?;

    let ts: i64 = header.ts.parse().map_err(|_| SignatureError::Malformed)?;
    let ts_secs = if ts > 100_000_000_000 { ts / 1000 } else { ts };
    if now.abs_diff(ts_secs) > MAX_AGE_SECS.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let provided = hex::decode(header.v1).map_err(|_| SignatureError::Malformed)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(manifest(data_id, request_id, header.ts).as_bytes());

    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_772_000_000;

    fn secret() -> SecretString {
        SecretString::from("test-webhook-secret")
    }

    fn sign(data_id: &str, request_id: &str, ts: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"test-webhook-secret").unwrap();
        mac.update(manifest(data_id, request_id, ts).as_bytes());
        format!("ts={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_parse_header_any_order() {
        let h = SignatureHeader::parse(" v1=abc , ts=123").unwrap();
        assert_eq!(h.ts, "123");
        assert_eq!(h.v1, "abc");
        assert_eq!(
            SignatureHeader::parse("ts=123"),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_manifest_format() {
        assert_eq!(
            manifest("ABC123", "req-1", "1700"),
            "id:abc123;request-id:req-1;ts:1700;"
        );
    }

    #[test]
    fn test_valid_signature() {
        let header = sign("98765", "req-1", &NOW.to_string());
        assert_eq!(
            verify(&secret(), Some(&header), "req-1", "98765", NOW + 10),
            Ok(())
        );
    }

    #[test]
    fn test_millisecond_timestamp_accepted() {
        let ts = (NOW * 1000).to_string();
        let header = sign("98765", "req-1", &ts);
        assert_eq!(verify(&secret(), Some(&header), "req-1", "98765", NOW), Ok(()));
    }

    #[test]
    fn test_tampered_id_rejected() {
        let header = sign("98765", "req-1", &NOW.to_string());
        assert_eq!(
            verify(&secret(), Some(&header), "req-1", "11111", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign("98765", "req-1", &NOW.to_string());
        let other = SecretString::from("another-secret");
        assert_eq!(
            verify(&other, Some(&header), "req-1", "98765", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = sign("98765", "req-1", &NOW.to_string());
        assert_eq!(
            verify(&secret(), Some(&header), "req-1", "98765", NOW + MAX_AGE_SECS + 1),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        for ts in [i64::MIN, i64::MAX, -1] {
            let header = sign("98765", "req-1", &ts.to_string());
            assert_eq!(
                verify(&secret(), Some(&header), "req-1", "98765", NOW),
                Err(SignatureError::Stale)
            );
        }
    }

    #[test]
    fn test_missing_and_malformed() {
        assert_eq!(
            verify(&secret(), None, "req-1", "1", NOW),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify(&secret(), Some("ts=abc,v1=00"), "req-1", "1", NOW),
            Err(SignatureError::Malformed)
        );
        let bad_hex = format!("ts={NOW},v1=zz");
        assert_eq!(
            verify(&secret(), Some(&bad_hex), "req-1", "1", NOW),
            Err(SignatureError::Malformed)
        );
    }
}
