//! `Stripe-Signature` verification.
//!
//! The header carries a timestamp and one or more `v1` signatures:
//! `t=1700000000,v1=<hex>,v1=<hex>`. Each `v1` is HMAC-SHA256 over
//! `"<t>.<raw body>"` keyed by the endpoint's signing secret. Several `v1`
//! values appear while a secret is being rolled.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature header has no timestamp")]
    MissingTimestamp,

    #[error("Signature header has no v1 signature")]
    NoSignatures,

    #[error("Signature timestamp is {age_secs}s old, outside the tolerance")]
    TimestampOutOfTolerance { age_secs: i64 },

    #[error("No signature matches the payload")]
    Mismatch,
}

/// Verifies signed webhook payloads against one signing secret.
pub struct SignatureVerifier {
    secret: SecretString,
    tolerance: Duration,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    pub fn verify(&self, header: &str, body: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(header, body, Utc::now().timestamp())
    }

    /// Verifies as of `now` (unix seconds).
    pub fn verify_at(&self, header: &str, body: &[u8], now: i64) -> Result<(), SignatureError> {
        let parsed = ParsedHeader::parse(header);
        let timestamp = parsed.timestamp.ok_or(SignatureError::MissingTimestamp)?;
        if parsed.signatures.is_empty() {
            return Err(SignatureError::NoSignatures);
        }

        let age_secs = now - timestamp;
        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        if age_secs > tolerance {
            return Err(SignatureError::TimestampOutOfTolerance { age_secs });
        }

        let expected = mac_bytes(self.secret.expose_secret().as_bytes(), timestamp, body);
        let matched = parsed
            .signatures
            .iter()
            .filter_map(|candidate| hex::decode(candidate).ok())
            .any(|candidate| {
                candidate.len() == expected.len() && bool::from(candidate.ct_eq(&expected))
            });

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

struct ParsedHeader<'a> {
    timestamp: Option<i64>,
    signatures: Vec<&'a str>,
}

impl<'a> ParsedHeader<'a> {
    fn parse(header: &'a str) -> Self {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for item in header.split(',') {
            let Some((key, value)) = item.split_once('=') else {
                continue;
            };
            match key.trim() {
                "t" if timestamp.is_none() => timestamp = value.trim().parse::<i64>().ok(),
                SCHEME => signatures.push(value.trim()),
                _ => {}
            }
        }
        Self {
            timestamp,
            signatures,
        }
    }
}

fn mac_bytes(secret: &[u8], timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Hex `v1` signature for a payload.
pub fn compute_signature(secret: &str, timestamp: i64, body: &[u8]) -> String {
    hex::encode(mac_bytes(secret.as_bytes(), timestamp, body))
}

/// A complete header value as the provider would send it.
pub fn signature_header(secret: &str, timestamp: i64, body: &[u8]) -> String {
    format!(
        "t={},{}={}",
        timestamp,
        SCHEME,
        compute_signature(secret, timestamp, body)
    )
}
