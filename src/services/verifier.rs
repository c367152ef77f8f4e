//! Webhook signature verification (Svix scheme, as used by Clerk).
//!
//! Signed content is `{svix-id}.{svix-timestamp}.{raw body}`, signed with
//! HMAC-SHA256 under the base64 key that follows the `whsec_` prefix of the
//! shared secret. `svix-signature` carries one or more space separated
//! `v1,<base64 signature>` entries; any match authenticates the request.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{ConfigError, VerificationError};
use crate::models::InboundEvent;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ID: &str = "svix-id";
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
pub const HEADER_SIGNATURE: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// The three signature headers, all present and non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub id: String,
    pub timestamp: String,
    pub signature: String,
}

impl SignatureHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            id: get(HEADER_ID)?,
            timestamp: get(HEADER_TIMESTAMP)?,
            signature: get(HEADER_SIGNATURE)?,
        })
    }
}

/// Authenticates a webhook request and yields the event it carries.
pub trait WebhookVerifier: Send + Sync {
    fn verify(&self, body: &[u8], headers: &SignatureHeaders) -> Result<InboundEvent, VerificationError>;
}

pub struct SvixVerifier {
    mac: HmacSha256,
    tolerance_secs: i64,
}

impl SvixVerifier {
    pub fn new(secret: &str, tolerance_secs: i64) -> Result<Self, ConfigError> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        let key = BASE64.decode(encoded).map_err(|e| ConfigError::Invalid {
            name: "CLERK_WEBHOOK_SECRET",
            reason: format!("secret is not valid base64: {}", e),
        })?;
        if key.is_empty() {
            return Err(ConfigError::Invalid {
                name: "CLERK_WEBHOOK_SECRET",
                reason: "secret decodes to an empty key".to_string(),
            });
        }
        let mac = <HmacSha256 as Mac>::new_from_slice(&key).map_err(|e| ConfigError::Invalid {
            name: "CLERK_WEBHOOK_SECRET",
            reason: format!("secret is not a usable HMAC key: {}", e),
        })?;
        Ok(Self { mac, tolerance_secs })
    }

    /// Signature entry (`v1,<base64>`) for the given message.
    pub fn sign(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> String {
        let raw = self.compute(msg_id, &timestamp.to_string(), body);
        format!("{},{}", SIGNATURE_VERSION, BASE64.encode(raw))
    }

    fn compute(&self, msg_id: &str, timestamp: &str, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }

    fn check_timestamp(&self, timestamp: &str) -> Result<(), VerificationError> {
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| VerificationError::InvalidTimestamp)?;
        let now = Utc::now().timestamp();
        let tolerance = self.tolerance_secs.unsigned_abs();
        if ts <= now {
            if now.abs_diff(ts) > tolerance {
                return Err(VerificationError::TimestampTooOld);
            }
        } else if ts.abs_diff(now) > tolerance {
            return Err(VerificationError::TimestampTooNew);
        }
        Ok(())
    }
}

impl WebhookVerifier for SvixVerifier {
    fn verify(&self, body: &[u8], headers: &SignatureHeaders) -> Result<InboundEvent, VerificationError> {
        self.check_timestamp(&headers.timestamp)?;

        let expected = BASE64.encode(self.compute(&headers.id, &headers.timestamp, body));
        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .any(|(_, sig)| bool::from(sig.as_bytes().ct_eq(expected.as_bytes())));

        if !matched {
            return Err(VerificationError::NoMatchingSignature);
        }

        InboundEvent::from_json(body)
    }
}
