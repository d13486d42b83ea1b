//! Server-side web push: subscription records, VAPID authorization,
//! RFC 8291 message encryption, and relay delivery.

mod codec;
mod deliver;
mod vapid;

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use codec::PushCodec;
pub use deliver::{deliver, Delivery};
pub use vapid::VapidKeys;

use crate::error::PushError;

/// Uncompressed SEC1 P-256 point length.
const P256_POINT_LEN: usize = 65;

/// A push subscription as submitted by the browser, with base64url-encoded
/// key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscriptionJson {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// When the subscription lapses, if the push service reports one.
    pub expiration: Option<DateTime<Utc>>,
    /// Shared auth secret (base64url).
    pub auth: String,
    /// Subscriber's P-256 ECDH public key (base64url).
    pub p256dh: String,
}

/// Decoded subscription record owned by the server.
#[derive(Debug, Clone)]
pub struct PushSubscriptionRecord {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Shared auth secret bytes.
    pub auth: Vec<u8>,
    /// Subscriber public key: uncompressed SEC1 P-256 point (65 bytes).
    pub p256dh: Vec<u8>,
    /// When the subscription lapses, if known.
    pub expiration: Option<DateTime<Utc>>,
}

impl PushSubscriptionRecord {
    /// Decode a browser-submitted subscription, validating key material.
    pub fn from_json(json: &PushSubscriptionJson) -> Result<Self, PushError> {
        let auth = BASE64URL.decode(&json.auth).map_err(|e| {
            PushError::CryptoPrecondition(format!("auth secret is not base64url: {e}"))
        })?;
        let p256dh = BASE64URL.decode(&json.p256dh).map_err(|e| {
            PushError::CryptoPrecondition(format!("receiver key is not base64url: {e}"))
        })?;

        let record = Self {
            endpoint: json.endpoint.clone(),
            auth,
            p256dh,
            expiration: json.expiration,
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the key-material preconditions. Runs before any network
    /// traffic; a failing subscription is rejected, never silently skipped.
    pub fn validate(&self) -> Result<(), PushError> {
        if self.auth.is_empty() {
            return Err(PushError::CryptoPrecondition(
                "subscription has no auth secret".to_string(),
            ));
        }
        if self.p256dh.len() != P256_POINT_LEN || self.p256dh[0] != 0x04 {
            return Err(PushError::CryptoPrecondition(format!(
                "receiver key must be a {P256_POINT_LEN}-byte uncompressed P-256 point, got {} bytes",
                self.p256dh.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_rejects_missing_key_material() {
        let json = PushSubscriptionJson {
            endpoint: "https://push.example.com/sub/1".to_string(),
            expiration: None,
            auth: String::new(),
            p256dh: BASE64URL.encode([0x04; 65]),
        };
        let err = PushSubscriptionRecord::from_json(&json).unwrap_err();
        assert!(matches!(err, PushError::CryptoPrecondition(_)));
    }

    #[test]
    fn test_from_json_rejects_compressed_point() {
        let json = PushSubscriptionJson {
            endpoint: "https://push.example.com/sub/1".to_string(),
            expiration: None,
            auth: BASE64URL.encode([7u8; 16]),
            p256dh: BASE64URL.encode([0x02; 33]),
        };
        let err = PushSubscriptionRecord::from_json(&json).unwrap_err();
        assert!(matches!(err, PushError::CryptoPrecondition(_)));
    }
}
