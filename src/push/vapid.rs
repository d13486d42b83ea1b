//! VAPID key management and request authorization (RFC 8292).
//!
//! The server identifies itself to push services with an ES256-signed JWT
//! scoped to the push endpoint's origin. Keys are P-256 and serialized
//! base64url so they can live in the agent config file and be handed to
//! the browser as the `applicationServerKey`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use base64::Engine;
use chrono::Utc;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::PushError;

const JWT_HEADER: &str = r#"{"typ":"JWT","alg":"ES256"}"#;

/// JWT lifetime. Push services cap acceptance at 24 hours.
const TOKEN_LIFETIME_SECS: i64 = 12 * 3600;

/// VAPID signing keypair, stored base64url.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VapidKeys {
    /// P-256 scalar (32 bytes, base64url).
    pub private_key: String,
    /// Uncompressed SEC1 public point (65 bytes, base64url).
    pub public_key: String,
}

impl VapidKeys {
    /// Generate a fresh keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self {
            private_key: BASE64URL.encode(secret.to_bytes()),
            public_key: BASE64URL.encode(public.to_encoded_point(false).as_bytes()),
        }
    }

    /// Rebuild keys from their base64url encodings, validating both halves.
    pub fn from_base64url(private_key: &str, public_key: &str) -> Result<Self, PushError> {
        let keys = Self {
            private_key: private_key.to_string(),
            public_key: public_key.to_string(),
        };
        keys.signing_key()?;
        keys.public_key_bytes()?;
        Ok(keys)
    }

    /// Public key bytes for the `p256ecdsa` header parameter and the
    /// browser's `applicationServerKey`.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, PushError> {
        let bytes = BASE64URL
            .decode(&self.public_key)
            .map_err(|e| PushError::InvalidKey(format!("public key is not base64url: {e}")))?;
        if bytes.len() != 65 || bytes[0] != 0x04 {
            return Err(PushError::InvalidKey(
                "public key must be a 65-byte uncompressed P-256 point".to_string(),
            ));
        }
        PublicKey::from_sec1_bytes(&bytes)
            .map_err(|e| PushError::InvalidKey(format!("public key is not on the curve: {e}")))?;
        Ok(bytes)
    }

    /// The public key as base64url, as handed to subscribing browsers.
    pub fn public_key_base64url(&self) -> &str {
        &self.public_key
    }

    fn signing_key(&self) -> Result<SigningKey, PushError> {
        let bytes = BASE64URL
            .decode(&self.private_key)
            .map_err(|e| PushError::InvalidKey(format!("private key is not base64url: {e}")))?;
        if bytes.len() != 32 {
            return Err(PushError::InvalidKey(
                "private key must be a 32-byte P-256 scalar".to_string(),
            ));
        }
        SigningKey::from_slice(&bytes)
            .map_err(|e| PushError::InvalidKey(format!("private key is invalid: {e}")))
    }

    /// Build the `Authorization` header value for one push request.
    ///
    /// `audience` is the push endpoint's origin, `subject` a contact URI
    /// such as `mailto:ops@example.com`.
    pub fn authorization(&self, audience: &str, subject: &str) -> Result<String, PushError> {
        let claims = json!({
            "aud": audience,
            "sub": subject,
            "exp": Utc::now().timestamp() + TOKEN_LIFETIME_SECS,
        });
        let signing_input = format!(
            "{}.{}",
            BASE64URL.encode(JWT_HEADER.as_bytes()),
            BASE64URL.encode(claims.to_string().as_bytes()),
        );

        let key = self.signing_key()?;
        // raw r || s per JWS, not DER
        let signature: Signature = key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| PushError::Sign(e.to_string()))?;
        let token = format!(
            "{signing_input}.{}",
            BASE64URL.encode(signature.to_bytes())
        );
        Ok(format!("WebPush {token}"))
    }
}
