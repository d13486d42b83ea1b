//! Push message encryption ("aesgcm" content encoding).
//!
//! Each message gets a fresh ephemeral P-256 keypair and a fresh 16-byte
//! salt. The shared ECDH secret is run through two HKDF-SHA256 stages:
//! first keyed by the subscription's auth secret to produce a pseudo-random
//! key, then keyed by the salt to derive the 16-byte content-encryption key
//! and 12-byte nonce. The JSON payload is prefixed with two zero padding
//! bytes and sealed with AES-128-GCM.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use base64::Engine;
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::RngCore;
use sha2::Sha256;

use super::{PushSubscriptionRecord, VapidKeys};
use crate::error::PushError;
use crate::http::HttpRequest;
use crate::model::NotificationPayload;

const WEB_PUSH_INFO: &[u8] = b"WebPush: info\0";
const CEK_INFO_PREFIX: &[u8] = b"Content-Encoding: aesgcm\0P-256\0";
const NONCE_INFO_PREFIX: &[u8] = b"Content-Encoding: nonce\0P-256\0";
const SALT_LEN: usize = 16;
const CEK_LEN: usize = 16;
const NONCE_LEN: usize = 12;
// two zero bytes: a zero-length pad and its 2-byte big-endian length
const PAD_PREFIX: [u8; 2] = [0, 0];

/// Encodes notification payloads into authorized, encrypted push requests.
pub struct PushCodec {
    keys: VapidKeys,
    contact: String,
    ttl_seconds: u32,
}

impl PushCodec {
    /// Build a codec around the server's push identity.
    pub fn new(keys: VapidKeys, contact: impl Into<String>, ttl_seconds: u32) -> Self {
        Self {
            keys,
            contact: contact.into(),
            ttl_seconds,
        }
    }

    /// Encrypt `payload` for one subscriber and assemble the relay request,
    /// headers included. Every call draws a fresh salt and ephemeral key.
    pub fn encode(
        &self,
        subscription: &PushSubscriptionRecord,
        payload: &NotificationPayload,
    ) -> Result<HttpRequest, PushError> {
        subscription.validate()?;

        let receiver = PublicKey::from_sec1_bytes(&subscription.p256dh).map_err(|e| {
            PushError::CryptoPrecondition(format!("receiver key is not on the curve: {e}"))
        })?;

        let ephemeral = EphemeralSecret::random(&mut OsRng);
        let ephemeral_public = ephemeral.public_key().to_encoded_point(false);
        let shared = ephemeral.diffie_hellman(&receiver);

        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);

        // stage one: auth secret keys the extract, "WebPush: info" plus
        // both raw public keys expands
        let (_, hkdf_auth) = Hkdf::<Sha256>::extract(
            Some(&subscription.auth),
            shared.raw_secret_bytes().as_slice(),
        );
        let mut ikm_info = WEB_PUSH_INFO.to_vec();
        ikm_info.extend_from_slice(&subscription.p256dh);
        ikm_info.extend_from_slice(ephemeral_public.as_bytes());
        let mut prk = [0u8; 32];
        hkdf_auth
            .expand(&ikm_info, &mut prk)
            .map_err(|e| PushError::Encrypt(format!("prk derivation failed: {e}")))?;

        // stage two: salt keys the extract, key context expands cek and nonce
        let context = key_context(&subscription.p256dh, ephemeral_public.as_bytes());
        let (_, hkdf_salt) = Hkdf::<Sha256>::extract(Some(&salt), &prk);

        let mut cek_info = CEK_INFO_PREFIX.to_vec();
        cek_info.extend_from_slice(&context);
        let mut cek = [0u8; CEK_LEN];
        hkdf_salt
            .expand(&cek_info, &mut cek)
            .map_err(|e| PushError::Encrypt(format!("cek derivation failed: {e}")))?;

        let mut nonce_info = NONCE_INFO_PREFIX.to_vec();
        nonce_info.extend_from_slice(&context);
        let mut nonce = [0u8; NONCE_LEN];
        hkdf_salt
            .expand(&nonce_info, &mut nonce)
            .map_err(|e| PushError::Encrypt(format!("nonce derivation failed: {e}")))?;

        let mut plaintext = PAD_PREFIX.to_vec();
        plaintext.extend_from_slice(&serde_json::to_vec(payload)?);

        let cipher = Aes128Gcm::new_from_slice(&cek)
            .map_err(|e| PushError::Encrypt(format!("cek rejected: {e}")))?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: &[],
                },
            )
            .map_err(|e| PushError::Encrypt(format!("aead sealing failed: {e}")))?;

        let audience = endpoint_origin(&subscription.endpoint)?;
        let authorization = self.keys.authorization(&audience, &self.contact)?;
        let server_key = self.keys.public_key_bytes()?;

        Ok(HttpRequest::post(&subscription.endpoint)
            .with_header("Authorization", &authorization)
            .with_header(
                "Crypto-Key",
                &format!(
                    "dh={}; p256ecdsa={}",
                    BASE64URL.encode(ephemeral_public.as_bytes()),
                    BASE64URL.encode(&server_key),
                ),
            )
            .with_header("Encryption", &format!("salt={}", BASE64URL.encode(salt)))
            .with_header("Content-Encoding", "aesgcm")
            .with_header("Content-Type", "application/octet-stream")
            .with_header("TTL", &self.ttl_seconds.to_string())
            .with_body(ciphertext))
    }
}

/// HKDF info context binding the derivation to both parties' keys, each
/// prefixed with its length as a 16-bit big-endian integer. The curve
/// label already terminates the cek/nonce info prefixes.
fn key_context(receiver_key: &[u8], sender_key: &[u8]) -> Vec<u8> {
    let mut context = Vec::with_capacity(2 + receiver_key.len() + 2 + sender_key.len());
    context.extend_from_slice(&(receiver_key.len() as u16).to_be_bytes());
    context.extend_from_slice(receiver_key);
    context.extend_from_slice(&(sender_key.len() as u16).to_be_bytes());
    context.extend_from_slice(sender_key);
    context
}

/// Origin of the push endpoint, for the authorization token's `aud` claim.
fn endpoint_origin(endpoint: &str) -> Result<String, PushError> {
    let url = reqwest::Url::parse(endpoint).map_err(|e| PushError::Endpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    let host = url.host_str().ok_or_else(|| PushError::Endpoint {
        endpoint: endpoint.to_string(),
        reason: "no host".to_string(),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use chrono::Utc;
    use p256::SecretKey;

    fn subscription() -> PushSubscriptionRecord {
        let secret = SecretKey::random(&mut OsRng);
        let point = secret.public_key().to_encoded_point(false);
        PushSubscriptionRecord {
            endpoint: "https://push.example.com:8443/send/abc".to_string(),
            auth: vec![9u8; 16],
            p256dh: point.as_bytes().to_vec(),
            expiration: None,
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload {
            title: "Budget Proposal".to_string(),
            creation: Utc::now(),
            evaluator: "Alice".to_string(),
            target: Some("Registrar".to_string()),
            status: Status::Send,
        }
    }

    fn codec() -> PushCodec {
        PushCodec::new(VapidKeys::generate(), "mailto:ops@example.com", 10)
    }

    #[test]
    fn test_request_shape() {
        let request = codec().encode(&subscription(), &payload()).unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://push.example.com:8443/send/abc");
        assert_eq!(request.header("Content-Encoding"), Some("aesgcm"));
        assert_eq!(request.header("TTL"), Some("10"));
        assert!(request
            .header("Authorization")
            .unwrap()
            .starts_with("WebPush "));

        let crypto_key = request.header("Crypto-Key").unwrap();
        assert!(crypto_key.starts_with("dh="));
        assert!(crypto_key.contains("; p256ecdsa="));

        let salt_param = request.header("Encryption").unwrap();
        let salt = BASE64URL
            .decode(salt_param.strip_prefix("salt=").unwrap())
            .unwrap();
        assert_eq!(salt.len(), SALT_LEN);

        // ciphertext is never the raw payload
        let raw = serde_json::to_vec(&payload()).unwrap();
        assert_ne!(request.body.as_ref(), raw.as_slice());
    }

    #[test]
    fn test_fresh_material_every_message() {
        let codec = codec();
        let subscription = subscription();
        let payload = payload();

        let a = codec.encode(&subscription, &payload).unwrap();
        let b = codec.encode(&subscription, &payload).unwrap();

        assert_ne!(a.header("Encryption"), b.header("Encryption"));
        assert_ne!(a.header("Crypto-Key"), b.header("Crypto-Key"));
        assert_ne!(a.body, b.body);
    }

    #[test]
    fn test_bad_subscription_rejected_before_encoding() {
        let mut bad = subscription();
        bad.auth.clear();
        assert!(matches!(
            codec().encode(&bad, &payload()),
            Err(PushError::CryptoPrecondition(_))
        ));
    }

    #[test]
    fn test_key_context_is_length_prefixed_keys_only() {
        // the curve label lives in the info prefixes; the context itself
        // is exactly len(receiver) || receiver || len(sender) || sender
        let receiver = [0x04u8; 65];
        let sender = [0x05u8; 65];
        let context = key_context(&receiver, &sender);

        assert_eq!(context.len(), 2 + 65 + 2 + 65);
        assert_eq!(&context[..2], &65u16.to_be_bytes());
        assert_eq!(&context[2..67], receiver.as_slice());
        assert_eq!(&context[67..69], &65u16.to_be_bytes());
        assert_eq!(&context[69..], sender.as_slice());
    }

    #[test]
    fn test_audience_is_endpoint_origin() {
        assert_eq!(
            endpoint_origin("https://push.example.com/send/abc").unwrap(),
            "https://push.example.com"
        );
        assert_eq!(
            endpoint_origin("https://push.example.com:8443/send/abc").unwrap(),
            "https://push.example.com:8443"
        );
        assert!(endpoint_origin("not a url").is_err());
    }
}
