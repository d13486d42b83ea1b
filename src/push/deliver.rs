//! Relay delivery for encoded push requests.

use reqwest::Client;

use crate::error::PushError;
use crate::http::HttpRequest;

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The relay accepted the message for forwarding.
    Accepted,
    /// The relay answered 410 Gone. The subscription is dead and should be
    /// dropped from the server's records.
    SubscriptionExpired,
}

/// Deliver one encoded push request to its relay.
pub async fn deliver(client: &Client, request: &HttpRequest) -> Result<Delivery, PushError> {
    let mut builder = client.post(&request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder
        .body(request.body.clone())
        .send()
        .await
        .map_err(|e| PushError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    match status {
        200..=299 => Ok(Delivery::Accepted),
        410 => {
            log::info!("[WebPush] subscription at {} has expired", request.url);
            Ok(Delivery::SubscriptionExpired)
        }
        429 => {
            log::warn!("[WebPush] relay at {} is rate limiting", request.url);
            Err(PushError::Relay { status })
        }
        _ => Err(PushError::Relay { status }),
    }
}
