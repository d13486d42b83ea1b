//! HTTP-shaped request/response types and the network seam.
//!
//! The engine never talks to the network directly; it goes through the
//! [`Network`] trait so tests can script connectivity and the embedding
//! application can supply its own transport. The outcome of a fetch is an
//! explicit `Result` — an HTTP error status is `Ok`, only a transport-level
//! failure is `Err` — so offline fallback is a plain branch rather than
//! exception interception.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Status code of synthetic "resource unavailable" responses.
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Credentials handling for an intercepted request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    /// Never send credentials.
    Omit,
    /// Send credentials for same-origin requests only.
    #[default]
    SameOrigin,
    /// Always send credentials.
    Include,
}

/// An HTTP-shaped request as issued by the UI/application layer.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Upper-case method verb ("GET", "POST", ...).
    pub method: String,
    /// Absolute URL or origin-relative path.
    pub url: String,
    /// Ordered header pairs.
    pub headers: Vec<(String, String)>,
    /// Opaque body bytes.
    pub body: Bytes,
    /// Credentials mode, preserved across deferral and replay.
    pub credentials: CredentialsMode,
}

impl HttpRequest {
    /// Create a request with an empty body and default credentials.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            credentials: CredentialsMode::default(),
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Shorthand for a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    /// Append a header pair.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replace the credentials mode.
    pub fn with_credentials(mut self, credentials: CredentialsMode) -> Self {
        self.credentials = credentials;
        self
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Path component of the URL, without query or fragment.
    pub fn path(&self) -> &str {
        let raw = match self.url.find("://") {
            Some(scheme_end) => {
                let after = &self.url[scheme_end + 3..];
                match after.find('/') {
                    Some(slash) => &after[slash..],
                    None => "/",
                }
            }
            None => self.url.as_str(),
        };
        match raw.find(['?', '#']) {
            Some(end) => &raw[..end],
            None => raw,
        }
    }

    /// Host component of an absolute URL, without the port.
    pub fn host(&self) -> Option<&str> {
        let scheme_end = self.url.find("://")?;
        let after = &self.url[scheme_end + 3..];
        let end = after.find(['/', '?', '#']).unwrap_or(after.len());
        let authority = &after[..end];
        Some(match authority.find(':') {
            Some(port) => &authority[..port],
            None => authority,
        })
    }

    /// Whether the method is a mutating verb.
    pub fn is_mutation(&self) -> bool {
        matches!(self.method.as_str(), "POST" | "PUT" | "PATCH" | "DELETE")
    }
}

/// An HTTP-shaped response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Ordered header pairs.
    pub headers: Vec<(String, String)>,
    /// Body bytes.
    pub body: Bytes,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A response with the given status and an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// The synthetic "resource unavailable" response: what the caller sees
    /// when a request was queued for later replay or missed the cache while
    /// offline. The UI treats it as pending, not failed.
    pub fn unavailable() -> Self {
        Self::status(SERVICE_UNAVAILABLE)
    }

    /// Append a header pair.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network backend seam.
///
/// Implementations must return `Ok` for any delivered response, including
/// HTTP errors, and `Err` only when the request never reached a server.
#[async_trait]
pub trait Network: Send + Sync {
    /// Deliver a request and await its response.
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Real network backend over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestNetwork {
    client: reqwest::Client,
}

impl ReqwestNetwork {
    /// Create a backend with a fresh client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend over a pre-configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for ReqwestNetwork {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::new(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_strips_origin_and_query() {
        let req = HttpRequest::get("https://example.com/api/document?office=1");
        assert_eq!(req.path(), "/api/document");

        let req = HttpRequest::get("/api/snapshot?office=2#frag");
        assert_eq!(req.path(), "/api/snapshot");

        let req = HttpRequest::get("https://example.com");
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn test_host_without_port() {
        let req = HttpRequest::get("https://lh3.googleusercontent.com/a/photo.png");
        assert_eq!(req.host(), Some("lh3.googleusercontent.com"));

        let req = HttpRequest::get("http://localhost:8080/api/offices");
        assert_eq!(req.host(), Some("localhost"));

        let req = HttpRequest::get("/api/offices");
        assert_eq!(req.host(), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HttpRequest::post("/api/document")
            .with_header("Content-Type", "multipart/form-data; boundary=x");
        assert_eq!(
            req.header("content-type"),
            Some("multipart/form-data; boundary=x")
        );
        assert_eq!(req.header("accept"), None);
    }

    #[test]
    fn test_mutating_verbs() {
        assert!(HttpRequest::post("/api/document").is_mutation());
        assert!(HttpRequest::new("DELETE", "/api/session").is_mutation());
        assert!(!HttpRequest::get("/api/offices").is_mutation());
    }

    #[test]
    fn test_unavailable_response() {
        let res = HttpResponse::unavailable();
        assert_eq!(res.status, SERVICE_UNAVAILABLE);
        assert!(!res.is_success());
    }
}
