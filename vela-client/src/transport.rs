//! Transport - Injected HTTP execution seam
//!
//! The adapter never talks to the network directly; it hands a prepared
//! request to a `Transport`. The reqwest implementation attaches
//! authentication and TLS settings; credentials stay inside it and are
//! never logged or echoed.

use async_trait::async_trait;
use url::Url;

use crate::error::ApiError;

/// Authentication material forwarded opaquely to the server
#[derive(Clone)]
pub enum Credentials {
    Basic { username: String, password: String },
    ApiKey(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"********")
                .finish(),
            Credentials::ApiKey(_) => f.debug_tuple("ApiKey").field(&"********").finish(),
        }
    }
}

/// HTTP verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// Verbs safe to retry after an ambiguous failure
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Verb::Get | Verb::Put | Verb::Delete)
    }
}

/// A prepared request, ready for a transport
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub verb: Verb,
    pub url: Url,
    pub body: Option<serde_json::Value>,
    pub if_match: Option<String>,
}

/// The raw outcome of one exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub retry_after: Option<u64>,
    pub body: String,
}

/// Injected HTTP execution
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentials: Credentials,
}

impl ReqwestTransport {
    pub fn new(credentials: Credentials, validate_certs: bool) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vela/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!validate_certs)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let method = match request.verb {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Put => reqwest::Method::PUT,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.url.clone());

        builder = match &self.credentials {
            Credentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            Credentials::ApiKey(key) => builder.header("X-ntnx-api-key", key),
        };

        if let Some(etag) = &request.if_match {
            builder = builder.header("If-Match", etag);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(verb = request.verb.as_str(), url = %request.url, "api request");

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(RawResponse {
            status,
            etag,
            retry_after,
            body,
        })
    }
}
