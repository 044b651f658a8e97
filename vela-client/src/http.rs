//! HTTP adapter - classified, retried access to the API
//!
//! Wraps an injected transport with URL assembly, JSON parsing, status
//! classification, ETag capture and bounded retries. The ETag response
//! header is stashed into the parsed body under the synthetic `_etag`
//! key so callers can read it without a second round-trip.

use std::time::Duration;

use serde_json::Value as Json;
use url::Url;

use crate::deadline::Deadline;
use crate::error::ApiError;
use crate::transport::{ApiRequest, RawResponse, Transport, Verb};

/// Synthetic body key holding the captured ETag
pub const ETAG_KEY: &str = "_etag";

/// Synthetic body key holding a non-JSON 2xx response body
pub const RAW_BODY_KEY: &str = "_raw";

/// Bounded exponential retry for idempotent verbs
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// API client adapter over an injected transport
pub struct ApiClient {
    transport: Box<dyn Transport>,
    base: Url,
    deadline: Deadline,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(transport: Box<dyn Transport>, base: Url, deadline: Deadline) -> Self {
        Self {
            transport,
            base,
            deadline,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Json, ApiError> {
        self.request(Verb::Get, path, query, None, None).await
    }

    pub async fn post(&self, path: &str, body: &Json) -> Result<Json, ApiError> {
        self.request(Verb::Post, path, &[], Some(body), None).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: &Json,
        if_match: Option<&str>,
    ) -> Result<Json, ApiError> {
        self.request(Verb::Put, path, &[], Some(body), if_match)
            .await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: &Json,
        if_match: Option<&str>,
    ) -> Result<Json, ApiError> {
        self.request(Verb::Patch, path, &[], Some(body), if_match)
            .await
    }

    pub async fn delete(&self, path: &str, if_match: Option<&str>) -> Result<Json, ApiError> {
        self.request(Verb::Delete, path, &[], None, if_match).await
    }

    fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| ApiError::Url(e.to_string()))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn request(
        &self,
        verb: Verb,
        path: &str,
        query: &[(String, String)],
        body: Option<&Json>,
        if_match: Option<&str>,
    ) -> Result<Json, ApiError> {
        let request = ApiRequest {
            verb,
            url: self.url_for(path, query)?,
            body: body.cloned(),
            if_match: if_match.map(str::to_string),
        };

        let mut attempt = 0u32;
        let mut delay = self.retry.base_delay;

        loop {
            attempt += 1;
            if self.deadline.expired() {
                return Err(ApiError::DeadlineExceeded);
            }

            // the deadline bounds the in-flight exchange too, not just
            // the gaps between attempts
            let exchange = tokio::time::timeout(
                self.deadline.remaining(),
                self.transport.execute(&request),
            );
            let outcome = match exchange.await {
                Ok(Ok(raw)) => classify(raw),
                Ok(Err(err)) => Err(err),
                Err(_) => return Err(ApiError::DeadlineExceeded),
            };

            let err = match outcome {
                Ok(parsed) => return Ok(parsed),
                Err(err) => err,
            };

            let may_retry =
                verb.is_idempotent() && err.is_retryable() && attempt < self.retry.max_attempts;
            if !may_retry {
                return Err(err);
            }

            let wait = match &err {
                ApiError::RateLimited {
                    retry_after: Some(seconds),
                    ..
                } => Duration::from_secs(*seconds),
                _ => delay,
            };
            if !self.deadline.allows(wait) {
                return Err(err);
            }

            tracing::debug!(
                verb = verb.as_str(),
                path,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "retrying after {err}"
            );
            tokio::time::sleep(wait).await;
            delay = (delay * 2).min(self.retry.max_delay);
        }
    }
}

/// Map a raw response to a parsed body or a classified error
fn classify(raw: RawResponse) -> Result<Json, ApiError> {
    let body = parse_body(&raw);

    match raw.status {
        200..=299 => Ok(stash_etag(body, raw.etag)),
        401 | 403 => Err(ApiError::Auth {
            status: raw.status,
            body,
        }),
        404 => Err(ApiError::NotFound { body }),
        409 | 412 => Err(ApiError::Conflict {
            status: raw.status,
            body,
        }),
        429 => Err(ApiError::RateLimited {
            retry_after: raw.retry_after,
            body,
        }),
        400 | 422 => Err(ApiError::Validation {
            status: raw.status,
            body,
        }),
        status => Err(ApiError::Server { status, body }),
    }
}

fn parse_body(raw: &RawResponse) -> Json {
    if raw.body.is_empty() {
        return Json::Null;
    }
    match serde_json::from_str(&raw.body) {
        Ok(parsed) => parsed,
        Err(_) => serde_json::json!({ RAW_BODY_KEY: raw.body }),
    }
}

fn stash_etag(body: Json, etag: Option<String>) -> Json {
    let Some(etag) = etag else {
        return body;
    };
    match body {
        Json::Object(mut map) => {
            map.insert(ETAG_KEY.to_string(), Json::String(etag));
            Json::Object(map)
        }
        Json::Null => serde_json::json!({ ETAG_KEY: etag }),
        other => other,
    }
}
