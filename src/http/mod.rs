//! Authenticated, region-aware JSON HTTP transport.
//!
//! One [`Transport`] is shared for the life of a command. It lazily builds
//! and caches one `reqwest::Client` per region origin (origins share
//! connection pools and TLS session caches; there's no reason to pay
//! client-construction cost per request), retries transient failures with
//! bounded exponential backoff, and refreshes the bearer token once on a
//! first 401.

pub mod link;

use crate::error::{Error, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 2;
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const RETRYABLE_STATUS: [u16; 6] = [408, 429, 500, 502, 503, 504];
const RETRYABLE_METHODS: [Method; 4] = [Method::GET, Method::PUT, Method::DELETE, Method::PATCH];
const RETRY_HEADER: &str = "x-beacon-cli-retry";

/// One query parameter. Scalars become a single key; `Multi` repeats the
/// key once per value, matching the service's array-parameter encoding.
#[derive(Debug, Clone)]
pub enum Param {
    Scalar(String, String),
    Multi(String, Vec<String>),
}

impl Param {
    #[must_use]
    pub fn scalar(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Scalar(key.into(), value.into())
    }

    #[must_use]
    pub fn multi(key: impl Into<String>, values: Vec<String>) -> Self {
        Self::Multi(key.into(), values)
    }
}

fn encode_query(builder: reqwest::RequestBuilder, params: &[Param]) -> reqwest::RequestBuilder {
    let mut pairs = Vec::new();
    for param in params {
        match param {
            Param::Scalar(key, value) => pairs.push((key.clone(), value.clone())),
            Param::Multi(key, values) => {
                for value in values {
                    pairs.push((key.clone(), value.clone()));
                }
            }
        }
    }
    builder.query(&pairs)
}

/// Current bearer credentials. `refresh_token` absent means a manual
/// (non-OAuth) token: a 401 can't be recovered and propagates as-is.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

type RefreshFuture = Pin<Box<dyn Future<Output = Result<Credentials>> + Send>>;

/// Invoked to exchange a refresh token for new credentials. Boxed so
/// `Transport` doesn't need a generic type parameter threaded through
/// every call site.
pub type RefreshFn = Box<dyn Fn(&Credentials) -> RefreshFuture + Send + Sync>;

/// The result of a successful request: status, parsed JSON body, and the
/// next pagination cursor (if the response carried a `Link` header with
/// more results).
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub next_cursor: Option<String>,
}

pub struct Transport {
    clients: Mutex<HashMap<String, reqwest::Client>>,
}

impl Transport {
    #[must_use]
    pub fn new() -> Self {
        Self { clients: Mutex::new(HashMap::new()) }
    }

    fn client_for(&self, base_url: &str) -> reqwest::Client {
        let mut clients = self.clients.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clients
            .entry(base_url.to_string())
            .or_insert_with(|| {
                reqwest::Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .build()
                    .expect("reqwest client config is static and always valid")
            })
            .clone()
    }

    /// Execute one authenticated JSON request against `base_url` + `path`.
    ///
    /// On a first 401, `refresh` is invoked and the request retried once
    /// with the new token (marked via `x-beacon-cli-retry: 1` so the retry
    /// itself is never refreshed again). On {408,429,500,502,503,504} for
    /// GET/PUT/DELETE/PATCH, retries up to twice with exponential backoff
    /// capped at 10s. POST is never auto-retried.
    pub async fn request(
        &self,
        method: Method,
        base_url: &str,
        path: &str,
        params: &[Param],
        credentials: &mut Credentials,
        refresh: &RefreshFn,
    ) -> Result<ApiResponse> {
        let endpoint = format!("{base_url}{path}");
        let client = self.client_for(base_url);

        let mut attempt = 0u32;
        let mut retried_auth = false;

        loop {
            let builder = client.request(method.clone(), &endpoint);
            let builder = encode_query(builder, params);
            let builder = builder.bearer_auth(&credentials.access_token);
            let builder = if retried_auth { builder.header(RETRY_HEADER, "1") } else { builder };

            let response = builder.send().await.map_err(|e| Error::Network(e.to_string()))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !retried_auth {
                match (&credentials.refresh_token, refresh(credentials).await) {
                    (Some(_), Ok(new_creds)) => {
                        *credentials = new_creds;
                        retried_auth = true;
                        continue;
                    }
                    _ => {
                        return Err(Error::Auth { reason: "session expired and no refresh token is available".into() });
                    }
                }
            }

            if !status.is_success() {
                if RETRYABLE_STATUS.contains(&status.as_u16())
                    && RETRYABLE_METHODS.contains(&method)
                    && attempt < MAX_RETRIES
                {
                    let backoff = backoff_for(attempt);
                    tracing::debug!(status = status.as_u16(), attempt, ?backoff, "retrying request");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }

                let detail = extract_detail(response).await;
                return Err(Error::Api { status: status.as_u16(), detail, endpoint });
            }

            let next_cursor = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(link::parse_next);

            let body: Value = response.json().await.unwrap_or(Value::Null);

            return Ok(ApiResponse { status: status.as_u16(), body, next_cursor });
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

fn backoff_for(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt + 1);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

async fn extract_detail(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_ten_seconds() {
        assert_eq!(backoff_for(0), Duration::from_secs(2));
        assert_eq!(backoff_for(1), Duration::from_secs(4));
        assert_eq!(backoff_for(10), MAX_BACKOFF);
    }

    #[test]
    fn encode_query_repeats_multi_valued_params() {
        let client = reqwest::Client::new();
        let builder = client.get("https://example.test/");
        let built = encode_query(builder, &[Param::multi("query", vec!["a".into(), "b".into()])])
            .build()
            .unwrap();
        assert_eq!(built.url().query(), Some("query=a&query=b"));
    }

    #[test]
    fn encode_query_scalar_single_key() {
        let client = reqwest::Client::new();
        let builder = client.get("https://example.test/");
        let built = encode_query(builder, &[Param::scalar("limit", "25")]).build().unwrap();
        assert_eq!(built.url().query(), Some("limit=25"));
    }
}
