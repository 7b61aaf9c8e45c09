//! Outbound HTTP with bounded timeouts.
//!
//! Every inter-process call goes through `PeerClient`: each attempt carries a timeout,
//! idempotent requests are retried with jittered exponential backoff, and exhausted
//! retries surface as `ServiceError::Unavailable` rather than hanging the caller.

use crate::error::{ErrorBody, ServiceError, ServiceResult};

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_ATTEMPTS: usize = 3;
const INITIAL_DELAY_MS: u64 = 150;
const MAX_DELAY_MS: u64 = 1200;

#[derive(Clone)]
pub struct PeerClient {
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
            attempts: DEFAULT_ATTEMPTS,
        }
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get_with_retry(&self, url: &str) -> ServiceResult<reqwest::Response> {
        self.send_with_retry(url, self.attempts, || self.http_client.get(url))
            .await
    }

    /// Single attempt; the caller bounds the total wait itself.
    pub async fn post_once<T: Serialize>(
        &self,
        url: &str,
        payload: &T,
    ) -> ServiceResult<reqwest::Response> {
        self.send_with_retry(url, 1, || self.http_client.post(url).json(payload))
            .await
    }

    /// Single attempt; used for mutations that must not be applied twice.
    pub async fn put_once(&self, url: &str) -> ServiceResult<reqwest::Response> {
        self.send_with_retry(url, 1, || self.http_client.put(url))
            .await
    }

    /// Single attempt; used for mutations that must not be applied twice.
    pub async fn delete_once(&self, url: &str) -> ServiceResult<reqwest::Response> {
        self.send_with_retry(url, 1, || self.http_client.delete(url))
            .await
    }

    async fn send_with_retry<F>(
        &self,
        url: &str,
        attempts: usize,
        build: F,
    ) -> ServiceResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut delay_ms = INITIAL_DELAY_MS;

        for attempt in 0..attempts {
            match build().timeout(self.timeout).send().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        tracing::warn!(
                            "Request to {} failed after {} attempt(s): {}",
                            url,
                            attempts,
                            e
                        );
                        return Err(ServiceError::Unavailable(format!("{}: {}", url, e)));
                    }
                    // Simple jitter to prevent thundering herd
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
                }
            }
        }

        Err(ServiceError::Unavailable(format!(
            "{}: retry attempts exhausted",
            url
        )))
    }
}

/// Decodes a successful JSON body, or rebuilds the `ServiceError` the peer reported.
pub async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ServiceResult<T> {
    let response = ensure_success(response).await?;
    let body = response
        .json::<T>()
        .await
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Malformed peer response: {}", e)))?;
    Ok(body)
}

/// Passes successful responses through and converts error responses.
pub async fn ensure_success(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = read_error_body(response).await.unwrap_or_else(|e| ErrorBody {
        kind: String::new(),
        message: e.to_string(),
        subjects: vec![],
    });

    Err(ServiceError::from_wire(status, body))
}

async fn read_error_body(response: reqwest::Response) -> Result<ErrorBody> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text).unwrap_or(ErrorBody {
        kind: String::new(),
        message: text,
        subjects: vec![],
    }))
}

/// Escapes one URL path segment. Node ids are opaque strings.
pub fn segment(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
