//! HTTP terminology client
//!
//! Fetches grouper records from `GET {base_url}/groupers/{condition}`.
//! Transport failures and 5xx replies are retried with exponential backoff;
//! everything else is returned to the resolver as-is.

use super::{GrouperRecord, TerminologyLookup};
use crate::config::{RetryConfig, SecretString, TerminologyConfig};
use crate::domain::{ConditionId, LookupError, RefinerError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;
use url::Url;

/// Grouper service client
pub struct HttpTerminologyClient {
    base_url: Url,
    client: Client,
    api_key: Option<SecretString>,
    retry: RetryConfig,
}

impl HttpTerminologyClient {
    /// Creates a client from terminology configuration
    ///
    /// # Errors
    ///
    /// Returns [`RefinerError::Configuration`] if the base URL cannot be
    /// parsed or the HTTP client cannot be built.
    pub fn new(config: &TerminologyConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            RefinerError::Configuration(format!(
                "Invalid terminology base_url '{}': {}",
                config.base_url, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RefinerError::Configuration(format!(
                "Terminology base_url '{}' cannot be used as a base URL",
                config.base_url
            )));
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)))
            .build()
            .map_err(|e| {
                RefinerError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url,
            client,
            api_key: config.api_key.clone(),
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn grouper_url(&self, condition: &ConditionId) -> std::result::Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                LookupError::Unavailable(format!("invalid base URL {}", self.base_url))
            })?
            .pop_if_empty()
            .push("groupers")
            .push(condition.as_str());
        Ok(url)
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay =
            self.retry.initial_delay_ms as f64 * self.retry.backoff_multiplier.powi(exponent);
        let delay_ms = if delay.is_finite() {
            (delay as u64).min(self.retry.max_delay_ms)
        } else {
            self.retry.max_delay_ms
        };
        Duration::from_millis(delay_ms)
    }

    /// Retries connection failures with exponential backoff
    async fn retry_request<F, T, Fut>(&self, operation: F) -> std::result::Result<T, LookupError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, LookupError>>,
    {
        let max_retries = self.retry.max_retries.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e @ LookupError::Connection(_)) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(e);
                    }

                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        attempt = attempt,
                        max_retries = max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying grouper lookup after error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch(
        &self,
        url: &Url,
        condition: &ConditionId,
    ) -> std::result::Result<GrouperRecord, LookupError> {
        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/json");
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key.expose_secret().as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| LookupError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let mut record: GrouperRecord = response.json().await.map_err(|e| {
                LookupError::InvalidResponse(format!(
                    "grouper for {condition} could not be decoded: {e}"
                ))
            })?;
            if record.condition.trim().is_empty() {
                record.condition = condition.to_string();
            }
            return Ok(record);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => LookupError::NotFound(condition.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LookupError::Unavailable(
                format!("terminology service rejected credentials ({status})"),
            ),
            StatusCode::TOO_MANY_REQUESTS => {
                LookupError::Connection(format!("rate limited ({status})"))
            }
            s if s.is_server_error() => {
                LookupError::Connection(format!("server error {s}: {body}"))
            }
            s => LookupError::InvalidResponse(format!("unexpected status {s}: {body}")),
        })
    }
}

#[async_trait]
impl TerminologyLookup for HttpTerminologyClient {
    async fn lookup_grouper(
        &self,
        condition: &ConditionId,
    ) -> std::result::Result<GrouperRecord, LookupError> {
        let url = self.grouper_url(condition)?;
        tracing::debug!(condition = %condition, url = %url, "Fetching grouper");
        self.retry_request(|| self.fetch(&url, condition)).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
