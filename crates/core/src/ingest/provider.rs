use crate::config::Settings;
use crate::domain::city::CityConfig;
use crate::domain::weather::WeatherObservation;
use crate::ingest::error::FetchError;
use crate::time::offset::TimezoneInfo;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

#[async_trait::async_trait]
pub trait WeatherSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_weather(&self, city: &CityConfig) -> Result<WeatherObservation>;
}

#[async_trait::async_trait]
pub trait FxSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Current USD -> `currency` rate.
    async fn fetch_rate(&self, currency: &str) -> Result<f64>;
}

#[async_trait::async_trait]
pub trait TimezoneSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_timezone(&self, timezone: &str, reference_zone: &str) -> Result<TimezoneInfo>;
}

/// Fixed-delay retry: `attempts` tries in total, no backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            attempts: settings.provider_retries.max(1),
            delay: settings.provider_retry_delay,
        }
    }

    /// Runs `op` until it succeeds, fails structurally, or the bound is hit.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> std::result::Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, FetchError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    if attempt >= attempts {
                        return Err(FetchError::exhausted(attempt, err));
                    }
                    tracing::warn!(
                        provider = err.provider,
                        attempt,
                        delay = ?self.delay,
                        error = %err,
                        "provider fetch failed; retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build provider http client")
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// One GET returning the body as JSON. Every failure here is transient.
pub(crate) async fn get_json(
    http: &reqwest::Client,
    provider: &'static str,
    url: &str,
    query: &[(&str, String)],
) -> std::result::Result<Value, FetchError> {
    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| FetchError::transient(provider, format!("request failed: {e}")))?;

    let status = res.status();
    let text = res
        .text()
        .await
        .map_err(|e| FetchError::transient(provider, format!("failed to read response: {e}")))?;

    if !status.is_success() {
        return Err(FetchError::transient(provider, format!("HTTP {status}: {text}")));
    }

    serde_json::from_str::<Value>(&text)
        .map_err(|e| FetchError::transient(provider, format!("response is not valid JSON: {e}")))
}

/// Maps decoded JSON onto the expected payload; a mismatch is structural.
pub(crate) fn decode<T: DeserializeOwned>(
    provider: &'static str,
    raw: Value,
) -> std::result::Result<T, FetchError> {
    serde_json::from_value::<T>(raw)
        .map_err(|e| FetchError::structural(provider, format!("payload shape mismatch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::error::FetchErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let res = quick(3)
            .run(move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(FetchError::transient("test", "boom"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(res.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_is_reported_with_attempt_count() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = quick(3)
            .run(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FetchError::transient("test", "down"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.kind, FetchErrorKind::RetriesExhausted { attempts: 3 });
        assert_eq!(err.to_string(), "test failed after 3 attempts: down");
    }

    #[tokio::test]
    async fn structural_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = quick(3)
            .run(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FetchError::structural("test", "missing field"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind, FetchErrorKind::Structural);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let _ = quick(0)
            .run(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FetchError::transient("test", "x"))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn joins_urls_without_double_slashes() {
        assert_eq!(join_url("http://h/", "/v1/x"), "http://h/v1/x");
        assert_eq!(join_url("http://h", "v1/x"), "http://h/v1/x");
    }
}
