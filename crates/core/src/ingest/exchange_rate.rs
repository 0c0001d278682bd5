use crate::config::Settings;
use crate::ingest::error::FetchError;
use crate::ingest::provider::{decode, get_json, join_url, FxSource, RetryPolicy};
use crate::ingest::types::LatestRatesResponse;
use anyhow::Result;

const PROVIDER: &str = "exchange-rate";
const LATEST_USD_PATH: &str = "/v6/latest/USD";

/// Latest USD quotes from open.er-api.com.
#[derive(Debug, Clone)]
pub struct ExchangeRateClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ExchangeRateClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            retry,
        }
    }

    pub fn from_settings(http: reqwest::Client, settings: &Settings) -> Self {
        Self::new(
            http,
            settings.fx_base_url.clone(),
            RetryPolicy::from_settings(settings),
        )
    }

    async fn fetch_once(&self, currency: &str) -> std::result::Result<f64, FetchError> {
        let url = join_url(&self.base_url, LATEST_USD_PATH);
        let raw = get_json(&self.http, PROVIDER, &url, &[]).await?;

        if raw.get("rates").is_none() {
            return Err(FetchError::structural(PROVIDER, "response has no `rates` map"));
        }
        let latest: LatestRatesResponse = decode(PROVIDER, raw)?;
        rate_for(&latest, currency)
    }
}

fn rate_for(latest: &LatestRatesResponse, currency: &str) -> std::result::Result<f64, FetchError> {
    if let Some(base) = latest.base_code.as_deref() {
        if base != "USD" {
            return Err(FetchError::structural(
                PROVIDER,
                format!("expected USD base, got {base}"),
            ));
        }
    }

    let rate = latest
        .rates
        .get(currency)
        .copied()
        .ok_or_else(|| FetchError::structural(PROVIDER, format!("no rate for {currency}")))?;

    if !rate.is_finite() || rate <= 0.0 {
        return Err(FetchError::structural(
            PROVIDER,
            format!("rate for {currency} is not positive: {rate}"),
        ));
    }
    Ok(rate)
}

#[async_trait::async_trait]
impl FxSource for ExchangeRateClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_rate(&self, currency: &str) -> Result<f64> {
        let rate = self.retry.run(move || self.fetch_once(currency)).await?;
        tracing::info!(currency, rate, "exchange rate fetched");
        Ok(rate)
    }
}
