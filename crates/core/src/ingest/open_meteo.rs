use crate::config::Settings;
use crate::domain::city::CityConfig;
use crate::domain::weather::WeatherObservation;
use crate::ingest::error::FetchError;
use crate::ingest::provider::{decode, get_json, join_url, RetryPolicy, WeatherSource};
use crate::ingest::types::ForecastResponse;
use anyhow::Result;

const PROVIDER: &str = "open-meteo";
const FORECAST_PATH: &str = "/v1/forecast";
const CURRENT_FIELDS: &str = "temperature_2m,wind_speed_10m,precipitation_probability,uv_index";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min";

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenMeteoClient {
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
            settings.weather_base_url.clone(),
            RetryPolicy::from_settings(settings),
        )
    }

    async fn fetch_once(
        &self,
        city: &CityConfig,
    ) -> std::result::Result<ForecastResponse, FetchError> {
        let url = join_url(&self.base_url, FORECAST_PATH);
        let raw = get_json(
            &self.http,
            PROVIDER,
            &url,
            &[
                ("latitude", city.latitude.to_string()),
                ("longitude", city.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
            ],
        )
        .await?;

        for block in ["current", "daily"] {
            if raw.get(block).is_none() {
                let detail = format!("response has no `{block}` block");
                return Err(FetchError::structural(PROVIDER, detail));
            }
        }
        decode(PROVIDER, raw)
    }
}

#[async_trait::async_trait]
impl WeatherSource for OpenMeteoClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_weather(&self, city: &CityConfig) -> Result<WeatherObservation> {
        let response = self.retry.run(move || self.fetch_once(city)).await?;
        let weather = response
            .validate_and_into_weather()
            .map_err(|e| FetchError::structural(PROVIDER, format!("{e:#}")))?;

        tracing::info!(city = %city.name, "weather normalized");
        Ok(WeatherObservation::now(weather))
    }
}
