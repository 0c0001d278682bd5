use crate::config::Settings;
use crate::domain::city::{aggregate, CityConfig, CityRecord};
use crate::domain::finance::FinanceSnapshot;
use crate::ingest::error::FetchError;
use crate::ingest::exchange_rate::ExchangeRateClient;
use crate::ingest::open_meteo::OpenMeteoClient;
use crate::ingest::provider::{build_http_client, FxSource, TimezoneSource, WeatherSource};
use crate::ingest::world_time::WorldTimeClient;
use rand::Rng;

/// The three upstreams a pass reads from.
pub struct Sources {
    pub weather: Box<dyn WeatherSource>,
    pub fx: Box<dyn FxSource>,
    pub time: Box<dyn TimezoneSource>,
}

impl Sources {
    pub fn http_from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = build_http_client(settings.provider_timeout)?;
        Ok(Self {
            weather: Box::new(OpenMeteoClient::from_settings(http.clone(), settings)),
            fx: Box::new(ExchangeRateClient::from_settings(http.clone(), settings)),
            time: Box::new(WorldTimeClient::from_settings(http, settings)),
        })
    }
}

/// One aggregation pass over the configured cities. Cities run in order and
/// each city's sources are fetched one after another.
pub struct Pipeline<R> {
    sources: Sources,
    reference_timezone: String,
    rng: R,
}

impl<R: Rng> Pipeline<R> {
    pub fn new(sources: Sources, reference_timezone: impl Into<String>, rng: R) -> Self {
        Self {
            sources,
            reference_timezone: reference_timezone.into(),
            rng,
        }
    }

    /// Always returns one record per city, in input order.
    pub async fn run_pass(&mut self, cities: &[CityConfig]) -> Vec<CityRecord> {
        let mut records = Vec::with_capacity(cities.len());
        for city in cities {
            records.push(self.process_city(city).await);
        }

        let scored = records.iter().filter(|r| r.ivv.score.is_some()).count();
        tracing::info!(cities = records.len(), scored, "aggregation pass finished");
        records
    }

    async fn process_city(&mut self, city: &CityConfig) -> CityRecord {
        let weather = self.sources.weather.fetch_weather(city).await;
        let provider = self.sources.weather.provider_name();
        let weather = absent_on_failure(city, "clima", provider, weather);

        let finance = match self.sources.fx.fetch_rate(&city.currency).await {
            Ok(rate) => FinanceSnapshot::simulate(rate, &mut self.rng),
            Err(e) => Err(e),
        };
        let finance = absent_on_failure(city, "finanzas", self.sources.fx.provider_name(), finance);

        let time = self
            .sources
            .time
            .fetch_timezone(&city.timezone, &self.reference_timezone)
            .await;
        let time = absent_on_failure(city, "tiempo", self.sources.time.provider_name(), time);

        aggregate(city, weather, finance, time)
    }
}

fn absent_on_failure<T>(
    city: &CityConfig,
    source: &'static str,
    provider: &'static str,
    result: anyhow::Result<T>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            let kind = err
                .downcast_ref::<FetchError>()
                .map(|f| format!("{:?}", f.kind))
                .unwrap_or_else(|| "Other".to_string());
            tracing::error!(
                city = %city.name,
                source,
                provider,
                kind = %kind,
                error = %format!("{err:#}"),
                "source unavailable; continuing without it"
            );
            None
        }
    }
}
