use crate::ingest::types::ForecastResponse;
use anyhow::ensure;
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Current conditions plus the daily forecast, in the shape every downstream
/// component reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWeather {
    #[serde(rename = "temperatura_actual")]
    pub temperature: f64,
    #[serde(rename = "viento")]
    pub wind_speed: f64,
    #[serde(rename = "uv")]
    pub uv_index: f64,
    /// Percent, 0..=100.
    #[serde(rename = "precipitacion")]
    pub precipitation_chance: f64,
    #[serde(rename = "pronostico_7_dias")]
    pub forecast: Vec<ForecastDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
}

/// A normalized reading together with the instant it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub captured_at: DateTime<Utc>,
    pub weather: NormalizedWeather,
}

impl ForecastResponse {
    pub fn validate_and_into_weather(self) -> anyhow::Result<NormalizedWeather> {
        let current = self.current;
        for (field, value) in [
            ("temperature_2m", current.temperature_2m),
            ("wind_speed_10m", current.wind_speed_10m),
            ("precipitation_probability", current.precipitation_probability),
            ("uv_index", current.uv_index),
        ] {
            ensure!(value.is_finite(), "current.{field} is not a finite number");
        }
        ensure!(
            (0.0..=100.0).contains(&current.precipitation_probability),
            "current.precipitation_probability out of range: {}",
            current.precipitation_probability
        );

        let daily = self.daily;
        ensure!(
            daily.time.len() == daily.temperature_2m_max.len()
                && daily.time.len() == daily.temperature_2m_min.len(),
            "daily arrays differ in length (time={}, max={}, min={})",
            daily.time.len(),
            daily.temperature_2m_max.len(),
            daily.temperature_2m_min.len()
        );

        let forecast = daily
            .time
            .into_iter()
            .zip(daily.temperature_2m_max)
            .zip(daily.temperature_2m_min)
            .map(|((date, temp_max), temp_min)| ForecastDay {
                date,
                temp_max,
                temp_min,
            })
            .collect();

        Ok(NormalizedWeather {
            temperature: current.temperature_2m,
            wind_speed: current.wind_speed_10m,
            uv_index: current.uv_index,
            precipitation_chance: current.precipitation_probability,
            forecast,
        })
    }
}

impl WeatherObservation {
    pub fn now(weather: NormalizedWeather) -> Self {
        Self {
            captured_at: Utc::now().trunc_subsecs(0),
            weather,
        }
    }
}
