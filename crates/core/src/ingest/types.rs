use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Open-Meteo `/v1/forecast` with the `current` and `daily` blocks requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub current: ForecastCurrent,
    pub daily: ForecastDaily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastCurrent {
    pub temperature_2m: f64,
    pub wind_speed_10m: f64,
    pub precipitation_probability: f64,
    pub uv_index: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDaily {
    pub time: Vec<NaiveDate>,
    pub temperature_2m_max: Vec<f64>,
    pub temperature_2m_min: Vec<f64>,
}

/// open.er-api.com `/v6/latest/USD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestRatesResponse {
    pub base_code: Option<String>,
    pub rates: BTreeMap<String, f64>,
}

/// WorldTimeAPI `/api/timezone/{zone}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldTimeResponse {
    pub timezone: Option<String>,
    pub datetime: String,
}
