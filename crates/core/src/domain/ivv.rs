//! Travel viability index (IVV).
//!
//! A 0..=100 blend of three sub-scores:
//!
//! ```text
//! weather  100 - 25 * (adverse weather conditions)    weight 0.4
//! fx       50 if |daily change| > 3%, else 100        weight 0.3
//! uv       100 (<6), 75 (6..=8), 50 (>8)              weight 0.3
//! ```
//!
//! With both inputs present the score cannot fall below 40.

use crate::domain::alert::{is_fx_swing, WeatherConditions};
use crate::domain::finance::FinanceSnapshot;
use crate::domain::round_to;
use crate::domain::weather::NormalizedWeather;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const WEATHER_WEIGHT: f64 = 0.4;
pub const FX_WEIGHT: f64 = 0.3;
pub const UV_WEIGHT: f64 = 0.3;

const WEATHER_UNAVAILABLE: &str = "Datos climáticos no disponibles";
const FINANCE_UNAVAILABLE: &str = "Datos financieros no disponibles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    #[serde(rename = "BAJO")]
    Low,
    #[serde(rename = "MEDIO")]
    Medium,
    #[serde(rename = "ALTO")]
    High,
    #[serde(rename = "CRITICO")]
    Critical,
    #[serde(rename = "DESCONOCIDO")]
    Unknown,
}

impl RiskTier {
    /// `>= 80` low, `>= 60` medium, `> 40` high, otherwise critical.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Low
        } else if score >= 60.0 {
            Self::Medium
        } else if score > 40.0 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Low => "#28a745",
            Self::Medium => "#ffc107",
            Self::High => "#fd7e14",
            Self::Critical => "#dc3545",
            Self::Unknown => "#6c757d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "BAJO",
            Self::Medium => "MEDIO",
            Self::High => "ALTO",
            Self::Critical => "CRITICO",
            Self::Unknown => "DESCONOCIDO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscores {
    #[serde(rename = "clima_score")]
    pub weather: u32,
    #[serde(rename = "cambio_score")]
    pub fx: u32,
    #[serde(rename = "uv_score")]
    pub uv: u32,
}

/// `score` is present iff the tier is known; `reason` is present iff it is
/// not. Only [`score`] builds these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvvResult {
    #[serde(rename = "ivv_score")]
    pub score: Option<f64>,
    #[serde(rename = "nivel_riesgo")]
    pub risk_tier: RiskTier,
    pub color: String,
    #[serde(
        rename = "componentes_ivv",
        default,
        serialize_with = "serialize_subscores",
        deserialize_with = "deserialize_subscores"
    )]
    pub subscores: Option<Subscores>,
    #[serde(rename = "motivo")]
    pub reason: Option<String>,
}

impl IvvResult {
    fn unknown(reason: String) -> Self {
        Self {
            score: None,
            risk_tier: RiskTier::Unknown,
            color: RiskTier::Unknown.color().to_string(),
            subscores: None,
            reason: Some(reason),
        }
    }

    fn scored(score: f64, subscores: Subscores) -> Self {
        let risk_tier = RiskTier::from_score(score);
        Self {
            score: Some(score),
            risk_tier,
            color: risk_tier.color().to_string(),
            subscores: Some(subscores),
            reason: None,
        }
    }
}

pub fn weather_score(conditions: WeatherConditions) -> u32 {
    100 - 25 * conditions.count()
}

pub fn fx_score(finance: &FinanceSnapshot) -> u32 {
    if is_fx_swing(finance) {
        50
    } else {
        100
    }
}

pub fn uv_score(uv_index: f64) -> u32 {
    if uv_index < 6.0 {
        100
    } else if uv_index <= 8.0 {
        75
    } else {
        50
    }
}

pub fn score(weather: Option<&NormalizedWeather>, finance: Option<&FinanceSnapshot>) -> IvvResult {
    let (weather, finance) = match (weather, finance) {
        (Some(w), Some(f)) => (w, f),
        (w, f) => {
            let mut missing = Vec::with_capacity(2);
            if w.is_none() {
                missing.push(WEATHER_UNAVAILABLE);
            }
            if f.is_none() {
                missing.push(FINANCE_UNAVAILABLE);
            }
            return IvvResult::unknown(missing.join(" / "));
        }
    };

    let subscores = Subscores {
        weather: weather_score(WeatherConditions::of(weather)),
        fx: fx_score(finance),
        uv: uv_score(weather.uv_index),
    };

    let raw = WEATHER_WEIGHT * f64::from(subscores.weather)
        + FX_WEIGHT * f64::from(subscores.fx)
        + UV_WEIGHT * f64::from(subscores.uv);

    IvvResult::scored(round_to(raw, 2), subscores)
}

// Unknown results persist `componentes_ivv` as `{}` rather than null.
fn serialize_subscores<S: Serializer>(
    subscores: &Option<Subscores>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    match subscores {
        Some(s) => s.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

fn deserialize_subscores<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Subscores>, D::Error> {
    #[derive(Deserialize)]
    struct Partial {
        clima_score: Option<u32>,
        cambio_score: Option<u32>,
        uv_score: Option<u32>,
    }

    let partial = Option::<Partial>::deserialize(deserializer)?;
    Ok(partial.and_then(|p| match (p.clima_score, p.cambio_score, p.uv_score) {
        (Some(weather), Some(fx), Some(uv)) => Some(Subscores { weather, fx, uv }),
        _ => None,
    }))
}
