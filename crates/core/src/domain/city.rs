use crate::domain::alert::{self, Alert};
use crate::domain::finance::FinanceSnapshot;
use crate::domain::ivv::{self, IvvResult};
use crate::domain::weather::{NormalizedWeather, WeatherObservation};
use crate::time::offset::TimezoneInfo;
use anyhow::ensure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityConfig {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "latitud")]
    pub latitude: f64,
    #[serde(rename = "longitud")]
    pub longitude: f64,
    /// ISO 4217 code quoted against USD.
    #[serde(rename = "moneda")]
    pub currency: String,
    /// IANA zone name, e.g. `Europe/Madrid`.
    pub timezone: String,
}

impl CityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.name.trim().is_empty(), "city name must be non-empty");
        ensure!(
            (-90.0..=90.0).contains(&self.latitude),
            "{}: latitude out of range: {}",
            self.name,
            self.latitude
        );
        ensure!(
            (-180.0..=180.0).contains(&self.longitude),
            "{}: longitude out of range: {}",
            self.name,
            self.longitude
        );
        ensure!(
            self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase()),
            "{}: currency must be a 3-letter uppercase code (got {:?})",
            self.name,
            self.currency
        );
        ensure!(
            !self.timezone.trim().is_empty(),
            "{}: timezone must be non-empty",
            self.name
        );
        Ok(())
    }
}

/// One city's line in a snapshot. Built once per pass and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    #[serde(rename = "timestamp")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "clima")]
    pub weather: Option<NormalizedWeather>,
    #[serde(rename = "finanzas")]
    pub finance: Option<FinanceSnapshot>,
    #[serde(rename = "tiempo")]
    pub time: Option<TimezoneInfo>,
    #[serde(rename = "alertas")]
    pub alerts: Vec<Alert>,
    #[serde(flatten)]
    pub ivv: IvvResult,
}

/// Combines whatever sources succeeded into a complete record. Never fails:
/// with every source absent the record has no alerts and an unknown IVV.
pub fn aggregate(
    city: &CityConfig,
    weather: Option<WeatherObservation>,
    finance: Option<FinanceSnapshot>,
    time: Option<TimezoneInfo>,
) -> CityRecord {
    let _span = tracing::info_span!("aggregate", city = %city.name).entered();

    let (captured_at, weather) = match weather {
        Some(obs) => (Some(obs.captured_at), Some(obs.weather)),
        None => (None, None),
    };

    let alerts = alert::evaluate(weather.as_ref(), finance.as_ref());
    let ivv = ivv::score(weather.as_ref(), finance.as_ref());

    match ivv.score {
        Some(score) => tracing::info!(
            score,
            tier = ivv.risk_tier.label(),
            "{} — {score}",
            city.name
        ),
        None => tracing::info!(
            reason = ivv.reason.as_deref().unwrap_or_default(),
            "{} — sin IVV",
            city.name
        ),
    }

    CityRecord {
        captured_at,
        city: city.name.clone(),
        weather,
        finance,
        time,
        alerts,
        ivv,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::alert::tests::{finance, weather};
    use crate::domain::finance::Trend;
    use crate::domain::ivv::RiskTier;
    use chrono::TimeZone;

    pub(crate) fn bogota() -> CityConfig {
        CityConfig {
            name: "Bogotá".to_string(),
            latitude: 4.711,
            longitude: -74.0721,
            currency: "COP".to_string(),
            timezone: "America/Bogota".to_string(),
        }
    }

    fn observation(w: NormalizedWeather) -> WeatherObservation {
        WeatherObservation {
            captured_at: Utc.with_ymd_and_hms(2026, 10, 18, 15, 30, 0).unwrap(),
            weather: w,
        }
    }

    #[test]
    fn total_failure_still_yields_a_record() {
        let record = aggregate(&bogota(), None, None, None);

        assert_eq!(record.city, "Bogotá");
        assert!(record.alerts.is_empty());
        assert_eq!(record.ivv.risk_tier, RiskTier::Unknown);
        assert_eq!(record.captured_at, None);

        let v = serde_json::to_value(&record).unwrap();
        for key in ["ciudad", "componentes_ivv", "clima", "finanzas", "tiempo", "alertas"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["clima"], serde_json::Value::Null);
    }

    #[test]
    fn partial_sources_feed_alerts_but_not_score() {
        let record = aggregate(
            &bogota(),
            Some(observation(weather(37.0, 5.0, 5.0, 2.0))),
            None,
            None,
        );

        assert_eq!(record.alerts.len(), 1);
        assert_eq!(record.ivv.risk_tier, RiskTier::Unknown);
        assert_eq!(
            record.ivv.reason.as_deref(),
            Some("Datos financieros no disponibles")
        );
        assert_eq!(
            record.captured_at,
            Some(Utc.with_ymd_and_hms(2026, 10, 18, 15, 30, 0).unwrap())
        );
    }

    #[test]
    fn full_sources_produce_a_scored_record() {
        let record = aggregate(
            &bogota(),
            Some(observation(weather(20.0, 5.0, 80.0, 7.0))),
            Some(finance(1.0, Trend::Negative)),
            None,
        );

        // 0.4*75 + 0.3*100 + 0.3*75
        assert_eq!(record.ivv.score, Some(82.5));
        assert_eq!(record.ivv.risk_tier, RiskTier::Low);
        assert_eq!(record.alerts.len(), 2);
    }

    #[test]
    fn flattened_record_round_trips() {
        let record = aggregate(
            &bogota(),
            Some(observation(weather(20.0, 5.0, 80.0, 7.0))),
            Some(finance(1.0, Trend::Negative)),
            None,
        );
        let text = serde_json::to_string(&record).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["timestamp"], "2026-10-18T15:30:00Z");
        assert_eq!(v["nivel_riesgo"], "BAJO");

        let back: CityRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn validates_city_config() {
        assert!(bogota().validate().is_ok());

        let mut bad = bogota();
        bad.currency = "cop".to_string();
        assert!(bad.validate().is_err());

        let mut bad = bogota();
        bad.latitude = 91.0;
        assert!(bad.validate().is_err());

        let mut bad = bogota();
        bad.name = "  ".to_string();
        assert!(bad.validate().is_err());
    }
}
