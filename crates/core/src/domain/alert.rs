use crate::domain::finance::{FinanceSnapshot, Trend};
use crate::domain::weather::NormalizedWeather;
use serde::{Deserialize, Serialize};

pub const EXTREME_HEAT_CELSIUS: f64 = 35.0;
pub const EXTREME_COLD_CELSIUS: f64 = 0.0;
pub const HIGH_RAIN_PCT: f64 = 70.0;
pub const STRONG_WIND_KMH: f64 = 50.0;
pub const FX_SWING_PCT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertCategory {
    #[serde(rename = "CLIMA")]
    Weather,
    #[serde(rename = "FINANZAS")]
    Finance,
}

/// Declaration order is display order: `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "ALTA")]
    High,
    #[serde(rename = "MEDIA")]
    Medium,
    #[serde(rename = "BAJA")]
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "tipo")]
    pub category: AlertCategory,
    #[serde(rename = "severidad")]
    pub severity: Severity,
    #[serde(rename = "mensaje")]
    pub message: String,
}

impl Alert {
    fn new(category: AlertCategory, severity: Severity, message: String) -> Self {
        Self {
            category,
            severity,
            message,
        }
    }
}

/// Which weather thresholds a reading crosses. Shared by alerting and scoring
/// so both always agree on what counts as adverse weather.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeatherConditions {
    pub extreme_temperature: bool,
    pub high_rain: bool,
    pub strong_wind: bool,
}

impl WeatherConditions {
    pub fn of(weather: &NormalizedWeather) -> Self {
        Self {
            extreme_temperature: weather.temperature > EXTREME_HEAT_CELSIUS
                || weather.temperature < EXTREME_COLD_CELSIUS,
            high_rain: weather.precipitation_chance > HIGH_RAIN_PCT,
            strong_wind: weather.wind_speed > STRONG_WIND_KMH,
        }
    }

    pub fn count(&self) -> u32 {
        [self.extreme_temperature, self.high_rain, self.strong_wind]
            .into_iter()
            .filter(|hit| *hit)
            .count() as u32
    }
}

pub fn is_fx_swing(finance: &FinanceSnapshot) -> bool {
    finance.daily_change_pct.abs() > FX_SWING_PCT
}

/// Checks every rule independently against whichever inputs are present.
/// An absent input skips its rules. Output is in rule order; see
/// [`sort_by_severity`] for display order.
pub fn evaluate(
    weather: Option<&NormalizedWeather>,
    finance: Option<&FinanceSnapshot>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(w) = weather {
        let conditions = WeatherConditions::of(w);
        if conditions.extreme_temperature {
            alerts.push(Alert::new(
                AlertCategory::Weather,
                Severity::High,
                format!("Temperatura extrema ({}°C)", float_repr(w.temperature)),
            ));
        }
        if conditions.high_rain {
            alerts.push(Alert::new(
                AlertCategory::Weather,
                Severity::Medium,
                // Reported as an integer percentage upstream, so no trailing ".0".
                format!("Alta probabilidad de lluvia ({}%)", w.precipitation_chance),
            ));
        }
        if conditions.strong_wind {
            alerts.push(Alert::new(
                AlertCategory::Weather,
                Severity::Medium,
                format!("Viento fuerte ({} km/h)", float_repr(w.wind_speed)),
            ));
        }
    }

    if let Some(f) = finance {
        if is_fx_swing(f) {
            alerts.push(Alert::new(
                AlertCategory::Finance,
                Severity::High,
                format!(
                    "Variación de tipo de cambio > 3% ({}%)",
                    float_repr(f.daily_change_pct)
                ),
            ));
        }
        if f.trend == Trend::Negative {
            alerts.push(Alert::new(
                AlertCategory::Finance,
                Severity::Low,
                "Tendencia negativa en el tipo de cambio".to_string(),
            ));
        }
    }

    tracing::info!(alerts_len = alerts.len(), "alerts evaluated");
    alerts
}

/// Renders a float the way existing snapshots spell measured values: whole
/// numbers keep one decimal (`36.0`), everything else uses the shortest
/// round-trip form (`3.25`).
fn float_repr(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// HIGH before MEDIUM before LOW; equal severities keep their order.
pub fn sort_by_severity(alerts: &mut [Alert]) {
    alerts.sort_by_key(|a| a.severity);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn weather(temperature: f64, wind: f64, rain: f64, uv: f64) -> NormalizedWeather {
        NormalizedWeather {
            temperature,
            wind_speed: wind,
            uv_index: uv,
            precipitation_chance: rain,
            forecast: Vec::new(),
        }
    }

    pub(crate) fn finance(change: f64, trend: Trend) -> FinanceSnapshot {
        FinanceSnapshot {
            current_rate: 4000.0,
            daily_change_pct: change,
            trend,
        }
    }

    #[test]
    fn hot_day_raises_only_extreme_temperature() {
        let alerts = evaluate(Some(&weather(36.0, 10.0, 10.0, 3.0)), None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::Weather);
        assert_eq!(alerts[0].severity, Severity::High);
        assert!(alerts[0].message.starts_with("Temperatura extrema"));
    }

    #[test]
    fn thresholds_are_strict() {
        let alerts = evaluate(
            Some(&weather(35.0, 50.0, 70.0, 3.0)),
            Some(&finance(3.0, Trend::Stable)),
        );
        assert!(alerts.is_empty());

        let cold = evaluate(Some(&weather(-0.5, 0.0, 0.0, 0.0)), None);
        assert_eq!(cold.len(), 1);
    }

    #[test]
    fn every_rule_can_fire_together() {
        let alerts = evaluate(
            Some(&weather(40.0, 60.0, 90.0, 3.0)),
            Some(&finance(-3.2, Trend::Negative)),
        );
        let severities: Vec<_> = alerts.iter().map(|a| a.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::High,
                Severity::Medium,
                Severity::Medium,
                Severity::High,
                Severity::Low
            ]
        );
        assert_eq!(
            alerts.iter().filter(|a| a.category == AlertCategory::Finance).count(),
            2
        );
    }

    #[test]
    fn absent_inputs_produce_no_alerts() {
        assert!(evaluate(None, None).is_empty());
        let only_finance = evaluate(None, Some(&finance(0.5, Trend::Negative)));
        assert_eq!(only_finance.len(), 1);
        assert_eq!(only_finance[0].severity, Severity::Low);
    }

    #[test]
    fn sorting_is_severity_descending_and_stable() {
        let mut alerts = evaluate(
            Some(&weather(40.0, 60.0, 90.0, 3.0)),
            Some(&finance(-3.2, Trend::Negative)),
        );
        sort_by_severity(&mut alerts);

        let messages: Vec<_> = alerts.iter().map(|a| a.message.as_str()).collect();
        assert!(messages[0].starts_with("Temperatura extrema"));
        assert!(messages[1].starts_with("Variación de tipo de cambio"));
        assert!(messages[2].starts_with("Alta probabilidad de lluvia"));
        assert!(messages[3].starts_with("Viento fuerte"));
        assert_eq!(messages[4], "Tendencia negativa en el tipo de cambio");
    }

    #[test]
    fn wire_labels_are_spanish() {
        let alerts = evaluate(None, Some(&finance(4.0, Trend::Stable)));
        let v = serde_json::to_value(&alerts[0]).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "tipo": "FINANZAS",
                "severidad": "ALTA",
                "mensaje": "Variación de tipo de cambio > 3% (4.0%)"
            })
        );
    }

    #[test]
    fn messages_keep_measured_values_as_floats() {
        let alerts = evaluate(
            Some(&weather(36.0, 55.5, 81.0, 3.0)),
            Some(&finance(-3.25, Trend::Stable)),
        );
        let messages: Vec<_> = alerts.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Temperatura extrema (36.0°C)",
                "Alta probabilidad de lluvia (81%)",
                "Viento fuerte (55.5 km/h)",
                "Variación de tipo de cambio > 3% (-3.25%)",
            ]
        );
        assert_eq!(float_repr(-0.0), "-0.0");
    }
}
