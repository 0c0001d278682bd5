use crate::domain::round_to;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Points in the simulated history, the current rate included.
pub const HISTORY_LEN: usize = 5;
/// Largest relative move applied per simulated day.
pub const MAX_DAILY_SWING: f64 = 0.02;
/// Shortest same-direction run that counts as a trend.
pub const MIN_STREAK: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "positiva")]
    Positive,
    #[serde(rename = "negativa")]
    Negative,
    #[serde(rename = "estable")]
    Stable,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Self::Positive => "positiva",
            Self::Negative => "negativa",
            Self::Stable => "estable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendAnalysis {
    pub trend: Trend,
    pub streak_length: usize,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceSnapshot {
    #[serde(rename = "tipo_cambio_actual")]
    pub current_rate: f64,
    #[serde(rename = "variacion_diaria")]
    pub daily_change_pct: f64,
    #[serde(rename = "tendencia_5_dias")]
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Flat,
}

/// Classifies a history by its longest run of consecutive rises or falls.
///
/// A flat step breaks both runs. Rises win over falls when both reach
/// [`MIN_STREAK`]. Histories with fewer than two points are stable.
pub fn analyze_trend(history: &[f64]) -> TrendAnalysis {
    let directions = history.windows(2).map(|pair| {
        if pair[1] > pair[0] {
            Direction::Up
        } else if pair[1] < pair[0] {
            Direction::Down
        } else {
            Direction::Flat
        }
    });

    let (mut up, mut down) = (0usize, 0usize);
    let (mut longest_up, mut longest_down) = (0usize, 0usize);
    for direction in directions {
        match direction {
            Direction::Up => {
                up += 1;
                down = 0;
                longest_up = longest_up.max(up);
            }
            Direction::Down => {
                down += 1;
                up = 0;
                longest_down = longest_down.max(down);
            }
            Direction::Flat => {
                up = 0;
                down = 0;
            }
        }
    }

    let (trend, streak_length) = if longest_up >= MIN_STREAK {
        (Trend::Positive, longest_up)
    } else if longest_down >= MIN_STREAK {
        (Trend::Negative, longest_down)
    } else {
        (Trend::Stable, 0)
    };

    let description = if streak_length > 0 {
        format!(
            "Tendencia {} durante {streak_length} días consecutivos",
            trend.label()
        )
    } else {
        "Tendencia estable sin rachas significativas".to_string()
    };

    TrendAnalysis {
        trend,
        streak_length,
        description,
    }
}

/// Builds a [`HISTORY_LEN`]-point history starting at `current_rate`, each
/// following point moved by a uniform draw in ±[`MAX_DAILY_SWING`] and rounded
/// to 4 decimals.
pub fn simulate_history<R: Rng>(current_rate: f64, rng: &mut R) -> Vec<f64> {
    let mut history = Vec::with_capacity(HISTORY_LEN);
    history.push(current_rate);

    let mut value = current_rate;
    for _ in 1..HISTORY_LEN {
        let swing = rng.gen_range(-MAX_DAILY_SWING..=MAX_DAILY_SWING);
        value = round_to(value * (1.0 + swing), 4);
        history.push(value);
    }

    history
}

/// Percent change between the last two points, rounded to 2 decimals.
pub fn daily_change_pct(history: &[f64]) -> Option<f64> {
    let [.., previous, last] = history else {
        return None;
    };
    if *previous == 0.0 {
        return None;
    }
    Some(round_to((last - previous) / previous * 100.0, 2))
}

impl FinanceSnapshot {
    pub fn from_history(current_rate: f64, history: &[f64]) -> anyhow::Result<Self> {
        anyhow::ensure!(
            current_rate.is_finite() && current_rate > 0.0,
            "exchange rate must be a positive number (got {current_rate})"
        );
        let daily_change_pct = daily_change_pct(history).ok_or_else(|| {
            anyhow::anyhow!(
                "history needs two points with a non-zero base (got {})",
                history.len()
            )
        })?;

        Ok(Self {
            current_rate,
            daily_change_pct,
            trend: analyze_trend(history).trend,
        })
    }

    /// Derives the snapshot from one real rate and a simulated history.
    pub fn simulate<R: Rng>(current_rate: f64, rng: &mut R) -> anyhow::Result<Self> {
        let history = simulate_history(current_rate, rng);
        Self::from_history(current_rate, &history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn four_rises_are_positive() {
        let a = analyze_trend(&[1.0, 1.01, 1.02, 1.03, 1.04]);
        assert_eq!(a.trend, Trend::Positive);
        assert_eq!(a.streak_length, 4);
        assert_eq!(a.description, "Tendencia positiva durante 4 días consecutivos");
    }

    #[test]
    fn four_falls_are_negative() {
        let a = analyze_trend(&[1.0, 0.99, 0.98, 0.97, 0.96]);
        assert_eq!(a.trend, Trend::Negative);
        assert_eq!(a.streak_length, 4);
    }

    #[test]
    fn broken_fall_is_stable() {
        // down, up, down, down: longest fall is 2.
        let a = analyze_trend(&[1.0, 0.99, 1.0, 0.99, 0.98]);
        assert_eq!(a.trend, Trend::Stable);
        assert_eq!(a.streak_length, 0);
        assert_eq!(a.description, "Tendencia estable sin rachas significativas");
    }

    #[test]
    fn flat_step_resets_the_run() {
        // up, up, flat, up: never three in a row.
        let a = analyze_trend(&[1.0, 1.1, 1.2, 1.2, 1.3]);
        assert_eq!(a.trend, Trend::Stable);
    }

    #[test]
    fn judged_by_strongest_run_not_endpoints() {
        // Early fall of 3 followed by a short late rise above the start.
        let a = analyze_trend(&[1.0, 0.9, 0.8, 0.7, 0.8, 1.1]);
        assert_eq!(a.trend, Trend::Negative);
        assert_eq!(a.streak_length, 3);
    }

    #[test]
    fn rises_take_precedence_over_falls() {
        let a = analyze_trend(&[1.0, 0.9, 0.8, 0.7, 0.8, 0.9, 1.0]);
        assert_eq!(a.trend, Trend::Positive);
        assert_eq!(a.streak_length, 3);
    }

    #[test]
    fn short_histories_are_stable() {
        assert_eq!(analyze_trend(&[]).trend, Trend::Stable);
        assert_eq!(analyze_trend(&[1.0]).trend, Trend::Stable);
        assert_eq!(analyze_trend(&[1.0, 2.0]).streak_length, 0);
    }

    #[test]
    fn daily_change_uses_last_two_points() {
        assert_eq!(daily_change_pct(&[1.0, 4000.0, 4100.0]), Some(2.5));
        assert_eq!(daily_change_pct(&[100.0, 96.5]), Some(-3.5));
        assert_eq!(daily_change_pct(&[1.0]), None);
        assert_eq!(daily_change_pct(&[0.0, 1.0]), None);
    }

    #[test]
    fn simulated_history_stays_within_swing_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let history = simulate_history(3950.0, &mut rng);

        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history[0], 3950.0);
        for pair in history.windows(2) {
            let change = (pair[1] - pair[0]) / pair[0];
            // Rounding to 4 decimals can nudge past the bound by a hair.
            assert!(change.abs() <= MAX_DAILY_SWING + 1e-6, "change {change}");
        }
    }

    #[test]
    fn simulation_is_reproducible_for_a_seed() {
        let a = FinanceSnapshot::simulate(0.92, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = FinanceSnapshot::simulate(0.92, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.current_rate, 0.92);
        assert!(a.daily_change_pct.abs() <= 2.05);
    }

    #[test]
    fn snapshot_rejects_non_positive_rates() {
        assert!(FinanceSnapshot::from_history(0.0, &[1.0, 1.0]).is_err());
        assert!(FinanceSnapshot::from_history(f64::NAN, &[1.0, 1.0]).is_err());
    }

    #[test]
    fn trend_serializes_as_spanish_label() {
        let snap = FinanceSnapshot::from_history(1.0, &[1.0, 0.99, 0.98, 0.97, 0.96]).unwrap();
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["tendencia_5_dias"], "negativa");
        assert_eq!(v["variacion_diaria"], serde_json::json!(-1.03));
    }
}
