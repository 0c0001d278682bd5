use crate::domain::round_to;
use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimezoneInfo {
    pub timezone: String,
    /// Local ISO-8601 datetime exactly as the provider reported it.
    #[serde(rename = "hora_local")]
    pub local_time: String,
    #[serde(rename = "zona_referencia")]
    pub reference_zone: String,
    /// City UTC offset minus reference UTC offset, in hours (1 decimal).
    #[serde(rename = "diferencia_horaria")]
    pub offset_hours: f64,
}

pub fn parse_local_datetime(s: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim()).with_context(|| format!("not an ISO-8601 datetime: {s}"))
}

/// Signed hour difference between two zones, taken from the UTC offsets of
/// their reported local times. Independent of how far apart the two readings
/// were taken.
pub fn offset_hours(local: &DateTime<FixedOffset>, reference: &DateTime<FixedOffset>) -> f64 {
    let diff_secs = local.offset().local_minus_utc() - reference.offset().local_minus_utc();
    round_to(f64::from(diff_secs) / 3600.0, 1)
}

pub fn derive_timezone_info(
    timezone: &str,
    local_time: &str,
    reference_zone: &str,
    reference_time: &str,
) -> anyhow::Result<TimezoneInfo> {
    let local = parse_local_datetime(local_time)
        .with_context(|| format!("bad local time for {timezone}"))?;
    let reference = parse_local_datetime(reference_time)
        .with_context(|| format!("bad local time for {reference_zone}"))?;

    Ok(TimezoneInfo {
        timezone: timezone.to_string(),
        local_time: local_time.to_string(),
        reference_zone: reference_zone.to_string(),
        offset_hours: offset_hours(&local, &reference),
    })
}
