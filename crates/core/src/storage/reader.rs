//! Read side of the snapshot directory.
//!
//! Loading is strict about the file (it must be a JSON array) and lenient
//! about its elements: schema problems are reported as [`SchemaIssue`]s and
//! rendering falls back to `—` placeholders.

use crate::domain::alert::{sort_by_severity, Alert};
use crate::domain::city::CityRecord;
use crate::storage::{is_snapshot_file_name, parse_snapshot_timestamp};
use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const REQUIRED_KEYS: [&str; 6] = [
    "ciudad",
    "componentes_ivv",
    "clima",
    "finanzas",
    "tiempo",
    "alertas",
];

pub const PLACEHOLDER: &str = "—";
const UNKNOWN_TIER: &str = "DESCONOCIDO";
const UNKNOWN_COLOR: &str = "#6c757d";

/// Snapshot files in `dir`, newest first. A missing directory has none.
pub fn list_snapshots(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("failed to list {}", dir.display())),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        let is_snapshot = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(is_snapshot_file_name)
            .unwrap_or(false);
        if is_snapshot && path.is_file() {
            paths.push(path);
        }
    }

    paths.sort_by_cached_key(|p| std::cmp::Reverse(recency_key(p)));
    Ok(paths)
}

/// Name timestamp first (unparsable names count as the epoch), then mtime.
pub fn pick_latest(paths: &[PathBuf]) -> Option<PathBuf> {
    paths.iter().max_by_key(|p| recency_key(p)).cloned()
}

fn recency_key(path: &Path) -> (NaiveDateTime, SystemTime) {
    let named = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_snapshot_timestamp)
        .unwrap_or_default();
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    (named, modified)
}

/// Raw elements of a snapshot. Fails on unreadable files, invalid JSON and
/// anything that is not a top-level array.
pub fn load_snapshot_values(path: &Path) -> anyhow::Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("invalid JSON in {}", display_name(path)))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => bail!(
            "{} does not contain a list of city results",
            display_name(path)
        ),
    }
}

/// Typed load; the inverse of `write_snapshot`.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<CityRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to decode {}", display_name(path)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub index: usize,
    pub detail: String,
}

pub fn validate_schema(values: &[Value]) -> Vec<SchemaIssue> {
    values
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let Some(obj) = item.as_object() else {
                return Some(SchemaIssue {
                    index,
                    detail: "not an object".to_string(),
                });
            };
            let mut missing: Vec<&str> = REQUIRED_KEYS
                .iter()
                .copied()
                .filter(|k| !obj.contains_key(*k))
                .collect();
            if missing.is_empty() {
                return None;
            }
            missing.sort_unstable();
            Some(SchemaIssue {
                index,
                detail: format!("missing keys: {}", missing.join(", ")),
            })
        })
        .collect()
}

/// Display summary of one city element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityView {
    pub city: String,
    pub ivv_score: String,
    pub risk_tier: String,
    pub color: String,
    pub reason: Option<String>,
    pub weather_score: String,
    pub fx_score: String,
    pub uv_score: String,
    pub alerts: Vec<Alert>,
}

/// `None` for elements without a city name; everything else is filled with
/// placeholders where missing.
pub fn city_view(item: &Value) -> Option<CityView> {
    let city = item.get("ciudad")?.as_str()?.to_string();

    let components = item.get("componentes_ivv");
    let component = |key: &str| {
        components
            .and_then(|c| c.get(key))
            .map(display_value)
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    };

    let mut alerts: Vec<Alert> = item
        .get("alertas")
        .and_then(Value::as_array)
        .map(|raw| {
            raw.iter()
                .filter_map(|a| serde_json::from_value(a.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    sort_by_severity(&mut alerts);

    Some(CityView {
        ivv_score: item
            .get("ivv_score")
            .map(display_value)
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        risk_tier: item
            .get("nivel_riesgo")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_TIER)
            .to_string(),
        color: item
            .get("color")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_COLOR)
            .to_string(),
        reason: item
            .get("motivo")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        weather_score: component("clima_score"),
        fx_score: component("cambio_score"),
        uv_score: component("uv_score"),
        alerts,
        city,
    })
}

pub fn city_views(values: &[Value]) -> Vec<CityView> {
    values.iter().filter_map(city_view).collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => PLACEHOLDER.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Everything a consumer needs to render one snapshot file.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedSnapshot {
    pub file: String,
    pub generated_at: Option<NaiveDateTime>,
    pub records: Vec<Value>,
    pub schema_issues: Vec<SchemaIssue>,
    pub cities: Vec<CityView>,
}

pub fn load_snapshot(path: &Path) -> anyhow::Result<LoadedSnapshot> {
    let file = display_name(path);
    let records = load_snapshot_values(path)?;
    let schema_issues = validate_schema(&records);
    if !schema_issues.is_empty() {
        tracing::warn!(
            file = %file,
            issues = schema_issues.len(),
            "snapshot does not match the expected schema"
        );
    }
    let cities = city_views(&records);

    Ok(LoadedSnapshot {
        generated_at: parse_snapshot_timestamp(&file),
        file,
        records,
        schema_issues,
        cities,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
