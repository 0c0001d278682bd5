use chrono::{DateTime, NaiveDateTime, Utc};

pub mod lock;
pub mod reader;
pub mod snapshot;

pub const FILENAME_PREFIX: &str = "resultado_general_";
pub const FILENAME_SUFFIX: &str = ".json";

const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn snapshot_file_name(generated_at: DateTime<Utc>) -> String {
    format!(
        "{FILENAME_PREFIX}{}{FILENAME_SUFFIX}",
        generated_at.format(FILENAME_TIMESTAMP_FORMAT)
    )
}

/// Parses the capture time out of `resultado_general_YYYYMMDD_HHMMSS.json`.
pub fn parse_snapshot_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let stem = file_name
        .strip_prefix(FILENAME_PREFIX)?
        .strip_suffix(FILENAME_SUFFIX)?;
    NaiveDateTime::parse_from_str(stem, FILENAME_TIMESTAMP_FORMAT).ok()
}

pub fn is_snapshot_file_name(file_name: &str) -> bool {
    file_name.starts_with(FILENAME_PREFIX)
        && file_name.ends_with(FILENAME_SUFFIX)
        && !file_name.contains(['/', '\\'])
        && file_name.len() > FILENAME_PREFIX.len() + FILENAME_SUFFIX.len()
}
