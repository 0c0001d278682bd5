use crate::domain::city::CityRecord;
use crate::storage::snapshot_file_name;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes one pass as a pretty-printed JSON array and returns the final path.
///
/// The array is staged in a temp file inside `dir` and renamed into place, so
/// readers only ever see complete snapshots. The temp file is removed if any
/// step fails.
pub fn write_snapshot(
    dir: &Path,
    generated_at: DateTime<Utc>,
    records: &[CityRecord],
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create data dir {}", dir.display()))?;
    let path = dir.join(snapshot_file_name(generated_at));

    let staged = tempfile::Builder::new()
        .prefix(".resultado_general_")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("failed to stage snapshot in {}", dir.display()))?;

    {
        let mut writer = BufWriter::new(staged.as_file());
        serde_json::to_writer_pretty(&mut writer, records).context("failed to encode snapshot")?;
        writer.flush().context("failed to flush snapshot")?;
    }
    staged
        .as_file()
        .sync_all()
        .context("failed to sync snapshot")?;

    staged
        .persist(&path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to move snapshot into {}", path.display()))?;

    tracing::info!(path = %path.display(), records = records.len(), "snapshot written");
    Ok(path)
}
