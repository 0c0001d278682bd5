use chrono::Utc;
use ivv_core::config::{CitiesConfig, Settings};
use ivv_core::pipeline::Pipeline;
use ivv_core::storage::lock::RunLock;
use ivv_core::storage::snapshot::write_snapshot;
use rand::Rng;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Written(PathBuf),
    DryRun { records: usize },
    /// Another pass held the run lock.
    Skipped,
}

/// One full pass: lock, load cities, aggregate, persist. The lock is released
/// on every exit path.
pub async fn run_once<R: Rng>(
    settings: &Settings,
    pipeline: &mut Pipeline<R>,
    dry_run: bool,
) -> anyhow::Result<RunOutcome> {
    let Some(_lock) = RunLock::try_acquire(&settings.data_dir)? else {
        tracing::warn!(
            data_dir = %settings.data_dir.display(),
            "run lock held; another pass in progress"
        );
        return Ok(RunOutcome::Skipped);
    };

    let cities = CitiesConfig::load(&settings.cities_path)?;
    tracing::info!(cities_len = cities.cities.len(), dry_run, "aggregation pass started");

    let records = pipeline.run_pass(&cities.cities).await;
    let generated_at = Utc::now();

    if dry_run {
        tracing::info!(records_len = records.len(), "dry run; snapshot not written");
        return Ok(RunOutcome::DryRun {
            records: records.len(),
        });
    }

    let path = write_snapshot(&settings.data_dir, generated_at, &records)?;
    Ok(RunOutcome::Written(path))
}

/// Runs a pass immediately and then every `every`, one at a time, until
/// `shutdown` resolves. Ticks missed during a slow pass are skipped. Returns
/// how many passes were started.
pub async fn run_scheduled<R, S>(
    settings: &Settings,
    pipeline: &mut Pipeline<R>,
    every: Duration,
    dry_run: bool,
    shutdown: S,
) -> usize
where
    R: Rng,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut passes = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                passes += 1;
                if let Err(err) = run_once(settings, pipeline, dry_run).await {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(
                        error = %format!("{err:#}"),
                        pass = passes,
                        "aggregation pass failed"
                    );
                }
            }
            _ = &mut shutdown => {
                tracing::info!(passes, "shutdown requested; scheduler stopped");
                break;
            }
        }
    }
    passes
}
