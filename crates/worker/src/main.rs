use anyhow::Context;
use clap::Parser;
use ivv_core::config::Settings;
use ivv_core::pipeline::{Pipeline, Sources};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;

mod logging;
mod run;

#[derive(Debug, Parser)]
#[command(name = "ivv_worker")]
struct Args {
    /// Cities file. Overrides IVV_CITIES_PATH.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Snapshot directory. Overrides IVV_DATA_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run a single pass and exit.
    #[arg(long)]
    once: bool,

    /// Minutes between passes. Overrides RUN_INTERVAL_MINUTES.
    #[arg(long)]
    interval_minutes: Option<u64>,

    /// Seed for the simulated exchange-rate history.
    #[arg(long)]
    seed: Option<u64>,

    /// Do everything except writing the snapshot.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);
    let _log_guards = logging::init_tracing(settings.log_dir.as_deref())?;

    let args = Args::parse();
    apply_args(&mut settings, &args);

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let sources = Sources::http_from_settings(&settings)?;
    let mut pipeline = Pipeline::new(sources, settings.reference_timezone.clone(), rng);

    if args.once {
        let outcome = run::run_once(&settings, &mut pipeline, args.dry_run)
            .await
            .map_err(|err| {
                sentry_anyhow::capture_anyhow(&err);
                err
            })?;
        tracing::info!(?outcome, "single pass finished");
        return Ok(());
    }

    let every = run_interval(settings.run_interval_minutes)?;
    tracing::info!(
        interval_minutes = settings.run_interval_minutes,
        data_dir = %settings.data_dir.display(),
        "scheduler started"
    );
    run::run_scheduled(&settings, &mut pipeline, every, args.dry_run, shutdown_signal()).await;
    Ok(())
}

fn apply_args(settings: &mut Settings, args: &Args) {
    if let Some(path) = &args.config {
        settings.cities_path = path.clone();
    }
    if let Some(dir) = &args.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(minutes) = args.interval_minutes {
        settings.run_interval_minutes = minutes;
    }
}

fn run_interval(minutes: u64) -> anyhow::Result<Duration> {
    anyhow::ensure!(minutes > 0, "run interval must be at least one minute");
    let secs = minutes
        .checked_mul(60)
        .context("run interval is too large")?;
    Ok(Duration::from_secs(secs))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_environment_settings() {
        let args = Args::try_parse_from([
            "ivv_worker",
            "--config",
            "cities.json",
            "--data-dir",
            "/tmp/ivv",
            "--interval-minutes",
            "15",
            "--seed",
            "9",
            "--once",
        ])
        .unwrap();
        assert!(args.once);
        assert!(!args.dry_run);
        assert_eq!(args.seed, Some(9));

        let mut settings = Settings::default();
        apply_args(&mut settings, &args);
        assert_eq!(settings.cities_path, PathBuf::from("cities.json"));
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/ivv"));
        assert_eq!(settings.run_interval_minutes, 15);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(run_interval(0).is_err());
        assert_eq!(run_interval(30).unwrap(), Duration::from_secs(1800));
    }
}
