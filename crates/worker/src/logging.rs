use anyhow::Context;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Current file plus three rotated backups.
const MAX_LOG_FILES: usize = 4;

/// Installs the process subscriber: stderr, Sentry, and with `log_dir` set
/// daily `app.*.log` (INFO+) and `error.*.log` (ERROR+) files.
///
/// The returned guards flush the file writers when dropped; keep them alive
/// until the process exits.
pub fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();

    let (app_layer, error_layer) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log dir {}", dir.display()))?;

            let (app_writer, app_guard) = tracing_appender::non_blocking(daily_file(dir, "app")?);
            let (error_writer, error_guard) =
                tracing_appender::non_blocking(daily_file(dir, "error")?);
            guards.push(app_guard);
            guards.push(error_guard);

            (
                Some(
                    fmt::layer()
                        .with_writer(app_writer)
                        .with_ansi(false)
                        .with_filter(LevelFilter::INFO),
                ),
                Some(
                    fmt::layer()
                        .with_writer(error_writer)
                        .with_ansi(false)
                        .with_filter(LevelFilter::ERROR),
                ),
            )
        }
        None => (None, None),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(app_layer)
        .with(error_layer)
        .with(sentry_tracing::layer())
        .try_init()
        .context("failed to install tracing subscriber")?;

    if let Some(dir) = log_dir {
        tracing::info!(log_dir = %dir.display(), "file logging enabled");
    }
    Ok(guards)
}

/// Daily `<prefix>.YYYY-MM-DD.log`, pruned to the newest [`MAX_LOG_FILES`].
fn daily_file(dir: &Path, prefix: &str) -> anyhow::Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("failed to open {prefix} log in {}", dir.display()))
}
