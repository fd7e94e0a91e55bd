use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Console logging from `RUST_LOG` (default `info`), plus a timestamped
/// file under `log_dir` when one is given.
///
/// The returned guard must stay alive until exit so the file writer flushes.
pub(crate) fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer().with_target(false).with_filter(console_filter);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry().with(console_layer).init();
        return Ok(None);
    };

    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let log_filename = format!("tarot_{}.log", Utc::now().format("%Y%m%d_%H%M%S"));
    let file_appender = tracing_appender::rolling::never(log_dir, &log_filename);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = EnvFilter::new("info")
        .add_directive("tarot_oracle=debug".parse()?)
        .add_directive("tarot_agent=debug".parse()?);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(non_blocking_file)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging to file: {}", log_dir.join(&log_filename).display());

    Ok(Some(guard))
}
