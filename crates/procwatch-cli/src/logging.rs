use crate::config::LogConfig;
use anyhow::{Context, Result};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stderr and daily-rotated file layers
///
/// `RUST_LOG` wins over the configured level; `verbose` raises the fallback
/// to `debug`. The returned guard flushes the file writer on drop and must
/// live as long as the program.
pub fn init_logging(config: &LogConfig, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir).with_context(|| {
        format!(
            "Failed to create log directory {}",
            config.log_dir.display()
        )
    })?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .with(env_filter(&config.level, verbose))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    debug!("Logging initialized");

    Ok(guard)
}

fn env_filter(level: &str, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { level };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}
