use std::fs::{self, OpenOptions};
use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::Context;
use tracing::Level;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::constants::LOG_FILE_NAME;

/// Initialize the tracing subscriber to log to a file
///
/// Events are appended to `kukuruku.log` inside `log_dir` through a non-blocking writer, so
/// logging never stalls an interactive exec session. The returned [`WorkerGuard`] must be
/// kept alive until exit, otherwise buffered events are lost. The default level is `INFO`
/// (`DEBUG` when `verbose`), and `RUST_LOG` overrides both.
pub fn init_tracing(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log directory {}", log_dir.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))
        .wrap_err("failed to open kukuruku.log")?;
    let (non_blocking, guard) = non_blocking(file);

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(env_filter)
        .finish()
        .with(ErrorLayer::default())
        .try_init()
        .wrap_err("failed to install tracing subscriber")?;
    Ok(guard)
}
