use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Keeps the background log writer alive; drop it to flush.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub log_path: Option<PathBuf>,
}

/// Installs a JSON `tracing` subscriber when structured logging is enabled.
///
/// Events go to `logging.file` when set and to stderr otherwise. `RUST_LOG`
/// takes precedence over the configured level.
pub fn init_logging(logging: &LoggingConfig) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let (writer, guard, log_path) = match logging.file.as_deref() {
        Some(path) => {
            let file = create_log_file(path)?;
            let (writer, guard) = non_blocking::NonBlockingBuilder::default()
                .lossy(false)
                .finish(file);
            (writer, guard, Some(path.to_path_buf()))
        }
        None => {
            let (writer, guard) = non_blocking::NonBlockingBuilder::default()
                .lossy(false)
                .finish(std::io::stderr());
            (writer, guard, None)
        }
    };

    let level = logging.level().unwrap_or(Level::INFO);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // A subscriber may already be installed (tests, embedding applications).
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(Some(LoggingGuard {
        _guard: guard,
        log_path,
    }))
}

fn create_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory at {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("creating log file at {}", path.display()))
}
