//! Tracing setup for binaries embedding the lifecycle controllers
//!
//! - Console: compact, colored, with targets (precondition failures log under
//!   `mcpadmin::precondition`)
//! - File: optional daily rotation, by default under the platform data dir
//!   (`~/.local/share/mcpadmin/logs` on Linux)

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_PREFIX: &str = "mcpadmin";

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directive used when `RUST_LOG` is not set
    pub default_directive: String,
    /// Also write to daily-rotated files
    pub file_logging: bool,
    /// Overrides the default log directory
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_directive: "info,mcpadmin_core=debug,mcpadmin_client=debug,mcpadmin_lifecycle=debug"
                .to_string(),
            file_logging: false,
            log_dir: None,
        }
    }
}

impl LogConfig {
    pub fn with_file_logging(mut self) -> Self {
        self.file_logging = true;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self.file_logging = true;
        self
    }

    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }
}

/// Platform log directory, falling back to `./logs`
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(LOG_PREFIX).join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the life of the program. Fails if a subscriber is already installed.
pub fn init_tracing(config: LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_directive))
        .with_context(|| format!("Invalid log directive '{}'", config.default_directive))?;

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let (file_layer, guard) = if config.file_logging {
        let dir = config.resolved_log_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_PREFIX)
            .filename_suffix("log")
            .build(&dir)
            .context("Failed to create log file appender")?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_target(true);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(guard)
}
