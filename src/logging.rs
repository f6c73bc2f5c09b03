use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, RollingFileAppender},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "cohort.log";

pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: String,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Initializes the JSON file layer (non-blocking, rolling) plus an optional
/// stderr WARN layer, purges expired log files, and stamps the process with
/// a run id.
pub fn init_tracing(logging_config: &LoggingConfig) -> Result<LoggingGuard> {
    if logging_config.filter.trim().is_empty() {
        return Err(anyhow!("logging.filter cannot be empty"));
    }
    if logging_config.dir.as_os_str().is_empty() {
        return Err(anyhow!("logging.dir cannot be empty"));
    }

    let log_dir = resolve_log_dir(&logging_config.dir)?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create logging directory {}", log_dir.display()))?;

    let retention_warnings =
        purge_expired_logs(&log_dir, logging_config.retention_days, SystemTime::now());

    let appender = build_rolling_appender(&log_dir, logging_config.rotation.clone());
    let (non_blocking_writer, worker_guard) = tracing_appender::non_blocking(appender);
    let env_filter = EnvFilter::try_new(&logging_config.filter)
        .with_context(|| format!("failed to parse logging.filter '{}'", logging_config.filter))?;

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_ansi(false)
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    let stderr_layer = logging_config.stderr_warn_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = %log_dir.display(),
        filter = %logging_config.filter,
        rotation = ?logging_config.rotation,
        retention_days = logging_config.retention_days,
        "logging_initialized"
    );
    for warning in retention_warnings {
        tracing::warn!(target: "logging", warning = %warning, "logging_retention_warning");
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
    })
}

fn build_rolling_appender(log_dir: &Path, rotation: LoggingRotation) -> RollingFileAppender {
    match rotation {
        LoggingRotation::Daily => rolling::daily(log_dir, LOG_FILE_PREFIX),
        LoggingRotation::Hourly => rolling::hourly(log_dir, LOG_FILE_PREFIX),
    }
}

fn resolve_log_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("failed to read current working directory for logging.dir resolution")?
        .join(dir))
}

/// Removes prefixed log files older than the retention window. Warnings are
/// collected rather than logged because tracing is not initialized yet when
/// this runs.
fn purge_expired_logs(log_dir: &Path, retention_days: usize, now: SystemTime) -> Vec<String> {
    let retention = Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60) as u64);
    let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);
    let mut warnings = Vec::new();

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warnings.push(format!(
                "failed to scan logging directory {}: {err}",
                log_dir.display()
            ));
            return warnings;
        }
    };

    for entry_result in entries {
        if let Err(warning) = purge_entry(entry_result, cutoff) {
            warnings.push(warning);
        }
    }

    warnings
}

fn purge_entry(
    entry_result: std::io::Result<fs::DirEntry>,
    cutoff: SystemTime,
) -> std::result::Result<(), String> {
    let entry =
        entry_result.map_err(|err| format!("failed to iterate logging directory: {err}"))?;
    if !entry
        .file_name()
        .to_string_lossy()
        .starts_with(LOG_FILE_PREFIX)
    {
        return Ok(());
    }

    let metadata = entry
        .metadata()
        .map_err(|err| format!("failed to stat {}: {err}", entry.path().display()))?;
    if !metadata.is_file() {
        return Ok(());
    }

    let modified = metadata
        .modified()
        .map_err(|err| format!("failed to read mtime for {}: {err}", entry.path().display()))?;
    if modified <= cutoff {
        fs::remove_file(entry.path()).map_err(|err| {
            format!(
                "failed to remove expired log file {}: {err}",
                entry.path().display()
            )
        })?;
    }
    Ok(())
}
