//! Logging setup for binaries and tests that drive the client.
//!
//! Library code only emits `tracing` events; this module installs the
//! subscriber that writes them. Raw output mode keeps the destination but
//! strips timestamps, levels and targets so protocol dumps read verbatim.

use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing::{subscriber::SetGlobalDefaultError, Subscriber};
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::EnvFilter;

use crate::config::LogSettings;

const DEFAULT_FILTER: &str = "info";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Why the log subscriber could not be installed.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("cannot open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Install the global subscriber on first call; later calls are no-ops.
pub fn initialise(settings: &LogSettings, raw_output: bool) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(settings, raw_output))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(settings: &LogSettings, raw_output: bool) -> Result<(), TelemetryError> {
    let filter = build_filter(settings)?;
    let (writer, ansi) = match &settings.file {
        Some(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(path)?)), false),
        None => (BoxMakeWriter::new(io::stderr), io::stderr().is_terminal()),
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_thread_ids(false)
        .with_thread_names(false);

    let subscriber: Box<dyn Subscriber + Send + Sync> = if raw_output {
        Box::new(
            builder
                .without_time()
                .with_level(false)
                .with_target(false)
                .finish(),
        )
    } else {
        Box::new(builder.with_level(true).with_target(true).finish())
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn build_filter(settings: &LogSettings) -> Result<EnvFilter, TelemetryError> {
    let directive = settings.priority.as_deref().unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directive).map_err(|e| TelemetryError::Filter(e.to_string()))
}

fn open_log_file(path: &Path) -> Result<File, TelemetryError> {
    let file_error = |source| TelemetryError::File {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(file_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(file_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_info() {
        assert!(build_filter(&LogSettings::default()).is_ok());
    }

    #[test]
    fn bad_filter_is_reported() {
        let settings = LogSettings {
            file: None,
            priority: Some("zsapi_core=loud".to_string()),
        };
        assert!(matches!(build_filter(&settings), Err(TelemetryError::Filter(_))));
    }

    #[test]
    fn log_file_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/zsapi.log");
        open_log_file(&path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn initialise_is_idempotent() {
        let settings = LogSettings::default();
        initialise(&settings, false).unwrap();
        initialise(&settings, true).unwrap();
    }
}
