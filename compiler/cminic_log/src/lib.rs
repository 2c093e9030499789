//! Minimal, self-contained logger setup for the `cminic` toolchain.
//!
//! Any crate in the workspace can emit `tracing` events without depending on
//! the `cminic` binary itself; only the binary calls [`Logger::init_logger`].
//!
//! ```rust,no_run
//! fn main() {
//!     cminic_log::Logger::init_logger(cminic_log::LoggerConfig::from_env("CMINIC")).unwrap();
//! }
//! ```
//!
//! ```bash
//! CMINIC_FILTER=debug cminic input.c
//! ```

use std::{env::VarError, fs::File, io::IsTerminal, path::PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt::layer, prelude::*, registry::LookupSpan, util::TryInitError,
};

/// The logger for the `cminic` toolchain.
pub struct Logger;

/// Where the logger writes its output.
pub enum LogWriter {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// Configuration for the logger, normally built from environment variables.
pub struct LoggerConfig {
    pub log_writer: LogWriter,
    /// "debug", "info", "warn", "error", or "trace" (or an `EnvFilter` directive string).
    pub filter: Result<String, VarError>,
    /// "always", "never", or "auto".
    pub color: Result<String, VarError>,
    /// "1" to show source line numbers in log output.
    pub line_numbers: Result<String, VarError>,
}

/// Errors that can occur while configuring or installing the logger.
#[derive(Debug)]
pub enum LogError {
    ColorNotValid(String),
    NotUnicode(String),
    IoError(std::io::Error),
    TryInitError(TryInitError),
}

impl LoggerConfig {
    /// Build a configuration from `<env_var>_FILTER`, `<env_var>_COLOR`,
    /// `<env_var>_LOG_WRITER`, and `<env_var>_LINE_NUMBERS`.
    pub fn from_env(env_var: &str) -> Self {
        let filter = std::env::var(format!("{}_FILTER", env_var));
        let color = std::env::var(format!("{}_COLOR", env_var));
        let log_writer = std::env::var(format!("{}_LOG_WRITER", env_var))
            .map(|s| match s.as_str() {
                "stdout" => LogWriter::Stdout,
                "stderr" => LogWriter::Stderr,
                _ => LogWriter::File(s.into()),
            })
            .unwrap_or(LogWriter::Stderr);
        let line_numbers = std::env::var(format!("{}_LINE_NUMBERS", env_var));

        LoggerConfig {
            filter,
            color,
            log_writer,
            line_numbers,
        }
    }
}

impl Logger {
    /// Install the global `tracing` subscriber. Safe to call more than once;
    /// a second call is a no-op (the underlying `try_init` simply fails quietly).
    pub fn init_logger(cfg: LoggerConfig) -> Result<(), LogError> {
        let filter = match cfg.filter {
            Ok(filter) => EnvFilter::new(filter),
            Err(_) => EnvFilter::default().add_directive(tracing::Level::INFO.into()),
        };

        let color_log = match cfg.color {
            Ok(color) => match color.as_str() {
                "always" => true,
                "never" => false,
                "auto" => std::io::stderr().is_terminal(),
                e => return Err(LogError::ColorNotValid(e.to_string())),
            },
            Err(VarError::NotPresent) => std::io::stderr().is_terminal(),
            Err(VarError::NotUnicode(os_string)) => {
                return Err(LogError::NotUnicode(
                    os_string.to_string_lossy().to_string(),
                ));
            }
        };

        let line_numbers = match cfg.line_numbers {
            Ok(line_numbers) => &line_numbers == "1",
            Err(_) => false,
        };

        let layer = Self::create_layer(cfg.log_writer, color_log, line_numbers);

        let subscriber = tracing_subscriber::Registry::default()
            .with(filter)
            .with(layer);

        subscriber
            .try_init()
            .map_err(LogError::TryInitError)?;

        Ok(())
    }

    fn create_layer<S>(
        log_writer: LogWriter,
        color_log: bool,
        line_numbers: bool,
    ) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: Subscriber,
        for<'a> S: LookupSpan<'a>,
    {
        let layer = layer()
            .with_ansi(color_log)
            .with_target(true)
            .with_line_number(line_numbers);

        match log_writer {
            LogWriter::Stdout => Box::new(layer.with_writer(std::io::stdout)),
            LogWriter::Stderr => Box::new(layer.with_writer(std::io::stderr)),
            LogWriter::File(path) => {
                let file = File::create(path).expect("failed to create log file");
                Box::new(layer.with_writer(file))
            }
        }
    }
}

impl std::error::Error for LogError {}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::ColorNotValid(s) => write!(f, "color not valid: {}", s),
            LogError::NotUnicode(s) => write!(f, "not unicode: {}", s),
            LogError::IoError(e) => write!(f, "IO error: {}", e),
            LogError::TryInitError(e) => write!(f, "logger already initialized: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_defaults_to_stderr_writer() {
        // SAFETY: tests in this crate do not run concurrently with other
        // code that reads this process's environment.
        unsafe {
            std::env::remove_var("CMINIC_TEST_LOG_WRITER");
        }
        let cfg = LoggerConfig::from_env("CMINIC_TEST");
        assert!(matches!(cfg.log_writer, LogWriter::Stderr));
    }

    #[test]
    fn from_env_reads_file_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cminic.log");
        unsafe {
            std::env::set_var("CMINIC_TEST2_LOG_WRITER", path.to_str().unwrap());
        }
        let cfg = LoggerConfig::from_env("CMINIC_TEST2");
        match cfg.log_writer {
            LogWriter::File(p) => assert_eq!(p, path),
            _ => panic!("expected file writer"),
        }
        unsafe {
            std::env::remove_var("CMINIC_TEST2_LOG_WRITER");
        }
    }
}
