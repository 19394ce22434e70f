//! Log output for the `triad` binary.
//!
//! Everything goes to stderr so `--json` output on stdout stays parseable.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{EnvFilter, fmt};

use crate::TriadError;
use crate::config::LoggingConfig;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Subscriber settings derived from `[logging]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryOptions {
    /// `EnvFilter` directive string, e.g. `info` or `triad_core=debug,warn`.
    pub filter: String,
    pub ansi: bool,
    pub show_target: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
            show_target: false,
        }
    }
}

impl TelemetryOptions {
    pub fn from_logging(logging: &LoggingConfig) -> Self {
        Self::with_rust_log(logging, std::env::var("RUST_LOG").ok())
    }

    /// Precedence: `debug = true`, then a non-empty `RUST_LOG`, then `level`.
    /// Debug mode also prints event targets.
    fn with_rust_log(logging: &LoggingConfig, rust_log: Option<String>) -> Self {
        let filter = if logging.debug {
            "debug".to_string()
        } else {
            rust_log
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| logging.level.clone())
        };
        Self {
            filter,
            show_target: logging.debug,
            ..Self::default()
        }
    }
}

/// Install the global stderr subscriber.
///
/// Returns `Ok(false)` when a previous call already installed it. A malformed
/// filter is a configuration error rather than a silent fallback.
pub fn init_telemetry(options: TelemetryOptions) -> Result<bool, TriadError> {
    let filter = EnvFilter::try_new(&options.filter).map_err(|err| {
        TriadError::InvalidConfiguration(format!("logging filter {:?}: {err}", options.filter))
    })?;

    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }

    fmt()
        .with_env_filter(filter)
        .with_ansi(options.ansi)
        .with_target(options.show_target)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| {
            INSTALLED.store(false, Ordering::SeqCst);
            TriadError::InvalidConfiguration(format!("tracing subscriber: {err}"))
        })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str, debug: bool) -> LoggingConfig {
        LoggingConfig {
            level: level.into(),
            debug,
        }
    }

    #[test]
    fn debug_flag_wins_over_rust_log() {
        let options =
            TelemetryOptions::with_rust_log(&logging("warn", true), Some("error".into()));
        assert_eq!(options.filter, "debug");
        assert!(options.show_target);
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        let options =
            TelemetryOptions::with_rust_log(&logging("warn", false), Some("triad_core=trace".into()));
        assert_eq!(options.filter, "triad_core=trace");
        assert!(!options.show_target);

        let blank = TelemetryOptions::with_rust_log(&logging("warn", false), Some("  ".into()));
        assert_eq!(blank.filter, "warn");

        let unset = TelemetryOptions::with_rust_log(&logging("error", false), None);
        assert_eq!(unset.filter, "error");
    }

    #[test]
    fn second_install_is_a_no_op() {
        let options = TelemetryOptions {
            filter: "warn".into(),
            ansi: false,
            show_target: false,
        };
        init_telemetry(options.clone()).unwrap();
        assert!(!init_telemetry(options).unwrap());
    }

    #[test]
    fn malformed_filter_is_rejected() {
        let options = TelemetryOptions {
            filter: "triad_core=loudest".into(),
            ..TelemetryOptions::default()
        };
        let err = init_telemetry(options).unwrap_err();
        assert!(matches!(err, TriadError::InvalidConfiguration(_)));
    }
}
