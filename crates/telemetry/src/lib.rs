//! Logging setup and process metrics for the meteo tools
//!
//! [`init_with_config`] installs the tracing subscriber once per process.
//! Every process gets a random [`session_id`] that tags the startup event
//! and the `--metrics` dump.

use anyhow::Context;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

mod metrics;

pub use metrics::{metrics, names, MetricsRegistry, Snapshot, Summary, Timer};

static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Subscriber options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    pub show_target: bool,
    pub ansi: bool,
    /// JSON lines instead of compact text
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            show_target: false,
            ansi: true,
            json: false,
        }
    }
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `config.log_level`. Fails when the level does not
/// parse or a subscriber is already installed.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log level '{}'", config.log_level))?,
    };

    let text = (!config.json).then(|| {
        fmt::layer()
            .compact()
            .with_target(config.show_target)
            .with_ansi(config.ansi)
            .with_writer(std::io::stderr)
    });
    let json = config
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .context("Tracing subscriber already installed")?;

    tracing::info!(
        session_id = session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );
    Ok(())
}

/// Level directive after `-v`/`-q`: `quiet` forces `error`, one `-v` is
/// `debug`, more is `trace`.
pub fn level_for_verbosity(base: &str, verbose: u8, quiet: bool) -> String {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => base,
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    level.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity("info", 0, false), "info");
        assert_eq!(level_for_verbosity("info", 1, false), "debug");
        assert_eq!(level_for_verbosity("info", 3, false), "trace");
        assert_eq!(level_for_verbosity("info", 2, true), "error");
    }

    #[test]
    fn test_session_id_is_stable_uuid() {
        let id = session_id();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(id, session_id());
    }

    #[test]
    fn test_default_level_is_info() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = init_with_config(TelemetryConfig {
            log_level: "meteo=loud".to_string(),
            ..TelemetryConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }
}
