//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, ErrorCode, Result};
use crate::validation::{ValidationResult, Validator};
use std::path::{Path, PathBuf};

/// Environment variable overriding `[device] address`
pub const ENV_DEVICE: &str = "METEO_DEVICE";

/// Environment variable overriding `[telemetry] log_level`
pub const ENV_LOG_LEVEL: &str = "METEO_LOG_LEVEL";

/// Configuration wrapper
#[derive(Debug, Clone)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: ConfigSchema::default(),
            path: None,
        }
    }
}

impl Config {
    /// Load configuration from a file path or the standard locations, then
    /// apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        let schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        let mut config = Self {
            schema,
            path: config_path,
        };
        config.apply_env_overrides();

        config.validate().to_result().map_err(|e| {
            Error::new(ErrorCode::ConfigValidationError, e.message)
                .with_suggestion("Fix the listed values in your .meteo-station.toml")
        })?;

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the filesystem
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(Self {
            schema: toml::from_str(content)?,
            path: None,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var(ENV_DEVICE) {
            if !address.trim().is_empty() {
                tracing::debug!(address = %address, "device address overridden from environment");
                self.schema.device.address = Some(address.trim().to_string());
            }
        }
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            if !level.trim().is_empty() {
                self.schema.telemetry.log_level = level.trim().to_string();
            }
        }
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> ValidationResult {
        let s = &self.schema;
        Validator::new()
            .range("ble.scan_timeout_secs", s.ble.scan_timeout_secs, 1, 300)
            .range("ble.connect_timeout_secs", s.ble.connect_timeout_secs, 1, 300)
            .range("ble.response_timeout_ms", s.ble.response_timeout_ms, 50, 60_000)
            .range("log.idle_timeout_secs", s.log.idle_timeout_secs, 1, 3600)
            .range("retry.max_attempts", s.retry.max_attempts, 1, 20)
            .custom("retry.backoff_multiplier", || {
                (s.retry.backoff_multiplier < 1.0).then(|| "Must be at least 1.0".to_string())
            })
            .custom("retry.max_delay_ms", || {
                (s.retry.max_delay_ms < s.retry.initial_delay_ms).then(|| {
                    format!("Must not be below retry.initial_delay_ms ({})", s.retry.initial_delay_ms)
                })
            })
            .one_of(
                "telemetry.log_level",
                &s.telemetry.log_level.to_lowercase(),
                &["trace", "debug", "info", "warn", "error"],
            )
            .validate()
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(".meteo-station.toml"),
        PathBuf::from("meteo-station.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("meteo-station").join("config.toml"));
    }

    candidates.into_iter().find(|candidate| candidate.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::new(
            ErrorCode::ConfigParseError,
            format!("Failed to parse config file {}: {}", path.display(), e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Serializes tests that touch the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (name, value) in vars {
            unsafe { std::env::set_var(name, value) };
        }
        let result = f();
        for (name, _) in vars {
            unsafe { std::env::remove_var(name) };
        }
        result
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert_eq!(config.schema.ble.scan_timeout_secs, 5);
        assert_eq!(config.schema.ble.response_timeout_ms, 2000);
        assert_eq!(config.schema.device.name, "Weather station");
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_config_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[ble]\nscan_timeout_secs = 12\n\n[device]\naddress = \"C0:FF:EE:00:11:22\"\n\n[retry]\nmax_attempts = 5"
        )
        .unwrap();

        let config = with_env(&[], || Config::load(Some(file.path()))).unwrap();
        assert_eq!(config.schema.ble.scan_timeout_secs, 12);
        assert_eq!(config.schema.retry.max_attempts, 5);
        assert_eq!(config.schema.log.idle_timeout_secs, 5);
        assert_eq!(config.path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_config_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/meteo.toml"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_attempts = 0\nbackoff_multiplier = 0.5").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigValidationError);
        assert!(err.message.contains("retry.max_attempts"));
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[device]\naddress = \"C0:FF:EE:00:11:22\"\n\n[telemetry]\nlog_level = \"warn\""
        )
        .unwrap();

        let config = with_env(&[(ENV_DEVICE, " AA:BB:CC:DD:EE:FF "), (ENV_LOG_LEVEL, "debug")], || {
            Config::load(Some(file.path()))
        })
        .unwrap();
        assert_eq!(config.schema.device.address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(config.schema.telemetry.log_level, "debug");
    }

    #[test]
    fn test_blank_env_override_keeps_file_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device]\naddress = \"C0:FF:EE:00:11:22\"").unwrap();

        let config = with_env(&[(ENV_DEVICE, "  ")], || Config::load(Some(file.path()))).unwrap();
        assert_eq!(config.schema.device.address.as_deref(), Some("C0:FF:EE:00:11:22"));
    }

    #[test]
    fn test_env_log_level_is_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ble]\nscan_timeout_secs = 5").unwrap();

        let err = with_env(&[(ENV_LOG_LEVEL, "loud")], || Config::load(Some(file.path()))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigValidationError);
        assert!(err.message.contains("telemetry.log_level"));
    }

    #[test]
    fn test_max_delay_below_initial_delay_is_rejected() {
        let config =
            Config::from_toml_str("[retry]\ninitial_delay_ms = 2000\nmax_delay_ms = 500").unwrap();
        let result = config.validate();
        assert!(!result.is_valid());
        assert_eq!(result.errors()[0].field, "retry.max_delay_ms");

        let equal = Config::from_toml_str("[retry]\ninitial_delay_ms = 500\nmax_delay_ms = 500").unwrap();
        assert!(equal.validate().is_valid());
    }

    #[test]
    fn test_config_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ble\nscan_timeout_secs = ").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
    }

    #[test]
    fn test_retry_settings_conversion() {
        let config = Config::from_toml_str("[retry]\ninitial_delay_ms = 100\njitter = false").unwrap();
        let retry = config.schema.retry.to_retry_config();
        assert_eq!(retry.initial_delay, std::time::Duration::from_millis(100));
        assert!(!retry.jitter);
        assert_eq!(retry.max_attempts, 3);
    }
}
