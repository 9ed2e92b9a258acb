//! Configuration schema definitions
//!
//! Shared configuration types for every meteo tool.

use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub ble: BleConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// Bluetooth adapter and timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleConfig {
    /// Index of the host adapter to use
    #[serde(default)]
    pub adapter_index: usize,

    /// How long a scan listens for advertisements
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,

    /// Upper bound for establishing a GATT connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long a query waits for its response notification
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,

    /// Only report stations whose name contains this substring
    #[serde(default)]
    pub name_filter: Option<String>,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            scan_timeout_secs: default_scan_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            response_timeout_ms: default_response_timeout(),
            name_filter: None,
        }
    }
}

impl BleConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

fn default_scan_timeout() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_response_timeout() -> u64 {
    2000
}

/// Default station selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Address of the station to connect to when `--device` is not given
    #[serde(default)]
    pub address: Option<String>,

    /// Display name used when the station does not advertise one
    #[serde(default = "default_device_name")]
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: None,
            name: default_device_name(),
        }
    }
}

fn default_device_name() -> String {
    "Weather station".to_string()
}

/// Measurement log download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Abort a download after this long without a log notification
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Directory for exported log files
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            export_dir: default_export_dir(),
        }
    }
}

impl LogConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Export directory with `~` and environment variables expanded
    pub fn export_dir_expanded(&self) -> String {
        shellexpand::full(&self.export_dir)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| self.export_dir.clone())
    }
}

fn default_idle_timeout() -> u64 {
    5
}

fn default_export_dir() -> String {
    ".".to_string()
}

/// Connection retry policy, as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetrySettings {
    /// Convert to the runtime retry policy
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
            attempt_timeout: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    250
}

fn default_max_delay() -> u64 {
    4000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
