//! Station errors
//!
//! Every failure that reaches the CLI is an [`Error`]: a numeric
//! [`ErrorCode`] whose thousands digit names its [`Category`], a message,
//! and optional context and hint lines. The category decides the process
//! exit status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Process exit statuses
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const VALIDATION_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const BLUETOOTH_ERROR: i32 = 6;
    /// Same status as coreutils `timeout`
    pub const TIMEOUT: i32 = 124;
}

/// Family of an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    General,
    #[serde(rename = "IO")]
    Io,
    Configuration,
    Protocol,
    Bluetooth,
    Validation,
    Device,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::General => "General",
            Category::Io => "IO",
            Category::Configuration => "Configuration",
            Category::Protocol => "Protocol",
            Category::Bluetooth => "Bluetooth",
            Category::Validation => "Validation",
            Category::Device => "Device",
        }
    }

    fn exit_code(self) -> i32 {
        match self {
            Category::Configuration => exit_codes::CONFIG_ERROR,
            Category::Bluetooth => exit_codes::BLUETOOTH_ERROR,
            Category::Validation => exit_codes::VALIDATION_ERROR,
            _ => exit_codes::FAILURE,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Numeric codes, rendered as `E` plus four digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Internal = 1001,
    Timeout = 1003,

    IoError = 2000,
    FileNotFound = 2001,
    PermissionDenied = 2002,

    ConfigError = 3000,
    ConfigNotFound = 3001,
    ConfigParseError = 3002,
    ConfigValidationError = 3003,

    ProtocolError = 4000,
    IncompleteFrame = 4001,
    PayloadTooShort = 4002,
    PayloadTooLong = 4003,
    UnexpectedResponse = 4004,

    BluetoothError = 5000,
    AdapterNotFound = 5001,
    DeviceNotFound = 5002,
    ServiceNotFound = 5003,
    CharacteristicNotFound = 5004,
    NotConnected = 5005,
    ResponseTimeout = 5006,

    ValidationError = 6000,
    InvalidInput = 6001,
    InvalidFormat = 6002,

    DeviceError = 7000,
    LogReadInterrupted = 7001,
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn category(self) -> Category {
        match self.code() / 1000 {
            2 => Category::Io,
            3 => Category::Configuration,
            4 => Category::Protocol,
            5 => Category::Bluetooth,
            6 => Category::Validation,
            7 => Category::Device,
            _ => Category::General,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Coded error with optional context, hint and cause
#[derive(Error, Debug)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    /// What was being done when it failed
    pub context: Option<String>,
    /// What the user can try next
    pub suggestion: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        let extras = [("Context", &self.context), ("Suggestion", &self.suggestion)];
        for (label, text) in extras {
            if let Some(text) = text {
                write!(f, "\n  {}: {}", label, text)?;
            }
        }
        Ok(())
    }
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_suggestion(self, suggestion: impl Into<String>) -> Self {
        Self {
            suggestion: Some(suggestion.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_source(self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..self
        }
    }

    /// Whether another attempt might succeed: radio and timing failures
    /// are, a missing adapter or bad input is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::Timeout
                | ErrorCode::BluetoothError
                | ErrorCode::DeviceNotFound
                | ErrorCode::ServiceNotFound
                | ErrorCode::NotConnected
                | ErrorCode::ResponseTimeout
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self.code {
            ErrorCode::Timeout | ErrorCode::ResponseTimeout => exit_codes::TIMEOUT,
            code => code.category().exit_code(),
        }
    }

    /// JSON-friendly snapshot, used by `--format json`
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code,
            code_str: self.code.to_string(),
            category: self.code.category(),
            message: self.message.clone(),
            context: self.context.clone(),
            suggestion: self.suggestion.clone(),
            source: self.source.as_ref().map(ToString::to_string),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn config_not_found(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().display();
        Self::new(ErrorCode::ConfigNotFound, format!("No configuration at {}", path))
            .with_suggestion("Create .meteo-station.toml or point --config at an existing file")
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProtocolError, message)
    }

    pub fn bluetooth(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BluetoothError, message)
    }

    pub fn adapter_not_found() -> Self {
        Self::new(ErrorCode::AdapterNotFound, "No Bluetooth adapter available")
            .with_suggestion("Power on the adapter or pick another one with [ble] adapter_index")
    }

    pub fn device_not_found(address: &str) -> Self {
        Self::new(ErrorCode::DeviceNotFound, format!("No station answered at {}", address))
            .with_suggestion("Check that the station is powered and in range; `meteo scan` lists what is visible")
    }

    pub fn not_connected() -> Self {
        Self::new(ErrorCode::NotConnected, "Not connected to a weather station")
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }
}

/// Serialized form of an [`Error`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub code_str: String,
    pub category: Category,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::NotFound => ErrorCode::FileNotFound,
            ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            ErrorKind::TimedOut => ErrorCode::Timeout,
            _ => ErrorCode::IoError,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorCode::InvalidFormat, format!("JSON: {}", err)).with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("TOML: {}", err)).with_source(err)
    }
}

/// `.context()` and `.with_suggestion()` on [`Result`]
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_suggestion(suggestion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_render_with_four_digits() {
        assert_eq!(ErrorCode::FileNotFound.to_string(), "E2001");
        assert_eq!(ErrorCode::BluetoothError.to_string(), "E5000");
        assert_eq!(ErrorCode::Internal.to_string(), "E1001");
    }

    #[test]
    fn test_thousands_digit_selects_category() {
        assert_eq!(ErrorCode::IoError.category(), Category::Io);
        assert_eq!(ErrorCode::IncompleteFrame.category(), Category::Protocol);
        assert_eq!(ErrorCode::NotConnected.category(), Category::Bluetooth);
        assert_eq!(ErrorCode::LogReadInterrupted.category(), Category::Device);
        assert_eq!(ErrorCode::Timeout.category(), Category::General);
    }

    #[test]
    fn test_display_lists_context_and_suggestion() {
        let err = Error::device_not_found("AA:BB:CC:DD:EE:FF").with_context("Connecting to the default station");
        let text = err.to_string();

        assert!(text.starts_with("[E5002] No station answered at AA:BB:CC:DD:EE:FF"));
        assert!(text.contains("\n  Context: Connecting to the default station"));
        assert!(text.contains("\n  Suggestion: "));
    }

    #[test]
    fn test_exit_codes_follow_category() {
        assert_eq!(Error::not_connected().exit_code(), exit_codes::BLUETOOTH_ERROR);
        assert_eq!(Error::config("bad").exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(Error::validation("bad").exit_code(), exit_codes::VALIDATION_ERROR);
        assert_eq!(Error::new(ErrorCode::ResponseTimeout, "late").exit_code(), exit_codes::TIMEOUT);
        assert_eq!(Error::protocol("junk").exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn test_transient_errors() {
        assert!(Error::bluetooth("link dropped").is_transient());
        assert!(Error::device_not_found("AA:BB").is_transient());
        assert!(Error::new(ErrorCode::Timeout, "slow").is_transient());
        assert!(!Error::adapter_not_found().is_transient());
        assert!(!Error::config("bad").is_transient());
        assert!(!Error::new(ErrorCode::CharacteristicNotFound, "fw").is_transient());
    }

    #[test]
    fn test_report_serialization() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "pipe closed");
        let err = Error::protocol("Unexpected response code 0x42")
            .with_context("Reading coefficients")
            .with_source(io);

        let json = serde_json::to_value(err.to_report()).unwrap();
        assert_eq!(json["code"], "PROTOCOL_ERROR");
        assert_eq!(json["code_str"], "E4000");
        assert_eq!(json["category"], "Protocol");
        assert_eq!(json["context"], "Reading coefficients");
        assert_eq!(json["source"], "pipe closed");
        assert!(json.get("suggestion").is_none());
    }

    #[test]
    fn test_io_error_kinds() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(missing).code, ErrorCode::FileNotFound);
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert_eq!(Error::from(denied).code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn test_result_ext_adds_suggestion() {
        let result: Result<()> = Err(Error::bluetooth("adapter busy"));
        let err = result.with_suggestion("retry later").unwrap_err();
        assert_eq!(err.suggestion.as_deref(), Some("retry later"));
    }
}
