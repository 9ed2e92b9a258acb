//! Errors raised on the Bluetooth side.

use meteo_core::{Error, ErrorCode};
use meteo_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for Bluetooth operations.
pub type Result<T> = std::result::Result<T, BleError>;

#[derive(Debug, Error)]
pub enum BleError {
    #[error("No Bluetooth adapter at index {0}")]
    AdapterNotFound(usize),

    #[error("Weather station not found: {0}")]
    DeviceNotFound(String),

    #[error("Station service {0} not found on device")]
    ServiceNotFound(Uuid),

    #[error("Characteristic {0} not found on device")]
    CharacteristicNotFound(Uuid),

    #[error("Not connected to a weather station")]
    NotConnected,

    #[error("No {what} within {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("Expected response 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedResponse { expected: u8, actual: u8 },

    #[error("Notification stream closed")]
    StreamClosed,

    #[error("Timestamp {0} does not fit the station clock")]
    InvalidTimestamp(i64),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Bluetooth error: {0}")]
    Btle(#[from] btleplug::Error),
}

impl BleError {
    /// Core error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BleError::AdapterNotFound(_) => ErrorCode::AdapterNotFound,
            BleError::DeviceNotFound(_) => ErrorCode::DeviceNotFound,
            BleError::ServiceNotFound(_) => ErrorCode::ServiceNotFound,
            BleError::CharacteristicNotFound(_) => ErrorCode::CharacteristicNotFound,
            BleError::NotConnected | BleError::StreamClosed => ErrorCode::NotConnected,
            BleError::Timeout { .. } => ErrorCode::ResponseTimeout,
            BleError::UnexpectedResponse { .. } => ErrorCode::UnexpectedResponse,
            BleError::InvalidTimestamp(_) => ErrorCode::InvalidInput,
            BleError::Protocol(e) => e.code(),
            BleError::Btle(_) => ErrorCode::BluetoothError,
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            BleError::AdapterNotFound(_) => {
                Some("Check that Bluetooth is enabled, or set [ble] adapter_index")
            }
            BleError::DeviceNotFound(_) => {
                Some("Make sure the station is powered on and in range, then run `meteo scan`")
            }
            BleError::ServiceNotFound(_) | BleError::CharacteristicNotFound(_) => {
                Some("The device does not look like a weather station running protocol revision 1")
            }
            BleError::Timeout { .. } => {
                Some("Move closer to the station or raise [ble] response_timeout_ms")
            }
            _ => None,
        }
    }
}

impl From<BleError> for Error {
    fn from(err: BleError) -> Self {
        let mut out = Error::new(err.code(), err.to_string());
        if let Some(suggestion) = err.suggestion() {
            out = out.with_suggestion(suggestion);
        }
        out.with_source(err)
    }
}
