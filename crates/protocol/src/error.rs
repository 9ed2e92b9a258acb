//! Error types for the protocol crate.

use meteo_core::{Error, ErrorCode};
use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding station frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The buffer ends before the frame does
    #[error("Incomplete frame: {needed} more byte(s) required")]
    Incomplete {
        /// Bytes still missing
        needed: usize,
    },

    /// A known response carried fewer bytes than its layout needs
    #[error("Response 0x{code:02X} payload too short: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort {
        /// Response function code
        code: u8,
        /// Minimum payload length
        expected: usize,
        /// Payload length received
        actual: usize,
    },

    /// Payload does not fit the single-byte length field
    #[error("Payload too long: {0} bytes (max 255)")]
    PayloadTooLong(usize),

    /// Channel name not recognised
    #[error("Unknown calibration channel: {0} (expected p, t, h or t1)")]
    UnknownChannel(String),
}

impl ProtocolError {
    /// Core error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProtocolError::Incomplete { .. } => ErrorCode::IncompleteFrame,
            ProtocolError::PayloadTooShort { .. } => ErrorCode::PayloadTooShort,
            ProtocolError::PayloadTooLong(_) => ErrorCode::PayloadTooLong,
            ProtocolError::UnknownChannel(_) => ErrorCode::InvalidInput,
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::new(err.code(), err.to_string()).with_source(err)
    }
}
