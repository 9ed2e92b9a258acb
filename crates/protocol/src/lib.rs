//! Wire codec for the nRF52820 weather-station BLE protocol (revision 1).
//!
//! The station exposes one GATT service with a write characteristic for
//! commands and a notify characteristic for responses. Both directions use
//! the same framing:
//!
//! ```text
//! +--------+--------+---------------------+
//! | code   | len    | payload (len bytes) |
//! | 1 byte | 1 byte | little-endian       |
//! +--------+--------+---------------------+
//! ```
//!
//! # Example
//!
//! ```
//! use meteo_protocol::{decode_frame, Query, Response};
//!
//! assert_eq!(Query::FirmwareVersion.encode(), [0x94, 0x00]);
//!
//! let (response, used) = decode_frame(&[0x24, 0x04, 0x07, 0x00, 0x02, 0x01]).unwrap();
//! assert_eq!(used, 6);
//! match response {
//!     Response::FirmwareVersion { version } => assert_eq!(version.to_string(), "v1.2.0.7"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod codes;
mod decoder;
mod error;
mod log;
mod request;
mod response;
mod types;

pub use codes::{CCCD_UUID, NOTIFY_CHAR_UUID, PROTOCOL_VERSION, SERVICE_UUID, WRITE_CHAR_UUID};
pub use decoder::FrameDecoder;
pub use error::{ProtocolError, Result};
pub use log::{LogAssembler, LogEntry, LogRecord};
pub use request::{encode_query, LogControl, Query, RawPayload, Request};
pub use response::{decode_frame, decode_payload, Response};
pub use types::{
    format_date, format_timestamp, timestamp_to_local, Channel, Coefficients, DeviceId,
    DeviceInfo, FirmwareVersion, HumidityTemperature, PressureTemperature,
};
