//! Host → station frames.

use crate::codes::{command, response, MAX_PAYLOAD_LEN};
use crate::error::{ProtocolError, Result};
use crate::types::{Channel, Coefficients, DeviceInfo};
use serde::{Deserialize, Serialize};

/// Build a zero-length frame for `code`.
#[inline]
pub fn encode_query(code: u8) -> [u8; 2] {
    [code, 0]
}

/// A read request answered by exactly one response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    PressureTemperature,
    HumidityTemperature,
    Coefficients(Channel),
    MeasurementPeriod,
    DateTime,
    DeviceId1,
    DeviceId2,
    DeviceInfo,
    FirmwareVersion,
    DeviceStatus,
    LogSize,
    LogParams,
}

impl Query {
    /// Function code written to the station
    pub fn code(self) -> u8 {
        match self {
            Query::PressureTemperature => command::GET_VALUE_P_T,
            Query::HumidityTemperature => command::GET_VALUE_H_T,
            Query::Coefficients(channel) => channel.get_code(),
            Query::MeasurementPeriod => command::GET_TIME_T,
            Query::DateTime => command::GET_DATETIME,
            Query::DeviceId1 => command::GET_DEVICE_ID1,
            Query::DeviceId2 => command::GET_DEVICE_ID2,
            Query::DeviceInfo => command::GET_DEVICE_INFO,
            Query::FirmwareVersion => command::GET_DEVICE_VERSION,
            Query::DeviceStatus => command::GET_DEVICE_STATUS,
            Query::LogSize => command::GET_LOG_SIZE,
            Query::LogParams => command::GET_LOG_PARAMS,
        }
    }

    /// Function code of the frame that answers this query
    pub fn expected_response(self) -> u8 {
        match self {
            Query::PressureTemperature => response::VALUE_P_T,
            Query::HumidityTemperature => response::VALUE_H_T,
            Query::Coefficients(channel) => channel.response_code(),
            Query::MeasurementPeriod => response::TIME_T,
            Query::DateTime => response::DATETIME,
            Query::DeviceId1 => response::DEVICE_ID1,
            Query::DeviceId2 => response::DEVICE_ID2,
            Query::DeviceInfo => response::DEVICE_INFO,
            Query::FirmwareVersion => response::DEVICE_VERSION,
            Query::DeviceStatus => response::DEVICE_STATUS,
            Query::LogSize => response::LOG_SIZE,
            Query::LogParams => response::LOG_PARAMS,
        }
    }

    pub fn encode(self) -> [u8; 2] {
        encode_query(self.code())
    }
}

/// Measurement-log transfer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogControl {
    Start,
    Pause,
    Resume,
    Stop,
    /// Erase every stored record
    Reset,
}

impl LogControl {
    pub fn code(self) -> u8 {
        match self {
            LogControl::Start => command::START_READ_LOG,
            LogControl::Pause => command::PAUSE_READ_LOG,
            LogControl::Resume => command::RESUME_READ_LOG,
            LogControl::Stop => command::STOP_READ_LOG,
            LogControl::Reset => command::RESET_LOG,
        }
    }
}

/// Payload bytes whose layout the protocol leaves to the firmware.
///
/// Always fits the single-byte length field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct RawPayload(Vec<u8>);

impl RawPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for RawPayload {
    type Error = ProtocolError;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }
}

impl From<RawPayload> for Vec<u8> {
    fn from(payload: RawPayload) -> Self {
        payload.0
    }
}

/// Any frame the host can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Query { query: Query },
    Log { control: LogControl },
    SetCoefficients {
        channel: Channel,
        coefficients: Coefficients,
    },
    SetMeasurementPeriod { period_ms: u32 },
    /// Set the station clock to a unix timestamp
    SetDateTime { timestamp: u32 },
    SetDeviceInfo { info: DeviceInfo },
    SetLogParams { payload: RawPayload },
}

impl Request {
    /// Function code of the frame
    pub fn code(&self) -> u8 {
        match self {
            Request::Query { query } => query.code(),
            Request::Log { control } => control.code(),
            Request::SetCoefficients { channel, .. } => channel.set_code(),
            Request::SetMeasurementPeriod { .. } => command::SET_TIME_T,
            Request::SetDateTime { .. } => command::SET_DATETIME,
            Request::SetDeviceInfo { .. } => command::SET_DEVICE_INFO,
            Request::SetLogParams { .. } => command::SET_LOG_PARAMS,
        }
    }

    /// Serialize to a complete frame
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(8);
        match self {
            Request::Query { .. } | Request::Log { .. } => {}
            Request::SetCoefficients { coefficients, .. } => {
                payload.extend_from_slice(&coefficients.a.to_le_bytes());
                payload.extend_from_slice(&coefficients.b.to_le_bytes());
            }
            Request::SetMeasurementPeriod { period_ms } => {
                payload.extend_from_slice(&period_ms.to_le_bytes());
            }
            Request::SetDateTime { timestamp } => {
                payload.extend_from_slice(&timestamp.to_le_bytes());
            }
            Request::SetDeviceInfo { info } => {
                payload.extend_from_slice(&info.production_timestamp.to_le_bytes());
                payload.extend_from_slice(&info.serial_number.to_le_bytes());
            }
            Request::SetLogParams { payload: raw } => payload.extend_from_slice(raw.as_bytes()),
        }

        let mut frame = Vec::with_capacity(2 + payload.len());
        frame.push(self.code());
        // RawPayload and the fixed layouts all fit in a u8
        frame.push(payload.len() as u8);
        frame.extend_from_slice(&payload);
        frame
    }
}

impl From<Query> for Request {
    fn from(query: Query) -> Self {
        Request::Query { query }
    }
}

impl From<LogControl> for Request {
    fn from(control: LogControl) -> Self {
        Request::Log { control }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_frames_are_two_bytes() {
        assert_eq!(Query::PressureTemperature.encode(), [0x87, 0x00]);
        assert_eq!(Query::MeasurementPeriod.encode(), [0x15, 0x00]);
        assert_eq!(Query::Coefficients(Channel::Humidity).encode(), [0x8A, 0x00]);
        assert_eq!(Request::from(LogControl::Start).encode(), vec![0xA1, 0x00]);
    }

    #[test]
    fn test_expected_responses() {
        assert_eq!(Query::PressureTemperature.expected_response(), 0x17);
        assert_eq!(Query::MeasurementPeriod.expected_response(), 0x15);
        assert_eq!(Query::LogSize.expected_response(), 0xB0);
        assert_eq!(Query::LogParams.expected_response(), 0xB6);
        assert_eq!(
            Query::Coefficients(Channel::ExternalTemperature).expected_response(),
            0x1B
        );
    }

    #[test]
    fn test_set_coefficients_layout() {
        let frame = Request::SetCoefficients {
            channel: Channel::Pressure,
            coefficients: Coefficients::new(1.0, -0.5),
        }
        .encode();

        assert_eq!(frame[0], 0x54);
        assert_eq!(frame[1], 8);
        assert_eq!(&frame[2..6], &1.0f32.to_le_bytes());
        assert_eq!(&frame[6..10], &(-0.5f32).to_le_bytes());
    }

    #[test]
    fn test_set_period_and_datetime_layout() {
        assert_eq!(
            Request::SetMeasurementPeriod { period_ms: 1000 }.encode(),
            vec![0x55, 4, 0xE8, 0x03, 0x00, 0x00]
        );
        assert_eq!(
            Request::SetDateTime { timestamp: 0x6553_F100 }.encode(),
            vec![0x60, 4, 0x00, 0xF1, 0x53, 0x65]
        );
    }

    #[test]
    fn test_set_device_info_layout() {
        let frame = Request::SetDeviceInfo {
            info: DeviceInfo {
                production_timestamp: 1,
                serial_number: 0x0102_0304,
            },
        }
        .encode();
        assert_eq!(frame, vec![0x63, 8, 1, 0, 0, 0, 4, 3, 2, 1]);
    }

    #[test]
    fn test_raw_payload_limit() {
        assert!(RawPayload::try_from(vec![0u8; 255]).is_ok());
        assert_eq!(
            RawPayload::try_from(vec![0u8; 256]),
            Err(ProtocolError::PayloadTooLong(256))
        );

        let payload = RawPayload::try_from(vec![9, 8, 7]).unwrap();
        assert_eq!(
            Request::SetLogParams { payload }.encode(),
            vec![0xA7, 3, 9, 8, 7]
        );
    }
}
