//! Typed payloads shared by requests and responses.

use crate::codes::{command, response};
use crate::error::ProtocolError;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calibration channel of the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Barometric pressure sensor
    Pressure,
    /// On-board temperature sensor
    Temperature,
    /// Humidity sensor
    Humidity,
    /// External temperature sensor
    ExternalTemperature,
}

impl Channel {
    /// Every channel, in protocol order
    pub const ALL: [Channel; 4] = [
        Channel::Pressure,
        Channel::Temperature,
        Channel::Humidity,
        Channel::ExternalTemperature,
    ];

    /// Short label used on the device and in the CLI
    pub fn label(self) -> &'static str {
        match self {
            Channel::Pressure => "P",
            Channel::Temperature => "T",
            Channel::Humidity => "H",
            Channel::ExternalTemperature => "T1",
        }
    }

    pub(crate) fn get_code(self) -> u8 {
        match self {
            Channel::Pressure => command::GET_COEFF_P,
            Channel::Temperature => command::GET_COEFF_T,
            Channel::Humidity => command::GET_COEFF_H,
            Channel::ExternalTemperature => command::GET_COEFF_T1,
        }
    }

    pub(crate) fn set_code(self) -> u8 {
        match self {
            Channel::Pressure => command::SET_COEFF_P,
            Channel::Temperature => command::SET_COEFF_T,
            Channel::Humidity => command::SET_COEFF_H,
            Channel::ExternalTemperature => command::SET_COEFF_T1,
        }
    }

    pub(crate) fn response_code(self) -> u8 {
        match self {
            Channel::Pressure => response::COEFF_P,
            Channel::Temperature => response::COEFF_T,
            Channel::Humidity => response::COEFF_H,
            Channel::ExternalTemperature => response::COEFF_T1,
        }
    }

    pub(crate) fn from_response_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.response_code() == code)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Channel {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "pressure" => Ok(Channel::Pressure),
            "t" | "temperature" => Ok(Channel::Temperature),
            "h" | "humidity" => Ok(Channel::Humidity),
            "t1" | "external" | "external_temperature" => Ok(Channel::ExternalTemperature),
            _ => Err(ProtocolError::UnknownChannel(s.to_string())),
        }
    }
}

/// Linear calibration pair of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub a: f32,
    pub b: f32,
}

impl Coefficients {
    pub fn new(a: f32, b: f32) -> Self {
        Self { a, b }
    }
}

/// Pressure in kPa and board temperature in °C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureTemperature {
    pub pressure: f32,
    pub temperature: f32,
}

/// Relative humidity in % and external sensor temperature in °C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HumidityTemperature {
    pub humidity: f32,
    pub temperature: f32,
}

/// Firmware version packed as one byte per component, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FirmwareVersion(pub u32);

impl FirmwareVersion {
    /// `[major, minor, patch, build]`
    pub fn components(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [major, minor, patch, build] = self.components();
        write!(f, "v{}.{}.{}.{}", major, minor, patch, build)
    }
}

/// Production metadata written at the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Unix timestamp of production
    pub production_timestamp: u32,
    pub serial_number: u32,
}

impl DeviceInfo {
    pub fn production_date(&self) -> String {
        format_date(self.production_timestamp)
    }
}

/// 64-bit hardware identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub [u8; 8]);

impl DeviceId {
    /// Identifier read as a little-endian integer
    pub fn value(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    /// Raw bytes in wire order
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.value())
    }
}

impl Serialize for DeviceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("DeviceId", 2)?;
        state.serialize_field("id", &self.value())?;
        state.serialize_field("id_bytes", &self.hex())?;
        state.end()
    }
}

/// Convert a device timestamp to local time.
pub fn timestamp_to_local(timestamp: u32) -> Option<DateTime<Local>> {
    Local.timestamp_opt(i64::from(timestamp), 0).single()
}

/// `dd.mm.YYYY HH:MM:SS` in local time.
pub fn format_timestamp(timestamp: u32) -> String {
    timestamp_to_local(timestamp)
        .map(|dt| dt.format("%d.%m.%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("@{}", timestamp))
}

/// `dd.mm.YYYY` in local time.
pub fn format_date(timestamp: u32) -> String {
    timestamp_to_local(timestamp)
        .map(|dt| dt.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| format!("@{}", timestamp))
}
