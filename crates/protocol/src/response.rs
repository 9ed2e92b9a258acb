//! Station → host frames.

use crate::codes::{response, HEADER_LEN};
use crate::error::{ProtocolError, Result};
use crate::log::LogRecord;
use crate::types::{
    Channel, Coefficients, DeviceId, DeviceInfo, FirmwareVersion, HumidityTemperature,
    PressureTemperature,
};
use serde::Serialize;

/// A decoded notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    PressureTemperature(PressureTemperature),
    HumidityTemperature(HumidityTemperature),
    Coefficients {
        channel: Channel,
        coefficients: Coefficients,
    },
    MeasurementPeriod { period_ms: u32 },
    DateTime { timestamp: u32 },
    DeviceId1(DeviceId),
    DeviceId2(DeviceId),
    DeviceInfo(DeviceInfo),
    FirmwareVersion { version: FirmwareVersion },
    DeviceStatus { payload: Vec<u8> },
    LogSize { records: u32 },
    LogRecord { record: LogRecord },
    LogComplete,
    LogParams { payload: Vec<u8> },
    /// Function code this crate does not know; kept for forward compatibility
    Unknown { code: u8, payload: Vec<u8> },
}

impl Response {
    /// Function code the frame arrived with
    pub fn code(&self) -> u8 {
        match self {
            Response::PressureTemperature(_) => response::VALUE_P_T,
            Response::HumidityTemperature(_) => response::VALUE_H_T,
            Response::Coefficients { channel, .. } => channel.response_code(),
            Response::MeasurementPeriod { .. } => response::TIME_T,
            Response::DateTime { .. } => response::DATETIME,
            Response::DeviceId1(_) => response::DEVICE_ID1,
            Response::DeviceId2(_) => response::DEVICE_ID2,
            Response::DeviceInfo(_) => response::DEVICE_INFO,
            Response::FirmwareVersion { .. } => response::DEVICE_VERSION,
            Response::DeviceStatus { .. } => response::DEVICE_STATUS,
            Response::LogSize { .. } => response::LOG_SIZE,
            Response::LogRecord { record } => record.code(),
            Response::LogComplete => response::LOG_READ_COMPLETE,
            Response::LogParams { .. } => response::LOG_PARAMS,
            Response::Unknown { code, .. } => *code,
        }
    }

    /// True for frames that belong to a log transfer
    pub fn is_log_traffic(&self) -> bool {
        matches!(self, Response::LogRecord { .. } | Response::LogComplete)
    }
}

/// Minimum payload length of each known response code.
fn min_payload_len(code: u8) -> Option<usize> {
    let len = match code {
        response::VALUE_P_T
        | response::VALUE_H_T
        | response::COEFF_P
        | response::COEFF_T
        | response::COEFF_H
        | response::COEFF_T1
        | response::DEVICE_ID1
        | response::DEVICE_ID2
        | response::DEVICE_INFO => 8,
        response::TIME_T | response::DATETIME | response::DEVICE_VERSION | response::LOG_SIZE => 4,
        response::LOG_RECORD1 | response::LOG_RECORD2 => 10,
        response::LOG_RECORD3 => 6,
        response::DEVICE_STATUS | response::LOG_READ_COMPLETE | response::LOG_PARAMS => 0,
        _ => return None,
    };
    Some(len)
}

/// Decode the first frame in `buf`.
///
/// Returns the response and the number of bytes the frame occupied. Bytes
/// after the frame are left untouched.
pub fn decode_frame(buf: &[u8]) -> Result<(Response, usize)> {
    if buf.len() < HEADER_LEN {
        return Err(ProtocolError::Incomplete {
            needed: HEADER_LEN - buf.len(),
        });
    }

    let code = buf[0];
    let total = HEADER_LEN + usize::from(buf[1]);
    if buf.len() < total {
        return Err(ProtocolError::Incomplete {
            needed: total - buf.len(),
        });
    }

    let response = decode_payload(code, &buf[HEADER_LEN..total])?;
    Ok((response, total))
}

/// Decode a payload whose header has already been stripped.
pub fn decode_payload(code: u8, payload: &[u8]) -> Result<Response> {
    let Some(min) = min_payload_len(code) else {
        return Ok(Response::Unknown {
            code,
            payload: payload.to_vec(),
        });
    };
    if payload.len() < min {
        return Err(ProtocolError::PayloadTooShort {
            code,
            expected: min,
            actual: payload.len(),
        });
    }

    let mut r = Reader::new(code, payload);
    let decoded = match code {
        response::VALUE_P_T => Response::PressureTemperature(PressureTemperature {
            pressure: r.f32()?,
            temperature: r.f32()?,
        }),
        response::VALUE_H_T => Response::HumidityTemperature(HumidityTemperature {
            humidity: r.f32()?,
            temperature: r.f32()?,
        }),
        response::COEFF_P | response::COEFF_T | response::COEFF_H | response::COEFF_T1 => {
            let channel = Channel::from_response_code(code).ok_or(ProtocolError::PayloadTooShort {
                code,
                expected: min,
                actual: payload.len(),
            })?;
            Response::Coefficients {
                channel,
                coefficients: Coefficients::new(r.f32()?, r.f32()?),
            }
        }
        response::TIME_T => Response::MeasurementPeriod { period_ms: r.u32()? },
        response::DATETIME => Response::DateTime { timestamp: r.u32()? },
        response::DEVICE_ID1 => Response::DeviceId1(DeviceId(r.bytes::<8>()?)),
        response::DEVICE_ID2 => Response::DeviceId2(DeviceId(r.bytes::<8>()?)),
        response::DEVICE_INFO => Response::DeviceInfo(DeviceInfo {
            production_timestamp: r.u32()?,
            serial_number: r.u32()?,
        }),
        response::DEVICE_VERSION => Response::FirmwareVersion {
            version: FirmwareVersion(r.u32()?),
        },
        response::DEVICE_STATUS => Response::DeviceStatus {
            payload: payload.to_vec(),
        },
        response::LOG_SIZE => Response::LogSize { records: r.u32()? },
        response::LOG_RECORD1 => Response::LogRecord {
            record: LogRecord::Timestamped {
                record: r.u16()?,
                timestamp: r.u32()?,
                pressure: r.f32()?,
            },
        },
        response::LOG_RECORD2 => Response::LogRecord {
            record: LogRecord::Climate {
                record: r.u16()?,
                temperature: r.f32()?,
                humidity: r.f32()?,
            },
        },
        response::LOG_RECORD3 => Response::LogRecord {
            record: LogRecord::External {
                record: r.u16()?,
                temperature_ext: r.f32()?,
            },
        },
        response::LOG_READ_COMPLETE => Response::LogComplete,
        response::LOG_PARAMS => Response::LogParams {
            payload: payload.to_vec(),
        },
        _ => Response::Unknown {
            code,
            payload: payload.to_vec(),
        },
    };
    Ok(decoded)
}

/// Little-endian cursor over a payload.
struct Reader<'a> {
    code: u8,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(code: u8, buf: &'a [u8]) -> Self {
        Self { code, buf, pos: 0 }
    }

    fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let out: [u8; N] = self
            .buf
            .get(self.pos..self.pos + N)
            .and_then(|s| s.try_into().ok())
            .ok_or(ProtocolError::PayloadTooShort {
                code: self.code,
                expected: self.pos + N,
                actual: self.buf.len(),
            })?;
        self.pos += N;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16> {
        self.bytes::<2>().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        self.bytes::<4>().map(u32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32> {
        self.bytes::<4>().map(f32::from_le_bytes)
    }
}
