//! GATT identifiers and function codes.

use uuid::Uuid;

/// Protocol revision implemented by this crate (12.11.2023)
pub const PROTOCOL_VERSION: u8 = 1;

/// Primary service advertised by the station
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x01e1_0001_6d6f_43e6_9ea1_c151_6874_a6a8);

/// Characteristic the host writes commands to
pub const WRITE_CHAR_UUID: Uuid = Uuid::from_u128(0x01e1_0002_6d6f_43e6_9ea1_c151_6874_a6a8);

/// Characteristic the station notifies responses on
pub const NOTIFY_CHAR_UUID: Uuid = Uuid::from_u128(0x01e1_0003_6d6f_43e6_9ea1_c151_6874_a6a8);

/// Client Characteristic Configuration Descriptor
pub const CCCD_UUID: Uuid = Uuid::from_u128(0x0000_2902_0000_1000_8000_0080_5f9b_34fb);

/// Code + length
pub const HEADER_LEN: usize = 2;

/// The length field is a single byte
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Host → station function codes
pub mod command {
    // Reads (0x80+)
    pub const GET_VALUE_P_T: u8 = 0x87;
    pub const GET_VALUE_H_T: u8 = 0x88;
    pub const GET_COEFF_P: u8 = 0x84;
    pub const GET_COEFF_T: u8 = 0x89;
    pub const GET_COEFF_H: u8 = 0x8A;
    pub const GET_COEFF_T1: u8 = 0x8B;
    /// Shares its value with [`super::response::TIME_T`]
    pub const GET_TIME_T: u8 = 0x15;
    pub const GET_DATETIME: u8 = 0x90;
    pub const GET_DEVICE_ID1: u8 = 0x91;
    pub const GET_DEVICE_ID2: u8 = 0x92;
    pub const GET_DEVICE_INFO: u8 = 0x93;
    pub const GET_DEVICE_VERSION: u8 = 0x94;
    pub const GET_DEVICE_STATUS: u8 = 0x95;
    pub const GET_LOG_SIZE: u8 = 0xA0;
    pub const GET_LOG_PARAMS: u8 = 0xA6;

    // Writes (0x50+)
    pub const SET_COEFF_P: u8 = 0x54;
    pub const SET_COEFF_T: u8 = 0x57;
    pub const SET_COEFF_H: u8 = 0x58;
    pub const SET_COEFF_T1: u8 = 0x59;
    pub const SET_TIME_T: u8 = 0x55;
    pub const SET_DATETIME: u8 = 0x60;
    pub const SET_DEVICE_INFO: u8 = 0x63;
    pub const SET_LOG_PARAMS: u8 = 0xA7;

    // Log control
    pub const START_READ_LOG: u8 = 0xA1;
    pub const PAUSE_READ_LOG: u8 = 0xA2;
    pub const RESUME_READ_LOG: u8 = 0xA3;
    pub const STOP_READ_LOG: u8 = 0xA4;
    pub const RESET_LOG: u8 = 0xA5;
}

/// Station → host function codes
pub mod response {
    pub const VALUE_P_T: u8 = 0x17;
    pub const VALUE_H_T: u8 = 0x18;
    pub const COEFF_P: u8 = 0x14;
    pub const COEFF_T: u8 = 0x19;
    pub const COEFF_H: u8 = 0x1A;
    pub const COEFF_T1: u8 = 0x1B;
    pub const TIME_T: u8 = 0x15;
    pub const DATETIME: u8 = 0x20;
    pub const DEVICE_ID1: u8 = 0x21;
    pub const DEVICE_ID2: u8 = 0x22;
    pub const DEVICE_INFO: u8 = 0x23;
    pub const DEVICE_VERSION: u8 = 0x24;
    pub const DEVICE_STATUS: u8 = 0x25;

    pub const LOG_SIZE: u8 = 0xB0;
    pub const LOG_RECORD1: u8 = 0xB1;
    pub const LOG_RECORD2: u8 = 0xB2;
    pub const LOG_RECORD3: u8 = 0xB3;
    pub const LOG_READ_COMPLETE: u8 = 0xB5;
    pub const LOG_PARAMS: u8 = 0xB6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuids_match_firmware_strings() {
        assert_eq!(SERVICE_UUID.to_string(), "01e10001-6d6f-43e6-9ea1-c1516874a6a8");
        assert_eq!(WRITE_CHAR_UUID.to_string(), "01e10002-6d6f-43e6-9ea1-c1516874a6a8");
        assert_eq!(NOTIFY_CHAR_UUID.to_string(), "01e10003-6d6f-43e6-9ea1-c1516874a6a8");
        assert_eq!(CCCD_UUID.to_string(), "00002902-0000-1000-8000-00805f9b34fb");
    }
}
