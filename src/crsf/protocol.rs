//! # CRSF Protocol Constants and Types
//!
//! Core protocol definitions for CRSF (Crossfire) communication.
//!
//! Frame layout on the wire:
//!
//! ```text
//! [sync:1][length:1][type:1][payload:length-2][crc8:1]
//! ```
//!
//! `length` counts type + payload + crc, and the CRC covers type + payload only.

use std::fmt;

use serde::Serialize;

use crate::error::FrameError;

/// CRSF frame sync byte
pub const CRSF_SYNC_BYTE: u8 = 0xC8;

/// Sync byte sent by OpenTX/EdgeTX handsets instead of 0xC8.
///
/// Only ever accepted on input.
pub const CRSF_SYNC_BYTE_EDGETX: u8 = 0xEE;

/// Maximum complete frame size (sync + length + 62)
pub const CRSF_MAX_FRAME_SIZE: usize = 64;

/// Smallest valid length byte (type + crc, empty payload)
pub const CRSF_MIN_FRAME_LENGTH: u8 = 2;

/// Largest valid length byte
pub const CRSF_MAX_FRAME_LENGTH: u8 = 62;

/// Maximum CRSF payload size
/// Frame structure: sync(1) + length(1) + type(1) + payload(N) + crc(1)
/// Maximum frame size is 64 bytes, so max payload = 64 - 4 = 60 bytes
pub const CRSF_MAX_PAYLOAD_SIZE: usize = 60;

/// Offset of the type byte inside a frame
pub const CRSF_FRAME_TYPE_OFFSET: usize = 2;

/// Offset of the first payload byte inside a frame
pub const CRSF_PAYLOAD_OFFSET: usize = 3;

/// RC Channels packet type
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;

/// Link Statistics packet type
pub const CRSF_FRAMETYPE_LINK_STATISTICS: u8 = 0x14;

/// Battery Sensor packet type
pub const CRSF_FRAMETYPE_BATTERY_SENSOR: u8 = 0x08;

/// Custom (vendor) payload packet type
pub const CRSF_FRAMETYPE_CUSTOM_PAYLOAD: u8 = 0x7F;

/// RC channels payload size (22 bytes for 16 channels × 11 bits)
pub const CRSF_RC_CHANNELS_PAYLOAD_SIZE: usize = 22;

/// Number of RC channels
pub const CRSF_NUM_CHANNELS: usize = 16;

/// Channel value range (11-bit: 0-2047)
pub const CRSF_CHANNEL_VALUE_MIN: u16 = 0;
pub const CRSF_CHANNEL_VALUE_MAX: u16 = 2047;

/// Channel value that maps to 1500µs
pub const CRSF_CHANNEL_VALUE_MID: u16 = 992;

/// Link Statistics payload size
pub const CRSF_LINK_STATS_PAYLOAD_SIZE: usize = 10;

/// Battery Sensor payload size
pub const CRSF_BATTERY_SENSOR_PAYLOAD_SIZE: usize = 8;

/// Largest value a 24-bit capacity field can carry
pub const CRSF_BATTERY_CAPACITY_MAX: u32 = 0x00FF_FFFF;

/// Uplink TX power in mW, indexed by the link statistics power enum
pub const TX_POWER_TABLE_MW: [u16; 9] = [0, 10, 25, 100, 500, 1000, 2000, 250, 50];

/// RC channels array type (16 channels, 11-bit values)
pub type RcChannels = [u16; CRSF_NUM_CHANNELS];

/// Frame type byte, with the types this crate understands broken out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    RcChannelsPacked,
    LinkStatistics,
    BatterySensor,
    CustomPayload,
    /// Any type this crate does not interpret
    Other(u8),
}

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value {
            CRSF_FRAMETYPE_RC_CHANNELS_PACKED => Self::RcChannelsPacked,
            CRSF_FRAMETYPE_LINK_STATISTICS => Self::LinkStatistics,
            CRSF_FRAMETYPE_BATTERY_SENSOR => Self::BatterySensor,
            CRSF_FRAMETYPE_CUSTOM_PAYLOAD => Self::CustomPayload,
            other => Self::Other(other),
        }
    }
}

impl From<FrameType> for u8 {
    fn from(value: FrameType) -> Self {
        match value {
            FrameType::RcChannelsPacked => CRSF_FRAMETYPE_RC_CHANNELS_PACKED,
            FrameType::LinkStatistics => CRSF_FRAMETYPE_LINK_STATISTICS,
            FrameType::BatterySensor => CRSF_FRAMETYPE_BATTERY_SENSOR,
            FrameType::CustomPayload => CRSF_FRAMETYPE_CUSTOM_PAYLOAD,
            FrameType::Other(other) => other,
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RcChannelsPacked => f.write_str("RC_CHANNELS_PACKED"),
            Self::LinkStatistics => f.write_str("LINK_STATISTICS"),
            Self::BatterySensor => f.write_str("BATTERY_SENSOR"),
            Self::CustomPayload => f.write_str("CUSTOM_PAYLOAD"),
            Self::Other(value) => write!(f, "0x{value:02X}"),
        }
    }
}

/// Link statistics telemetry data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkStatistics {
    /// Uplink RSSI (antenna 1) in -dBm
    pub uplink_rssi_1: u8,

    /// Uplink RSSI (antenna 2) in -dBm (diversity)
    pub uplink_rssi_2: u8,

    /// Uplink link quality (0-100%)
    pub uplink_lq: u8,

    /// Uplink SNR in dB
    pub uplink_snr: i8,

    /// Active antenna (0 = antenna 1, anything else = antenna 2)
    pub active_antenna: u8,

    /// RF mode / packet rate
    pub rf_mode: u8,

    /// Uplink TX power enum index (see [`TX_POWER_TABLE_MW`])
    pub uplink_tx_power: u8,

    /// Downlink RSSI in -dBm
    pub downlink_rssi: u8,

    /// Downlink link quality (0-100%)
    pub downlink_lq: u8,

    /// Downlink SNR in dB
    pub downlink_snr: i8,
}

impl LinkStatistics {
    /// Uplink RSSI of the antenna currently selected by diversity
    pub fn rssi(&self) -> u8 {
        if self.active_antenna != 0 {
            self.uplink_rssi_2
        } else {
            self.uplink_rssi_1
        }
    }

    /// Uplink link quality in percent
    pub fn link_quality(&self) -> u8 {
        self.uplink_lq
    }

    /// Uplink TX power in mW, or 0 for an index outside the table
    pub fn tx_power_mw(&self) -> u16 {
        TX_POWER_TABLE_MW
            .get(self.uplink_tx_power as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// Battery sensor telemetry, in wire units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatterySensor {
    /// Voltage in decivolts
    pub voltage: u16,

    /// Current in deciamps
    pub current: u16,

    /// Capacity used in mAh (24 bits on the wire)
    pub capacity: u32,

    /// Battery remaining percentage (0-100%)
    pub percent: u8,
}

/// Opaque payload for the custom frame type, at most 60 bytes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CustomPayload {
    data: [u8; CRSF_MAX_PAYLOAD_SIZE],
    len: u8,
}

impl CustomPayload {
    /// Copy `bytes` into a new payload.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLarge`] for inputs over 60 bytes.
    /// Nothing is truncated.
    pub fn new(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() > CRSF_MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge {
                len: bytes.len(),
                max: CRSF_MAX_PAYLOAD_SIZE,
            });
        }

        let mut data = [0u8; CRSF_MAX_PAYLOAD_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);

        Ok(Self {
            data,
            len: bytes.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for CustomPayload {
    fn default() -> Self {
        Self {
            data: [0u8; CRSF_MAX_PAYLOAD_SIZE],
            len: 0,
        }
    }
}

impl fmt::Debug for CustomPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomPayload").field(&self.as_bytes()).finish()
    }
}

/// Convert a channel value to a pulse width in microseconds.
///
/// Rounds to the nearest microsecond, halves up: 172 → 988µs, 992 → 1500µs,
/// 1811 → 2012µs.
pub fn ticks_to_us(ticks: u16) -> u16 {
    let scaled = (i32::from(ticks) - i32::from(CRSF_CHANNEL_VALUE_MID)) * 5;
    ((scaled + 4).div_euclid(8) + 1500) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(CRSF_SYNC_BYTE, 0xC8);
        assert_eq!(CRSF_SYNC_BYTE_EDGETX, 0xEE);
        assert_eq!(CRSF_FRAMETYPE_RC_CHANNELS_PACKED, 0x16);
        assert_eq!(CRSF_FRAMETYPE_LINK_STATISTICS, 0x14);
        assert_eq!(CRSF_FRAMETYPE_BATTERY_SENSOR, 0x08);
        assert_eq!(CRSF_FRAMETYPE_CUSTOM_PAYLOAD, 0x7F);
        assert_eq!(CRSF_NUM_CHANNELS, 16);
        // Largest frame: sync + length byte + 62
        assert_eq!(CRSF_MAX_FRAME_LENGTH as usize + 2, CRSF_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_frame_type_round_trip() {
        for byte in 0..=u8::MAX {
            assert_eq!(u8::from(FrameType::from(byte)), byte);
        }
        assert_eq!(FrameType::from(0x16), FrameType::RcChannelsPacked);
        assert_eq!(FrameType::from(0x21), FrameType::Other(0x21));
        assert_eq!(FrameType::Other(0x21).to_string(), "0x21");
    }

    #[test]
    fn test_rssi_follows_active_antenna() {
        let mut stats = LinkStatistics {
            uplink_rssi_1: 60,
            uplink_rssi_2: 90,
            ..Default::default()
        };
        assert_eq!(stats.rssi(), 60);

        stats.active_antenna = 1;
        assert_eq!(stats.rssi(), 90);
    }

    #[test]
    fn test_tx_power_lookup() {
        let expected = [0u16, 10, 25, 100, 500, 1000, 2000, 250, 50];
        for (index, &mw) in expected.iter().enumerate() {
            let stats = LinkStatistics {
                uplink_tx_power: index as u8,
                ..Default::default()
            };
            assert_eq!(stats.tx_power_mw(), mw, "index {}", index);
        }

        let out_of_table = LinkStatistics {
            uplink_tx_power: 9,
            ..Default::default()
        };
        assert_eq!(out_of_table.tx_power_mw(), 0);
    }

    #[test]
    fn test_custom_payload_limits() {
        let payload = CustomPayload::new(&[0xAB; 60]).unwrap();
        assert_eq!(payload.len(), 60);
        assert_eq!(payload.as_bytes(), &[0xAB; 60][..]);

        let result = CustomPayload::new(&[0u8; 61]);
        assert_eq!(
            result,
            Err(FrameError::PayloadTooLarge { len: 61, max: 60 })
        );

        assert!(CustomPayload::new(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_ticks_to_us() {
        assert_eq!(ticks_to_us(172), 988);
        assert_eq!(ticks_to_us(992), 1500);
        assert_eq!(ticks_to_us(1811), 2012);
        assert_eq!(ticks_to_us(0), 880);
        assert_eq!(ticks_to_us(2047), 2159);
    }
}
