//! # Error Types
//!
//! Custom error types for CRSF Link using `thiserror`.
//!
//! [`FrameError`] is `Copy` and never allocates, so the byte-level engine can
//! return it from its hot path. [`CrsfError`] is the crate-wide error used by
//! configuration loading and serial I/O.

use thiserror::Error;

use crate::crsf::protocol::FrameType;

/// Protocol-level failures raised while decoding or assembling frames
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Length byte outside the valid 2..=62 range
    #[error("frame length {0} outside valid range 2..=62")]
    InvalidLength(u8),

    /// Checksum byte does not match the CRC8 of type + payload
    #[error("CRC mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    CrcMismatch { expected: u8, received: u8 },

    /// Checksummed frame carries fewer payload bytes than its type requires
    #[error("{frame_type} payload too short: {len} bytes, need {expected}")]
    PayloadTooShort {
        frame_type: FrameType,
        len: usize,
        expected: usize,
    },

    /// Payload larger than a frame can carry
    #[error("payload size {len} exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Frame buffer has no room for the requested write
    #[error("frame buffer full: {needed} bytes needed, {remaining} remaining")]
    BufferFull { needed: usize, remaining: usize },
}

/// Main error type for CRSF Link
#[derive(Debug, Error)]
pub enum CrsfError {
    /// CRSF protocol errors
    #[error("CRSF protocol error: {0}")]
    Frame(#[from] FrameError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),
}

/// Result type alias for CRSF Link
pub type Result<T> = std::result::Result<T, CrsfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_messages() {
        assert_eq!(
            FrameError::InvalidLength(63).to_string(),
            "frame length 63 outside valid range 2..=62"
        );
        assert_eq!(
            FrameError::CrcMismatch { expected: 0xEF, received: 0x10 }.to_string(),
            "CRC mismatch: expected 0xEF, got 0x10"
        );
        assert_eq!(
            FrameError::PayloadTooShort {
                frame_type: FrameType::RcChannelsPacked,
                len: 4,
                expected: 22,
            }
            .to_string(),
            "RC_CHANNELS_PACKED payload too short: 4 bytes, need 22"
        );
    }

    #[test]
    fn test_frame_error_converts_into_crsf_error() {
        let err: CrsfError = FrameError::PayloadTooLarge { len: 61, max: 60 }.into();
        assert!(matches!(
            err,
            CrsfError::Frame(FrameError::PayloadTooLarge { len: 61, max: 60 })
        ));
        assert_eq!(
            err.to_string(),
            "CRSF protocol error: payload size 61 exceeds maximum 60"
        );
    }
}
