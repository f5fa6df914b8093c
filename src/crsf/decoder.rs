//! # CRSF Frame Decoder
//!
//! Byte-at-a-time frame synchronizer plus the payload decoders for the frame
//! types this crate understands.
//!
//! The decoder never allocates and never blocks. Any byte it cannot use sends
//! it back to sync search, so a corrupted stream recovers on the next valid
//! frame.

use tracing::trace;

use super::crc::crc8_dvb_s2;
use super::protocol::*;
use crate::error::FrameError;

/// Where the decoder is inside the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Looking for a sync byte
    AwaitSync,
    /// Sync seen, next byte is the length
    AwaitLength,
    /// Collecting type + payload bytes
    AccumulatePayload,
    /// Next byte is the checksum
    AwaitCrc,
}

/// Result of feeding one byte to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Not a sync byte while searching for one; dropped
    Skipped,
    /// Byte accepted into the frame in progress
    Accepted,
    /// A frame passed its checksum. Its payload is available from
    /// [`FrameDecoder::payload`] until the next byte is fed.
    Complete(FrameType),
    /// The frame in progress was discarded and the decoder is back in sync search
    Rejected(FrameError),
}

/// Incremental CRSF frame synchronizer
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    frame: [u8; CRSF_MAX_FRAME_SIZE],
    index: usize,
    crc_index: usize,
    state: DecoderState,
    accept_alt_sync: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder that accepts both 0xC8 and 0xEE as sync bytes
    pub fn new() -> Self {
        Self {
            frame: [0u8; CRSF_MAX_FRAME_SIZE],
            index: 0,
            crc_index: 0,
            state: DecoderState::AwaitSync,
            accept_alt_sync: true,
        }
    }

    /// Choose whether the EdgeTX sync byte (0xEE) starts a frame
    pub fn with_alt_sync(mut self, accept: bool) -> Self {
        self.accept_alt_sync = accept;
        self
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Drop any partial frame and return to sync search
    pub fn reset(&mut self) {
        self.index = 0;
        self.crc_index = 0;
        self.state = DecoderState::AwaitSync;
    }

    fn is_sync(&self, byte: u8) -> bool {
        byte == CRSF_SYNC_BYTE || (self.accept_alt_sync && byte == CRSF_SYNC_BYTE_EDGETX)
    }

    /// Consume one byte from the stream
    pub fn feed(&mut self, byte: u8) -> DecodeOutcome {
        match self.state {
            DecoderState::AwaitSync => {
                if !self.is_sync(byte) {
                    trace!("Skipping non-sync byte 0x{:02X}", byte);
                    return DecodeOutcome::Skipped;
                }
                self.frame[0] = byte;
                self.index = 1;
                self.state = DecoderState::AwaitLength;
                DecodeOutcome::Accepted
            }
            DecoderState::AwaitLength => {
                if !(CRSF_MIN_FRAME_LENGTH..=CRSF_MAX_FRAME_LENGTH).contains(&byte) {
                    self.reset();
                    return DecodeOutcome::Rejected(FrameError::InvalidLength(byte));
                }
                self.frame[1] = byte;
                self.index = 2;
                self.crc_index = byte as usize + 1;
                self.state = DecoderState::AccumulatePayload;
                DecodeOutcome::Accepted
            }
            DecoderState::AccumulatePayload => {
                self.frame[self.index] = byte;
                self.index += 1;
                if self.index == self.crc_index {
                    self.state = DecoderState::AwaitCrc;
                }
                DecodeOutcome::Accepted
            }
            DecoderState::AwaitCrc => {
                let expected = crc8_dvb_s2(&self.frame[CRSF_FRAME_TYPE_OFFSET..self.crc_index]);
                // Payload stays readable until the next feed
                self.state = DecoderState::AwaitSync;

                if expected != byte {
                    self.reset();
                    return DecodeOutcome::Rejected(FrameError::CrcMismatch {
                        expected,
                        received: byte,
                    });
                }

                DecodeOutcome::Complete(FrameType::from(self.frame[CRSF_FRAME_TYPE_OFFSET]))
            }
        }
    }

    /// Payload of the last completed frame.
    ///
    /// Only meaningful directly after [`DecodeOutcome::Complete`].
    pub fn payload(&self) -> &[u8] {
        if self.crc_index <= CRSF_PAYLOAD_OFFSET {
            return &[];
        }
        &self.frame[CRSF_PAYLOAD_OFFSET..self.crc_index]
    }
}

/// A frame pulled out of a byte slice by [`decode_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub frame_type: FrameType,
    pub payload: &'a [u8],
}

/// Decode the first valid frame found in `bytes`.
///
/// Garbage before the frame is skipped the same way the streaming decoder
/// skips it. Returns `None` if the slice holds no complete, checksummed frame.
///
/// # Examples
///
/// ```
/// use crsf_link::crsf::decoder::decode_frame;
/// use crsf_link::crsf::protocol::FrameType;
///
/// let mut bytes = vec![0x00, 0xC8, 24, 0x16];
/// bytes.extend_from_slice(&[0u8; 22]);
/// bytes.push(0xEF);
///
/// let frame = decode_frame(&bytes).unwrap();
/// assert_eq!(frame.frame_type, FrameType::RcChannelsPacked);
/// assert_eq!(frame.payload, &[0u8; 22][..]);
/// ```
pub fn decode_frame(bytes: &[u8]) -> Option<DecodedFrame<'_>> {
    let mut decoder = FrameDecoder::new();

    for (position, &byte) in bytes.iter().enumerate() {
        if let DecodeOutcome::Complete(frame_type) = decoder.feed(byte) {
            let len = decoder.payload().len();
            let payload_end = position; // CRC byte
            return Some(DecodedFrame {
                frame_type,
                payload: &bytes[payload_end - len..payload_end],
            });
        }
    }

    None
}

/// Unpack 16 × 11-bit channels from a RC_CHANNELS_PACKED payload
///
/// Channels are packed as one little-endian bitstream: channel 0 occupies
/// bits 0..11, channel 1 bits 11..22 and so on. Bytes past the first 22 are
/// ignored.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooShort`] for payloads under 22 bytes.
pub fn decode_rc_channels(payload: &[u8]) -> Result<RcChannels, FrameError> {
    if payload.len() < CRSF_RC_CHANNELS_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooShort {
            frame_type: FrameType::RcChannelsPacked,
            len: payload.len(),
            expected: CRSF_RC_CHANNELS_PAYLOAD_SIZE,
        });
    }

    let mut channels = [0u16; CRSF_NUM_CHANNELS];
    for (channel_index, channel) in channels.iter_mut().enumerate() {
        let bit = channel_index * 11;
        let byte = bit / 8;
        let shift = bit % 8;

        // An 11-bit field spans at most three bytes; the third only exists
        // when the field starts past bit 5 of its first byte.
        let mut raw = u32::from(payload[byte]) | u32::from(payload[byte + 1]) << 8;
        if shift > 5 {
            raw |= u32::from(payload[byte + 2]) << 16;
        }

        *channel = ((raw >> shift) & u32::from(CRSF_CHANNEL_VALUE_MAX)) as u16;
    }

    Ok(channels)
}

/// Decode Link Statistics telemetry packet
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooShort`] for payloads under 10 bytes.
pub fn decode_link_statistics(payload: &[u8]) -> Result<LinkStatistics, FrameError> {
    if payload.len() < CRSF_LINK_STATS_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooShort {
            frame_type: FrameType::LinkStatistics,
            len: payload.len(),
            expected: CRSF_LINK_STATS_PAYLOAD_SIZE,
        });
    }

    Ok(LinkStatistics {
        uplink_rssi_1: payload[0],
        uplink_rssi_2: payload[1],
        uplink_lq: payload[2],
        uplink_snr: payload[3] as i8,
        active_antenna: payload[4],
        rf_mode: payload[5],
        uplink_tx_power: payload[6],
        downlink_rssi: payload[7],
        downlink_lq: payload[8],
        downlink_snr: payload[9] as i8,
    })
}

/// Decode Battery Sensor telemetry packet
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooShort`] for payloads under 8 bytes.
pub fn decode_battery_sensor(payload: &[u8]) -> Result<BatterySensor, FrameError> {
    if payload.len() < CRSF_BATTERY_SENSOR_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooShort {
            frame_type: FrameType::BatterySensor,
            len: payload.len(),
            expected: CRSF_BATTERY_SENSOR_PAYLOAD_SIZE,
        });
    }

    Ok(BatterySensor {
        voltage: u16::from_be_bytes([payload[0], payload[1]]),
        current: u16::from_be_bytes([payload[2], payload[3]]),
        capacity: u32::from_be_bytes([0, payload[4], payload[5], payload[6]]),
        percent: payload[7],
    })
}

/// Decode a custom payload frame
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] for payloads over 60 bytes.
pub fn decode_custom_payload(payload: &[u8]) -> Result<CustomPayload, FrameError> {
    CustomPayload::new(payload)
}
