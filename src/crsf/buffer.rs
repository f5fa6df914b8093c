//! # Frame Buffer Writer
//!
//! Fixed-capacity, append-only cursor used to assemble outgoing frames.
//! All multi-byte writes are big-endian, as CRSF puts them on the wire.

use super::crc::crc8_dvb_s2;
use super::protocol::*;
use crate::error::FrameError;

/// 64-byte frame assembly buffer
#[derive(Debug, Clone)]
pub struct FrameWriter {
    buf: [u8; CRSF_MAX_FRAME_SIZE],
    offset: usize,
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter {
    pub fn new() -> Self {
        Self {
            buf: [0u8; CRSF_MAX_FRAME_SIZE],
            offset: 0,
        }
    }

    /// Discard everything written so far
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.offset]
    }

    pub fn len(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    pub fn remaining(&self) -> usize {
        CRSF_MAX_FRAME_SIZE - self.offset
    }

    /// Append raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BufferFull`] without writing anything if the
    /// bytes do not fit.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        if bytes.len() > self.remaining() {
            return Err(FrameError::BufferFull {
                needed: bytes.len(),
                remaining: self.remaining(),
            });
        }

        self.buf[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), FrameError> {
        self.write_bytes(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write the low 24 bits of `value`
    pub fn write_u24(&mut self, value: u32) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes()[1..])
    }

    /// Write the low 24 bits of `value` (two's complement)
    pub fn write_i24(&mut self, value: i32) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes()[1..])
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), FrameError> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Start a new frame: sync byte, length placeholder, type byte
    pub fn begin_frame(&mut self, frame_type: FrameType) -> Result<(), FrameError> {
        self.reset();
        self.write_bytes(&[CRSF_SYNC_BYTE, 0, frame_type.into()])
    }

    /// Patch the length byte and append the CRC over type + payload.
    ///
    /// Returns the complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BufferFull`] if no room is left for the CRC byte.
    pub fn finish_frame(&mut self) -> Result<&[u8], FrameError> {
        debug_assert!(self.offset > CRSF_FRAME_TYPE_OFFSET, "finish_frame before begin_frame");

        // type + payload + crc
        let length = self.offset - CRSF_FRAME_TYPE_OFFSET + 1;
        if length > CRSF_MAX_FRAME_LENGTH as usize {
            return Err(FrameError::BufferFull {
                needed: 1,
                remaining: self.remaining(),
            });
        }

        self.buf[1] = length as u8;
        let crc = crc8_dvb_s2(&self.buf[CRSF_FRAME_TYPE_OFFSET..self.offset]);
        self.write_u8(crc)?;

        Ok(self.as_bytes())
    }
}
