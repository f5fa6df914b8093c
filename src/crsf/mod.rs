//! # CRSF Protocol Module
//!
//! Implementation of the Crossfire (CRSF) frame protocol.
//!
//! This module handles:
//! - CRC8-DVB-S2 checksum calculation
//! - Frame synchronization and validation, one byte at a time
//! - RC channels packing/unpacking (16 channels, 11-bit resolution)
//! - Link statistics decoding and failsafe evaluation
//! - Telemetry frame assembly (battery, custom payload) with round-robin scheduling

pub mod buffer;
pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod failsafe;
pub mod protocol;
pub mod telemetry;
