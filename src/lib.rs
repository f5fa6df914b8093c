//! # CRSF Link Library
//!
//! Receiver-side engine for the Crossfire (CRSF) serial protocol.
//!
//! This library provides frame synchronization and validation, RC channel
//! and link statistics decoding, failsafe evaluation and round-robin
//! telemetry transmission, plus the serial plumbing and event recording used
//! by the `crsf-link` host binary.

pub mod config;
pub mod crsf;
pub mod engine;
pub mod error;
pub mod serial;
pub mod telemetry;
