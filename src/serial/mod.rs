//! # Serial Communication Module
//!
//! Handles the serial side of a CRSF link.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control) at the configured baud rate
//! - Reading received bytes within a short timing budget
//! - Feeding them to a [`CrsfEngine`]
//! - Sending at most one telemetry frame per cycle

pub mod port_trait;

use std::time::Duration;

use bytes::BytesMut;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace, warn};

use crate::config::SerialConfig;
use crate::engine::{CrsfEngine, CrsfHandler};
use crate::error::{CrsfError, Result};
use port_trait::{LinkPort, StreamPort};

/// Default CRSF baud rate (420,000 baud)
pub const CRSF_BAUD_RATE: u32 = 420_000;

/// Serial port carrying a CRSF link
pub struct CrsfSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyAMA0)
    device_path: String,
}

impl std::fmt::Debug for CrsfSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrsfSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl CrsfSerial {
    /// Open the port named in `config`
    ///
    /// # Errors
    ///
    /// Returns [`CrsfError::SerialPortNotFound`] if the device cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use crsf_link::config::SerialConfig;
    /// use crsf_link::serial::CrsfSerial;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let serial = CrsfSerial::open(&SerialConfig::default())?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        Self::open_with_paths(&[config.port.as_str()], config.baud_rate)
    }

    /// Open the first device in `paths` that succeeds
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try, in order
    /// * `baud_rate` - Line speed
    ///
    /// # Returns
    ///
    /// * `Result<CrsfSerial>` - Connected serial port or error
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened CRSF link at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(CrsfError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with CRSF line settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| CrsfError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Wrap the port for use with a [`LinkDriver`]
    pub fn into_port(self) -> StreamPort<tokio_serial::SerialStream> {
        StreamPort::new(self.port)
    }
}

/// What one [`LinkDriver::poll`] cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub bytes_read: usize,
    pub telemetry_sent: bool,
}

/// Moves bytes between a [`LinkPort`] and a [`CrsfEngine`]
///
/// The engine lives outside the driver so its state (failsafe, telemetry
/// values) survives reconnects.
pub struct LinkDriver<P> {
    port: P,
    buffer: BytesMut,
    read_budget: Duration,
}

impl<P> std::fmt::Debug for LinkDriver<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkDriver")
            .field("read_budget", &self.read_budget)
            .finish_non_exhaustive()
    }
}

impl<P: LinkPort> LinkDriver<P> {
    pub fn new(port: P, read_budget: Duration) -> Self {
        Self {
            port,
            buffer: BytesMut::with_capacity(512),
            read_budget,
        }
    }

    pub fn read_budget(&self) -> Duration {
        self.read_budget
    }

    /// Run one cycle: read what arrives within the budget, feed it to the
    /// engine, then send at most one telemetry frame.
    ///
    /// # Errors
    ///
    /// Returns [`CrsfError::Serial`] on any port failure; the caller is
    /// expected to reconnect.
    pub async fn poll<H: CrsfHandler>(&mut self, engine: &mut CrsfEngine<H>) -> Result<CycleReport> {
        let bytes_read = self
            .port
            .read_chunk(&mut self.buffer, self.read_budget)
            .await
            .map_err(|e| CrsfError::Serial(format!("Failed to read: {}", e)))?;

        for &byte in self.buffer.iter() {
            engine.feed(byte);
        }
        self.buffer.clear();
        if bytes_read > 0 {
            trace!("Processed {} received bytes", bytes_read);
        }

        let telemetry_sent = match engine.next_telemetry_frame() {
            Some(frame) => {
                self.port
                    .write_all(frame)
                    .await
                    .map_err(|e| CrsfError::Serial(format!("Failed to write telemetry: {}", e)))?;
                self.port
                    .flush()
                    .await
                    .map_err(|e| CrsfError::Serial(format!("Failed to flush serial port: {}", e)))?;
                trace!("Sent telemetry frame ({} bytes)", frame.len());
                true
            }
            None => false,
        };

        Ok(CycleReport {
            bytes_read,
            telemetry_sent,
        })
    }

    pub fn into_port(self) -> P {
        self.port
    }
}
