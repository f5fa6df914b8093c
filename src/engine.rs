//! # CRSF Engine
//!
//! One engine instance per physical link. It owns the frame decoder, the
//! failsafe state, the telemetry multiplexer and the handler that receives
//! decoded events. Instances share nothing, so several links can run side by
//! side.
//!
//! The engine does not own the transport. Hosts either call [`CrsfEngine::feed`]
//! and [`CrsfEngine::next_telemetry_frame`] themselves, or hand a
//! [`ByteChannel`] to [`CrsfEngine::process_frames`].

use std::fmt;
use std::io;

use tracing::{debug, trace};

use crate::crsf::decoder::{
    decode_link_statistics, decode_rc_channels, DecodeOutcome, DecoderState, FrameDecoder,
};
use crate::crsf::failsafe::{FailsafeMonitor, Thresholds};
use crate::crsf::protocol::{BatterySensor, FrameType, LinkStatistics, RcChannels};
use crate::crsf::telemetry::{PendingPolicy, TelemetryMux};
use crate::error::FrameError;

/// Receiver of decoded link events
///
/// Every method has a no-op default, so handlers implement only what they
/// care about.
#[cfg_attr(test, mockall::automock)]
pub trait CrsfHandler {
    /// A checksummed RC_CHANNELS_PACKED frame arrived
    fn on_rc_channels(&mut self, _channels: &RcChannels) {}

    /// A checksummed LINK_STATISTICS frame arrived
    fn on_link_statistics(&mut self, _stats: &LinkStatistics) {}

    /// The failsafe state changed
    fn on_failsafe(&mut self, _active: bool) {}
}

/// Handler that ignores every event
impl CrsfHandler for () {}

type RcChannelsCallback = Box<dyn FnMut(&RcChannels) + Send>;
type LinkStatisticsCallback = Box<dyn FnMut(&LinkStatistics) + Send>;
type FailsafeCallback = Box<dyn FnMut(bool) + Send>;

/// Closure-backed handler
///
/// ```
/// use crsf_link::engine::{Callbacks, CrsfEngine};
///
/// let mut callbacks = Callbacks::default();
/// callbacks.set_on_failsafe(|active| println!("failsafe: {active}"));
/// let engine = CrsfEngine::new(callbacks);
/// assert!(engine.is_failsafe());
/// ```
#[derive(Default)]
pub struct Callbacks {
    rc_channels: Option<RcChannelsCallback>,
    link_statistics: Option<LinkStatisticsCallback>,
    failsafe: Option<FailsafeCallback>,
}

impl Callbacks {
    pub fn set_on_rc_channels<F>(&mut self, callback: F)
    where
        F: FnMut(&RcChannels) + Send + 'static,
    {
        self.rc_channels = Some(Box::new(callback));
    }

    pub fn set_on_link_statistics<F>(&mut self, callback: F)
    where
        F: FnMut(&LinkStatistics) + Send + 'static,
    {
        self.link_statistics = Some(Box::new(callback));
    }

    pub fn set_on_failsafe<F>(&mut self, callback: F)
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.failsafe = Some(Box::new(callback));
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("rc_channels", &self.rc_channels.is_some())
            .field("link_statistics", &self.link_statistics.is_some())
            .field("failsafe", &self.failsafe.is_some())
            .finish()
    }
}

impl CrsfHandler for Callbacks {
    fn on_rc_channels(&mut self, channels: &RcChannels) {
        if let Some(callback) = self.rc_channels.as_mut() {
            callback(channels);
        }
    }

    fn on_link_statistics(&mut self, stats: &LinkStatistics) {
        if let Some(callback) = self.link_statistics.as_mut() {
            callback(stats);
        }
    }

    fn on_failsafe(&mut self, active: bool) {
        if let Some(callback) = self.failsafe.as_mut() {
            callback(active);
        }
    }
}

/// Raw duplex byte transport
pub trait ByteChannel {
    /// Whether a byte is available, waiting at most the channel's timing budget
    fn is_readable(&mut self) -> bool;

    fn read_byte(&mut self) -> io::Result<u8>;

    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }
}

/// Engine construction options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub thresholds: Thresholds,
    /// Accept 0xEE as a sync byte on input
    pub accept_alt_sync: bool,
    pub pending_policy: PendingPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            accept_alt_sync: true,
            pending_policy: PendingPolicy::default(),
        }
    }
}

/// CRSF frame protocol engine for one link
#[derive(Debug)]
pub struct CrsfEngine<H> {
    decoder: FrameDecoder,
    telemetry: TelemetryMux,
    thresholds: Thresholds,
    failsafe: FailsafeMonitor,
    rc_channels: RcChannels,
    link_statistics: Option<LinkStatistics>,
    handler: H,
}

impl<H: Default + CrsfHandler> Default for CrsfEngine<H> {
    fn default() -> Self {
        Self::new(H::default())
    }
}

impl<H: CrsfHandler> CrsfEngine<H> {
    /// Create an engine with default thresholds (LQ 70, RSSI 105)
    pub fn new(handler: H) -> Self {
        Self::with_options(handler, EngineOptions::default())
    }

    pub fn with_options(handler: H, options: EngineOptions) -> Self {
        Self {
            decoder: FrameDecoder::new().with_alt_sync(options.accept_alt_sync),
            telemetry: TelemetryMux::new(options.pending_policy),
            thresholds: options.thresholds,
            failsafe: FailsafeMonitor::default(),
            rc_channels: [0; 16],
            link_statistics: None,
            handler,
        }
    }

    /// Consume one received byte, dispatching any frame it completes.
    ///
    /// A frame that passes its checksum but is too short for its type is
    /// reported as [`DecodeOutcome::Rejected`] and raises no event.
    pub fn feed(&mut self, byte: u8) -> DecodeOutcome {
        let outcome = self.decoder.feed(byte);

        match outcome {
            DecodeOutcome::Complete(frame_type) => {
                if let Err(e) = self.dispatch(frame_type) {
                    debug!("Dropping {} frame: {}", frame_type, e);
                    return DecodeOutcome::Rejected(e);
                }
            }
            DecodeOutcome::Rejected(e) => debug!("Frame rejected: {}", e),
            DecodeOutcome::Skipped | DecodeOutcome::Accepted => {}
        }

        outcome
    }

    fn dispatch(&mut self, frame_type: FrameType) -> Result<(), FrameError> {
        match frame_type {
            FrameType::RcChannelsPacked => {
                self.rc_channels = decode_rc_channels(self.decoder.payload())?;
                self.handler.on_rc_channels(&self.rc_channels);
            }
            FrameType::LinkStatistics => {
                let stats = decode_link_statistics(self.decoder.payload())?;
                self.link_statistics = Some(stats);
                self.handler.on_link_statistics(&stats);

                if let Some(active) = self.failsafe.update(&stats, &self.thresholds) {
                    debug!(
                        "Failsafe {} (LQ {}%, RSSI -{}dBm)",
                        if active { "engaged" } else { "cleared" },
                        stats.link_quality(),
                        stats.rssi()
                    );
                    self.handler.on_failsafe(active);
                }
            }
            other => trace!("Ignoring frame type {}", other),
        }

        Ok(())
    }

    /// Drain every readable byte from `channel`, then send at most one
    /// telemetry frame back over it.
    ///
    /// Returns the number of bytes consumed.
    pub fn process_frames<C: ByteChannel>(&mut self, channel: &mut C) -> io::Result<usize> {
        let mut consumed = 0;
        while channel.is_readable() {
            let byte = channel.read_byte()?;
            self.feed(byte);
            consumed += 1;
        }

        self.send_telemetry(channel)?;
        Ok(consumed)
    }

    /// Write the next pending telemetry frame, if any, to `channel`.
    ///
    /// Returns whether a frame was written.
    pub fn send_telemetry<C: ByteChannel>(&mut self, channel: &mut C) -> io::Result<bool> {
        match self.next_telemetry_frame() {
            Some(frame) => {
                channel.write_all(frame)?;
                trace!("Sent telemetry frame ({} bytes)", frame.len());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Next outgoing telemetry frame in round-robin order
    pub fn next_telemetry_frame(&mut self) -> Option<&[u8]> {
        self.telemetry.next_frame().map(|(_, frame)| frame)
    }

    /// Drop any partially received frame
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    pub fn decoder_state(&self) -> DecoderState {
        self.decoder.state()
    }

    pub fn set_link_quality_threshold(&mut self, threshold: u8) {
        self.thresholds.link_quality = threshold;
    }

    pub fn set_rssi_threshold(&mut self, threshold: u8) {
        self.thresholds.rssi = threshold;
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Set battery telemetry: voltage in dV, current in dA, capacity in mAh
    /// (24 bits), remaining percent
    pub fn set_battery_data(&mut self, voltage: u16, current: u16, capacity: u32, percent: u8) {
        self.telemetry.set_battery(BatterySensor {
            voltage,
            current,
            capacity,
            percent,
        });
    }

    /// Set the custom telemetry payload.
    ///
    /// # Errors
    ///
    /// Payloads over 60 bytes are rejected and the previous payload is kept.
    pub fn set_custom_payload(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        self.telemetry.set_custom_payload(bytes).map_err(|e| {
            debug!("Rejected custom telemetry payload: {}", e);
            e
        })
    }

    pub fn telemetry(&self) -> &TelemetryMux {
        &self.telemetry
    }

    /// Channels from the most recent RC frame (all zero before the first)
    pub fn rc_channels(&self) -> &RcChannels {
        &self.rc_channels
    }

    /// Statistics from the most recent link statistics frame
    pub fn link_statistics(&self) -> Option<&LinkStatistics> {
        self.link_statistics.as_ref()
    }

    pub fn is_failsafe(&self) -> bool {
        self.failsafe.is_active()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}
