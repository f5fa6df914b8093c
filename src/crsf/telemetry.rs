//! # Telemetry Multiplexer
//!
//! Holds the latest value of every outgoing telemetry kind and emits at most
//! one frame per call, rotating over the kinds that have data so none of them
//! starves.
//!
//! By default a kind stays pending once set: every rotation re-sends its most
//! recent value until the host replaces it. [`PendingPolicy::ClearOnSend`]
//! turns that into one-shot delivery.

use serde::Deserialize;
use tracing::warn;

use super::buffer::FrameWriter;
use super::encoder::{write_battery_sensor, write_custom_payload};
use super::protocol::*;
use crate::error::FrameError;

/// Outgoing telemetry kinds, in rotation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
    Battery,
    Custom,
}

impl TelemetryKind {
    /// Every kind, in the order the multiplexer visits them
    pub const ALL: [TelemetryKind; 2] = [TelemetryKind::Battery, TelemetryKind::Custom];

    fn index(self) -> usize {
        match self {
            Self::Battery => 0,
            Self::Custom => 1,
        }
    }

    pub fn frame_type(self) -> FrameType {
        match self {
            Self::Battery => FrameType::BatterySensor,
            Self::Custom => FrameType::CustomPayload,
        }
    }
}

const KIND_COUNT: usize = TelemetryKind::ALL.len();

/// What happens to a kind's pending flag after it is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// Keep re-sending the latest value
    #[default]
    Sticky,
    /// Send each value once
    ClearOnSend,
}

/// Round-robin telemetry frame source
#[derive(Debug, Clone)]
pub struct TelemetryMux {
    pending: [bool; KIND_COUNT],
    /// Kinds that have been given a value, independent of the send policy
    stored: [bool; KIND_COUNT],
    battery: BatterySensor,
    custom: CustomPayload,
    cursor: usize,
    policy: PendingPolicy,
    writer: FrameWriter,
}

impl Default for TelemetryMux {
    fn default() -> Self {
        Self::new(PendingPolicy::default())
    }
}

impl TelemetryMux {
    pub fn new(policy: PendingPolicy) -> Self {
        Self {
            pending: [false; KIND_COUNT],
            stored: [false; KIND_COUNT],
            battery: BatterySensor::default(),
            custom: CustomPayload::default(),
            cursor: 0,
            policy,
            writer: FrameWriter::new(),
        }
    }

    pub fn policy(&self) -> PendingPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: PendingPolicy) {
        self.policy = policy;
    }

    pub fn is_pending(&self, kind: TelemetryKind) -> bool {
        self.pending[kind.index()]
    }

    /// Store new battery values and mark battery telemetry pending
    pub fn set_battery(&mut self, battery: BatterySensor) {
        self.battery = battery;
        self.mark_set(TelemetryKind::Battery);
    }

    /// Store a new custom payload and mark it pending.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLarge`] for more than 60 bytes. The
    /// previous payload and its pending flag are left untouched.
    pub fn set_custom_payload(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        self.custom = CustomPayload::new(bytes)?;
        self.mark_set(TelemetryKind::Custom);
        Ok(())
    }

    fn mark_set(&mut self, kind: TelemetryKind) {
        self.stored[kind.index()] = true;
        self.pending[kind.index()] = true;
    }

    /// Latest battery values, if any were set, whether or not already sent
    pub fn battery(&self) -> Option<&BatterySensor> {
        self.stored[TelemetryKind::Battery.index()].then_some(&self.battery)
    }

    /// Latest custom payload, if one was set, whether or not already sent
    pub fn custom_payload(&self) -> Option<&CustomPayload> {
        self.stored[TelemetryKind::Custom.index()].then_some(&self.custom)
    }

    /// Build the next telemetry frame, if any kind is pending.
    ///
    /// Scans from the cursor in wraparound order, emits the first pending kind
    /// and moves the cursor past it.
    pub fn next_frame(&mut self) -> Option<(TelemetryKind, &[u8])> {
        let index = (0..KIND_COUNT)
            .map(|step| (self.cursor + step) % KIND_COUNT)
            .find(|&index| self.pending[index])?;
        let kind = TelemetryKind::ALL[index];

        self.cursor = (index + 1) % KIND_COUNT;
        if self.policy == PendingPolicy::ClearOnSend {
            self.pending[index] = false;
        }

        match assemble(&mut self.writer, kind, &self.battery, &self.custom) {
            Ok(()) => Some((kind, self.writer.as_bytes())),
            Err(e) => {
                warn!("Failed to assemble {:?} telemetry frame: {}", kind, e);
                None
            }
        }
    }
}

fn assemble(
    writer: &mut FrameWriter,
    kind: TelemetryKind,
    battery: &BatterySensor,
    custom: &CustomPayload,
) -> Result<(), FrameError> {
    writer.begin_frame(kind.frame_type())?;
    match kind {
        TelemetryKind::Battery => write_battery_sensor(writer, battery)?,
        TelemetryKind::Custom => write_custom_payload(writer, custom)?,
    }
    writer.finish_frame()?;
    Ok(())
}
