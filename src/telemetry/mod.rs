//! # Telemetry Module
//!
//! Host-side recording of link events to JSONL files with rotation.
//!
//! This module handles:
//! - Formatting decoded link events as JSONL (JSON Lines)
//! - Writing to rotating log files
//! - Managing file rotation (max N records per file)
//! - Retaining only last M files
//! - Throttling RC channel records

pub mod logger;

pub use logger::{EventRecorder, LinkEvent};

use tracing::{debug, info, warn};

use crate::crsf::protocol::{LinkStatistics, RcChannels};
use crate::engine::CrsfHandler;

/// Engine handler for the host binary
///
/// Logs link events through `tracing` and, when an [`EventRecorder`] is
/// attached, records them to disk. Recording failures are logged and do not
/// interrupt the link.
#[derive(Debug, Default)]
pub struct EventLogHandler {
    recorder: Option<EventRecorder>,
    last_stats: Option<LinkStatistics>,
}

impl EventLogHandler {
    pub fn new(recorder: Option<EventRecorder>) -> Self {
        Self {
            recorder,
            last_stats: None,
        }
    }

    pub fn recorder(&self) -> Option<&EventRecorder> {
        self.recorder.as_ref()
    }

    pub fn recorder_mut(&mut self) -> Option<&mut EventRecorder> {
        self.recorder.as_mut()
    }

    fn record(&mut self, event: LinkEvent) {
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.record(&event) {
                warn!("Failed to record link event: {}", e);
            }
        }
    }
}

impl CrsfHandler for EventLogHandler {
    fn on_rc_channels(&mut self, channels: &RcChannels) {
        self.record(LinkEvent::rc_channels(channels));
    }

    fn on_link_statistics(&mut self, stats: &LinkStatistics) {
        debug!(
            "Link: RSSI -{}dBm, LQ {}%, SNR {}dB, {}mW",
            stats.rssi(),
            stats.link_quality(),
            stats.uplink_snr,
            stats.tx_power_mw()
        );
        self.last_stats = Some(*stats);
        self.record(LinkEvent::link_statistics(stats));
    }

    fn on_failsafe(&mut self, active: bool) {
        match (active, self.last_stats) {
            (true, Some(stats)) => warn!(
                "Failsafe engaged (LQ {}%, RSSI -{}dBm)",
                stats.link_quality(),
                stats.rssi()
            ),
            (true, None) => warn!("Failsafe engaged"),
            (false, _) => info!("Link recovered, failsafe cleared"),
        }
        self.record(LinkEvent::failsafe(active));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventLogConfig;
    use crate::crsf::encoder::encode_link_statistics_frame;
    use crate::engine::CrsfEngine;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_handler_without_recorder() {
        let mut handler = EventLogHandler::default();
        handler.on_rc_channels(&[992; 16]);
        handler.on_failsafe(true);
        assert!(handler.recorder().is_none());
    }

    #[test]
    fn test_engine_events_are_recorded() {
        let dir = TempDir::new().unwrap();
        let config = EventLogConfig {
            enabled: true,
            log_dir: dir.path().to_string_lossy().into_owned(),
            ..EventLogConfig::default()
        };
        let recorder = EventRecorder::new(&config).unwrap();
        let mut engine = CrsfEngine::new(EventLogHandler::new(Some(recorder)));

        let stats = LinkStatistics {
            uplink_rssi_1: 60,
            uplink_lq: 100,
            ..Default::default()
        };
        for byte in encode_link_statistics_frame(&stats).unwrap() {
            engine.feed(byte);
        }

        let recorder = engine.handler_mut().recorder_mut().unwrap();
        recorder.flush().unwrap();
        let path = recorder.current_path().unwrap().to_path_buf();

        let contents = fs::read_to_string(path).unwrap();
        let events: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "link_statistics");
        assert_eq!(events[1]["event"], "failsafe");
        assert_eq!(events[1]["active"], false);
    }
}
