//! # Failsafe Evaluation
//!
//! The link is considered lost when uplink quality drops to the link-quality
//! threshold or the selected antenna's RSSI (in -dBm, so larger is weaker)
//! reaches the RSSI threshold.

use super::protocol::LinkStatistics;

/// Default link-quality threshold in percent
pub const DEFAULT_LINK_QUALITY_THRESHOLD: u8 = 70;

/// Default RSSI threshold in -dBm
pub const DEFAULT_RSSI_THRESHOLD: u8 = 105;

/// Failsafe thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Failsafe when link quality is at or below this value
    pub link_quality: u8,

    /// Failsafe when RSSI is at or above this value
    pub rssi: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            link_quality: DEFAULT_LINK_QUALITY_THRESHOLD,
            rssi: DEFAULT_RSSI_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Whether `stats` describe a lost link
    pub fn is_failsafe(&self, stats: &LinkStatistics) -> bool {
        stats.link_quality() <= self.link_quality || stats.rssi() >= self.rssi
    }
}

/// Edge-triggered failsafe tracker
///
/// Holds the last computed state and reports only changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailsafeMonitor {
    active: bool,
}

impl Default for FailsafeMonitor {
    /// No statistics have arrived yet, so the link starts out lost
    fn default() -> Self {
        Self { active: true }
    }
}

impl FailsafeMonitor {
    pub fn new(active: bool) -> Self {
        Self { active }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Re-evaluate against fresh statistics.
    ///
    /// Returns `Some(new_state)` only when the state changed.
    pub fn update(&mut self, stats: &LinkStatistics, thresholds: &Thresholds) -> Option<bool> {
        let active = thresholds.is_failsafe(stats);
        if active == self.active {
            return None;
        }
        self.active = active;
        Some(active)
    }
}
