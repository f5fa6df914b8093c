//! JSONL event recorder with file rotation

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EventLogConfig;
use crate::crsf::protocol::{ticks_to_us, LinkStatistics, RcChannels};
use crate::error::Result;

const FILE_PREFIX: &str = "crsf_events_";
const FILE_EXTENSION: &str = "jsonl";

/// One recordable link event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LinkEvent {
    RcChannels {
        channels: RcChannels,
        /// Channel values converted to microseconds
        channels_us: [u16; 16],
    },
    LinkStatistics {
        stats: LinkStatistics,
        rssi: u8,
        tx_power_mw: u16,
    },
    Failsafe {
        active: bool,
    },
}

impl LinkEvent {
    pub fn rc_channels(channels: &RcChannels) -> Self {
        Self::RcChannels {
            channels: *channels,
            channels_us: channels.map(ticks_to_us),
        }
    }

    pub fn link_statistics(stats: &LinkStatistics) -> Self {
        Self::LinkStatistics {
            stats: *stats,
            rssi: stats.rssi(),
            tx_power_mw: stats.tx_power_mw(),
        }
    }

    pub fn failsafe(active: bool) -> Self {
        Self::Failsafe { active }
    }
}

/// Writes link events as JSON Lines
///
/// A new file is started after `max_records_per_file` records and only the
/// newest `max_files_to_keep` files are kept. RC channel events arrive at
/// packet rate, so they are recorded at most once per `rc_interval`.
pub struct EventRecorder {
    log_dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    rc_interval: Duration,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    file_sequence: u64,
    last_rc: Option<Instant>,
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("log_dir", &self.log_dir)
            .field("current_path", &self.current_path)
            .field("records_in_file", &self.records_in_file)
            .finish_non_exhaustive()
    }
}

impl EventRecorder {
    /// Create a recorder writing into `config.log_dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(config: &EventLogConfig) -> Result<Self> {
        let log_dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&log_dir)?;
        info!("Recording link events to {}", log_dir.display());

        Ok(Self {
            log_dir,
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            rc_interval: Duration::from_millis(config.rc_interval_ms),
            writer: None,
            current_path: None,
            records_in_file: 0,
            file_sequence: 0,
            last_rc: None,
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// File currently being written, if any record was written yet
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Record `event` now
    ///
    /// Returns whether the event was written (throttled RC events are not).
    pub fn record(&mut self, event: &LinkEvent) -> Result<bool> {
        self.record_at(event, Instant::now())
    }

    /// Record `event` as if observed at `now`
    pub fn record_at(&mut self, event: &LinkEvent, now: Instant) -> Result<bool> {
        if let LinkEvent::RcChannels { .. } = event {
            if let Some(last) = self.last_rc {
                if now.saturating_duration_since(last) < self.rc_interval {
                    return Ok(false);
                }
            }
            self.last_rc = Some(now);
        }

        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let mut record = serde_json::to_value(event).map_err(io::Error::from)?;
        if let Value::Object(fields) = &mut record {
            fields.insert(
                "timestamp".to_string(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, &record).map_err(io::Error::from)?;
            writer.write_all(b"\n")?;
            self.records_in_file += 1;
        }

        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Close the current file and open the next one
    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        self.file_sequence += 1;
        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_sequence,
            FILE_EXTENSION
        );
        let path = self.log_dir.join(name);

        let file = File::create(&path)?;
        debug!("Opened event log {}", path.display());
        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Delete the oldest event logs beyond `max_files_to_keep`
    fn prune(&self) -> Result<()> {
        let mut files = self.log_files()?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        let excess = files.len() - self.max_files_to_keep;
        for path in files.drain(..excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old event log {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }

    /// Event log files in the log directory, oldest first
    pub fn log_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_event_log(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush event log: {}", e);
        }
    }
}

fn is_event_log(path: &Path) -> bool {
    let has_prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(FILE_PREFIX));
    has_prefix && path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
}
