//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; an empty document yields
//! [`Config::default`].

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::crsf::failsafe::Thresholds;
use crate::crsf::protocol::{BatterySensor, CRSF_BATTERY_CAPACITY_MAX, CRSF_MAX_PAYLOAD_SIZE};
use crate::crsf::telemetry::PendingPolicy;
use crate::engine::EngineOptions;
use crate::error::{CrsfError, Result};

/// Baud rates accepted for the serial link
pub const SUPPORTED_BAUD_RATES: [u32; 7] =
    [115200, 400000, 416666, 420000, 921600, 1870000, 3750000];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub event_log: EventLogConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// How long a read waits for the next byte before the cycle moves on
    ///
    /// The tokio timer ticks in milliseconds, so values under 1000 all wait
    /// about 1 ms.
    #[serde(default = "default_read_budget_us")]
    pub read_budget_us: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Link supervision configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LinkConfig {
    #[serde(default = "default_link_quality_threshold")]
    pub link_quality_threshold: u8,

    #[serde(default = "default_rssi_threshold")]
    pub rssi_threshold: u8,

    #[serde(default = "default_accept_alt_sync")]
    pub accept_alt_sync: bool,
}

/// Outgoing telemetry configuration
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub pending_policy: PendingPolicy,

    #[serde(default)]
    pub battery: Option<BatteryConfig>,

    #[serde(default)]
    pub custom_payload: Option<String>,
}

/// Static battery values reported upstream
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryConfig {
    #[serde(default)]
    pub voltage_dv: u16,

    #[serde(default)]
    pub current_da: u16,

    #[serde(default)]
    pub capacity_mah: u32,

    #[serde(default)]
    pub percent: u8,
}

/// Event log configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EventLogConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    /// Minimum spacing between recorded RC channel frames
    #[serde(default = "default_rc_interval_ms")]
    pub rc_interval_ms: u64,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyAMA0".to_string() }
fn default_baud_rate() -> u32 { 420000 }
fn default_read_budget_us() -> u64 { 24 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_link_quality_threshold() -> u8 { 70 }
fn default_rssi_threshold() -> u8 { 105 }
fn default_accept_alt_sync() -> bool { true }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_rc_interval_ms() -> u64 { 100 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_budget_us: default_read_budget_us(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            link_quality_threshold: default_link_quality_threshold(),
            rssi_threshold: default_rssi_threshold(),
            accept_alt_sync: default_accept_alt_sync(),
        }
    }
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            rc_interval_ms: default_rc_interval_ms(),
        }
    }
}

impl BatteryConfig {
    pub fn to_sensor(self) -> BatterySensor {
        BatterySensor {
            voltage: self.voltage_dv,
            current: self.current_da,
            capacity: self.capacity_mah,
            percent: self.percent,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> CrsfError {
    CrsfError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use crsf_link::config::Config;
    ///
    /// let config = Config::load("config/crsf-link.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Engine options derived from the `[link]` and `[telemetry]` sections
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            thresholds: Thresholds {
                link_quality: self.link.link_quality_threshold,
                rssi: self.link.rssi_threshold,
            },
            accept_alt_sync: self.link.accept_alt_sync,
            pending_policy: self.telemetry.pending_policy,
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                SUPPORTED_BAUD_RATES.map(|rate| rate.to_string()).join(", ")
            )));
        }

        if self.serial.read_budget_us == 0 || self.serial.read_budget_us > 100_000 {
            return Err(invalid("read_budget_us must be between 1 and 100000"));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.link.link_quality_threshold > 100 {
            return Err(invalid("link_quality_threshold must be between 0 and 100"));
        }

        if let Some(battery) = &self.telemetry.battery {
            if battery.capacity_mah > CRSF_BATTERY_CAPACITY_MAX {
                return Err(invalid("battery capacity_mah must fit in 24 bits (max 16777215)"));
            }
            if battery.percent > 100 {
                return Err(invalid("battery percent must be between 0 and 100"));
            }
        }

        if let Some(payload) = &self.telemetry.custom_payload {
            if payload.len() > CRSF_MAX_PAYLOAD_SIZE {
                return Err(invalid(format!(
                    "custom_payload is {} bytes, maximum is {}",
                    payload.len(),
                    CRSF_MAX_PAYLOAD_SIZE
                )));
            }
        }

        if self.event_log.enabled && self.event_log.log_dir.is_empty() {
            return Err(invalid("event_log log_dir cannot be empty when enabled"));
        }

        if self.event_log.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.event_log.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.event_log.rc_interval_ms == 0 || self.event_log.rc_interval_ms > 60000 {
            return Err(invalid("rc_interval_ms must be between 1 and 60000"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> Config {
        Config {
            serial: SerialConfig {
                port: "/dev/ttyUSB0".to_string(),
                ..SerialConfig::default()
            },
            telemetry: TelemetryConfig {
                pending_policy: PendingPolicy::Sticky,
                battery: Some(BatteryConfig {
                    voltage_dv: 168,
                    current_da: 12,
                    capacity_mah: 1300,
                    percent: 90,
                }),
                custom_payload: Some("hello".to_string()),
            },
            event_log: EventLogConfig {
                enabled: true,
                ..EventLogConfig::default()
            },
            ..Config::default()
        }
    }

    fn assert_invalid(config: Config, fragment: &str) {
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains(fragment),
            "expected '{}' in '{}'",
            fragment,
            err
        );
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.serial.port, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud_rate, 420000);
        assert_eq!(config.serial.read_budget_us, 24);
        assert_eq!(config.serial.reconnect_interval_ms, 1000);
        assert_eq!(config.link.link_quality_threshold, 70);
        assert_eq!(config.link.rssi_threshold, 105);
        assert!(config.link.accept_alt_sync);
        assert_eq!(config.telemetry.pending_policy, PendingPolicy::Sticky);
        assert!(config.telemetry.battery.is_none());
        assert!(!config.event_log.enabled);
        assert_eq!(config.event_log.log_dir, "./logs");
    }

    #[test]
    fn test_empty_document_equals_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_valid_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
[serial]
port = "/dev/ttyUSB0"
baud_rate = 416666

[link]
link_quality_threshold = 50
accept_alt_sync = false

[telemetry]
pending_policy = "clear_on_send"
custom_payload = "fw:1.2"

[telemetry.battery]
voltage_dv = 252
percent = 75

[event_log]
enabled = true
rc_interval_ms = 20
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 416666);
        assert_eq!(config.serial.read_budget_us, 24);
        assert_eq!(config.link.link_quality_threshold, 50);
        assert_eq!(config.link.rssi_threshold, 105);
        assert!(!config.link.accept_alt_sync);
        assert_eq!(config.telemetry.pending_policy, PendingPolicy::ClearOnSend);
        assert_eq!(config.telemetry.custom_payload.as_deref(), Some("fw:1.2"));

        let battery = config.telemetry.battery.unwrap();
        assert_eq!(battery.voltage_dv, 252);
        assert_eq!(battery.current_da, 0);
        assert_eq!(battery.percent, 75);

        assert!(config.event_log.enabled);
        assert_eq!(config.event_log.rc_interval_ms, 20);
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/crsf-link.toml");
        assert_eq!(Config::load(path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/crsf-link.toml");
        assert!(matches!(result, Err(CrsfError::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[serial\nport = ").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(CrsfError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_pending_policy() {
        let result = Config::parse("[telemetry]\npending_policy = \"sometimes\"\n");
        assert!(matches!(result, Err(CrsfError::Config(_))));
    }

    #[test]
    fn test_engine_options() {
        let mut config = create_valid_config();
        config.link.link_quality_threshold = 40;
        config.link.rssi_threshold = 90;
        config.link.accept_alt_sync = false;
        config.telemetry.pending_policy = PendingPolicy::ClearOnSend;

        let options = config.engine_options();
        assert_eq!(options.thresholds.link_quality, 40);
        assert_eq!(options.thresholds.rssi, 90);
        assert!(!options.accept_alt_sync);
        assert_eq!(options.pending_policy, PendingPolicy::ClearOnSend);

        assert_eq!(Config::default().engine_options(), EngineOptions::default());
    }

    #[test]
    fn test_battery_to_sensor() {
        let sensor = create_valid_config().telemetry.battery.unwrap().to_sensor();
        assert_eq!(sensor.voltage, 168);
        assert_eq!(sensor.current, 12);
        assert_eq!(sensor.capacity, 1300);
        assert_eq!(sensor.percent, 90);
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = create_valid_config();
        config.serial.port = String::new();
        assert_invalid(config, "serial port cannot be empty");
    }

    #[test]
    fn test_baud_rates() {
        for rate in SUPPORTED_BAUD_RATES {
            let mut config = create_valid_config();
            config.serial.baud_rate = rate;
            assert!(config.validate().is_ok(), "baud rate {}", rate);
        }

        let mut config = create_valid_config();
        config.serial.baud_rate = 9600;
        assert_invalid(config, "baud_rate must be one of");
    }

    #[test]
    fn test_read_budget_bounds() {
        let mut config = create_valid_config();
        config.serial.read_budget_us = 0;
        assert_invalid(config, "read_budget_us");

        let mut config = create_valid_config();
        config.serial.read_budget_us = 100_001;
        assert_invalid(config, "read_budget_us");

        let mut config = create_valid_config();
        config.serial.read_budget_us = 100_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reconnect_interval_bounds() {
        let mut config = create_valid_config();
        config.serial.reconnect_interval_ms = 0;
        assert_invalid(config, "reconnect_interval_ms");

        let mut config = create_valid_config();
        config.serial.reconnect_interval_ms = 60001;
        assert_invalid(config, "reconnect_interval_ms");
    }

    #[test]
    fn test_link_quality_threshold_too_high() {
        let mut config = create_valid_config();
        config.link.link_quality_threshold = 101;
        assert_invalid(config, "link_quality_threshold");

        let mut config = create_valid_config();
        config.link.link_quality_threshold = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_battery_capacity_too_large() {
        let mut config = create_valid_config();
        if let Some(battery) = config.telemetry.battery.as_mut() {
            battery.capacity_mah = 0x0100_0000;
        }
        assert_invalid(config, "capacity_mah");
    }

    #[test]
    fn test_battery_percent_too_high() {
        let mut config = create_valid_config();
        if let Some(battery) = config.telemetry.battery.as_mut() {
            battery.percent = 101;
        }
        assert_invalid(config, "percent");
    }

    #[test]
    fn test_custom_payload_length() {
        let mut config = create_valid_config();
        config.telemetry.custom_payload = Some("x".repeat(60));
        assert!(config.validate().is_ok());

        config.telemetry.custom_payload = Some("x".repeat(61));
        assert_invalid(config, "custom_payload is 61 bytes");
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.event_log.log_dir = String::new();
        assert_invalid(config, "log_dir");
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.event_log.enabled = false;
        config.event_log.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = create_valid_config();
        config.event_log.max_records_per_file = 0;
        assert_invalid(config, "max_records_per_file");
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.event_log.max_files_to_keep = 0;
        assert_invalid(config, "max_files_to_keep");
    }

    #[test]
    fn test_rc_interval_bounds() {
        let mut config = create_valid_config();
        config.event_log.rc_interval_ms = 0;
        assert_invalid(config, "rc_interval_ms");

        let mut config = create_valid_config();
        config.event_log.rc_interval_ms = 60001;
        assert_invalid(config, "rc_interval_ms");
    }
}
