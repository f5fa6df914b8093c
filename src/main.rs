//! # CRSF Link
//!
//! Receiver-side CRSF bridge for a serial port.
//!
//! Decodes RC channels and link statistics arriving on the port, tracks
//! failsafe, and answers with battery and custom telemetry frames.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

use crsf_link::config::{Config, TelemetryConfig};
use crsf_link::engine::{CrsfEngine, CrsfHandler};
use crsf_link::serial::{CrsfSerial, LinkDriver};
use crsf_link::telemetry::{EventLogHandler, EventRecorder};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/crsf-link.toml";

/// Time between status log messages
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Main entry point for CRSF Link
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber (non-blocking stdout)
///    - Load configuration from the first argument, the default path, or
///      built-in defaults
///    - Build the engine and apply configured telemetry values
///
/// 2. **Main Loop**
///    - Open the serial port, retrying every `reconnect_interval_ms`
///    - Read, decode and answer with one telemetry frame per cycle
///    - Reconnect on I/O errors
///    - Handle Ctrl+C for graceful shutdown
///
/// # Examples
///
/// ```bash
/// RUST_LOG=crsf_link=debug cargo run --release -- config/crsf-link.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let (log_writer, _log_guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(log_writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("CRSF Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(std::env::args().nth(1).as_deref())?;

    let recorder = if config.event_log.enabled {
        Some(EventRecorder::new(&config.event_log).context("Failed to start event log")?)
    } else {
        None
    };

    let mut engine = CrsfEngine::with_options(
        EventLogHandler::new(recorder),
        config.engine_options(),
    );
    apply_telemetry(&mut engine, &config.telemetry)?;

    run(&config, &mut engine).await;

    if let Some(recorder) = engine.handler_mut().recorder_mut() {
        recorder.flush()?;
    }
    Ok(())
}

/// Load the explicit config file, else the default one if present, else defaults
fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Config::load(path).with_context(|| format!("Failed to load {}", path))
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            info!("Loading configuration from {}", DEFAULT_CONFIG_PATH);
            Config::load(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH))
        }
        None => {
            info!("No configuration file, using defaults");
            Ok(Config::default())
        }
    }
}

/// Push configured battery and custom payload values into the engine
fn apply_telemetry<H: CrsfHandler>(
    engine: &mut CrsfEngine<H>,
    telemetry: &TelemetryConfig,
) -> Result<()> {
    if let Some(battery) = telemetry.battery {
        let sensor = battery.to_sensor();
        engine.set_battery_data(sensor.voltage, sensor.current, sensor.capacity, sensor.percent);
        debug!("Battery telemetry: {:?}", sensor);
    }

    if let Some(payload) = &telemetry.custom_payload {
        engine
            .set_custom_payload(payload.as_bytes())
            .context("Invalid custom telemetry payload")?;
        debug!("Custom telemetry payload: {} bytes", payload.len());
    }

    Ok(())
}

/// Serve the link until Ctrl+C, reconnecting after I/O errors
async fn run<H: CrsfHandler>(config: &Config, engine: &mut CrsfEngine<H>) {
    let reconnect_interval = Duration::from_millis(config.serial.reconnect_interval_ms);
    let read_budget = Duration::from_micros(config.serial.read_budget_us);

    info!("Press Ctrl+C to exit");

    loop {
        let serial = match CrsfSerial::open(&config.serial) {
            Ok(serial) => serial,
            Err(e) => {
                warn!("{}; retrying in {:?}", e, reconnect_interval);
                if shutdown_requested(reconnect_interval).await {
                    return;
                }
                continue;
            }
        };

        let mut driver = LinkDriver::new(serial.into_port(), read_budget);
        let mut bytes_received: u64 = 0;
        let mut telemetry_sent: u64 = 0;
        let mut last_status = Instant::now();

        loop {
            tokio::select! {
                report = driver.poll(engine) => {
                    match report {
                        Ok(report) => {
                            bytes_received += report.bytes_read as u64;
                            telemetry_sent += u64::from(report.telemetry_sent);
                        }
                        Err(e) => {
                            warn!("Link error: {}; reconnecting", e);
                            engine.reset();
                            break;
                        }
                    }

                    if last_status.elapsed() >= STATUS_INTERVAL {
                        info!(
                            "Received {} bytes, sent {} telemetry frames, failsafe {}",
                            bytes_received,
                            telemetry_sent,
                            if engine.is_failsafe() { "active" } else { "clear" }
                        );
                        last_status = Instant::now();
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                    info!("Total bytes received: {}, telemetry frames sent: {}", bytes_received, telemetry_sent);
                    return;
                }
            }
        }

        if shutdown_requested(reconnect_interval).await {
            return;
        }
    }
}

/// Wait `delay`, returning early with `true` on Ctrl+C
async fn shutdown_requested(delay: Duration) -> bool {
    tokio::select! {
        _ = sleep(delay) => false,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            true
        }
    }
}
