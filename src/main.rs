//! Edgehog device agent — main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  LogSession      NvsSettings     EspTimerFactory   EspPlatform │
//! │  (Session)       (SettingsPort)  (TimerFactory)    (Platform)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   Device: state machine · event router · publishers    │    │
//! │  │   TelemetryScheduler: entries · queue · worker task    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{info, warn};

use edgehog_device::adapters::{EspPlatform, EspTimerFactory, LogSession, NvsSettings};
use edgehog_device::app::ports::Session;
use edgehog_device::error::TransportError;
use edgehog_device::{Device, DeviceConfig, DevicePorts, TelemetryConfig, TelemetryKind};

/// Main loop period between `Device::poll` calls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Session factory handed to the device; a cloud transport plugs in here.
fn open_session() -> core::result::Result<Arc<dyn Session>, TransportError> {
    Ok(Arc::new(LogSession::new()))
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Edgehog device agent v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config = DeviceConfig {
        telemetry: vec![
            TelemetryConfig::new(TelemetryKind::HardwareInfo, 3600),
            TelemetryConfig::new(TelemetryKind::SystemStatus, 60),
            TelemetryConfig::new(TelemetryKind::StorageUsage, 600),
            TelemetryConfig::new(TelemetryKind::WifiScan, 600),
        ],
        disconnect_timeout_ms: 5000,
        ..DeviceConfig::default()
    };
    let stop_timeout = Duration::from_millis(u64::from(config.disconnect_timeout_ms));

    // ── 3. Adapters ───────────────────────────────────────────
    let settings = NvsSettings::new().map_err(|e| anyhow!("settings init failed: {e}"))?;
    let ports = DevicePorts {
        sessions: Box::new(open_session),
        settings: Box::new(settings),
        timers: Box::new(EspTimerFactory),
        platform: Arc::new(EspPlatform::new()),
        services: None,
        callbacks: None,
    };

    // ── 4. Device ─────────────────────────────────────────────
    let mut device = Device::new(config, ports).map_err(|e| anyhow!("device init failed: {e}"))?;
    device.start().map_err(|e| anyhow!("device start failed: {e}"))?;
    info!("System ready. Entering poll loop.");

    // ── 5. Poll loop ──────────────────────────────────────────
    loop {
        if let Err(e) = device.poll() {
            warn!("Device: poll failed: {}", e);
            if let Err(e) = device.stop(stop_timeout) {
                warn!("Device: stop failed: {}", e);
            }
            if let Err(e) = device.start() {
                warn!("Device: restart failed: {}", e);
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
