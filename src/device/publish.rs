//! Per-kind telemetry publish routines.
//!
//! [`SessionPublisher`] is the dispatch point the telemetry worker calls
//! with a kind; it gathers the facts from the [`PlatformPort`] and pushes
//! them through the [`Session`].  It also owns the one-time post-connect
//! burst, which adds the device-info interfaces nothing reschedules, and
//! the application-driven battery status.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::app::events::Value;
use crate::app::ports::{BatteryStatus, PlatformPort, Session, TelemetryPublisher};
use crate::error::{Error, Result};
use crate::telemetry::TelemetryKind;

pub const OS_INFO_INTERFACE: &str = "io.edgehog.devicemanager.OSInfo";
pub const SYSTEM_INFO_INTERFACE: &str = "io.edgehog.devicemanager.SystemInfo";
pub const BASE_IMAGE_INTERFACE: &str = "io.edgehog.devicemanager.BaseImage";
pub const RUNTIME_INFO_INTERFACE: &str = "io.edgehog.devicemanager.RuntimeInfo";
pub const BATTERY_STATUS_INTERFACE: &str = "io.edgehog.devicemanager.BatteryStatus";

const SYSTEM_STATUS_PATH: &str = "/systemStatus";

const RUNTIME_NAME: &str = env!("CARGO_PKG_NAME");
const RUNTIME_URL: &str = env!("CARGO_PKG_REPOSITORY");
const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One step of the post-connect burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BurstStep {
    Telemetry(TelemetryKind),
    OsInfo,
    SystemInfo,
    BaseImage,
    RuntimeInfo,
}

const INITIAL_BURST: [BurstStep; 8] = [
    BurstStep::Telemetry(TelemetryKind::HardwareInfo),
    BurstStep::OsInfo,
    BurstStep::SystemInfo,
    BurstStep::BaseImage,
    BurstStep::RuntimeInfo,
    BurstStep::Telemetry(TelemetryKind::SystemStatus),
    BurstStep::Telemetry(TelemetryKind::StorageUsage),
    BurstStep::Telemetry(TelemetryKind::WifiScan),
];

/// Publishes one kind's payload per call.
pub struct SessionPublisher {
    session: Arc<dyn Session>,
    platform: Arc<dyn PlatformPort>,
    boot_id: String,
}

impl SessionPublisher {
    pub fn new(
        session: Arc<dyn Session>,
        platform: Arc<dyn PlatformPort>,
        boot_id: String,
    ) -> Self {
        Self {
            session,
            platform,
            boot_id,
        }
    }

    /// Publish everything the cloud expects right after the first connect.
    ///
    /// Each step fails independently; failures are logged and the burst
    /// moves on.
    pub fn initial_burst(&self) {
        info!("Publish: initial burst");
        for step in INITIAL_BURST {
            let result = match step {
                BurstStep::Telemetry(kind) => self.publish(kind),
                BurstStep::OsInfo => self.os_info(),
                BurstStep::SystemInfo => self.system_info(),
                BurstStep::BaseImage => self.base_image(),
                BurstStep::RuntimeInfo => self.runtime_info(),
            };
            if let Err(e) = result {
                warn!("Publish: initial {:?} failed: {}", step, e);
            }
        }
    }

    /// Stream one battery slot reading as an object under `/<slot>`.
    pub fn battery_status(&self, status: &BatteryStatus) -> Result<()> {
        if status.slot.is_empty() || status.slot.contains('/') {
            warn!("Publish: invalid battery slot '{}'", status.slot);
            return Err(Error::Invalid);
        }
        let entries = [
            ("levelPercentage", Value::Double(status.level_percentage)),
            ("levelAbsoluteError", Value::Double(status.level_absolute_error)),
            ("status", Value::String(status.state.code().to_owned())),
        ];
        let path = format!("/{}", status.slot);
        self.session
            .stream_aggregated(BATTERY_STATUS_INTERFACE, &path, &entries, now_ms())?;
        Ok(())
    }

    /// Set a string property, skipping absent or empty values.
    fn text_property(&self, interface: &str, path: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(text) if !text.is_empty() => {
                self.session
                    .set_property(interface, path, Value::String(text.to_owned()))?;
            }
            _ => debug!("Publish: {}{} unknown, skipped", interface, path),
        }
        Ok(())
    }

    fn os_info(&self) -> Result<()> {
        let os = self.platform.os_info();
        self.text_property(OS_INFO_INTERFACE, "/osName", Some(os.name.as_str()))?;
        self.text_property(OS_INFO_INTERFACE, "/osVersion", Some(os.version.as_str()))
    }

    fn system_info(&self) -> Result<()> {
        let info = self.platform.system_info();
        let iface = SYSTEM_INFO_INTERFACE;
        self.text_property(iface, "/serialNumber", info.serial_number.as_deref())?;
        self.text_property(iface, "/partNumber", info.part_number.as_deref())
    }

    fn base_image(&self) -> Result<()> {
        let image = self.platform.base_image();
        let iface = BASE_IMAGE_INTERFACE;
        self.text_property(iface, "/fingerprint", image.fingerprint.as_deref())?;
        self.text_property(iface, "/name", image.name.as_deref())?;
        self.text_property(iface, "/version", image.version.as_deref())?;
        self.text_property(iface, "/buildId", image.build_id.as_deref())
    }

    fn runtime_info(&self) -> Result<()> {
        let os = self.platform.os_info();
        let environment = format!("{} {}", os.name, os.version);
        let iface = RUNTIME_INFO_INTERFACE;
        self.text_property(iface, "/name", Some(RUNTIME_NAME))?;
        self.text_property(iface, "/url", Some(RUNTIME_URL))?;
        self.text_property(iface, "/version", Some(RUNTIME_VERSION))?;
        self.text_property(iface, "/environment", Some(environment.trim_end()))
    }

    fn hardware_info(&self, interface: &str) -> Result<()> {
        let cpu = self.platform.cpu_info();
        let props = [
            ("/cpu/architecture", Some(Value::String(cpu.architecture))),
            ("/cpu/model", cpu.model.map(Value::String)),
            ("/cpu/modelName", cpu.model_name.map(Value::String)),
            ("/cpu/vendor", cpu.vendor.map(Value::String)),
            ("/mem/totalBytes", cpu.total_memory_bytes.map(Value::LongInteger)),
        ];
        for (path, value) in props {
            if let Some(value) = value {
                self.session.set_property(interface, path, value)?;
            }
        }
        Ok(())
    }

    fn system_status(&self, interface: &str) -> Result<()> {
        let status = self.platform.system_status();
        let entries = [
            ("availMemoryBytes", Value::LongInteger(status.avail_memory_bytes)),
            ("bootId", Value::String(self.boot_id.clone())),
            ("taskCount", Value::Integer(status.task_count)),
            ("uptimeMillis", Value::LongInteger(status.uptime_millis)),
        ];
        self.session
            .stream_aggregated(interface, SYSTEM_STATUS_PATH, &entries, now_ms())?;
        Ok(())
    }

    fn storage_usage(&self, interface: &str) -> Result<()> {
        for usage in self.platform.storage_usage() {
            let Some(free) = usage.free_bytes else {
                debug!("Publish: free space of '{}' unknown, skipped", usage.label);
                continue;
            };
            let entries = [
                ("totalBytes", Value::LongInteger(usage.total_bytes)),
                ("freeBytes", Value::LongInteger(free)),
            ];
            let path = format!("/{}", usage.label);
            self.session
                .stream_aggregated(interface, &path, &entries, now_ms())?;
        }
        Ok(())
    }
}

impl TelemetryPublisher for SessionPublisher {
    fn publish(&self, kind: TelemetryKind) -> Result<()> {
        let interface = kind.interface_name().ok_or(Error::Invalid)?;
        debug!("Publish: {:?} on {}", kind, interface);
        match kind {
            TelemetryKind::Invalid => Err(Error::Invalid),
            TelemetryKind::HardwareInfo => self.hardware_info(interface),
            TelemetryKind::SystemStatus => self.system_status(interface),
            TelemetryKind::StorageUsage => self.storage_usage(interface),
            TelemetryKind::WifiScan => self.platform.start_wifi_scan(),
        }
    }
}

/// Wall-clock timestamp, if the clock has been set.
fn now_ms() -> Option<i64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
}
