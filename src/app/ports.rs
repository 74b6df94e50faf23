//! Port traits — the hexagonal boundary between the agent core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Device / TelemetryScheduler (domain)
//! ```
//!
//! Driven adapters (transport session, settings store, timers, platform
//! facts, auxiliary services) implement these traits.  The
//! [`Device`](crate::device::Device) receives them as trait objects, so the
//! core never touches the SDK, flash or hardware timers directly.
//!
//! ## Contract notes
//!
//! - **Session** errors are opaque codes; the core wraps them, never interprets them.
//! - **SettingsPort** writes are best-effort from the core's point of view.
//! - **PeriodicTimer** expiry callbacks run in a restricted context and must not block.

use core::time::Duration;
use std::sync::Arc;

use super::events::{
    ConnectionEvent, DataEvent, DisconnectionEvent, IndividualEvent, ObjectEvent,
    PropertySetEvent, Value,
};
use crate::error::{Error, SettingsError, TransportError};
use crate::telemetry::TelemetryKind;

// ───────────────────────────────────────────────────────────────
// Session callbacks (transport → domain)
// ───────────────────────────────────────────────────────────────

/// The callback surface a transport session notifies during [`Session::poll`].
///
/// Every slot has a no-op default so callers only override what they care
/// about.  Any context the caller needs travels inside `self`.
pub trait SessionCallbacks {
    fn on_connected(&mut self, _event: &ConnectionEvent) {}

    fn on_disconnected(&mut self, _event: &DisconnectionEvent) {}

    fn on_datastream_individual(&mut self, _event: &IndividualEvent) {}

    fn on_datastream_object(&mut self, _event: &ObjectEvent) {}

    fn on_property_set(&mut self, _event: &PropertySetEvent) {}

    fn on_property_unset(&mut self, _event: &DataEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Transport session (domain ↔ cloud)
// ───────────────────────────────────────────────────────────────

/// A managed cloud session.
///
/// Shared between the main context (connect / poll / disconnect) and the
/// telemetry worker (publishing), hence `&self` everywhere and `Sync`.
pub trait Session: Send + Sync {
    /// Issue a connection attempt.  Completion is reported via
    /// [`SessionCallbacks::on_connected`] during a later poll.
    fn connect(&self) -> Result<(), TransportError>;

    /// Close the session, waiting at most `timeout`.
    fn disconnect(&self, timeout: Duration) -> Result<(), TransportError>;

    /// Drive the session once, delivering any pending inbound events.
    fn poll(&self, callbacks: &mut dyn SessionCallbacks) -> Result<(), TransportError>;

    /// Set a device-owned property.
    fn set_property(&self, interface: &str, path: &str, value: Value)
    -> Result<(), TransportError>;

    /// Publish an aggregated object on a datastream.
    fn stream_aggregated(
        &self,
        interface: &str,
        path: &str,
        entries: &[(&str, Value)],
        timestamp_ms: Option<i64>,
    ) -> Result<(), TransportError>;

    /// Publish a single value on an individual datastream.
    fn stream_individual(
        &self,
        interface: &str,
        path: &str,
        value: Value,
        timestamp_ms: Option<i64>,
    ) -> Result<(), TransportError>;
}

/// Opens transport sessions.  Called once per device start.
pub trait SessionFactory: Send {
    fn open(&mut self) -> Result<Arc<dyn Session>, TransportError>;
}

impl<F> SessionFactory for F
where
    F: FnMut() -> Result<Arc<dyn Session>, TransportError> + Send,
{
    fn open(&mut self) -> Result<Arc<dyn Session>, TransportError> {
        self()
    }
}

// ───────────────────────────────────────────────────────────────
// Settings port (domain ↔ persistent key/value store)
// ───────────────────────────────────────────────────────────────

/// Hierarchical key/value settings.
///
/// Keys are `/`-separated and relative to a `subtree`.  The adapter owns
/// the root namespace; the core only ever names its own subtree.
pub trait SettingsPort: Send {
    /// Invoke `visitor` once per stored leaf below `subtree`, with the key
    /// relative to the subtree (e.g. `"1/periods"`).
    fn load(
        &self,
        subtree: &str,
        visitor: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<(), SettingsError>;

    /// Store `value` under `subtree/key`, replacing any previous value.
    fn save(&mut self, subtree: &str, key: &str, value: &[u8]) -> Result<(), SettingsError>;

    /// Remove `subtree/key`.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, subtree: &str, key: &str) -> Result<(), SettingsError>;
}

// ───────────────────────────────────────────────────────────────
// Timer port (domain → periodic expiry)
// ───────────────────────────────────────────────────────────────

/// Callback invoked on every timer expiry.
pub type ExpiryFn = Box<dyn Fn() + Send + Sync>;

/// Creates periodic timers.
pub trait TimerFactory: Send + Sync {
    /// Create a disarmed timer that runs `on_expiry` each period once started.
    fn create(&self, name: &'static str, on_expiry: ExpiryFn)
    -> Result<Box<dyn PeriodicTimer>, Error>;
}

/// A periodic timer.  Dropping it disarms it.
pub trait PeriodicTimer: Send {
    /// Arm with `period` as both initial delay and interval.  Re-arming a
    /// running timer restarts it with the new period.
    fn start(&mut self, period: Duration) -> Result<(), Error>;

    /// Disarm.  Stopping an idle timer is not an error.
    fn stop(&mut self) -> Result<(), Error>;

    fn is_running(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Platform port (domain ← device facts)
// ───────────────────────────────────────────────────────────────

/// Static CPU / memory description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuInfo {
    pub architecture: String,
    pub model: Option<String>,
    pub model_name: Option<String>,
    pub vendor: Option<String>,
    pub total_memory_bytes: Option<i64>,
}

/// Point-in-time runtime status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemStatus {
    pub avail_memory_bytes: i64,
    pub task_count: i32,
    pub uptime_millis: i64,
}

/// Usage of one storage partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUsage {
    pub label: String,
    pub total_bytes: i64,
    /// `None` when the backend cannot report free space.
    pub free_bytes: Option<i64>,
}

/// Operating system name and version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

/// Manufacturer identity; unknown fields are not published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemInfo {
    pub serial_number: Option<String>,
    pub part_number: Option<String>,
}

/// Description of the running firmware image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseImage {
    pub name: Option<String>,
    pub version: Option<String>,
    pub build_id: Option<String>,
    pub fingerprint: Option<String>,
}

/// Charge state reported for a battery slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    Idle,
    Charging,
    Discharging,
    IdleOrCharging,
    Failure,
    Removed,
    Unknown,
}

impl BatteryState {
    /// Wire code carried in the `status` field.
    pub fn code(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Charging => "Charging",
            Self::Discharging => "Discharging",
            Self::IdleOrCharging => "EitherIdleOrCharging",
            Self::Failure => "Failure",
            Self::Removed => "Removed",
            Self::Unknown => "Unknown",
        }
    }
}

/// One battery slot reading, pushed by the application.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryStatus {
    pub slot: String,
    pub level_percentage: f64,
    pub level_absolute_error: f64,
    pub state: BatteryState,
}

/// Device facts consumed by the per-kind publish routines.
pub trait PlatformPort: Send + Sync {
    fn cpu_info(&self) -> CpuInfo;

    fn os_info(&self) -> OsInfo;

    fn system_info(&self) -> SystemInfo {
        SystemInfo::default()
    }

    fn base_image(&self) -> BaseImage {
        BaseImage::default()
    }

    fn system_status(&self) -> SystemStatus;

    fn storage_usage(&self) -> Vec<StorageUsage>;

    /// Kick off a Wi-Fi scan.  Results are published by the scan driver.
    fn start_wifi_scan(&self) -> Result<(), Error>;
}

// ───────────────────────────────────────────────────────────────
// Service port (domain → auxiliary subsystems)
// ───────────────────────────────────────────────────────────────

/// Remote commands understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Reboot,
}

impl DeviceCommand {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Reboot" => Some(Self::Reboot),
            _ => None,
        }
    }
}

/// Handlers for the built-in routes that live outside the telemetry core
/// (commands, LED indicator, OTA).  Unimplemented slots reject the request.
pub trait ServicePort: Send {
    fn command(&mut self, _command: DeviceCommand) -> Result<(), Error> {
        Err(Error::UnsupportedRequest)
    }

    fn led_behavior(&mut self, _behavior: &str) -> Result<(), Error> {
        Err(Error::UnsupportedRequest)
    }

    fn ota_request(&mut self, _request: &ObjectEvent) -> Result<(), Error> {
        Err(Error::UnsupportedRequest)
    }
}

// ───────────────────────────────────────────────────────────────
// Telemetry publisher (worker → per-kind routines)
// ───────────────────────────────────────────────────────────────

/// The single dispatch point the telemetry worker calls per dequeued kind.
///
/// Implementations must not block unboundedly and report failure through
/// the return value only.
pub trait TelemetryPublisher: Send + Sync {
    fn publish(&self, kind: TelemetryKind) -> Result<(), Error>;
}
