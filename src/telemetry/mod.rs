//! Telemetry scheduling and persistence engine.
//!
//! ```text
//!  PeriodicTimer ──try_send──▶ ┌──────────────┐ ──▶ worker ──▶ TelemetryPublisher
//!  (per entry)                 │ bounded queue│     (task)     (per-kind routine)
//!                              └──────────────┘
//!  config event ──▶ TelemetryEntry mutation ──▶ SettingsPort write ──▶ (re)arm timer
//! ```
//!
//! The scheduler owns every entry and its timer; the worker only ever sees
//! kinds coming off the queue.

pub mod config_event;
pub mod entry;
pub mod scheduler;
mod worker;

use serde::{Deserialize, Serialize};

pub use entry::TelemetryEntry;
pub use scheduler::TelemetryScheduler;

/// Cloud interface carrying telemetry reconfiguration requests.
pub const CONFIG_INTERFACE: &str = "io.edgehog.devicemanager.config.Telemetry";

// ---------------------------------------------------------------------------
// Telemetry kind
// ---------------------------------------------------------------------------

/// Publishable telemetry categories.
///
/// Discriminants are the persisted ordinals; `Invalid` never owns a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TelemetryKind {
    Invalid = 0,
    HardwareInfo = 1,
    WifiScan = 2,
    SystemStatus = 3,
    StorageUsage = 4,
}

impl TelemetryKind {
    /// Number of schedulable kinds — sizes the entry table and the queue.
    pub const COUNT: usize = 4;

    /// Every schedulable kind, in slot order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::HardwareInfo,
        Self::WifiScan,
        Self::SystemStatus,
        Self::StorageUsage,
    ];

    /// Slot in the entry table, or `None` for `Invalid`.
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Invalid => None,
            kind => Some(kind as usize - 1),
        }
    }

    /// Persisted ordinal.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Reverse of [`ordinal`](Self::ordinal) for schedulable kinds only.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(Self::HardwareInfo),
            2 => Some(Self::WifiScan),
            3 => Some(Self::SystemStatus),
            4 => Some(Self::StorageUsage),
            _ => None,
        }
    }

    pub fn interface_name(self) -> Option<&'static str> {
        match self {
            Self::Invalid => None,
            Self::HardwareInfo => Some("io.edgehog.devicemanager.HardwareInfo"),
            Self::WifiScan => Some("io.edgehog.devicemanager.WiFiScanResults"),
            Self::SystemStatus => Some("io.edgehog.devicemanager.SystemStatus"),
            Self::StorageUsage => Some("io.edgehog.devicemanager.StorageUsage"),
        }
    }

    /// NUL-terminated name given to this kind's periodic timer.
    pub fn timer_name(self) -> &'static str {
        match self {
            Self::Invalid => "tm-invalid\0",
            Self::HardwareInfo => "tm-hwinfo\0",
            Self::WifiScan => "tm-wifiscan\0",
            Self::SystemStatus => "tm-sysstatus\0",
            Self::StorageUsage => "tm-storage\0",
        }
    }

    pub fn from_interface_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.interface_name() == Some(name))
    }
}

// ---------------------------------------------------------------------------
// Baseline entry
// ---------------------------------------------------------------------------

/// One factory-default schedule: publish `kind` every `period_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub kind: TelemetryKind,
    pub period_seconds: i64,
}

impl TelemetryConfig {
    pub const fn new(kind: TelemetryKind, period_seconds: i64) -> Self {
        Self {
            kind,
            period_seconds,
        }
    }
}
