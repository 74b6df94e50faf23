//! Edgehog device agent library.
//!
//! Exposes the telemetry engine, the device state machine and the port
//! adapters for the firmware binary and for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod device;
pub mod error;
pub mod task;
pub mod telemetry;

pub use config::{DeviceConfig, WorkerConfig};
pub use device::{Device, DevicePorts, DeviceState};
pub use error::{Error, Result};
pub use telemetry::{TelemetryConfig, TelemetryKind};
