//! Device agent configuration.
//!
//! Plain data only: the telemetry baseline, worker task tuning and the
//! transport timeout.  Runtime collaborators travel separately in
//! [`DevicePorts`](crate::device::DevicePorts).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::telemetry::{TelemetryConfig, TelemetryKind};

/// Smallest worker stack accepted by [`DeviceConfig::validate`].
pub const MIN_WORKER_STACK_BYTES: usize = 2048;

/// Telemetry worker task tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Bounded wait between queue checks (milliseconds).
    pub queue_poll_interval_ms: u32,
    /// Worker task stack size in bytes.
    pub stack_size_bytes: usize,
    /// FreeRTOS priority (ignored on the host).
    pub priority: u8,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_poll_interval_ms: 100,
            stack_size_bytes: 4096,
            priority: 5,
        }
    }
}

/// Top-level configuration handed to [`Device::new`](crate::device::Device::new).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceConfig {
    /// Factory-default telemetry schedule.
    pub telemetry: Vec<TelemetryConfig>,
    pub worker: WorkerConfig,
    /// Deadline for transport disconnect and worker shutdown on drop (milliseconds).
    pub disconnect_timeout_ms: u32,
}

impl DeviceConfig {
    /// Reject configurations the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (i, cfg) in self.telemetry.iter().enumerate() {
            if cfg.kind == TelemetryKind::Invalid {
                return Err(Error::InvalidConfiguration("telemetry kind must not be Invalid"));
            }
            if self.telemetry[..i].iter().any(|c| c.kind == cfg.kind) {
                return Err(Error::InvalidConfiguration("duplicate telemetry kind in baseline"));
            }
        }
        if self.worker.queue_poll_interval_ms == 0 {
            return Err(Error::InvalidConfiguration("queue_poll_interval_ms must be > 0"));
        }
        if self.worker.stack_size_bytes < MIN_WORKER_STACK_BYTES {
            return Err(Error::InvalidConfiguration("worker stack must be >= 2048 bytes"));
        }
        Ok(())
    }
}
