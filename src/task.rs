//! Background task spawning.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task with an explicit priority, stack size and name.  On
//! non-ESP targets, falls back to a plain named thread.
//!
//! # ESP-IDF Threading Model
//!
//! ESP-IDF implements `std::thread` via pthreads, which are thin wrappers
//! around FreeRTOS tasks.  `esp_pthread_set_cfg()` sets thread-local
//! configuration that applies to the *next* `pthread_create()` call from
//! the calling thread, so the config→spawn pair must not be interleaved
//! with other thread creation on the same thread.

use std::thread::JoinHandle;

use log::{error, info};

use crate::error::{Error, Result};

/// Spawn a background task with explicit priority and stack.
///
/// `name` must be NUL-terminated (e.g. `"telemetry\0"`).  Spawn failure
/// is reported as [`Error::StartFailed`].
#[cfg(target_os = "espidf")]
pub fn spawn_task(
    name: &'static str,
    priority: u8,
    stack_bytes: usize,
    f: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>> {
    // SAFETY: the config is applied to the next pthread_create() from this
    // thread, which is the spawn just below.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.prio = i32::from(priority);
        cfg.stack_size = stack_bytes as _;
        cfg.thread_name = name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        error!("Task: esp_pthread_set_cfg failed (rc={})", ret);
        return Err(Error::StartFailed);
    }

    let display_name = name.trim_end_matches('\0');
    info!(
        "Task: spawning '{}' (pri={}, stack={}B)",
        display_name, priority, stack_bytes
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .spawn(f)
        .map_err(|e| {
            error!("Task: '{}' creation failed: {}", display_name, e);
            Error::StartFailed
        })
}

/// Host threads get at least this much stack; target-sized stacks are too
/// small for unoptimised host builds.
#[cfg(not(target_os = "espidf"))]
const SIM_MIN_STACK_BYTES: usize = 64 * 1024;

/// Simulation fallback — ignores priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_task(
    name: &'static str,
    _priority: u8,
    stack_bytes: usize,
    f: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>> {
    let display_name = name.trim_end_matches('\0');
    info!("Task: spawning '{}' (sim, stack={}B)", display_name, stack_bytes);

    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(stack_bytes.max(SIM_MIN_STACK_BYTES))
        .spawn(f)
        .map_err(|e| {
            error!("Task: '{}' creation failed: {}", display_name, e);
            Error::StartFailed
        })
}
