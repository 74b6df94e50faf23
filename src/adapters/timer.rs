//! Periodic timer adapters.
//!
//! - [`ThreadTimerFactory`] — one parked thread per armed timer (host).
//! - [`EspTimerFactory`] — `esp_timer` periodic timers dispatched from the
//!   ESP timer task (target).
//!
//! Both disarm synchronously: once `stop()` returns the expiry callback
//! will not run again.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use log::error;

use crate::app::ports::{ExpiryFn, PeriodicTimer, TimerFactory};
use crate::error::Error;

// ───────────────────────────────────────────────────────────────
// Thread-backed timers (host)
// ───────────────────────────────────────────────────────────────

/// Creates [`ThreadTimer`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadTimerFactory;

impl TimerFactory for ThreadTimerFactory {
    fn create(
        &self,
        name: &'static str,
        on_expiry: ExpiryFn,
    ) -> Result<Box<dyn PeriodicTimer>, Error> {
        Ok(Box::new(ThreadTimer {
            name: name.trim_end_matches('\0'),
            on_expiry: Arc::new(on_expiry),
            armed: None,
        }))
    }
}

struct Armed {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// A periodic timer running its callback on a dedicated thread.
pub struct ThreadTimer {
    name: &'static str,
    on_expiry: Arc<ExpiryFn>,
    armed: Option<Armed>,
}

impl PeriodicTimer for ThreadTimer {
    fn start(&mut self, period: Duration) -> Result<(), Error> {
        self.stop()?;
        if period.is_zero() {
            return Err(Error::StartFailed);
        }
        // Reject periods whose first deadline overflows `Instant`.
        let first = Instant::now().checked_add(period).ok_or_else(|| {
            error!("Timer: '{}' period {:?} out of range", self.name, period);
            Error::StartFailed
        })?;

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);
        let on_expiry = Arc::clone(&self.on_expiry);

        let handle = std::thread::Builder::new()
            .name(format!("timer-{}", self.name))
            .spawn(move || {
                let mut next = first;
                loop {
                    let now = Instant::now();
                    if now < next {
                        std::thread::park_timeout(next - now);
                    }
                    if thread_cancel.load(Ordering::Acquire) {
                        return;
                    }
                    if Instant::now() >= next {
                        (**on_expiry)();
                        let Some(after) = next.checked_add(period) else {
                            return;
                        };
                        next = after;
                    }
                }
            })
            .map_err(|e| {
                error!("Timer: '{}' thread spawn failed: {}", self.name, e);
                Error::StartFailed
            })?;

        self.armed = Some(Armed { cancel, handle });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        let Some(armed) = self.armed.take() else {
            return Ok(());
        };
        armed.cancel.store(true, Ordering::Release);
        armed.handle.thread().unpark();
        armed.handle.join().map_err(|_| Error::StopFailed)
    }

    fn is_running(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        if self.stop().is_err() {
            error!("Timer: '{}' thread panicked", self.name);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// esp_timer-backed timers (target)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{EspTimer, EspTimerFactory};

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use esp_idf_svc::sys::*;

    /// Creates [`EspTimer`]s.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct EspTimerFactory;

    unsafe extern "C" fn expiry_trampoline(arg: *mut core::ffi::c_void) {
        // SAFETY: `arg` is the `ExpiryFn` boxed in `EspTimer`, which outlives
        // the esp_timer handle (deleted in Drop before the box is freed).
        let on_expiry = unsafe { &*(arg as *const ExpiryFn) };
        on_expiry();
    }

    impl TimerFactory for EspTimerFactory {
        fn create(
            &self,
            name: &'static str,
            on_expiry: ExpiryFn,
        ) -> Result<Box<dyn PeriodicTimer>, Error> {
            let on_expiry = Box::new(on_expiry);
            let args = esp_timer_create_args_t {
                callback: Some(expiry_trampoline),
                arg: (&*on_expiry as *const ExpiryFn).cast_mut().cast(),
                dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                name: name.as_ptr().cast(),
                skip_unhandled_events: true,
            };

            let mut handle: esp_timer_handle_t = core::ptr::null_mut();
            // SAFETY: args and the callback context stay valid for the timer's lifetime.
            let ret = unsafe { esp_timer_create(&args, &mut handle) };
            if ret != ESP_OK as esp_err_t {
                error!("Timer: esp_timer_create failed (rc={})", ret);
                return Err(Error::StartFailed);
            }

            Ok(Box::new(EspTimer { handle, _on_expiry: on_expiry }))
        }
    }

    /// A periodic `esp_timer`.
    pub struct EspTimer {
        handle: esp_timer_handle_t,
        _on_expiry: Box<ExpiryFn>,
    }

    // SAFETY: the esp_timer API is thread-safe; the handle is only an id.
    unsafe impl Send for EspTimer {}

    impl PeriodicTimer for EspTimer {
        fn start(&mut self, period: Duration) -> Result<(), Error> {
            self.stop()?;
            let micros = u64::try_from(period.as_micros()).map_err(|_| Error::StartFailed)?;
            let ret = unsafe { esp_timer_start_periodic(self.handle, micros) };
            if ret != ESP_OK as esp_err_t {
                error!("Timer: esp_timer_start_periodic failed (rc={})", ret);
                return Err(Error::StartFailed);
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<(), Error> {
            let ret = unsafe { esp_timer_stop(self.handle) };
            // Stopping an idle timer reports INVALID_STATE.
            if ret != ESP_OK as esp_err_t && ret != ESP_ERR_INVALID_STATE as esp_err_t {
                return Err(Error::StopFailed);
            }
            Ok(())
        }

        fn is_running(&self) -> bool {
            unsafe { esp_timer_is_active(self.handle) }
        }
    }

    impl Drop for EspTimer {
        fn drop(&mut self) {
            unsafe {
                esp_timer_stop(self.handle);
                esp_timer_delete(self.handle);
            }
        }
    }
}
