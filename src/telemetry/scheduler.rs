//! Telemetry scheduler engine.
//!
//! Owns the entry table, the notification queue and the worker task.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Trigger Sources                          │
//! │                                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐   │
//! │  │ HW info   │  │ Wi-Fi scan│  │ Sys status│  │ Storage  │   │
//! │  │ timer     │  │ timer     │  │ timer     │  │ timer    │   │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └─────┬────┘   │
//! │        │  try_send    │              │              │        │
//! │        ▼              ▼              ▼              ▼        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │     Channel<TelemetryKind, COUNT>  (full → dropped)    │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          │  try_receive / poll interval      │
//! │                          ▼                                   │
//! │               worker → TelemetryPublisher                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation (schedule, unschedule, start, stop) happens on the
//! caller's context.  The worker reads kinds off the queue and nothing else.
//!
//! `stop` disarms every timer before it waits for the worker, so once it
//! returns no further notification can be queued.  `start` re-arms every
//! enabled entry.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{error, info, warn};

use super::entry::{self, EntryTable, TelemetryEntry};
use super::worker;
use super::{TelemetryConfig, TelemetryKind};
use crate::app::ports::{SettingsPort, TelemetryPublisher, TimerFactory};
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::task;

/// One pending notification per kind is the structural maximum.
const QUEUE_DEPTH: usize = TelemetryKind::COUNT;

/// Worker task name (NUL-terminated for the ESP-IDF pthread config).
const WORKER_NAME: &str = "telemetry\0";

/// Granularity of the stop deadline wait.
const JOIN_POLL: Duration = Duration::from_millis(5);

// ═══════════════════════════════════════════════════════════════
//  State shared with timers and the worker
// ═══════════════════════════════════════════════════════════════

pub(crate) struct Shared {
    running: AtomicBool,
    /// Bumped on every start; a worker exits once its epoch is stale.
    epoch: AtomicU32,
    pub(crate) queue: Channel<CriticalSectionRawMutex, TelemetryKind, QUEUE_DEPTH>,
    dropped: AtomicU32,
}

impl Shared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            epoch: AtomicU32::new(0),
            queue: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Whether a worker spawned at `epoch` should keep going.
    pub(crate) fn is_current(&self, epoch: u32) -> bool {
        self.running.load(Ordering::Acquire) && self.epoch.load(Ordering::Acquire) == epoch
    }

    /// Timer-expiry path: never blocks, never logs.
    fn notify(&self, kind: TelemetryKind) {
        if self.queue.try_send(kind).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn drain(&self) {
        while self.queue.try_receive().is_ok() {}
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// The telemetry scheduler.
///
/// Construction loads persisted entries and fills the gaps from the
/// baseline; it never arms a timer or spawns the worker.
pub struct TelemetryScheduler {
    /// Factory-default schedule, copied at construction.
    baseline: Vec<TelemetryConfig>,
    entries: EntryTable,
    settings: Box<dyn SettingsPort>,
    timers: Box<dyn TimerFactory>,
    worker_cfg: WorkerConfig,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TelemetryScheduler {
    pub fn new(
        baseline: &[TelemetryConfig],
        settings: Box<dyn SettingsPort>,
        timers: Box<dyn TimerFactory>,
        worker_cfg: WorkerConfig,
    ) -> Result<Self> {
        if baseline.iter().any(|c| c.kind == TelemetryKind::Invalid) {
            return Err(Error::InvalidConfiguration("baseline contains an invalid kind"));
        }

        let mut entries = entry::load_table(settings.as_ref());
        for cfg in baseline {
            if !entries.contains(cfg.kind) {
                entries.insert(TelemetryEntry::new(cfg.kind, cfg.period_seconds, true));
            }
        }

        info!(
            "Telemetry: scheduler ready ({} baseline, {} entries)",
            baseline.len(),
            TelemetryKind::ALL.iter().filter(|k| entries.contains(**k)).count()
        );

        Ok(Self {
            baseline: baseline.to_vec(),
            entries,
            settings,
            timers,
            worker_cfg,
            shared: Arc::new(Shared::new()),
            worker: None,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Spawn the worker bound to `publisher`, then arm every enabled entry.
    pub fn start(&mut self, publisher: Arc<dyn TelemetryPublisher>) -> Result<()> {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Telemetry: start requested while already running");
            return Err(Error::AlreadyRunning);
        }

        self.shared.drain();
        let epoch = self.shared.epoch.fetch_add(1, Ordering::AcqRel).wrapping_add(1);

        let shared = Arc::clone(&self.shared);
        let poll = Duration::from_millis(u64::from(self.worker_cfg.queue_poll_interval_ms));
        let spawned = task::spawn_task(
            WORKER_NAME,
            self.worker_cfg.priority,
            self.worker_cfg.stack_size_bytes,
            move || worker::run(&shared, epoch, publisher.as_ref(), poll),
        );

        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                error!("Telemetry: worker spawn failed: {}", e);
                return Err(Error::StartFailed);
            }
        }

        for kind in TelemetryKind::ALL {
            if self.entries.get(kind).is_some_and(TelemetryEntry::enabled) {
                if let Err(e) = self.schedule(kind) {
                    warn!("Telemetry: could not schedule {:?}: {}", kind, e);
                }
            }
        }

        info!("Telemetry: started");
        Ok(())
    }

    /// Disarm every timer, clear the running flag and wait up to `timeout`
    /// for the worker to exit.
    ///
    /// On `StopTimeout` the worker handle is kept so a later `stop` can
    /// wait again.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.disarm_all();
        self.shared.running.store(false, Ordering::Release);

        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        let deadline = Instant::now() + timeout;
        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!("Telemetry: worker panicked");
                }
                info!("Telemetry: stopped");
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Telemetry: worker did not exit within {:?}", timeout);
                self.worker = Some(handle);
                return Err(Error::StopTimeout);
            }
            std::thread::sleep(JOIN_POLL.min(deadline - now));
        }
    }

    // ── Scheduling ────────────────────────────────────────────

    /// Persist the entry for `kind` and, if running, (re)arm its timer.
    ///
    /// A non-positive period is persisted, disarms any running timer and
    /// fails with `InvalidPeriod`.  If a timer cannot be armed the entry is
    /// dropped from the table and `StartFailed` is returned.
    pub fn schedule(&mut self, kind: TelemetryKind) -> Result<()> {
        let entry = self.entries.get_mut(kind).ok_or(Error::Invalid)?;

        if let Err(e) = entry::store_entry(self.settings.as_mut(), entry) {
            warn!("Telemetry: failed to persist {:?}: {}", kind, e);
        }

        let period = entry.period_seconds;
        if period <= 0 {
            if let Err(e) = entry.disarm() {
                warn!("Telemetry: failed to disarm {:?}: {}", kind, e);
            }
            warn!("Telemetry: {:?} has non-positive period {}s, not armed", kind, period);
            return Err(Error::InvalidPeriod(period));
        }

        if !self.shared.running.load(Ordering::Acquire) {
            return Ok(());
        }

        let interval = Duration::from_secs(period as u64);
        let armed = match entry.timer.as_mut() {
            Some(timer) => timer.stop().and_then(|()| timer.start(interval)),
            None => {
                let shared = Arc::clone(&self.shared);
                self.timers
                    .create(kind.timer_name(), Box::new(move || shared.notify(kind)))
                    .and_then(|mut timer| {
                        timer.start(interval)?;
                        entry.timer = Some(timer);
                        Ok(())
                    })
            }
        };

        if let Err(e) = armed {
            error!("Telemetry: failed to arm {:?}: {}", kind, e);
            self.entries.remove(kind);
            return Err(Error::StartFailed);
        }

        info!("Telemetry: {:?} armed every {}s", kind, period);
        Ok(())
    }

    /// Persist the entry for `kind` and disarm its timer if armed.
    pub fn unschedule(&mut self, kind: TelemetryKind) -> Result<()> {
        let entry = self.entries.get_mut(kind).ok_or(Error::Invalid)?;

        if let Err(e) = entry::store_entry(self.settings.as_mut(), entry) {
            warn!("Telemetry: failed to persist {:?}: {}", kind, e);
        }

        if entry.is_armed() {
            info!("Telemetry: {:?} disarmed", kind);
        }
        entry.disarm()
    }

    fn disarm_all(&mut self) {
        for entry in self.entries.iter_mut() {
            if let Err(e) = entry.disarm() {
                warn!("Telemetry: failed to disarm {:?}: {}", entry.kind(), e);
            }
        }
    }

    // ── Entry access ──────────────────────────────────────────

    pub fn entry(&self, kind: TelemetryKind) -> Option<&TelemetryEntry> {
        self.entries.get(kind)
    }

    pub(crate) fn entry_mut(&mut self, kind: TelemetryKind) -> Option<&mut TelemetryEntry> {
        self.entries.get_mut(kind)
    }

    pub(crate) fn entry_or_insert(&mut self, kind: TelemetryKind) -> Result<&mut TelemetryEntry> {
        self.entries.get_or_insert(kind).ok_or(Error::Invalid)
    }

    pub fn baseline(&self) -> &[TelemetryConfig] {
        &self.baseline
    }

    /// Baseline period for `kind`, if the baseline lists it.
    pub fn baseline_period(&self, kind: TelemetryKind) -> Option<i64> {
        self.baseline
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.period_seconds)
    }

    // ── Observability ─────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_armed(&self, kind: TelemetryKind) -> bool {
        self.entries.get(kind).is_some_and(TelemetryEntry::is_armed)
    }

    /// Notifications lost to a full queue since construction.
    pub fn dropped_notifications(&self) -> u32 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for TelemetryScheduler {
    fn drop(&mut self) {
        self.disarm_all();
        self.shared.running.store(false, Ordering::Release);
    }
}
