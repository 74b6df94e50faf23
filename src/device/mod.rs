//! The device — top-level state machine composing the transport session
//! and the telemetry scheduler.
//!
//! ```text
//!              ┌──────────────────── Device ────────────────────┐
//!  start ────▶ │ SessionFactory::open ─▶ Session::connect       │
//!  poll  ────▶ │ Session::poll(EventRouter) ─▶ built-in routes  │──▶ caller callbacks
//!              │   └─ Connected: initial burst, scheduler start │
//!  stop  ────▶ │ scheduler stop ─▶ Session::disconnect          │
//!              └────────────────────────────────────────────────┘
//! ```
//!
//! One caller drives `start` / `poll` / `stop` sequentially; the telemetry
//! worker is the only other execution context.

pub mod publish;
pub mod router;
pub mod state;

use core::time::Duration;
use std::sync::Arc;

use log::{error, info, warn};

use crate::app::ports::{
    BatteryStatus, PlatformPort, ServicePort, Session, SessionCallbacks, SessionFactory,
    SettingsPort, TimerFactory,
};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::telemetry::TelemetryScheduler;

pub use publish::SessionPublisher;
pub use router::Route;
pub use state::DeviceState;

/// Runtime collaborators injected into a [`Device`].
pub struct DevicePorts {
    pub sessions: Box<dyn SessionFactory>,
    pub settings: Box<dyn SettingsPort>,
    pub timers: Box<dyn TimerFactory>,
    pub platform: Arc<dyn PlatformPort>,
    /// Commands, LED indicator and OTA handlers.  Without one those
    /// requests are logged and dropped.
    pub services: Option<Box<dyn ServicePort>>,
    /// The caller's own callbacks; receive every event the device does not
    /// handle itself.
    pub callbacks: Option<Box<dyn SessionCallbacks + Send>>,
}

/// The on-device agent.
pub struct Device {
    state: DeviceState,
    /// Set after the first post-connect burst; never cleared.
    initial_publish_done: bool,
    disconnect_timeout: Duration,
    boot_id: String,
    sessions: Box<dyn SessionFactory>,
    session: Option<Arc<dyn Session>>,
    scheduler: TelemetryScheduler,
    platform: Arc<dyn PlatformPort>,
    services: Option<Box<dyn ServicePort>>,
    callbacks: Option<Box<dyn SessionCallbacks + Send>>,
}

impl Device {
    /// Validate `config` and build the device in the `Stopped` state.
    ///
    /// Loads persisted telemetry entries; arms nothing.
    pub fn new(config: DeviceConfig, ports: DevicePorts) -> Result<Self> {
        config.validate()?;

        let scheduler = TelemetryScheduler::new(
            &config.telemetry,
            ports.settings,
            ports.timers,
            config.worker,
        )?;
        let boot_id = uuid::Uuid::new_v4().to_string();
        info!("Device: created (boot id {})", boot_id);

        Ok(Self {
            state: DeviceState::Stopped,
            initial_publish_done: false,
            disconnect_timeout: Duration::from_millis(u64::from(config.disconnect_timeout_ms)),
            boot_id,
            sessions: ports.sessions,
            session: None,
            scheduler,
            platform: ports.platform,
            services: ports.services,
            callbacks: ports.callbacks,
        })
    }

    /// Open the session and issue a connection attempt.
    ///
    /// On transport failure the device stays `Stopped`.
    pub fn start(&mut self) -> Result<()> {
        if self.state != DeviceState::Stopped {
            return Err(Error::InvalidState("device already started"));
        }

        let session = self.sessions.open().map_err(|e| {
            error!("Device: session open failed: {}", e);
            Error::from(e)
        })?;
        session.connect().map_err(|e| {
            error!("Device: connect failed: {}", e);
            Error::from(e)
        })?;

        self.session = Some(session);
        self.state.transition(DeviceState::Started);
        Ok(())
    }

    /// Drive the session once; while connected, run the initial burst and
    /// make sure the scheduler is running.
    pub fn poll(&mut self) -> Result<()> {
        if self.state == DeviceState::Stopped {
            return Err(Error::InvalidState("device not started"));
        }
        let session = self
            .session
            .clone()
            .ok_or(Error::InvalidState("device has no session"))?;

        let mut router = router::EventRouter {
            state: &mut self.state,
            scheduler: &mut self.scheduler,
            services: self.services.as_deref_mut(),
            user: self.callbacks.as_deref_mut(),
        };
        session.poll(&mut router)?;

        if self.state != DeviceState::Connected
            || (self.initial_publish_done && self.scheduler.is_running())
        {
            return Ok(());
        }

        let publisher = Arc::new(self.publisher(session));

        if !self.initial_publish_done {
            publisher.initial_burst();
            self.initial_publish_done = true;
        }

        if !self.scheduler.is_running() {
            self.scheduler.start(publisher)?;
        }
        Ok(())
    }

    /// Publish a battery slot reading.  Only valid while connected.
    pub fn publish_battery_status(&self, status: &BatteryStatus) -> Result<()> {
        if self.state != DeviceState::Connected {
            return Err(Error::InvalidState("device not connected"));
        }
        let session = self
            .session
            .clone()
            .ok_or(Error::InvalidState("device has no session"))?;
        self.publisher(session).battery_status(status)
    }

    fn publisher(&self, session: Arc<dyn Session>) -> SessionPublisher {
        SessionPublisher::new(session, Arc::clone(&self.platform), self.boot_id.clone())
    }

    /// Stop telemetry, then disconnect.
    ///
    /// A `StopTimeout` from the scheduler is returned before the transport
    /// is touched; a disconnect failure is reported after the device has
    /// already moved to `Stopped`.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.scheduler.stop(timeout)?;
        self.state.transition(DeviceState::Stopped);

        if let Some(session) = self.session.take() {
            session.disconnect(timeout).map_err(|e| {
                error!("Device: disconnect failed: {}", e);
                Error::from(e)
            })?;
        }
        Ok(())
    }

    /// Stop (best effort) and release everything.
    pub fn destroy(mut self) {
        if let Err(e) = self.stop(self.disconnect_timeout) {
            warn!("Device: stop during destroy failed: {}", e);
        }
    }

    // ── Observability ─────────────────────────────────────────

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn initial_publish_done(&self) -> bool {
        self.initial_publish_done
    }

    pub fn boot_id(&self) -> &str {
        &self.boot_id
    }

    pub fn scheduler(&self) -> &TelemetryScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TelemetryScheduler {
        &mut self.scheduler
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.state == DeviceState::Stopped && self.session.is_none() {
            return;
        }
        if let Err(e) = self.stop(self.disconnect_timeout) {
            warn!("Device: stop on drop failed: {}", e);
        }
    }
}
