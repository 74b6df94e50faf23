//! Mock adapters for integration tests.
//!
//! Records every session publish, fires timers on demand and captures
//! whatever reaches the caller's callbacks, so tests can assert on the
//! full history without a cloud transport or real timers.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use edgehog_device::app::events::{
    ConnectionEvent, DataEvent, DisconnectionEvent, IndividualEvent, ObjectEvent,
    PropertySetEvent, Value,
};
use edgehog_device::app::ports::{
    DeviceCommand, ExpiryFn, PeriodicTimer, ServicePort, Session, SessionCallbacks,
    TelemetryPublisher, TimerFactory,
};
use edgehog_device::error::{Error, TransportError};
use edgehog_device::telemetry::TelemetryKind;

// ── Polling helper ────────────────────────────────────────────

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ── ManualTimers ──────────────────────────────────────────────

struct TimerSlot {
    name: &'static str,
    running: Arc<AtomicBool>,
    period: Arc<Mutex<Duration>>,
    on_expiry: Arc<ExpiryFn>,
}

/// Timer factory whose timers only expire when the test calls [`fire_all`].
#[derive(Clone, Default)]
pub struct ManualTimers {
    slots: Arc<Mutex<Vec<TimerSlot>>>,
    fail_start: Arc<AtomicBool>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire every armed timer once.
    pub fn fire_all(&self) {
        let callbacks: Vec<Arc<ExpiryFn>> = self
            .slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.running.load(Ordering::SeqCst))
            .map(|s| Arc::clone(&s.on_expiry))
            .collect();
        for cb in callbacks {
            (**cb)();
        }
    }

    pub fn armed_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.running.load(Ordering::SeqCst))
            .count()
    }

    /// Periods of every armed timer.
    pub fn armed_periods(&self) -> Vec<Duration> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.running.load(Ordering::SeqCst))
            .map(|s| *s.period.lock().unwrap())
            .collect()
    }

    /// Names of every armed timer, without the trailing NUL.
    pub fn armed_names(&self) -> Vec<&'static str> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.running.load(Ordering::SeqCst))
            .map(|s| s.name.trim_end_matches('\0'))
            .collect()
    }

    pub fn fail_next_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }
}

impl TimerFactory for ManualTimers {
    fn create(
        &self,
        name: &'static str,
        on_expiry: ExpiryFn,
    ) -> Result<Box<dyn PeriodicTimer>, Error> {
        let running = Arc::new(AtomicBool::new(false));
        let period = Arc::new(Mutex::new(Duration::ZERO));
        self.slots.lock().unwrap().push(TimerSlot {
            name,
            running: Arc::clone(&running),
            period: Arc::clone(&period),
            on_expiry: Arc::new(on_expiry),
        });
        Ok(Box::new(ManualTimer {
            running,
            period,
            fail_start: Arc::clone(&self.fail_start),
        }))
    }
}

struct ManualTimer {
    running: Arc<AtomicBool>,
    period: Arc<Mutex<Duration>>,
    fail_start: Arc<AtomicBool>,
}

impl PeriodicTimer for ManualTimer {
    fn start(&mut self, period: Duration) -> Result<(), Error> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::StartFailed);
        }
        *self.period.lock().unwrap() = period;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ManualTimer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

// ── RecordingPublisher ────────────────────────────────────────

/// Telemetry dispatch point that only records which kinds were published.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<TelemetryKind>>,
    pub fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn kinds(&self) -> Vec<TelemetryKind> {
        self.published.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

impl TelemetryPublisher for RecordingPublisher {
    fn publish(&self, kind: TelemetryKind) -> Result<(), Error> {
        self.published.lock().unwrap().push(kind);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Transport(TransportError(-5)));
        }
        Ok(())
    }
}

// ── Gate ──────────────────────────────────────────────────────

/// Blocks callers until opened; stays open afterwards.
#[derive(Default)]
pub struct Gate {
    closed: Mutex<bool>,
    changed: Condvar,
    /// Callers that had to wait.
    pub waiting: AtomicUsize,
}

impl Gate {
    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    pub fn open(&self) {
        *self.closed.lock().unwrap() = false;
        self.changed.notify_all();
    }

    pub fn pass(&self) {
        let mut closed = self.closed.lock().unwrap();
        if *closed {
            self.waiting.fetch_add(1, Ordering::SeqCst);
        }
        while *closed {
            closed = self.changed.wait(closed).unwrap();
        }
    }
}

/// Publisher that holds the worker inside `publish` while its gate is closed.
#[derive(Default)]
pub struct GatedPublisher {
    pub gate: Gate,
    pub published: AtomicUsize,
}

impl GatedPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }
}

impl TelemetryPublisher for GatedPublisher {
    fn publish(&self, _kind: TelemetryKind) -> Result<(), Error> {
        self.gate.pass();
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── RecordingSession ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    Property {
        interface: String,
        path: String,
        value: Value,
    },
    Object {
        interface: String,
        path: String,
        fields: Vec<String>,
    },
    Individual {
        interface: String,
        path: String,
        value: Value,
    },
}

impl Published {
    pub fn interface(&self) -> &str {
        match self {
            Self::Property { interface, .. }
            | Self::Object { interface, .. }
            | Self::Individual { interface, .. } => interface,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Connected,
    Disconnected,
    Individual(IndividualEvent),
    Object(ObjectEvent),
    Set(PropertySetEvent),
    Unset(DataEvent),
}

/// Session that records publishes and replays queued inbound events on poll.
#[derive(Default)]
pub struct RecordingSession {
    pub published: Mutex<Vec<Published>>,
    inbound: Mutex<VecDeque<Inbound>>,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_disconnect: AtomicBool,
    /// Held by every publish call while closed.
    pub gate: Gate,
}

impl RecordingSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, event: Inbound) {
        self.inbound.lock().unwrap().push_back(event);
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }

    /// Publishes on `interface` so far.
    pub fn count_on(&self, interface: &str) -> usize {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.interface() == interface)
            .count()
    }
}

impl Session for RecordingSession {
    fn connect(&self) -> Result<(), TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError(-3));
        }
        Ok(())
    }

    fn disconnect(&self, _timeout: Duration) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(TransportError(-4));
        }
        Ok(())
    }

    fn poll(&self, callbacks: &mut dyn SessionCallbacks) -> Result<(), TransportError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let pending: Vec<Inbound> = self.inbound.lock().unwrap().drain(..).collect();
        for event in pending {
            match event {
                Inbound::Connected => callbacks.on_connected(&ConnectionEvent {
                    session_present: false,
                }),
                Inbound::Disconnected => callbacks.on_disconnected(&DisconnectionEvent),
                Inbound::Individual(ev) => callbacks.on_datastream_individual(&ev),
                Inbound::Object(ev) => callbacks.on_datastream_object(&ev),
                Inbound::Set(ev) => callbacks.on_property_set(&ev),
                Inbound::Unset(ev) => callbacks.on_property_unset(&ev),
            }
        }
        Ok(())
    }

    fn set_property(
        &self,
        interface: &str,
        path: &str,
        value: Value,
    ) -> Result<(), TransportError> {
        self.gate.pass();
        self.published.lock().unwrap().push(Published::Property {
            interface: interface.into(),
            path: path.into(),
            value,
        });
        Ok(())
    }

    fn stream_aggregated(
        &self,
        interface: &str,
        path: &str,
        entries: &[(&str, Value)],
        _timestamp_ms: Option<i64>,
    ) -> Result<(), TransportError> {
        self.gate.pass();
        self.published.lock().unwrap().push(Published::Object {
            interface: interface.into(),
            path: path.into(),
            fields: entries.iter().map(|(k, _)| (*k).to_owned()).collect(),
        });
        Ok(())
    }

    fn stream_individual(
        &self,
        interface: &str,
        path: &str,
        value: Value,
        _timestamp_ms: Option<i64>,
    ) -> Result<(), TransportError> {
        self.gate.pass();
        self.published.lock().unwrap().push(Published::Individual {
            interface: interface.into(),
            path: path.into(),
            value,
        });
        Ok(())
    }
}

// ── Caller callbacks and services ─────────────────────────────

/// What reached the caller's own callbacks, one line per event.
pub type Seen = Arc<Mutex<Vec<String>>>;

pub struct RecordingCallbacks(pub Seen);

impl SessionCallbacks for RecordingCallbacks {
    fn on_connected(&mut self, _event: &ConnectionEvent) {
        self.0.lock().unwrap().push("connected".into());
    }

    fn on_disconnected(&mut self, _event: &DisconnectionEvent) {
        self.0.lock().unwrap().push("disconnected".into());
    }

    fn on_datastream_individual(&mut self, event: &IndividualEvent) {
        self.0
            .lock()
            .unwrap()
            .push(format!("individual {}{}", event.data.interface, event.data.path));
    }

    fn on_datastream_object(&mut self, event: &ObjectEvent) {
        self.0
            .lock()
            .unwrap()
            .push(format!("object {}{}", event.data.interface, event.data.path));
    }

    fn on_property_set(&mut self, event: &PropertySetEvent) {
        self.0
            .lock()
            .unwrap()
            .push(format!("set {}{}", event.data.interface, event.data.path));
    }

    fn on_property_unset(&mut self, event: &DataEvent) {
        self.0
            .lock()
            .unwrap()
            .push(format!("unset {}{}", event.interface, event.path));
    }
}

/// Service handlers recording every request they accept.
pub struct RecordingServices(pub Seen);

impl ServicePort for RecordingServices {
    fn command(&mut self, command: DeviceCommand) -> Result<(), Error> {
        self.0.lock().unwrap().push(format!("command {:?}", command));
        Ok(())
    }

    fn led_behavior(&mut self, behavior: &str) -> Result<(), Error> {
        self.0.lock().unwrap().push(format!("led {behavior}"));
        Ok(())
    }

    fn ota_request(&mut self, request: &ObjectEvent) -> Result<(), Error> {
        let op = request.get("operation").and_then(Value::as_str).unwrap_or("?");
        self.0.lock().unwrap().push(format!("ota {op}"));
        Ok(())
    }
}
