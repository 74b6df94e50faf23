//! Logging transport session.
//!
//! Stands in for a cloud transport: every publish is logged as one JSON
//! line and the connection is confirmed on the first poll after
//! `connect()`.  Inbound events can be queued with [`LogSession::inject`]
//! and are delivered on the next poll.

use core::time::Duration;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::app::events::{
    ConnectionEvent, DataEvent, DisconnectionEvent, IndividualEvent, ObjectEvent,
    PropertySetEvent, Value,
};
use crate::app::ports::{Session, SessionCallbacks};
use crate::error::TransportError;

/// Inbound events a [`LogSession`] can replay.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Individual(IndividualEvent),
    Object(ObjectEvent),
    PropertySet(PropertySetEvent),
    PropertyUnset(DataEvent),
    Disconnect,
}

#[derive(Default)]
pub struct LogSession {
    connecting: AtomicBool,
    connected: AtomicBool,
    inbound: Mutex<VecDeque<Inbound>>,
}

impl LogSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queue an inbound event for the next poll.
    pub fn inject(&self, event: Inbound) {
        if let Ok(mut q) = self.inbound.lock() {
            q.push_back(event);
        }
    }

    fn emit(&self, kind: &str, interface: &str, path: &str, payload: &impl serde::Serialize) {
        match serde_json::to_string(payload) {
            Ok(json) => info!("Session: {} {}{} {}", kind, interface, path, json),
            Err(e) => warn!("Session: {} {}{} not serialisable: {}", kind, interface, path, e),
        }
    }
}

impl Session for LogSession {
    fn connect(&self) -> Result<(), TransportError> {
        info!("Session: connecting");
        self.connecting.store(true, Ordering::Release);
        Ok(())
    }

    fn disconnect(&self, _timeout: Duration) -> Result<(), TransportError> {
        self.connecting.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Release);
        info!("Session: disconnected");
        Ok(())
    }

    fn poll(&self, callbacks: &mut dyn SessionCallbacks) -> Result<(), TransportError> {
        if self.connecting.swap(false, Ordering::AcqRel) {
            self.connected.store(true, Ordering::Release);
            callbacks.on_connected(&ConnectionEvent {
                session_present: false,
            });
        }

        let pending: Vec<Inbound> = match self.inbound.lock() {
            Ok(mut q) => q.drain(..).collect(),
            Err(_) => return Err(TransportError(-1)),
        };
        for event in pending {
            match event {
                Inbound::Individual(ev) => callbacks.on_datastream_individual(&ev),
                Inbound::Object(ev) => callbacks.on_datastream_object(&ev),
                Inbound::PropertySet(ev) => callbacks.on_property_set(&ev),
                Inbound::PropertyUnset(ev) => callbacks.on_property_unset(&ev),
                Inbound::Disconnect => {
                    self.connected.store(false, Ordering::Release);
                    callbacks.on_disconnected(&DisconnectionEvent);
                }
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
        self.emit("property", interface, path, &value);
        Ok(())
    }

    fn stream_aggregated(
        &self,
        interface: &str,
        path: &str,
        entries: &[(&str, Value)],
        _timestamp_ms: Option<i64>,
    ) -> Result<(), TransportError> {
        let object: BTreeMap<&str, &Value> = entries.iter().map(|(k, v)| (*k, v)).collect();
        self.emit("object", interface, path, &object);
        Ok(())
    }

    fn stream_individual(
        &self,
        interface: &str,
        path: &str,
        value: Value,
        _timestamp_ms: Option<i64>,
    ) -> Result<(), TransportError> {
        self.emit("individual", interface, path, &value);
        Ok(())
    }
}
