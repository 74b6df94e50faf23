//! Inbound session events and the values they carry.
//!
//! The transport session decodes whatever arrives from the cloud into these
//! plain structs and hands them to a [`SessionCallbacks`](super::ports::SessionCallbacks)
//! implementation.  The device decorates that surface, so every struct here
//! is what both the built-in handlers and the caller's own callbacks see.

use serde::Serialize;

/// A single typed value as it travels over the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    LongInteger(i64),
    Double(f64),
    String(String),
}

impl Value {
    /// Integer payload widened to `i64`, if this is one of the integer shapes.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(i64::from(*v)),
            Self::LongInteger(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// The transport confirmed an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub session_present: bool,
}

/// The transport lost (or closed) the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectionEvent;

/// Addressing shared by every data event; also the whole payload of an unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEvent {
    pub interface: String,
    pub path: String,
}

impl DataEvent {
    pub fn new(interface: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            path: path.into(),
        }
    }
}

/// A single value published on an individual datastream.
#[derive(Debug, Clone, PartialEq)]
pub struct IndividualEvent {
    pub data: DataEvent,
    pub value: Value,
}

/// An aggregated object published on an object datastream.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEvent {
    pub data: DataEvent,
    pub entries: Vec<(String, Value)>,
}

impl ObjectEvent {
    /// Look up one field of the aggregate by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// A server-owned property was set.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySetEvent {
    pub data: DataEvent,
    pub value: Value,
}
