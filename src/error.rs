//! Unified error types for the Edgehog device agent.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! result handling of `start` / `poll` / `stop` and the event handlers
//! uniform.  All variants are `Copy` so they can cross the worker task
//! boundary and be logged without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the agent funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Construction parameters are missing or invalid.
    InvalidConfiguration(&'static str),
    /// The transport session reported a failure (opaque, not interpreted).
    Transport(TransportError),
    /// The persistent settings store failed.
    Settings(SettingsError),
    /// The telemetry scheduler is already running.
    AlreadyRunning,
    /// A worker task could not be spawned or a timer could not be armed.
    StartFailed,
    /// A timer could not be stopped.
    StopFailed,
    /// The worker task did not exit before the stop deadline.
    StopTimeout,
    /// The telemetry kind is invalid or out of range.
    Invalid,
    /// The telemetry period is not positive; the entry cannot be armed.
    InvalidPeriod(i64),
    /// An inbound request could not be mapped to a supported operation.
    UnsupportedRequest,
    /// The device is not in a state that allows the operation.
    InvalidState(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Settings(e) => write!(f, "settings: {e}"),
            Self::AlreadyRunning => write!(f, "telemetry already running"),
            Self::StartFailed => write!(f, "telemetry start failed"),
            Self::StopFailed => write!(f, "telemetry stop failed"),
            Self::StopTimeout => write!(f, "telemetry stop timed out"),
            Self::Invalid => write!(f, "invalid telemetry kind"),
            Self::InvalidPeriod(p) => write!(f, "invalid telemetry period {p}s"),
            Self::UnsupportedRequest => write!(f, "unsupported request"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Opaque failure code surfaced by the transport session.
///
/// The agent wraps these without interpreting them; the code is whatever
/// the underlying SDK returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportError(pub i32);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session error code {}", self.0)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Settings errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Requested key does not exist.
    NotFound,
    /// A stored value failed to decode.
    Corrupted,
    /// Underlying storage is full.
    Full,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Corrupted => write!(f, "value corrupted"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<SettingsError> for Error {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
