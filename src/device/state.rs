//! Device lifecycle states.
//!
//! ```text
//!  STOPPED ──[start]──▶ STARTED ──[connected]──▶ CONNECTED
//!     ▲                    ▲                         │
//!     │                    └─────[disconnected]──────┘
//!     └──────────────[stop]── any state
//! ```
//!
//! `Stopped` is sticky: a late disconnect notification never revives it.

use log::info;

/// Lifecycle state of a [`Device`](super::Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DeviceState {
    #[default]
    Stopped = 0,
    Started = 1,
    Connected = 2,
}

impl DeviceState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Started => "Started",
            Self::Connected => "Connected",
        }
    }

    /// Target state when the transport confirms a session.
    pub fn on_connected(self) -> Self {
        Self::Connected
    }

    /// Target state when the transport reports a disconnect.
    pub fn on_disconnected(self) -> Self {
        match self {
            Self::Connected => Self::Started,
            other => other,
        }
    }

    /// Move to `next`, logging real transitions.
    pub(crate) fn transition(&mut self, next: Self) {
        if *self != next {
            info!("Device: {} -> {}", self.name(), next.name());
            *self = next;
        }
    }
}
