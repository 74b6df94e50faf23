//! Telemetry entries, the per-kind entry table and their persisted form.
//!
//! Each kind is stored as two leaves below the `telemetry` subtree:
//!
//! ```text
//!  telemetry/<ordinal>/periods   postcard i64
//!  telemetry/<ordinal>/enable    postcard bool
//! ```

use core::fmt;

use log::{debug, warn};

use super::TelemetryKind;
use crate::app::ports::{PeriodicTimer, SettingsPort};
use crate::error::{Error, SettingsError};

/// Settings subtree holding every telemetry leaf.
pub const SETTINGS_SUBTREE: &str = "telemetry";

const PERIOD_LEAF: &str = "periods";
const ENABLE_LEAF: &str = "enable";

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Runtime schedule for one kind.
///
/// `period_seconds <= 0` means the entry cannot be armed.  The timer is
/// present only while the entry is armed; dropping the entry disarms it.
pub struct TelemetryEntry {
    kind: TelemetryKind,
    pub(crate) period_seconds: i64,
    pub(crate) enabled: bool,
    pub(crate) timer: Option<Box<dyn PeriodicTimer>>,
}

impl TelemetryEntry {
    pub fn new(kind: TelemetryKind, period_seconds: i64, enabled: bool) -> Self {
        Self {
            kind,
            period_seconds,
            enabled,
            timer: None,
        }
    }

    pub fn kind(&self) -> TelemetryKind {
        self.kind
    }

    pub fn period_seconds(&self) -> i64 {
        self.period_seconds
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the entry's timer is running.
    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.is_running())
    }

    /// Disarm and release the timer, if any.
    pub(crate) fn disarm(&mut self) -> Result<(), Error> {
        match self.timer.take() {
            Some(mut timer) => timer.stop(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TelemetryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryEntry")
            .field("kind", &self.kind)
            .field("period_seconds", &self.period_seconds)
            .field("enabled", &self.enabled)
            .field("armed", &self.is_armed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Entry table
// ---------------------------------------------------------------------------

/// Fixed-size table, one optional slot per schedulable kind.
#[derive(Debug, Default)]
pub(crate) struct EntryTable {
    slots: [Option<TelemetryEntry>; TelemetryKind::COUNT],
}

impl EntryTable {
    pub fn get(&self, kind: TelemetryKind) -> Option<&TelemetryEntry> {
        self.slots[kind.index()?].as_ref()
    }

    pub fn get_mut(&mut self, kind: TelemetryKind) -> Option<&mut TelemetryEntry> {
        self.slots[kind.index()?].as_mut()
    }

    /// Entry for `kind`, created disabled with a zero period if absent.
    /// `None` only for `Invalid`.
    pub fn get_or_insert(&mut self, kind: TelemetryKind) -> Option<&mut TelemetryEntry> {
        let slot = &mut self.slots[kind.index()?];
        Some(slot.get_or_insert_with(|| TelemetryEntry::new(kind, 0, false)))
    }

    /// Install `entry`, dropping (and so disarming) whatever held the slot.
    pub fn insert(&mut self, entry: TelemetryEntry) {
        if let Some(idx) = entry.kind.index() {
            self.slots[idx] = Some(entry);
        }
    }

    pub fn remove(&mut self, kind: TelemetryKind) -> Option<TelemetryEntry> {
        self.slots[kind.index()?].take()
    }

    pub fn contains(&self, kind: TelemetryKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TelemetryEntry> {
        self.slots.iter_mut().flatten()
    }
}

// ---------------------------------------------------------------------------
// Persisted form
// ---------------------------------------------------------------------------

/// One decoded settings leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredValue {
    Period(i64),
    Enable(bool),
}

/// Decode one leaf found below [`SETTINGS_SUBTREE`].
///
/// `key` is relative to the subtree (`"<ordinal>/<leaf>"`).
pub fn decode_setting(key: &str, value: &[u8]) -> Result<(TelemetryKind, StoredValue), Error> {
    let (ordinal, leaf) = key.split_once('/').ok_or(Error::Invalid)?;
    let kind = ordinal
        .parse::<u8>()
        .ok()
        .and_then(TelemetryKind::from_ordinal)
        .ok_or(Error::Invalid)?;

    let corrupted = |_| Error::Settings(SettingsError::Corrupted);
    let stored = match leaf {
        PERIOD_LEAF => StoredValue::Period(postcard::from_bytes(value).map_err(corrupted)?),
        ENABLE_LEAF => StoredValue::Enable(postcard::from_bytes(value).map_err(corrupted)?),
        _ => return Err(Error::Invalid),
    };
    Ok((kind, stored))
}

/// Rebuild the sparse entry table from the store.
///
/// A kind gets an entry (disabled, zero period) the first time any of its
/// leaves is seen; each decoded leaf then overwrites its field.  Leaves that
/// fail to decode are logged and skipped.
pub(crate) fn load_table(settings: &dyn SettingsPort) -> EntryTable {
    let mut table = EntryTable::default();

    let result = settings.load(SETTINGS_SUBTREE, &mut |key, value| {
        match decode_setting(key, value) {
            Ok((kind, stored)) => {
                let Some(entry) = table.get_or_insert(kind) else {
                    return;
                };
                match stored {
                    StoredValue::Period(p) => entry.period_seconds = p,
                    StoredValue::Enable(e) => entry.enabled = e,
                }
                debug!("Telemetry: loaded {}/{} = {:?}", SETTINGS_SUBTREE, key, stored);
            }
            Err(e) => warn!("Telemetry: skipping setting '{}': {}", key, e),
        }
    });

    if let Err(e) = result {
        warn!("Telemetry: settings load failed: {}", e);
    }
    table
}

/// Persist the (period, enabled) pair of `entry`.
pub(crate) fn store_entry(
    settings: &mut dyn SettingsPort,
    entry: &TelemetryEntry,
) -> Result<(), SettingsError> {
    let ordinal = entry.kind.ordinal();

    let period = postcard::to_allocvec(&entry.period_seconds).map_err(|_| SettingsError::IoError)?;
    settings.save(
        SETTINGS_SUBTREE,
        &format!("{ordinal}/{PERIOD_LEAF}"),
        &period,
    )?;

    let enable = postcard::to_allocvec(&entry.enabled).map_err(|_| SettingsError::IoError)?;
    settings.save(
        SETTINGS_SUBTREE,
        &format!("{ordinal}/{ENABLE_LEAF}"),
        &enable,
    )
}
