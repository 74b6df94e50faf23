//! Telemetry reconfiguration requests.
//!
//! The cloud sets and unsets server-owned properties on
//! [`CONFIG_INTERFACE`](super::CONFIG_INTERFACE) at
//! `/request/<telemetry interface>/<field>`, where `<field>` is `enable`
//! (boolean) or `periodSeconds` (integer).  A set updates the matching
//! field; an unset falls back to the baseline.  Either way the entry is
//! then scheduled or unscheduled according to its `enabled` flag.

use log::{debug, info, warn};

use super::{TelemetryKind, TelemetryScheduler};
use crate::app::events::Value;
use crate::error::{Error, Result};

const REQUEST_PREFIX: &str = "/request/";

/// Property fields understood on a telemetry request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Enable,
    PeriodSeconds,
    /// Anything else: accepted, left untouched.
    Other,
}

impl ConfigField {
    fn parse(name: &str) -> Self {
        match name {
            "enable" => Self::Enable,
            "periodSeconds" => Self::PeriodSeconds,
            _ => Self::Other,
        }
    }
}

/// Split `/request/<interface>/<field>` into the kind and field it names.
pub fn parse_path(path: &str) -> Result<(TelemetryKind, ConfigField)> {
    let rest = path
        .strip_prefix(REQUEST_PREFIX)
        .ok_or(Error::UnsupportedRequest)?;
    let (interface, field) = rest.split_once('/').ok_or(Error::UnsupportedRequest)?;
    if interface.is_empty() || field.is_empty() || field.contains('/') {
        return Err(Error::UnsupportedRequest);
    }
    let kind = TelemetryKind::from_interface_name(interface).ok_or(Error::UnsupportedRequest)?;
    Ok((kind, ConfigField::parse(field)))
}

/// Apply a property set.  Values of the wrong type are ignored.
pub fn handle_set(scheduler: &mut TelemetryScheduler, path: &str, value: &Value) -> Result<()> {
    let (kind, field) = parse_path(path)?;
    let entry = scheduler.entry_or_insert(kind)?;

    match (field, value.as_bool(), value.as_integer()) {
        (ConfigField::Enable, Some(enabled), _) => entry.enabled = enabled,
        (ConfigField::PeriodSeconds, _, Some(period)) => entry.period_seconds = period,
        _ => debug!("Telemetry: ignoring {:?} value {:?} for {:?}", field, value, kind),
    }

    info!(
        "Telemetry: {:?} set (enabled={}, period={}s)",
        kind, entry.enabled, entry.period_seconds
    );
    apply(scheduler, kind)
}

/// Apply a property unset, restoring the baseline for the named field.
///
/// Unsetting a kind that has no entry fails with `StartFailed`.
pub fn handle_unset(scheduler: &mut TelemetryScheduler, path: &str) -> Result<()> {
    let (kind, field) = parse_path(path)?;
    let baseline_period = scheduler.baseline_period(kind);

    let Some(entry) = scheduler.entry_mut(kind) else {
        warn!("Telemetry: unset for {:?} without an entry", kind);
        return Err(Error::StartFailed);
    };

    match field {
        ConfigField::Enable => entry.enabled = baseline_period.is_some(),
        ConfigField::PeriodSeconds => entry.period_seconds = baseline_period.unwrap_or(-1),
        ConfigField::Other => debug!("Telemetry: ignoring unset of unknown field for {:?}", kind),
    }

    info!(
        "Telemetry: {:?} unset (enabled={}, period={}s)",
        kind, entry.enabled, entry.period_seconds
    );
    apply(scheduler, kind)
}

fn apply(scheduler: &mut TelemetryScheduler, kind: TelemetryKind) -> Result<()> {
    let enabled = scheduler.entry(kind).is_some_and(super::TelemetryEntry::enabled);
    if enabled {
        scheduler.schedule(kind)
    } else {
        scheduler.unschedule(kind)
    }
}
