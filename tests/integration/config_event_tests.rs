//! Telemetry reconfiguration through property set / unset requests.

use std::time::Duration;

use edgehog_device::adapters::NvsSettings;
use edgehog_device::app::events::Value;
use edgehog_device::telemetry::config_event::{handle_set, handle_unset};
use edgehog_device::telemetry::{TelemetryConfig, TelemetryKind, TelemetryScheduler};
use edgehog_device::{Error, WorkerConfig};

use crate::mocks::{ManualTimers, RecordingPublisher};

const STOP: Duration = Duration::from_secs(2);

fn running(baseline: &[TelemetryConfig], timers: &ManualTimers) -> TelemetryScheduler {
    let mut s = TelemetryScheduler::new(
        baseline,
        Box::new(NvsSettings::new().unwrap()),
        Box::new(timers.clone()),
        WorkerConfig {
            queue_poll_interval_ms: 5,
            ..WorkerConfig::default()
        },
    )
    .unwrap();
    s.start(RecordingPublisher::new()).unwrap();
    s
}

fn path(kind: TelemetryKind, field: &str) -> String {
    format!("/request/{}/{}", kind.interface_name().unwrap(), field)
}

fn snapshot(s: &TelemetryScheduler) -> Vec<Option<(i64, bool, bool)>> {
    TelemetryKind::ALL
        .into_iter()
        .map(|k| {
            s.entry(k)
                .map(|e| (e.period_seconds(), e.enabled(), e.is_armed()))
        })
        .collect()
}

// ── Set ───────────────────────────────────────────────────────

#[test]
fn period_set_rearms_with_the_new_interval() {
    let timers = ManualTimers::new();
    let mut s = running(&[TelemetryConfig::new(TelemetryKind::SystemStatus, 60)], &timers);
    assert_eq!(timers.armed_periods(), [Duration::from_secs(60)]);

    handle_set(
        &mut s,
        &path(TelemetryKind::SystemStatus, "periodSeconds"),
        &Value::LongInteger(5),
    )
    .unwrap();

    assert_eq!(s.entry(TelemetryKind::SystemStatus).unwrap().period_seconds(), 5);
    assert_eq!(timers.armed_periods(), [Duration::from_secs(5)]);
    s.stop(STOP).unwrap();
}

#[test]
fn set_for_a_kind_without_entry_creates_a_disabled_one() {
    let timers = ManualTimers::new();
    let mut s = running(&[], &timers);

    handle_set(
        &mut s,
        &path(TelemetryKind::WifiScan, "periodSeconds"),
        &Value::Integer(30),
    )
    .unwrap();
    let entry = s.entry(TelemetryKind::WifiScan).unwrap();
    assert_eq!(entry.period_seconds(), 30);
    assert!(!entry.enabled());
    assert!(!s.is_armed(TelemetryKind::WifiScan));

    handle_set(&mut s, &path(TelemetryKind::WifiScan, "enable"), &Value::Boolean(true)).unwrap();
    assert!(s.is_armed(TelemetryKind::WifiScan));
    assert_eq!(timers.armed_periods(), [Duration::from_secs(30)]);
    s.stop(STOP).unwrap();
}

#[test]
fn enable_false_disarms_the_running_timer() {
    let timers = ManualTimers::new();
    let mut s = running(&[TelemetryConfig::new(TelemetryKind::HardwareInfo, 60)], &timers);

    handle_set(&mut s, &path(TelemetryKind::HardwareInfo, "enable"), &Value::Boolean(false))
        .unwrap();

    assert!(!s.is_armed(TelemetryKind::HardwareInfo));
    assert_eq!(timers.armed_count(), 0);
    s.stop(STOP).unwrap();
}

#[test]
fn wrongly_typed_values_leave_the_field_alone() {
    let timers = ManualTimers::new();
    let mut s = running(&[TelemetryConfig::new(TelemetryKind::StorageUsage, 600)], &timers);

    handle_set(
        &mut s,
        &path(TelemetryKind::StorageUsage, "enable"),
        &Value::String("no".into()),
    )
    .unwrap();
    handle_set(
        &mut s,
        &path(TelemetryKind::StorageUsage, "periodSeconds"),
        &Value::Double(1.5),
    )
    .unwrap();

    let entry = s.entry(TelemetryKind::StorageUsage).unwrap();
    assert!(entry.enabled());
    assert_eq!(entry.period_seconds(), 600);
    assert!(s.is_armed(TelemetryKind::StorageUsage));
    s.stop(STOP).unwrap();
}

// ── Unset ─────────────────────────────────────────────────────

#[test]
fn period_unset_restores_the_baseline() {
    let timers = ManualTimers::new();
    let mut s = running(&[TelemetryConfig::new(TelemetryKind::SystemStatus, 60)], &timers);

    handle_set(
        &mut s,
        &path(TelemetryKind::SystemStatus, "periodSeconds"),
        &Value::Integer(5),
    )
    .unwrap();
    handle_unset(&mut s, &path(TelemetryKind::SystemStatus, "periodSeconds")).unwrap();

    assert_eq!(s.entry(TelemetryKind::SystemStatus).unwrap().period_seconds(), 60);
    assert_eq!(timers.armed_periods(), [Duration::from_secs(60)]);
    s.stop(STOP).unwrap();
}

#[test]
fn period_unset_without_baseline_leaves_the_kind_unarmable() {
    let timers = ManualTimers::new();
    let mut s = running(&[], &timers);

    handle_set(&mut s, &path(TelemetryKind::WifiScan, "periodSeconds"), &Value::Integer(30))
        .unwrap();
    handle_set(&mut s, &path(TelemetryKind::WifiScan, "enable"), &Value::Boolean(true)).unwrap();
    assert!(s.is_armed(TelemetryKind::WifiScan));

    let result = handle_unset(&mut s, &path(TelemetryKind::WifiScan, "periodSeconds"));
    assert!(matches!(result, Err(Error::InvalidPeriod(p)) if p <= 0));
    assert!(s.entry(TelemetryKind::WifiScan).unwrap().period_seconds() <= 0);
    assert!(!s.is_armed(TelemetryKind::WifiScan));

    // A fresh valid period brings it back.
    handle_set(&mut s, &path(TelemetryKind::WifiScan, "periodSeconds"), &Value::Integer(15))
        .unwrap();
    assert!(s.is_armed(TelemetryKind::WifiScan));
    assert_eq!(timers.armed_periods(), [Duration::from_secs(15)]);
    s.stop(STOP).unwrap();
}

#[test]
fn enable_unset_follows_baseline_membership() {
    let timers = ManualTimers::new();
    let mut s = running(&[TelemetryConfig::new(TelemetryKind::HardwareInfo, 60)], &timers);

    handle_set(&mut s, &path(TelemetryKind::HardwareInfo, "enable"), &Value::Boolean(false))
        .unwrap();
    handle_unset(&mut s, &path(TelemetryKind::HardwareInfo, "enable")).unwrap();
    assert!(s.entry(TelemetryKind::HardwareInfo).unwrap().enabled());
    assert!(s.is_armed(TelemetryKind::HardwareInfo));

    handle_set(&mut s, &path(TelemetryKind::StorageUsage, "periodSeconds"), &Value::Integer(10))
        .unwrap();
    handle_set(&mut s, &path(TelemetryKind::StorageUsage, "enable"), &Value::Boolean(true))
        .unwrap();
    handle_unset(&mut s, &path(TelemetryKind::StorageUsage, "enable")).unwrap();
    assert!(!s.entry(TelemetryKind::StorageUsage).unwrap().enabled());
    assert!(!s.is_armed(TelemetryKind::StorageUsage));
    s.stop(STOP).unwrap();
}

#[test]
fn unset_without_entry_fails() {
    let timers = ManualTimers::new();
    let mut s = running(&[], &timers);
    assert_eq!(
        handle_unset(&mut s, &path(TelemetryKind::SystemStatus, "enable")),
        Err(Error::StartFailed)
    );
    assert!(s.entry(TelemetryKind::SystemStatus).is_none());
    s.stop(STOP).unwrap();
}

// ── Rejected requests ─────────────────────────────────────────

#[test]
fn unknown_interface_is_unsupported_and_changes_nothing() {
    let timers = ManualTimers::new();
    let mut s = running(
        &[
            TelemetryConfig::new(TelemetryKind::HardwareInfo, 60),
            TelemetryConfig::new(TelemetryKind::SystemStatus, 30),
        ],
        &timers,
    );
    let before = snapshot(&s);

    for bad in [
        "/request/io.edgehog.devicemanager.BatteryStatus/enable",
        "/request/io.edgehog.devicemanager.HardwareInfo",
        "/request//enable",
        "/config/io.edgehog.devicemanager.SystemStatus/enable",
        "",
    ] {
        assert_eq!(
            handle_set(&mut s, bad, &Value::Boolean(false)),
            Err(Error::UnsupportedRequest),
            "{bad}"
        );
        assert_eq!(handle_unset(&mut s, bad), Err(Error::UnsupportedRequest), "{bad}");
    }

    assert_eq!(snapshot(&s), before);
    assert_eq!(timers.armed_count(), 2);
    s.stop(STOP).unwrap();
}
