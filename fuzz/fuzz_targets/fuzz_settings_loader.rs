//! Fuzz target: persisted telemetry settings
//!
//! Stores arbitrary leaves under the telemetry subtree and rebuilds a
//! scheduler from them, verifying:
//! - No panics while decoding or loading corrupt leaves
//! - Construction never arms a timer
//!
//! cargo fuzz run fuzz_settings_loader

#![no_main]

use edgehog_device::WorkerConfig;
use edgehog_device::adapters::{NvsSettings, ThreadTimerFactory};
use edgehog_device::app::ports::SettingsPort;
use edgehog_device::telemetry::entry::{SETTINGS_SUBTREE, decode_setting};
use edgehog_device::telemetry::{TelemetryKind, TelemetryScheduler};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut settings = NvsSettings::new().unwrap();

    // Each chunk: [key selector, value bytes...]
    for chunk in data.chunks(6) {
        let Some((&sel, value)) = chunk.split_first() else {
            continue;
        };
        let ordinal = sel % 6;
        let leaf = match sel / 6 % 3 {
            0 => "periods",
            1 => "enable",
            _ => "junk",
        };
        let key = format!("{ordinal}/{leaf}");
        let _ = decode_setting(&key, value);
        settings.save(SETTINGS_SUBTREE, &key, value).unwrap();
    }

    let scheduler = TelemetryScheduler::new(
        &[],
        Box::new(settings),
        Box::new(ThreadTimerFactory),
        WorkerConfig::default(),
    )
    .unwrap();

    for kind in TelemetryKind::ALL {
        assert!(!scheduler.is_armed(kind));
    }
    assert!(!scheduler.is_running());
});
