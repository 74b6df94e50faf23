//! Fuzz target: telemetry request path parser
//!
//! Feeds arbitrary UTF-8 to `parse_path` and checks:
//! - No panics under arbitrary input
//! - Accepted paths always live under `/request/` and name a real kind
//!
//! cargo fuzz run fuzz_config_path

#![no_main]

use edgehog_device::telemetry::TelemetryKind;
use edgehog_device::telemetry::config_event::parse_path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(path) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok((kind, _field)) = parse_path(path) {
        assert!(path.starts_with("/request/"));
        assert_ne!(kind, TelemetryKind::Invalid);
        let interface = kind.interface_name().unwrap();
        assert!(path.contains(interface));
    }
});
