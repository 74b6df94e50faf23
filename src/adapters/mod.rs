//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements     | Connects to                        |
//! |---------------|----------------|------------------------------------|
//! | `settings`    | SettingsPort   | NVS blob / in-memory map           |
//! | `timer`       | TimerFactory   | esp_timer / parked host threads    |
//! | `platform`    | PlatformPort   | ESP-IDF heap, chip, NVS stats      |
//! | `log_session` | Session        | Serial log output (JSON lines)     |

pub mod log_session;
pub mod platform;
pub mod settings;
pub mod timer;

pub use log_session::{Inbound, LogSession};
#[cfg(target_os = "espidf")]
pub use platform::EspPlatform;
pub use platform::HostPlatform;
pub use settings::NvsSettings;
#[cfg(target_os = "espidf")]
pub use timer::EspTimerFactory;
pub use timer::ThreadTimerFactory;
