//! Platform fact adapters.
//!
//! [`HostPlatform`] reports what the host can tell cheaply and simulates the
//! rest; [`EspPlatform`] reads heap, task, chip, NVS and app descriptor
//! data from ESP-IDF.

use std::time::Instant;

use log::info;

use crate::app::ports::{
    BaseImage, CpuInfo, OsInfo, PlatformPort, StorageUsage, SystemInfo, SystemStatus,
};
use crate::error::Error;

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

pub struct HostPlatform {
    booted: Instant,
    storage: Vec<StorageUsage>,
    identity: SystemInfo,
}

impl HostPlatform {
    pub fn new() -> Self {
        Self {
            booted: Instant::now(),
            storage: Vec::new(),
            identity: SystemInfo::default(),
        }
    }

    /// Report a serial and part number.
    #[must_use]
    pub fn with_identity(mut self, serial_number: &str, part_number: &str) -> Self {
        self.identity = SystemInfo {
            serial_number: Some(serial_number.to_owned()),
            part_number: Some(part_number.to_owned()),
        };
        self
    }

    /// Report a simulated storage partition.
    #[must_use]
    pub fn with_storage(mut self, label: &str, total_bytes: i64, free_bytes: Option<i64>) -> Self {
        self.storage.push(StorageUsage {
            label: label.to_owned(),
            total_bytes,
            free_bytes,
        });
        self
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPort for HostPlatform {
    fn cpu_info(&self) -> CpuInfo {
        CpuInfo {
            architecture: std::env::consts::ARCH.to_owned(),
            model_name: Some(format!("{} host", std::env::consts::OS)),
            ..CpuInfo::default()
        }
    }

    fn os_info(&self) -> OsInfo {
        let version = std::fs::read_to_string("/proc/sys/kernel/osrelease").unwrap_or_default();
        OsInfo {
            name: std::env::consts::OS.to_owned(),
            version: version.trim().to_owned(),
        }
    }

    fn system_info(&self) -> SystemInfo {
        self.identity.clone()
    }

    fn base_image(&self) -> BaseImage {
        BaseImage {
            name: Some(env!("CARGO_PKG_NAME").to_owned()),
            version: Some(env!("CARGO_PKG_VERSION").to_owned()),
            ..BaseImage::default()
        }
    }

    fn system_status(&self) -> SystemStatus {
        SystemStatus {
            avail_memory_bytes: 0,
            task_count: 1,
            uptime_millis: i64::try_from(self.booted.elapsed().as_millis()).unwrap_or(i64::MAX),
        }
    }

    fn storage_usage(&self) -> Vec<StorageUsage> {
        self.storage.clone()
    }

    fn start_wifi_scan(&self) -> Result<(), Error> {
        info!("Platform: Wi-Fi scan requested (simulation)");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::EspPlatform;

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use core::ffi::CStr;
    use esp_idf_svc::sys::*;
    use log::warn;

    /// NVS partition reported under StorageUsage.
    const NVS_PARTITION: &[u8] = b"nvs\0";
    /// Bytes per NVS entry.
    const NVS_ENTRY_BYTES: i64 = 32;

    #[derive(Debug, Default)]
    pub struct EspPlatform;

    impl EspPlatform {
        pub fn new() -> Self {
            Self
        }
    }

    impl PlatformPort for EspPlatform {
        fn cpu_info(&self) -> CpuInfo {
            let mut chip = esp_chip_info_t::default();
            // SAFETY: esp_chip_info only writes the provided struct.
            unsafe { esp_chip_info(&mut chip) };

            // SAFETY: read-only heap statistics.
            let total = unsafe { heap_caps_get_total_size(MALLOC_CAP_DEFAULT) };

            CpuInfo {
                architecture: if cfg!(target_arch = "riscv32") { "riscv32" } else { "xtensa" }
                    .to_owned(),
                model: Some(chip.model.to_string()),
                model_name: Some(format!("ESP32 (rev {}, {} cores)", chip.revision, chip.cores)),
                vendor: Some("Espressif Systems".to_owned()),
                total_memory_bytes: i64::try_from(total).ok(),
            }
        }

        fn os_info(&self) -> OsInfo {
            // SAFETY: returns a pointer to a static NUL-terminated string.
            let version = unsafe { CStr::from_ptr(esp_get_idf_version()) };
            OsInfo {
                name: "ESP-IDF".to_owned(),
                version: version.to_string_lossy().into_owned(),
            }
        }

        fn system_info(&self) -> SystemInfo {
            let mut mac = [0u8; 6];
            // SAFETY: writes exactly six bytes into `mac`.
            let ret = unsafe { esp_efuse_mac_get_default(mac.as_mut_ptr()) };
            if ret != ESP_OK as esp_err_t {
                warn!("Platform: esp_efuse_mac_get_default failed (rc={})", ret);
                return SystemInfo::default();
            }
            let serial = mac.iter().map(|b| format!("{b:02X}")).collect::<String>();
            SystemInfo {
                serial_number: Some(serial),
                part_number: None,
            }
        }

        fn base_image(&self) -> BaseImage {
            // SAFETY: the app descriptor is static and lives in flash.
            let desc = unsafe { &*esp_app_get_description() };
            // SAFETY: every descriptor string field is NUL-terminated.
            let text = |field: &[core::ffi::c_char]| unsafe {
                CStr::from_ptr(field.as_ptr()).to_string_lossy().into_owned()
            };
            let fingerprint = desc
                .app_elf_sha256
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>();
            BaseImage {
                name: Some(text(&desc.project_name)),
                version: Some(text(&desc.version)),
                build_id: Some(format!("{} {}", text(&desc.date), text(&desc.time))),
                fingerprint: Some(fingerprint),
            }
        }

        fn system_status(&self) -> SystemStatus {
            // SAFETY: all three are read-only queries.
            let (free, tasks, uptime_us) = unsafe {
                (
                    esp_get_free_heap_size(),
                    uxTaskGetNumberOfTasks(),
                    esp_timer_get_time(),
                )
            };
            SystemStatus {
                avail_memory_bytes: i64::from(free),
                task_count: tasks as i32,
                uptime_millis: uptime_us / 1000,
            }
        }

        fn storage_usage(&self) -> Vec<StorageUsage> {
            let mut stats = nvs_stats_t::default();
            // SAFETY: NVS_PARTITION is NUL-terminated; stats is written in place.
            let ret = unsafe { nvs_get_stats(NVS_PARTITION.as_ptr().cast(), &mut stats) };
            if ret != ESP_OK as esp_err_t {
                warn!("Platform: nvs_get_stats failed (rc={})", ret);
                return Vec::new();
            }
            vec![StorageUsage {
                label: "nvs".to_owned(),
                total_bytes: stats.total_entries as i64 * NVS_ENTRY_BYTES,
                free_bytes: Some(stats.free_entries as i64 * NVS_ENTRY_BYTES),
            }]
        }

        fn start_wifi_scan(&self) -> Result<(), Error> {
            // SAFETY: a null config scans all channels; non-blocking.
            let ret = unsafe { esp_wifi_scan_start(core::ptr::null(), false) };
            if ret != ESP_OK as esp_err_t {
                warn!("Platform: esp_wifi_scan_start failed (rc={})", ret);
                return Err(Error::StartFailed);
            }
            Ok(())
        }
    }
}
