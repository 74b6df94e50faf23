//! NVS (Non-Volatile Storage) settings adapter.
//!
//! Implements [`SettingsPort`] over an ordered in-memory map rooted at
//! `edgehog_device/`.  Clones share the same map, so a store handed to one
//! device instance can be inspected (or handed to the next instance)
//! through another clone.
//!
//! On ESP-IDF every write goes through to a single postcard blob in the
//! `edgehog` NVS namespace, and the map is rebuilt from it at startup.
//! ESP-IDF NVS commits are atomic per `nvs_commit()`, so the blob is never
//! half-written.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};

use crate::app::ports::SettingsPort;
use crate::error::SettingsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

/// Root every key lives under.
const ROOT: &str = "edgehog_device";

#[cfg(target_os = "espidf")]
const NVS_NAMESPACE: &[u8] = b"edgehog\0";
#[cfg(target_os = "espidf")]
const NVS_BLOB_KEY: &[u8] = b"settings\0";
#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 4000;

type Store = BTreeMap<String, Vec<u8>>;

#[derive(Clone, Default)]
pub struct NvsSettings {
    store: Arc<Mutex<Store>>,
}

impl NvsSettings {
    /// Create the adapter.
    ///
    /// On ESP-IDF this initialises NVS flash (erasing it on a version
    /// mismatch or when full) and loads the persisted blob.
    pub fn new() -> Result<Self, SettingsError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("Settings: erasing and re-initialising NVS partition");
                let erased = unsafe { nvs_flash_erase() } == ESP_OK as esp_err_t;
                if !erased || unsafe { nvs_flash_init() } != ESP_OK as esp_err_t {
                    return Err(SettingsError::IoError);
                }
            } else if ret != ESP_OK as esp_err_t {
                return Err(SettingsError::IoError);
            }

            let store = read_blob()?;
            info!("Settings: NVS backend ({} keys)", store.len());
            Ok(Self {
                store: Arc::new(Mutex::new(store)),
            })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Settings: simulation backend");
            Ok(Self::default())
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>, SettingsError> {
        self.store.lock().map_err(|_| SettingsError::IoError)
    }

    fn full_key(subtree: &str, key: &str) -> String {
        format!("{ROOT}/{subtree}/{key}")
    }

    /// Number of stored leaves across every subtree.
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes stored under `subtree/key`.
    pub fn get(&self, subtree: &str, key: &str) -> Option<Vec<u8>> {
        self.lock().ok()?.get(&Self::full_key(subtree, key)).cloned()
    }

    #[cfg(target_os = "espidf")]
    fn persist(store: &Store) -> Result<(), SettingsError> {
        write_blob(store)
    }

    #[cfg(not(target_os = "espidf"))]
    fn persist(_store: &Store) -> Result<(), SettingsError> {
        Ok(())
    }
}

impl SettingsPort for NvsSettings {
    fn load(
        &self,
        subtree: &str,
        visitor: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<(), SettingsError> {
        let prefix = format!("{ROOT}/{subtree}/");
        let store = self.lock()?;
        let mut visited = 0_usize;
        for (key, value) in store.range(prefix.clone()..) {
            let Some(leaf) = key.strip_prefix(&prefix) else {
                break;
            };
            visitor(leaf, value);
            visited += 1;
        }
        debug!("Settings: loaded {} keys under '{}'", visited, prefix);
        Ok(())
    }

    fn save(&mut self, subtree: &str, key: &str, value: &[u8]) -> Result<(), SettingsError> {
        let mut store = self.lock()?;
        store.insert(Self::full_key(subtree, key), value.to_vec());
        Self::persist(&store)
    }

    fn delete(&mut self, subtree: &str, key: &str) -> Result<(), SettingsError> {
        let mut store = self.lock()?;
        if store.remove(&Self::full_key(subtree, key)).is_some() {
            Self::persist(&store)?;
        }
        Ok(())
    }
}

// ── ESP-IDF blob I/O ──────────────────────────────────────────

/// Open the settings namespace, execute a closure with the handle, then close.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
where
    F: FnOnce(nvs_handle_t) -> Result<T, i32>,
{
    let mut handle: nvs_handle_t = 0;
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };

    // SAFETY: NVS_NAMESPACE is NUL-terminated; the handle is closed below.
    let ret = unsafe { nvs_open(NVS_NAMESPACE.as_ptr().cast(), mode, &mut handle) };
    if ret != ESP_OK as esp_err_t {
        return Err(ret);
    }

    let result = f(handle);
    unsafe {
        nvs_close(handle);
    }
    result
}

#[cfg(target_os = "espidf")]
fn read_blob() -> Result<Store, SettingsError> {
    let result = with_nvs_handle(false, |handle| {
        let mut size: usize = 0;

        // First call: get size
        let ret = unsafe {
            nvs_get_blob(
                handle,
                NVS_BLOB_KEY.as_ptr().cast(),
                core::ptr::null_mut(),
                &mut size,
            )
        };
        if ret != ESP_OK as esp_err_t || size == 0 || size > MAX_BLOB_SIZE {
            return Err(ret);
        }

        let mut buf = vec![0u8; size];
        let ret = unsafe {
            nvs_get_blob(
                handle,
                NVS_BLOB_KEY.as_ptr().cast(),
                buf.as_mut_ptr().cast(),
                &mut size,
            )
        };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }
        Ok(buf)
    });

    match result {
        Ok(bytes) => postcard::from_bytes(&bytes).map_err(|_| SettingsError::Corrupted),
        // A fresh namespace cannot be opened read-only and has no blob yet.
        Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => Ok(Store::new()),
        Err(e) => {
            warn!("Settings: NVS read error {}, starting empty", e);
            Ok(Store::new())
        }
    }
}

#[cfg(target_os = "espidf")]
fn write_blob(store: &Store) -> Result<(), SettingsError> {
    let bytes = postcard::to_allocvec(store).map_err(|_| SettingsError::IoError)?;
    if bytes.len() > MAX_BLOB_SIZE {
        return Err(SettingsError::Full);
    }

    let result = with_nvs_handle(true, |handle| {
        let ret = unsafe {
            nvs_set_blob(
                handle,
                NVS_BLOB_KEY.as_ptr().cast(),
                bytes.as_ptr().cast(),
                bytes.len(),
            )
        };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }
        let ret = unsafe { nvs_commit(handle) };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }
        Ok(())
    });

    result.map_err(|e| {
        warn!("Settings: NVS write error {}", e);
        if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t {
            SettingsError::Full
        } else {
            SettingsError::IoError
        }
    })
}
