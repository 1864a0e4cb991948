//! Windows registry implementation of the service configuration store
//!
//! Service start modes live in `HKLM\SYSTEM\CurrentControlSet\Services\<name>`
//! as the `Start` DWORD. Writing there takes effect on the next boot and needs
//! administrator rights.

use log::debug;

use crate::policy::StartMode;
use crate::store::{ServiceConfigStore, StoreError};

/// Registry path, relative to `HKEY_LOCAL_MACHINE`, holding one subkey per service
pub const SERVICES_KEY: &str = r"SYSTEM\CurrentControlSet\Services";

/// Name of the DWORD value holding the start mode
pub const START_VALUE: &str = "Start";

/// Longest key name the registry accepts
pub const MAX_KEY_NAME_LEN: usize = 255;

/// Registry subkey path for a service, or `None` when the name could address
/// some other key.
pub fn service_key_path(service_name: &str) -> Option<String> {
    if service_name.is_empty() || service_name.contains(['\\', '/']) {
        return None;
    }
    Some(format!(r"{}\{}", SERVICES_KEY, service_name))
}

/// Store backed by the local machine's services registry tree
#[derive(Debug, Default)]
pub struct RegistryStore;

impl RegistryStore {
    pub fn new() -> Self {
        RegistryStore
    }
}

#[cfg(target_os = "windows")]
mod imp {
    use super::*;
    use windows::core::{w, HSTRING};
    use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
    use windows::Win32::System::Registry::*;

    /// Open registry key, closed on drop
    #[derive(Debug)]
    pub struct RegistryKey {
        pub(super) hkey: HKEY,
        pub(super) service_name: String,
    }

    impl Drop for RegistryKey {
        fn drop(&mut self) {
            unsafe {
                let _ = RegCloseKey(self.hkey);
            }
        }
    }

    fn describe(status: WIN32_ERROR) -> String {
        format!(
            "{} (error {})",
            windows::core::Error::from(status.to_hresult()),
            status.0
        )
    }

    pub fn open(service_name: &str, write: bool) -> Result<RegistryKey, StoreError> {
        let path = service_key_path(service_name).ok_or(StoreError::NotFound)?;
        let access = if write { KEY_SET_VALUE } else { KEY_READ };

        let mut hkey = HKEY::default();
        let status = unsafe { RegOpenKeyExW(HKEY_LOCAL_MACHINE, &HSTRING::from(path.as_str()), 0, access, &mut hkey) };

        match status {
            ERROR_SUCCESS => Ok(RegistryKey {
                hkey,
                service_name: service_name.to_string(),
            }),
            ERROR_FILE_NOT_FOUND => Err(StoreError::NotFound),
            ERROR_ACCESS_DENIED => Err(StoreError::PermissionDenied(describe(status))),
            other => Err(StoreError::Open(describe(other))),
        }
    }

    pub fn set_start_mode(key: &mut RegistryKey, mode: StartMode) -> Result<(), StoreError> {
        let data = mode.code().to_le_bytes();
        let status = unsafe { RegSetValueExW(key.hkey, w!("Start"), 0, REG_DWORD, Some(&data[..])) };

        match status {
            ERROR_SUCCESS => Ok(()),
            ERROR_ACCESS_DENIED => Err(StoreError::PermissionDenied(describe(status))),
            other => Err(StoreError::Write(describe(other))),
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod imp {
    use super::*;

    /// Placeholder key; never constructed off Windows
    #[derive(Debug)]
    pub struct RegistryKey {
        pub(super) service_name: String,
    }

    pub fn open(service_name: &str, _write: bool) -> Result<RegistryKey, StoreError> {
        Err(StoreError::Unsupported(format!(
            "the service registry is only available on Windows (service '{}')",
            service_name
        )))
    }

    pub fn set_start_mode(key: &mut RegistryKey, _mode: StartMode) -> Result<(), StoreError> {
        Err(StoreError::Unsupported(format!(
            "the service registry is only available on Windows (service '{}')",
            key.service_name
        )))
    }
}

pub use imp::RegistryKey;

impl ServiceConfigStore for RegistryStore {
    type Handle = RegistryKey;

    fn open(&mut self, service_name: &str, write: bool) -> Result<RegistryKey, StoreError> {
        debug!("Opening {}\\{} (write: {})", SERVICES_KEY, service_name, write);
        imp::open(service_name, write)
    }

    fn set_start_mode(&mut self, handle: &mut RegistryKey, mode: StartMode) -> Result<(), StoreError> {
        debug!(
            "Writing {}={} for service '{}'",
            START_VALUE,
            mode.code(),
            handle.service_name
        );
        imp::set_start_mode(handle, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_key_path() {
        assert_eq!(
            service_key_path("wuauserv").as_deref(),
            Some(r"SYSTEM\CurrentControlSet\Services\wuauserv")
        );
        assert_eq!(
            service_key_path("Spooler").as_deref(),
            Some(r"SYSTEM\CurrentControlSet\Services\Spooler")
        );
    }

    #[test]
    fn test_service_key_path_rejects_separators() {
        assert_eq!(service_key_path(""), None);
        assert_eq!(service_key_path(r"..\..\Control"), None);
        assert_eq!(service_key_path("Spooler/Parameters"), None);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_registry_unsupported_off_windows() {
        let mut store = RegistryStore::new();
        assert!(matches!(
            store.open("wuauserv", true),
            Err(StoreError::Unsupported(_))
        ));
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_missing_service_is_not_found() {
        let mut store = RegistryStore::new();
        assert!(matches!(
            store.open("service-policy-test-does-not-exist", false),
            Err(StoreError::NotFound)
        ));
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_overlong_name_is_an_open_failure() {
        let mut store = RegistryStore::new();
        match store.open(&"x".repeat(MAX_KEY_NAME_LEN + 1), false) {
            Err(StoreError::Open(_)) | Err(StoreError::NotFound) => {}
            other => panic!("expected an open failure, got {:?}", other),
        }
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_invalid_name_never_reaches_registry() {
        let mut store = RegistryStore::new();
        assert!(matches!(
            store.open(r"..\Control", true),
            Err(StoreError::NotFound)
        ));
    }
}
