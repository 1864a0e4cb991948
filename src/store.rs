//! Service configuration store abstraction
//!
//! The OS facility that persists per-service settings is modeled as a key/value
//! store keyed by service name. [`crate::registry::RegistryStore`] talks to the
//! real registry; [`MemoryStore`] keeps everything in memory and records each
//! attempt, which is what the applier is tested against and what `--dry-run`
//! uses.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::policy::StartMode;
use crate::registry::{service_key_path, MAX_KEY_NAME_LEN};

/// Failures reported by a store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("service configuration record not found")]
    NotFound,

    #[error("access denied: {0}")]
    PermissionDenied(String),

    #[error("open failed: {0}")]
    Open(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("{0}")]
    Unsupported(String),
}

/// Per-service configuration store.
///
/// A handle returned by [`open`](ServiceConfigStore::open) is released when it
/// is dropped; callers never hold one across policy entries.
pub trait ServiceConfigStore {
    type Handle;

    /// Open the configuration record of `service_name`.
    fn open(&mut self, service_name: &str, write: bool) -> Result<Self::Handle, StoreError>;

    /// Set the start mode of an opened record.
    fn set_start_mode(&mut self, handle: &mut Self::Handle, mode: StartMode) -> Result<(), StoreError>;
}

/// One recorded `set_start_mode` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub service_name: String,
    pub code: u32,
}

/// Handle to a record in a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryHandle {
    service_name: String,
    write: bool,
}

/// In-memory store that records every open and write attempt
#[derive(Debug, Default)]
pub struct MemoryStore {
    services: BTreeMap<String, Option<StartMode>>,
    denied: HashSet<String>,
    failing: HashSet<String>,
    accept_all: bool,
    opens: Vec<String>,
    writes: Vec<WriteRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that treats every service name the registry could address as
    /// existing and writable.
    pub fn accept_all() -> Self {
        Self {
            accept_all: true,
            ..Self::default()
        }
    }

    pub fn with_service(mut self, service_name: &str) -> Self {
        self.services.insert(service_name.to_string(), None);
        self
    }

    /// Register a service whose record exists but cannot be opened for writing.
    pub fn with_denied_service(mut self, service_name: &str) -> Self {
        self.services.insert(service_name.to_string(), None);
        self.denied.insert(service_name.to_string());
        self
    }

    /// Register a service whose record opens but rejects writes.
    pub fn with_failing_service(mut self, service_name: &str) -> Self {
        self.services.insert(service_name.to_string(), None);
        self.failing.insert(service_name.to_string());
        self
    }

    /// Current start mode of a service, if one was ever written.
    pub fn start_mode(&self, service_name: &str) -> Option<StartMode> {
        self.services.get(service_name).copied().flatten()
    }

    /// Every service name passed to `open`, in order.
    pub fn opens(&self) -> &[String] {
        &self.opens
    }

    /// Every write attempt that reached the store, in order.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }
}

impl ServiceConfigStore for MemoryStore {
    type Handle = MemoryHandle;

    fn open(&mut self, service_name: &str, write: bool) -> Result<MemoryHandle, StoreError> {
        self.opens.push(service_name.to_string());

        if service_name.chars().count() > MAX_KEY_NAME_LEN {
            return Err(StoreError::Open(format!(
                "service name longer than {} characters",
                MAX_KEY_NAME_LEN
            )));
        }
        if self.accept_all && service_key_path(service_name).is_some() {
            self.services.entry(service_name.to_string()).or_insert(None);
        }
        if !self.services.contains_key(service_name) {
            return Err(StoreError::NotFound);
        }
        if write && self.denied.contains(service_name) {
            return Err(StoreError::PermissionDenied(format!(
                "write access to '{}' refused",
                service_name
            )));
        }

        Ok(MemoryHandle {
            service_name: service_name.to_string(),
            write,
        })
    }

    fn set_start_mode(&mut self, handle: &mut MemoryHandle, mode: StartMode) -> Result<(), StoreError> {
        self.writes.push(WriteRecord {
            service_name: handle.service_name.clone(),
            code: mode.code(),
        });

        if !handle.write {
            return Err(StoreError::PermissionDenied("handle opened read-only".to_string()));
        }
        if self.failing.contains(&handle.service_name) {
            return Err(StoreError::Write("simulated write failure".to_string()));
        }

        debug!("Memory store: {} -> {} ({})", handle.service_name, mode, mode.code());
        self.services.insert(handle.service_name.clone(), Some(mode));
        Ok(())
    }
}
