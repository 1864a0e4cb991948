//! service-policy - Windows service start-mode policy applier
//!
//! Reads a line-oriented `<service>: <mode>` policy file and writes the
//! requested start mode of each service into the service configuration
//! registry. Used while provisioning a VM to lock down which services may
//! start automatically.

pub mod applier;
pub mod config;
pub mod error;
pub mod policy;
pub mod registry;
pub mod store;

pub use applier::{ApplyReport, EntryFailure, PolicyApplier, DEFAULT_POLICY_FILE};
pub use config::Config;
pub use error::{PolicyError, PolicyResult};
pub use policy::{parse_line, PolicyEntry, StartMode};
pub use registry::RegistryStore;
pub use store::{MemoryStore, ServiceConfigStore, StoreError};
