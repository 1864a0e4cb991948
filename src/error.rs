//! Error taxonomy for policy application

use std::path::PathBuf;

use crate::policy::StartMode;

/// Errors raised while reading or applying a service policy.
///
/// Only [`PolicyError::ConfigFileUnavailable`] and
/// [`PolicyError::ReadInterrupted`] abort a run. Everything else is
/// caught at the per-line boundary, logged and recorded in the report.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Policy file {path:?} is unavailable: {source}")]
    ConfigFileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Policy file {path:?} became unreadable after line {line} ({applied} entries already applied): {source}"
    )]
    ReadInterrupted {
        path: PathBuf,
        line: usize,
        applied: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed policy line {line}")]
    MalformedLine { line: usize },

    #[error("Unknown start mode '{token}' for service '{service}'")]
    UnknownStartMode { service: String, token: String },

    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    #[error("Permission denied opening service '{service}': {message}")]
    PermissionDenied { service: String, message: String },

    #[error("Failed to open service '{service}': {message}")]
    ServiceOpenFailure { service: String, message: String },

    #[error("Failed to set start mode {mode} for service '{service}': {message}")]
    StoreWriteFailure {
        service: String,
        mode: StartMode,
        message: String,
    },

    #[error("Unsupported operation on this platform: {0}")]
    Unsupported(String),
}

impl PolicyError {
    /// Whether this error ends the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PolicyError::ConfigFileUnavailable { .. } | PolicyError::ReadInterrupted { .. }
        )
    }

    /// Short stable name used in logs and the JSON report.
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyError::ConfigFileUnavailable { .. } => "ConfigFileUnavailable",
            PolicyError::ReadInterrupted { .. } => "ConfigFileUnavailable",
            PolicyError::MalformedLine { .. } => "MalformedLine",
            PolicyError::UnknownStartMode { .. } => "UnknownStartMode",
            PolicyError::ServiceNotFound { .. } => "ServiceNotFound",
            PolicyError::PermissionDenied { .. } => "PermissionDenied",
            PolicyError::ServiceOpenFailure { .. } => "ServiceOpenFailure",
            PolicyError::StoreWriteFailure { .. } => "StoreWriteFailure",
            PolicyError::Unsupported(_) => "Unsupported",
        }
    }
}

/// Result type for policy operations
pub type PolicyResult<T> = std::result::Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_file_is_fatal() {
        let missing = PolicyError::ConfigFileUnavailable {
            path: PathBuf::from("service-policy.cfg"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(missing.is_fatal());
        assert_eq!(missing.kind(), "ConfigFileUnavailable");

        let unknown = PolicyError::UnknownStartMode {
            service: "BadService".to_string(),
            token: "flying".to_string(),
        };
        assert!(!unknown.is_fatal());
        assert_eq!(
            unknown.to_string(),
            "Unknown start mode 'flying' for service 'BadService'"
        );
    }

    #[test]
    fn test_interrupted_read_is_fatal_and_counts_writes() {
        let err = PolicyError::ReadInterrupted {
            path: PathBuf::from("service-policy.cfg"),
            line: 3,
            applied: 2,
            source: std::io::Error::new(std::io::ErrorKind::Other, "device error"),
        };
        assert!(err.is_fatal());
        assert_eq!(err.kind(), "ConfigFileUnavailable");
        assert!(err.to_string().contains("after line 3 (2 entries already applied)"));
    }

    #[test]
    fn test_write_failure_message_names_mode() {
        let err = PolicyError::StoreWriteFailure {
            service: "Spooler".to_string(),
            mode: StartMode::Manual,
            message: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to set start mode Manual for service 'Spooler': disk full"
        );
    }
}
