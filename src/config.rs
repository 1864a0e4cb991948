//! Configuration management for policy-apply

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::applier::DEFAULT_POLICY_FILE;

/// Environment variable naming the policy file
pub const ENV_POLICY_FILE: &str = "SERVICE_POLICY_FILE";

/// Environment variable enabling dry-run mode
pub const ENV_DRY_RUN: &str = "SERVICE_POLICY_DRY_RUN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Policy file to apply
    pub policy_path: PathBuf,

    /// Resolve and log every entry without touching the registry
    pub dry_run: bool,

    /// Print the run report as JSON when the pass completes
    pub json_report: bool,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from(DEFAULT_POLICY_FILE),
            dry_run: false,
            json_report: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_POLICY_FILE).filter(|p| !p.trim().is_empty()) {
            config.policy_path = PathBuf::from(path);
        }

        if let Some(value) = lookup(ENV_DRY_RUN) {
            config.dry_run = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "" | "0" | "false" | "no" => false,
                other => bail!("Invalid {} value: {}", ENV_DRY_RUN, other),
            };
        }

        if let Some(level) = lookup("RUST_LOG").filter(|l| !l.is_empty()) {
            config.log_level = level;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.policy_path, PathBuf::from("service-policy.cfg"));
        assert!(!config.dry_run);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_POLICY_FILE, r"C:\Program Files\Qubes\service-policy.cfg"),
            (ENV_DRY_RUN, "TRUE"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(
            config.policy_path,
            PathBuf::from(r"C:\Program Files\Qubes\service-policy.cfg")
        );
        assert!(config.dry_run);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_blank_policy_path_keeps_default() {
        let config = Config::from_lookup(lookup(&[(ENV_POLICY_FILE, "  ")])).unwrap();
        assert_eq!(config.policy_path, PathBuf::from(DEFAULT_POLICY_FILE));
    }

    #[test]
    fn test_invalid_dry_run_value() {
        let err = Config::from_lookup(lookup(&[(ENV_DRY_RUN, "maybe")])).unwrap_err();
        assert!(err.to_string().contains("SERVICE_POLICY_DRY_RUN"));
    }
}
