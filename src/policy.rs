//! Policy file model and line parsing
//!
//! A policy file is a flat list of `<service-name>: <mode>` lines. Lines whose
//! first non-whitespace character is `#` are comments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};

/// Start mode encoding the store uses for anything that is not a valid mode.
/// [`StartMode::code`] never produces it.
pub const INVALID_START_MODE: i32 = -1;

/// Startup policy for a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StartMode {
    /// Started by the service control manager at boot
    Automatic,
    /// Started on demand
    Manual,
    /// Cannot be started
    Disabled,
}

impl StartMode {
    pub const ALL: [StartMode; 3] = [StartMode::Automatic, StartMode::Manual, StartMode::Disabled];

    /// Value stored in the service's `Start` DWORD.
    pub fn code(self) -> u32 {
        match self {
            StartMode::Automatic => 2,
            StartMode::Manual => 3,
            StartMode::Disabled => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StartMode::Automatic => "Automatic",
            StartMode::Manual => "Manual",
            StartMode::Disabled => "Disabled",
        }
    }

    /// Resolve a mode token, ignoring letter case.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a token names none of the known start modes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized start mode '{0}'")]
pub struct UnrecognizedStartMode(pub String);

impl FromStr for StartMode {
    type Err = UnrecognizedStartMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| UnrecognizedStartMode(s.to_string()))
    }
}

/// One parsed policy line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyEntry {
    pub service_name: String,
    pub mode: StartMode,
    /// 1-based line number in the policy file
    pub line: usize,
}

/// Parse a single policy line.
///
/// Returns `Ok(None)` for comments and blank lines, `Err(MalformedLine)` for
/// lines without a `:` separator and `Err(UnknownStartMode)` when the mode
/// token is not recognized. An empty service name is passed through; the store
/// reports it as not found.
pub fn parse_line(line_no: usize, raw: &str) -> PolicyResult<Option<PolicyEntry>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let Some((name, token)) = trimmed.split_once(':') else {
        return Err(PolicyError::MalformedLine { line: line_no });
    };

    let service_name = name.trim();
    let token = token.trim();
    let mode = token
        .parse::<StartMode>()
        .map_err(|UnrecognizedStartMode(token)| PolicyError::UnknownStartMode {
            service: service_name.to_string(),
            token,
        })?;

    Ok(Some(PolicyEntry {
        service_name: service_name.to_string(),
        mode,
        line: line_no,
    }))
}
