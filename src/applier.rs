//! Policy application pass
//!
//! Reads a policy file line by line and pushes each entry's start mode into a
//! [`ServiceConfigStore`]. Per-line failures are logged, recorded in the
//! [`ApplyReport`] and skipped; only failing to read the file stops the run.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::error::{PolicyError, PolicyResult};
use crate::policy::{parse_line, PolicyEntry, StartMode};
use crate::store::{ServiceConfigStore, StoreError};

/// Default policy file, relative to the working directory
pub const DEFAULT_POLICY_FILE: &str = "service-policy.cfg";

/// A policy entry that could not be applied
#[derive(Debug, Clone, Serialize)]
pub struct EntryFailure {
    pub line: usize,
    pub service_name: String,
    /// Resolved mode, absent when the token itself was not recognized
    pub mode: Option<StartMode>,
    pub kind: &'static str,
    pub message: String,
}

/// Summary of one pass over a policy file
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Entries were resolved but the store does not persist them
    pub dry_run: bool,
    pub lines_read: usize,
    pub applied: Vec<PolicyEntry>,
    pub malformed_lines: Vec<usize>,
    pub failures: Vec<EntryFailure>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies policy entries to a service configuration store
pub struct PolicyApplier<S: ServiceConfigStore> {
    store: S,
    dry_run: bool,
}

impl<S: ServiceConfigStore> PolicyApplier<S> {
    pub fn new(store: S) -> Self {
        Self { store, dry_run: false }
    }

    /// Mark the store as a stand-in; logs then say what would change.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply every entry of the policy file at `path`.
    pub fn apply_file<P: AsRef<Path>>(&mut self, path: P) -> PolicyResult<ApplyReport> {
        let path = path.as_ref();
        info!("Applying service policy from {:?}", path);

        let file = File::open(path).map_err(|source| PolicyError::ConfigFileUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        self.apply_reader(BufReader::new(file)).map_err(|err| match err {
            PolicyError::ReadInterrupted {
                line, applied, source, ..
            } => PolicyError::ReadInterrupted {
                path: path.to_path_buf(),
                line,
                applied,
                source,
            },
            other => other,
        })
    }

    /// Apply every entry read from `reader`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. A read error part way
    /// through ends the pass with [`PolicyError::ReadInterrupted`], which
    /// carries how many entries were already written.
    pub fn apply_reader<R: BufRead>(&mut self, mut reader: R) -> PolicyResult<ApplyReport> {
        let mut report = ApplyReport {
            dry_run: self.dry_run,
            ..ApplyReport::default()
        };
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = match reader.read_until(b'\n', &mut buf) {
                Ok(read) => read,
                Err(source) => {
                    error!(
                        "Policy read failed after line {}; already applied: {:?}",
                        report.lines_read,
                        report
                            .applied
                            .iter()
                            .map(|e| format!("{}={}", e.service_name, e.mode))
                            .collect::<Vec<_>>()
                    );
                    return Err(PolicyError::ReadInterrupted {
                        path: Default::default(),
                        line: report.lines_read,
                        applied: report.applied.len(),
                        source,
                    });
                }
            };
            if read == 0 {
                break;
            }

            report.lines_read += 1;
            let line_no = report.lines_read;
            let raw = String::from_utf8_lossy(&buf);
            let text: &str = if line_no == 1 {
                raw.trim_start_matches('\u{feff}')
            } else {
                &raw
            };

            self.apply_line(line_no, text, &mut report);
        }

        info!(
            "Service policy pass complete: {} applied, {} failed, {} lines read",
            report.applied.len(),
            report.failures.len(),
            report.lines_read
        );
        Ok(report)
    }

    fn apply_line(&mut self, line_no: usize, text: &str, report: &mut ApplyReport) {
        let entry = match parse_line(line_no, text) {
            Ok(Some(entry)) => entry,
            Ok(None) => return,
            Err(PolicyError::MalformedLine { line }) => {
                debug!("Skipping line {}: no '<service>: <mode>' pair", line);
                report.malformed_lines.push(line);
                return;
            }
            Err(err) => {
                error!("Line {}: {}", line_no, err);
                report.failures.push(failure(line_no, service_of(&err), None, &err));
                return;
            }
        };

        match self.apply_entry(&entry) {
            Ok(()) => report.applied.push(entry),
            Err(err) => {
                error!("Line {}: {}", line_no, err);
                report
                    .failures
                    .push(failure(line_no, entry.service_name.clone(), Some(entry.mode), &err));
            }
        }
    }

    /// Write one entry's start mode to the store.
    ///
    /// The store handle is dropped before this returns.
    pub fn apply_entry(&mut self, entry: &PolicyEntry) -> PolicyResult<()> {
        let service = entry.service_name.as_str();
        if self.dry_run {
            info!("Dry run: resolving service '{}' to '{}'", service, entry.mode);
        } else {
            info!("Setting service '{}' to '{}'", service, entry.mode);
        }

        let mut handle = self
            .store
            .open(service, true)
            .map_err(|err| store_error(service, entry.mode, err))?;

        self.store
            .set_start_mode(&mut handle, entry.mode)
            .map_err(|err| store_error(service, entry.mode, err))?;

        info!("{}", self.applied_message(entry));
        Ok(())
    }

    fn applied_message(&self, entry: &PolicyEntry) -> String {
        if self.dry_run {
            format!(
                "Dry run: service '{}' would be set to {} ({}), nothing written",
                entry.service_name,
                entry.mode,
                entry.mode.code()
            )
        } else {
            format!(
                "Service '{}' start mode set to {} ({})",
                entry.service_name,
                entry.mode,
                entry.mode.code()
            )
        }
    }
}

fn store_error(service: &str, mode: StartMode, err: StoreError) -> PolicyError {
    match err {
        StoreError::NotFound => PolicyError::ServiceNotFound {
            service: service.to_string(),
        },
        StoreError::PermissionDenied(message) => PolicyError::PermissionDenied {
            service: service.to_string(),
            message,
        },
        StoreError::Open(message) => PolicyError::ServiceOpenFailure {
            service: service.to_string(),
            message,
        },
        StoreError::Write(message) => PolicyError::StoreWriteFailure {
            service: service.to_string(),
            mode,
            message,
        },
        StoreError::Unsupported(message) => {
            warn!("Service configuration store unavailable");
            PolicyError::Unsupported(message)
        }
    }
}

fn service_of(err: &PolicyError) -> String {
    match err {
        PolicyError::UnknownStartMode { service, .. }
        | PolicyError::ServiceNotFound { service }
        | PolicyError::PermissionDenied { service, .. }
        | PolicyError::ServiceOpenFailure { service, .. }
        | PolicyError::StoreWriteFailure { service, .. } => service.clone(),
        _ => String::new(),
    }
}

fn failure(line: usize, service_name: String, mode: Option<StartMode>, err: &PolicyError) -> EntryFailure {
    EntryFailure {
        line,
        service_name,
        mode,
        kind: err.kind(),
        message: err.to_string(),
    }
}
