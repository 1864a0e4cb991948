use std::io::Write;

use service_policy::{MemoryStore, PolicyApplier, PolicyError, StartMode};
use tempfile::NamedTempFile;

fn policy_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_hardening_policy_file() {
    let file = policy_file(
        "# Qubes hardening defaults\n\
         wuauserv: disabled\n\
         Spooler:manual\n\
         \n\
         BadService: flying\n\
         WinRM: AUTOMATIC\n\
         garbage line\n\
         NoSuchService: disabled\n",
    );

    let store = MemoryStore::new()
        .with_service("wuauserv")
        .with_service("Spooler")
        .with_service("WinRM");
    let mut applier = PolicyApplier::new(store);
    let report = applier.apply_file(file.path()).unwrap();
    let store = applier.into_store();

    assert_eq!(report.lines_read, 8);
    assert_eq!(report.malformed_lines, vec![7]);
    assert_eq!(
        report.applied.iter().map(|e| e.service_name.as_str()).collect::<Vec<_>>(),
        vec!["wuauserv", "Spooler", "WinRM"]
    );

    let failures: Vec<_> = report
        .failures
        .iter()
        .map(|f| (f.line, f.service_name.as_str(), f.kind))
        .collect();
    assert_eq!(
        failures,
        vec![
            (5, "BadService", "UnknownStartMode"),
            (8, "NoSuchService", "ServiceNotFound"),
        ]
    );

    assert_eq!(store.start_mode("wuauserv"), Some(StartMode::Disabled));
    assert_eq!(store.start_mode("Spooler"), Some(StartMode::Manual));
    assert_eq!(store.start_mode("WinRM"), Some(StartMode::Automatic));
    assert!(!store.opens().iter().any(|name| name == "BadService"));
}

#[test]
fn test_missing_policy_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service-policy.cfg");

    let mut applier = PolicyApplier::new(MemoryStore::accept_all());
    match applier.apply_file(&path) {
        Err(PolicyError::ConfigFileUnavailable { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected ConfigFileUnavailable, got {:?}", other),
    }
    assert!(applier.store().opens().is_empty());
    assert!(applier.store().writes().is_empty());
}

#[cfg(not(target_os = "windows"))]
#[test]
fn test_registry_store_reports_unsupported_per_entry() {
    use service_policy::RegistryStore;

    let file = policy_file("wuauserv: disabled\nSpooler: manual\n");
    let mut applier = PolicyApplier::new(RegistryStore::new());
    let report = applier.apply_file(file.path()).unwrap();

    assert!(report.applied.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.kind == "Unsupported"));
}
