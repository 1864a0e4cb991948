use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use log::{debug, error, info, warn};
use service_policy::{
    ApplyReport, Config, MemoryStore, PolicyApplier, PolicyResult, RegistryStore, ServiceConfigStore,
};

/// Full pass completed, whatever happened to individual lines
const EXIT_OK: u8 = 0;
/// Policy file could not be opened or read
const EXIT_POLICY_UNAVAILABLE: u8 = 1;
/// Bad command line or environment
const EXIT_USAGE: u8 = 2;

fn print_help(program: &str) {
    println!("policy-apply - Apply a service start-mode policy");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("\nUsage: {} [OPTIONS] [config-path]\n", program);
    println!("Arguments:");
    println!("  config-path       Policy file to apply (default: service-policy.cfg)");
    println!("\nOptions:");
    println!("  --help, -h        Show this help message");
    println!("  --version, -v     Show version information");
    println!("  --dry-run         Log what would be written without touching the registry");
    println!("  --json            Print the run report as JSON");
    println!("  --debug           Enable debug logging");
    println!("\nPolicy file format:");
    println!("  # comment");
    println!("  <service-name>: <automatic|manual|disabled>");
    println!("\nEnvironment Variables:");
    println!("  SERVICE_POLICY_FILE=<path>          Policy file when no path argument is given");
    println!("  SERVICE_POLICY_DRY_RUN=<true|false> Enable dry-run mode");
    println!("  RUST_LOG=<level>                    Set log level (error|warn|info|debug)");
    println!("\nExit codes: 0 pass completed, 1 policy file unavailable, 2 usage error");
}

/// Apply command-line flags on top of the environment configuration
fn apply_args(config: &mut Config, args: &[String]) -> Result<()> {
    let mut policy_path: Option<PathBuf> = None;

    for arg in args {
        match arg.as_str() {
            "--dry-run" => config.dry_run = true,
            "--json" => config.json_report = true,
            "--debug" => config.log_level = "debug".to_string(),
            flag if flag.starts_with('-') => bail!("Unknown option: {}", flag),
            path => {
                if policy_path.is_some() {
                    bail!("Unexpected extra argument: {}", path);
                }
                policy_path = Some(PathBuf::from(path));
            }
        }
    }

    if let Some(path) = policy_path {
        config.policy_path = path;
    }
    Ok(())
}

fn apply_with<S: ServiceConfigStore>(store: S, config: &Config) -> PolicyResult<ApplyReport> {
    PolicyApplier::new(store)
        .with_dry_run(config.dry_run)
        .apply_file(&config.policy_path)
}

/// Run one pass with the store `config` selects; a dry run never opens the registry
fn apply_configured(config: &Config) -> PolicyResult<ApplyReport> {
    if config.dry_run {
        info!("Dry run: no service configuration will be changed");
        apply_with(MemoryStore::accept_all(), config)
    } else {
        apply_with(RegistryStore::new(), config)
    }
}

/// Apply the configured policy and map the outcome to an exit code
fn run_with(config: &Config) -> u8 {
    let report = match apply_configured(config) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return EXIT_POLICY_UNAVAILABLE;
        }
    };

    if !report.is_clean() {
        warn!("{} policy entries could not be applied", report.failures.len());
    }

    if config.json_report {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize run report: {}", e),
        }
    }

    EXIT_OK
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("policy-apply");
    let rest = args.get(1..).unwrap_or_default();

    if rest.iter().any(|a| a == "--help" || a == "-h") {
        print_help(program);
        return ExitCode::from(EXIT_OK);
    }
    if rest.iter().any(|a| a == "--version" || a == "-v") {
        println!("policy-apply {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::from(EXIT_OK);
    }

    let config = Config::load().and_then(|mut config| {
        apply_args(&mut config, rest)?;
        Ok(config)
    });
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Use --help for usage.");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .target(env_logger::Target::Stdout)
        .init();

    debug!("Command line args: {:?}", args);
    debug!("Configuration: {:?}", config);

    ExitCode::from(run_with(&config))
}
