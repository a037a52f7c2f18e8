//! patchtester command-line tool.
//!
//! Integrates requested changes from a source branch into one or more
//! release branches, reports which ones resolve cleanly, and explains the
//! ones that do not. Also generates and validates configuration files.

mod prompt;
mod run;
mod style;
mod summary;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use patchtester_core::config::AppConfig;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Test-integrate pending patches into release branches.
#[derive(Parser, Debug)]
#[command(
    name = "patchtester",
    version,
    about = "Test-integrate requested changes into release branches and diagnose conflicts"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        long,
        global = true,
        default_value = "~/.config/patchtester/config.toml"
    )]
    config: String,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Integrate requested changes and report the outcome.
    Run(RunArgs),

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./patchtester.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Target releases, in integration order (comma separated).
    #[arg(short, long, value_delimiter = ',', required = true)]
    to: Vec<String>,

    /// Source release name, or a depot path such as //depot/streams/dev.
    #[arg(short, long)]
    from: String,

    /// Client workspace to integrate in (defaults to p4.client).
    #[arg(short, long)]
    client: Option<String>,

    /// Test the pending requests of the first target release instead of the accepted ones.
    #[arg(short, long, conflicts_with_all = ["changes", "requests"])]
    pending: bool,

    /// Test these changes directly (comma separated).
    #[arg(short = 'i', long = "changes", value_delimiter = ',', conflicts_with = "requests")]
    changes: Vec<String>,

    /// Test the changes of these requests (comma separated).
    #[arg(short, long, value_delimiter = ',')]
    requests: Vec<String>,

    /// Leave the client dirty: no revert, no changelist deletion.
    #[arg(short, long)]
    dirty: bool,

    /// Answer yes to every confirmation.
    #[arg(short, long)]
    yes: bool,

    /// Write the HTML report to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Do not email the report.
    #[arg(long)]
    no_email: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config_path = expand_tilde(&cli.config);
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&config_path),
        Commands::Run(args) => {
            let config = load_config(&config_path)?;
            run::cmd_run(&config, args).await
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path).context("failed to load configuration file")
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// init / validate
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"# patchtester configuration

[p4]
port = "ssl:perforce.example.com:1666"
user = "builder"
# Environment variable holding the password or ticket.
password_env = "P4PASSWD"
# Client used when --client is not given.
# client = "builder-ws"

# One table per release. `stream_prefix` has no trailing slash.
[releases.dev]
version = "development"
release_name = "Development Branch"
stream_prefix = "//depot/streams/dev"

[releases."1.0"]
version = "1.0"
release_name = "Version 1.0"
stream_prefix = "//depot/streams/v1.0"

[integration]
excluded_components = ["testSpecs", "SCons", "buildMap"]
description_lines = 4

[requests]
# TOML export of patch requests ([[request]] id, release, status, changes).
# file = "/etc/patchtester/requests.toml"

[notifications]
# email_smtp = "smtp.example.com:587"
# email_from = "patchtester@example.com"
# email_domain = "example.com"
# email_recipients = ["release@example.com"]
"#;

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG).context("failed to write config file")?;
    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Edit the releases and the Perforce server details");
    println!("  2. Set the referenced environment variable (P4PASSWD)");
    println!("  3. Validate with: patchtester validate --config {}", output.display());
    println!("  4. Run with: patchtester run --config {} -f dev -t 1.0 -c <client>", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config.resolve_env_vars();
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  P4 port       : {}", or_env(&config.p4.port));
    println!("  P4 user       : {}", or_env(&config.p4.user));
    println!(
        "  P4 password   : {}",
        if config.p4.password.is_some() { "set" } else { "not set" }
    );
    println!("  Client        : {}", config.p4.client.as_deref().unwrap_or("(from --client)"));
    for (name, release) in &config.releases {
        println!("  Release {:<6}: {} ({})", name, release.stream_prefix, release.release_name);
    }
    println!(
        "  Requests file : {}",
        config
            .requests
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not set".into())
    );
    println!(
        "  Report email  : {}",
        if config.notifications.email_smtp.is_some() { "enabled" } else { "disabled" }
    );
    println!();
    println!("{}", style::success("Configuration is valid."));
    Ok(())
}

fn or_env(value: &str) -> &str {
    if value.is_empty() {
        "(from environment)"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, DEFAULT_CONFIG).unwrap();
        let config = AppConfig::load_and_resolve(&path).unwrap();
        assert_eq!(config.integration.description_lines, 4);
        assert_eq!(config.releases.len(), 2);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patchtester.toml");
        cmd_init(&path).unwrap();
        assert!(cmd_init(&path).is_err());
        assert!(cmd_validate(&path).is_ok());
    }

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::parse_from([
            "patchtester", "run", "-f", "dev", "-t", "1.0,2.0", "-c", "ws", "-i", "30,10", "-y",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.to, vec!["1.0", "2.0"]);
        assert_eq!(args.changes, vec!["30", "10"]);
        assert!(args.yes);
        assert!(!args.dirty);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/etc/p.toml"), PathBuf::from("/etc/p.toml"));
    }
}
