//! galaxy-gpg - GnuPG signature verification for Ansible Galaxy collections
//!
//! This is the main entry point for the galaxy-gpg CLI.

mod cli;

use anyhow::{Context, Result};
use cli::commands::{CommandContext, Runnable};
use cli::{Cli, Commands};
use galaxy_gpg::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration before logging so its level can be the fallback.
    // A config that cannot be loaded is fatal.
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    init_logging(cli.verbosity(), &config.logging.log_level);

    // Display version if verbose
    if cli.verbosity() >= 2 {
        eprintln!("galaxy-gpg v{}", VERSION);
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Verify(args) => args.run(&mut ctx).await?,
        Commands::Decode(args) => args.run(&mut ctx).await?,
        Commands::StatusCodes(args) => args.run(&mut ctx).await?,
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
///
/// `RUST_LOG` wins; otherwise `-v` flags pick the level and the configured
/// level applies when none are given.
fn init_logging(verbosity: u8, configured: &str) {
    let filter = match verbosity {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 3),
        )
        .with(env_filter)
        .init();
}
