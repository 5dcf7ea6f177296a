//! Subcommands module for galaxy-gpg CLI
//!
//! This module contains all the subcommand implementations.

pub mod decode;
pub mod status_codes;
pub mod verify;

use crate::cli::output::OutputFormatter;
use anyhow::Result;
use galaxy_gpg::config::Config;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.output, cli.verbosity());

        Self { config, output }
    }
}

/// Trait for runnable commands
#[async_trait::async_trait]
pub trait Runnable {
    /// Execute the command
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32>;
}
