//! Decode command - inspect a captured status stream
//!
//! Reads the text gpg wrote to its `--status-fd` descriptor from a file or
//! stdin and prints the recognised outcomes.

use super::{CommandContext, Runnable};
use anyhow::{Context, Result};
use clap::Parser;
use galaxy_gpg::galaxy::{decode_status, GpgStatus};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

/// Arguments for the decode command
#[derive(Parser, Debug, Clone)]
pub struct DecodeArgs {
    /// Status stream file ("-" or omitted for stdin)
    pub file: Option<PathBuf>,
}

impl DecodeArgs {
    /// Execute the decode command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let input = match &self.file {
            Some(path) if path.as_os_str() != "-" => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read status file {}", path.display()))?,
            _ => {
                let mut buffer = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut buffer)
                    .await
                    .context("Failed to read status stream from stdin")?;
                buffer
            }
        };
        let text = String::from_utf8_lossy(&input);

        let outcomes = match decode_status(&text).collect::<Result<Vec<GpgStatus>, _>>() {
            Ok(outcomes) => outcomes,
            Err(e) => {
                ctx.output.error(&e.to_string());
                return Ok(1);
            }
        };

        if ctx.output.is_machine() {
            ctx.output.document(&outcomes)?;
        } else if outcomes.is_empty() {
            ctx.output.info("No recognised status lines");
        } else {
            ctx.output.section(&format!("{} outcome(s)", outcomes.len()));
            for outcome in &outcomes {
                ctx.output.outcome(outcome);
            }
        }
        ctx.output.flush();

        Ok(0)
    }
}

#[async_trait::async_trait]
impl Runnable for DecodeArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}
