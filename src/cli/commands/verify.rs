//! Verify command - check collection signatures
//!
//! This module implements the `verify` subcommand, which runs gpg over every
//! supplied detached signature and applies the configured signature policy.

use super::{CommandContext, Runnable};
use anyhow::{Context, Result};
use clap::Parser;
use galaxy_gpg::galaxy::{CollectionSignatureChecker, GalaxyError};
use std::path::PathBuf;
use std::time::Duration;

/// Arguments for the verify command
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// Path to the collection manifest (MANIFEST.json)
    #[arg(long, short = 'm')]
    pub manifest: PathBuf,

    /// Detached ASCII-armored signature files
    #[arg(long, short = 's', required = true, action = clap::ArgAction::Append)]
    pub signature: Vec<PathBuf>,

    /// Keyring holding the trusted public keys
    #[arg(long, short = 'k')]
    pub keyring: Option<PathBuf>,

    /// Collection name used in reports (defaults to the manifest path)
    #[arg(long)]
    pub collection: Option<String>,

    /// Required valid signature count: N, +N, all or +all
    #[arg(long)]
    pub required_valid_signature_count: Option<String>,

    /// GnuPG status code whose failures are ignored
    #[arg(long, action = clap::ArgAction::Append)]
    pub ignore_signature_status_code: Vec<String>,

    /// Path to the gpg executable
    #[arg(long)]
    pub gpg: Option<PathBuf>,

    /// Kill gpg after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl VerifyArgs {
    /// Execute the verify command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut settings = ctx.config.galaxy.clone();

        if settings.disable_gpg_verify {
            ctx.output.warning(
                "Signature verification is disabled (disable_gpg_verify); skipping GnuPG checks",
            );
            return Ok(0);
        }

        if let Some(keyring) = &self.keyring {
            settings.gpg_keyring = Some(keyring.clone());
        }
        if let Some(gpg) = &self.gpg {
            settings.gpg_executable = gpg.clone();
        }
        if let Some(secs) = self.timeout {
            settings.gpg_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(count) = &self.required_valid_signature_count {
            settings.required_valid_signature_count = count.clone();
        }
        settings
            .ignore_signature_status_codes
            .extend(self.ignore_signature_status_code.iter().cloned());

        let checker = match CollectionSignatureChecker::from_config(&settings) {
            Ok(checker) => checker,
            Err(e) => return Ok(report_error(ctx, &e)),
        };

        let mut signatures = Vec::with_capacity(self.signature.len());
        for path in &self.signature {
            let signature = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read signature file {}", path.display()))?;
            signatures.push(signature);
        }

        let collection = self
            .collection
            .clone()
            .unwrap_or_else(|| self.manifest.display().to_string());

        ctx.output.info(&format!(
            "Verifying {} signature(s) for {} with keyring {}",
            signatures.len(),
            collection,
            checker.verifier().keyring().display()
        ));

        let report = match checker.verify(&collection, &self.manifest, signatures.as_slice()).await {
            Ok(report) => report,
            Err(e) => return Ok(report_error(ctx, &e)),
        };

        if ctx.output.is_machine() {
            ctx.output.document(&report)?;
        } else {
            ctx.output.signature_report(&report);
        }
        ctx.output.flush();

        Ok(if report.verified { 0 } else { 1 })
    }
}

fn report_error(ctx: &CommandContext, error: &GalaxyError) -> i32 {
    ctx.output.error(&error.to_string());
    ctx.output.hint(&error.hint());
    1
}

#[async_trait::async_trait]
impl Runnable for VerifyArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}
