//! Status codes command - list the status registry

use super::{CommandContext, Runnable};
use anyhow::Result;
use clap::Parser;
use galaxy_gpg::galaxy::StatusKind;
use serde::Serialize;

/// Arguments for the status-codes command
#[derive(Parser, Debug, Clone)]
pub struct StatusCodesArgs {}

#[derive(Serialize)]
struct StatusCodeEntry {
    keyword: &'static str,
    fields: Vec<&'static str>,
    description: String,
}

impl StatusCodesArgs {
    /// Execute the status-codes command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        if ctx.output.is_machine() {
            let entries: Vec<StatusCodeEntry> = StatusKind::ALL
                .iter()
                .map(|kind| StatusCodeEntry {
                    keyword: kind.keyword(),
                    fields: kind.fields().iter().map(|spec| spec.name).collect(),
                    description: kind.description(),
                })
                .collect();
            ctx.output.document(&entries)?;
        } else {
            ctx.output.section("GnuPG status codes");
            for kind in StatusKind::ALL {
                ctx.output.status_kind(kind);
            }
        }
        ctx.output.flush();

        Ok(0)
    }
}

#[async_trait::async_trait]
impl Runnable for StatusCodesArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}
