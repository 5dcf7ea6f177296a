//! Output formatting module for galaxy-gpg
//!
//! Human output is colored and line oriented; JSON and YAML output print a
//! single document on stdout so it can be piped into other tools.

use anyhow::Result;
use colored::Colorize;
use galaxy_gpg::galaxy::{GpgStatus, SignatureReport, StatusKind};
use serde::Serialize;
use std::io::{self, Write};

use super::OutputFormat;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// Output format
    format: OutputFormat,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: OutputFormat, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            format,
            verbosity,
        }
    }

    /// Whether a machine-readable format was requested
    pub fn is_machine(&self) -> bool {
        matches!(self.format, OutputFormat::Json | OutputFormat::Yaml)
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.is_machine() {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print a serializable document in the selected machine format
    pub fn document<T: Serialize>(&self, value: &T) -> Result<()> {
        let rendered = match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            _ => serde_json::to_string_pretty(value)? + "\n",
        };
        print!("{}", rendered);
        Ok(())
    }

    /// Print one decoded status outcome
    pub fn outcome(&self, status: &GpgStatus) {
        let keyword = status.status();
        let keyword = if !self.use_color {
            keyword.to_string()
        } else if status.is_expiry_warning() {
            keyword.yellow().bold().to_string()
        } else {
            keyword.red().bold().to_string()
        };

        println!("{}", keyword);
        for (name, value) in status.field_values() {
            if self.use_color {
                println!("    {}: {}", name.bright_black(), value);
            } else {
                println!("    {}: {}", name, value);
            }
        }
        if let Some(at) = status.timestamp() {
            println!("    at: {}", at.to_rfc3339());
        }
        println!("    {}", status.description());
    }

    /// Print one registry entry
    pub fn status_kind(&self, kind: StatusKind) {
        let fields: Vec<String> = kind
            .fields()
            .iter()
            .map(|spec| format!("<{}:{}>", spec.name, spec.ty))
            .collect();

        if self.use_color {
            println!("{} {}", kind.keyword().bright_white().bold(), fields.join(" "));
        } else {
            println!("{} {}", kind.keyword(), fields.join(" "));
        }
        println!("    {}", kind.description());
    }

    /// Print a signature verification report
    pub fn signature_report(&self, report: &SignatureReport) {
        for failure in &report.failures {
            if self.verbosity >= 1 || !report.verified {
                eprintln!("{}", failure);
            }
        }

        let line = format!(
            "{}: {}/{} signature(s) verified, {} ignored (requirement {})",
            report.collection, report.successful, report.total, report.ignored, report.requirement
        );

        if report.verified {
            if self.use_color {
                println!("{} {}", "VERIFIED".green().bold(), line);
            } else {
                println!("VERIFIED {}", line);
            }
        } else {
            if self.use_color {
                println!("{} {}", "FAILED".red().bold(), line);
            } else {
                println!("FAILED {}", line);
            }
            if let Some(summary) = &report.summary {
                self.error(summary);
            }
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a hint message
    pub fn hint(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "HINT:".cyan(), message);
        } else {
            eprintln!("HINT: {}", message);
        }
    }

    /// Print an info message (requires -v)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.is_machine() {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
