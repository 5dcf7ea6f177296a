//! Configuration module for galaxy-gpg
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/galaxy-gpg/config.toml)
//! - User configuration (~/.galaxy-gpg.toml, ~/.config/galaxy-gpg/config.toml)
//! - Project configuration (./galaxy-gpg.toml)
//! - Environment variables
//! - Command-line arguments (applied by the CLI)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::galaxy::gpg::{StatusKind, DEFAULT_GPG_EXECUTABLE};
use crate::galaxy::signature::SignatureCountRequirement;
use crate::galaxy::GalaxyResult;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Signature verification settings
    pub galaxy: GalaxyGpgConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Signature verification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalaxyGpgConfig {
    /// GnuPG binary
    pub gpg_executable: PathBuf,

    /// Keyring holding the trusted public keys
    pub gpg_keyring: Option<PathBuf>,

    /// How long to wait for gpg before killing it (none = wait forever)
    #[serde(with = "humantime_serde")]
    pub gpg_timeout: Option<Duration>,

    /// Required number of valid signatures: a count or "all", optionally "+"-prefixed
    pub required_valid_signature_count: String,

    /// Status codes that do not count as a failed signature
    pub ignore_signature_status_codes: Vec<String>,

    /// Skip signature verification entirely
    pub disable_gpg_verify: bool,
}

impl Default for GalaxyGpgConfig {
    fn default() -> Self {
        Self {
            gpg_executable: PathBuf::from(DEFAULT_GPG_EXECUTABLE),
            gpg_keyring: None,
            gpg_timeout: None,
            required_valid_signature_count: "1".to_string(),
            ignore_signature_status_codes: vec![],
            disable_gpg_verify: false,
        }
    }
}

impl GalaxyGpgConfig {
    /// Parsed form of `required_valid_signature_count`.
    pub fn signature_count(&self) -> GalaxyResult<SignatureCountRequirement> {
        self.required_valid_signature_count.parse()
    }

    /// Parsed form of `ignore_signature_status_codes`.
    pub fn ignored_status_codes(&self) -> GalaxyResult<Vec<StatusKind>> {
        self.ignore_signature_status_codes
            .iter()
            .map(|code| code.parse::<StatusKind>().map_err(Into::into))
            .collect()
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when neither -v nor RUST_LOG is given
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        let explicit = config_path
            .cloned()
            .or_else(|| std::env::var_os("GALAXY_GPG_CONFIG").map(PathBuf::from));

        if let Some(path) = explicit {
            // A named config must be honoured, never silently skipped
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            config = config.merge_from_file(&path)?;
        } else {
            // Load from standard locations
            for path in Self::get_config_paths() {
                if path.exists() {
                    config = config.merge_from_file(&path)?;
                }
            }
        }

        // Apply environment variable overrides
        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System-wide config
        paths.push(PathBuf::from("/etc/galaxy-gpg/config.toml"));

        // User config
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".galaxy-gpg.toml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("galaxy-gpg/config.toml"));
        }

        // Project config (current directory)
        paths.push(PathBuf::from("galaxy-gpg.toml"));

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // Determine format based on extension
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => {
                // Try TOML first, then YAML
                toml::from_str(&content)
                    .or_else(|_| serde_yaml::from_str(&content))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; non-default values in `other` win
    fn merge(&self, other: Config) -> Config {
        let defaults = GalaxyGpgConfig::default();
        let ours = &self.galaxy;
        let theirs = other.galaxy;

        Config {
            galaxy: GalaxyGpgConfig {
                gpg_executable: if theirs.gpg_executable != defaults.gpg_executable {
                    theirs.gpg_executable
                } else {
                    ours.gpg_executable.clone()
                },
                gpg_keyring: theirs.gpg_keyring.or_else(|| ours.gpg_keyring.clone()),
                gpg_timeout: theirs.gpg_timeout.or(ours.gpg_timeout),
                required_valid_signature_count: if theirs.required_valid_signature_count
                    != defaults.required_valid_signature_count
                {
                    theirs.required_valid_signature_count
                } else {
                    ours.required_valid_signature_count.clone()
                },
                ignore_signature_status_codes: if theirs.ignore_signature_status_codes.is_empty()
                {
                    ours.ignore_signature_status_codes.clone()
                } else {
                    theirs.ignore_signature_status_codes
                },
                disable_gpg_verify: theirs.disable_gpg_verify || ours.disable_gpg_verify,
            },
            logging: if other.logging != LoggingConfig::default() {
                other.logging
            } else {
                self.logging.clone()
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // GALAXY_GPG_EXECUTABLE
        if let Ok(executable) = std::env::var("GALAXY_GPG_EXECUTABLE") {
            self.galaxy.gpg_executable = PathBuf::from(executable);
        }

        // ANSIBLE_GALAXY_GPG_KEYRING
        if let Ok(keyring) = std::env::var("ANSIBLE_GALAXY_GPG_KEYRING") {
            self.galaxy.gpg_keyring = Some(PathBuf::from(keyring));
        }

        // GALAXY_GPG_TIMEOUT (seconds)
        if let Ok(timeout) = std::env::var("GALAXY_GPG_TIMEOUT") {
            let secs: u64 = timeout.trim().parse().with_context(|| {
                format!("GALAXY_GPG_TIMEOUT must be a whole number of seconds, got '{}'", timeout)
            })?;
            self.galaxy.gpg_timeout = Some(Duration::from_secs(secs));
        }

        // ANSIBLE_GALAXY_REQUIRED_VALID_SIGNATURE_COUNT
        if let Ok(count) = std::env::var("ANSIBLE_GALAXY_REQUIRED_VALID_SIGNATURE_COUNT") {
            self.galaxy.required_valid_signature_count = count;
        }

        // ANSIBLE_GALAXY_IGNORE_SIGNATURE_STATUS_CODES
        if let Ok(codes) = std::env::var("ANSIBLE_GALAXY_IGNORE_SIGNATURE_STATUS_CODES") {
            self.galaxy.ignore_signature_status_codes = split_list(&codes);
        }

        // ANSIBLE_GALAXY_DISABLE_GPG_VERIFY
        if let Ok(value) = std::env::var("ANSIBLE_GALAXY_DISABLE_GPG_VERIFY") {
            self.galaxy.disable_gpg_verify = is_truthy(&value);
        }

        // GALAXY_GPG_LOG_LEVEL
        if let Ok(level) = std::env::var("GALAXY_GPG_LOG_LEVEL") {
            self.logging.log_level = level;
        }

        Ok(())
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
