//! Error types for the Galaxy signature module.
//!
//! Covers failures to run GnuPG, malformed status output, and signature
//! rejections raised by the verification policy.

use std::time::Duration;

use thiserror::Error;

use super::gpg::{StatusDecodeError, UnknownStatusKeyword};
use super::signature::SignatureFailure;

/// Result type alias for Galaxy signature operations.
pub type GalaxyResult<T> = Result<T, GalaxyError>;

/// Error type for Galaxy signature operations.
#[derive(Error, Debug)]
pub enum GalaxyError {
    // ========================================================================
    // GnuPG Process Errors
    // ========================================================================

    /// GnuPG could not be started.
    #[error("Failed during GnuPG verification with command '{command}': {source}")]
    GpgSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// GnuPG did not finish in time and was killed.
    #[error("GnuPG verification with command '{command}' timed out after {}", humantime_duration(.timeout))]
    GpgTimeout { command: String, timeout: Duration },

    /// Talking to the GnuPG process failed.
    #[error("{message}: {source}")]
    GpgIo {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// No keyring was configured.
    #[error("No GnuPG keyring configured for signature verification")]
    MissingKeyring,

    // ========================================================================
    // Status Errors
    // ========================================================================

    /// A registered status line could not be decoded.
    #[error(transparent)]
    StatusDecode(#[from] StatusDecodeError),

    /// A status code given in configuration is not registered.
    #[error(transparent)]
    UnknownStatusCode(#[from] UnknownStatusKeyword),

    // ========================================================================
    // Policy Errors
    // ========================================================================

    /// GnuPG rejected the signature.
    #[error("{0}")]
    SignatureRejected(SignatureFailure),

    /// Invalid required signature count.
    #[error("Invalid required signature count '{value}': {reason}")]
    InvalidSignatureCount { value: String, reason: String },

    // ========================================================================
    // IO Errors
    // ========================================================================

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn humantime_duration(timeout: &Duration) -> String {
    humantime_serde::re::humantime::format_duration(*timeout).to_string()
}

impl GalaxyError {
    /// Create an IO error for the GnuPG process.
    pub fn gpg_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::GpgIo {
            message: message.into(),
            source,
        }
    }

    /// Create an invalid signature count error.
    pub fn invalid_signature_count(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSignatureCount {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is a signature rejection rather than an
    /// environment or parsing failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, GalaxyError::SignatureRejected(_))
    }

    /// Get a hint for resolving the error.
    pub fn hint(&self) -> String {
        match self {
            GalaxyError::GpgSpawn { .. } => {
                "Make sure GnuPG is installed, or point 'gpg_executable' (GALAXY_GPG_EXECUTABLE) at the gpg binary.".to_string()
            }
            GalaxyError::GpgTimeout { timeout, .. } => {
                format!(
                    "GnuPG did not finish within {}. Check for a hung gpg-agent or raise 'gpg_timeout'.",
                    humantime_duration(timeout)
                )
            }
            GalaxyError::MissingKeyring => {
                "Pass --keyring or set ANSIBLE_GALAXY_GPG_KEYRING to a keyring containing the trusted public keys.".to_string()
            }
            GalaxyError::StatusDecode(_) => {
                "GnuPG produced status output in an unexpected format. Check the installed GnuPG version.".to_string()
            }
            GalaxyError::UnknownStatusCode(err) => {
                format!(
                    "Use 'galaxy-gpg status-codes' to list the status codes that can be ignored ({}).",
                    err.0
                )
            }
            GalaxyError::InvalidSignatureCount { .. } => {
                "Use a positive number or 'all', optionally prefixed with '+' (e.g. '1', '+2', '+all').".to_string()
            }
            GalaxyError::SignatureRejected(failure) if failure.reasons.is_empty() => {
                "GnuPG failed without a recognised status. Re-run with -vvv to see its output.".to_string()
            }
            _ => "Check the error message for details.".to_string(),
        }
    }
}
