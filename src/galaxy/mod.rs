//! Ansible Galaxy Signature Support Module
//!
//! This module verifies detached GnuPG signatures over Galaxy collection
//! manifests. It is split into:
//!
//! - **GnuPG invocation**: run `gpg --verify` with a private status pipe
//! - **Status decoding**: turn gpg's `--status-fd` stream into typed outcomes
//! - **Signature policy**: decide whether enough signatures verified
//!
//! # Architecture
//!
//! ```text
//! +----------------------------+
//! | CollectionSignatureChecker |  configured policy
//! +----------------------------+
//!              |
//!              v
//! +----------------------------+
//! |  verify_file_signatures    |  count requirement, ignored codes
//! +----------------------------+
//!              |
//!              v
//! +-------------------+     +-------------------+
//! |   GpgVerifier     | --> |  StatusDecoder    |
//! +-------------------+     +-------------------+
//!   gpg --status-fd=N          [GNUPG:] lines
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use galaxy_gpg::galaxy::{CollectionSignatureChecker, GpgVerifier};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let checker = CollectionSignatureChecker::new(GpgVerifier::new("pubring.kbx"));
//!     let signature = std::fs::read_to_string("MANIFEST.json.asc")?;
//!
//!     let report = checker
//!         .verify("community.general", "MANIFEST.json".as_ref(), &[signature])
//!         .await?;
//!     assert!(report.verified);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod gpg;
pub mod signature;

pub use error::{GalaxyError, GalaxyResult};
pub use gpg::{
    decode_status, run_gpg_verify, GpgRunOutput, GpgStatus, GpgVerifier, StatusDecoder,
    StatusKind,
};
pub use signature::{
    verify_file_signature, verify_file_signatures, RequiredSignatures, SignatureCountRequirement,
    SignatureFailure, SignatureReport,
};

use std::path::Path;

use crate::config::GalaxyGpgConfig;

/// Verifies collection signatures with a fixed policy.
///
/// Bundles a [`GpgVerifier`] with the required signature count and the
/// status codes to ignore, so callers only pass the collection at hand.
#[derive(Debug, Clone)]
pub struct CollectionSignatureChecker {
    /// The GnuPG runner
    verifier: GpgVerifier,
    /// How many signatures must verify
    requirement: SignatureCountRequirement,
    /// Status codes that do not count as a failure
    ignore_codes: Vec<StatusKind>,
}

impl CollectionSignatureChecker {
    /// Create a checker requiring one valid signature and ignoring nothing.
    pub fn new(verifier: GpgVerifier) -> Self {
        Self {
            verifier,
            requirement: SignatureCountRequirement::default(),
            ignore_codes: Vec::new(),
        }
    }

    /// Create a checker from configuration.
    pub fn from_config(config: &GalaxyGpgConfig) -> GalaxyResult<Self> {
        Ok(Self {
            verifier: GpgVerifier::from_config(config)?,
            requirement: config.signature_count()?,
            ignore_codes: config.ignored_status_codes()?,
        })
    }

    /// Set the required signature count.
    pub fn with_requirement(mut self, requirement: SignatureCountRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// Set the status codes to ignore.
    pub fn with_ignored_codes(mut self, codes: impl IntoIterator<Item = StatusKind>) -> Self {
        self.ignore_codes = codes.into_iter().collect();
        self
    }

    /// Get the underlying verifier.
    pub fn verifier(&self) -> &GpgVerifier {
        &self.verifier
    }

    /// Get the required signature count.
    pub fn requirement(&self) -> SignatureCountRequirement {
        self.requirement
    }

    /// Get the ignored status codes.
    pub fn ignored_codes(&self) -> &[StatusKind] {
        &self.ignore_codes
    }

    /// Verify `signatures` of `collection` over its `manifest`.
    pub async fn verify<S: AsRef<str>>(
        &self,
        collection: &str,
        manifest: &Path,
        signatures: &[S],
    ) -> GalaxyResult<SignatureReport> {
        verify_file_signatures(
            &self.verifier,
            collection,
            manifest,
            signatures,
            self.requirement,
            &self.ignore_codes,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_checker_from_config() {
        let config = GalaxyGpgConfig {
            gpg_keyring: Some(PathBuf::from("/keys/ring.kbx")),
            required_valid_signature_count: "+all".to_string(),
            ignore_signature_status_codes: vec!["NO_PUBKEY".to_string()],
            ..GalaxyGpgConfig::default()
        };

        let checker = CollectionSignatureChecker::from_config(&config).unwrap();
        assert!(checker.requirement().strict);
        assert_eq!(checker.requirement().required, RequiredSignatures::All);
        assert_eq!(checker.ignored_codes(), &[StatusKind::NoPubkey]);
    }

    #[test]
    fn test_checker_from_config_rejects_bad_count() {
        let config = GalaxyGpgConfig {
            gpg_keyring: Some(PathBuf::from("/keys/ring.kbx")),
            required_valid_signature_count: "several".to_string(),
            ..GalaxyGpgConfig::default()
        };

        assert!(matches!(
            CollectionSignatureChecker::from_config(&config),
            Err(GalaxyError::InvalidSignatureCount { .. })
        ));
    }

    #[test]
    fn test_checker_defaults() {
        let checker = CollectionSignatureChecker::new(GpgVerifier::new("ring.kbx"))
            .with_ignored_codes([StatusKind::KeyExpired]);
        assert_eq!(checker.requirement(), SignatureCountRequirement::default());
        assert_eq!(checker.ignored_codes(), &[StatusKind::KeyExpired]);
        assert_eq!(checker.verifier().keyring(), Path::new("ring.kbx"));
    }
}
