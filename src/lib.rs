//! # galaxy-gpg - GnuPG Signature Verification for Ansible Galaxy
//!
//! Verifies detached GnuPG signatures over Galaxy collection manifests by
//! driving the `gpg` binary and decoding its machine-readable status stream.
//! No cryptography happens in this crate; trust decisions are GnuPG's, and
//! this crate reports them as typed data.
//!
//! ## Core Concepts
//!
//! - **Status stream**: the `[GNUPG:] KEYWORD args...` lines gpg writes to `--status-fd`
//! - **Outcomes**: one typed [`GpgStatus`](galaxy::GpgStatus) per recognised status line
//! - **Status registry**: the fixed set of keywords that are decoded; others are skipped
//! - **Signature policy**: how many signatures must verify and which status codes to ignore
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                              │
//! │                    (clap-based command parsing)                      │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Signature Policy                             │
//! │             (required count, ignored status codes)                   │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                   ┌────────────────┴────────────────┐
//!                   ▼                                 ▼
//! ┌─────────────────────────────────┐   ┌─────────────────────────────────┐
//! │          GpgVerifier            │──▶│         StatusDecoder           │
//! │  (gpg --verify, status pipe)    │   │  (registry lookup, coercion)    │
//! └─────────────────────────────────┘   └─────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust
//! use galaxy_gpg::prelude::*;
//!
//! let status = "[GNUPG:] NEWSIG\n[GNUPG:] NO_PUBKEY ABCDEF0123456789\n";
//! let outcomes: Vec<GpgStatus> = decode_status(status).collect::<Result<_, _>>().unwrap();
//!
//! assert_eq!(outcomes.len(), 1);
//! assert_eq!(outcomes[0].status(), "NO_PUBKEY");
//! assert_eq!(outcomes[0].key_id(), Some("ABCDEF0123456789"));
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types.
    //!
    //! - **Invocation**: [`GpgVerifier`] and its [`GpgRunOutput`]
    //! - **Decoding**: [`decode_status`], [`GpgStatus`], [`StatusKind`]
    //! - **Policy**: [`CollectionSignatureChecker`] and friends
    //! - **Errors**: [`GalaxyError`] and [`GalaxyResult`]

    // Configuration
    pub use crate::config::{Config, GalaxyGpgConfig};

    // Errors
    pub use crate::galaxy::{GalaxyError, GalaxyResult};

    // GnuPG invocation and decoding
    pub use crate::galaxy::gpg::{
        decode_status, GpgRunOutput, GpgStatus, GpgVerifier, StatusDecodeError, StatusKind,
    };

    // Signature policy
    pub use crate::galaxy::{
        CollectionSignatureChecker, SignatureCountRequirement, SignatureFailure, SignatureReport,
    };
}

/// Configuration loading and merging.
///
/// Reads TOML, YAML or JSON files from the standard locations and applies
/// the `ANSIBLE_GALAXY_*` / `GALAXY_GPG_*` environment overrides.
pub mod config;

/// GnuPG signature verification for Galaxy collections.
///
/// Contains the gpg runner, the status decoder and the signature policy.
pub mod galaxy;
