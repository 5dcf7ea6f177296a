//! GnuPG signature verification
//!
//! Two pieces, leaf first:
//!
//! - [`verify`]: runs `gpg --verify` over a detached signature with a
//!   private status pipe and returns the raw status stream plus exit code.
//! - [`status`]: decodes that stream into typed [`GpgStatus`] outcomes.
//!
//! Neither piece decides whether a signature is trusted; see
//! [`crate::galaxy::signature`] for the policy built on top.

pub mod status;
pub mod verify;

pub use status::{
    decode_line, decode_status, status_registry, FieldSpec, FieldType, GpgStatus,
    StatusDecodeError, StatusDecoder, StatusFieldError, StatusKind, UnknownStatusKeyword,
};
pub use verify::{run_gpg_verify, GpgRunOutput, GpgVerifier, DEFAULT_GPG_EXECUTABLE};
