//! Shared test utilities for the galaxy-gpg test suite.
//!
//! The main fixture is [`FakeGpg`], a bash stand-in for the gpg binary.
//! It reads the detached "signature" from stdin and obeys directives
//! embedded in it, one per line:
//!
//! - `STATUS <KEYWORD> <args...>` writes `[GNUPG:] <KEYWORD> <args...>` to the status fd
//! - `STDERR <text>` writes text to stderr
//! - `EXIT <n>` sets the exit code
//! - `SLEEP <secs>` replaces the script with `sleep`
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use galaxy_gpg::galaxy::GpgVerifier;
use tempfile::TempDir;

const FAKE_GPG: &str = r#"#!/usr/bin/env bash
dir=$(dirname "$0")
fd=""
for arg in "$@"; do
    case "$arg" in
        --status-fd=*) fd="${arg#--status-fd=}" ;;
    esac
done
printf '%s\n' "$@" > "$dir/last-args"
cat > "$dir/last-signature"

code=0
while IFS= read -r line; do
    case "$line" in
        "STATUS "*) printf '[GNUPG:] %s\n' "${line#STATUS }" >&"$fd" ;;
        "STDERR "*) printf '%s\n' "${line#STDERR }" >&2 ;;
        "EXIT "*) code="${line#EXIT }" ;;
        "SLEEP "*) exec sleep "${line#SLEEP }" ;;
    esac
done < "$dir/last-signature"

exit "$code"
"#;

/// A scripted gpg binary living in its own temporary directory.
pub struct FakeGpg {
    dir: TempDir,
    executable: PathBuf,
}

impl FakeGpg {
    /// Write the script and make it executable.
    pub fn install() -> Self {
        let dir = TempDir::new().unwrap();
        let executable = dir.path().join("gpg");
        fs::write(&executable, FAKE_GPG).unwrap();
        fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();

        Self { dir, executable }
    }

    pub fn path(&self) -> &Path {
        &self.executable
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Keyring path handed to gpg. The script never opens it.
    pub fn keyring(&self) -> PathBuf {
        self.dir.path().join("pubring.kbx")
    }

    /// A verifier pointed at the script.
    pub fn verifier(&self) -> GpgVerifier {
        GpgVerifier::new(self.keyring()).with_executable(&self.executable)
    }

    /// Write a manifest file and return its path.
    pub fn manifest(&self) -> PathBuf {
        let path = self.dir.path().join("MANIFEST.json");
        fs::write(&path, r#"{"collection_info": {"namespace": "ns", "name": "coll"}}"#).unwrap();
        path
    }

    /// Arguments of the most recent invocation, one per element.
    pub fn last_args(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("last-args"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Stdin of the most recent invocation.
    pub fn last_signature(&self) -> String {
        fs::read_to_string(self.dir.path().join("last-signature")).unwrap()
    }

    /// Write a signature file into the fixture directory.
    pub fn signature_file(&self, name: &str, directives: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, signature(directives)).unwrap();
        path
    }
}

/// Armored-looking signature text carrying fake gpg directives.
pub fn signature(directives: &[&str]) -> String {
    let mut text = String::from("-----BEGIN PGP SIGNATURE-----\n\n");
    for directive in directives {
        text.push_str(directive);
        text.push('\n');
    }
    text.push_str("-----END PGP SIGNATURE-----\n");
    text
}

/// Directives for a signature gpg accepts.
pub fn good_signature() -> String {
    signature(&[
        "STATUS NEWSIG",
        "STATUS GOODSIG 0123456789ABCDEF Galaxy Signer <signer@example.com>",
        "STATUS VALIDSIG 0123456789ABCDEF0123456789ABCDEF01234567",
        "EXIT 0",
    ])
}

/// Directives for a signature made by a key missing from the keyring.
pub fn missing_key_signature() -> String {
    signature(&[
        "STATUS NEWSIG",
        "STATUS ERRSIG ABCDEF0123456789 1 8 00 1700000000 9 -",
        "STATUS NO_PUBKEY ABCDEF0123456789",
        "STATUS FAILURE gpg-exit 33554433",
        "EXIT 2",
    ])
}

/// Directives for a good signature whose key has expired.
pub fn expired_key_signature() -> String {
    signature(&[
        "STATUS NEWSIG",
        "STATUS KEYEXPIRED 1600000000",
        "STATUS EXPKEYSIG 0123456789ABCDEF Old Signer <old@example.com>",
        "EXIT 0",
    ])
}

/// Directives for a signature that does not match the manifest.
pub fn bad_signature() -> String {
    signature(&[
        "STATUS NEWSIG",
        "STATUS BADSIG 0123456789ABCDEF Galaxy Signer <signer@example.com>",
        "EXIT 1",
    ])
}
