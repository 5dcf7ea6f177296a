//! Running `gpg --verify` over a detached signature
//!
//! GnuPG writes its machine-readable status lines to a file descriptor named
//! on the command line (`--status-fd=N`). We create a pipe for that, let only
//! the gpg child inherit the write end, feed the signature on stdin and read
//! the status stream back once gpg is done with it.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::unistd::pipe2;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, trace};

use super::status::{decode_status, StatusDecoder};
use crate::config::GalaxyGpgConfig;
use crate::galaxy::error::{GalaxyError, GalaxyResult};

/// Executable used when none is configured.
pub const DEFAULT_GPG_EXECUTABLE: &str = "gpg";

/// What a single `gpg --verify` run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpgRunOutput {
    /// Raw text written to the status descriptor
    pub status: String,
    /// Process exit code (-1 if gpg was killed by a signal)
    pub exit_code: i32,
}

impl GpgRunOutput {
    /// Decode the captured status stream.
    pub fn outcomes(&self) -> StatusDecoder<'_> {
        decode_status(&self.status)
    }

    /// Whether gpg exited with status 0. Not sufficient on its own: an
    /// expired signature still exits 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs GnuPG against an explicit keyring.
#[derive(Debug, Clone)]
pub struct GpgVerifier {
    executable: PathBuf,
    keyring: PathBuf,
    timeout: Option<Duration>,
}

impl GpgVerifier {
    /// Create a verifier that trusts only the keys in `keyring`.
    pub fn new(keyring: impl Into<PathBuf>) -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_GPG_EXECUTABLE),
            keyring: keyring.into(),
            timeout: None,
        }
    }

    /// Build a verifier from configuration.
    pub fn from_config(config: &GalaxyGpgConfig) -> GalaxyResult<Self> {
        let keyring = config
            .gpg_keyring
            .clone()
            .ok_or(GalaxyError::MissingKeyring)?;

        Ok(Self::new(keyring)
            .with_executable(&config.gpg_executable)
            .with_timeout(config.gpg_timeout))
    }

    /// Use a different gpg binary.
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Kill gpg if it has not finished after `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn keyring(&self) -> &Path {
        &self.keyring
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Arguments passed to gpg, status descriptor first.
    pub fn command_args(&self, status_fd: RawFd, manifest: &Path) -> Vec<OsString> {
        let mut keyring = OsString::from("--keyring=");
        keyring.push(&self.keyring);

        vec![
            OsString::from(format!("--status-fd={}", status_fd)),
            OsString::from("--verify"),
            OsString::from("--batch"),
            OsString::from("--no-tty"),
            OsString::from("--no-default-keyring"),
            keyring,
            // detached signature comes from stdin
            OsString::from("-"),
            manifest.as_os_str().to_owned(),
        ]
    }

    fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.executable.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Verify `signature` (ASCII-armored, detached) over `manifest`.
    ///
    /// Returns the raw status stream and exit code. The manifest must
    /// already exist; gpg reports a missing file through its own status.
    pub async fn verify(&self, manifest: &Path, signature: &str) -> GalaxyResult<GpgRunOutput> {
        // Both ends are close-on-exec; the child clears the flag on its copy
        // of the write end so no other process ever holds it.
        let (status_read, status_write) = pipe2(OFlag::O_CLOEXEC).map_err(|errno| {
            GalaxyError::gpg_io("Failed to create GnuPG status pipe", io::Error::from(errno))
        })?;
        let status_fd = status_write.as_raw_fd();

        let args = self.command_args(status_fd, manifest);
        let command_line = self.command_line(&args);
        debug!(command = %command_line, "Running GnuPG signature verification");

        let mut cmd = Command::new(&self.executable);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // SAFETY: fcntl is async-signal-safe and only touches the child's
        // descriptor table.
        unsafe {
            cmd.pre_exec(move || {
                fcntl(status_fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
                Ok(())
            });
        }

        let spawned = cmd.spawn();
        // The read end only sees EOF once every write end is closed, ours included.
        drop(status_write);
        let mut child = spawned.map_err(|source| GalaxyError::GpgSpawn {
            command: command_line.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let feed_signature = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(signature.as_bytes()).await {
                    Ok(()) => {}
                    // gpg may bail out before reading all of its input
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        trace!("GnuPG closed stdin before reading the whole signature");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        };

        let mut status_pipe = tokio::fs::File::from_std(File::from(status_read));
        let read_status = async move {
            let mut buf = Vec::new();
            status_pipe.read_to_end(&mut buf).await?;
            Ok::<_, io::Error>(buf)
        };

        let run = async move { tokio::join!(feed_signature, child.wait_with_output(), read_status) };

        let (fed, output, status) = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, run).await.map_err(|_| {
                GalaxyError::GpgTimeout {
                    command: command_line.clone(),
                    timeout,
                }
            })?,
            None => run.await,
        };

        fed.map_err(|e| GalaxyError::gpg_io("Failed to write signature to GnuPG", e))?;
        let output = output.map_err(|e| GalaxyError::gpg_io("Failed to wait for GnuPG", e))?;
        let status = status.map_err(|e| GalaxyError::gpg_io("Failed to read GnuPG status output", e))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let status = String::from_utf8_lossy(&status).into_owned();

        trace!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "GnuPG output"
        );
        debug!(exit_code = %exit_code, status = %status, "GnuPG verification finished");

        Ok(GpgRunOutput { status, exit_code })
    }
}

/// Verify `signature` over `manifest` with the default gpg binary and no
/// timeout. Returns the raw status stream and exit code.
pub async fn run_gpg_verify(
    manifest: &Path,
    signature: &str,
    keyring: &Path,
) -> GalaxyResult<(String, i32)> {
    let output = GpgVerifier::new(keyring).verify(manifest, signature).await?;
    Ok((output.status, output.exit_code))
}
