//! Crypto backend driving the `gpg` binary against the local keyring.
//!
//! Key listing uses `--with-colons` machine output; verification judges the
//! `--status-fd` stream, where a `VALIDSIG` record carries the signer's full
//! fingerprint. No network key lookup is performed.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::Stdio;

use super::{SignatureBackend, Verification};
use crate::Error;

const STATUS_VALIDSIG: &str = "[GNUPG:] VALIDSIG ";

/// GPG-compatible signature backend.
#[derive(Debug, Clone)]
pub struct Gpg {
    program: PathBuf,
}

impl Default for Gpg {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gpg"),
        }
    }
}

impl Gpg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different gpg executable, e.g. `gpg2`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run gpg with `args`, feeding `stdin_data` if given, and collect
    /// (success, stdout).
    fn run(&self, args: &[&str], stdin_data: Option<&[u8]>) -> Result<(bool, Vec<u8>), Error> {
        let mut child = gix_command::prepare(&self.program)
            .args(args.iter().copied())
            .stdin(if stdin_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::Verify(format!("failed to spawn '{}': {e}", self.program.display()))
            })?;

        if let Some(data) = stdin_data {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(data).map_err(Error::Io)?;
                // Close stdin to signal EOF.
                drop(stdin);
            }
        }

        let mut stdout = Vec::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_end(&mut stdout).map_err(Error::Io)?;
        }
        let status = child.wait().map_err(Error::Io)?;
        Ok((status.success(), stdout))
    }
}

impl SignatureBackend for Gpg {
    fn matching_keys(&self, key_id: &str) -> Result<Vec<String>, Error> {
        let (success, stdout) = self.run(
            &[
                "--batch",
                "--with-colons",
                "--fingerprint",
                "--list-keys",
                key_id,
            ],
            None,
        )?;
        // gpg exits non-zero when nothing matches; that is an empty result,
        // not a backend failure.
        if !success {
            return Ok(Vec::new());
        }

        let mut fingerprints = Vec::new();
        let mut primary_pending = false;
        for line in String::from_utf8_lossy(&stdout).lines() {
            let mut fields = line.split(':');
            match fields.next() {
                Some("pub") => primary_pending = true,
                // The first fpr record after a pub record belongs to the
                // primary key; later ones are subkeys.
                Some("fpr") if primary_pending => {
                    if let Some(fingerprint) = line.split(':').nth(9) {
                        if !fingerprint.is_empty() {
                            fingerprints.push(fingerprint.to_ascii_uppercase());
                        }
                    }
                    primary_pending = false;
                }
                _ => {}
            }
        }
        Ok(fingerprints)
    }

    fn verify_detached(&self, signature: &[u8], payload: &[u8]) -> Result<Verification, Error> {
        let mut signature_file = tempfile::NamedTempFile::new().map_err(Error::Io)?;
        signature_file.write_all(signature).map_err(Error::Io)?;
        signature_file.flush().map_err(Error::Io)?;
        let signature_path = signature_file.path().to_string_lossy().into_owned();

        let (_success, stdout) = self.run(
            &[
                "--batch",
                "--status-fd",
                "1",
                "--verify",
                &signature_path,
                "-",
            ],
            Some(payload),
        )?;

        for line in String::from_utf8_lossy(&stdout).lines() {
            if let Some(rest) = line.strip_prefix(STATUS_VALIDSIG) {
                if let Some(fingerprint) = rest.split_whitespace().next() {
                    return Ok(Verification {
                        valid: true,
                        fingerprint: Some(fingerprint.to_ascii_uppercase()),
                    });
                }
            }
        }
        Ok(Verification::default())
    }
}
