/*!
Server-side push gate for git repositories.

Before a push is applied, the gate inspects every proposed ref update and
rejects the whole batch if any update violates policy: new commits and
annotated tags must carry a valid GPG signature from an allow-listed
collaborator, `refs/heads/master` only accepts merges of feature branches,
and ref creation, deletion, and mutation are gated by `hooks.*` booleans in
the repository configuration.

Design principles
- All persistent inputs (options, allow-list, branch tips) are loaded once at
  startup and threaded through an explicit [`policy::PolicyContext`]; the
  admission code performs no hidden I/O.
- Object access is generic over `gix_object::Find` and the crypto backend is
  a trait, so the entire admission pipeline runs against in-memory fixtures
  in tests.
- Diagnostics are plain text lines prefixed with `*** `; the process exit
  code is the verdict (0 accept, 1 reject).
*/

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod policy;
pub mod protocol;
pub mod signature;
pub mod walk;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::Verdict;

/// Error type for gate operations.
///
/// Every variant is fatal for the push being admitted; the driver maps all
/// of them to exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Repository configuration or allow-list problems.
    #[error("configuration error: {0}")]
    Config(String),
    /// Malformed input lines or object ids.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Object database lookups that failed or came back empty.
    #[error("object database error: {0}")]
    Odb(String),
    /// Failures while driving the cryptographic backend.
    #[error("signature verification error: {0}")]
    Verify(String),
    /// I/O errors on the input or diagnostic streams.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
