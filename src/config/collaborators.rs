//! The collaborator allow-list.
//!
//! `<git-dir>/collaborators.yaml` is a YAML mapping of scalars: identity
//! strings to 40-hex-character GPG key fingerprints. Only signatures made by
//! a key whose full fingerprint appears here are accepted. Fingerprints are
//! compared case-insensitively but stored canonically (uppercase).

use std::collections::BTreeMap;
use std::path::Path;

use crate::Error;

/// File name of the allow-list inside the repository's private metadata directory.
pub const COLLABORATORS_FILE: &str = "collaborators.yaml";

/// Authorized signers, indexed by canonical (uppercase) fingerprint.
///
/// Loaded once per invocation and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Collaborators {
    by_fingerprint: BTreeMap<String, String>,
}

impl Collaborators {
    /// Load the allow-list from `<git_dir>/collaborators.yaml`.
    ///
    /// Failure to read or parse the file is fatal with a distinct
    /// diagnostic: a gate with no allow-list cannot admit anything.
    pub fn load(git_dir: &Path) -> Result<Self, Error> {
        let path = git_dir.join(COLLABORATORS_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "unable to load collaborators file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&text)
    }

    /// Parse an allow-list document.
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        let raw: BTreeMap<String, String> = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("malformed collaborators file: {e}")))?;

        let mut by_fingerprint = BTreeMap::new();
        for (identity, fingerprint) in raw {
            if fingerprint.len() != 40 || !fingerprint.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::Config(format!(
                    "fingerprint for '{identity}' is not a 40 character hex string: '{fingerprint}'"
                )));
            }
            by_fingerprint.insert(fingerprint.to_ascii_uppercase(), identity);
        }
        Ok(Self { by_fingerprint })
    }

    /// The identity authorized to sign with `fingerprint`, if any.
    pub fn identity_by_fingerprint(&self, fingerprint: &str) -> Option<&str> {
        self.by_fingerprint
            .get(&fingerprint.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPR: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    #[test]
    fn parse_and_lookup() {
        let list = Collaborators::from_yaml(&format!("alice: {FPR}\n")).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.identity_by_fingerprint(FPR), Some("alice"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let list =
            Collaborators::from_yaml("bob: 0123456789abcdef0123456789abcdef01234567\n").unwrap();
        assert_eq!(
            list.identity_by_fingerprint("0123456789ABCDEF0123456789ABCDEF01234567"),
            Some("bob")
        );
        assert_eq!(
            list.identity_by_fingerprint("0123456789abcdef0123456789abcdef01234567"),
            Some("bob")
        );
    }

    #[test]
    fn unknown_fingerprint_is_none() {
        let list = Collaborators::from_yaml(&format!("alice: {FPR}\n")).unwrap();
        assert_eq!(
            list.identity_by_fingerprint("BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"),
            None
        );
    }

    #[test]
    fn short_fingerprint_is_rejected() {
        let err = Collaborators::from_yaml("alice: ABCD1234\n").unwrap_err();
        assert!(err.to_string().contains("40 character hex string"));
    }

    #[test]
    fn non_hex_fingerprint_is_rejected() {
        let err = Collaborators::from_yaml(
            "alice: ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("40 character hex string"));
    }

    #[test]
    fn non_mapping_document_is_rejected() {
        let err = Collaborators::from_yaml("- alice\n- bob\n").unwrap_err();
        assert!(err.to_string().contains("malformed collaborators file"));
    }

    #[test]
    fn load_from_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(COLLABORATORS_FILE),
            format!("alice: {FPR}\n"),
        )
        .unwrap();
        let list = Collaborators::load(dir.path()).unwrap();
        assert_eq!(list.identity_by_fingerprint(FPR), Some("alice"));
    }

    #[test]
    fn missing_file_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Collaborators::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("unable to load collaborators file"));
    }
}
