//! Detached-signature extraction, verification, and signer resolution.
//!
//! Git stores commit signatures in a `gpgsig` header whose value is the
//! armored signature over the remaining object bytes; annotated tags carry
//! the armored block appended to the tag message, signing everything before
//! it. Extraction splits the raw object into (signature, payload) without
//! consulting the crypto backend; verification hands that pair to the
//! backend and reports `(valid, fingerprint)`; resolution maps the reported
//! fingerprint to an allow-listed collaborator.
//!
//! The verifier never consults the allow-list, and resolution always
//! compares on the backend-reported full fingerprint, never on the id it was
//! queried with: abbreviated key ids are not collision-resistant, so an
//! ambiguous match is treated as unauthorized.

pub mod gpg;

pub use gpg::Gpg;

use bstr::ByteSlice;
use gix_hash::ObjectId;
use gix_object::Find;

use crate::config::Collaborators;
use crate::Error;

const GPGSIG_HEADER: &[u8] = b"gpgsig ";
const PGP_SIGNATURE_BEGIN: &[u8] = b"-----BEGIN PGP SIGNATURE-----";

/// Outcome of a detached-signature verification.
///
/// `fingerprint` is the signer's full fingerprint and is only set when the
/// signature is cryptographically valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub fingerprint: Option<String>,
}

/// Blocking interface to the cryptographic backend.
///
/// Implemented by [`Gpg`] for production and by scripted fakes in tests.
pub trait SignatureBackend {
    /// Full fingerprints of all public keys in the local keyring matching
    /// `key_id` (a full fingerprint or an abbreviated id).
    fn matching_keys(&self, key_id: &str) -> Result<Vec<String>, Error>;

    /// Verify `signature` as a detached signature over `payload`.
    fn verify_detached(&self, signature: &[u8], payload: &[u8]) -> Result<Verification, Error>;
}

/// Split raw commit bytes into (signature, signed payload).
///
/// The payload is the commit object with the `gpgsig` header removed, which
/// is exactly what the signature was made over. Returns `None` for unsigned
/// commits.
pub fn extract_commit_signature(data: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    // Headers end at the first blank line; the message below it may contain
    // anything, including lines that look like headers.
    let boundary = data.find(b"\n\n")?;
    let (headers, body) = data.split_at(boundary + 1);

    let mut signature = Vec::new();
    let mut payload = Vec::new();
    let mut in_signature = false;
    for line in headers.lines_with_terminator() {
        if in_signature && line.first() == Some(&b' ') {
            // Continuation lines carry one leading space.
            signature.extend_from_slice(&line[1..]);
            continue;
        }
        in_signature = false;
        if let Some(rest) = line.strip_prefix(GPGSIG_HEADER) {
            signature.extend_from_slice(rest);
            in_signature = true;
            continue;
        }
        payload.extend_from_slice(line);
    }

    if signature.is_empty() {
        return None;
    }
    payload.extend_from_slice(body);
    Some((signature, payload))
}

/// Split raw annotated-tag bytes into (signature, signed payload).
///
/// The armored block at the end of the message is the signature; everything
/// before it is the payload. Returns `None` for unsigned tags.
pub fn extract_tag_signature(data: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut pos = 0;
    for line in data.lines_with_terminator() {
        let content = line.strip_suffix(b"\n").unwrap_or(line);
        if content == PGP_SIGNATURE_BEGIN {
            if pos == 0 {
                return None;
            }
            return Some((data[pos..].to_vec(), data[..pos].to_vec()));
        }
        pos += line.len();
    }
    None
}

/// Verify the signature on a commit or merge object.
pub fn verify_commit<F: Find, B: SignatureBackend>(
    odb: &F,
    backend: &B,
    id: &ObjectId,
) -> Result<Verification, Error> {
    let mut buf = Vec::new();
    let data = odb
        .try_find(id, &mut buf)
        .map_err(|e| Error::Odb(format!("failed to find object {id}: {e}")))?
        .ok_or_else(|| Error::Odb(format!("object {id} not found")))?;
    match extract_commit_signature(data.data) {
        Some((signature, payload)) => backend.verify_detached(&signature, &payload),
        None => Ok(Verification::default()),
    }
}

/// Verify the signature on an annotated tag object (the tag itself, not the
/// commit it points to).
pub fn verify_tag<F: Find, B: SignatureBackend>(
    odb: &F,
    backend: &B,
    id: &ObjectId,
) -> Result<Verification, Error> {
    let mut buf = Vec::new();
    let data = odb
        .try_find(id, &mut buf)
        .map_err(|e| Error::Odb(format!("failed to find object {id}: {e}")))?
        .ok_or_else(|| Error::Odb(format!("object {id} not found")))?;
    match extract_tag_signature(data.data) {
        Some((signature, payload)) => backend.verify_detached(&signature, &payload),
        None => Ok(Verification::default()),
    }
}

/// Result of resolving a signer id against the keyring and the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerResolution {
    /// Exactly one key matched and its fingerprint is allow-listed.
    Collaborator { identity: String, fingerprint: String },
    /// No key in the keyring matches the reported id.
    UnknownKey,
    /// The id matched more than one key; ambiguity is unauthorized.
    Ambiguous,
    /// Exactly one key matched but its fingerprint is not allow-listed.
    Unlisted { fingerprint: String },
}

/// Map a key id reported by the backend to an authorized collaborator.
pub fn resolve_signer<B: SignatureBackend>(
    backend: &B,
    collaborators: &Collaborators,
    key_id: &str,
) -> Result<SignerResolution, Error> {
    let keys = backend.matching_keys(key_id)?;
    match keys.as_slice() {
        [] => Ok(SignerResolution::UnknownKey),
        [fingerprint] => {
            let fingerprint = fingerprint.to_ascii_uppercase();
            match collaborators.identity_by_fingerprint(&fingerprint) {
                Some(identity) => Ok(SignerResolution::Collaborator {
                    identity: identity.to_owned(),
                    fingerprint,
                }),
                None => Ok(SignerResolution::Unlisted { fingerprint }),
            }
        }
        _ => Ok(SignerResolution::Ambiguous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{armored_signature, commit_data, ScriptedBackend};

    #[test]
    fn unsigned_commit_has_no_signature() {
        let data = commit_data(&[], None);
        assert_eq!(extract_commit_signature(&data), None);
    }

    #[test]
    fn commit_signature_and_payload_are_split() {
        let sig = armored_signature("deadbeef");
        let data = commit_data(&[], Some(&sig));
        let (signature, payload) = extract_commit_signature(&data).unwrap();

        assert_eq!(signature, sig.as_bytes());
        // The payload is the object without the gpgsig header.
        assert_eq!(payload, commit_data(&[], None));
    }

    #[test]
    fn gpgsig_lookalike_in_message_is_not_a_signature() {
        let mut data = commit_data(&[], None);
        data.extend_from_slice(b"gpgsig -----BEGIN PGP SIGNATURE----- is discussed here\n");
        assert_eq!(extract_commit_signature(&data), None);
    }

    #[test]
    fn unsigned_tag_has_no_signature() {
        let data = b"object 1111111111111111111111111111111111111111\n\
                     type commit\n\
                     tag v1\n\
                     tagger T <t@example.com> 1700000000 +0000\n\
                     \n\
                     release v1\n"
            .to_vec();
        assert_eq!(extract_tag_signature(&data), None);
    }

    #[test]
    fn tag_signature_and_payload_are_split() {
        let unsigned = b"object 1111111111111111111111111111111111111111\n\
                         type commit\n\
                         tag v1\n\
                         tagger T <t@example.com> 1700000000 +0000\n\
                         \n\
                         release v1\n"
            .to_vec();
        let sig = armored_signature("cafe");
        let mut data = unsigned.clone();
        data.extend_from_slice(sig.as_bytes());

        let (signature, payload) = extract_tag_signature(&data).unwrap();
        assert_eq!(signature, sig.as_bytes());
        assert_eq!(payload, unsigned);
    }

    #[test]
    fn resolver_unknown_key() {
        let backend = ScriptedBackend::default();
        let collaborators = Collaborators::default();
        assert_eq!(
            resolve_signer(&backend, &collaborators, "AABBCCDD").unwrap(),
            SignerResolution::UnknownKey
        );
    }

    #[test]
    fn resolver_ambiguous_short_id() {
        let mut backend = ScriptedBackend::default();
        backend.add_key(
            "AABBCCDD",
            &[
                "1111111111111111111111111111111111111111",
                "2222222222222222222222222222222222222222",
            ],
        );
        let collaborators =
            Collaborators::from_yaml("alice: 1111111111111111111111111111111111111111\n").unwrap();
        assert_eq!(
            resolve_signer(&backend, &collaborators, "AABBCCDD").unwrap(),
            SignerResolution::Ambiguous
        );
    }

    #[test]
    fn resolver_single_match_listed() {
        let fpr = "1111111111111111111111111111111111111111";
        let mut backend = ScriptedBackend::default();
        backend.add_key(fpr, &[fpr]);
        let collaborators = Collaborators::from_yaml(&format!("alice: {fpr}\n")).unwrap();
        assert_eq!(
            resolve_signer(&backend, &collaborators, fpr).unwrap(),
            SignerResolution::Collaborator {
                identity: "alice".into(),
                fingerprint: fpr.to_owned(),
            }
        );
    }

    #[test]
    fn resolver_single_match_unlisted() {
        let fpr = "2222222222222222222222222222222222222222";
        let mut backend = ScriptedBackend::default();
        backend.add_key(fpr, &[fpr]);
        let collaborators =
            Collaborators::from_yaml("alice: 1111111111111111111111111111111111111111\n").unwrap();
        assert_eq!(
            resolve_signer(&backend, &collaborators, fpr).unwrap(),
            SignerResolution::Unlisted {
                fingerprint: fpr.to_owned(),
            }
        );
    }
}
