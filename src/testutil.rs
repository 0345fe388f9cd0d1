//! Shared fixtures for unit tests: an in-memory object store, raw object
//! builders, and a scripted crypto backend.

use std::cell::Cell;
use std::collections::HashMap;

use gix_hash::ObjectId;
use gix_object::Kind;

use crate::signature::{SignatureBackend, Verification};
use crate::Error;

pub(crate) fn oid(hex40: &str) -> ObjectId {
    ObjectId::from_hex(hex40.as_bytes()).expect("valid hex")
}

/// An object id built from a repeated nibble, e.g. `short_oid('1')`.
pub(crate) fn short_oid(nibble: char) -> ObjectId {
    oid(&nibble.to_string().repeat(40))
}

/// In-memory object store implementing `gix_object::Find`.
#[derive(Debug, Default)]
pub(crate) struct MemoryOdb {
    objects: HashMap<ObjectId, (Kind, Vec<u8>)>,
}

impl MemoryOdb {
    pub fn insert(&mut self, id: ObjectId, kind: Kind, data: Vec<u8>) {
        self.objects.insert(id, (kind, data));
    }

    pub fn insert_commit(&mut self, id: ObjectId, parents: &[ObjectId], gpgsig: Option<&str>) {
        self.insert(id, Kind::Commit, commit_data(parents, gpgsig));
    }
}

impl gix_object::Find for MemoryOdb {
    fn try_find<'a>(
        &self,
        id: &gix_hash::oid,
        buffer: &'a mut Vec<u8>,
    ) -> Result<Option<gix_object::Data<'a>>, gix_object::find::Error> {
        match self.objects.get(&id.to_owned()) {
            Some((kind, data)) => {
                buffer.clear();
                buffer.extend_from_slice(data);
                Ok(Some(gix_object::Data {
                    kind: *kind,
                    data: buffer,
                }))
            }
            None => Ok(None),
        }
    }
}

/// A minimal armored signature block whose body is `marker`, so scripted
/// verifications can tell signatures apart.
pub(crate) fn armored_signature(marker: &str) -> String {
    format!("-----BEGIN PGP SIGNATURE-----\n\n{marker}\n-----END PGP SIGNATURE-----\n")
}

/// Raw commit object bytes, optionally with a `gpgsig` header.
pub(crate) fn commit_data(parents: &[ObjectId], gpgsig: Option<&str>) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n");
    for parent in parents {
        data.extend_from_slice(format!("parent {parent}\n").as_bytes());
    }
    data.extend_from_slice(b"author A U Thor <author@example.com> 1700000000 +0000\n");
    data.extend_from_slice(b"committer A U Thor <author@example.com> 1700000000 +0000\n");
    if let Some(signature) = gpgsig {
        for (index, line) in signature.lines().enumerate() {
            if index == 0 {
                data.extend_from_slice(format!("gpgsig {line}\n").as_bytes());
            } else {
                data.extend_from_slice(format!(" {line}\n").as_bytes());
            }
        }
    }
    data.extend_from_slice(b"\ntest commit\n");
    data
}

/// Raw annotated-tag object bytes, optionally signed.
pub(crate) fn tag_data(target: ObjectId, name: &str, signature: Option<&str>) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(format!("object {target}\n").as_bytes());
    data.extend_from_slice(b"type commit\n");
    data.extend_from_slice(format!("tag {name}\n").as_bytes());
    data.extend_from_slice(b"tagger A U Thor <author@example.com> 1700000000 +0000\n");
    data.extend_from_slice(format!("\nrelease {name}\n").as_bytes());
    if let Some(signature) = signature {
        data.extend_from_slice(signature.as_bytes());
    }
    data
}

/// Crypto backend scripted from maps, counting verification calls.
#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    keys: HashMap<String, Vec<String>>,
    signatures: HashMap<Vec<u8>, String>,
    verify_calls: Cell<usize>,
}

impl ScriptedBackend {
    /// Register the keyring matches for a queried id.
    pub fn add_key(&mut self, id: &str, fingerprints: &[&str]) {
        self.keys.insert(
            id.to_ascii_uppercase(),
            fingerprints.iter().map(|f| f.to_string()).collect(),
        );
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.get()
    }
}

impl SignatureBackend for ScriptedBackend {
    fn matching_keys(&self, key_id: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .keys
            .get(&key_id.to_ascii_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    fn verify_detached(&self, signature: &[u8], _payload: &[u8]) -> Result<Verification, Error> {
        self.verify_calls.set(self.verify_calls.get() + 1);
        Ok(match self.signatures.get(signature) {
            Some(fingerprint) => Verification {
                valid: true,
                fingerprint: Some(fingerprint.clone()),
            },
            None => Verification::default(),
        })
    }
}
