// Update-triple parsing and ref classification.
//
// The host feeds the gate lines of the form
//   "<old-oid> <new-oid> <refname>"
// one per proposed ref update, until EOF. Parsing is strict: both oids must
// be exactly 40 hex digits (the all-zeros value is the absence sentinel) and
// the line must carry exactly three fields. Malformed input is fatal before
// any policy runs.

use gix_hash::ObjectId;

use crate::Error;

/// The distinguished integration branch.
pub const MASTER_REF: &str = "refs/heads/master";

/// A single proposed ref update, classified by its zero-oid pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefUpdate {
    /// Create a new reference pointing at `new`.
    Create { new: ObjectId, name: String },
    /// Update an existing reference from `old` to `new`.
    Update { old: ObjectId, new: ObjectId, name: String },
    /// Delete an existing reference which pointed at `old`.
    Delete { old: ObjectId, name: String },
}

impl RefUpdate {
    /// The refname targeted by this update.
    pub fn name(&self) -> &str {
        match self {
            RefUpdate::Create { name, .. } => name,
            RefUpdate::Update { name, .. } => name,
            RefUpdate::Delete { name, .. } => name,
        }
    }

    /// Parse one input line "<old> <new> <refname>".
    ///
    /// Invariants enforced:
    /// - Create: old is zero, new is non-zero
    /// - Delete: new is zero, old is non-zero
    /// - Update: old and new are non-zero
    /// - Both zero is invalid
    pub fn parse(line: &str) -> Result<Self, Error> {
        let mut it = line.split_whitespace();
        let old_hex = it
            .next()
            .ok_or_else(|| Error::Protocol("missing <old> oid".into()))?;
        let new_hex = it
            .next()
            .ok_or_else(|| Error::Protocol("missing <new> oid".into()))?;
        let name = it
            .next()
            .ok_or_else(|| Error::Protocol("missing <refname>".into()))?;

        // Refnames cannot contain whitespace, so anything further is garbage.
        if it.next().is_some() {
            return Err(Error::Protocol(format!(
                "unexpected tokens after <refname> in '{line}'"
            )));
        }

        let old = parse_oid(old_hex)?;
        let new = parse_oid(new_hex)?;

        match (old, new) {
            (None, None) => Err(Error::Protocol(format!(
                "both old and new are zero in update for '{name}'"
            ))),
            (None, Some(new)) => Ok(RefUpdate::Create {
                new,
                name: name.to_owned(),
            }),
            (Some(old), None) => Ok(RefUpdate::Delete {
                old,
                name: name.to_owned(),
            }),
            (Some(old), Some(new)) => Ok(RefUpdate::Update {
                old,
                new,
                name: name.to_owned(),
            }),
        }
    }
}

/// Decode a 40-hex oid field, mapping the all-zeros sentinel to `None`.
fn parse_oid(hex: &str) -> Result<Option<ObjectId>, Error> {
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Protocol(format!("invalid object id '{hex}'")));
    }
    if hex.bytes().all(|b| b == b'0') {
        return Ok(None);
    }
    ObjectId::from_hex(hex.as_bytes())
        .map(Some)
        .map_err(|e| Error::Protocol(format!("invalid object id '{hex}': {e}")))
}

/// Namespace of a refname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefClass {
    /// `refs/heads/*`
    Branch,
    /// `refs/remotes/*`
    RemoteTracking,
    /// `refs/tags/*`
    Tag,
    /// Anything else.
    Other,
}

/// Pure string discrimination of a refname; no I/O.
pub fn classify(name: &str) -> RefClass {
    if name.starts_with("refs/heads/") {
        RefClass::Branch
    } else if name.starts_with("refs/remotes/") {
        RefClass::RemoteTracking
    } else if name.starts_with("refs/tags/") {
        RefClass::Tag
    } else {
        RefClass::Other
    }
}
