//! Enumeration of objects newly introduced by a ref update.
//!
//! The walk yields every commit-like object reachable from the updated tip
//! but not from a boundary set: the previous tip for plain updates, or every
//! other existing branch head when a ref is created. Ancestors of the
//! boundary were admitted by earlier pushes and are never re-verified, so
//! verification cost tracks the new history only.

use std::collections::HashSet;

use gix_hash::ObjectId;
use gix_object::{CommitRef, Find, Kind, TagRef};

use crate::Error;

/// A commit-like object discovered by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    pub id: ObjectId,
    /// The object type as reported by the object database.
    pub kind: Kind,
    pub parent_count: usize,
}

impl NewObject {
    /// Two or more parents classify a commit as a merge.
    pub fn is_merge(&self) -> bool {
        self.parent_count >= 2
    }
}

/// Enumerate objects reachable from `tip` but not from any of `boundary`.
///
/// Annotated tags at either end are peeled to the commit chain underneath.
/// Each new object is visited exactly once; the order is not topological.
/// A `tip` that is already reachable from the boundary yields nothing.
pub fn new_objects<F: Find>(
    odb: &F,
    tip: ObjectId,
    boundary: &[ObjectId],
) -> Result<Vec<NewObject>, Error> {
    let hidden = reachable_from(odb, boundary)?;

    // A tip that does not peel to a commit introduces no commit history; the
    // caller classifies it by looking at the ref target itself.
    let start = peel(odb, tip)?;
    if object_kind(odb, &start)? != Kind::Commit {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut to_visit = vec![start];
    while let Some(id) = to_visit.pop() {
        if !visited.insert(id) || hidden.contains(&id) {
            continue;
        }
        let mut buf = Vec::new();
        let data = odb
            .try_find(&id, &mut buf)
            .map_err(|e| Error::Odb(format!("failed to find object {id}: {e}")))?
            .ok_or_else(|| Error::Odb(format!("object {id} not found")))?;
        match data.kind {
            Kind::Commit => {
                let commit = CommitRef::from_bytes(data.data)
                    .map_err(|e| Error::Odb(format!("failed to parse commit {id}: {e}")))?;
                let parents: Vec<ObjectId> = commit.parents().collect();
                out.push(NewObject {
                    id,
                    kind: Kind::Commit,
                    parent_count: parents.len(),
                });
                for parent in parents {
                    if !visited.contains(&parent) {
                        to_visit.push(parent);
                    }
                }
            }
            kind => {
                // Non-commit objects are yielded for the policy layer to
                // reject; there is nothing to descend into.
                out.push(NewObject {
                    id,
                    kind,
                    parent_count: 0,
                });
            }
        }
    }
    Ok(out)
}

/// All commits reachable from `tips`, following parent edges and peeling
/// annotated tags.
fn reachable_from<F: Find>(odb: &F, tips: &[ObjectId]) -> Result<HashSet<ObjectId>, Error> {
    let mut reachable = HashSet::new();
    let mut to_visit: Vec<ObjectId> = Vec::with_capacity(tips.len());
    for tip in tips {
        to_visit.push(peel(odb, *tip)?);
    }
    while let Some(id) = to_visit.pop() {
        if !reachable.insert(id) {
            continue;
        }
        let mut buf = Vec::new();
        let data = odb
            .try_find(&id, &mut buf)
            .map_err(|e| Error::Odb(format!("failed to find object {id}: {e}")))?
            .ok_or_else(|| Error::Odb(format!("object {id} not found")))?;
        if data.kind != Kind::Commit {
            continue;
        }
        let commit = CommitRef::from_bytes(data.data)
            .map_err(|e| Error::Odb(format!("failed to parse commit {id}: {e}")))?;
        for parent in commit.parents() {
            if !reachable.contains(&parent) {
                to_visit.push(parent);
            }
        }
    }
    Ok(reachable)
}

fn object_kind<F: Find>(odb: &F, id: &ObjectId) -> Result<Kind, Error> {
    let mut buf = Vec::new();
    let data = odb
        .try_find(id, &mut buf)
        .map_err(|e| Error::Odb(format!("failed to find object {id}: {e}")))?
        .ok_or_else(|| Error::Odb(format!("object {id} not found")))?;
    Ok(data.kind)
}

/// Follow annotated-tag objects down to whatever they ultimately point at.
fn peel<F: Find>(odb: &F, mut id: ObjectId) -> Result<ObjectId, Error> {
    loop {
        let mut buf = Vec::new();
        let data = odb
            .try_find(&id, &mut buf)
            .map_err(|e| Error::Odb(format!("failed to find object {id}: {e}")))?
            .ok_or_else(|| Error::Odb(format!("object {id} not found")))?;
        if data.kind != Kind::Tag {
            return Ok(id);
        }
        let tag = TagRef::from_bytes(data.data)
            .map_err(|e| Error::Odb(format!("failed to parse tag {id}: {e}")))?;
        id = ObjectId::from_hex(tag.target.as_ref())
            .map_err(|e| Error::Odb(format!("invalid target in tag {id}: {e}")))?;
    }
}
