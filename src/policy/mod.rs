//! Per-update admission rules.
//!
//! The policy is a decision table over (update kind, ref class) with a
//! signature check woven into the walk over newly introduced objects:
//! - deletions are gated by `allowdeletebranch` / `allowdeletetag` and
//!   bypass every other check
//! - `refs/heads/master` only accepts merges of its previous tip unless
//!   `allowcommitsonmaster` is set
//! - every new commit or merge must carry a valid signature from an
//!   allow-listed collaborator unless `allowunsignedcommits` is set
//! - an update that introduces no new objects is a tag pointing at existing
//!   history: lightweight tags need `allowunannotated`, annotated tags need
//!   a signature and may only move when `allowmodifytag` is set
//!
//! Evaluation stops at the first rejection and the verdict covers the whole
//! push; partial acceptance is not a valid outcome.

use std::io::Write;

use gix_hash::ObjectId;
use gix_object::{CommitRef, Find, Kind};

use crate::config::{Collaborators, GateOptions};
use crate::protocol::{classify, RefClass, RefUpdate, MASTER_REF};
use crate::signature::{
    resolve_signer, verify_commit, verify_tag, SignatureBackend, SignerResolution, Verification,
};
use crate::walk::{new_objects, NewObject};
use crate::Error;

/// A branch head used to bound the walk when a new ref is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTip {
    pub name: String,
    pub id: ObjectId,
}

/// Outcome of admitting a single ref update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Reject,
}

/// Everything admission needs for one push, constructed once at startup.
///
/// The object database handle and crypto backend are borrowed and reused
/// across all updates; options, allow-list, and branch tips are read-only
/// for the duration of admission.
pub struct PolicyContext<'a, F, B> {
    pub odb: &'a F,
    pub backend: &'a B,
    pub options: GateOptions,
    pub collaborators: Collaborators,
    pub branch_tips: Vec<BranchTip>,
}

impl<F: Find, B: SignatureBackend> PolicyContext<'_, F, B> {
    /// Decide one proposed update, writing diagnostics to `out`.
    pub fn admit(&self, update: &RefUpdate, out: &mut dyn Write) -> Result<Admission, Error> {
        let class = classify(update.name());
        match update {
            RefUpdate::Delete { name, .. } => self.admit_delete(name, class, out),
            RefUpdate::Create { new, name } => self.admit_push(name, None, *new, out),
            RefUpdate::Update { old, new, name } => self.admit_push(name, Some(*old), *new, out),
        }
    }

    /// Deletion rules. Deletions bypass all other checks.
    fn admit_delete(
        &self,
        name: &str,
        class: RefClass,
        out: &mut dyn Write,
    ) -> Result<Admission, Error> {
        match class {
            RefClass::Branch => {
                if self.options.allow_delete_branch {
                    Ok(Admission::Accept)
                } else {
                    writeln!(out, "*** Deleting a branch is not allowed")?;
                    Ok(Admission::Reject)
                }
            }
            RefClass::RemoteTracking => {
                if self.options.allow_delete_branch {
                    Ok(Admission::Accept)
                } else {
                    writeln!(out, "*** Deleting a tracking branch is not allowed")?;
                    Ok(Admission::Reject)
                }
            }
            RefClass::Tag => {
                if self.options.allow_delete_tag {
                    Ok(Admission::Accept)
                } else {
                    writeln!(out, "*** Deleting a tag is not allowed")?;
                    Ok(Admission::Reject)
                }
            }
            RefClass::Other => {
                writeln!(out, "*** Accepting deletion of {name}")?;
                Ok(Admission::Accept)
            }
        }
    }

    /// Creation or update of a ref: master discipline first, then the walk
    /// with per-object checks, then tag handling if nothing new was found.
    fn admit_push(
        &self,
        name: &str,
        old: Option<ObjectId>,
        new: ObjectId,
        out: &mut dyn Write,
    ) -> Result<Admission, Error> {
        if name == MASTER_REF && !self.options.allow_commits_on_master {
            match old {
                None => {
                    writeln!(out, "*** Accepting initial creation of {name}")?;
                }
                Some(old) => {
                    // The rule depends on the direct-parent relationship,
                    // not on the traversed set, so it precedes the walk.
                    if !self.merge_carries_parent(new, old)? {
                        writeln!(out, "*** Master only accepts merges of feature branches.")?;
                        return Ok(Admission::Reject);
                    }
                }
            }
        }

        let boundary: Vec<ObjectId> = match old {
            Some(old) => vec![old],
            // On creation there is no previous tip to hide; hide every other
            // existing branch head instead. The ref under push is excluded
            // so pre-push style deployments, where it already moved, do not
            // hide the very history under inspection.
            None => self
                .branch_tips
                .iter()
                .filter(|tip| tip.name != name)
                .map(|tip| tip.id)
                .collect(),
        };

        let objects = new_objects(self.odb, new, &boundary)?;
        if objects.is_empty() {
            return self.admit_existing_target(name, old, new, out);
        }
        for object in &objects {
            if self.check_new_object(name, old.is_none(), object, out)? == Admission::Reject {
                return Ok(Admission::Reject);
            }
        }
        Ok(Admission::Accept)
    }

    /// True when `new` is a merge commit listing `old` among its direct parents.
    fn merge_carries_parent(&self, new: ObjectId, old: ObjectId) -> Result<bool, Error> {
        let mut buf = Vec::new();
        let data = self
            .odb
            .try_find(&new, &mut buf)
            .map_err(|e| Error::Odb(format!("failed to find object {new}: {e}")))?
            .ok_or_else(|| Error::Odb(format!("object {new} not found")))?;
        if data.kind != Kind::Commit {
            return Ok(false);
        }
        let commit = CommitRef::from_bytes(data.data)
            .map_err(|e| Error::Odb(format!("failed to parse commit {new}: {e}")))?;
        let parents: Vec<ObjectId> = commit.parents().collect();
        Ok(parents.len() >= 2 && parents.contains(&old))
    }

    /// Checks applied to each object the walk yields.
    fn check_new_object(
        &self,
        name: &str,
        is_create: bool,
        object: &NewObject,
        out: &mut dyn Write,
    ) -> Result<Admission, Error> {
        // Should be unreachable; defended against regardless.
        if object.id.is_null() {
            writeln!(
                out,
                "*** Deletion of ref {name} in the middle of the commit graph?"
            )?;
            return Ok(Admission::Reject);
        }
        if object.kind != Kind::Commit {
            writeln!(
                out,
                "*** Unknown type of update to ref {name} of type {}",
                object.kind
            )?;
            return Ok(Admission::Reject);
        }

        if is_create && !object.is_merge() && self.options.deny_create_branch {
            writeln!(out, "*** Creating a branch is not allowed")?;
            return Ok(Admission::Reject);
        }

        if self.options.allow_unsigned_commits {
            return Ok(Admission::Accept);
        }

        let label = if object.is_merge() { "merge" } else { "commit" };
        let fingerprint = match verify_commit(self.odb, self.backend, &object.id)? {
            Verification {
                valid: true,
                fingerprint: Some(fingerprint),
            } => fingerprint,
            _ => {
                writeln!(out, "*** Bad signature on {label} {}", object.id)?;
                return Ok(Admission::Reject);
            }
        };

        match resolve_signer(self.backend, &self.collaborators, &fingerprint)? {
            SignerResolution::Collaborator {
                identity,
                fingerprint,
            } => {
                writeln!(
                    out,
                    "*** Good signature on {label} {} by {identity} ({fingerprint})",
                    object.id
                )?;
                Ok(Admission::Accept)
            }
            resolution => {
                let fingerprint = report_unauthorized(&resolution, &fingerprint, out)?;
                writeln!(
                    out,
                    "*** Rejecting {label} {}: signed by unauthorised key {fingerprint}",
                    object.id
                )?;
                Ok(Admission::Reject)
            }
        }
    }

    /// An update that introduced no new objects points at existing history:
    /// classify by the type of `new` and apply the tag rules.
    fn admit_existing_target(
        &self,
        name: &str,
        old: Option<ObjectId>,
        new: ObjectId,
        out: &mut dyn Write,
    ) -> Result<Admission, Error> {
        let kind = {
            let mut buf = Vec::new();
            let data = self
                .odb
                .try_find(&new, &mut buf)
                .map_err(|e| Error::Odb(format!("failed to find object {new}: {e}")))?
                .ok_or_else(|| Error::Odb(format!("object {new} not found")))?;
            data.kind
        };

        match kind {
            Kind::Commit => {
                if self.options.allow_unsigned_tags && self.options.allow_unannotated {
                    Ok(Admission::Accept)
                } else {
                    writeln!(out, "*** The un-annotated tag {name} is not allowed")?;
                    Ok(Admission::Reject)
                }
            }
            Kind::Tag => {
                // Moving a tag is rejected before any signature work, so a
                // rejected modification never logs a verification success.
                if old.is_some() && !self.options.allow_modify_tag {
                    writeln!(out, "*** Modifying a tag is not allowed")?;
                    return Ok(Admission::Reject);
                }
                if self.options.allow_unsigned_tags {
                    return Ok(Admission::Accept);
                }

                if let Verification {
                    valid: true,
                    fingerprint: Some(fingerprint),
                } = verify_tag(self.odb, self.backend, &new)?
                {
                    match resolve_signer(self.backend, &self.collaborators, &fingerprint)? {
                        SignerResolution::Collaborator {
                            identity,
                            fingerprint,
                        } => {
                            writeln!(
                                out,
                                "*** Good signature on tag {name} by {identity} ({fingerprint})"
                            )?;
                            return Ok(Admission::Accept);
                        }
                        resolution => {
                            report_unauthorized(&resolution, &fingerprint, out)?;
                        }
                    }
                }
                writeln!(
                    out,
                    "*** Rejecting tag {name} due to lack of a valid GPG signature."
                )?;
                Ok(Admission::Reject)
            }
            kind => {
                writeln!(
                    out,
                    "*** No new commits, but {name} is a {kind} instead of a tag?"
                )?;
                Ok(Admission::Reject)
            }
        }
    }
}

/// Emit the resolver diagnostic for an unauthorized signer and return the
/// fingerprint to blame in the rejection line.
fn report_unauthorized(
    resolution: &SignerResolution,
    queried: &str,
    out: &mut dyn Write,
) -> Result<String, Error> {
    match resolution {
        SignerResolution::UnknownKey => {
            writeln!(out, "*** Key {queried} not in allowed list.")?;
            Ok(queried.to_owned())
        }
        SignerResolution::Ambiguous => {
            writeln!(out, "*** Multiple keys matched short ID {queried}.")?;
            Ok(queried.to_owned())
        }
        SignerResolution::Unlisted { fingerprint } => Ok(fingerprint.clone()),
        SignerResolution::Collaborator { fingerprint, .. } => Ok(fingerprint.clone()),
    }
}
