//! Gate configuration parsed from the repository's git config.
//!
//! # Configuration Keys
//!
//! All keys are booleans and default to `false` when absent:
//! - `hooks.allowunsignedcommits`: permit unsigned commits and merges
//! - `hooks.allowunsignedtags`: permit unsigned annotated tags
//! - `hooks.allowcommitsonmaster`: permit non-merge commits on `master`
//! - `hooks.allowunannotated`: permit lightweight tags
//! - `hooks.allowdeletetag`: permit tag deletion
//! - `hooks.allowmodifytag`: permit moving an existing tag
//! - `hooks.allowdeletebranch`: permit branch and tracking-ref deletion
//! - `hooks.denycreatebranch`: forbid branch creation
//!
//! The collaborator allow-list lives next to the config in the repository's
//! private metadata directory; see [`collaborators`].

pub mod collaborators;

pub use collaborators::Collaborators;

use crate::Error;

/// Policy switches read from `hooks.*`.
///
/// All switches are off by default, which is the strictest configuration:
/// everything must be signed, `master` only takes merges, and refs can be
/// created but neither deleted nor rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateOptions {
    pub allow_unsigned_commits: bool,
    pub allow_unsigned_tags: bool,
    pub allow_commits_on_master: bool,
    pub allow_unannotated: bool,
    pub allow_delete_tag: bool,
    pub allow_modify_tag: bool,
    pub allow_delete_branch: bool,
    pub deny_create_branch: bool,
}

impl GateOptions {
    /// Parse options from a git configuration file.
    ///
    /// Missing keys keep their default; a key that is present but not a
    /// valid boolean is a configuration error.
    pub fn from_config(config: &gix_config::File<'static>) -> Result<Self, Error> {
        let mut options = Self::default();
        read_boolean(config, "hooks.allowunsignedcommits", &mut options.allow_unsigned_commits)?;
        read_boolean(config, "hooks.allowunsignedtags", &mut options.allow_unsigned_tags)?;
        read_boolean(config, "hooks.allowcommitsonmaster", &mut options.allow_commits_on_master)?;
        read_boolean(config, "hooks.allowunannotated", &mut options.allow_unannotated)?;
        read_boolean(config, "hooks.allowdeletetag", &mut options.allow_delete_tag)?;
        read_boolean(config, "hooks.allowmodifytag", &mut options.allow_modify_tag)?;
        read_boolean(config, "hooks.allowdeletebranch", &mut options.allow_delete_branch)?;
        read_boolean(config, "hooks.denycreatebranch", &mut options.deny_create_branch)?;
        Ok(options)
    }
}

fn read_boolean(
    config: &gix_config::File<'static>,
    key: &str,
    target: &mut bool,
) -> Result<(), Error> {
    if let Some(value) = config.boolean(key) {
        *target = value
            .map_err(|e| Error::Config(format!("invalid boolean value for '{key}': {e}")))?;
    }
    Ok(())
}
