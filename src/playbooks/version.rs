//! Version-change classification for playbook edits
//!
//! An edit bumps the semantic version by the size of the change:
//!
//! - MAJOR: the ordered command sequence loses, reorders or rewrites
//!   entries, or any rollback path changes
//! - MINOR: the old command sequence survives as a prefix and the edit
//!   appends auxiliary steps, or step wording shifts alongside additions
//! - PATCH: commands and rollback untouched, only text fields differ

use crate::types::{Playbook, SemanticVersion};

/// How big an edit is, in semantic-version terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Major,
    Minor,
    Patch,
}

impl VersionBump {
    pub fn apply(self, version: SemanticVersion) -> SemanticVersion {
        match self {
            VersionBump::Major => version.bump_major(),
            VersionBump::Minor => version.bump_minor(),
            VersionBump::Patch => version.bump_patch(),
        }
    }
}

/// Flattened command sequence: the critical path an operator executes.
fn command_sequence(playbook: &Playbook) -> Vec<&str> {
    playbook
        .steps
        .iter()
        .flat_map(|s| s.commands.iter().map(String::as_str))
        .collect()
}

/// Per-step rollback commands, in step order.
fn rollback_sequence(playbook: &Playbook) -> Vec<&str> {
    playbook
        .steps
        .iter()
        .filter_map(|s| s.rollback_command.as_deref())
        .collect()
}

/// True when every text field outside the command/rollback contract is
/// identical.
fn wording_identical(old: &Playbook, new: &Playbook) -> bool {
    if old.title != new.title || old.description != new.description {
        return false;
    }
    if old.prerequisites != new.prerequisites || old.success_criteria != new.success_criteria {
        return false;
    }
    if old.steps.len() != new.steps.len() {
        return false;
    }
    old.steps.iter().zip(new.steps.iter()).all(|(a, b)| {
        a.title == b.title && a.description == b.description && a.expected_output == b.expected_output
    })
}

/// Classify an edit against the predecessor. `None` means nothing
/// version-relevant changed and the caller should keep the version as-is.
pub fn classify_change(old: &Playbook, new: &Playbook) -> Option<VersionBump> {
    // Any rollback change invalidates operator trust in the recipe.
    if old.rollback_procedure != new.rollback_procedure
        || rollback_sequence(old) != rollback_sequence(new)
    {
        return Some(VersionBump::Major);
    }

    let old_commands = command_sequence(old);
    let new_commands = command_sequence(new);
    if old_commands != new_commands {
        // Pure appends keep the old critical path intact; anything that
        // drops, reorders or rewrites an existing command does not.
        let is_prefix = new_commands.len() > old_commands.len()
            && new_commands[..old_commands.len()] == old_commands[..];
        return Some(if is_prefix {
            VersionBump::Minor
        } else {
            VersionBump::Major
        });
    }

    // Commands and rollback identical: auxiliary steps or wording only.
    if old.steps.len() != new.steps.len() {
        return Some(VersionBump::Minor);
    }
    if !wording_identical(old, new) {
        return Some(VersionBump::Patch);
    }
    None
}
