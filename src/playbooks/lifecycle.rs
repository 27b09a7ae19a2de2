//! Playbook lifecycle state machine
//!
//! DRAFT —submit→ PENDING_REVIEW —approve→ ACTIVE —deprecate→ DEPRECATED
//! —archive→ ARCHIVED; PENDING_REVIEW —reject→ ARCHIVED. ARCHIVED is
//! terminal: nothing ever leaves it.

use crate::types::PlaybookStatus;

/// Transition verbs operators and the review gate can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Submit,
    Approve,
    Reject,
    Deprecate,
    Archive,
}

/// Target state for an action from a given state, or None when the move is
/// illegal.
pub fn next_status(from: PlaybookStatus, action: LifecycleAction) -> Option<PlaybookStatus> {
    use LifecycleAction::*;
    use PlaybookStatus::*;
    match (from, action) {
        (Draft, Submit) => Some(PendingReview),
        (PendingReview, Approve) => Some(Active),
        (PendingReview, Reject) => Some(Archived),
        (Active, Deprecate) => Some(Deprecated),
        (Deprecated, Archive) => Some(Archived),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleAction::*;
    use PlaybookStatus::*;

    #[test]
    fn happy_path() {
        assert_eq!(next_status(Draft, Submit), Some(PendingReview));
        assert_eq!(next_status(PendingReview, Approve), Some(Active));
        assert_eq!(next_status(Active, Deprecate), Some(Deprecated));
        assert_eq!(next_status(Deprecated, Archive), Some(Archived));
    }

    #[test]
    fn rejection_archives() {
        assert_eq!(next_status(PendingReview, Reject), Some(Archived));
    }

    #[test]
    fn archived_is_terminal() {
        for action in [Submit, Approve, Reject, Deprecate, Archive] {
            assert_eq!(next_status(Archived, action), None);
        }
    }

    #[test]
    fn deprecate_then_approve_is_illegal() {
        assert_eq!(next_status(Deprecated, Approve), None);
    }

    #[test]
    fn draft_cannot_be_approved_directly() {
        assert_eq!(next_status(Draft, Approve), None);
    }
}
