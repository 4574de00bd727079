//! Pure relationship transitions.
//!
//! | state     | action           | next      | event            |
//! |-----------|------------------|-----------|------------------|
//! | none      | like             | pending   | became_pending   |
//! | pending   | like (other)     | matched   | became_matched   |
//! | pending   | like (same)      | pending   | none             |
//! | pending   | unlike (liker)   | none      | none             |
//! | matched   | unmatch (either) | unmatched | became_unmatched |
//! | unmatched | like             | pending   | became_pending   |
//!
//! Repeated likes/unlikes and a repeated unmatch are no-ops. Unmatching a pair
//! that never matched, or unliking an established match, is rejected.

use chrono::{DateTime, Utc};

use super::pair::Side;
use super::relationship::{Action, MatchEvent, Relationship, RelationshipState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a relationship in state {state}")]
pub struct InvalidTransition {
    pub state: RelationshipState,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub next: Relationship,
    pub event: MatchEvent,
}

impl Transition {
    /// Nothing to persist: the stored row already reflects the action.
    pub fn is_noop(&self, current: &Relationship) -> bool {
        self.event == MatchEvent::None && self.next.same_content(current)
    }
}

pub fn transition(
    current: &Relationship,
    side: Side,
    action: Action,
    now: DateTime<Utc>,
) -> Result<Transition, InvalidTransition> {
    use RelationshipState as S;

    let mut next = current.clone();
    let liked = current.liked_by(side);

    let event = match (current.state, action) {
        (_, Action::Like) if liked => MatchEvent::None,
        (S::None | S::Pending | S::Unmatched, Action::Like) => {
            next.set_liked(side, true);
            if next.liked_by(side.other()) {
                next.state = S::Matched;
                next.matched_at = Some(now);
                MatchEvent::BecameMatched
            } else if current.state == S::Pending {
                MatchEvent::None
            } else {
                // a like after an unmatch opens a new episode
                next.state = S::Pending;
                MatchEvent::BecamePending
            }
        }
        (S::Matched, Action::Like) => MatchEvent::None,

        (S::Matched, Action::Unlike) => {
            return Err(InvalidTransition { state: current.state, action });
        }
        (_, Action::Unlike) if !liked => MatchEvent::None,
        (_, Action::Unlike) => {
            next.set_liked(side, false);
            next.state = if next.liked_by(side.other()) { S::Pending } else { S::None };
            MatchEvent::None
        }

        (S::Matched, Action::Unmatch) => {
            next.liked_by_a = false;
            next.liked_by_b = false;
            next.state = S::Unmatched;
            next.unmatched_at = Some(now);
            next.unmatched_by = Some(current.profile(side));
            MatchEvent::BecameUnmatched
        }
        (S::Unmatched, Action::Unmatch) => MatchEvent::None,
        (S::None | S::Pending, Action::Unmatch) => {
            return Err(InvalidTransition { state: current.state, action });
        }
    };

    if !next.same_content(current) {
        next.updated_at = now;
    }

    Ok(Transition { next, event })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::pair::normalize;
    use chrono::Duration;
    use uuid::Uuid;

    fn blank() -> Relationship {
        let pair = normalize(Uuid::new_v4(), Uuid::new_v4());
        Relationship::new(&pair, Utc::now())
    }

    fn apply(rel: &Relationship, side: Side, action: Action) -> Transition {
        transition(rel, side, action, Utc::now()).unwrap()
    }

    #[test]
    fn first_like_is_pending() {
        let t = apply(&blank(), Side::A, Action::Like);

        assert_eq!(t.event, MatchEvent::BecamePending);
        assert_eq!(t.next.state, RelationshipState::Pending);
        assert!(t.next.liked_by_a);
        assert!(!t.next.liked_by_b);
        assert!(t.next.is_consistent());
    }

    #[test]
    fn like_back_matches() {
        let pending = apply(&blank(), Side::B, Action::Like).next;
        let now = Utc::now();
        let t = transition(&pending, Side::A, Action::Like, now).unwrap();

        assert_eq!(t.event, MatchEvent::BecameMatched);
        assert_eq!(t.next.state, RelationshipState::Matched);
        assert_eq!(t.next.matched_at, Some(now));
        assert!(t.next.liked_by_a && t.next.liked_by_b);
    }

    #[test]
    fn repeated_like_is_noop() {
        let pending = apply(&blank(), Side::A, Action::Like).next;
        let t = apply(&pending, Side::A, Action::Like);

        assert_eq!(t.event, MatchEvent::None);
        assert!(t.is_noop(&pending));
        assert_eq!(t.next, pending);
    }

    #[test]
    fn like_on_matched_is_noop() {
        let pending = apply(&blank(), Side::A, Action::Like).next;
        let matched = apply(&pending, Side::B, Action::Like).next;

        for side in [Side::A, Side::B] {
            let t = apply(&matched, side, Action::Like);
            assert!(t.is_noop(&matched));
        }
    }

    #[test]
    fn unlike_withdraws_pending_like() {
        let pending = apply(&blank(), Side::A, Action::Like).next;
        let t = apply(&pending, Side::A, Action::Unlike);

        assert_eq!(t.event, MatchEvent::None);
        assert_eq!(t.next.state, RelationshipState::None);
        assert!(!t.next.liked_by_a);
        assert!(!t.is_noop(&pending));
    }

    #[test]
    fn unlike_from_non_liker_is_noop() {
        let pending = apply(&blank(), Side::A, Action::Like).next;
        let t = apply(&pending, Side::B, Action::Unlike);
        assert!(t.is_noop(&pending));

        let fresh = blank();
        assert!(apply(&fresh, Side::A, Action::Unlike).is_noop(&fresh));
    }

    #[test]
    fn unlike_on_matched_is_rejected() {
        let pending = apply(&blank(), Side::A, Action::Like).next;
        let matched = apply(&pending, Side::B, Action::Like).next;

        let err = transition(&matched, Side::A, Action::Unlike, Utc::now()).unwrap_err();
        assert_eq!(err.state, RelationshipState::Matched);
        assert_eq!(err.action, Action::Unlike);
    }

    #[test]
    fn unmatch_requires_a_match() {
        let fresh = blank();
        let err = transition(&fresh, Side::A, Action::Unmatch, Utc::now()).unwrap_err();
        assert_eq!(err.state, RelationshipState::None);

        let pending = apply(&fresh, Side::A, Action::Like).next;
        let err = transition(&pending, Side::B, Action::Unmatch, Utc::now()).unwrap_err();
        assert_eq!(err.state, RelationshipState::Pending);
        assert_eq!(err.to_string(), "cannot unmatch a relationship in state pending");
    }

    #[test]
    fn unmatch_clears_both_flags() {
        let pending = apply(&blank(), Side::A, Action::Like).next;
        let matched = apply(&pending, Side::B, Action::Like).next;
        let now = Utc::now();
        let t = transition(&matched, Side::B, Action::Unmatch, now).unwrap();

        assert_eq!(t.event, MatchEvent::BecameUnmatched);
        assert_eq!(t.next.state, RelationshipState::Unmatched);
        assert!(!t.next.liked_by_a && !t.next.liked_by_b);
        assert_eq!(t.next.unmatched_at, Some(now));
        assert_eq!(t.next.unmatched_by, Some(matched.profile_b));
        assert_eq!(t.next.matched_at, matched.matched_at);
    }

    #[test]
    fn repeated_unmatch_is_noop() {
        let pending = apply(&blank(), Side::A, Action::Like).next;
        let matched = apply(&pending, Side::B, Action::Like).next;
        let unmatched = apply(&matched, Side::A, Action::Unmatch).next;

        assert!(apply(&unmatched, Side::B, Action::Unmatch).is_noop(&unmatched));
    }

    #[test]
    fn relike_after_unmatch_starts_new_episode() {
        let t0 = Utc::now();
        let pending = transition(&blank(), Side::A, Action::Like, t0).unwrap().next;
        let matched = transition(&pending, Side::B, Action::Like, t0).unwrap().next;
        let unmatched = transition(&matched, Side::A, Action::Unmatch, t0 + Duration::seconds(1))
            .unwrap()
            .next;

        // the side that did not unmatch can like again right away
        let t1 = t0 + Duration::seconds(2);
        let relike = transition(&unmatched, Side::B, Action::Like, t1).unwrap();
        assert_eq!(relike.event, MatchEvent::BecamePending);
        assert_eq!(relike.next.state, RelationshipState::Pending);
        assert!(relike.next.liked_by_b && !relike.next.liked_by_a);
        assert_eq!(relike.next.matched_at, Some(t0));
        assert_eq!(relike.next.unmatched_at, unmatched.unmatched_at);

        let t2 = t0 + Duration::seconds(3);
        let rematch = transition(&relike.next, Side::A, Action::Like, t2).unwrap();
        assert_eq!(rematch.event, MatchEvent::BecameMatched);
        assert_eq!(rematch.next.matched_at, Some(t2));
        assert_eq!(rematch.next.unmatched_by, Some(matched.profile_a));
    }

    #[test]
    fn transitions_keep_flags_consistent() {
        let sequence = [
            (Side::A, Action::Like),
            (Side::A, Action::Unlike),
            (Side::B, Action::Like),
            (Side::A, Action::Like),
            (Side::B, Action::Unmatch),
            (Side::A, Action::Like),
            (Side::A, Action::Unlike),
        ];

        let mut rel = blank();
        for (side, action) in sequence {
            rel = apply(&rel, side, action).next;
            assert!(rel.is_consistent(), "inconsistent after {action} by {side:?}: {rel:?}");
        }
        assert_eq!(rel.state, RelationshipState::None);
    }

    #[test]
    fn transition_does_not_touch_version() {
        let fresh = blank();
        let t = apply(&fresh, Side::A, Action::Like);
        assert_eq!(t.next.version, fresh.version);
    }
}
