use uuid::Uuid;

use kindred_shared::errors::{AppError, ErrorCode};

use super::state_machine::InvalidTransition;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BadArgument {
    #[error("a profile cannot act on itself")]
    SelfAction,
    #[error("actor is not part of the pair")]
    NotInPair,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(BadArgument),

    #[error("profile {0} not found")]
    ProfileNotFound(Uuid),

    #[error("profile {0} is not active")]
    ProfileInactive(Uuid),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("gave up after {attempts} conflicting writes")]
    Conflict { attempts: u32 },

    #[error("relationship store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("deadline exceeded before the action could be committed")]
    Timeout,

    #[error("profile resolver unavailable: {0}")]
    ProfileResolverUnavailable(String),
}

impl MatchError {
    /// Transient failures: nothing was committed and the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. }
                | Self::StoreUnavailable(_)
                | Self::Timeout
                | Self::ProfileResolverUnavailable(_)
        )
    }
}

impl From<StoreError> for MatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            corrupt @ StoreError::Corrupt { .. } => Self::StoreUnavailable(corrupt.to_string()),
        }
    }
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        match &err {
            MatchError::InvalidArgument(BadArgument::SelfAction) => {
                AppError::new(ErrorCode::CannotLikeSelf, err.to_string())
            }
            MatchError::InvalidArgument(_) => AppError::bad_request(err.to_string()),
            MatchError::ProfileNotFound(_) => AppError::new(ErrorCode::ProfileNotFound, err.to_string()),
            MatchError::ProfileInactive(_) => AppError::new(ErrorCode::ProfileInactive, err.to_string()),
            MatchError::InvalidTransition(t) => AppError::with_details(
                ErrorCode::InvalidTransition,
                err.to_string(),
                serde_json::json!({ "state": t.state, "action": t.action }),
            ),
            MatchError::Conflict { attempts } => AppError::with_details(
                ErrorCode::MatchConflict,
                err.to_string(),
                serde_json::json!({ "attempts": attempts }),
            ),
            MatchError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "relationship store unavailable");
                AppError::unavailable("relationship store unavailable")
            }
            MatchError::Timeout => AppError::new(ErrorCode::Timeout, err.to_string()),
            MatchError::ProfileResolverUnavailable(msg) => {
                tracing::error!(error = %msg, "profile resolver unavailable");
                AppError::unavailable("profile service unavailable")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::relationship::{Action, RelationshipState};

    #[test]
    fn transient_errors_are_retryable() {
        assert!(MatchError::Conflict { attempts: 5 }.is_retryable());
        assert!(MatchError::StoreUnavailable("down".into()).is_retryable());
        assert!(MatchError::Timeout.is_retryable());

        assert!(!MatchError::InvalidArgument(BadArgument::SelfAction).is_retryable());
        assert!(!MatchError::ProfileInactive(Uuid::nil()).is_retryable());
        let invalid = InvalidTransition {
            state: RelationshipState::Pending,
            action: Action::Unmatch,
        };
        assert!(!MatchError::from(invalid).is_retryable());
    }

    #[test]
    fn maps_to_app_error_codes() {
        let cases = [
            (MatchError::InvalidArgument(BadArgument::SelfAction), ErrorCode::CannotLikeSelf),
            (MatchError::InvalidArgument(BadArgument::NotInPair), ErrorCode::BadRequest),
            (MatchError::ProfileNotFound(Uuid::nil()), ErrorCode::ProfileNotFound),
            (MatchError::ProfileInactive(Uuid::nil()), ErrorCode::ProfileInactive),
            (MatchError::Conflict { attempts: 5 }, ErrorCode::MatchConflict),
            (MatchError::StoreUnavailable("down".into()), ErrorCode::ServiceUnavailable),
            (MatchError::Timeout, ErrorCode::Timeout),
        ];
        for (err, code) in cases {
            assert_eq!(AppError::from(err).code(), code);
        }
    }

    #[test]
    fn store_errors_become_unavailable() {
        let err = MatchError::from(StoreError::Corrupt {
            pair_key: "a:b".into(),
            reason: "bad state".into(),
        });
        assert!(matches!(err, MatchError::StoreUnavailable(msg) if msg.contains("a:b")));
    }
}
