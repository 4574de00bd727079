//! Mutual-match resolution: pair addressing, the relationship state machine
//! and the coordinator that applies actions against the store.

pub mod cache;
pub mod coordinator;
pub mod error;
pub mod pair;
pub mod relationship;
pub mod state_machine;

pub use coordinator::{MatchCoordinator, MatchOutcome, RetryPolicy};
pub use error::{BadArgument, MatchError};
pub use relationship::{Action, MatchEvent, Relationship, RelationshipState};
