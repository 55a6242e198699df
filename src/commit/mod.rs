//! Ordering and commit confirmation.

pub mod coordinator;

pub use coordinator::{CommitCoordinator, CommitOutcome, CommitPhase, CommitResult};
