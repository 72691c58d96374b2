// ============================
// crates/backend-lib/src/store/mod.rs
// ============================
//! Storage abstraction for polls and the vote ledger.
//!
//! The store is the correctness boundary of the whole system: `record_vote`
//! must be atomic, and the uniqueness of (poll, voter) is enforced here, not
//! by application locks. Backends signal a constraint hit as
//! [`StoreError::UniqueViolation`] and the voting engine translates it.

use async_trait::async_trait;
use livepoll_common::{CreatePollInput, Poll, PollOption};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryPollStore;
pub use postgres::PgPollStore;

/// Errors surfaced by storage backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("poll not found")]
    PollNotFound,

    #[error("option does not belong to the poll")]
    OptionNotFound,

    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Trait for poll storage backends
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Create a poll and its option set atomically; never partially created.
    /// Input is assumed validated.
    async fn create_poll(&self, input: &CreatePollInput) -> Result<Poll, StoreError>;

    /// Fetch one poll with its options in creation order.
    async fn get_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError>;

    /// Active polls only, newest first.
    async fn list_active_polls(&self) -> Result<Vec<Poll>, StoreError>;

    /// Deactivate a poll. Idempotent; `PollNotFound` if the poll is absent.
    async fn close_poll(&self, poll_id: Uuid) -> Result<(), StoreError>;

    /// Current tallies for a poll, in creation order.
    async fn options_for_poll(&self, poll_id: Uuid) -> Result<Vec<PollOption>, StoreError>;

    /// Has this voter already voted on this poll?
    async fn has_voted(&self, poll_id: Uuid, voter: &str) -> Result<bool, StoreError>;

    /// Record a vote: insert the ledger row and increment the option tally
    /// by exactly one, as a single atomic unit. The (poll, voter) uniqueness
    /// constraint is the authoritative duplicate guard; a constraint hit
    /// rolls everything back and surfaces as `UniqueViolation`. The option
    /// must belong to the poll.
    async fn record_vote(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        voter: &str,
    ) -> Result<(), StoreError>;
}
