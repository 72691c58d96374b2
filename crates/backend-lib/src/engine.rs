// ============================
// crates/backend-lib/src/engine.rs
// ============================
//! Voting engine.
//!
//! Orchestrates the duplicate check, ledger insert and tally increment for a
//! cast-vote attempt. There is no application-level lock here: operations on
//! the same (poll, voter) pair are serialized by the store's unique
//! constraint, so the engine stays correct across multiple service instances.

use livepoll_common::VoteOutcome;
use metrics::counter;
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics::{VOTE_ACCEPTED, VOTE_DUPLICATE};
use crate::store::{PollStore, StoreError};

/// Engine for casting votes against a [`PollStore`] backend.
#[derive(Clone)]
pub struct VotingEngine<S> {
    store: S,
}

impl<S: PollStore> VotingEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cast a vote for `option_id` on `poll_id` as `voter`.
    ///
    /// The pre-check is an optimization only; the authoritative duplicate
    /// guard is the ledger's unique constraint, whose violation is translated
    /// into the same already-voted outcome rather than an error. NotFound
    /// conditions surface as typed errors, distinct from conflict.
    pub async fn cast_vote(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        voter: &str,
    ) -> Result<VoteOutcome, AppError> {
        if self.store.has_voted(poll_id, voter).await? {
            return self.duplicate_outcome(poll_id, option_id, voter).await;
        }

        match self.store.record_vote(poll_id, option_id, voter).await {
            Ok(()) => {},
            // Lost the race against a concurrent first vote from the same
            // identity: exactly one insert won, and this was not it.
            Err(StoreError::UniqueViolation) => {
                return self.duplicate_outcome(poll_id, option_id, voter).await;
            },
            Err(e) => return Err(e.into()),
        }

        let updated_options = self.store.options_for_poll(poll_id).await?;
        counter!(VOTE_ACCEPTED).increment(1);
        tracing::info!(%poll_id, %option_id, "vote recorded");
        Ok(VoteOutcome::accepted(poll_id, option_id, updated_options))
    }

    /// Has this voter already voted on this poll?
    pub async fn has_voted(&self, poll_id: Uuid, voter: &str) -> Result<bool, AppError> {
        Ok(self.store.has_voted(poll_id, voter).await?)
    }

    async fn duplicate_outcome(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        voter: &str,
    ) -> Result<VoteOutcome, AppError> {
        let updated_options = self.store.options_for_poll(poll_id).await?;
        counter!(VOTE_DUPLICATE).increment(1);
        tracing::debug!(%poll_id, voter = %voter, "duplicate vote attempt");
        Ok(VoteOutcome::duplicate(poll_id, option_id, updated_options))
    }
}
