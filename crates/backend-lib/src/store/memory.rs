// ============================
// crates/backend-lib/src/store/memory.rs
// ============================
//! In-memory implementation of the [`PollStore`] trait.
//!
//! Used by the test suite and for running the server without a database.
//! The backing map has no multi-statement transactions, so `record_vote`
//! performs the duplicate check, ledger insert and tally increment under one
//! lock acquisition — the same atomic unit the relational backend gets from
//! its transaction plus unique constraint.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use livepoll_common::{CreatePollInput, Poll, PollOption};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{PollStore, StoreError};

#[derive(Default)]
struct Inner {
    polls: HashMap<Uuid, Poll>,
    /// Poll ids in creation order
    created: Vec<Uuid>,
    /// Ledger: (poll, voter) -> option voted for
    votes: HashMap<(Uuid, String), Uuid>,
}

/// In-memory poll store behind a single lock domain.
#[derive(Clone, Default)]
pub struct InMemoryPollStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger rows for a poll. Test helper.
    pub fn vote_rows(&self, poll_id: Uuid) -> usize {
        let inner = self.inner.read();
        inner.votes.keys().filter(|(p, _)| *p == poll_id).count()
    }
}

#[async_trait]
impl PollStore for InMemoryPollStore {
    async fn create_poll(&self, input: &CreatePollInput) -> Result<Poll, StoreError> {
        let poll = Poll {
            id: Uuid::new_v4(),
            question: input.question.clone(),
            description: input.description.clone(),
            created_by: input.created_by.clone(),
            is_active: true,
            created_at: Utc::now(),
            options: input
                .options
                .iter()
                .map(|text| PollOption {
                    id: Uuid::new_v4(),
                    text: text.clone(),
                    vote_count: 0,
                })
                .collect(),
        };

        let mut inner = self.inner.write();
        inner.created.push(poll.id);
        inner.polls.insert(poll.id, poll.clone());
        Ok(poll)
    }

    async fn get_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError> {
        Ok(self.inner.read().polls.get(&poll_id).cloned())
    }

    async fn list_active_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .created
            .iter()
            .rev()
            .filter_map(|id| inner.polls.get(id))
            .filter(|poll| poll.is_active)
            .cloned()
            .collect())
    }

    async fn close_poll(&self, poll_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let poll = inner
            .polls
            .get_mut(&poll_id)
            .ok_or(StoreError::PollNotFound)?;
        poll.is_active = false;
        Ok(())
    }

    async fn options_for_poll(&self, poll_id: Uuid) -> Result<Vec<PollOption>, StoreError> {
        let inner = self.inner.read();
        let poll = inner.polls.get(&poll_id).ok_or(StoreError::PollNotFound)?;
        Ok(poll.options.clone())
    }

    async fn has_voted(&self, poll_id: Uuid, voter: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read();
        Ok(inner.votes.contains_key(&(poll_id, voter.to_string())))
    }

    async fn record_vote(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        voter: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        let ledger_key = (poll_id, voter.to_string());
        let already_voted = inner.votes.contains_key(&ledger_key);

        let poll = inner
            .polls
            .get_mut(&poll_id)
            .ok_or(StoreError::PollNotFound)?;
        let option = poll
            .options
            .iter_mut()
            .find(|o| o.id == option_id)
            .ok_or(StoreError::OptionNotFound)?;

        if already_voted {
            return Err(StoreError::UniqueViolation);
        }

        option.vote_count += 1;
        inner.votes.insert(ledger_key, option_id);
        Ok(())
    }
}
