// ============================
// crates/backend-lib/src/store/postgres.rs
// ============================
//! Postgres implementation of the [`PollStore`] trait.
//!
//! `record_vote` runs the tally increment and the ledger insert inside one
//! transaction. The increment is an atomic `vote_count = vote_count + 1` in
//! SQL, and a unique-constraint hit on the insert aborts the transaction so
//! the increment is rolled back with it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use livepoll_common::{CreatePollInput, Poll, PollOption};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PollStore, StoreError};

const MAX_CONNECTIONS: u32 = 5;

/// Postgres-backed poll store.
#[derive(Clone)]
pub struct PgPollStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct PollRow {
    id: Uuid,
    question: String,
    description: Option<String>,
    created_by: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: Uuid,
    poll_id: Uuid,
    text: String,
    vote_count: i64,
}

impl PollRow {
    fn into_poll(self, options: Vec<PollOption>) -> Poll {
        Poll {
            id: self.id,
            question: self.question,
            description: self.description,
            created_by: self.created_by,
            is_active: self.is_active,
            created_at: self.created_at,
            options,
        }
    }
}

impl From<OptionRow> for PollOption {
    fn from(row: OptionRow) -> Self {
        PollOption {
            id: row.id,
            text: row.text,
            vote_count: row.vote_count,
        }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.into())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl PgPollStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PollStore for PgPollStore {
    async fn create_poll(&self, input: &CreatePollInput) -> Result<Poll, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let poll_row: PollRow = sqlx::query_as(
            "INSERT INTO polls (id, question, description, created_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, question, description, created_by, is_active, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&input.question)
        .bind(&input.description)
        .bind(&input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        let mut options = Vec::with_capacity(input.options.len());
        for (position, text) in input.options.iter().enumerate() {
            let row: OptionRow = sqlx::query_as(
                "INSERT INTO options (id, poll_id, text, position) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, poll_id, text, vote_count",
            )
            .bind(Uuid::new_v4())
            .bind(poll_row.id)
            .bind(text)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
            options.push(PollOption::from(row));
        }

        tx.commit().await.map_err(backend)?;
        Ok(poll_row.into_poll(options))
    }

    async fn get_poll(&self, poll_id: Uuid) -> Result<Option<Poll>, StoreError> {
        let poll_row: Option<PollRow> = sqlx::query_as(
            "SELECT id, question, description, created_by, is_active, created_at \
             FROM polls WHERE id = $1",
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match poll_row {
            Some(row) => {
                let options = self.options_for_poll(poll_id).await?;
                Ok(Some(row.into_poll(options)))
            },
            None => Ok(None),
        }
    }

    async fn list_active_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let poll_rows: Vec<PollRow> = sqlx::query_as(
            "SELECT id, question, description, created_by, is_active, created_at \
             FROM polls WHERE is_active ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let ids: Vec<Uuid> = poll_rows.iter().map(|p| p.id).collect();
        let option_rows: Vec<OptionRow> = sqlx::query_as(
            "SELECT id, poll_id, text, vote_count FROM options \
             WHERE poll_id = ANY($1) ORDER BY poll_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut by_poll: HashMap<Uuid, Vec<PollOption>> = HashMap::new();
        for row in option_rows {
            by_poll
                .entry(row.poll_id)
                .or_default()
                .push(PollOption::from(row));
        }

        Ok(poll_rows
            .into_iter()
            .map(|row| {
                let options = by_poll.remove(&row.id).unwrap_or_default();
                row.into_poll(options)
            })
            .collect())
    }

    async fn close_poll(&self, poll_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE polls SET is_active = FALSE WHERE id = $1")
            .bind(poll_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::PollNotFound);
        }
        Ok(())
    }

    async fn options_for_poll(&self, poll_id: Uuid) -> Result<Vec<PollOption>, StoreError> {
        let rows: Vec<OptionRow> = sqlx::query_as(
            "SELECT id, poll_id, text, vote_count FROM options \
             WHERE poll_id = $1 ORDER BY position",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        if rows.is_empty() {
            // distinguish an empty option set from a missing poll
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM polls WHERE id = $1")
                .bind(poll_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
            if exists.is_none() {
                return Err(StoreError::PollNotFound);
            }
        }

        Ok(rows.into_iter().map(PollOption::from).collect())
    }

    async fn has_voted(&self, poll_id: Uuid, voter: &str) -> Result<bool, StoreError> {
        let row: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM votes WHERE poll_id = $1 AND voter_identifier = $2")
                .bind(poll_id)
                .bind(voter)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.is_some())
    }

    async fn record_vote(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        voter: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let updated =
            sqlx::query("UPDATE options SET vote_count = vote_count + 1 WHERE id = $1 AND poll_id = $2")
                .bind(option_id)
                .bind(poll_id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;

        if updated.rows_affected() == 0 {
            let poll_exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM polls WHERE id = $1")
                .bind(poll_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
            // dropping tx rolls back
            return Err(if poll_exists.is_some() {
                StoreError::OptionNotFound
            } else {
                StoreError::PollNotFound
            });
        }

        let inserted = sqlx::query(
            "INSERT INTO votes (id, poll_id, option_id, voter_identifier) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(poll_id)
        .bind(option_id)
        .bind(voter)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await.map_err(backend)?;
                Ok(())
            },
            // Aborting the transaction undoes the increment; the constraint
            // is the authoritative duplicate guard under concurrency.
            Err(e) if is_unique_violation(&e) => Err(StoreError::UniqueViolation),
            Err(e) => Err(backend(e)),
        }
    }
}
