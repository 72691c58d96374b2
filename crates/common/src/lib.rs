// ================
// crates/common/src/lib.rs
// ================
//! Common types and structures
//! shared between the `livepoll` server and its clients.
//! This module defines the poll domain model and the live-channel
//! event protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a live connection for its lifetime.
pub type ConnectionId = Uuid;

/// A poll together with its ordered option set.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: Uuid,
    /// The question being asked (5-500 chars)
    pub question: String,
    /// Optional longer description (max 2000 chars)
    pub description: Option<String>,
    /// Optional free-form creator label
    pub created_by: Option<String>,
    /// Open for voting; flips to false exactly once when closed
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Options in creation order
    pub options: Vec<PollOption>,
}

/// One selectable answer within a poll, carrying its running tally.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: Uuid,
    pub text: String,
    pub vote_count: i64,
}

/// Request body for creating a poll.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub options: Vec<String>,
}

/// Result of a cast-vote attempt.
///
/// `success` and `already_voted` are mutually exclusive; in both cases
/// `updated_options` carries the current tallies of the whole poll.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub success: bool,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub updated_options: Vec<PollOption>,
    #[serde(default)]
    pub already_voted: bool,
}

impl VoteOutcome {
    /// A first-time vote that was recorded.
    pub fn accepted(poll_id: Uuid, option_id: Uuid, updated_options: Vec<PollOption>) -> Self {
        Self {
            success: true,
            poll_id,
            option_id,
            updated_options,
            already_voted: false,
        }
    }

    /// The voter had already voted on this poll; nothing was mutated.
    pub fn duplicate(poll_id: Uuid, option_id: Uuid, updated_options: Vec<PollOption>) -> Self {
        Self {
            success: false,
            poll_id,
            option_id,
            updated_options,
            already_voted: true,
        }
    }
}

/// One field-level validation failure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Events sent from client to server over the live channel.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a poll's room and receive its current snapshot
    JoinPoll {
        #[serde(rename = "pollId")]
        poll_id: Uuid,
    },
    /// Cast a vote for one option of a poll
    CastVote {
        #[serde(rename = "pollId")]
        poll_id: Uuid,
        #[serde(rename = "optionId")]
        option_id: Uuid,
    },
    /// Unsubscribe from a poll's room
    LeavePoll {
        #[serde(rename = "pollId")]
        poll_id: Uuid,
    },
}

/// Events sent from server to client over the live channel.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Reply to `join_poll`: the current poll snapshot
    PollJoined {
        poll: Poll,
        #[serde(rename = "hasVoted")]
        has_voted: bool,
    },
    /// Fan-out to a room after a successful vote (sender excluded)
    PollUpdated {
        #[serde(rename = "pollId")]
        poll_id: Uuid,
        options: Vec<PollOption>,
    },
    /// Personalized reply to the voter after a successful vote
    VoteSuccess {
        #[serde(rename = "pollId")]
        poll_id: Uuid,
        #[serde(rename = "optionId")]
        option_id: Uuid,
        options: Vec<PollOption>,
    },
    /// Sent to the voter only; never broadcast to the room
    VoteError { code: String, message: String },
    /// Generic error event; the connection stays open
    Error { code: String, message: String },
}
