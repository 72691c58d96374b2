// ============================
// crates/backend-lib/src/handlers/polls.rs
// ============================
//! REST poll gateway: create, fetch, list, close.
//!
//! These call into the poll store directly; there is no concurrency hazard
//! here. The vote path lives on the live gateway.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use livepoll_common::CreatePollInput;
use metrics::counter;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::http_identity_hints;
use crate::identity::resolve_voter_identity;
use crate::metrics::{POLL_CLOSED, POLL_CREATED};
use crate::store::PollStore;
use crate::validation;
use crate::AppState;

/// `POST /api/polls`
pub async fn create_poll<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(input): Json<CreatePollInput>,
) -> Result<impl IntoResponse, AppError>
where
    S: PollStore + Clone + Send + Sync + 'static,
{
    validation::validate_create_poll(&input)?;

    let poll = state.store.create_poll(&input).await?;
    counter!(POLL_CREATED).increment(1);
    tracing::info!(poll_id = %poll.id, options = poll.options.len(), "poll created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": poll })),
    ))
}

/// `GET /api/polls/{poll_id}` — poll payload plus `hasVoted` for the caller.
pub async fn get_poll<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(poll_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError>
where
    S: PollStore + Clone + Send + Sync + 'static,
{
    let poll = state
        .store
        .get_poll(poll_id)
        .await?
        .ok_or(AppError::PollNotFound)?;

    let hints = http_identity_hints(&headers);
    let voter = resolve_voter_identity(&hints);
    let has_voted = state.engine.has_voted(poll_id, &voter).await?;

    let mut data = serde_json::to_value(&poll)?;
    data["hasVoted"] = json!(has_voted);

    Ok(Json(json!({ "success": true, "data": data })))
}

/// `GET /api/polls` — active polls only, newest first.
pub async fn list_polls<S>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, AppError>
where
    S: PollStore + Clone + Send + Sync + 'static,
{
    let polls = state.store.list_active_polls().await?;
    Ok(Json(json!({ "success": true, "data": polls })))
}

/// `PATCH /api/polls/{poll_id}/close` — idempotent transition to inactive.
pub async fn close_poll<S>(
    State(state): State<Arc<AppState<S>>>,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError>
where
    S: PollStore + Clone + Send + Sync + 'static,
{
    state.store.close_poll(poll_id).await?;
    counter!(POLL_CLOSED).increment(1);
    tracing::info!(%poll_id, "poll closed");

    Ok(Json(
        json!({ "success": true, "message": "Poll closed successfully" }),
    ))
}
