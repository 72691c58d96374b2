// ============================
// crates/backend-lib/src/handlers/live.rs
// ============================
//! Live gateway event handlers.
//!
//! Translates inbound live events into identity + engine + broadcaster
//! calls. Failures are reported back on the sender's own channel as events;
//! nothing here closes the connection, and vote errors are never broadcast
//! to the room.

use livepoll_common::{ClientEvent, ConnectionId, ServerEvent};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::store::PollStore;
use crate::AppState;

/// Per-connection context: id, resolved voter identity, outbound channel.
pub struct LiveConn {
    pub id: ConnectionId,
    pub voter: String,
    pub tx: mpsc::Sender<ServerEvent>,
}

/// Handle one inbound live event.
pub async fn handle_client_event<S>(
    state: &AppState<S>,
    conn: &LiveConn,
    event: ClientEvent,
) -> Result<(), AppError>
where
    S: PollStore + Clone + Send + Sync + 'static,
{
    match event {
        ClientEvent::JoinPoll { poll_id } => {
            let Some(poll) = state.store.get_poll(poll_id).await? else {
                conn.tx
                    .send(ServerEvent::Error {
                        code: AppError::PollNotFound.error_code().to_string(),
                        message: "Poll not found".to_string(),
                    })
                    .await?;
                return Ok(());
            };

            // membership first, snapshot second: a vote landing in between
            // reaches this connection as a regular room update
            state.rooms.join(conn.id, poll_id, conn.tx.clone());
            let has_voted = state.engine.has_voted(poll_id, &conn.voter).await?;

            conn.tx
                .send(ServerEvent::PollJoined { poll, has_voted })
                .await?;
            tracing::info!(conn = %conn.id, %poll_id, "joined poll room");
        },

        ClientEvent::CastVote { poll_id, option_id } => {
            match state.engine.cast_vote(poll_id, option_id, &conn.voter).await {
                Ok(outcome) if outcome.success => {
                    let update = ServerEvent::PollUpdated {
                        poll_id,
                        options: outcome.updated_options.clone(),
                    };
                    state.rooms.publish(poll_id, &update, Some(conn.id)).await;

                    conn.tx
                        .send(ServerEvent::VoteSuccess {
                            poll_id,
                            option_id,
                            options: outcome.updated_options,
                        })
                        .await?;
                },
                Ok(_) => {
                    // duplicate: the sender alone hears about it
                    conn.tx
                        .send(ServerEvent::VoteError {
                            code: AppError::AlreadyVoted.error_code().to_string(),
                            message: "You have already voted".to_string(),
                        })
                        .await?;
                },
                Err(err @ (AppError::PollNotFound | AppError::OptionNotFound)) => {
                    conn.tx
                        .send(ServerEvent::VoteError {
                            code: err.error_code().to_string(),
                            message: err.sanitized_message(),
                        })
                        .await?;
                },
                Err(err) => {
                    tracing::error!(conn = %conn.id, %poll_id, error = %err, "cast vote failed");
                    conn.tx
                        .send(ServerEvent::VoteError {
                            code: err.error_code().to_string(),
                            message: "Failed to cast vote".to_string(),
                        })
                        .await?;
                },
            }
        },

        ClientEvent::LeavePoll { poll_id } => {
            state.rooms.leave(conn.id, poll_id);
            tracing::info!(conn = %conn.id, %poll_id, "left poll room");
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::store::InMemoryPollStore;
    use livepoll_common::CreatePollInput;
    use uuid::Uuid;

    fn setup() -> (AppState<InMemoryPollStore>, InMemoryPollStore) {
        let store = InMemoryPollStore::new();
        let state = AppState::new(store.clone(), Settings::default());
        (state, store)
    }

    fn live_conn(voter: &str) -> (LiveConn, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (
            LiveConn {
                id: Uuid::new_v4(),
                voter: voter.to_string(),
                tx,
            },
            rx,
        )
    }

    async fn make_poll(store: &InMemoryPollStore) -> livepoll_common::Poll {
        store
            .create_poll(&CreatePollInput {
                question: "Pick one?".to_string(),
                description: None,
                created_by: None,
                options: vec!["A".to_string(), "B".to_string()],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn join_emits_snapshot_with_has_voted() {
        let (state, store) = setup();
        let poll = make_poll(&store).await;
        let (conn, mut rx) = live_conn("voter-1");

        handle_client_event(&state, &conn, ClientEvent::JoinPoll { poll_id: poll.id })
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ServerEvent::PollJoined {
                poll: snapshot,
                has_voted,
            } => {
                assert_eq!(snapshot.id, poll.id);
                assert!(!has_voted);
            },
            other => panic!("Expected PollJoined, got {other:?}"),
        }
        assert_eq!(state.rooms.room_size(poll.id), 1);
    }

    #[tokio::test]
    async fn join_missing_poll_emits_error_event() {
        let (state, _store) = setup();
        let (conn, mut rx) = live_conn("voter-1");
        let poll_id = Uuid::new_v4();

        handle_client_event(&state, &conn, ClientEvent::JoinPoll { poll_id })
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ServerEvent::Error { code, .. } => assert_eq!(code, "POLL_001"),
            other => panic!("Expected Error, got {other:?}"),
        }
        assert_eq!(state.rooms.room_size(poll_id), 0);
    }

    #[tokio::test]
    async fn vote_updates_room_and_answers_sender() {
        let (state, store) = setup();
        let poll = make_poll(&store).await;

        let (voter_conn, mut voter_rx) = live_conn("voter-1");
        let (viewer_conn, mut viewer_rx) = live_conn("viewer-1");

        for conn in [&voter_conn, &viewer_conn] {
            handle_client_event(&state, conn, ClientEvent::JoinPoll { poll_id: poll.id })
                .await
                .unwrap();
        }
        // drain the join snapshots
        voter_rx.recv().await.unwrap();
        viewer_rx.recv().await.unwrap();

        handle_client_event(
            &state,
            &voter_conn,
            ClientEvent::CastVote {
                poll_id: poll.id,
                option_id: poll.options[0].id,
            },
        )
        .await
        .unwrap();

        // the room (viewer) gets the tally update
        match viewer_rx.recv().await.unwrap() {
            ServerEvent::PollUpdated { poll_id, options } => {
                assert_eq!(poll_id, poll.id);
                assert_eq!(options[0].vote_count, 1);
            },
            other => panic!("Expected PollUpdated, got {other:?}"),
        }

        // the sender gets the personalized success, not the room update
        match voter_rx.recv().await.unwrap() {
            ServerEvent::VoteSuccess {
                poll_id, option_id, ..
            } => {
                assert_eq!(poll_id, poll.id);
                assert_eq!(option_id, poll.options[0].id);
            },
            other => panic!("Expected VoteSuccess, got {other:?}"),
        }
        assert!(voter_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn duplicate_vote_stays_private_to_sender() {
        let (state, store) = setup();
        let poll = make_poll(&store).await;

        let (voter_conn, mut voter_rx) = live_conn("voter-1");
        let (viewer_conn, mut viewer_rx) = live_conn("viewer-1");

        for conn in [&voter_conn, &viewer_conn] {
            handle_client_event(&state, conn, ClientEvent::JoinPoll { poll_id: poll.id })
                .await
                .unwrap();
        }
        voter_rx.recv().await.unwrap();
        viewer_rx.recv().await.unwrap();

        let cast = ClientEvent::CastVote {
            poll_id: poll.id,
            option_id: poll.options[0].id,
        };
        handle_client_event(&state, &voter_conn, cast.clone())
            .await
            .unwrap();
        voter_rx.recv().await.unwrap();
        viewer_rx.recv().await.unwrap();

        handle_client_event(&state, &voter_conn, cast).await.unwrap();

        match voter_rx.recv().await.unwrap() {
            ServerEvent::VoteError { code, message } => {
                assert_eq!(code, "VOTE_001");
                assert_eq!(message, "You have already voted");
            },
            other => panic!("Expected VoteError, got {other:?}"),
        }
        // the room never hears about the rejected attempt
        assert!(viewer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn vote_for_foreign_option_reports_not_found() {
        let (state, store) = setup();
        let poll = make_poll(&store).await;
        let other = make_poll(&store).await;
        let (conn, mut rx) = live_conn("voter-1");

        handle_client_event(
            &state,
            &conn,
            ClientEvent::CastVote {
                poll_id: poll.id,
                option_id: other.options[0].id,
            },
        )
        .await
        .unwrap();

        match rx.recv().await.unwrap() {
            ServerEvent::VoteError { code, .. } => assert_eq!(code, "POLL_002"),
            other => panic!("Expected VoteError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn leave_removes_membership() {
        let (state, store) = setup();
        let poll = make_poll(&store).await;
        let (conn, mut rx) = live_conn("voter-1");

        handle_client_event(&state, &conn, ClientEvent::JoinPoll { poll_id: poll.id })
            .await
            .unwrap();
        rx.recv().await.unwrap();
        assert_eq!(state.rooms.room_size(poll.id), 1);

        handle_client_event(&state, &conn, ClientEvent::LeavePoll { poll_id: poll.id })
            .await
            .unwrap();
        assert_eq!(state.rooms.room_size(poll.id), 0);
    }
}
