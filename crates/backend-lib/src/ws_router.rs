// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! Router and live connection handling.
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap, HeaderValue, Method},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use livepoll_common::{ClientEvent, ConnectionId, ServerEvent};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::handlers::live::{handle_client_event, LiveConn};
use crate::handlers::polls;
use crate::identity::{first_forwarded_for, resolve_voter_identity, IdentityHints};
use crate::metrics::{WS_ACTIVE, WS_CONNECTION};
use crate::store::PollStore;
use crate::AppState;

/// Create the application router: REST poll gateway + live gateway.
pub fn create_router<S>(state: Arc<AppState<S>>) -> Router
where
    S: PollStore + Clone + Send + Sync + 'static,
{
    let origin = state
        .settings
        .client_url
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000"));

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route(
            "/api/polls",
            post(polls::create_poll::<S>).get(polls::list_polls::<S>),
        )
        .route("/api/polls/{poll_id}", get(polls::get_poll::<S>))
        .route("/api/polls/{poll_id}/close", patch(polls::close_poll::<S>))
        .route("/ws", get(ws_handler::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Handler for live connections
pub async fn ws_handler<S>(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse
where
    S: PollStore + Clone + Send + Sync + 'static,
{
    counter!(WS_CONNECTION).increment(1);

    // Resolve the voter identity once, from the upgrade request.
    let conn_id: ConnectionId = Uuid::new_v4();
    let hints = IdentityHints {
        session_token: params.get("session_id").cloned(),
        forwarded_for: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(first_forwarded_for)
            .map(String::from),
        peer_addr: headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        connection_id: Some(conn_id.to_string()),
    };
    let voter = resolve_voter_identity(&hints);

    ws.on_upgrade(move |socket| handle_connection(socket, state, conn_id, voter))
}

async fn handle_connection<S>(
    socket: WebSocket,
    state: Arc<AppState<S>>,
    conn_id: ConnectionId,
    voter: String,
) where
    S: PollStore + Clone + Send + Sync + 'static,
{
    gauge!(WS_ACTIVE).increment(1.0);

    let (mut ws_tx, mut ws_rx) = socket.split();

    // One outbound channel per connection; the broadcaster clones its sender.
    let (event_tx, mut event_rx) =
        mpsc::channel::<ServerEvent>(state.settings.ws_channel_capacity);

    // Forward outbound events to the socket as JSON text frames
    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let conn = LiveConn {
        id: conn_id,
        voter,
        tx: event_tx.clone(),
    };
    tracing::info!(conn = %conn_id, voter = %conn.voter, "live connection established");

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if let Err(err) = handle_client_event(&state, &conn, event).await {
                        // errors become events; the connection lives on
                        tracing::error!(conn = %conn_id, error = %err, "live event failed");
                        let _ = event_tx
                            .send(ServerEvent::Error {
                                code: err.error_code().to_string(),
                                message: err.sanitized_message(),
                            })
                            .await;
                    }
                },
                Err(parse_err) => {
                    let _ = event_tx
                        .send(ServerEvent::Error {
                            code: "MALFORMED_EVENT".to_string(),
                            message: parse_err.to_string(),
                        })
                        .await;
                },
            },
            Message::Close(_) => break,
            _ => {},
        }
    }

    // Implicit leave from every joined room, on every exit path.
    state.rooms.disconnect(conn_id);

    gauge!(WS_ACTIVE).decrement(1.0);
    tracing::info!(conn = %conn_id, "live connection closed");

    send_task.abort();
}
