// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core backend functionality for the `livepoll` server: poll storage,
//! the voting engine, room fan-out and the REST/live gateways.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod rooms;
pub mod store;
pub mod validation;
pub mod ws_router;

use std::sync::Arc;

use crate::config::Settings;
use crate::engine::VotingEngine;
use crate::rooms::RoomBroadcaster;
use crate::store::PollStore;

/// Application state shared across all handlers
pub struct AppState<S> {
    /// Poll storage backend
    pub store: S,
    /// Voting engine over the same backend
    pub engine: VotingEngine<S>,
    /// Live room registry
    pub rooms: RoomBroadcaster,
    /// Settings manager
    pub settings: Arc<Settings>,
}

impl<S: PollStore + Clone> AppState<S> {
    /// Create a new application state
    pub fn new(store: S, settings: Settings) -> Self {
        Self {
            engine: VotingEngine::new(store.clone()),
            store,
            rooms: RoomBroadcaster::new(),
            settings: Arc::new(settings),
        }
    }
}
