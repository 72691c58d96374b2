// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_ACTIVE: &str = "ws.active";
pub const POLL_CREATED: &str = "poll.created";
pub const POLL_CLOSED: &str = "poll.closed";
pub const VOTE_ACCEPTED: &str = "vote.accepted";
pub const VOTE_DUPLICATE: &str = "vote.duplicate";
pub const ROOM_JOINED: &str = "room.joined";
pub const ROOM_MEMBERS: &str = "room.members";
pub const ROOM_PUBLISH_FAILED: &str = "room.publish_failed";
