// ============================
// crates/backend-lib/src/rooms.rs
// ============================
//! Room broadcaster.
//!
//! Owns the registry of live connections per poll room and fans tally
//! updates out to every member except (optionally) the publisher. Membership
//! is shared mutable state; it lives in concurrent maps here and nowhere
//! else. `publish` works on a snapshot of the membership taken at call time:
//! members joining mid-publish may or may not see that update, members
//! present throughout always do.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use livepoll_common::{ConnectionId, ServerEvent};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::metrics::{ROOM_JOINED, ROOM_MEMBERS, ROOM_PUBLISH_FAILED};

/// Registry of poll rooms and their live connections.
#[derive(Default)]
pub struct RoomBroadcaster {
    /// poll id -> member connections and their outbound channels
    rooms: DashMap<Uuid, HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
    /// reverse index: connection -> rooms it joined
    joined: DashMap<ConnectionId, HashSet<Uuid>>,
}

impl RoomBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a poll room. Idempotent; re-joining replaces the
    /// stored channel.
    pub fn join(&self, conn: ConnectionId, poll_id: Uuid, tx: mpsc::Sender<ServerEvent>) {
        self.rooms.entry(poll_id).or_default().insert(conn, tx);
        self.joined.entry(conn).or_default().insert(poll_id);

        counter!(ROOM_JOINED).increment(1);
        gauge!(ROOM_MEMBERS).set(self.member_count() as f64);
        tracing::debug!(%conn, %poll_id, "connection joined room");
    }

    /// Remove a connection from a poll room. No-op if it was not a member.
    pub fn leave(&self, conn: ConnectionId, poll_id: Uuid) {
        if let Some(mut members) = self.rooms.get_mut(&poll_id) {
            members.remove(&conn);
        }
        self.rooms.remove_if(&poll_id, |_, members| members.is_empty());

        if let Some(mut rooms) = self.joined.get_mut(&conn) {
            rooms.remove(&poll_id);
        }
        self.joined.remove_if(&conn, |_, rooms| rooms.is_empty());

        gauge!(ROOM_MEMBERS).set(self.member_count() as f64);
        tracing::debug!(%conn, %poll_id, "connection left room");
    }

    /// Implicit leave from every room; called on disconnect through all exit
    /// paths of a connection task.
    pub fn disconnect(&self, conn: ConnectionId) {
        let Some((_, rooms)) = self.joined.remove(&conn) else {
            return;
        };
        for poll_id in rooms {
            if let Some(mut members) = self.rooms.get_mut(&poll_id) {
                members.remove(&conn);
            }
            self.rooms.remove_if(&poll_id, |_, members| members.is_empty());
        }

        gauge!(ROOM_MEMBERS).set(self.member_count() as f64);
        tracing::debug!(%conn, "connection removed from all rooms");
    }

    /// Deliver an event to the current members of a room, excluding
    /// `exclude` when given. Returns the number of deliveries attempted.
    pub async fn publish(
        &self,
        poll_id: Uuid,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        // Snapshot the membership, then release the map before awaiting.
        let recipients: Vec<mpsc::Sender<ServerEvent>> = match self.rooms.get(&poll_id) {
            Some(members) => members
                .iter()
                .filter(|(conn, _)| Some(*conn) != exclude.as_ref())
                .map(|(_, tx)| tx.clone())
                .collect(),
            None => return 0,
        };

        if recipients.is_empty() {
            return 0;
        }

        let mut send_tasks = JoinSet::new();
        for tx in &recipients {
            let tx = tx.clone();
            let event = event.clone();
            send_tasks.spawn(async move { tx.send(event).await });
        }

        let mut failed = 0;
        while let Some(result) = send_tasks.join_next().await {
            match result {
                Ok(Ok(())) => {},
                // receiver gone mid-publish; disconnect cleanup will follow
                Ok(Err(_)) | Err(_) => failed += 1,
            }
        }

        if failed > 0 {
            counter!(ROOM_PUBLISH_FAILED).increment(failed);
            tracing::warn!(%poll_id, failed, "some room members did not receive the update");
        }

        recipients.len()
    }

    /// Current number of members in a room.
    pub fn room_size(&self, poll_id: Uuid) -> usize {
        self.rooms.get(&poll_id).map_or(0, |m| m.len())
    }

    fn member_count(&self) -> usize {
        self.rooms.iter().map(|entry| entry.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(8)
    }

    fn update_event(poll_id: Uuid) -> ServerEvent {
        ServerEvent::PollUpdated {
            poll_id,
            options: vec![],
        }
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();

        rooms.join(conn, poll_id, tx.clone());
        rooms.join(conn, poll_id, tx);
        assert_eq!(rooms.room_size(poll_id), 1);
    }

    #[tokio::test]
    async fn leave_on_unjoined_connection_is_noop() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();
        rooms.leave(Uuid::new_v4(), poll_id);
        assert_eq!(rooms.room_size(poll_id), 0);
    }

    #[tokio::test]
    async fn publish_reaches_members_except_excluded() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();

        let sender_conn = Uuid::new_v4();
        let (sender_tx, mut sender_rx) = channel();
        let viewer_conn = Uuid::new_v4();
        let (viewer_tx, mut viewer_rx) = channel();

        rooms.join(sender_conn, poll_id, sender_tx);
        rooms.join(viewer_conn, poll_id, viewer_tx);

        let delivered = rooms
            .publish(poll_id, &update_event(poll_id), Some(sender_conn))
            .await;
        assert_eq!(delivered, 1);

        let received = viewer_rx.recv().await.unwrap();
        assert!(matches!(received, ServerEvent::PollUpdated { .. }));
        assert!(sender_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_exclusion_reaches_everyone() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let conn = Uuid::new_v4();
            let (tx, rx) = channel();
            rooms.join(conn, poll_id, tx);
            receivers.push(rx);
        }

        let delivered = rooms.publish(poll_id, &update_event(poll_id), None).await;
        assert_eq!(delivered, 3);
        for rx in &mut receivers {
            assert!(rx.recv().await.is_some());
        }
    }

    #[tokio::test]
    async fn publish_to_empty_room_delivers_nothing() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();
        assert_eq!(rooms.publish(poll_id, &update_event(poll_id), None).await, 0);
    }

    #[tokio::test]
    async fn disconnect_removes_from_every_room() {
        let rooms = RoomBroadcaster::new();
        let poll_a = Uuid::new_v4();
        let poll_b = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let (tx, _rx) = channel();

        rooms.join(conn, poll_a, tx.clone());
        rooms.join(conn, poll_b, tx);
        assert_eq!(rooms.room_size(poll_a), 1);
        assert_eq!(rooms.room_size(poll_b), 1);

        rooms.disconnect(conn);
        assert_eq!(rooms.room_size(poll_a), 0);
        assert_eq!(rooms.room_size(poll_b), 0);

        // disconnect of an unknown connection is a no-op
        rooms.disconnect(Uuid::new_v4());
    }

    #[tokio::test]
    async fn leave_then_publish_skips_the_left_member() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();

        let stayer = Uuid::new_v4();
        let (stay_tx, mut stay_rx) = channel();
        let leaver = Uuid::new_v4();
        let (leave_tx, mut leave_rx) = channel();

        rooms.join(stayer, poll_id, stay_tx);
        rooms.join(leaver, poll_id, leave_tx);
        rooms.leave(leaver, poll_id);

        let delivered = rooms.publish(poll_id, &update_event(poll_id), None).await;
        assert_eq!(delivered, 1);
        assert!(stay_rx.recv().await.is_some());
        assert!(leave_rx.try_recv().is_err());
    }
}
