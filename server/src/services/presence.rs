//! Connection hub — per-room table of live participants, plus broadcast.
//!
//! DESIGN
//! ======
//! Each room's connection set lives behind its own lock; joining resolves
//! (or creates) the shard under the outer map lock, then all mutation
//! happens under the shard lock alone. Broadcast is best-effort `try_send`
//! fan-out: a slow or broken recipient is skipped, never waited on, and
//! never cleaned up here — the transport session's teardown path owns
//! registry cleanup so a failed send can't race it into a double removal.

use protocol::{Envelope, Participant, Point};
use tokio::sync::mpsc;
use tracing::info;

use crate::state::{AppState, Connection, HubShard};

/// Resolve a room's hub shard, creating it on first join.
async fn shard(state: &AppState, room_id: &str) -> HubShard {
    {
        let hub = state.hub.read().await;
        if let Some(shard) = hub.get(room_id) {
            return shard.clone();
        }
    }
    let mut hub = state.hub.write().await;
    hub.entry(room_id.to_owned()).or_default().clone()
}

/// Register a connection and a fresh participant in a room.
///
/// Last join wins: an existing registration under the same user id is
/// silently replaced, which also retires the previous connection's channel.
pub async fn join(
    state: &AppState,
    room_id: &str,
    user_id: &str,
    name: &str,
    tx: mpsc::Sender<String>,
) -> Participant {
    let name = name.trim();
    let display_name = if name.is_empty() {
        // Anonymous joins get a short readable handle. User ids are opaque
        // client strings, so truncate by characters, not bytes.
        let prefix: String = user_id.chars().take(6).collect();
        format!("User {prefix}")
    } else {
        name.to_owned()
    };

    let participant = Participant {
        id: user_id.to_owned(),
        name: display_name,
        cursor: None,
        is_drawing: false,
    };

    let shard = shard(state, room_id).await;
    let mut room = shard.write().await;
    room.connections
        .insert(user_id.to_owned(), Connection { tx, participant: participant.clone() });

    info!(%room_id, %user_id, participants = room.connections.len(), "participant joined");
    participant
}

/// Update a participant's cursor position and drawing flag. No-op for an
/// unknown participant or room.
pub async fn update_cursor(
    state: &AppState,
    room_id: &str,
    user_id: &str,
    cursor: Option<Point>,
    is_drawing: bool,
) {
    let shard = {
        let hub = state.hub.read().await;
        hub.get(room_id).cloned()
    };
    let Some(shard) = shard else { return };

    let mut room = shard.write().await;
    if let Some(connection) = room.connections.get_mut(user_id) {
        connection.participant.cursor = cursor;
        connection.participant.is_drawing = is_drawing;
    }
}

/// Remove a participant. When the room's connection set empties, the set
/// itself is deregistered; room metadata and strokes are untouched.
pub async fn leave(state: &AppState, room_id: &str, user_id: &str) {
    let shard = {
        let hub = state.hub.read().await;
        hub.get(room_id).cloned()
    };
    let Some(shard) = shard else { return };

    let emptied = {
        let mut room = shard.write().await;
        room.connections.remove(user_id);
        info!(%room_id, %user_id, remaining = room.connections.len(), "participant left");
        room.connections.is_empty()
    };

    if emptied {
        // Re-check under the outer write lock: a join may have landed between
        // releasing the shard lock and acquiring the map lock.
        let mut hub = state.hub.write().await;
        let still_empty = match hub.get(room_id) {
            Some(shard) => shard.read().await.connections.is_empty(),
            None => false,
        };
        if still_empty {
            hub.remove(room_id);
            info!(%room_id, "deregistered empty connection set");
        }
    }
}

/// Snapshot the room's current participants. Used to seed a joiner's
/// presence view.
pub async fn list_participants(state: &AppState, room_id: &str) -> Vec<Participant> {
    let shard = {
        let hub = state.hub.read().await;
        hub.get(room_id).cloned()
    };
    let Some(shard) = shard else { return Vec::new() };

    let room = shard.read().await;
    room.connections
        .values()
        .map(|connection| connection.participant.clone())
        .collect()
}

/// Deliver one envelope to every open connection in the room except the
/// excluded user. Best-effort and non-blocking per recipient; a full or
/// closed channel is skipped and the loop continues.
pub async fn broadcast(state: &AppState, room_id: &str, envelope: &Envelope, exclude: Option<&str>) {
    let shard = {
        let hub = state.hub.read().await;
        hub.get(room_id).cloned()
    };
    let Some(shard) = shard else { return };

    let encoded = protocol::encode_message(envelope);
    let room = shard.read().await;
    for (user_id, connection) in &room.connections {
        if exclude == Some(user_id.as_str()) {
            continue;
        }
        let _ = connection.tx.try_send(encoded.clone());
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
