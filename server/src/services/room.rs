//! Room registry — create and lookup of room metadata.
//!
//! Rooms exist independently of connections: the registry never garbage
//! collects, and losing every participant leaves the metadata (and strokes)
//! in place for whoever joins next.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::state::{AppState, Room};

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room name must not be blank")]
    InvalidName,
    #[error("room not found: {0}")]
    NotFound(String),
}

/// Create a new room with a generated id and creation timestamp.
///
/// # Errors
///
/// Returns [`RoomError::InvalidName`] for a blank or whitespace-only name.
pub async fn create(state: &AppState, name: &str) -> Result<Room, RoomError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoomError::InvalidName);
    }

    let room = Room {
        id: Uuid::new_v4().to_string(),
        name: name.to_owned(),
        created_at: OffsetDateTime::now_utc(),
    };

    {
        let mut rooms = state.rooms.write().await;
        rooms.insert(room.id.clone(), room.clone());
    }

    // Seed an empty stroke shard so a fresh room lists as empty, not absent.
    let mut shards = state.strokes.write().await;
    shards.entry(room.id.clone()).or_default();

    info!(room_id = %room.id, name = %room.name, "room created");
    Ok(room)
}

/// Fetch one room by id.
///
/// # Errors
///
/// Returns [`RoomError::NotFound`] for an unknown id.
pub async fn get(state: &AppState, id: &str) -> Result<Room, RoomError> {
    let rooms = state.rooms.read().await;
    rooms.get(id).cloned().ok_or_else(|| RoomError::NotFound(id.to_owned()))
}

/// List all rooms.
pub async fn list(state: &AppState) -> Vec<Room> {
    let rooms = state.rooms.read().await;
    rooms.values().cloned().collect()
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
