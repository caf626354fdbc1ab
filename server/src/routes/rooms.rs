//! Room REST surface — creation, lookup, and the stroke log endpoints.
//!
//! The delete-strokes route is the out-of-band twin of the live
//! `clear-canvas` message: one clear operation, two entry points, and both
//! end in the identical broadcast so connected clients cannot tell them
//! apart.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use protocol::{Envelope, Payload, Stroke};
use serde::Deserialize;

use crate::services::room::RoomError;
use crate::services::{presence, room, stroke};
use crate::state::{AppState, Room};

#[derive(Deserialize)]
pub struct CreateRoomBody {
    pub name: Option<String>,
}

/// `POST /api/rooms` — create a room.
pub async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomBody>,
) -> Result<(StatusCode, Json<Room>), StatusCode> {
    let name = body.name.as_deref().unwrap_or("");
    let created = room::create(&state, name).await.map_err(room_error_to_status)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/rooms` — list all rooms.
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<Room>> {
    Json(room::list(&state).await)
}

/// `GET /api/rooms/{id}` — fetch one room.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Room>, StatusCode> {
    let found = room::get(&state, &room_id).await.map_err(room_error_to_status)?;
    Ok(Json(found))
}

/// `GET /api/rooms/{id}/strokes` — the room's ordered stroke log.
pub async fn list_strokes(State(state): State<AppState>, Path(room_id): Path<String>) -> Json<Vec<Stroke>> {
    Json(stroke::list(&state, &room_id).await)
}

/// `DELETE /api/rooms/{id}/strokes` — clear the log and notify the room.
pub async fn clear_strokes(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Json<serde_json::Value> {
    stroke::clear(&state, &room_id).await;

    // Same notice the live clear-canvas path emits, addressed from the server
    // and delivered to every participant.
    let notice = Envelope::new(&room_id, protocol::SERVER_USER_ID, Payload::ClearCanvas {});
    presence::broadcast(&state, &room_id, &notice, None).await;

    Json(serde_json::json!({ "ok": true }))
}

fn room_error_to_status(err: RoomError) -> StatusCode {
    match err {
        RoomError::InvalidName => StatusCode::BAD_REQUEST,
        RoomError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
