//! Stroke log — the append-only, per-room ordered store of strokes.
//!
//! This is the authoritative state used to seed a newly joined or reloading
//! client. Appends do not check the registry: a log for an unknown room id
//! is implicitly created on first append.

use protocol::Stroke;
use uuid::Uuid;

use crate::state::{AppState, StrokeShard};

#[derive(Debug, thiserror::Error)]
pub enum StrokeError {
    #[error("stroke must contain at least one point")]
    EmptyStroke,
}

/// Resolve a room's shard, creating it on first use.
async fn shard(state: &AppState, room_id: &str) -> StrokeShard {
    {
        let shards = state.strokes.read().await;
        if let Some(shard) = shards.get(room_id) {
            return shard.clone();
        }
    }
    let mut shards = state.strokes.write().await;
    shards.entry(room_id.to_owned()).or_default().clone()
}

/// Append one stroke. Assigns the id and timestamp; the wire form's own id
/// and timestamp are ignored.
///
/// # Errors
///
/// Returns [`StrokeError::EmptyStroke`] if the payload carries no points;
/// the caller drops the message without broadcasting it.
pub async fn append(state: &AppState, room_id: &str, payload: &Stroke) -> Result<Stroke, StrokeError> {
    if payload.points.is_empty() {
        return Err(StrokeError::EmptyStroke);
    }

    let stroke = Stroke {
        id: Uuid::new_v4().to_string(),
        room_id: room_id.to_owned(),
        points: payload.points.clone(),
        color: payload.color.clone(),
        size: payload.size,
        tool: payload.tool,
        timestamp: protocol::now_ms(),
    };

    let shard = shard(state, room_id).await;
    shard.write().await.push(stroke.clone());
    Ok(stroke)
}

/// List a room's strokes in append order. Empty for an unknown room.
pub async fn list(state: &AppState, room_id: &str) -> Vec<Stroke> {
    let shard = {
        let shards = state.strokes.read().await;
        shards.get(room_id).cloned()
    };
    match shard {
        Some(shard) => shard.read().await.clone(),
        None => Vec::new(),
    }
}

/// Replace a room's stroke sequence with empty. Idempotent; an unknown room
/// stays unknown.
pub async fn clear(state: &AppState, room_id: &str) {
    let shard = {
        let shards = state.strokes.read().await;
        shards.get(room_id).cloned()
    };
    if let Some(shard) = shard {
        shard.write().await.clear();
    }
}

#[cfg(test)]
#[path = "stroke_test.rs"]
mod tests;
