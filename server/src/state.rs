//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds three tables keyed by room id, each owned by exactly one component:
//! the room registry (metadata), the stroke log (append-only shards), and
//! the connection hub (live senders + presence). The log and hub store their
//! per-room values behind their own lock, so the outer map lock is held only
//! long enough to resolve a shard; all per-room work serializes on that
//! room's lock and distinct rooms never contend.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::{Participant, Stroke};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{RwLock, mpsc};

/// Capacity of each connection's outbound broadcast channel. A recipient
/// whose channel is full misses messages rather than stalling the sender.
pub const OUTBOUND_CAPACITY: usize = 256;

// =============================================================================
// ROOM
// =============================================================================

/// Room metadata. Created once, never updated or deleted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// One registered connection: the outbound channel carrying pre-encoded
/// envelopes, plus the participant's live presence.
pub struct Connection {
    pub tx: mpsc::Sender<String>,
    pub participant: Participant,
}

/// Per-room live connection set, keyed by user id. Owned exclusively by the
/// hub; deregistered when the last participant leaves. Never outlives the
/// underlying connections.
#[derive(Default)]
pub struct RoomConnections {
    pub connections: HashMap<String, Connection>,
}

/// Per-room shard of the stroke log.
pub type StrokeShard = Arc<RwLock<Vec<Stroke>>>;

/// Per-room shard of the connection hub.
pub type HubShard = Arc<RwLock<RoomConnections>>;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum — all fields are
/// Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    /// Room registry. Append-only in practice: no update or delete exists.
    pub rooms: Arc<RwLock<HashMap<String, Room>>>,
    /// Stroke log shards. A shard may exist for a room id the registry has
    /// never seen; the log is deliberately permissive about that.
    pub strokes: Arc<RwLock<HashMap<String, StrokeShard>>>,
    /// Connection hub shards. Rebuilt empty on restart.
    pub hub: Arc<RwLock<HashMap<String, HubShard>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            strokes: Arc::new(RwLock::new(HashMap::new())),
            hub: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
