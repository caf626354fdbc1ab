#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use protocol::{Envelope, Participant, Payload, Point, Stroke};

use crate::state::canvas::CanvasState;
use crate::state::presence::PresenceState;

/// WebSocket connection status as seen by the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// One client's view of one room: identity, canvas, roster, and the
/// outbound frame channel.
///
/// DESIGN
/// ======
/// The session owns no socket. The embedding transport calls `on_open` /
/// `on_close` around the connection lifecycle, feeds every received text
/// frame to `handle_message`, and drains the receiver returned by `new` to
/// put frames on the wire. Local draw actions apply optimistically and
/// fire-and-forget their envelope; a frame that cannot be queued is logged
/// and dropped rather than surfaced, because the reconnecting transport
/// will re-seed from the server log anyway. Undo and redo deliberately
/// transmit nothing — they rewrite only this client's view.
pub struct RoomSession {
    room_id: String,
    user_id: String,
    display_name: String,
    status: ConnectionStatus,
    pub canvas: CanvasState,
    pub presence: PresenceState,
    outbound: UnboundedSender<String>,
}

impl RoomSession {
    /// Create a session for a room. Returns the session and the receiving
    /// end of its outbound frame channel.
    #[must_use]
    pub fn new(room_id: &str, display_name: &str) -> (Self, UnboundedReceiver<String>) {
        let (outbound, rx) = mpsc::unbounded();
        let session = Self {
            room_id: room_id.to_owned(),
            user_id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.to_owned(),
            status: ConnectionStatus::Disconnected,
            canvas: CanvasState::new(),
            presence: PresenceState::new(),
            outbound,
        };
        (session, rx)
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    // =========================================================================
    // CONNECTION LIFECYCLE
    // =========================================================================

    /// The transport connected: announce this user to the room.
    pub fn on_open(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.send(Payload::UserJoin(Participant {
            id: self.user_id.clone(),
            name: self.display_name.clone(),
            cursor: None,
            is_drawing: false,
        }));
    }

    pub fn on_connecting(&mut self) {
        self.status = ConnectionStatus::Connecting;
    }

    /// The transport dropped. The roster is live-only state and goes stale
    /// immediately; the canvas survives for the reconnect re-seed.
    pub fn on_close(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.presence = PresenceState::new();
    }

    /// Install the server's stroke log, fetched over REST on join or
    /// reload.
    pub fn seed_strokes(&mut self, strokes: Vec<Stroke>) {
        self.canvas.seed(strokes);
    }

    // =========================================================================
    // LOCAL ACTIONS
    // =========================================================================

    /// Apply a finished local stroke and put it on the wire.
    pub fn draw_stroke(&mut self, stroke: Stroke) {
        self.canvas.apply_local_stroke(stroke.clone());
        self.send(Payload::Stroke(stroke));
    }

    /// Report this user's cursor position and drawing flag to the room.
    pub fn move_cursor(&mut self, cursor: Option<Point>, is_drawing: bool) {
        self.send(Payload::Cursor(protocol::CursorUpdate { cursor, is_drawing }));
    }

    /// Clear the whole room's canvas, locally and for every peer.
    pub fn clear_canvas(&mut self) {
        self.canvas.clear();
        self.send(Payload::ClearCanvas {});
    }

    /// Local undo. Nothing is transmitted; peers keep their view.
    pub fn undo(&mut self) -> bool {
        self.canvas.undo()
    }

    /// Local redo. Nothing is transmitted.
    pub fn redo(&mut self) -> bool {
        self.canvas.redo()
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Reduce one received text frame into session state. Malformed or
    /// foreign traffic is logged and dropped; the session survives it.
    pub fn handle_message(&mut self, text: &str) {
        let envelope = match protocol::decode_message(text) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                log::debug!("ignoring message with unrecognized type");
                return;
            }
            Err(err) => {
                log::warn!("dropping malformed message: {err}");
                return;
            }
        };

        if envelope.room_id != self.room_id {
            log::debug!("ignoring message for room {}", envelope.room_id);
            return;
        }
        let from_self = envelope.user_id == self.user_id;

        match envelope.payload {
            Payload::UsersList(roster) => self.presence.replace(roster),
            Payload::UserJoin(participant) => {
                if !from_self {
                    self.presence.insert(participant);
                }
            }
            Payload::UserLeave(left) => self.presence.remove(&left.user_id),
            Payload::Cursor(update) => {
                if !from_self {
                    self.presence.update_cursor(&envelope.user_id, update);
                }
            }
            Payload::Stroke(stroke) => {
                // The server relays strokes to everyone but the drawer, and
                // the drawer already applied it optimistically.
                if !from_self {
                    self.canvas.apply_remote_stroke(stroke);
                }
            }
            Payload::ClearCanvas {} => {
                if !from_self {
                    self.canvas.clear();
                }
            }
        }
    }

    fn send(&self, payload: Payload) {
        let envelope = Envelope::new(&self.room_id, &self.user_id, payload);
        if self.outbound.unbounded_send(protocol::encode_message(&envelope)).is_err() {
            log::warn!("outbound channel closed; dropping frame");
        }
    }
}
