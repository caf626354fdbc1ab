//! Transport session — the websocket endpoint and its message loop.
//!
//! ARCHITECTURE
//! ============
//! Each accepted socket runs one `run_ws` task. The task owns both halves of
//! the connection: it reads inbound frames off the socket and drains the
//! session's broadcast channel, multiplexed through `tokio::select!`. A
//! session starts unbound; the first `user-join` message completes the
//! handshake and binds it to a (room, user) pair. Everything that arrives
//! before that, or addressed outside the bound pair, is dropped.
//!
//! Teardown is unconditional: whatever path exits the loop (clean close,
//! protocol error, send failure), a bound session is parted from its room
//! exactly once and a `user-leave` notice goes out to the peers.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use protocol::{Envelope, Participant, Payload, UserLeave};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::services::{presence, stroke};
use crate::state::{AppState, OUTBOUND_CAPACITY};

/// The (room, user) pair a session is bound to once its join handshake
/// completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity {
    pub room_id: String,
    pub user_id: String,
}

/// `GET /api/ws` — upgrade to a websocket session.
pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(state, socket))
}

async fn run_ws(state: AppState, mut socket: WebSocket) {
    let (client_tx, mut client_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let mut session: Option<SessionIdentity> = None;

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let frames = handle_inbound_text(&state, &mut session, &client_tx, text.as_str()).await;
                        let mut failed = false;
                        for frame in frames {
                            if socket.send(Message::Text(frame.into())).await.is_err() {
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping/pong is answered by the library; binary frames are
                    // not part of this protocol.
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "websocket receive error");
                        break;
                    }
                }
            }
            outbound = client_rx.recv() => {
                // This task keeps a sender alive for the whole loop, so the
                // channel cannot close underneath us.
                let Some(text) = outbound else { break };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    close_session(&state, session.take()).await;
}

// =============================================================================
// INBOUND DISPATCH
// =============================================================================

/// Dispatch one inbound text frame against the shared state. Returns the
/// frames owed to this session's own socket (the `users-list` unicast on
/// join); everything addressed to peers goes through the broadcast channels.
async fn handle_inbound_text(
    state: &AppState,
    session: &mut Option<SessionIdentity>,
    client_tx: &mpsc::Sender<String>,
    text: &str,
) -> Vec<String> {
    let envelope = match protocol::decode_message(text) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            debug!("ignoring message with unrecognized type");
            return Vec::new();
        }
        Err(err) => {
            warn!(error = %err, "dropping malformed message");
            return Vec::new();
        }
    };
    let Envelope { room_id, user_id, payload } = envelope;

    match payload {
        Payload::UserJoin(joiner) => {
            handle_join(state, session, client_tx, room_id, user_id, &joiner).await
        }
        Payload::Stroke(wire) => {
            if session_bound(session, &room_id, &user_id) {
                match stroke::append(state, &room_id, &wire).await {
                    Ok(stored) => {
                        let relay = Envelope::new(&room_id, &user_id, Payload::Stroke(stored));
                        presence::broadcast(state, &room_id, &relay, Some(&user_id)).await;
                    }
                    Err(err) => warn!(%room_id, %user_id, error = %err, "rejected stroke"),
                }
            }
            Vec::new()
        }
        Payload::Cursor(update) => {
            if session_bound(session, &room_id, &user_id) {
                presence::update_cursor(state, &room_id, &user_id, update.cursor, update.is_drawing).await;
                let relay = Envelope::new(&room_id, &user_id, Payload::Cursor(update));
                presence::broadcast(state, &room_id, &relay, Some(&user_id)).await;
            }
            Vec::new()
        }
        Payload::ClearCanvas {} => {
            if session_bound(session, &room_id, &user_id) {
                stroke::clear(state, &room_id).await;
                let relay = Envelope::new(&room_id, &user_id, Payload::ClearCanvas {});
                presence::broadcast(state, &room_id, &relay, Some(&user_id)).await;
            }
            Vec::new()
        }
        // Server-originated types; a client echoing them back is ignored.
        Payload::UserLeave(_) | Payload::UsersList(_) => Vec::new(),
    }
}

/// A non-join message is only honored from a bound session whose identity
/// matches the envelope's addressing.
fn session_bound(session: &Option<SessionIdentity>, room_id: &str, user_id: &str) -> bool {
    match session {
        None => {
            debug!(%room_id, %user_id, "dropping message from a session that never joined");
            false
        }
        Some(identity) if identity.room_id != room_id || identity.user_id != user_id => {
            debug!(%room_id, %user_id, "dropping message addressed outside the bound session");
            false
        }
        Some(_) => true,
    }
}

/// Complete (or move) the join handshake: register with the hub, notify the
/// peers, and return the roster unicast for the joiner.
async fn handle_join(
    state: &AppState,
    session: &mut Option<SessionIdentity>,
    client_tx: &mpsc::Sender<String>,
    room_id: String,
    user_id: String,
    joiner: &Participant,
) -> Vec<String> {
    // A second join on the same socket moves the session: part the previous
    // room with the usual leave notice before binding to the new one.
    if let Some(previous) = session.take() {
        if previous.room_id != room_id || previous.user_id != user_id {
            leave_and_notify(state, &previous).await;
        }
    }

    let participant = presence::join(state, &room_id, &user_id, &joiner.name, client_tx.clone()).await;

    let notice = Envelope::new(&room_id, &user_id, Payload::UserJoin(participant));
    presence::broadcast(state, &room_id, &notice, Some(&user_id)).await;

    let roster = presence::list_participants(state, &room_id).await;
    let unicast = Envelope::new(&room_id, protocol::SERVER_USER_ID, Payload::UsersList(roster));

    *session = Some(SessionIdentity { room_id, user_id });
    vec![protocol::encode_message(&unicast)]
}

// =============================================================================
// TEARDOWN
// =============================================================================

/// Part a bound session from its room. Safe to call with `None`.
async fn close_session(state: &AppState, session: Option<SessionIdentity>) {
    if let Some(identity) = session {
        leave_and_notify(state, &identity).await;
    }
}

async fn leave_and_notify(state: &AppState, identity: &SessionIdentity) {
    presence::leave(state, &identity.room_id, &identity.user_id).await;
    let notice = Envelope::new(
        &identity.room_id,
        protocol::SERVER_USER_ID,
        Payload::UserLeave(UserLeave { user_id: identity.user_id.clone() }),
    );
    presence::broadcast(state, &identity.room_id, &notice, None).await;
    info!(room_id = %identity.room_id, user_id = %identity.user_id, "session closed");
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
