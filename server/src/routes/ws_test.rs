use protocol::{CursorUpdate, Participant, Payload, Point};
use tokio::time::{Duration, timeout};

use super::*;
use crate::services::stroke;
use crate::state::test_helpers;

fn wire(room_id: &str, user_id: &str, payload: Payload) -> String {
    protocol::encode_message(&Envelope::new(room_id, user_id, payload))
}

fn join_payload(name: &str) -> Payload {
    Payload::UserJoin(Participant {
        id: String::new(),
        name: name.into(),
        cursor: None,
        is_drawing: false,
    })
}

/// Run a join handshake through the dispatcher and return the bound session,
/// the session's broadcast receiver, its sender, and the unicast frames.
async fn join_session(
    state: &AppState,
    room_id: &str,
    user_id: &str,
    name: &str,
) -> (Option<SessionIdentity>, mpsc::Receiver<String>, mpsc::Sender<String>, Vec<String>) {
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let mut session = None;
    let frames =
        handle_inbound_text(state, &mut session, &tx, &wire(room_id, user_id, join_payload(name))).await;
    (session, rx, tx, frames)
}

async fn recv_broadcast(rx: &mut mpsc::Receiver<String>) -> Envelope {
    let text = timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("broadcast receive timed out")
        .expect("broadcast channel closed unexpectedly");
    protocol::decode_message(&text)
        .expect("broadcast should decode")
        .expect("broadcast should be a known type")
}

async fn assert_no_broadcast(rx: &mut mpsc::Receiver<String>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected no broadcast message"
    );
}

// =============================================================================
// HANDSHAKE
// =============================================================================

#[tokio::test]
async fn join_binds_the_session_and_unicasts_the_roster() {
    let state = test_helpers::test_state();

    let (session, _rx, _tx, frames) = join_session(&state, "room-1", "u1", "Alice").await;

    assert_eq!(
        session,
        Some(SessionIdentity { room_id: "room-1".into(), user_id: "u1".into() })
    );

    assert_eq!(frames.len(), 1);
    let unicast = protocol::decode_message(&frames[0]).unwrap().unwrap();
    assert_eq!(unicast.user_id, protocol::SERVER_USER_ID);
    assert_eq!(unicast.room_id, "room-1");
    let Payload::UsersList(roster) = unicast.payload else {
        panic!("expected a users-list unicast");
    };
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].id, "u1");
    assert_eq!(roster[0].name, "Alice");
}

#[tokio::test]
async fn join_notifies_peers_but_not_the_joiner() {
    let state = test_helpers::test_state();
    let (_s1, mut rx1, _tx1, _) = join_session(&state, "room-1", "u1", "Alice").await;
    let (_s2, mut rx2, _tx2, _) = join_session(&state, "room-1", "u2", "Bob").await;

    let seen = recv_broadcast(&mut rx1).await;
    assert_eq!(seen.user_id, "u2");
    let Payload::UserJoin(participant) = seen.payload else {
        panic!("expected a user-join notice");
    };
    assert_eq!(participant.name, "Bob");

    // The joiner learns about the room through the unicast, not a broadcast.
    assert_no_broadcast(&mut rx2).await;
}

#[tokio::test]
async fn rejoin_to_a_new_room_parts_the_previous_one() {
    let state = test_helpers::test_state();
    let (_sp, mut rx_peer, _txp, _) = join_session(&state, "room-a", "peer", "Peer").await;

    let (mut session, _rx, tx, _) = join_session(&state, "room-a", "u1", "Alice").await;
    recv_broadcast(&mut rx_peer).await; // Alice's join notice.

    handle_inbound_text(&state, &mut session, &tx, &wire("room-b", "u1", join_payload("Alice"))).await;

    assert_eq!(
        session,
        Some(SessionIdentity { room_id: "room-b".into(), user_id: "u1".into() })
    );

    let notice = recv_broadcast(&mut rx_peer).await;
    let Payload::UserLeave(left) = notice.payload else {
        panic!("expected a user-leave notice");
    };
    assert_eq!(left.user_id, "u1");
    assert!(
        !crate::services::presence::list_participants(&state, "room-a")
            .await
            .iter()
            .any(|p| p.id == "u1")
    );
}

// =============================================================================
// GATING
// =============================================================================

#[tokio::test]
async fn messages_before_the_handshake_are_dropped() {
    let state = test_helpers::test_state();
    let (tx, _rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let mut session = None;

    let stroke_text = wire("room-1", "u1", Payload::Stroke(test_helpers::wire_stroke()));
    let frames = handle_inbound_text(&state, &mut session, &tx, &stroke_text).await;

    assert!(frames.is_empty());
    assert!(session.is_none());
    assert!(stroke::list(&state, "room-1").await.is_empty());
}

#[tokio::test]
async fn messages_addressed_outside_the_session_are_dropped() {
    let state = test_helpers::test_state();
    let (mut session, _rx, tx, _) = join_session(&state, "room-1", "u1", "Alice").await;

    let foreign_room = wire("room-2", "u1", Payload::Stroke(test_helpers::wire_stroke()));
    handle_inbound_text(&state, &mut session, &tx, &foreign_room).await;
    let foreign_user = wire("room-1", "u2", Payload::Stroke(test_helpers::wire_stroke()));
    handle_inbound_text(&state, &mut session, &tx, &foreign_user).await;

    assert!(stroke::list(&state, "room-1").await.is_empty());
    assert!(stroke::list(&state, "room-2").await.is_empty());
}

#[tokio::test]
async fn unknown_types_and_malformed_text_are_ignored() {
    let state = test_helpers::test_state();
    let (mut session, _rx, tx, _) = join_session(&state, "room-1", "u1", "Alice").await;
    let bound = session.clone();

    let unknown = r#"{"type":"telemetry","data":{},"roomId":"room-1","userId":"u1"}"#;
    assert!(handle_inbound_text(&state, &mut session, &tx, unknown).await.is_empty());
    assert!(handle_inbound_text(&state, &mut session, &tx, "not json at all").await.is_empty());
    assert!(handle_inbound_text(&state, &mut session, &tx, r#"{"data":{}}"#).await.is_empty());

    // The session stays bound throughout.
    assert_eq!(session, bound);
}

#[tokio::test]
async fn echoed_server_types_are_ignored() {
    let state = test_helpers::test_state();
    let (mut session, _rx, tx, _) = join_session(&state, "room-1", "u1", "Alice").await;

    let leave = wire("room-1", "u1", Payload::UserLeave(UserLeave { user_id: "u1".into() }));
    handle_inbound_text(&state, &mut session, &tx, &leave).await;
    let roster = wire("room-1", "u1", Payload::UsersList(Vec::new()));
    handle_inbound_text(&state, &mut session, &tx, &roster).await;

    assert_eq!(
        crate::services::presence::list_participants(&state, "room-1").await.len(),
        1
    );
}

// =============================================================================
// RELAY
// =============================================================================

#[tokio::test]
async fn stroke_is_persisted_then_relayed_with_server_fields() {
    let state = test_helpers::test_state();
    let (_s1, mut rx1, _tx1, _) = join_session(&state, "room-1", "u1", "Alice").await;
    let (mut s2, mut rx2, tx2, _) = join_session(&state, "room-1", "u2", "Bob").await;
    recv_broadcast(&mut rx1).await; // Bob's join notice.

    let payload = test_helpers::wire_stroke();
    handle_inbound_text(&state, &mut s2, &tx2, &wire("room-1", "u2", Payload::Stroke(payload.clone()))).await;

    let relayed = recv_broadcast(&mut rx1).await;
    assert_eq!(relayed.user_id, "u2");
    let Payload::Stroke(stroke) = relayed.payload else {
        panic!("expected a stroke relay");
    };
    assert_ne!(stroke.id, payload.id);
    assert_eq!(stroke.room_id, "room-1");
    assert!(stroke.timestamp > 0);
    assert_eq!(stroke.points, payload.points);

    // Persisted first, so the relayed stroke matches the log entry.
    let log = stroke::list(&state, "room-1").await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, stroke.id);

    // The drawer already has it locally.
    assert_no_broadcast(&mut rx2).await;
}

#[tokio::test]
async fn empty_stroke_is_neither_persisted_nor_relayed() {
    let state = test_helpers::test_state();
    let (_s1, mut rx1, _tx1, _) = join_session(&state, "room-1", "u1", "Alice").await;
    let (mut s2, mut rx2, tx2, _) = join_session(&state, "room-1", "u2", "Bob").await;
    recv_broadcast(&mut rx1).await;

    let mut payload = test_helpers::wire_stroke();
    payload.points.clear();
    handle_inbound_text(&state, &mut s2, &tx2, &wire("room-1", "u2", Payload::Stroke(payload))).await;

    assert!(stroke::list(&state, "room-1").await.is_empty());
    assert_no_broadcast(&mut rx1).await;
    rx2.close();
}

#[tokio::test]
async fn cursor_updates_presence_and_relays_to_peers() {
    let state = test_helpers::test_state();
    let (_s1, mut rx1, _tx1, _) = join_session(&state, "room-1", "u1", "Alice").await;
    let (mut s2, _rx2, tx2, _) = join_session(&state, "room-1", "u2", "Bob").await;
    recv_broadcast(&mut rx1).await;

    let update = CursorUpdate { cursor: Some(Point { x: 7.0, y: 9.0 }), is_drawing: true };
    handle_inbound_text(&state, &mut s2, &tx2, &wire("room-1", "u2", Payload::Cursor(update))).await;

    let relayed = recv_broadcast(&mut rx1).await;
    assert_eq!(relayed.user_id, "u2");
    assert!(matches!(relayed.payload, Payload::Cursor(seen) if seen == update));

    let roster = crate::services::presence::list_participants(&state, "room-1").await;
    let bob = roster.iter().find(|p| p.id == "u2").expect("bob should be present");
    assert_eq!(bob.cursor, Some(Point { x: 7.0, y: 9.0 }));
    assert!(bob.is_drawing);
}

#[tokio::test]
async fn clear_canvas_empties_the_log_and_relays() {
    let state = test_helpers::test_state();
    let (_s1, mut rx1, _tx1, _) = join_session(&state, "room-1", "u1", "Alice").await;
    let (mut s2, mut rx2, tx2, _) = join_session(&state, "room-1", "u2", "Bob").await;
    recv_broadcast(&mut rx1).await;
    stroke::append(&state, "room-1", &test_helpers::wire_stroke()).await.unwrap();

    handle_inbound_text(&state, &mut s2, &tx2, &wire("room-1", "u2", Payload::ClearCanvas {})).await;

    assert!(stroke::list(&state, "room-1").await.is_empty());
    let relayed = recv_broadcast(&mut rx1).await;
    assert!(matches!(relayed.payload, Payload::ClearCanvas {}));
    assert_no_broadcast(&mut rx2).await;
}

// =============================================================================
// TEARDOWN
// =============================================================================

#[tokio::test]
async fn close_session_parts_the_room_and_notifies_peers() {
    let state = test_helpers::test_state();
    let (_s1, mut rx1, _tx1, _) = join_session(&state, "room-1", "u1", "Alice").await;
    let (session, _rx2, _tx2, _) = join_session(&state, "room-1", "u2", "Bob").await;
    recv_broadcast(&mut rx1).await;

    close_session(&state, session).await;

    let notice = recv_broadcast(&mut rx1).await;
    assert_eq!(notice.user_id, protocol::SERVER_USER_ID);
    let Payload::UserLeave(left) = notice.payload else {
        panic!("expected a user-leave notice");
    };
    assert_eq!(left.user_id, "u2");
    assert_eq!(
        crate::services::presence::list_participants(&state, "room-1").await.len(),
        1
    );
}

#[tokio::test]
async fn close_unbound_session_is_a_noop() {
    let state = test_helpers::test_state();
    close_session(&state, None).await;
    assert!(state.hub.read().await.is_empty());
}

#[tokio::test]
async fn disconnect_while_drawing_removes_presence_with_the_flag_set() {
    let state = test_helpers::test_state();
    let (_s1, mut rx1, _tx1, _) = join_session(&state, "room-1", "u1", "Alice").await;
    let (mut s2, _rx2, tx2, _) = join_session(&state, "room-1", "u2", "Bob").await;
    recv_broadcast(&mut rx1).await;

    let update = CursorUpdate { cursor: Some(Point { x: 1.0, y: 1.0 }), is_drawing: true };
    handle_inbound_text(&state, &mut s2, &tx2, &wire("room-1", "u2", Payload::Cursor(update))).await;
    recv_broadcast(&mut rx1).await;

    // Socket drops mid-stroke. The peer still gets a clean leave and the
    // mid-draw presence never lingers.
    close_session(&state, s2.take()).await;

    let notice = recv_broadcast(&mut rx1).await;
    assert!(matches!(notice.payload, Payload::UserLeave(left) if left.user_id == "u2"));
    assert!(
        !crate::services::presence::list_participants(&state, "room-1")
            .await
            .iter()
            .any(|p| p.id == "u2")
    );
}
