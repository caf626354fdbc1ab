//! Shared wire model for the realtime drawing protocol.
//!
//! This crate owns the message envelope used by both `server` and `client`:
//! one JSON object per message, `{type, data, roomId, userId}`, where `type`
//! selects a strictly typed payload variant. Decoding is a two-step
//! discriminated-union parse so a message with an unrecognized `type` can be
//! ignored without being treated as a transport error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sender id used on server-originated envelopes (roster pushes, clears
/// triggered through the REST surface).
pub const SERVER_USER_ID: &str = "server";

/// Every `type` tag this protocol version understands, in wire form.
pub const MESSAGE_TYPES: [&str; 6] = [
    "stroke",
    "cursor",
    "user-join",
    "user-leave",
    "clear-canvas",
    "users-list",
];

/// Error returned by [`decode_message`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The raw text is not a JSON object.
    #[error("invalid message envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    /// The envelope carries no `type` field.
    #[error("message envelope is missing a type")]
    MissingType,
    /// The `type` is known but the envelope does not match its payload shape.
    #[error("malformed {message_type} message: {source}")]
    Payload {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// DATA MODEL
// =============================================================================

/// A coordinate in canvas pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Drawing tool a stroke was made with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    Eraser,
}

/// One continuous pointer-down-to-pointer-up drawing action.
///
/// On the wire a stroke payload may omit `id`, `roomId`, and `timestamp`;
/// the server's log assigns all three on append. A stored stroke always
/// carries them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub room_id: String,
    pub points: Vec<Point>,
    pub color: String,
    pub size: f64,
    pub tool: Tool,
    #[serde(default)]
    pub timestamp: i64,
}

/// A connected user's live presence within a room. Ephemeral; never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
    #[serde(default)]
    pub is_drawing: bool,
}

/// Payload of a `cursor` message: pointer position plus drawing flag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdate {
    #[serde(default)]
    pub cursor: Option<Point>,
    #[serde(default)]
    pub is_drawing: bool,
}

/// Payload of a server-originated `user-leave` notice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeave {
    pub user_id: String,
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// The closed payload union, tagged by the envelope's `type` field with the
/// variant body under `data`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Payload {
    Stroke(Stroke),
    Cursor(CursorUpdate),
    /// Inbound: a join request carrying at least a display name.
    /// Outbound: the full registered participant, relayed to peers.
    UserJoin(Participant),
    UserLeave(UserLeave),
    ClearCanvas {},
    UsersList(Vec<Participant>),
}

/// One message on the wire: room/user addressing plus a typed payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub room_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    #[must_use]
    pub fn new(room_id: &str, user_id: &str, payload: Payload) -> Self {
        Self { room_id: room_id.to_owned(), user_id: user_id.to_owned(), payload }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Decode one wire message.
///
/// Returns `Ok(None)` for a well-formed envelope whose `type` this protocol
/// version does not know — callers ignore it rather than dropping the
/// connection.
///
/// # Errors
///
/// Returns [`DecodeError`] for text that is not valid JSON, envelopes with no
/// `type`, and known types whose payload does not match the expected shape.
pub fn decode_message(text: &str) -> Result<Option<Envelope>, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
    let Some(message_type) = value.get("type").and_then(Value::as_str) else {
        return Err(DecodeError::MissingType);
    };
    if !MESSAGE_TYPES.contains(&message_type) {
        return Ok(None);
    }

    let message_type = message_type.to_owned();
    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| DecodeError::Payload { message_type, source })
}

/// Encode one message for the wire.
#[must_use]
pub fn encode_message(envelope: &Envelope) -> String {
    // Serializing a fully-owned envelope into a string cannot fail.
    serde_json::to_string(envelope).unwrap_or_default()
}

/// Milliseconds since the Unix epoch, the timestamp unit strokes carry.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(duration) = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
