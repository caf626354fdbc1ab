//! Client-side synchronization state for the realtime drawing protocol.
//!
//! DESIGN
//! ======
//! This crate is the headless half of a drawing client: the canvas model
//! with its local undo/redo history, the presence roster, and the session
//! state machine that turns inbound wire messages into state changes and
//! local actions into outbound messages. It holds no socket of its own —
//! the embedding UI pushes received text frames in and drains an unbounded
//! channel of frames to send, so the whole crate stays synchronous and
//! testable without a server.

pub mod net;
pub mod state;
