//! Client-side state models.
//!
//! Split by domain so the session machine and any UI on top of it can
//! depend on small focused pieces: the canvas (strokes + undo history) and
//! presence (who is in the room and where their cursor is).

pub mod canvas;
pub mod presence;
