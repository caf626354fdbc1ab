//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the room registry, the stroke log, and the presence
//! hub so route handlers can stay focused on protocol translation and
//! connection lifecycle plumbing.

pub mod presence;
pub mod room;
pub mod stroke;
