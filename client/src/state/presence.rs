#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::HashMap;

use protocol::{CursorUpdate, Participant};

/// The room roster as this client currently sees it, keyed by user id.
///
/// The server's `users-list` unicast is authoritative and replaces the whole
/// roster; everything after that is incremental (`user-join`, `user-leave`,
/// `cursor`).
#[derive(Clone, Debug, Default)]
pub struct PresenceState {
    participants: HashMap<String, Participant>,
}

impl PresenceState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Roster snapshot in no particular order.
    #[must_use]
    pub fn participants(&self) -> Vec<&Participant> {
        self.participants.values().collect()
    }

    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Replace the roster with the server's authoritative list.
    pub fn replace(&mut self, roster: Vec<Participant>) {
        self.participants = roster.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    /// Insert (or update) one participant from a `user-join` notice.
    pub fn insert(&mut self, participant: Participant) {
        self.participants.insert(participant.id.clone(), participant);
    }

    /// Remove a participant from a `user-leave` notice. Unknown ids are
    /// ignored.
    pub fn remove(&mut self, user_id: &str) {
        self.participants.remove(user_id);
    }

    /// Apply a peer's cursor update. Unknown ids are ignored rather than
    /// resurrected; a `user-join` for them has to arrive first.
    pub fn update_cursor(&mut self, user_id: &str, update: CursorUpdate) {
        if let Some(participant) = self.participants.get_mut(user_id) {
            participant.cursor = update.cursor;
            participant.is_drawing = update.is_drawing;
        }
    }
}
