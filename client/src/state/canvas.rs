#[cfg(test)]
#[path = "canvas_test.rs"]
mod canvas_test;

use protocol::Stroke;

/// Upper bound on retained history snapshots. When a local action would
/// exceed it, the oldest snapshots are dropped and those states become
/// unreachable by undo.
pub const MAX_HISTORY: usize = 64;

/// The canvas model: the canonical stroke list plus a bounded snapshot
/// history for local undo/redo.
///
/// DESIGN
/// ======
/// History entries are full snapshots of the stroke list, indexed by a
/// cursor. The empty canvas is itself a snapshot, so the history is never
/// empty and undo after the first local stroke restores a blank canvas.
/// Only local actions snapshot; strokes arriving from peers merge into the
/// canonical list without touching the history, which keeps undo scoped to
/// this user's own view. Undo and redo are purely local — nothing is sent,
/// and peers keep whatever they have.
#[derive(Clone, Debug)]
pub struct CanvasState {
    strokes: Vec<Stroke>,
    history: Vec<Vec<Stroke>>,
    cursor: usize,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasState {
    #[must_use]
    pub fn new() -> Self {
        Self { strokes: Vec::new(), history: vec![Vec::new()], cursor: 0 }
    }

    /// The canonical stroke list, in draw order.
    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    /// Apply a stroke this user drew. Snapshots for undo; any redo branch
    /// beyond the cursor is discarded.
    pub fn apply_local_stroke(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
        self.snapshot();
    }

    /// Merge a stroke drawn by a peer. The history is left untouched, so a
    /// later undo restores a snapshot that predates this stroke.
    pub fn apply_remote_stroke(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    /// Step back one snapshot. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.strokes = self.history[self.cursor].clone();
        true
    }

    /// Step forward one snapshot. Returns false when there is nothing to
    /// redo.
    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.history.len() {
            return false;
        }
        self.cursor += 1;
        self.strokes = self.history[self.cursor].clone();
        true
    }

    /// Wipe the canvas and the history with it. Used for both a local clear
    /// and a `clear-canvas` notice from the room; a clear is not undoable.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.history = vec![Vec::new()];
        self.cursor = 0;
    }

    /// Replace the canvas with the server's stroke log, as on join or
    /// reload. The seeded state becomes the new undo baseline.
    pub fn seed(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
        self.history = vec![self.strokes.clone()];
        self.cursor = 0;
    }

    fn snapshot(&mut self) {
        self.history.truncate(self.cursor + 1);
        self.history.push(self.strokes.clone());
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.cursor = self.history.len() - 1;
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        self.history.len()
    }
}
