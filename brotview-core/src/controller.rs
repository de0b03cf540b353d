use tracing::{debug, info};

use crate::command::Command;
use crate::history::UndoHistory;
use crate::view_state::ViewState;

/// Owns the current view and its undo history.
///
/// Constructed explicitly and handed to whatever dispatches gestures; there
/// is no process-wide instance.
#[derive(Debug)]
pub struct ViewController {
    state: ViewState,
    history: UndoHistory,
}

impl ViewController {
    pub fn new(state: ViewState) -> Self {
        Self::with_history(state, UndoHistory::new())
    }

    pub fn with_history(state: ViewState, history: UndoHistory) -> Self {
        Self { state, history }
    }

    /// The snapshot to hand to the renderer.
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    /// Execute `command` against the current state. The command is recorded
    /// only if it executed successfully.
    pub fn apply(&mut self, mut command: Box<dyn Command>) -> crate::Result<&ViewState> {
        let next = command.execute(&self.state)?;
        debug!(command = command.name(), depth = self.history.len() + 1, "Applied command");
        self.state = next;
        self.history.push(command);
        Ok(&self.state)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Revert the most recent command. Returns `Ok(false)` when the history
    /// is empty.
    pub fn undo(&mut self) -> crate::Result<bool> {
        let Some(mut command) = self.history.pop() else {
            return Ok(false);
        };
        self.state = command.undo(&self.state)?;
        debug!(command = command.name(), depth = self.history.len(), "Undid command");
        Ok(true)
    }

    /// Install an unrelated state (e.g. a loaded view). The history no longer
    /// applies to it and is cleared.
    pub fn replace_state(&mut self, state: ViewState) {
        info!("Replacing view state, clearing {} history entries", self.history.len());
        self.state = state;
        self.history.clear();
    }
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new(ViewState::default())
    }
}
