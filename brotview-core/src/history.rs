use std::collections::VecDeque;

use tracing::trace;

use crate::command::Command;

/// Bounded LIFO of executed commands.
///
/// Pushing past capacity silently discards the oldest entry.
pub struct UndoHistory {
    entries: VecDeque<Box<dyn Command>>,
    capacity: usize,
}

impl UndoHistory {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// A history holding at most `capacity` commands (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        self.entries.push_back(command);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            trace!(capacity = self.capacity, "Undo history full, dropped oldest entry");
        }
    }

    /// Remove and return the most recent command.
    pub fn pop(&mut self) -> Option<Box<dyn Command>> {
        self.entries.pop_back()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The oldest retained command.
    pub fn oldest(&self) -> Option<&dyn Command> {
        self.entries.front().map(|c| c.as_ref())
    }

    /// The command [`pop`](Self::pop) would return.
    pub fn latest(&self) -> Option<&dyn Command> {
        self.entries.back().map(|c| c.as_ref())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UndoHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoHistory")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
