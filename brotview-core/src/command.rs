//! Reversible changes to the viewport of a [`ViewState`].
//!
//! A command goes `Created → Executed → Undone`. Undone is terminal: there is
//! no redo.

use tracing::debug;

use crate::error::CoreError;
use crate::view_state::ViewState;
use crate::viewport::{ScreenRect, Viewport};

/// Lifecycle of a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Executed,
    Undone,
}

/// A reversible view mutation.
///
/// `execute` and `undo` take the current state and return the next one; the
/// caller decides where that state lives.
pub trait Command: Send {
    fn name(&self) -> &'static str;

    fn state(&self) -> CommandState;

    /// The viewport this command installs when executed.
    fn target(&self) -> Viewport;

    /// Apply the change. Only valid once, from [`CommandState::Created`].
    fn execute(&mut self, view: &ViewState) -> crate::Result<ViewState>;

    /// Revert the change. Only valid from [`CommandState::Executed`].
    fn undo(&mut self, view: &ViewState) -> crate::Result<ViewState>;
}

/// Shared bookkeeping for commands that swap one viewport for another.
#[derive(Debug, Clone)]
struct ViewportChange {
    old_viewport: Option<Viewport>,
    new_viewport: Viewport,
    state: CommandState,
}

impl ViewportChange {
    fn new(new_viewport: Viewport) -> Self {
        Self {
            old_viewport: None,
            new_viewport,
            state: CommandState::Created,
        }
    }

    fn execute(&mut self, command: &'static str, view: &ViewState) -> crate::Result<ViewState> {
        if self.state != CommandState::Created {
            return Err(CoreError::InvalidCommandState {
                command,
                action: "execute",
                state: self.state,
            });
        }
        self.old_viewport = Some(view.viewport);
        self.state = CommandState::Executed;
        debug!(command, viewport = ?self.new_viewport, "Executed view command");
        Ok(view.with_viewport(self.new_viewport))
    }

    fn undo(&mut self, command: &'static str, view: &ViewState) -> crate::Result<ViewState> {
        let old = match (self.state, self.old_viewport) {
            (CommandState::Executed, Some(old)) => old,
            _ => {
                return Err(CoreError::InvalidCommandState {
                    command,
                    action: "undo",
                    state: self.state,
                })
            }
        };
        self.state = CommandState::Undone;
        debug!(command, viewport = ?old, "Undid view command");
        Ok(view.with_viewport(old))
    }
}

// ---------------------------------------------------------------------------
// Zoom
// ---------------------------------------------------------------------------

/// Replace the viewport with a zoomed one.
#[derive(Debug, Clone)]
pub struct ZoomCommand {
    change: ViewportChange,
}

impl ZoomCommand {
    pub fn new(new_viewport: Viewport) -> Self {
        Self {
            change: ViewportChange::new(new_viewport),
        }
    }

    /// Zoom into the region under a dragged screen rectangle.
    ///
    /// Returns `None` for a zero-area rectangle so nothing reaches the undo
    /// history.
    pub fn to_rect(
        viewport: &Viewport,
        rect: ScreenRect,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let target = viewport.zoomed_to(rect, image_width, image_height);
        (target != *viewport).then(|| Self::new(target))
    }

    /// Zoom about the centre. `factor < 1` zooms in.
    pub fn by_factor(viewport: &Viewport, factor: f64) -> Option<Self> {
        let target = viewport.zoomed_by(factor);
        (target != *viewport).then(|| Self::new(target))
    }

    pub fn old_viewport(&self) -> Option<Viewport> {
        self.change.old_viewport
    }

    pub fn new_viewport(&self) -> Viewport {
        self.change.new_viewport
    }
}

impl Command for ZoomCommand {
    fn name(&self) -> &'static str {
        "zoom"
    }

    fn state(&self) -> CommandState {
        self.change.state
    }

    fn target(&self) -> Viewport {
        self.change.new_viewport
    }

    fn execute(&mut self, view: &ViewState) -> crate::Result<ViewState> {
        self.change.execute("zoom", view)
    }

    fn undo(&mut self, view: &ViewState) -> crate::Result<ViewState> {
        self.change.undo("zoom", view)
    }
}

// ---------------------------------------------------------------------------
// Pan
// ---------------------------------------------------------------------------

/// Replace the viewport with a translated one.
#[derive(Debug, Clone)]
pub struct PanCommand {
    change: ViewportChange,
}

impl PanCommand {
    pub fn new(new_viewport: Viewport) -> Self {
        Self {
            change: ViewportChange::new(new_viewport),
        }
    }

    /// Pan by a pixel drag. Returns `None` when the drag moves nothing.
    pub fn by_pixels(
        viewport: &Viewport,
        dx: f64,
        dy: f64,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let target = viewport.panned_by(dx, dy, image_width, image_height);
        (target != *viewport).then(|| Self::new(target))
    }

    pub fn old_viewport(&self) -> Option<Viewport> {
        self.change.old_viewport
    }

    pub fn new_viewport(&self) -> Viewport {
        self.change.new_viewport
    }
}

impl Command for PanCommand {
    fn name(&self) -> &'static str {
        "pan"
    }

    fn state(&self) -> CommandState {
        self.change.state
    }

    fn target(&self) -> Viewport {
        self.change.new_viewport
    }

    fn execute(&mut self, view: &ViewState) -> crate::Result<ViewState> {
        self.change.execute("pan", view)
    }

    fn undo(&mut self, view: &ViewState) -> crate::Result<ViewState> {
        self.change.undo("pan", view)
    }
}
