pub mod color;
pub mod command;
pub mod complex;
pub mod controller;
pub mod error;
pub mod escape;
pub mod history;
pub mod view_state;
pub mod viewport;

// Re-export primary types for convenience.
pub use color::ColorMapper;
pub use command::{Command, CommandState, PanCommand, ZoomCommand};
pub use complex::Complex;
pub use controller::ViewController;
pub use error::CoreError;
pub use escape::{EscapeFunction, ESCAPE_RADIUS_SQ};
pub use history::UndoHistory;
pub use view_state::ViewState;
pub use viewport::{ScreenRect, Viewport};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
