pub mod buffer;
pub mod callback;
pub mod error;
pub mod export;
pub mod renderer;
pub mod tile;

pub use buffer::{RenderBuffer, PLACEHOLDER_COLOR};
pub use callback::{CallbackContext, CallbackThread, Task};
pub use error::RenderError;
pub use export::{export_png, ExportMetadata};
pub use renderer::{
    FractalRenderer, JobId, RenderOutcome, RenderedImage, RendererConfig,
    SHUTDOWN_GRACE,
};
pub use tile::{partition, Tile, DEFAULT_TILE_SIZE};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
