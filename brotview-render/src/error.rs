use thiserror::Error;

/// Errors originating from the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("renderer has been shut down")]
    ShutDown,

    #[error("render was cancelled")]
    Cancelled,

    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),

    #[error("failed to start render thread: {0}")]
    Thread(String),

    #[error("PNG export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Core(#[from] brotview_core::CoreError),
}
