use thiserror::Error;

use crate::command::CommandState;
use crate::complex::Complex;

/// Errors originating from the core fractal model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid Julia constant: {0} (must be finite)")]
    InvalidJuliaConstant(Complex),

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },

    #[error("cannot {action} {command} command in state {state:?}")]
    InvalidCommandState {
        command: &'static str,
        action: &'static str,
        state: CommandState,
    },
}
