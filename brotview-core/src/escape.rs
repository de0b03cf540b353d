use serde::{Deserialize, Serialize};

use crate::complex::Complex;

/// Squared escape radius. An orbit with `|z|² >= 4` has left the disc of
/// radius 2 and is guaranteed to diverge.
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// The iteration rule applied to every pixel.
///
/// A closed set of variants; every place where behaviour differs matches on
/// it exhaustively. Values are plain data so a view can be persisted and
/// restored without the render engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscapeFunction {
    /// `z_{n+1} = z_n² + c` from `z₀ = 0`, where `c` is the plane point.
    #[default]
    Mandelbrot,
    /// `z_{n+1} = z_n² + c` for a fixed `c`, where `z₀` is the plane point.
    Julia { c: Complex },
}

impl EscapeFunction {
    /// A visually interesting Julia set: `c = -0.7 + 0.27015i`.
    pub fn default_julia() -> Self {
        Self::Julia {
            c: Complex::new(-0.7, 0.27015),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mandelbrot => "Mandelbrot",
            Self::Julia { .. } => "Julia",
        }
    }

    /// Number of steps before the orbit escapes, in `[0, max_iterations]`.
    ///
    /// Mandelbrot ignores `z0`; Julia ignores `c`. Returns `max_iterations`
    /// when the orbit stays bounded for the whole budget.
    #[inline]
    pub fn iterate(&self, z0: Complex, c: Complex, max_iterations: u32) -> u32 {
        match *self {
            Self::Mandelbrot => escape_time(Complex::ZERO, c, max_iterations),
            Self::Julia { c: fixed } => escape_time(z0, fixed, max_iterations),
        }
    }

    /// Iterate a point of the complex plane, placing it in whichever slot the
    /// variant treats as the varying coordinate.
    #[inline]
    pub fn iterate_point(&self, point: Complex, max_iterations: u32) -> u32 {
        self.iterate(point, point, max_iterations)
    }
}

#[inline]
fn escape_time(mut z: Complex, c: Complex, max_iterations: u32) -> u32 {
    for n in 0..max_iterations {
        z = z.square() + c;
        if z.norm_sq() >= ESCAPE_RADIUS_SQ {
            return n;
        }
    }
    max_iterations
}
