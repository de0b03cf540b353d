use serde::{Deserialize, Serialize};

/// Color of points that never escaped.
pub const INTERIOR_COLOR: [u8; 3] = [0, 0, 0];

/// Maps an iteration count to an RGB color.
///
/// Mappers are stateless values, shared by every tile of a render without
/// locking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorMapper {
    /// Linear ramp from black to white.
    Grayscale,
    /// Power-law curve on the escape ratio, fed into separate polynomial
    /// channel curves. Exponents below 1 stretch the low-iteration range,
    /// which is where most of the near-boundary detail sits.
    NonlinearRgb { exponent: f64 },
}

impl ColorMapper {
    pub const DEFAULT_EXPONENT: f64 = 0.5;

    pub fn nonlinear() -> Self {
        Self::NonlinearRgb {
            exponent: Self::DEFAULT_EXPONENT,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale",
            Self::NonlinearRgb { .. } => "Nonlinear RGB",
        }
    }

    /// Color for a pixel whose orbit escaped after `iterations` steps.
    ///
    /// Total over all inputs: `iterations >= max_iterations` (and the empty
    /// budget) is the interior color.
    pub fn color_for(&self, iterations: u32, max_iterations: u32) -> [u8; 3] {
        if iterations >= max_iterations {
            return INTERIOR_COLOR;
        }
        let ratio = iterations as f64 / max_iterations as f64;
        match *self {
            Self::Grayscale => {
                let level = to_channel(ratio);
                [level, level, level]
            }
            Self::NonlinearRgb { exponent } => {
                let exponent = if exponent.is_finite() && exponent > 0.0 {
                    exponent
                } else {
                    Self::DEFAULT_EXPONENT
                };
                let t = ratio.powf(exponent);
                let u = 1.0 - t;
                [
                    to_channel(9.0 * u * t * t * t),
                    to_channel(15.0 * u * u * t * t),
                    to_channel(8.5 * u * u * u * t),
                ]
            }
        }
    }
}

impl Default for ColorMapper {
    fn default() -> Self {
        Self::nonlinear()
    }
}

#[inline]
fn to_channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
