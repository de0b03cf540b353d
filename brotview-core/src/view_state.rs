use serde::{Deserialize, Serialize};

use crate::color::ColorMapper;
use crate::error::CoreError;
use crate::escape::EscapeFunction;
use crate::viewport::Viewport;

/// Everything needed to render one frame.
///
/// A snapshot value: commands produce a fresh `ViewState` rather than editing
/// one, so a render always works from a consistent copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub viewport: Viewport,
    max_iterations: u32,
    pub escape: EscapeFunction,
    pub color: ColorMapper,
}

/// Deserialization re-validates the iteration bound.
impl<'de> Deserialize<'de> for ViewState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            viewport: Viewport,
            max_iterations: u32,
            #[serde(default)]
            escape: EscapeFunction,
            #[serde(default)]
            color: ColorMapper,
        }
        let raw = Raw::deserialize(deserializer)?;
        ViewState::new(raw.viewport, raw.max_iterations, raw.escape, raw.color)
            .map_err(serde::de::Error::custom)
    }
}

impl ViewState {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 256;

    pub fn new(
        viewport: Viewport,
        max_iterations: u32,
        escape: EscapeFunction,
        color: ColorMapper,
    ) -> crate::Result<Self> {
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        if let EscapeFunction::Julia { c } = escape {
            if !c.is_finite() {
                return Err(CoreError::InvalidJuliaConstant(c));
            }
        }
        Ok(Self {
            viewport,
            max_iterations,
            escape,
            color,
        })
    }

    /// The default view for an escape function.
    pub fn for_escape(escape: EscapeFunction) -> Self {
        let viewport = match escape {
            EscapeFunction::Mandelbrot => Viewport::default_mandelbrot(),
            EscapeFunction::Julia { .. } => Viewport::default_julia(),
        };
        Self {
            viewport,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            escape,
            color: ColorMapper::default(),
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Return a copy looking at a different region.
    pub fn with_viewport(&self, viewport: Viewport) -> Self {
        Self {
            viewport,
            ..self.clone()
        }
    }

    /// Return a copy with a different iteration bound.
    pub fn with_max_iterations(&self, max_iterations: u32) -> crate::Result<Self> {
        Self::new(self.viewport, max_iterations, self.escape, self.color)
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::for_escape(EscapeFunction::Mandelbrot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;

    #[test]
    fn rejects_zero_iterations() {
        assert!(ViewState::new(
            Viewport::default(),
            0,
            EscapeFunction::Mandelbrot,
            ColorMapper::Grayscale
        )
        .is_err());
        assert!(ViewState::default().with_max_iterations(0).is_err());
    }

    #[test]
    fn rejects_non_finite_julia_constant() {
        for c in [Complex::new(f64::NAN, 0.0), Complex::new(0.3, f64::INFINITY)] {
            let err = ViewState::new(
                Viewport::default_julia(),
                100,
                EscapeFunction::Julia { c },
                ColorMapper::Grayscale,
            )
            .unwrap_err();
            assert!(matches!(err, CoreError::InvalidJuliaConstant(_)));
        }
        assert!(ViewState::new(
            Viewport::default_julia(),
            100,
            EscapeFunction::default_julia(),
            ColorMapper::Grayscale,
        )
        .is_ok());
    }

    #[test]
    fn with_viewport_keeps_other_fields() {
        let state = ViewState::for_escape(EscapeFunction::default_julia());
        let moved = state.with_viewport(state.viewport.zoomed_by(0.5));
        assert_eq!(moved.escape, state.escape);
        assert_eq!(moved.color, state.color);
        assert_eq!(moved.max_iterations(), state.max_iterations());
        assert_ne!(moved.viewport, state.viewport);
    }

    #[test]
    fn julia_round_trips_as_plain_data() {
        let state = ViewState::new(
            Viewport::new(-1.0, 1.0, -0.5, 0.5).unwrap(),
            500,
            EscapeFunction::Julia {
                c: Complex::new(-0.8, 0.156),
            },
            ColorMapper::NonlinearRgb { exponent: 0.7 },
        )
        .unwrap();

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"kind\":\"julia\""), "{json}");
        assert!(json.contains("\"kind\":\"nonlinear_rgb\""), "{json}");

        let back: ViewState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn deserialize_rejects_invalid_data() {
        let bad_iter = r#"{"viewport":{"min_x":-2,"max_x":1,"min_y":-1,"max_y":1},"max_iterations":0}"#;
        assert!(serde_json::from_str::<ViewState>(bad_iter).is_err());

        let bad_bounds = r#"{"viewport":{"min_x":1,"max_x":-2,"min_y":-1,"max_y":1},"max_iterations":10}"#;
        assert!(serde_json::from_str::<ViewState>(bad_bounds).is_err());
    }

    #[test]
    fn missing_functions_default() {
        let json = r#"{"viewport":{"min_x":-2,"max_x":1,"min_y":-1,"max_y":1},"max_iterations":64}"#;
        let state: ViewState = serde_json::from_str(json).unwrap();
        assert_eq!(state.escape, EscapeFunction::Mandelbrot);
        assert_eq!(state.color, ColorMapper::default());
    }
}
