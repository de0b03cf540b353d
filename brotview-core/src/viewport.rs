use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::error::CoreError;

/// A rectangle in pixel space, as drawn by a zoom gesture.
///
/// Negative `width` / `height` describe a drag towards the origin and are
/// normalised before use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `true` when the rectangle encloses no area.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width == 0.0
            || self.height == 0.0
    }
}

/// The visible region of the complex plane.
///
/// Bounds always satisfy `min_x < max_x` and `min_y < max_y`. A viewport is
/// never edited in place: zooming and panning return a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

/// Deserialization goes through [`Viewport::new`] so stored views are
/// checked like any other input.
impl<'de> Deserialize<'de> for Viewport {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            min_x: f64,
            max_x: f64,
            min_y: f64,
            max_y: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Viewport::new(raw.min_x, raw.max_x, raw.min_y, raw.max_y).map_err(serde::de::Error::custom)
    }
}

impl Viewport {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> crate::Result<Self> {
        if ![min_x, max_x, min_y, max_y].iter().all(|v| v.is_finite()) {
            return Err(CoreError::InvalidViewport {
                reason: format!("bounds must be finite, got x {min_x}..{max_x}, y {min_y}..{max_y}"),
            });
        }
        if max_x <= min_x || max_y <= min_y {
            return Err(CoreError::InvalidViewport {
                reason: format!("empty area: x {min_x}..{max_x}, y {min_y}..{max_y}"),
            });
        }
        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// The whole Mandelbrot set with a little margin.
    pub fn default_mandelbrot() -> Self {
        Self {
            min_x: -2.0,
            max_x: 1.0,
            min_y: -1.5,
            max_y: 1.5,
        }
    }

    /// Most Julia sets for typical parameters fit within `|z| < 2`.
    pub fn default_julia() -> Self {
        Self {
            min_x: -2.0,
            max_x: 2.0,
            min_y: -2.0,
            max_y: 2.0,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Extent along the real axis.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Extent along the imaginary axis.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Complex {
        Complex::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Map a pixel coordinate to a point on the complex plane.
    ///
    /// `(0, 0)` is the top-left corner of the image and maps to
    /// `(min_x, min_y)`; `(width, height)` maps to `(max_x, max_y)`.
    /// Accepts fractional coordinates so gesture rectangles map exactly.
    #[inline]
    pub fn pixel_to_complex(&self, x: f64, y: f64, image_width: u32, image_height: u32) -> Complex {
        Complex::new(
            self.min_x + x / image_width as f64 * self.width(),
            self.min_y + y / image_height as f64 * self.height(),
        )
    }

    /// The region of the plane under a screen rectangle.
    ///
    /// A zero-area rectangle or empty image is not an error: the viewport is
    /// returned unchanged.
    pub fn zoomed_to(&self, rect: ScreenRect, image_width: u32, image_height: u32) -> Self {
        if rect.is_degenerate() || image_width == 0 || image_height == 0 {
            return *self;
        }
        let a = self.pixel_to_complex(rect.x, rect.y, image_width, image_height);
        let b = self.pixel_to_complex(
            rect.x + rect.width,
            rect.y + rect.height,
            image_width,
            image_height,
        );
        Self::new(a.re.min(b.re), a.re.max(b.re), a.im.min(b.im), a.im.max(b.im))
            .unwrap_or(*self)
    }

    /// Translate the view by a pixel drag of `(dx, dy)`.
    ///
    /// Dragging the image right moves the visible window left.
    pub fn panned_by(&self, dx: f64, dy: f64, image_width: u32, image_height: u32) -> Self {
        if image_width == 0 || image_height == 0 || !dx.is_finite() || !dy.is_finite() {
            return *self;
        }
        let shift_x = -dx / image_width as f64 * self.width();
        let shift_y = -dy / image_height as f64 * self.height();
        Self::new(
            self.min_x + shift_x,
            self.max_x + shift_x,
            self.min_y + shift_y,
            self.max_y + shift_y,
        )
        .unwrap_or(*self)
    }

    /// Scale the extent about the centre. `factor < 1` zooms in.
    pub fn zoomed_by(&self, factor: f64) -> Self {
        if !(factor.is_finite() && factor > 0.0) {
            return *self;
        }
        let c = self.center();
        let half_w = self.width() * factor / 2.0;
        let half_h = self.height() * factor / 2.0;
        Self::new(c.re - half_w, c.re + half_w, c.im - half_h, c.im + half_h).unwrap_or(*self)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::default_mandelbrot()
    }
}
