//! Scripted user gestures, replayed through the command layer.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use brotview_core::{ColorMapper, Complex, PanCommand, ScreenRect, ViewController, ZoomCommand};

/// One input step, as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// `zoom:X,Y,W,H` - drag a selection rectangle in pixels.
    Zoom(ScreenRect),
    /// `zoom-factor:F` - zoom about the centre, `F < 1` zooms in.
    ZoomFactor(f64),
    /// `pan:DX,DY` - drag by a pixel offset.
    Pan { dx: f64, dy: f64 },
    /// `undo` - revert the most recent gesture.
    Undo,
}

impl Gesture {
    /// Apply to `controller` for an image of `width × height` pixels.
    ///
    /// Returns `Ok(false)` when the gesture was a no-op (degenerate rectangle,
    /// zero drag, nothing to undo); no history entry is made for it.
    pub fn apply(
        &self,
        controller: &mut ViewController,
        width: u32,
        height: u32,
    ) -> brotview_core::Result<bool> {
        let viewport = controller.state().viewport;
        let applied = match *self {
            Gesture::Zoom(rect) => match ZoomCommand::to_rect(&viewport, rect, width, height) {
                Some(cmd) => controller.apply(Box::new(cmd)).map(|_| true)?,
                None => false,
            },
            Gesture::ZoomFactor(f) => match ZoomCommand::by_factor(&viewport, f) {
                Some(cmd) => controller.apply(Box::new(cmd)).map(|_| true)?,
                None => false,
            },
            Gesture::Pan { dx, dy } => {
                match PanCommand::by_pixels(&viewport, dx, dy, width, height) {
                    Some(cmd) => controller.apply(Box::new(cmd)).map(|_| true)?,
                    None => false,
                }
            }
            Gesture::Undo => controller.undo()?,
        };
        if !applied {
            debug!(gesture = %self, "Gesture had no effect");
        }
        Ok(applied)
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gesture::Zoom(r) => write!(f, "zoom:{},{},{},{}", r.x, r.y, r.width, r.height),
            Gesture::ZoomFactor(k) => write!(f, "zoom-factor:{k}"),
            Gesture::Pan { dx, dy } => write!(f, "pan:{dx},{dy}"),
            Gesture::Undo => f.write_str("undo"),
        }
    }
}

fn parse_numbers<const N: usize>(s: &str, what: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("{what} expects {N} comma-separated numbers, got '{s}'"));
    }
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(&parts) {
        let v: f64 = part
            .parse()
            .map_err(|_| format!("invalid number '{part}' in {what}"))?;
        if !v.is_finite() {
            return Err(format!("non-finite number '{part}' in {what}"));
        }
        *slot = v;
    }
    Ok(out)
}

impl FromStr for Gesture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "undo" {
            return Ok(Gesture::Undo);
        }
        let (kind, args) = s
            .split_once(':')
            .ok_or_else(|| format!("unknown gesture '{s}'"))?;
        match kind {
            "zoom" => {
                let [x, y, w, h] = parse_numbers::<4>(args, "zoom")?;
                Ok(Gesture::Zoom(ScreenRect::new(x, y, w, h)))
            }
            "zoom-factor" => {
                let [k] = parse_numbers::<1>(args, "zoom-factor")?;
                if k <= 0.0 {
                    return Err(format!("zoom factor must be positive, got {k}"));
                }
                Ok(Gesture::ZoomFactor(k))
            }
            "pan" => {
                let [dx, dy] = parse_numbers::<2>(args, "pan")?;
                Ok(Gesture::Pan { dx, dy })
            }
            other => Err(format!("unknown gesture '{other}'")),
        }
    }
}

/// Parse `RE,IM` into a Julia constant.
pub fn parse_complex(s: &str) -> Result<Complex, String> {
    let [re, im] = parse_numbers::<2>(s, "julia constant")?;
    Ok(Complex::new(re, im))
}

/// Parse `grayscale`, `nonlinear` or `nonlinear:EXP`.
pub fn parse_color(s: &str) -> Result<ColorMapper, String> {
    match s.trim().split_once(':') {
        None if s.trim() == "grayscale" => Ok(ColorMapper::Grayscale),
        None if s.trim() == "nonlinear" => Ok(ColorMapper::nonlinear()),
        Some(("nonlinear", exp)) => {
            let [exponent] = parse_numbers::<1>(exp, "nonlinear exponent")?;
            if exponent <= 0.0 {
                return Err(format!("exponent must be positive, got {exponent}"));
            }
            Ok(ColorMapper::NonlinearRgb { exponent })
        }
        _ => Err(format!("unknown color mapper '{s}'")),
    }
}
