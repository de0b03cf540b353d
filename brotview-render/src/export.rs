//! PNG export with embedded metadata (tEXt chunks).

use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

use brotview_core::{EscapeFunction, ViewState};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;

/// Metadata to embed in an exported PNG as tEXt chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportMetadata {
    pub escape: String,
    pub julia_c: Option<(f64, f64)>,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub max_iterations: u32,
    pub color: String,
}

impl ExportMetadata {
    pub fn from_state(state: &ViewState) -> Self {
        let vp = &state.viewport;
        let julia_c = match state.escape {
            EscapeFunction::Julia { c } => Some((c.re, c.im)),
            EscapeFunction::Mandelbrot => None,
        };
        Self {
            escape: state.escape.label().to_string(),
            julia_c,
            min_x: vp.min_x(),
            max_x: vp.max_x(),
            min_y: vp.min_y(),
            max_y: vp.max_y(),
            max_iterations: state.max_iterations(),
            color: state.color.label().to_string(),
        }
    }

    fn description(&self) -> String {
        let mut desc = format!(
            "{} - Re [{}, {}], Im [{}, {}], Iterations: {}",
            self.escape, self.min_x, self.max_x, self.min_y, self.max_y, self.max_iterations,
        );
        if let Some((re, im)) = self.julia_c {
            desc.push_str(&format!(", Julia C: {re} {im}i"));
        }
        desc
    }

    fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("Brotview.Escape".into(), self.escape.clone()),
            ("Brotview.MinX".into(), self.min_x.to_string()),
            ("Brotview.MaxX".into(), self.max_x.to_string()),
            ("Brotview.MinY".into(), self.min_y.to_string()),
            ("Brotview.MaxY".into(), self.max_y.to_string()),
            ("Brotview.MaxIterations".into(), self.max_iterations.to_string()),
            ("Brotview.Color".into(), self.color.clone()),
        ];
        if let Some((re, im)) = self.julia_c {
            pairs.push(("Brotview.JuliaC_Re".into(), re.to_string()));
            pairs.push(("Brotview.JuliaC_Im".into(), im.to_string()));
        }
        pairs
    }
}

fn export_err(what: &str) -> impl Fn(png::EncodingError) -> RenderError + '_ {
    move |e| RenderError::Export(format!("{what}: {e}"))
}

/// Write a rendered frame as an RGBA PNG with embedded view metadata.
///
/// Uses the `png` crate directly to inject custom tEXt chunks readable by
/// exiftool and most image viewers.
pub fn export_png(
    buffer: &RenderBuffer,
    path: &Path,
    metadata: &ExportMetadata,
) -> crate::Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| RenderError::Export(format!("failed to create {}: {e}", path.display())))?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, buffer.width, buffer.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder
        .add_text_chunk("Software".to_string(), "brotview".to_string())
        .map_err(export_err("text chunk"))?;
    encoder
        .add_text_chunk("Description".to_string(), metadata.description())
        .map_err(export_err("text chunk"))?;
    for (key, value) in metadata.pairs() {
        encoder
            .add_text_chunk(key, value)
            .map_err(export_err("text chunk"))?;
    }

    let mut png_writer = encoder.write_header().map_err(export_err("PNG header"))?;
    png_writer
        .write_image_data(&buffer.pixels)
        .map_err(export_err("PNG image data"))?;

    debug!(
        "Exported PNG {}x{} to {}",
        buffer.width,
        buffer.height,
        path.display()
    );
    Ok(())
}
