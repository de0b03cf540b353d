mod app_dir;
mod gestures;
mod preferences;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};

use brotview_core::{ColorMapper, Complex, EscapeFunction, ViewController, ViewState};
use brotview_render::{export_png, ExportMetadata, FractalRenderer};

use gestures::Gesture;
use preferences::Preferences;

/// Render Mandelbrot and Julia sets, replaying zoom/pan/undo gestures.
#[derive(Debug, Parser)]
#[command(name = "brotview", version, about)]
struct Args {
    /// Image width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Maximum iterations per pixel
    #[arg(long = "iterations")]
    max_iterations: Option<u32>,

    /// Render the Julia set for this constant, given as RE,IM
    #[arg(long, value_parser = gestures::parse_complex, allow_hyphen_values = true)]
    julia: Option<Complex>,

    /// Color mapper: grayscale, nonlinear or nonlinear:EXP
    #[arg(long, value_parser = gestures::parse_color)]
    color: Option<ColorMapper>,

    /// Gesture to replay, in order: zoom:X,Y,W,H | zoom-factor:F | pan:DX,DY | undo
    #[arg(long = "gesture", allow_hyphen_values = true)]
    gestures: Vec<Gesture>,

    /// Output PNG path (defaults to the preferences output directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the final view state as JSON
    #[arg(long)]
    state_out: Option<PathBuf>,

    /// Start from a view state saved with --state-out
    #[arg(long)]
    state_in: Option<PathBuf>,

    /// Persist the effective size, iterations and color as new defaults
    #[arg(long)]
    save_preferences: bool,
}

impl Args {
    /// Fold explicit flags into the stored preferences.
    fn apply_to(&self, prefs: &mut Preferences) {
        if let Some(w) = self.width {
            prefs.width = w;
        }
        if let Some(h) = self.height {
            prefs.height = h;
        }
        if let Some(n) = self.max_iterations {
            prefs.max_iterations = n;
        }
        if let Some(color) = self.color {
            prefs.color = color;
        }
    }
}

/// The view to start from: a saved state, or the default view of the chosen
/// escape function. Explicit flags override what the saved state says.
fn initial_state(args: &Args, prefs: &Preferences) -> Result<ViewState, Box<dyn Error>> {
    let mut state = match &args.state_in {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            let state: ViewState = serde_json::from_str(&json)?;
            info!("Loaded view state from {}", path.display());
            state
        }
        None => {
            let mut state = ViewState::for_escape(EscapeFunction::Mandelbrot)
                .with_max_iterations(prefs.max_iterations)?;
            state.color = prefs.color;
            state
        }
    };
    if let Some(c) = args.julia {
        let escape = EscapeFunction::Julia { c };
        if args.state_in.is_none() {
            state = state.with_viewport(ViewState::for_escape(escape).viewport);
        }
        state.escape = escape;
    }
    if args.state_in.is_some() {
        if let Some(n) = args.max_iterations {
            state = state.with_max_iterations(n)?;
        }
        if let Some(color) = args.color {
            state.color = color;
        }
    }
    Ok(state)
}

fn default_file_name(state: &ViewState, width: u32, height: u32) -> String {
    format!(
        "{}_{width}x{height}.png",
        state.escape.label().to_lowercase()
    )
}

fn write_state(path: &Path, state: &ViewState) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(state)?)?;
    info!("Wrote view state to {}", path.display());
    Ok(())
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut prefs = Preferences::load();
    args.apply_to(&mut prefs);
    if args.save_preferences {
        prefs.save();
    }

    let (width, height) = (prefs.width, prefs.height);
    let mut controller = ViewController::new(initial_state(&args, &prefs)?);
    for gesture in &args.gestures {
        if gesture.apply(&mut controller, width, height)? {
            info!(%gesture, depth = controller.history().len(), "Applied gesture");
        }
    }
    let state = controller.state().clone();

    let renderer = FractalRenderer::with_callback_thread(prefs.renderer_config())?;
    let image = renderer.render_and_wait(&state, width, height)?;
    info!(
        elapsed_ms = image.elapsed.as_millis(),
        tiles = image.tiles_rendered,
        failed = image.tiles_failed,
        "Rendered {} {}x{}",
        state.escape.label(),
        width,
        height
    );
    renderer.shutdown();

    let output = match args.output {
        Some(path) => path,
        None => prefs
            .output_directory()
            .join(default_file_name(&state, width, height)),
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    export_png(&image.buffer, &output, &ExportMetadata::from_state(&state))?;
    info!("Saved image to {}", output.display());

    if let Some(path) = &args.state_out {
        write_state(path, &state)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting brotview");

    run(Args::parse()).inspect_err(|e| error!("{e}"))
}
