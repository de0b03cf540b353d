use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use brotview_core::{ColorMapper, ViewState};
use brotview_render::{RendererConfig, DEFAULT_TILE_SIZE};

// ---------------------------------------------------------------------------
// Application preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "ColorMapper::default")]
    pub color: ColorMapper,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Render threads. `0` uses every available core.
    #[serde(default)]
    pub worker_threads: usize,
    /// Where images go when no explicit output path is given. Empty means an
    /// `images/` folder next to the executable.
    #[serde(default)]
    pub output_dir: String,
}

fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_max_iterations() -> u32 {
    ViewState::DEFAULT_MAX_ITERATIONS
}
fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            max_iterations: default_max_iterations(),
            color: ColorMapper::default(),
            tile_size: default_tile_size(),
            worker_threads: 0,
            output_dir: String::new(),
        }
    }
}

impl Preferences {
    /// Load preferences from next to the executable, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str::<Preferences>(&json) {
                    Ok(prefs) => {
                        info!("Loaded preferences from {}", path.display());
                        return prefs;
                    }
                    Err(e) => {
                        error!("Failed to parse preferences: {e}");
                    }
                },
                Err(e) => {
                    error!("Failed to read preferences file: {e}");
                }
            }
        } else {
            debug!("No preferences file at {}", path.display());
        }
        Self::default()
    }

    /// Persist preferences to disk.
    pub fn save(&self) {
        self.save_to(&config_path());
    }

    pub fn save_to(&self, path: &Path) -> bool {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory: {e}");
                return false;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, &json) {
                    error!("Failed to write preferences: {e}");
                    false
                } else {
                    debug!("Saved preferences to {}", path.display());
                    true
                }
            }
            Err(e) => {
                error!("Failed to serialize preferences: {e}");
                false
            }
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            tile_size: self.tile_size,
            worker_threads: self.worker_threads,
        }
    }

    pub fn output_directory(&self) -> PathBuf {
        if self.output_dir.is_empty() {
            crate::app_dir::images_directory()
        } else {
            PathBuf::from(&self.output_dir)
        }
    }
}

fn config_path() -> PathBuf {
    crate::app_dir::exe_directory().join("preferences.json")
}
