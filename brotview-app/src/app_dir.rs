//! Directory where the executable lives. Preferences and default output are
//! stored next to the binary so a standalone build stays self-contained.

use std::path::PathBuf;

/// Directory containing the running executable. Falls back to current directory if unavailable.
pub fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Default directory for rendered images.
pub fn images_directory() -> PathBuf {
    exe_directory().join("images")
}
