//! Viewer configuration.
//!
//! Read once at startup from `<config_dir>/bokeh-viewer/config.json`. The
//! file is never written; panel edits live only for the session.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

/// Startup configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Directory holding `glb/` and `hdr/`
    pub asset_root: PathBuf,

    // Window
    pub window_width: f32,
    pub window_height: f32,
    pub window_title: String,

    /// Display clear color, 0xRRGGBB
    pub clear_color: u32,

    /// Start with the "Depth of Field" panel expanded
    pub panel_open: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("public"),
            window_width: 1280.0,
            window_height: 720.0,
            window_title: "Bokeh Viewer".to_string(),
            clear_color: 0x0d0d0e,
            panel_open: false,
        }
    }
}

impl ViewerConfig {
    /// Default config file location
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("bokeh-viewer");
            p.push("config.json");
            p
        })
    }

    /// Load from the default location; missing or malformed files yield defaults.
    pub fn load() -> Self {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("{e}; using default config");
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Load from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}
