//! Configuration loading and parsing.
//!
//! `patina.toml` is looked up in the working directory first, then in the
//! platform config dir (`<config>/patina/patina.toml`). Unknown fields are
//! ignored so the file can grow without breaking older builds, and a file
//! that fails to parse falls back to defaults rather than aborting startup.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Visual width of a tab character. Clamped to at least 1.
    pub tabsize: usize,
    /// Vertical margin kept between the cursor and the viewport edge.
    pub scrolloff: usize,
    /// Maximum redraw rate.
    pub fps: u32,
    /// Theme name resolved through the editor's theme registry.
    pub theme: String,
    /// Whether the line-number gutter is drawn.
    pub show_linenum: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tabsize: 4,
            scrolloff: 5,
            fps: 30,
            theme: "dark-plus".to_string(),
            show_linenum: true,
        }
    }
}

impl Config {
    /// Normalize values that have hard lower bounds.
    fn sanitized(mut self) -> Self {
        if self.tabsize == 0 {
            warn!(target: "config", "tabsize 0 clamped to 1");
            self.tabsize = 1;
        }
        if self.fps == 0 {
            self.fps = 1;
        }
        self
    }
}

/// Best-effort config path following platform conventions.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("patina.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("patina").join("patina.toml");
    }
    PathBuf::from("patina.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<Config>(&content) {
            Ok(config) => {
                info!(target: "config", path = %path.display(), "configuration loaded");
                Ok(config.sanitized())
            }
            Err(err) => {
                warn!(target: "config", path = %path.display(), %err, "config parse failed, using defaults");
                Ok(Config::default())
            }
        },
        Err(_) => Ok(Config::default()),
    }
}
