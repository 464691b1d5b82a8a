//! Client configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::MAX_HISTORY;

/// Environment variable overriding `server_url`.
pub const SERVER_ENV: &str = "SKETCHGUESS_SERVER";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid canvas size {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },
}

/// Settings for one game client.
///
/// Every field is optional in the JSON file; missing fields take the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// How often buffered strokes are published.
    pub flush_interval_ms: u64,
    pub max_history: usize,
    /// Where the viewer writes the rendered surface.
    pub snapshot_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:3030/ws".to_string(),
            canvas_width: 800,
            canvas_height: 600,
            flush_interval_ms: 100,
            max_history: MAX_HISTORY,
            snapshot_path: PathBuf::from("drawing.png"),
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else defaults, then apply the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::var(SERVER_ENV).ok());
        Ok(config)
    }

    /// Apply an override for the server URL (empty values are ignored).
    pub fn apply_env(&mut self, server: Option<String>) {
        if let Some(url) = server.filter(|s| !s.trim().is_empty()) {
            log::info!("Using server URL from {}: {}", SERVER_ENV, url);
            self.server_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::InvalidCanvas {
                width: self.canvas_width,
                height: self.canvas_height,
            });
        }
        Ok(())
    }
}
