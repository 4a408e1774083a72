// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::Symbology;
use crate::constants::{self, CapturePreset};
use crate::errors::{AppError, AppResult};
use crate::session::DeliveryMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name under the user config dir
const CONFIG_DIR: &str = "barcode-capture";
const CONFIG_FILE: &str = "config.json";

/// Capture format requested from the device
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FormatSettings {
    /// Resolution width
    pub width: u32,
    /// Resolution height
    pub height: u32,
    /// Framerate, `None` to accept what the device offers
    pub framerate: Option<u32>,
}

impl From<CapturePreset> for FormatSettings {
    fn from(preset: CapturePreset) -> Self {
        let (width, height) = preset.dimensions();
        Self {
            width,
            height,
            framerate: None,
        }
    }
}

impl Default for FormatSettings {
    fn default() -> Self {
        CapturePreset::default().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognition strategy (hardware metadata or software pixel decoding)
    pub strategy: DeliveryMode,
    /// Symbologies the metadata output accepts
    pub symbologies: Vec<Symbology>,
    /// Capture resolution preset
    pub preset: CapturePreset,
    /// Requested framerate
    pub framerate: Option<u32>,
    /// Frames are downscaled to this before software decoding
    pub max_decode_dimension: u32,
    /// Frames decoded concurrently by the pixel-buffer strategy
    pub decode_concurrency: usize,
    /// Acknowledge recognized codes with the terminal bell
    pub feedback_enabled: bool,
    /// Restrict detection to the scan overlay rectangle
    pub restrict_to_overlay: bool,
    /// Device path to prefer over the system default camera
    pub preferred_device: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: DeliveryMode::Metadata,
            symbologies: constants::DEFAULT_SYMBOLOGIES.to_vec(),
            preset: CapturePreset::default(),
            framerate: None,
            max_decode_dimension: constants::decode::MAX_DIMENSION,
            decode_concurrency: constants::decode::CONCURRENCY,
            feedback_enabled: true,
            restrict_to_overlay: true,
            preferred_device: None,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the config from the default location
    ///
    /// A missing file gives the defaults; an unreadable one is logged and
    /// also gives the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
            Self::default()
        })
    }

    /// Load the config from a specific file
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Capture format derived from preset and framerate
    pub fn format(&self) -> FormatSettings {
        FormatSettings {
            framerate: self.framerate,
            ..self.preset.into()
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.strategy == DeliveryMode::Metadata && self.symbologies.is_empty() {
            return Err(AppError::Config(
                "metadata strategy needs at least one symbology".to_string(),
            ));
        }
        if self.decode_concurrency == 0 {
            return Err(AppError::Config("decode_concurrency must be at least 1".to_string()));
        }
        if self.max_decode_dimension == 0 {
            return Err(AppError::Config("max_decode_dimension must be positive".to_string()));
        }
        Ok(())
    }
}
