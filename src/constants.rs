// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::camera::types::Symbology;
use serde::{Deserialize, Serialize};

/// Capture resolution presets
///
/// The scanner does not need high resolutions; 720p keeps per-frame work low
/// while leaving enough detail for dense 1D barcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapturePreset {
    /// 640x480, cheapest to decode
    Vga,
    /// 1280x720 (default)
    #[default]
    Hd,
    /// 1920x1080, for small or distant labels
    FullHd,
}

impl CapturePreset {
    /// All presets ordered from lowest to highest resolution
    pub const ALL: [CapturePreset; 3] = [CapturePreset::Vga, CapturePreset::Hd, CapturePreset::FullHd];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            CapturePreset::Vga => "640x480",
            CapturePreset::Hd => "1280x720",
            CapturePreset::FullHd => "1920x1080",
        }
    }

    /// Frame dimensions (width, height) in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            CapturePreset::Vga => (640, 480),
            CapturePreset::Hd => (1280, 720),
            CapturePreset::FullHd => (1920, 1080),
        }
    }
}

/// Symbologies the metadata output accepts unless configured otherwise:
/// two retail 1D formats and one stacked 2D format
pub const DEFAULT_SYMBOLOGIES: [Symbology; 3] =
    [Symbology::Ean8, Symbology::Ean13, Symbology::Pdf417];

/// Scan target overlay geometry, as fractions of the hosting view width
pub mod overlay {
    /// Horizontal margin of the scan rectangle
    pub const MARGIN_FRACTION: f64 = 0.068;
    /// Width of the scan rectangle
    pub const WIDTH_FRACTION: f64 = 0.85;
    /// Height of the scan rectangle
    pub const HEIGHT_FRACTION: f64 = 0.5;
    /// Fixed offset above the vertical center (points)
    pub const VERTICAL_OFFSET: f64 = 48.0;
    /// Corner radius of the guidance outline
    pub const CORNER_RADIUS: f64 = 10.0;
    /// Line width of the guidance outline
    pub const BORDER_WIDTH: f64 = 2.0;
}

/// Software decoding parameters
pub mod decode {
    /// Frames are downscaled so neither side exceeds this before decoding
    pub const MAX_DIMENSION: u32 = 640;
    /// Frames decoded concurrently in the pixel-buffer strategy
    pub const CONCURRENCY: usize = 2;
    /// Frames waiting for a decode slot; newer frames are dropped while full
    pub const QUEUE_DEPTH: usize = 2;
}

/// GStreamer pipeline parameters
pub mod pipeline {
    /// Appsink queue depth; older frames are dropped when decoding falls behind
    pub const MAX_BUFFERS: u32 = 2;
}

/// Timing constants
pub mod timing {
    /// Bus poll interval for the capture loop (milliseconds)
    pub const BUS_POLL_MS: u64 = 100;
    /// Log frame statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 120;
}
