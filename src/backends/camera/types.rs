// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture device backends

//! Shared types for capture backends

use crate::errors::ScanError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Describes a capture device found by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Human readable device name
    pub name: String,
    /// Device node or backend object path, if the backend exposes one
    pub path: Option<String>,
    /// Backend API that owns the device (e.g. "v4l2", "pipewire")
    pub api: Option<String>,
}

impl CameraDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            api: None,
        }
    }
}

/// Capture frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either side is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
/// which is the coordinate space capture devices use for their region of
/// interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f64,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f64,
    /// Width as fraction of frame width
    pub width: f64,
    /// Height as fraction of frame height
    pub height: f64,
}

/// Region of interest handed to capture devices
pub type RegionOfInterest = FrameRegion;

impl FrameRegion {
    /// The all-zero region produced by conversions against an unsized layer
    pub const ZERO: FrameRegion = FrameRegion {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A region with no area cannot restrict detection to anything
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether two regions overlap
    pub fn intersects(&self, other: &FrameRegion) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Pixel rectangle `(x, y, width, height)` covered by this region,
    /// clamped to the frame and at least one pixel in each direction.
    pub fn to_pixel_rect(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let fw = frame_width as f64;
        let fh = frame_height as f64;

        let left = (self.x.clamp(0.0, 1.0) * fw).floor() as u32;
        let top = (self.y.clamp(0.0, 1.0) * fh).floor() as u32;
        let right = ((self.x + self.width).clamp(0.0, 1.0) * fw).ceil() as u32;
        let bottom = ((self.y + self.height).clamp(0.0, 1.0) * fh).ceil() as u32;

        let left = left.min(frame_width.saturating_sub(1));
        let top = top.min(frame_height.saturating_sub(1));
        let width = right.saturating_sub(left).max(1);
        let height = bottom.saturating_sub(top).max(1);

        (left, top, width, height)
    }
}

/// Barcode symbologies known to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symbology {
    Ean8,
    Ean13,
    UpcA,
    UpcE,
    Code39,
    Code128,
    Interleaved2of5,
    Pdf417,
    QrCode,
}

impl Symbology {
    /// Map a zbar symbol type name onto a symbology
    pub fn from_zbar(name: &str) -> Option<Self> {
        match name {
            "EAN-8" => Some(Self::Ean8),
            "EAN-13" | "ISBN-13" => Some(Self::Ean13),
            "UPC-A" => Some(Self::UpcA),
            "UPC-E" => Some(Self::UpcE),
            "CODE-39" => Some(Self::Code39),
            "CODE-128" => Some(Self::Code128),
            "I2/5" => Some(Self::Interleaved2of5),
            "PDF417" => Some(Self::Pdf417),
            "QR-Code" => Some(Self::QrCode),
            _ => None,
        }
    }

    /// Get display name for the symbology
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ean8 => "EAN-8",
            Self::Ean13 => "EAN-13",
            Self::UpcA => "UPC-A",
            Self::UpcE => "UPC-E",
            Self::Code39 => "Code 39",
            Self::Code128 => "Code 128",
            Self::Interleaved2of5 => "ITF",
            Self::Pdf417 => "PDF417",
            Self::QrCode => "QR",
        }
    }
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// What kind of object a metadata output reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// A machine-readable code (barcode, 2D symbol)
    MachineReadableCode,
    /// Face detections and other non-code metadata
    Other,
}

/// A platform-decoded object delivered by a metadata output
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataObject {
    pub kind: MetadataKind,
    pub symbology: Option<Symbology>,
    /// Decoded payload, absent when the platform could not read it
    pub string_value: Option<String>,
    /// Location in normalized frame coordinates, when known
    pub bounds: Option<FrameRegion>,
}

impl MetadataObject {
    /// A machine-readable code carrying a payload
    pub fn code(symbology: Symbology, value: impl Into<String>) -> Self {
        Self {
            kind: MetadataKind::MachineReadableCode,
            symbology: Some(symbology),
            string_value: Some(value.into()),
            bounds: None,
        }
    }

    /// A non-code metadata object
    pub fn other() -> Self {
        Self {
            kind: MetadataKind::Other,
            symbology: None,
            string_value: None,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: FrameRegion) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// Pixel layouts a frame-sample output can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit R G B A
    RGBA,
    /// 32-bit B G R A
    BGRA,
    /// 8-bit luminance
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::RGBA | Self::BGRA => 4,
            Self::Gray8 => 1,
        }
    }
}

/// A raw frame delivered by a frame-sample output
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Region of interest active when the frame was captured
    pub region: Option<FrameRegion>,
}

impl CameraFrame {
    /// Tightly packed frame without a region of interest
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            data: Arc::from(data.into_boxed_slice()),
            format,
            region: None,
        }
    }

    /// Check that the buffer is large enough for the declared geometry
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.width == 0 || self.height == 0 {
            return Err(ScanError::InvalidFrame(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }

        let row_bytes = self.width as usize * self.format.bytes_per_pixel();
        if (self.stride as usize) < row_bytes {
            return Err(ScanError::InvalidFrame(format!(
                "stride {} shorter than row of {} bytes",
                self.stride, row_bytes
            )));
        }

        let required = self.stride as usize * (self.height as usize - 1) + row_bytes;
        if self.data.len() < required {
            return Err(ScanError::InvalidFrame(format!(
                "{} bytes for {}x{} frame, need {}",
                self.data.len(),
                self.width,
                self.height,
                required
            )));
        }

        Ok(())
    }
}

/// One callback delivery from a capture output
#[derive(Debug, Clone)]
pub enum CaptureOutput {
    /// Frame-sample output delivery
    Frame(Arc<CameraFrame>),
    /// Metadata output delivery (one batch per frame)
    Metadata(Vec<MetadataObject>),
}

/// Callback sink a capture device pushes its output into.
///
/// Devices call it from their own thread, at frame rate.
pub type CaptureSink = Arc<dyn Fn(CaptureOutput) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixel_rect_clamps_to_frame() {
        let region = FrameRegion::new(0.5, -0.25, 0.75, 0.5);
        assert_eq!(region.to_pixel_rect(100, 100), (50, 0, 50, 25));
    }

    #[test]
    fn test_intersects() {
        let roi = FrameRegion::new(0.25, 0.25, 0.5, 0.5);
        assert!(roi.intersects(&FrameRegion::new(0.7, 0.7, 0.2, 0.2)));
        assert!(!roi.intersects(&FrameRegion::new(0.8, 0.0, 0.2, 0.2)));
    }

    #[test]
    fn test_zbar_names() {
        assert_eq!(Symbology::from_zbar("EAN-13"), Some(Symbology::Ean13));
        assert_eq!(Symbology::from_zbar("PDF417"), Some(Symbology::Pdf417));
        assert_eq!(Symbology::from_zbar("COMPOSITE"), None);
    }

    #[test]
    fn test_validate_rejects_short_buffer() {
        let mut frame = CameraFrame::new(4, 4, PixelFormat::Gray8, vec![0; 16]);
        assert!(frame.validate().is_ok());

        frame.data = Arc::from(vec![0u8; 10].into_boxed_slice());
        assert!(matches!(frame.validate(), Err(ScanError::InvalidFrame(_))));
    }

    #[test]
    fn test_validate_accepts_stride_padding() {
        let mut frame = CameraFrame::new(2, 2, PixelFormat::RGBA, vec![0; 20]);
        frame.stride = 10;
        // Last row needs no padding
        frame.data = Arc::from(vec![0u8; 18].into_boxed_slice());
        assert!(frame.validate().is_ok());
    }
}
