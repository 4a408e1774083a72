// SPDX-License-Identifier: GPL-3.0-only

//! Image files as capture frames

use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::errors::{CaptureError, CaptureResult};
use std::path::Path;
use tracing::info;

/// Load an image file as a tightly packed RGBA frame
pub fn load_image_as_frame(path: &Path) -> CaptureResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        CaptureError::InputUnavailable(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    info!(width, height, "Image loaded successfully");

    Ok(CameraFrame::new(width, height, PixelFormat::RGBA, rgba.into_raw()))
}
