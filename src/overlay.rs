// SPDX-License-Identifier: GPL-3.0-only

//! Region-of-interest overlay
//!
//! Computes the on-screen scan rectangle from the hosting view's frame and
//! converts it into the normalized capture coordinates the device uses to
//! restrict detection. Also describes the rounded outline drawn over the
//! preview at the same geometry.
//!
//! Everything here is a pure function of its inputs, so recomputing after a
//! layout pass with unchanged bounds gives the same region.

use crate::backends::camera::types::{FrameRegion, FrameSize};
use crate::constants::overlay;

/// Rectangle in view (layer) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Scan rectangle for a hosting view frame
///
/// All sides are fractions of the frame width. The top edge sits a fixed
/// distance above the frame's vertical center.
pub fn scan_rect(frame: Rect) -> Rect {
    Rect {
        x: frame.x + frame.width * overlay::MARGIN_FRACTION,
        y: frame.center_y() - overlay::VERTICAL_OFFSET,
        width: frame.width * overlay::WIDTH_FRACTION,
        height: frame.width * overlay::HEIGHT_FRACTION,
    }
}

/// How the preview scales capture frames into its bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoGravity {
    /// Preserve aspect ratio and fill the layer, cropping overflow
    #[default]
    AspectFill,
    /// Preserve aspect ratio and fit inside the layer (letterbox)
    AspectFit,
    /// Scale each axis independently
    Stretch,
}

/// Surface the preview is rendered into
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PreviewSurface {
    /// Frame of the hosting view
    pub frame: Rect,
    pub gravity: VideoGravity,
}

impl PreviewSurface {
    pub fn new(frame: Rect) -> Self {
        Self {
            frame,
            gravity: VideoGravity::default(),
        }
    }

    pub fn with_gravity(mut self, gravity: VideoGravity) -> Self {
        self.gravity = gravity;
        self
    }
}

/// Preview attached to a configured session
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewLayer {
    surface: PreviewSurface,
    /// Size of the frames being previewed, once the device reports it
    capture_size: Option<FrameSize>,
}

impl PreviewLayer {
    pub fn new(surface: PreviewSurface) -> Self {
        Self {
            surface,
            capture_size: None,
        }
    }

    pub fn frame(&self) -> Rect {
        self.surface.frame
    }

    pub fn set_frame(&mut self, frame: Rect) {
        self.surface.frame = frame;
    }

    pub fn set_capture_size(&mut self, size: Option<FrameSize>) {
        self.capture_size = size;
    }

    /// Where the video lands inside the layer: `(offset_x, offset_y, width, height)`
    ///
    /// For aspect fill the video overflows the layer and the offsets are
    /// negative.
    fn video_bounds(&self, capture: FrameSize) -> (f64, f64, f64, f64) {
        let layer = self.surface.frame;
        let capture_width = capture.width as f64;
        let capture_height = capture.height as f64;

        let (video_width, video_height) = match self.surface.gravity {
            VideoGravity::Stretch => (layer.width, layer.height),
            VideoGravity::AspectFill => {
                let scale = (layer.width / capture_width).max(layer.height / capture_height);
                (capture_width * scale, capture_height * scale)
            }
            VideoGravity::AspectFit => {
                let scale = (layer.width / capture_width).min(layer.height / capture_height);
                (capture_width * scale, capture_height * scale)
            }
        };

        let offset_x = (layer.width - video_width) / 2.0;
        let offset_y = (layer.height - video_height) / 2.0;

        (offset_x, offset_y, video_width, video_height)
    }

    /// Convert a rectangle in layer coordinates into normalized capture
    /// coordinates, clamped to the frame
    ///
    /// Gives [`FrameRegion::ZERO`] while the layer has no size or the capture
    /// size is unknown.
    pub fn normalized_rect(&self, rect: &Rect) -> FrameRegion {
        let layer = self.surface.frame;
        let Some(capture) = self.capture_size.filter(|size| !size.is_empty()) else {
            return FrameRegion::ZERO;
        };
        if layer.is_empty() {
            return FrameRegion::ZERO;
        }

        let (offset_x, offset_y, video_width, video_height) = self.video_bounds(capture);

        let left = (rect.x - layer.x - offset_x) / video_width;
        let top = (rect.y - layer.y - offset_y) / video_height;
        let right = left + rect.width / video_width;
        let bottom = top + rect.height / video_height;

        let left = left.clamp(0.0, 1.0);
        let top = top.clamp(0.0, 1.0);
        let right = right.clamp(0.0, 1.0);
        let bottom = bottom.clamp(0.0, 1.0);

        FrameRegion::new(left, top, right - left, bottom - top)
    }
}

/// Rounded outline drawn over the scan rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayOutline {
    pub rect: Rect,
    pub corner_radius: f64,
    pub border_width: f64,
}

impl OverlayOutline {
    pub fn for_frame(frame: Rect) -> Self {
        Self {
            rect: scan_rect(frame),
            corner_radius: overlay::CORNER_RADIUS,
            border_width: overlay::BORDER_WIDTH,
        }
    }
}
