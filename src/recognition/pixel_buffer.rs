// SPDX-License-Identifier: GPL-3.0-only

//! Pixel-buffer recognition
//!
//! Raw frames are reduced to a luminance plane (cropped to the region of
//! interest the frame was captured with, then downscaled) and handed to the
//! rqrr decoder. The first decodable symbol in the frame is returned.

use super::RecognizedCode;
use crate::backends::camera::types::{CameraFrame, PixelFormat, Symbology};
use crate::constants::decode;
use crate::errors::ScanError;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Software decoder for raw frames
#[derive(Debug, Clone, Copy)]
pub struct PixelBufferRecognizer {
    /// Frames are downscaled so neither side exceeds this
    max_dimension: u32,
}

impl Default for PixelBufferRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelBufferRecognizer {
    pub fn new() -> Self {
        Self {
            max_dimension: decode::MAX_DIMENSION,
        }
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Decode a frame on the blocking pool
    ///
    /// The returned future owns everything it needs and does not borrow the
    /// recognizer, so several decodes can be in flight at once.
    pub fn recognize(
        &self,
        frame: Arc<CameraFrame>,
    ) -> impl Future<Output = Result<Option<RecognizedCode>, ScanError>> + Send + 'static + use<> {
        let max_dimension = self.max_dimension;
        async move {
            tokio::task::spawn_blocking(move || decode_sync(&frame, max_dimension))
                .await
                .map_err(|e| {
                    warn!(error = %e, "Decode task panicked");
                    ScanError::Decoder(e.to_string())
                })?
        }
    }

    /// Decode a frame on the calling thread
    pub fn recognize_blocking(&self, frame: &CameraFrame) -> Result<Option<RecognizedCode>, ScanError> {
        decode_sync(frame, self.max_dimension)
    }
}

/// Run `decode` over `items` with up to `concurrency` in flight, yielding
/// results in input order
pub fn decode_in_order<S, F, Fut>(
    items: S,
    concurrency: usize,
    decode: F,
) -> impl Stream<Item = Fut::Output>
where
    S: Stream,
    F: FnMut(S::Item) -> Fut,
    Fut: Future,
{
    items.map(decode).buffered(concurrency.max(1))
}

/// 8-bit luminance plane
struct LumaPlane {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

fn decode_sync(frame: &CameraFrame, max_dimension: u32) -> Result<Option<RecognizedCode>, ScanError> {
    let start = std::time::Instant::now();
    frame.validate()?;

    let crop = match frame.region {
        Some(region) if !region.is_degenerate() => region.to_pixel_rect(frame.width, frame.height),
        _ => (0, 0, frame.width, frame.height),
    };

    let luma = extract_luma(frame, crop);
    let luma = downscale_luma(luma, max_dimension as usize);

    trace!(
        width = luma.width,
        height = luma.height,
        prepare_ms = start.elapsed().as_millis(),
        "Prepared luma plane"
    );

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(luma.width, luma.height, |x, y| {
            luma.data[y * luma.width + x]
        });
    let grids = prepared.detect_grids();

    for grid in grids {
        match grid.decode() {
            Ok((_meta, content)) if !content.is_empty() => {
                debug!(
                    content = %content,
                    total_ms = start.elapsed().as_millis(),
                    "Decoded code from frame"
                );
                return Ok(Some(RecognizedCode::new(content, Symbology::QrCode)));
            }
            Ok(_) => trace!("Decoded empty payload"),
            Err(e) => debug!(error = ?e, "Failed to decode grid"),
        }
    }

    Ok(None)
}

/// Luminance of the `(x, y, width, height)` pixel rectangle, without stride padding
fn extract_luma(frame: &CameraFrame, (x0, y0, width, height): (u32, u32, u32, u32)) -> LumaPlane {
    let bpp = frame.format.bytes_per_pixel();
    let stride = frame.stride as usize;
    let (x0, y0, width, height) = (x0 as usize, y0 as usize, width as usize, height as usize);

    let mut data = Vec::with_capacity(width * height);

    for y in y0..y0 + height {
        let row_start = y * stride + x0 * bpp;
        let row = &frame.data[row_start..row_start + width * bpp];
        match frame.format {
            PixelFormat::Gray8 => data.extend_from_slice(row),
            PixelFormat::RGBA => {
                data.extend(row.chunks_exact(4).map(|px| luma(px[0], px[1], px[2])));
            }
            PixelFormat::BGRA => {
                data.extend(row.chunks_exact(4).map(|px| luma(px[2], px[1], px[0])));
            }
        }
    }

    LumaPlane {
        width,
        height,
        data,
    }
}

/// BT.601 luma in fixed point
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Downscale using bilinear interpolation so neither side exceeds `max_dimension`
fn downscale_luma(plane: LumaPlane, max_dimension: usize) -> LumaPlane {
    let src_width = plane.width;
    let src_height = plane.height;

    if src_width <= max_dimension && src_height <= max_dimension {
        return plane;
    }

    let scale = (src_width as f32 / max_dimension as f32).max(src_height as f32 / max_dimension as f32);
    let dst_width = ((src_width as f32 / scale) as usize).max(1);
    let dst_height = ((src_height as f32 / scale) as usize).max(1);

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    let get = |px: usize, py: usize| plane.data[py * src_width + px] as f32;

    let mut data = Vec::with_capacity(dst_width * dst_height);
    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = (src_x as usize).min(src_width - 1);
            let y0 = (src_y as usize).min(src_height - 1);
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let top = get(x0, y0) * (1.0 - x_frac) + get(x1, y0) * x_frac;
            let bottom = get(x0, y1) * (1.0 - x_frac) + get(x1, y1) * x_frac;
            let value = top * (1.0 - y_frac) + bottom * y_frac;

            data.push(value.round().clamp(0.0, 255.0) as u8);
        }
    }

    LumaPlane {
        width: dst_width,
        height: dst_height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::FrameRegion;

    #[test]
    fn test_extract_luma_skips_stride_padding() {
        // 2x2 RGBA frame with 4 bytes padding per row
        let mut frame = CameraFrame::new(
            2,
            2,
            PixelFormat::RGBA,
            vec![
                255, 255, 255, 255, 0, 0, 0, 255, 9, 9, 9, 9, //
                0, 0, 0, 255, 255, 255, 255, 255, 9, 9, 9, 9,
            ],
        );
        frame.stride = 12;

        let plane = extract_luma(&frame, (0, 0, 2, 2));
        assert_eq!((plane.width, plane.height), (2, 2));
        assert_eq!(plane.data, vec![255, 0, 0, 255]);
    }

    #[test]
    fn test_extract_luma_channel_order() {
        let rgba = CameraFrame::new(1, 1, PixelFormat::RGBA, vec![255, 0, 0, 255]);
        let bgra = CameraFrame::new(1, 1, PixelFormat::BGRA, vec![0, 0, 255, 255]);
        assert_eq!(extract_luma(&rgba, (0, 0, 1, 1)).data, extract_luma(&bgra, (0, 0, 1, 1)).data);
    }

    #[test]
    fn test_extract_luma_crops() {
        let data: Vec<u8> = (0..16).collect();
        let frame = CameraFrame::new(4, 4, PixelFormat::Gray8, data);
        let plane = extract_luma(&frame, (1, 2, 2, 2));
        assert_eq!(plane.data, vec![9, 10, 13, 14]);
    }

    #[test]
    fn test_downscale_luma() {
        let plane = LumaPlane {
            width: 4,
            height: 2,
            data: vec![100; 8],
        };
        let scaled = downscale_luma(plane, 2);
        assert_eq!((scaled.width, scaled.height), (2, 1));
        assert_eq!(scaled.data, vec![100, 100]);
    }

    #[test]
    fn test_small_plane_is_not_resized() {
        let plane = LumaPlane {
            width: 3,
            height: 3,
            data: vec![7; 9],
        };
        let scaled = downscale_luma(plane, 640);
        assert_eq!((scaled.width, scaled.height), (3, 3));
    }

    #[test]
    fn test_blank_frame_has_no_code() {
        let frame = CameraFrame::new(64, 48, PixelFormat::RGBA, vec![255; 64 * 48 * 4]);
        let result = PixelBufferRecognizer::new().recognize_blocking(&frame);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_region_is_honoured_on_tiny_frames() {
        let mut frame = CameraFrame::new(8, 8, PixelFormat::Gray8, vec![0; 64]);
        frame.region = Some(FrameRegion::new(0.9, 0.9, 0.5, 0.5));
        assert!(matches!(decode_sync(&frame, 640), Ok(None)));
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        let mut frame = CameraFrame::new(64, 48, PixelFormat::RGBA, vec![0; 16]);
        frame.stride = 256;
        let result = PixelBufferRecognizer::new().recognize_blocking(&frame);
        assert!(matches!(result, Err(ScanError::InvalidFrame(_))));
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let items = futures::stream::iter(vec![(0, 40), (1, 0), (2, 20), (3, 5)]);
        let results: Vec<u32> = decode_in_order(items, 4, |(index, delay_ms)| async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            index
        })
        .collect()
        .await;

        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_progresses() {
        let items = futures::stream::iter(1..=3);
        let results: Vec<i32> = decode_in_order(items, 0, |n| async move { n * 2 })
            .collect()
            .await;
        assert_eq!(results, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_recognize_on_blocking_pool() {
        let frame = Arc::new(CameraFrame::new(32, 32, PixelFormat::Gray8, vec![128; 1024]));
        let result = PixelBufferRecognizer::with_max_dimension(16).recognize(frame).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_recognize_future_outlives_recognizer() {
        let frames: Vec<_> = (0..3)
            .map(|_| Arc::new(CameraFrame::new(16, 16, PixelFormat::Gray8, vec![255; 256])))
            .collect();

        let recognizer = PixelBufferRecognizer::new();
        let results: Vec<_> = decode_in_order(futures::stream::iter(frames), 2, move |frame| {
            recognizer.recognize(frame)
        })
        .collect()
        .await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|result| matches!(result, Ok(None))));

        let frame = Arc::new(CameraFrame::new(16, 16, PixelFormat::Gray8, vec![0; 256]));
        let pending = {
            let recognizer = PixelBufferRecognizer::new();
            recognizer.recognize(frame)
        };
        let result = tokio::spawn(pending).await.expect("decode task");
        assert!(matches!(result, Ok(None)));
    }
}
