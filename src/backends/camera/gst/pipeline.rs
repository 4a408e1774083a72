// SPDX-License-Identifier: MPL-2.0

//! GStreamer capture pipelines
//!
//! Two pipeline shapes, one per delivery mode:
//!
//! - frame-sample output: `source ! convert/scale ! RGBA ! appsink`, frames
//!   are copied out in the appsink callback on the streaming thread
//! - metadata output: `source ! convert/scale ! videocrop ! zbar ! fakesink`,
//!   decoded symbols arrive as `barcode` element messages on the bus

use super::super::frame_loop::LoopAction;
use super::super::types::*;
use crate::config::FormatSettings;
use crate::constants::{self, timing};
use crate::errors::{CaptureError, CaptureResult};
use crate::session::DeliveryMode;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, trace, warn};

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Name of the crop element restricting metadata detection
pub const CROP_ELEMENT: &str = "roi";
/// Name of the appsink element of the frame-sample output
pub const SINK_ELEMENT: &str = "sink";

/// Build the launch description for a device and delivery mode
pub fn build_pipeline_string(source: &str, format: &FormatSettings, mode: DeliveryMode) -> String {
    let rate = match format.framerate {
        Some(fps) => format!("videorate ! video/x-raw,framerate={}/1 ! ", fps),
        None => String::new(),
    };
    let scaled = format!(
        "{} ! videoconvert ! videoscale ! {}video/x-raw,width={},height={}",
        source, rate, format.width, format.height
    );

    match mode {
        DeliveryMode::SampleBuffer => format!(
            "{} ! videoconvert ! video/x-raw,format=RGBA ! appsink name={}",
            scaled, SINK_ELEMENT
        ),
        DeliveryMode::Metadata => format!(
            "{} ! videocrop name={} ! videoconvert ! zbar name=decoder cache=false message=true ! fakesink sync=false",
            scaled, CROP_ELEMENT
        ),
    }
}

/// Launch description into a pipeline (still in NULL state)
pub fn create_pipeline(description: &str) -> CaptureResult<gstreamer::Pipeline> {
    debug!(pipeline = %description, "Parsing capture pipeline");

    gstreamer::parse::launch(description)
        .map_err(|e| CaptureError::InputUnavailable(e.to_string()))?
        .dynamic_cast::<gstreamer::Pipeline>()
        .map_err(|_| CaptureError::InputUnavailable("Failed to cast to pipeline".to_string()))
}

/// Install the frame callback on the pipeline's appsink
///
/// The callback runs on the GStreamer streaming thread. Each frame is tagged
/// with the region of interest active at capture time.
pub fn attach_frame_sink(
    pipeline: &gstreamer::Pipeline,
    sink: CaptureSink,
    region: Arc<Mutex<Option<RegionOfInterest>>>,
) -> CaptureResult<()> {
    let appsink = pipeline
        .by_name(SINK_ELEMENT)
        .ok_or_else(|| CaptureError::InputUnavailable("Failed to get appsink".to_string()))?
        .dynamic_cast::<AppSink>()
        .map_err(|_| CaptureError::InputUnavailable("Failed to cast appsink".to_string()))?;

    appsink.set_property("sync", false);
    appsink.set_property("max-buffers", constants::pipeline::MAX_BUFFERS);
    appsink.set_property("drop", true);
    appsink.set_property("enable-last-sample", false);

    appsink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let frame_start = Instant::now();
                let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);

                let sample = appsink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;

                if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
                    trace!(frame = frame_num, "Skipping corrupted buffer");
                    return Ok(gstreamer::FlowSuccess::Ok);
                }

                let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                let info = VideoInfo::from_caps(caps).map_err(|e| {
                    error!(frame = frame_num, error = ?e, "Failed to get video info");
                    gstreamer::FlowError::Error
                })?;
                let map = buffer.map_readable().map_err(|e| {
                    error!(frame = frame_num, error = ?e, "Failed to map buffer");
                    gstreamer::FlowError::Error
                })?;

                let frame = CameraFrame {
                    width: info.width(),
                    height: info.height(),
                    data: Arc::from(map.as_slice()),
                    format: PixelFormat::RGBA,
                    stride: info.stride()[0] as u32,
                    region: *region.lock().unwrap_or_else(PoisonError::into_inner),
                };

                if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        frame = frame_num,
                        width = frame.width,
                        height = frame.height,
                        stride = frame.stride,
                        copy_us = frame_start.elapsed().as_micros(),
                        "Frame delivered"
                    );
                }

                sink(CaptureOutput::Frame(Arc::new(frame)));
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );

    Ok(())
}

/// Apply a region of interest to the crop element as pixel insets
pub fn apply_crop(crop: &gstreamer::Element, region: Option<RegionOfInterest>, size: FrameSize) {
    let (left, top, right, bottom) = match region {
        Some(region) => {
            let (x, y, width, height) = region.to_pixel_rect(size.width, size.height);
            (
                x,
                y,
                size.width.saturating_sub(x + width),
                size.height.saturating_sub(y + height),
            )
        }
        None => (0, 0, 0, 0),
    };

    debug!(left, top, right, bottom, "Applying crop insets");
    crop.set_property("left", left as i32);
    crop.set_property("top", top as i32);
    crop.set_property("right", right as i32);
    crop.set_property("bottom", bottom as i32);
}

/// Poll the bus once, forwarding decoded symbols to `sink`
///
/// Only symbols of an accepted symbology are forwarded; zbar reports
/// everything it can read.
pub fn poll_bus(bus: &gstreamer::Bus, sink: &CaptureSink, accepted: &[Symbology]) -> LoopAction {
    let Some(msg) = bus.timed_pop(gstreamer::ClockTime::from_mseconds(timing::BUS_POLL_MS)) else {
        return LoopAction::Continue;
    };

    use gstreamer::MessageView;
    match msg.view() {
        MessageView::Element(element) => {
            if let Some(structure) = element.structure()
                && structure.has_name("barcode")
                && let Some(object) = metadata_from_structure(structure, accepted)
            {
                sink(CaptureOutput::Metadata(vec![object]));
            }
            LoopAction::Continue
        }
        MessageView::Error(err) => {
            error!(error = %err.error(), debug = ?err.debug(), "Capture pipeline error");
            LoopAction::Stop
        }
        MessageView::Eos(_) => {
            warn!("Capture pipeline reached end of stream");
            LoopAction::Stop
        }
        _ => LoopAction::Continue,
    }
}

/// Convert a zbar `barcode` message into a metadata object
fn metadata_from_structure(
    structure: &gstreamer::StructureRef,
    accepted: &[Symbology],
) -> Option<MetadataObject> {
    let kind = structure.get::<String>("type").ok()?;
    let symbology = Symbology::from_zbar(&kind)?;
    if !accepted.contains(&symbology) {
        trace!(symbology = %symbology, "Ignoring symbol outside accepted types");
        return None;
    }

    Some(MetadataObject {
        kind: MetadataKind::MachineReadableCode,
        symbology: Some(symbology),
        string_value: structure.get::<String>("symbol").ok(),
        bounds: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> FormatSettings {
        FormatSettings {
            width: 1280,
            height: 720,
            framerate: None,
        }
    }

    #[test]
    fn test_sample_buffer_pipeline_ends_in_appsink() {
        let description =
            build_pipeline_string("v4l2src device=/dev/video0", &format(), DeliveryMode::SampleBuffer);
        assert!(description.starts_with("v4l2src device=/dev/video0 ! "));
        assert!(description.contains("format=RGBA"));
        assert!(description.ends_with("appsink name=sink"));
        assert!(!description.contains("zbar"));
    }

    #[test]
    fn test_metadata_pipeline_crops_before_decoding() {
        let description = build_pipeline_string("autovideosrc", &format(), DeliveryMode::Metadata);
        let crop = description.find("videocrop name=roi").unwrap();
        let zbar = description.find("zbar").unwrap();
        assert!(crop < zbar);
        assert!(!description.contains("appsink"));
    }

    #[test]
    fn test_framerate_adds_videorate() {
        let mut format = format();
        format.framerate = Some(15);
        let description = build_pipeline_string("autovideosrc", &format, DeliveryMode::Metadata);
        assert!(description.contains("videorate ! video/x-raw,framerate=15/1"));
    }
}
