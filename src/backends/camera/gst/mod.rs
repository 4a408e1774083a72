// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture backend
//!
//! Hardware capture through GStreamer. The frame-sample output hands RGBA
//! frames out of an appsink; the metadata output runs the zbar decoder inside
//! the pipeline and reports decoded symbols through the bus, which a
//! [`CaptureLoopController`] thread polls.

mod enumeration;
mod pipeline;

pub use enumeration::{enumerate_cameras, source_element};
pub use pipeline::build_pipeline_string;

use super::frame_loop::CaptureLoopController;
use super::types::*;
use super::{CaptureDevice, DeviceProvider};
use crate::errors::{CaptureError, CaptureResult};
use crate::session::{DeliveryMode, OutputConfiguration};
use gstreamer::prelude::*;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Device provider backed by the GStreamer device monitor
#[derive(Debug, Clone, Default)]
pub struct GstDeviceProvider {
    /// Device path to prefer over the first enumerated camera
    preferred_path: Option<String>,
}

impl GstDeviceProvider {
    pub fn new(preferred_path: Option<String>) -> Self {
        Self { preferred_path }
    }
}

impl DeviceProvider for GstDeviceProvider {
    fn enumerate(&self) -> Vec<CameraDevice> {
        enumerate_cameras().unwrap_or_default()
    }

    fn default_device(&self) -> Option<Box<dyn CaptureDevice>> {
        let cameras = self.enumerate();

        let preferred = self.preferred_path.as_deref().and_then(|wanted| {
            cameras
                .iter()
                .find(|camera| camera.path.as_deref() == Some(wanted))
        });
        if self.preferred_path.is_some() && preferred.is_none() {
            warn!(path = ?self.preferred_path, "Preferred camera not found, using default");
        }

        let camera = preferred.or_else(|| cameras.first())?.clone();
        info!(camera = %camera.name, "Selected capture device");
        Some(Box::new(GstCaptureDevice::new(camera)))
    }
}

/// Active pipeline state, present once the device is open
struct OpenPipeline {
    pipeline: gstreamer::Pipeline,
    mode: DeliveryMode,
    crop: Option<gstreamer::Element>,
    sink: CaptureSink,
    accepted: Vec<Symbology>,
}

/// A camera captured through a GStreamer pipeline
pub struct GstCaptureDevice {
    camera: CameraDevice,
    open: Option<OpenPipeline>,
    frame_size: Option<FrameSize>,
    region: Arc<Mutex<Option<RegionOfInterest>>>,
    bus_loop: Option<CaptureLoopController>,
}

impl GstCaptureDevice {
    pub fn new(camera: CameraDevice) -> Self {
        Self {
            camera,
            open: None,
            frame_size: None,
            region: Arc::new(Mutex::new(None)),
            bus_loop: None,
        }
    }

    fn apply_region(&self) {
        if let (Some(open), Some(size)) = (self.open.as_ref(), self.frame_size)
            && let Some(crop) = open.crop.as_ref()
        {
            let region = *self.region.lock().unwrap_or_else(PoisonError::into_inner);
            pipeline::apply_crop(crop, region, size);
        }
    }
}

impl CaptureDevice for GstCaptureDevice {
    fn info(&self) -> &CameraDevice {
        &self.camera
    }

    fn open(&mut self, output: &OutputConfiguration, sink: CaptureSink) -> CaptureResult<()> {
        if self.open.is_some() {
            return Err(CaptureError::InputUnavailable(
                "Device already has an output attached".to_string(),
            ));
        }

        gstreamer::init().map_err(|e| CaptureError::InputUnavailable(e.to_string()))?;

        let description =
            build_pipeline_string(&source_element(&self.camera), output.format(), output.mode());
        let capture = pipeline::create_pipeline(&description)?;

        let crop = match output.mode() {
            DeliveryMode::SampleBuffer => {
                pipeline::attach_frame_sink(&capture, Arc::clone(&sink), Arc::clone(&self.region))?;
                None
            }
            DeliveryMode::Metadata => Some(capture.by_name(pipeline::CROP_ELEMENT).ok_or_else(
                || CaptureError::InputUnavailable("Failed to get crop element".to_string()),
            )?),
        };

        let format = output.format();
        self.frame_size = Some(FrameSize::new(format.width, format.height));
        self.open = Some(OpenPipeline {
            pipeline: capture,
            mode: output.mode(),
            crop,
            sink,
            accepted: output.symbologies().to_vec(),
        });
        self.apply_region();

        info!(camera = %self.camera.name, mode = ?output.mode(), "Capture device opened");
        Ok(())
    }

    fn start(&mut self) -> CaptureResult<()> {
        let open = self.open.as_ref().ok_or(CaptureError::NotConfigured)?;

        open.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CaptureError::Backend(format!("Failed to start pipeline: {}", e)))?;

        let bus = open
            .pipeline
            .bus()
            .ok_or_else(|| CaptureError::Backend("Pipeline has no bus".to_string()))?;
        let sink = Arc::clone(&open.sink);
        let accepted = open.accepted.clone();
        let name = match open.mode {
            DeliveryMode::Metadata => "zbar-bus",
            DeliveryMode::SampleBuffer => "capture-bus",
        };
        self.bus_loop = Some(CaptureLoopController::start(name, move || {
            pipeline::poll_bus(&bus, &sink, &accepted)
        }));

        debug!(camera = %self.camera.name, "Pipeline set to PLAYING");
        Ok(())
    }

    fn stop(&mut self) -> CaptureResult<()> {
        if let Some(mut bus_loop) = self.bus_loop.take() {
            bus_loop.stop();
        }

        if let Some(open) = self.open.as_ref() {
            open.pipeline
                .set_state(gstreamer::State::Null)
                .map_err(|e| CaptureError::Backend(format!("Failed to stop pipeline: {}", e)))?;
            debug!(camera = %self.camera.name, "Pipeline set to NULL");
        }
        Ok(())
    }

    fn frame_size(&self) -> Option<FrameSize> {
        self.frame_size
    }

    fn set_region_of_interest(&mut self, region: Option<RegionOfInterest>) {
        *self.region.lock().unwrap_or_else(PoisonError::into_inner) = region;
        self.apply_region();
    }
}

impl Drop for GstCaptureDevice {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to stop capture device on drop");
        }
    }
}
