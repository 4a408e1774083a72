// SPDX-License-Identifier: GPL-3.0-only

//! In-memory capture device
//!
//! The virtual device honours the same open/start/stop contract as a
//! hardware device, but its output is whatever the paired [`VirtualFeed`]
//! pushes: frames loaded from image files, or scripted metadata batches.
//! Pushes while the device is stopped are dropped, like a camera that is not
//! running.
//!
//! In metadata mode the device plays the part of the platform decoder: it
//! drops objects of symbologies the output does not accept and objects that
//! lie entirely outside the region of interest.

pub mod file_source;

use crate::backends::camera::types::*;
use crate::backends::camera::{CaptureDevice, DeviceProvider};
use crate::errors::{CaptureError, CaptureResult};
use crate::session::{DeliveryMode, OutputConfiguration};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// How the provider behaves when asked for its default device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Available,
    /// No device at all
    Missing,
    /// A device that refuses to be opened as input
    Unopenable,
}

#[derive(Default)]
struct FeedState {
    sink: Option<CaptureSink>,
    mode: Option<DeliveryMode>,
    accepted: Vec<Symbology>,
    region: Option<RegionOfInterest>,
}

/// State shared between the device and its feed
struct Shared {
    running: AtomicBool,
    state: Mutex<FeedState>,
}

impl Shared {
    fn state(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for pushing output into a virtual device
#[derive(Clone)]
pub struct VirtualFeed {
    shared: Arc<Shared>,
}

impl VirtualFeed {
    /// Push a frame; returns whether it was delivered
    pub fn push_frame(&self, frame: CameraFrame) -> bool {
        self.push(CaptureOutput::Frame(Arc::new(frame)), false)
    }

    /// Load an image file and push it as a frame
    pub fn push_image(&self, path: &Path) -> CaptureResult<bool> {
        Ok(self.push_frame(file_source::load_image_as_frame(path)?))
    }

    /// Push one metadata batch; returns whether it was delivered
    pub fn push_metadata(&self, objects: Vec<MetadataObject>) -> bool {
        self.push(CaptureOutput::Metadata(objects), false)
    }

    /// Deliver output regardless of the running state, the way a callback
    /// already in flight when the device stopped still lands.
    pub fn push_in_flight(&self, output: CaptureOutput) -> bool {
        self.push(output, true)
    }

    /// Whether the device is currently started
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Region of interest last applied to the device
    pub fn region_of_interest(&self) -> Option<RegionOfInterest> {
        self.shared.state().region
    }

    fn push(&self, output: CaptureOutput, in_flight: bool) -> bool {
        if !in_flight && !self.is_running() {
            trace!("Virtual device stopped, dropping output");
            return false;
        }

        let (sink, output) = {
            let state = self.shared.state();
            let Some(sink) = state.sink.clone() else {
                return false;
            };
            let output = match (state.mode, output) {
                (Some(DeliveryMode::SampleBuffer), CaptureOutput::Frame(frame)) => {
                    let mut frame = Arc::unwrap_or_clone(frame);
                    frame.region = state.region;
                    CaptureOutput::Frame(Arc::new(frame))
                }
                (Some(DeliveryMode::Metadata), CaptureOutput::Metadata(objects)) => {
                    CaptureOutput::Metadata(filter_objects(objects, &state.accepted, state.region))
                }
                (mode, _) => {
                    debug!(?mode, "Output does not match the attached output type");
                    return false;
                }
            };
            (sink, output)
        };

        // Called outside the lock, as a device thread would.
        sink(output);
        true
    }
}

/// Platform-side filtering of a metadata batch
fn filter_objects(
    objects: Vec<MetadataObject>,
    accepted: &[Symbology],
    region: Option<RegionOfInterest>,
) -> Vec<MetadataObject> {
    objects
        .into_iter()
        .filter(|object| match object.symbology {
            Some(symbology) => accepted.contains(&symbology),
            None => true,
        })
        .filter(|object| match (region, object.bounds) {
            (Some(region), Some(bounds)) => region.intersects(&bounds),
            _ => true,
        })
        .collect()
}

/// A capture device fed from memory
pub struct VirtualCaptureDevice {
    info: CameraDevice,
    frame_size: FrameSize,
    opened: bool,
    refuse_input: bool,
    shared: Arc<Shared>,
}

impl CaptureDevice for VirtualCaptureDevice {
    fn info(&self) -> &CameraDevice {
        &self.info
    }

    fn open(&mut self, output: &OutputConfiguration, sink: CaptureSink) -> CaptureResult<()> {
        if self.refuse_input {
            return Err(CaptureError::InputUnavailable(format!(
                "{} refused to open",
                self.info.name
            )));
        }
        if self.opened {
            return Err(CaptureError::InputUnavailable(
                "Device already has an output attached".to_string(),
            ));
        }

        let mut state = self.shared.state();
        state.sink = Some(sink);
        state.mode = Some(output.mode());
        state.accepted = output.symbologies().to_vec();
        self.opened = true;
        Ok(())
    }

    fn start(&mut self) -> CaptureResult<()> {
        if !self.opened {
            return Err(CaptureError::NotConfigured);
        }
        self.shared.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> CaptureResult<()> {
        self.shared.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn frame_size(&self) -> Option<FrameSize> {
        Some(self.frame_size)
    }

    fn set_region_of_interest(&mut self, region: Option<RegionOfInterest>) {
        self.shared.state().region = region;
    }
}

/// Provider handing out one virtual device
pub struct VirtualDeviceProvider {
    info: CameraDevice,
    frame_size: FrameSize,
    availability: Availability,
    shared: Arc<Shared>,
}

impl VirtualDeviceProvider {
    /// Provider with one working device and the feed that drives it
    pub fn new(frame_size: FrameSize) -> (Self, VirtualFeed) {
        Self::with_availability(frame_size, Availability::Available)
    }

    /// Provider that finds no device
    pub fn unavailable() -> Self {
        Self::with_availability(FrameSize::new(0, 0), Availability::Missing).0
    }

    /// Provider whose device cannot be opened as input
    pub fn unopenable(frame_size: FrameSize) -> Self {
        Self::with_availability(frame_size, Availability::Unopenable).0
    }

    fn with_availability(frame_size: FrameSize, availability: Availability) -> (Self, VirtualFeed) {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            state: Mutex::new(FeedState::default()),
        });
        let feed = VirtualFeed {
            shared: Arc::clone(&shared),
        };
        let provider = Self {
            info: CameraDevice {
                name: "Virtual Camera".to_string(),
                path: None,
                api: Some("virtual".to_string()),
            },
            frame_size,
            availability,
            shared,
        };
        (provider, feed)
    }
}

impl DeviceProvider for VirtualDeviceProvider {
    fn enumerate(&self) -> Vec<CameraDevice> {
        match self.availability {
            Availability::Missing => Vec::new(),
            _ => vec![self.info.clone()],
        }
    }

    fn default_device(&self) -> Option<Box<dyn CaptureDevice>> {
        if self.availability == Availability::Missing {
            return None;
        }
        Some(Box::new(VirtualCaptureDevice {
            info: self.info.clone(),
            frame_size: self.frame_size,
            opened: false,
            refuse_input: self.availability == Availability::Unopenable,
            shared: Arc::clone(&self.shared),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CaptureError;

    #[test]
    fn test_filter_drops_unaccepted_symbologies() {
        let objects = vec![
            MetadataObject::code(Symbology::QrCode, "https://example.com"),
            MetadataObject::code(Symbology::Ean13, "4006381333931"),
            MetadataObject::other(),
        ];
        let filtered = filter_objects(objects, &[Symbology::Ean13], None);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].string_value.as_deref(), Some("4006381333931"));
    }

    #[test]
    fn test_filter_drops_objects_outside_region() {
        let region = FrameRegion::new(0.1, 0.3, 0.8, 0.3);
        let objects = vec![
            MetadataObject::code(Symbology::Ean8, "96385074")
                .with_bounds(FrameRegion::new(0.0, 0.0, 0.2, 0.1)),
            MetadataObject::code(Symbology::Ean8, "55123457")
                .with_bounds(FrameRegion::new(0.4, 0.4, 0.2, 0.1)),
        ];
        let filtered = filter_objects(objects, &[Symbology::Ean8], Some(region));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].string_value.as_deref(), Some("55123457"));
    }

    #[test]
    fn test_push_before_start_is_dropped() {
        let (provider, feed) = VirtualDeviceProvider::new(FrameSize::new(640, 480));
        let mut device = provider.default_device().unwrap();
        device
            .open(&OutputConfiguration::metadata(), Arc::new(|_| {}))
            .unwrap();

        assert!(!feed.push_metadata(vec![MetadataObject::other()]));
        device.start().unwrap();
        assert!(feed.push_metadata(vec![MetadataObject::other()]));
    }

    #[test]
    fn test_unopenable_device() {
        let provider = VirtualDeviceProvider::unopenable(FrameSize::new(640, 480));
        let mut device = provider.default_device().unwrap();
        let result = device.open(&OutputConfiguration::metadata(), Arc::new(|_| {}));
        assert!(matches!(result, Err(CaptureError::InputUnavailable(_))));
    }
}
