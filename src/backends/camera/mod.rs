// SPDX-License-Identifier: MPL-2.0

//! Capture device abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← lifecycle, region of interest, dispatch
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   DeviceProvider    │  ← default device selection
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureDevice trait │  ← input + exactly one output
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!  ┌─────────┐ ┌─────────┐
//!  │GStreamer│ │ Virtual │
//!  └─────────┘ └─────────┘
//! ```

pub mod frame_loop;
pub mod gst;
pub mod types;

pub use types::*;

use crate::errors::CaptureResult;
use crate::session::OutputConfiguration;

/// A capture device wired with one input and one output
///
/// Devices deliver output through the [`CaptureSink`] registered in
/// [`CaptureDevice::open`], from a thread the device owns. They are driven by
/// a single owner and hold no locking of their own beyond what their
/// callback thread needs.
pub trait CaptureDevice: Send {
    /// Device description
    fn info(&self) -> &CameraDevice;

    /// Open the device as an input and attach the output described by
    /// `output`. Called at most once per device.
    ///
    /// # Returns
    /// * `Ok(())` - Input and output attached; nothing is delivered until `start`
    /// * `Err(CaptureError::InputUnavailable)` - Device cannot be used as input
    fn open(&mut self, output: &OutputConfiguration, sink: CaptureSink) -> CaptureResult<()>;

    /// Begin delivering output. Returns before the first callback arrives.
    fn start(&mut self) -> CaptureResult<()>;

    /// Stop delivering output. One callback already in flight may still land.
    fn stop(&mut self) -> CaptureResult<()>;

    /// Dimensions of delivered frames, known once the device is open
    fn frame_size(&self) -> Option<FrameSize>;

    /// Restrict detection to `region` (normalized), or the full frame for `None`
    fn set_region_of_interest(&mut self, region: Option<RegionOfInterest>);
}

/// Finds capture devices
pub trait DeviceProvider: Send + Sync {
    /// All video-capable devices
    fn enumerate(&self) -> Vec<CameraDevice>;

    /// The default video-capable device, or `None` if there is none
    fn default_device(&self) -> Option<Box<dyn CaptureDevice>>;
}
