// SPDX-License-Identifier: MPL-2.0

//! Barcode capture pipeline
//!
//! Owns a camera capture session, configures what the capture hardware
//! decodes and how frames reach the application, turns capture callbacks
//! into recognized codes and republishes them as an asynchronous,
//! multi-subscriber event stream.
//!
//! # Architecture
//!
//! - [`backends`]: capture device traits, GStreamer and virtual devices
//! - [`session`]: capture session lifecycle and output configuration
//! - [`recognition`]: pixel-buffer and hardware-metadata recognizers
//! - [`publisher`]: barcode event stream
//! - [`overlay`]: scan rectangle and region-of-interest geometry
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```ignore
//! let (provider, feed) = VirtualDeviceProvider::new(FrameSize::new(1280, 720));
//! let mut session = CaptureSession::new(OutputConfiguration::metadata(), Arc::new(provider));
//! session.configure_capture_device(PreviewSurface::new(Rect::sized(320.0, 640.0)))?;
//! let mut events = session.subscribe();
//! session.start_running_session()?;
//! feed.push_metadata(vec![MetadataObject::code(Symbology::Ean13, "012345678905")]);
//! let event = events.recv().await;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod overlay;
pub mod publisher;
pub mod recognition;
pub mod session;

// Re-export commonly used types
pub use backends::camera::types::{CameraFrame, FrameRegion, FrameSize, MetadataObject, Symbology};
pub use config::Config;
pub use constants::CapturePreset;
pub use errors::{AppError, CaptureError, ScanError};
pub use overlay::{PreviewSurface, Rect};
pub use publisher::{BarcodeEvent, Subscription};
pub use recognition::RecognizedCode;
pub use session::{CaptureSession, DeliveryMode, OutputConfiguration, SessionState};
