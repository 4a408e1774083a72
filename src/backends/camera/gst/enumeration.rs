// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer camera enumeration
//!
//! Cameras are discovered with a `DeviceMonitor` filtered on the
//! `Video/Source` class, which covers both V4L2 and PipeWire providers.

use super::super::types::CameraDevice;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Properties that carry a usable device path, in priority order
const PATH_PROPERTIES: [&str; 3] = ["api.v4l2.path", "device.path", "object.serial"];

/// Enumerate video sources known to GStreamer
///
/// Returns `None` when GStreamer or the device monitor is unavailable, and
/// an empty list when the monitor works but sees no cameras.
pub fn enumerate_cameras() -> Option<Vec<CameraDevice>> {
    if let Err(e) = gstreamer::init() {
        warn!(error = %e, "GStreamer init failed");
        return None;
    }

    let monitor = gstreamer::DeviceMonitor::new();
    let _ = monitor.add_filter(Some("Video/Source"), None);

    if let Err(e) = monitor.start() {
        warn!(error = %e, "Device monitor failed to start");
        return None;
    }

    let cameras: Vec<CameraDevice> = monitor
        .devices()
        .into_iter()
        .map(|device| {
            let name = device.display_name().to_string();
            let properties = device.properties();

            let api = properties
                .as_ref()
                .and_then(|props| props.get::<String>("device.api").ok());
            let path = properties.as_ref().and_then(|props| {
                PATH_PROPERTIES
                    .iter()
                    .find_map(|key| props.get::<String>(*key).ok())
            });

            debug!(name = %name, ?api, ?path, "Found video source");
            CameraDevice { name, path, api }
        })
        .collect();

    monitor.stop();

    info!(count = cameras.len(), "Enumerated cameras");
    Some(cameras)
}

/// Source element description for a camera
pub fn source_element(camera: &CameraDevice) -> String {
    match (camera.api.as_deref(), camera.path.as_deref()) {
        (Some("v4l2"), Some(path)) => format!("v4l2src device={}", path),
        (Some("pipewire"), Some(serial)) => format!("pipewiresrc target-object={}", serial),
        _ => "autovideosrc".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_element_for_v4l2() {
        let camera = CameraDevice {
            name: "Integrated Camera".to_string(),
            path: Some("/dev/video0".to_string()),
            api: Some("v4l2".to_string()),
        };
        assert_eq!(source_element(&camera), "v4l2src device=/dev/video0");
    }

    #[test]
    fn test_source_element_falls_back_to_auto() {
        assert_eq!(source_element(&CameraDevice::new("Unknown")), "autovideosrc");
    }
}
