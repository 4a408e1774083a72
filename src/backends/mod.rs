// SPDX-License-Identifier: MPL-2.0

//! Capture backends
//!
//! - [`camera`]: device traits, shared frame/metadata types and the
//!   GStreamer hardware backend
//! - [`virtual_camera`]: in-memory device driven from code or image files

pub mod camera;
pub mod virtual_camera;
