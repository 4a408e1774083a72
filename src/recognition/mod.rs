// SPDX-License-Identifier: GPL-3.0-only

//! Barcode recognition adapters
//!
//! Two interchangeable strategies turn capture output into recognized codes:
//!
//! - [`PixelBufferRecognizer`]: raw frames are decoded in software
//! - [`MetadataRecognizer`]: the capture hardware decodes, we pick the code
//!
//! The session selects one through [`Recognizer::for_output`] from the
//! delivery mode of its output configuration.

pub mod feedback;
pub mod metadata;
pub mod pixel_buffer;

pub use feedback::{FeedbackSink, SilentFeedback, TerminalBell};
pub use metadata::MetadataRecognizer;
pub use pixel_buffer::PixelBufferRecognizer;

use crate::backends::camera::types::Symbology;
use crate::session::{DeliveryMode, OutputConfiguration};
use chrono::{DateTime, Local};
use std::sync::Arc;

/// A decoded barcode
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedCode {
    /// Decoded payload, never empty
    pub payload: String,
    pub symbology: Symbology,
    pub recognized_at: DateTime<Local>,
}

impl RecognizedCode {
    pub fn new(payload: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            payload: payload.into(),
            symbology,
            recognized_at: Local::now(),
        }
    }
}

/// Recognition strategy bound to a session
#[derive(Clone)]
pub enum Recognizer {
    PixelBuffer(PixelBufferRecognizer),
    Metadata(MetadataRecognizer),
}

impl Recognizer {
    /// Pick the strategy matching the output's delivery mode
    pub fn for_output(output: &OutputConfiguration, feedback: Arc<dyn FeedbackSink>) -> Self {
        match output.mode() {
            DeliveryMode::SampleBuffer => {
                Self::PixelBuffer(PixelBufferRecognizer::with_max_dimension(output.max_dimension()))
            }
            DeliveryMode::Metadata => Self::Metadata(MetadataRecognizer::new(feedback)),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        match self {
            Self::PixelBuffer(_) => DeliveryMode::SampleBuffer,
            Self::Metadata(_) => DeliveryMode::Metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_follows_output_mode() {
        let feedback: Arc<dyn FeedbackSink> = Arc::new(SilentFeedback);

        let metadata = Recognizer::for_output(&OutputConfiguration::metadata(), feedback.clone());
        assert_eq!(metadata.mode(), DeliveryMode::Metadata);

        let output = OutputConfiguration::sample_buffer().with_max_dimension(320);
        match Recognizer::for_output(&output, feedback) {
            Recognizer::PixelBuffer(recognizer) => assert_eq!(recognizer.max_dimension(), 320),
            Recognizer::Metadata(_) => panic!("expected pixel buffer strategy"),
        }
    }
}
