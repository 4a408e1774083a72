// SPDX-License-Identifier: GPL-3.0-only

//! Output attached to a capture session
//!
//! Decides what the capture hardware decodes and how results reach the
//! application. Fixed once the session is configured.

use crate::backends::camera::types::Symbology;
use crate::config::{Config, FormatSettings};
use crate::constants::{self, decode};
use serde::{Deserialize, Serialize};

/// How capture output reaches the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Raw frames, decoded in software
    SampleBuffer,
    /// Symbols decoded by the capture hardware
    #[default]
    Metadata,
}

impl DeliveryMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SampleBuffer => "sample-buffer",
            Self::Metadata => "metadata",
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Context events are emitted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryQueue {
    /// The session's serial dispatcher task
    Main,
    /// The concurrent decode pipeline; consumers marshal onto their own context
    Background,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfiguration {
    mode: DeliveryMode,
    symbologies: Vec<Symbology>,
    format: FormatSettings,
    max_dimension: u32,
    decode_concurrency: usize,
    restrict_to_region: bool,
}

impl OutputConfiguration {
    /// Hardware-decoded metadata output accepting the default symbologies
    pub fn metadata() -> Self {
        Self::with_mode(DeliveryMode::Metadata)
    }

    /// Raw frame output for software decoding
    pub fn sample_buffer() -> Self {
        Self::with_mode(DeliveryMode::SampleBuffer)
    }

    fn with_mode(mode: DeliveryMode) -> Self {
        Self {
            mode,
            symbologies: constants::DEFAULT_SYMBOLOGIES.to_vec(),
            format: FormatSettings::default(),
            max_dimension: decode::MAX_DIMENSION,
            decode_concurrency: decode::CONCURRENCY,
            restrict_to_region: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_mode(config.strategy)
            .with_symbologies(config.symbologies.clone())
            .with_format(config.format())
            .with_max_dimension(config.max_decode_dimension)
            .with_decode_concurrency(config.decode_concurrency)
            .restrict_to_region(config.restrict_to_overlay)
    }

    pub fn with_symbologies(mut self, symbologies: Vec<Symbology>) -> Self {
        self.symbologies = symbologies;
        self
    }

    pub fn with_format(mut self, format: FormatSettings) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    pub fn with_decode_concurrency(mut self, concurrency: usize) -> Self {
        self.decode_concurrency = concurrency.max(1);
        self
    }

    /// Whether detection is restricted to the overlay rectangle
    pub fn restrict_to_region(mut self, restrict: bool) -> Self {
        self.restrict_to_region = restrict;
        self
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Symbologies the hardware is asked to decode
    pub fn symbologies(&self) -> &[Symbology] {
        &self.symbologies
    }

    pub fn accepts(&self, symbology: Symbology) -> bool {
        self.symbologies.contains(&symbology)
    }

    pub fn format(&self) -> &FormatSettings {
        &self.format
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn decode_concurrency(&self) -> usize {
        self.decode_concurrency
    }

    pub fn restricts_to_region(&self) -> bool {
        self.restrict_to_region
    }

    /// Derived from the mode so the two cannot disagree
    pub fn delivery_queue(&self) -> DeliveryQueue {
        match self.mode {
            DeliveryMode::Metadata => DeliveryQueue::Main,
            DeliveryMode::SampleBuffer => DeliveryQueue::Background,
        }
    }
}

impl Default for OutputConfiguration {
    fn default() -> Self {
        Self::metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults() {
        let output = OutputConfiguration::metadata();
        assert_eq!(
            output.symbologies(),
            &[Symbology::Ean8, Symbology::Ean13, Symbology::Pdf417]
        );
        assert_eq!(output.delivery_queue(), DeliveryQueue::Main);
        assert!(output.restricts_to_region());
        assert!(!output.accepts(Symbology::QrCode));
    }

    #[test]
    fn test_sample_buffer_runs_in_background() {
        let output = OutputConfiguration::sample_buffer().with_decode_concurrency(0);
        assert_eq!(output.delivery_queue(), DeliveryQueue::Background);
        assert_eq!(output.decode_concurrency(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            strategy: DeliveryMode::SampleBuffer,
            max_decode_dimension: 480,
            restrict_to_overlay: false,
            ..Config::default()
        };
        let output = OutputConfiguration::from_config(&config);
        assert_eq!(output.mode(), DeliveryMode::SampleBuffer);
        assert_eq!(output.max_dimension(), 480);
        assert!(!output.restricts_to_region());
        assert_eq!(output.format(), &config.format());
    }

    #[test]
    fn test_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&DeliveryMode::SampleBuffer).unwrap();
        assert_eq!(json, "\"sample-buffer\"");
    }
}
