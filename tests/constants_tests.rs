// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use barcode_capture::constants::{self, CapturePreset, overlay};
use barcode_capture::Symbology;

#[test]
fn test_capture_preset_values() {
    // Test that all presets exist (VGA, HD, Full HD)
    assert_eq!(CapturePreset::ALL.len(), 3);
}

#[test]
fn test_capture_preset_ordering() {
    // Test that presets are ordered from lowest to highest resolution
    let mut prev_pixels = 0u32;
    for preset in CapturePreset::ALL {
        let (width, height) = preset.dimensions();
        assert!(
            width * height > prev_pixels,
            "Presets should be ordered from lowest to highest"
        );
        prev_pixels = width * height;
    }
}

#[test]
fn test_capture_preset_display_names() {
    // Test that all presets have non-empty display names
    for preset in CapturePreset::ALL {
        let name = preset.display_name();
        assert!(
            !name.is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
    }
}

#[test]
fn test_default_symbologies() {
    assert_eq!(
        constants::DEFAULT_SYMBOLOGIES,
        [Symbology::Ean8, Symbology::Ean13, Symbology::Pdf417]
    );
}

#[test]
fn test_overlay_geometry() {
    assert_eq!(overlay::MARGIN_FRACTION, 0.068);
    assert_eq!(overlay::WIDTH_FRACTION, 0.85);
    assert_eq!(overlay::HEIGHT_FRACTION, 0.5);
    assert_eq!(overlay::VERTICAL_OFFSET, 48.0);
}
