// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for barcode scanning
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning from the default camera until stopped
//! - Decoding codes from image files
//! - Printing the effective configuration

use barcode_capture::backends::camera::gst::{GstDeviceProvider, enumerate_cameras};
use barcode_capture::backends::camera::types::{FrameRegion, FrameSize};
use barcode_capture::backends::virtual_camera::file_source::load_image_as_frame;
use barcode_capture::overlay::{PreviewLayer, PreviewSurface, Rect, scan_rect};
use barcode_capture::publisher::BarcodeEvent;
use barcode_capture::recognition::pixel_buffer::decode_in_order;
use barcode_capture::recognition::{
    FeedbackSink, PixelBufferRecognizer, SilentFeedback, TerminalBell,
};
use barcode_capture::session::{CaptureSession, DeliveryMode, OutputConfiguration};
use barcode_capture::Config;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How long to wait for an event before re-checking stop conditions
const EVENT_POLL: Duration = Duration::from_millis(200);

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize GStreamer
    gstreamer::init()?;

    let cameras = enumerate_cameras().unwrap_or_default();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        if let Some(path) = camera.path.as_deref() {
            println!("      Path: {}", path);
        }
        if let Some(api) = camera.api.as_deref() {
            println!("      API: {}", api);
        }
        println!();
    }

    Ok(())
}

/// Scan from the default camera until Ctrl+C, a code count or a timeout
pub fn scan(
    mut config: Config,
    strategy: Option<DeliveryMode>,
    count: Option<usize>,
    timeout: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_scan(config, count, timeout.map(Duration::from_secs)))
}

async fn run_scan(
    config: Config,
    count: Option<usize>,
    timeout: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = OutputConfiguration::from_config(&config);
    let format = output.format().clone();

    let feedback: Arc<dyn FeedbackSink> = if config.feedback_enabled {
        Arc::new(TerminalBell)
    } else {
        Arc::new(SilentFeedback)
    };
    let provider = Arc::new(GstDeviceProvider::new(config.preferred_device.clone()));

    let mut session = CaptureSession::new(output, provider).with_feedback(feedback);

    // No on-screen preview: treat the frame itself as the hosting view
    let surface = PreviewSurface::new(Rect::sized(format.width as f64, format.height as f64));
    session.configure_capture_device(surface)?;

    println!("Strategy: {}", config.strategy);
    println!("Capture format: {}x{}", format.width, format.height);
    match session.region_of_interest() {
        Some(region) => println!(
            "Scan region: x={:.3} y={:.3} w={:.3} h={:.3}",
            region.x, region.y, region.width, region.height
        ),
        None => println!("Scan region: full frame"),
    }

    let mut events = session.subscribe();
    session.start_running_session()?;

    println!();
    println!("Scanning... (press Ctrl+C to stop)");

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    let mut scanned = 0;

    loop {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping...");
            break;
        }
        if timeout.is_some_and(|limit| start.elapsed() >= limit) {
            println!();
            println!("Timeout reached");
            break;
        }

        match tokio::time::timeout(EVENT_POLL, events.recv()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(BarcodeEvent::Recognized(code))) => {
                scanned += 1;
                println!(
                    "[{}] {}: {}",
                    code.recognized_at.format("%H:%M:%S"),
                    code.symbology,
                    code.payload
                );
                if count.is_some_and(|n| scanned >= n) {
                    break;
                }
            }
            Ok(Some(BarcodeEvent::Failed(e))) => {
                teardown(session).await;
                return Err(e.into());
            }
        }
    }

    teardown(session).await;
    println!("Scanned {} code(s)", scanned);

    Ok(())
}

/// Stop the device off the runtime workers; stopping joins its bus thread
async fn teardown(session: CaptureSession) {
    if let Err(e) = tokio::task::spawn_blocking(move || session.teardown()).await {
        eprintln!("Teardown failed: {}", e);
    }
}

/// Decode codes from image files with the pixel-buffer recognizer
pub fn decode_images(
    config: &Config,
    input: &[PathBuf],
    roi: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let paths = collect_image_paths(input)?;
    if paths.is_empty() {
        return Err("No image files found".into());
    }

    println!("Decoding {} image(s)", paths.len());

    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        let mut frame = load_image_as_frame(path)?;
        if roi {
            frame.region = overlay_region(FrameSize::new(frame.width, frame.height));
        }
        frames.push(Arc::new(frame));
    }

    let recognizer = PixelBufferRecognizer::with_max_dimension(config.max_decode_dimension);
    let runtime = tokio::runtime::Runtime::new()?;
    let results: Vec<_> = runtime.block_on(
        decode_in_order(futures::stream::iter(frames), config.decode_concurrency, |frame| {
            recognizer.recognize(frame)
        })
        .collect(),
    );

    println!();
    let mut decoded = 0;
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(Some(code)) => {
                decoded += 1;
                println!("  {}: {} {}", path.display(), code.symbology, code.payload);
            }
            Ok(None) => println!("  {}: no code found", path.display()),
            Err(e) => println!("  {}: {}", path.display(), e),
        }
    }

    println!();
    println!("Decoded {} of {} image(s)", decoded, paths.len());

    Ok(())
}

/// Print the effective configuration as JSON
pub fn print_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = Config::default_path() {
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Scan rectangle of an image shown 1:1, in normalized coordinates
fn overlay_region(size: FrameSize) -> Option<FrameRegion> {
    let frame = Rect::sized(size.width as f64, size.height as f64);
    let mut layer = PreviewLayer::new(PreviewSurface::new(frame));
    layer.set_capture_size(Some(size));

    let region = layer.normalized_rect(&scan_rect(frame));
    (!region.is_degenerate()).then_some(region)
}

/// Collect all image paths from input (files or directories)
fn collect_image_paths(input: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();

    for path in input {
        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let file_path = entry?.path();
                if is_supported_image(&file_path) {
                    paths.push(file_path);
                }
            }
        } else if is_supported_image(path) {
            paths.push(path.clone());
        }
    }

    // Sort by filename for consistent ordering
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(paths)
}

/// Check if a path is a supported image file
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "png" | "jpg" | "jpeg" | "bmp" | "webp")
        })
        .unwrap_or(false)
}
