// SPDX-License-Identifier: GPL-3.0-only

//! Per-run dispatch of capture output
//!
//! Device callbacks only forward into a channel. A dispatcher task spawned
//! for each run drains it, runs recognition and emits on the publisher:
//!
//! - Metadata: one serial task, batches handled in arrival order
//! - Pixel buffer: up to `concurrency` frames decoded at once on the
//!   blocking pool, results emitted in frame order. Frames wait in a short
//!   bounded queue; the gate drops new ones while it is full.
//!
//! Every emission is preceded by a run check, so nothing produced for a run
//! that has since been stopped reaches subscribers.

use super::{RunGate, RunReceiver};
use crate::backends::camera::types::{CameraFrame, CaptureOutput};
use crate::constants::timing;
use crate::publisher::BarcodePublisher;
use crate::recognition::pixel_buffer::decode_in_order;
use crate::recognition::{MetadataRecognizer, PixelBufferRecognizer, Recognizer};
use futures::StreamExt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// Everything a dispatcher needs for one run
pub(super) struct Dispatch {
    pub recognizer: Recognizer,
    pub rx: RunReceiver,
    pub publisher: BarcodePublisher,
    pub gate: Arc<RunGate>,
    pub run: u64,
    pub concurrency: usize,
}

pub(super) fn spawn(handle: &Handle, dispatch: Dispatch) -> JoinHandle<()> {
    let Dispatch {
        recognizer,
        rx,
        publisher,
        gate,
        run,
        concurrency,
    } = dispatch;

    match recognizer {
        Recognizer::Metadata(recognizer) => {
            handle.spawn(dispatch_metadata(recognizer, rx, publisher, gate, run))
        }
        Recognizer::PixelBuffer(recognizer) => handle.spawn(dispatch_frames(
            recognizer,
            rx,
            publisher,
            gate,
            run,
            concurrency,
        )),
    }
}

async fn dispatch_metadata(
    recognizer: MetadataRecognizer,
    mut rx: RunReceiver,
    publisher: BarcodePublisher,
    gate: Arc<RunGate>,
    run: u64,
) {
    let mut batches: u64 = 0;

    while let Some(output) = rx.recv().await {
        if !gate.is_current(run) {
            trace!(run, "Run ended, dropping queued metadata");
            break;
        }

        let CaptureOutput::Metadata(objects) = output else {
            debug!("Frame delivered to metadata output, ignoring");
            continue;
        };

        batches += 1;
        if batches % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(run, batches, "Metadata dispatch");
        }

        if let Some(code) = recognizer.recognize(&objects) {
            debug!(payload = %code.payload, symbology = %code.symbology, "Code recognized");
            publisher.emit_code(code);
        }
    }

    debug!(run, batches, "Metadata dispatcher finished");
}

async fn dispatch_frames(
    recognizer: PixelBufferRecognizer,
    mut rx: RunReceiver,
    publisher: BarcodePublisher,
    gate: Arc<RunGate>,
    run: u64,
    concurrency: usize,
) {
    let frames = async_stream::stream! {
        while let Some(output) = rx.recv().await {
            match output {
                CaptureOutput::Frame(frame) => yield frame,
                CaptureOutput::Metadata(_) => debug!("Metadata delivered to frame output, ignoring"),
            }
        }
    };

    let results = decode_in_order(frames, concurrency, move |frame: Arc<CameraFrame>| {
        recognizer.recognize(frame)
    });
    let mut results = std::pin::pin!(results);
    let mut decoded: u64 = 0;

    while let Some(result) = results.next().await {
        if !gate.is_current(run) {
            trace!(run, "Run ended, dropping decode results");
            break;
        }

        decoded += 1;
        if decoded % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(run, decoded, "Frame dispatch");
        }

        match result {
            Ok(Some(code)) => {
                debug!(payload = %code.payload, "Code recognized");
                publisher.emit_code(code);
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Frame processing failed, ending stream");
                publisher.fail(e);
                break;
            }
        }
    }

    debug!(run, decoded, "Frame dispatcher finished");
}
