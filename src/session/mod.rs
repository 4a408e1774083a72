// SPDX-License-Identifier: GPL-3.0-only

//! Capture session
//!
//! Owns the capture device, its single output and the preview layer, and
//! wires device callbacks through recognition into the session's event
//! publisher.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured ──configure──▶ Configured ──start──▶ Running
//!                                                   │    ▲
//!                                                 stop  start
//!                                                   ▼    │
//!                                                  Stopped
//!            (any state) ──teardown / drop──▶ TornDown
//! ```
//!
//! A failed configuration leaves the session `Unconfigured` and inert: it
//! refuses to start and its publisher never emits.
//!
//! Each session has its own publisher and callback gate, so output from one
//! session never reaches subscribers of another.

mod dispatch;
pub mod output;

pub use output::{DeliveryMode, DeliveryQueue, OutputConfiguration};

use crate::backends::camera::types::{CaptureOutput, CaptureSink, RegionOfInterest};
use crate::backends::camera::{CaptureDevice, DeviceProvider};
use crate::constants::decode;
use crate::errors::{CaptureError, CaptureResult};
use crate::overlay::{self, OverlayOutline, PreviewLayer, PreviewSurface, Rect};
use crate::publisher::{BarcodePublisher, Subscription};
use crate::recognition::{FeedbackSink, Recognizer, SilentFeedback};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconfigured,
    Configured,
    Running,
    Stopped,
    TornDown,
}

/// Sending half of a run's channel
pub(crate) enum RunSender {
    /// Every metadata batch is kept
    Metadata(UnboundedSender<CaptureOutput>),
    /// Frames arriving while the queue is full are dropped
    Frames(Sender<CaptureOutput>),
}

/// Receiving half of a run's channel
pub(crate) enum RunReceiver {
    Metadata(UnboundedReceiver<CaptureOutput>),
    Frames(Receiver<CaptureOutput>),
}

impl RunReceiver {
    pub(crate) async fn recv(&mut self) -> Option<CaptureOutput> {
        match self {
            Self::Metadata(rx) => rx.recv().await,
            Self::Frames(rx) => rx.recv().await,
        }
    }
}

/// Channel for one run of `mode`
fn run_channel(mode: DeliveryMode) -> (RunSender, RunReceiver) {
    match mode {
        DeliveryMode::Metadata => {
            let (tx, rx) = mpsc::unbounded_channel();
            (RunSender::Metadata(tx), RunReceiver::Metadata(rx))
        }
        DeliveryMode::SampleBuffer => {
            let (tx, rx) = mpsc::channel(decode::QUEUE_DEPTH);
            (RunSender::Frames(tx), RunReceiver::Frames(rx))
        }
    }
}

/// Gate between device callbacks and the current run's dispatcher
///
/// Every start opens a new run with a fresh channel; stop closes it. Output
/// delivered while no run is open is dropped, and dispatchers check their
/// run is still current before emitting.
#[derive(Default)]
pub(crate) struct RunGate {
    run: AtomicU64,
    channel: Mutex<Option<RunSender>>,
}

impl RunGate {
    fn open(&self, tx: RunSender) -> u64 {
        let mut channel = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        let run = self.run.fetch_add(1, Ordering::SeqCst) + 1;
        *channel = Some(tx);
        run
    }

    fn close(&self) {
        let mut channel = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        *channel = None;
        self.run.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn is_current(&self, run: u64) -> bool {
        self.run.load(Ordering::SeqCst) == run
    }

    fn deliver(&self, output: CaptureOutput) {
        let channel = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        match channel.as_ref() {
            Some(RunSender::Metadata(tx)) => {
                if tx.send(output).is_err() {
                    trace!("Dispatcher gone, dropping capture output");
                }
            }
            Some(RunSender::Frames(tx)) => match tx.try_send(output) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => trace!("Decode queue full, dropping frame"),
                Err(TrySendError::Closed(_)) => trace!("Dispatcher gone, dropping capture output"),
            },
            None => trace!("Session not running, dropping capture output"),
        }
    }
}

pub struct CaptureSession {
    id: Uuid,
    state: SessionState,
    output: OutputConfiguration,
    provider: Arc<dyn DeviceProvider>,
    device: Option<Box<dyn CaptureDevice>>,
    preview: Option<PreviewLayer>,
    region: Option<RegionOfInterest>,
    recognizer: Recognizer,
    publisher: BarcodePublisher,
    gate: Arc<RunGate>,
    dispatcher: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Create an unconfigured session
    pub fn new(output: OutputConfiguration, provider: Arc<dyn DeviceProvider>) -> Self {
        let recognizer = Recognizer::for_output(&output, Arc::new(SilentFeedback));
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Unconfigured,
            output,
            provider,
            device: None,
            preview: None,
            region: None,
            recognizer,
            publisher: BarcodePublisher::new(),
            gate: Arc::new(RunGate::default()),
            dispatcher: None,
        }
    }

    /// Acknowledge accepted codes through `feedback`
    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackSink>) -> Self {
        self.recognizer = Recognizer::for_output(&self.output, feedback);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn output(&self) -> &OutputConfiguration {
        &self.output
    }

    /// Region of interest currently applied to the device, `None` for the
    /// full frame
    pub fn region_of_interest(&self) -> Option<RegionOfInterest> {
        self.region
    }

    /// Guidance outline for the current preview frame
    pub fn overlay_outline(&self) -> Option<OverlayOutline> {
        self.preview
            .as_ref()
            .map(|preview| OverlayOutline::for_frame(preview.frame()))
    }

    /// Subscribe to this session's barcode events
    pub fn subscribe(&self) -> Subscription {
        self.publisher.subscribe()
    }

    /// Acquire the default capture device, attach the output and the preview
    ///
    /// On failure the session stays unconfigured. Calling it again on a
    /// configured session does nothing.
    pub fn configure_capture_device(&mut self, surface: PreviewSurface) -> CaptureResult<()> {
        match self.state {
            SessionState::Unconfigured => {}
            SessionState::TornDown => return Err(CaptureError::TornDown),
            state => {
                warn!(session = %self.id, ?state, "Session already configured, ignoring");
                return Ok(());
            }
        }

        let Some(mut device) = self.provider.default_device() else {
            warn!(session = %self.id, "No video capture device available");
            return Err(CaptureError::DeviceUnavailable);
        };

        let gate = Arc::clone(&self.gate);
        let sink: CaptureSink = Arc::new(move |output| gate.deliver(output));

        if let Err(e) = device.open(&self.output, sink) {
            warn!(session = %self.id, device = %device.info().name, error = %e, "Failed to open capture input");
            return Err(e);
        }

        info!(
            session = %self.id,
            device = %device.info().name,
            mode = %self.output.mode(),
            symbologies = ?self.output.symbologies(),
            "Capture device configured"
        );

        self.device = Some(device);
        self.preview = Some(PreviewLayer::new(surface));
        self.state = SessionState::Configured;
        self.refresh_region();
        Ok(())
    }

    /// Begin capture
    ///
    /// Returns once the device has been asked to start; the first callback
    /// arrives later on the device's own thread. Must be called from within
    /// a tokio runtime, which hosts the dispatcher.
    ///
    /// If the previous run ended the event stream with a failure, this run
    /// publishes on a new stream: subscribe again after restarting.
    pub fn start_running_session(&mut self) -> CaptureResult<()> {
        match self.state {
            SessionState::Unconfigured => {
                warn!(session = %self.id, "Start requested before configuration");
                return Err(CaptureError::NotConfigured);
            }
            SessionState::TornDown => return Err(CaptureError::TornDown),
            SessionState::Running => {
                debug!(session = %self.id, "Session already running");
                return Ok(());
            }
            SessionState::Configured | SessionState::Stopped => {}
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|_| CaptureError::NoRuntime)?;
        let Some(device) = self.device.as_mut() else {
            return Err(CaptureError::NotConfigured);
        };

        if self.publisher.is_terminated() {
            // The failed stream stays complete for its subscribers; this run
            // publishes to new ones
            info!(session = %self.id, "Previous run failed, opening a new event stream");
            self.publisher = BarcodePublisher::new();
        }

        let (tx, rx) = run_channel(self.output.mode());
        let run = self.gate.open(tx);
        let dispatcher = dispatch::spawn(
            &handle,
            dispatch::Dispatch {
                recognizer: self.recognizer.clone(),
                rx,
                publisher: self.publisher.clone(),
                gate: Arc::clone(&self.gate),
                run,
                concurrency: self.output.decode_concurrency(),
            },
        );

        if let Err(e) = device.start() {
            warn!(session = %self.id, error = %e, "Failed to start capture");
            self.gate.close();
            dispatcher.abort();
            return Err(e);
        }

        self.dispatcher = Some(dispatcher);
        self.state = SessionState::Running;
        info!(
            session = %self.id,
            run,
            queue = ?self.output.delivery_queue(),
            "Capture session running"
        );
        Ok(())
    }

    /// Halt capture
    ///
    /// Output still queued for the stopped run is dropped. The session can
    /// be started again.
    pub fn stop_running_session(&mut self) {
        if self.state != SessionState::Running {
            debug!(session = %self.id, state = ?self.state, "Session not running");
            return;
        }

        self.gate.close();
        if let Some(device) = self.device.as_mut()
            && let Err(e) = device.stop()
        {
            warn!(session = %self.id, error = %e, "Failed to stop capture device");
        }

        // The dispatcher exits on its own once the closed channel drains
        self.dispatcher = None;
        self.state = SessionState::Stopped;
        info!(session = %self.id, "Capture session stopped");
    }

    /// Record a new frame for the hosting view and re-derive the region of
    /// interest
    pub fn update_layout(&mut self, frame: Rect) {
        let Some(preview) = self.preview.as_mut() else {
            trace!(session = %self.id, "Layout update before configuration ignored");
            return;
        };
        preview.set_frame(frame);
        self.refresh_region();
    }

    fn refresh_region(&mut self) {
        let (Some(device), Some(preview)) = (self.device.as_mut(), self.preview.as_mut()) else {
            return;
        };
        preview.set_capture_size(device.frame_size());

        let region = if self.output.restricts_to_region() {
            let region = preview.normalized_rect(&overlay::scan_rect(preview.frame()));
            if region.is_degenerate() {
                warn!(
                    session = %self.id,
                    frame = ?preview.frame(),
                    "Scan region is empty, detecting on the full frame"
                );
                None
            } else {
                Some(region)
            }
        } else {
            None
        };

        if region != self.region {
            debug!(session = %self.id, ?region, "Region of interest updated");
        }
        self.region = region;
        device.set_region_of_interest(region);
    }

    /// Stop capture and complete the event stream for all subscribers
    ///
    /// Stopping a hardware device joins its bus thread, which can block for
    /// a poll interval. From async code run this on the blocking pool
    /// (`tokio::task::spawn_blocking`); dropping the session does the same
    /// work.
    pub fn teardown(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.state == SessionState::TornDown {
            return;
        }
        self.stop_running_session();
        self.publisher.finish();
        self.device = None;
        self.state = SessionState::TornDown;
        info!(session = %self.id, "Capture session torn down");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{CameraFrame, MetadataObject, PixelFormat};

    #[test]
    fn test_gate_drops_output_while_closed() {
        let gate = RunGate::default();
        let (tx, mut rx) = run_channel(DeliveryMode::Metadata);

        gate.deliver(CaptureOutput::Metadata(Vec::new()));
        let run = gate.open(tx);
        assert!(gate.is_current(run));

        gate.deliver(CaptureOutput::Metadata(vec![MetadataObject::other()]));
        gate.close();
        assert!(!gate.is_current(run));
        gate.deliver(CaptureOutput::Metadata(Vec::new()));

        let RunReceiver::Metadata(rx) = &mut rx else {
            panic!("metadata run should use the unbounded channel");
        };
        assert!(matches!(rx.try_recv(), Ok(CaptureOutput::Metadata(objects)) if objects.len() == 1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_runs_are_distinct() {
        let gate = RunGate::default();
        let (tx, _rx) = run_channel(DeliveryMode::Metadata);
        let first = gate.open(tx);
        gate.close();
        let (tx, _rx) = run_channel(DeliveryMode::Metadata);
        let second = gate.open(tx);
        assert_ne!(first, second);
        assert!(!gate.is_current(first));
    }

    #[test]
    fn test_frames_beyond_queue_depth_are_dropped() {
        let gate = RunGate::default();
        let (tx, mut rx) = run_channel(DeliveryMode::SampleBuffer);
        gate.open(tx);

        for _ in 0..decode::QUEUE_DEPTH + 5 {
            gate.deliver(CaptureOutput::Frame(Arc::new(CameraFrame::new(
                2,
                2,
                PixelFormat::Gray8,
                vec![0; 4],
            ))));
        }

        let RunReceiver::Frames(rx) = &mut rx else {
            panic!("sample buffer run should use the bounded channel");
        };
        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, decode::QUEUE_DEPTH);
    }

    #[test]
    fn test_metadata_is_never_dropped() {
        let gate = RunGate::default();
        let (tx, mut rx) = run_channel(DeliveryMode::Metadata);
        gate.open(tx);

        for _ in 0..50 {
            gate.deliver(CaptureOutput::Metadata(vec![MetadataObject::other()]));
        }

        let RunReceiver::Metadata(rx) = &mut rx else {
            panic!("metadata run should use the unbounded channel");
        };
        assert_eq!(rx.len(), 50);
    }
}
