// SPDX-License-Identifier: GPL-3.0-only

//! Acknowledgment fired when a code is accepted

use std::io::Write;

/// Fire-and-forget user feedback (vibration, sound) for an accepted code
///
/// Called on the delivery queue right before the code is emitted, once per
/// accepted code. Implementations must return quickly.
pub trait FeedbackSink: Send + Sync {
    fn acknowledge(&self);
}

impl<F> FeedbackSink for F
where
    F: Fn() + Send + Sync,
{
    fn acknowledge(&self) {
        self()
    }
}

/// No feedback
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentFeedback;

impl FeedbackSink for SilentFeedback {
    fn acknowledge(&self) {}
}

/// Rings the terminal bell on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl FeedbackSink for TerminalBell {
    fn acknowledge(&self) {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}
