// SPDX-License-Identifier: GPL-3.0-only

//! Barcode event publisher
//!
//! Multicasts recognition results to any number of subscribers. Each
//! subscriber has its own unbounded queue so a slow consumer never makes
//! another one lag or drop events. Subscribers only see events emitted after
//! they subscribed.
//!
//! The stream never completes on its own: [`BarcodePublisher::finish`]
//! completes it for everyone, [`BarcodePublisher::fail`] delivers one
//! terminal failure first.

use crate::errors::ScanError;
use crate::recognition::RecognizedCode;
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

/// Unit delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum BarcodeEvent {
    Recognized(RecognizedCode),
    /// Terminal; no further events follow
    Failed(ScanError),
}

#[derive(Default)]
struct PublisherState {
    subscribers: Vec<(u64, UnboundedSender<BarcodeEvent>)>,
    next_id: u64,
    terminated: bool,
}

/// Cloneable handle to one event stream
#[derive(Clone, Default)]
pub struct BarcodePublisher {
    inner: Arc<Mutex<PublisherState>>,
}

impl BarcodePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PublisherState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber
    ///
    /// Subscribing to a terminated publisher gives an already-completed
    /// subscription.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();

        let id = state.next_id;
        state.next_id += 1;

        if !state.terminated {
            state.subscribers.push((id, tx));
            debug!(id, subscribers = state.subscribers.len(), "Subscriber added");
        }

        Subscription {
            id,
            rx,
            publisher: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every current subscriber
    ///
    /// Ignored once the publisher has terminated. Subscribers whose receiving
    /// side is gone are pruned.
    pub fn emit(&self, event: BarcodeEvent) {
        let mut state = self.state();
        if state.terminated {
            trace!("Emit after termination ignored");
            return;
        }
        state.subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        trace!(subscribers = state.subscribers.len(), "Event emitted");
    }

    pub fn emit_code(&self, code: RecognizedCode) {
        self.emit(BarcodeEvent::Recognized(code));
    }

    /// Deliver a terminal failure and complete the stream
    pub fn fail(&self, error: ScanError) {
        self.emit(BarcodeEvent::Failed(error));
        self.finish();
    }

    /// Complete the stream for every subscriber
    pub fn finish(&self) {
        let mut state = self.state();
        if !state.terminated {
            debug!(subscribers = state.subscribers.len(), "Completing event stream");
        }
        state.terminated = true;
        state.subscribers.clear();
    }

    pub fn is_terminated(&self) -> bool {
        self.state().terminated
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    fn remove(inner: &Mutex<PublisherState>, id: u64) {
        let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }
}

/// One subscriber's view of the event stream
///
/// Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: UnboundedReceiver<BarcodeEvent>,
    publisher: Weak<Mutex<PublisherState>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, `None` once the stream has completed
    pub async fn recv(&mut self) -> Option<BarcodeEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<BarcodeEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.publisher.upgrade() {
            BarcodePublisher::remove(&inner, self.id);
            trace!(id = self.id, "Subscriber removed");
        }
    }
}

impl Stream for Subscription {
    type Item = BarcodeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::Symbology;

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let publisher = BarcodePublisher::new();
        publisher.emit_code(RecognizedCode::new("early", Symbology::Ean8));

        let mut late = publisher.subscribe();
        assert_eq!(late.try_recv(), None);

        publisher.emit_code(RecognizedCode::new("late", Symbology::Ean8));
        match late.try_recv() {
            Some(BarcodeEvent::Recognized(code)) => assert_eq!(code.payload, "late"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_drop_prunes_subscriber() {
        let publisher = BarcodePublisher::new();
        let sub = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);
        drop(sub);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_after_finish_is_completed() {
        let publisher = BarcodePublisher::new();
        publisher.finish();
        let mut sub = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 0);
        assert!(matches!(
            sub.rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
