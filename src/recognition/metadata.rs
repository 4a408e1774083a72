// SPDX-License-Identifier: GPL-3.0-only

//! Hardware-metadata recognition
//!
//! The capture hardware has already decoded the symbols; this adapter only
//! picks the one to honour. When several codes are visible the first object
//! in delivery order wins. Position and size are not considered.

use super::RecognizedCode;
use super::feedback::FeedbackSink;
use crate::backends::camera::types::{MetadataKind, MetadataObject};
use std::sync::Arc;
use tracing::{debug, trace};

/// Turns metadata batches into recognized codes
#[derive(Clone)]
pub struct MetadataRecognizer {
    feedback: Arc<dyn FeedbackSink>,
}

impl MetadataRecognizer {
    pub fn new(feedback: Arc<dyn FeedbackSink>) -> Self {
        Self { feedback }
    }

    /// Recognize the first object of a batch
    ///
    /// Returns `None` for an empty batch, a first object that is not a
    /// machine-readable code, or one without a payload. Feedback fires only
    /// when a code is returned.
    pub fn recognize(&self, objects: &[MetadataObject]) -> Option<RecognizedCode> {
        let first = objects.first()?;

        if first.kind != MetadataKind::MachineReadableCode {
            trace!(kind = ?first.kind, "First metadata object is not a code");
            return None;
        }

        let Some(payload) = first.string_value.as_deref().filter(|s| !s.is_empty()) else {
            trace!("Code without payload");
            return None;
        };
        let symbology = first.symbology?;

        if objects.len() > 1 {
            debug!(count = objects.len(), "Several codes visible, taking the first");
        }

        self.feedback.acknowledge();
        Some(RecognizedCode::new(payload, symbology))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::Symbology;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (MetadataRecognizer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let recognizer = MetadataRecognizer::new(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (recognizer, count)
    }

    #[test]
    fn test_empty_batch() {
        let (recognizer, feedback) = counting();
        assert_eq!(recognizer.recognize(&[]), None);
        assert_eq!(feedback.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_object_wins() {
        let (recognizer, feedback) = counting();
        let code = recognizer
            .recognize(&[
                MetadataObject::code(Symbology::Ean13, "012345678905"),
                MetadataObject::code(Symbology::Ean8, "96385074"),
            ])
            .unwrap();

        assert_eq!(code.payload, "012345678905");
        assert_eq!(code.symbology, Symbology::Ean13);
        assert_eq!(feedback.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_code_first_object_is_discarded() {
        let (recognizer, feedback) = counting();
        let result = recognizer.recognize(&[
            MetadataObject::other(),
            MetadataObject::code(Symbology::Ean8, "96385074"),
        ]);
        assert_eq!(result, None);
        assert_eq!(feedback.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_and_absent_payloads() {
        let (recognizer, feedback) = counting();
        assert_eq!(
            recognizer.recognize(&[MetadataObject::code(Symbology::Pdf417, "")]),
            None
        );

        let mut absent = MetadataObject::code(Symbology::Pdf417, "x");
        absent.string_value = None;
        assert_eq!(recognizer.recognize(&[absent]), None);

        assert_eq!(feedback.load(Ordering::SeqCst), 0);
    }
}
