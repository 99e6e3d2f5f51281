//! Input collaborators: text recognition (OCR) and speech-to-text
//!
//! Both are external services. This module fixes their interfaces and the
//! rules for turning their output into a source text:
//! - recognition is a single attempt with no retry
//! - dictation uses the final transcript, or the last partial one if the
//!   user stopped before a final result arrived

use crate::{ReaderError, Result};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures reported by the text recognition service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Text recognition failed: {0}")]
    TextRecognitionFailed(String),

    #[error("Image processing failed: {0}")]
    ImageProcessingFailed(String),

    #[error("No text found in image")]
    NoTextFound,

    #[error("Invalid image")]
    InvalidImage,
}

impl From<RecognitionError> for ReaderError {
    fn from(e: RecognitionError) -> Self {
        ReaderError::RecognitionError(e.to_string())
    }
}

/// Encoded image handed to the recognizer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub data: Vec<u8>,
    pub format: String,
}

impl ImageData {
    pub fn new(data: Vec<u8>, format: impl Into<String>) -> Self {
        Self {
            data,
            format: format.into(),
        }
    }
}

/// Where a source text came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputOrigin {
    Typed,
    Scanned,
    Dictated,
}

/// Validated text ready to be read
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceText {
    pub text: String,
    pub origin: InputOrigin,
}

impl SourceText {
    /// Trim `text`, refusing input with no words
    pub fn new(text: impl AsRef<str>, origin: InputOrigin) -> Result<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(ReaderError::EmptyInput);
        }
        Ok(Self {
            text: text.to_string(),
            origin,
        })
    }

    pub fn typed(text: impl AsRef<str>) -> Result<Self> {
        Self::new(text, InputOrigin::Typed)
    }
}

/// Text recognition service
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &ImageData) -> std::result::Result<String, RecognitionError>;
}

/// Run one recognition attempt off the host loop
pub async fn recognize_text(
    recognizer: Arc<dyn TextRecognizer>,
    image: ImageData,
) -> Result<SourceText> {
    if image.data.is_empty() {
        return Err(RecognitionError::InvalidImage.into());
    }

    let text = tokio::task::spawn_blocking(move || recognizer.recognize(&image))
        .await
        .map_err(|e| ReaderError::RecognitionError(format!("Recognizer task failed: {}", e)))??;

    debug!("Recognized {} characters", text.len());
    SourceText::new(&text, InputOrigin::Scanned).map_err(|_| RecognitionError::NoTextFound.into())
}

/// Update from the speech-to-text service
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptEvent {
    Partial(String),
    Final(String),
    Failed(String),
}

/// Accumulates a dictation stream into a source text
#[derive(Debug, Default)]
pub struct TranscriptCollector {
    latest: Option<String>,
    final_text: Option<String>,
    error: Option<String>,
}

impl TranscriptCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns true once no more events are expected.
    pub fn push(&mut self, event: TranscriptEvent) -> bool {
        match event {
            TranscriptEvent::Partial(text) => {
                if self.final_text.is_none() {
                    self.latest = Some(text);
                }
                false
            }
            TranscriptEvent::Final(text) => {
                self.final_text = Some(text);
                true
            }
            TranscriptEvent::Failed(reason) => {
                warn!("Dictation failed: {}", reason);
                self.error = Some(reason);
                true
            }
        }
    }

    /// Latest text, for live display while dictating
    pub fn current(&self) -> Option<&str> {
        self.final_text.as_deref().or(self.latest.as_deref())
    }

    /// Consume events until a final result, a failure, or the stream closes
    pub fn drain(&mut self, events: &Receiver<TranscriptEvent>) {
        for event in events.iter() {
            if self.push(event) {
                break;
            }
        }
    }

    /// Produce the dictated text: the final transcript, else the last partial
    pub fn finish(self) -> Result<SourceText> {
        if let Some(reason) = self.error {
            return Err(ReaderError::TranscriptionError(reason));
        }
        let text = self.final_text.or(self.latest).unwrap_or_default();
        SourceText::new(text, InputOrigin::Dictated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    struct FixedRecognizer(std::result::Result<String, RecognitionError>);

    impl TextRecognizer for FixedRecognizer {
        fn recognize(&self, _image: &ImageData) -> std::result::Result<String, RecognitionError> {
            self.0.clone()
        }
    }

    fn image() -> ImageData {
        ImageData::new(vec![0x89, 0x50, 0x4e, 0x47], "png")
    }

    #[test]
    fn test_source_text_trims_and_validates() {
        let source = SourceText::typed("  hello world \n").unwrap();
        assert_eq!(source.text, "hello world");
        assert_eq!(source.origin, InputOrigin::Typed);
        assert_eq!(SourceText::typed(" \n ").unwrap_err(), ReaderError::EmptyInput);
    }

    #[tokio::test]
    async fn test_recognize_text_success() {
        let recognizer = Arc::new(FixedRecognizer(Ok("Chapter one\n".into())));
        let source = recognize_text(recognizer, image()).await.unwrap();
        assert_eq!(source.text, "Chapter one");
        assert_eq!(source.origin, InputOrigin::Scanned);
    }

    #[tokio::test]
    async fn test_recognize_blank_output_is_no_text() {
        let recognizer = Arc::new(FixedRecognizer(Ok("   ".into())));
        let err = recognize_text(recognizer, image()).await.unwrap_err();
        assert_eq!(err, ReaderError::from(RecognitionError::NoTextFound));
    }

    #[tokio::test]
    async fn test_recognize_failure_is_surfaced() {
        let recognizer = Arc::new(FixedRecognizer(Err(RecognitionError::TextRecognitionFailed(
            "blurry".into(),
        ))));
        let err = recognize_text(recognizer, image()).await.unwrap_err();
        assert!(matches!(err, ReaderError::RecognitionError(ref m) if m.contains("blurry")));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_recognize_rejects_empty_image() {
        let recognizer = Arc::new(FixedRecognizer(Ok("unused".into())));
        let err = recognize_text(recognizer, ImageData::new(Vec::new(), "png"))
            .await
            .unwrap_err();
        assert_eq!(err, ReaderError::from(RecognitionError::InvalidImage));
    }

    #[test]
    fn test_final_transcript_wins() {
        let mut collector = TranscriptCollector::new();
        assert!(!collector.push(TranscriptEvent::Partial("hello".into())));
        assert!(collector.push(TranscriptEvent::Final("hello world".into())));
        assert_eq!(collector.finish().unwrap().text, "hello world");
    }

    #[test]
    fn test_last_partial_used_when_stopped_early() {
        let (tx, rx) = unbounded();
        tx.send(TranscriptEvent::Partial("read".into())).unwrap();
        tx.send(TranscriptEvent::Partial("read this".into())).unwrap();
        drop(tx);

        let mut collector = TranscriptCollector::new();
        collector.drain(&rx);
        assert_eq!(collector.current(), Some("read this"));

        let source = collector.finish().unwrap();
        assert_eq!(source.text, "read this");
        assert_eq!(source.origin, InputOrigin::Dictated);
    }

    #[test]
    fn test_failed_dictation() {
        let mut collector = TranscriptCollector::new();
        collector.push(TranscriptEvent::Partial("some".into()));
        collector.push(TranscriptEvent::Failed("microphone lost".into()));
        assert!(matches!(
            collector.finish(),
            Err(ReaderError::TranscriptionError(_))
        ));
    }

    #[test]
    fn test_silent_dictation_is_empty_input() {
        let collector = TranscriptCollector::new();
        assert_eq!(collector.finish().unwrap_err(), ReaderError::EmptyInput);
    }
}
