//! Speech collaborators
//!
//! This module provides:
//! - The speech synthesis interface and the shared synthesizer slot
//! - Named speed tiers for text-to-speech
//! - A paced, silent synthesizer backend
//! - Text recognition and speech-to-text input interfaces

pub mod paced;
pub mod recognition;
pub mod synthesizer;
pub mod tier;

// Re-export commonly used types
pub use paced::PacedSynthesizer;
pub use recognition::{
    recognize_text, ImageData, InputOrigin, RecognitionError, SourceText, TextRecognizer,
    TranscriptCollector, TranscriptEvent,
};
pub use synthesizer::{
    resolve_voice, SharedSynthesizer, SpeechRequest, SpeechSynthesizer, SynthesisEvent,
    SynthesisEventKind, Voice,
};
pub use tier::SpeedTier;
