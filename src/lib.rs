pub mod integration;
pub mod playback;
pub mod reading;
pub mod records;
pub mod settings;
pub mod speech;

use thiserror::Error;

pub use playback::{PlaybackController, PlaybackEvent, PlaybackState, ReadingMode};
pub use reading::{ScrollEngine, SpeechPlaybackEngine, SpeedReadEngine};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReaderError {
    #[error("No readable words in the source text")]
    EmptyInput,

    #[error("Speech synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("Speech synthesis error: {0}")]
    SynthesisError(String),

    #[error("Text recognition error: {0}")]
    RecognitionError(String),

    #[error("Transcription error: {0}")]
    TranscriptionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for ReaderError {
    fn from(e: std::io::Error) -> Self {
        ReaderError::IOError(e.to_string())
    }
}

impl ReaderError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The caller has to supply different text
            ReaderError::EmptyInput => true,
            // No voices installed; retrying will not help
            ReaderError::SynthesisUnavailable(_) => false,
            // These are typically transient errors
            ReaderError::SynthesisError(_) => true,
            ReaderError::RecognitionError(_) => true,
            ReaderError::TranscriptionError(_) => true,
            ReaderError::ConfigError(_) => false,
            ReaderError::IOError(_) => false,
            ReaderError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ReaderError::EmptyInput => {
                "There is no text to read. Please enter some text first.".to_string()
            }
            ReaderError::SynthesisUnavailable(_) => {
                "Text-to-speech is not available on this device.".to_string()
            }
            ReaderError::SynthesisError(_) => {
                "Unable to start text-to-speech. Please try again.".to_string()
            }
            ReaderError::RecognitionError(_) => {
                "Unable to recognize text in the image. Please try again with a clearer image."
                    .to_string()
            }
            ReaderError::TranscriptionError(_) => {
                "Unable to recognize speech. Please try again.".to_string()
            }
            ReaderError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            ReaderError::IOError(_) => "File system error occurred.".to_string(),
            ReaderError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;
