//! Reading engines
//!
//! This module provides:
//! - Speed reading (one word at a time)
//! - Auto-scroll reading
//! - Text-to-speech reading with highlighting
//! - Tokenizing and display helpers shared by the engines

pub mod scroll;
pub mod speech;
pub mod speed;
pub mod text;

// Re-export commonly used types
pub use scroll::{ScrollEngine, MAX_SCROLL_SPEED, MIN_SCROLL_SPEED};
pub use speech::{SpeechPlaybackEngine, MAX_SPEECH_RATE, MIN_SPEECH_RATE};
pub use speed::{SpeedReadEngine, MAX_WPM, MIN_WPM};
pub use text::{tokenize, word_count, word_ranges, DisplayWord};

/// Clamp `rate` into `min..=max`. NaN has no place in the range and yields
/// `None`; infinities clamp to the nearest bound.
pub(crate) fn clamp_rate(rate: f64, min: f64, max: f64) -> Option<f64> {
    if rate.is_nan() {
        return None;
    }
    Some(rate.clamp(min, max))
}
