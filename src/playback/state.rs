//! Playback state machine shared by every reading mode
//!
//! ```text
//! stopped --start--> playing
//! playing --play_pause--> paused
//! paused  --play_pause--> playing
//! playing --(reach end)--> stopped   [fires completion event]
//! any     --reset--> stopped
//! ```
//!
//! The UI reads state from the engine; it never infers state from what it
//! is currently displaying.

use crate::playback::events::PlaybackEvent;
use crate::Result;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Playback state of a reading engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Not playing; position is at the start of the session
    #[default]
    Stopped,
    /// Ticks are being delivered
    Playing,
    /// Ticks are suspended; position is retained
    Paused,
}

impl PlaybackState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, PlaybackState::Stopped)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused)
    }

    /// State reached by a play/pause toggle. `Stopped` has no toggle target.
    pub fn toggled(&self) -> Option<PlaybackState> {
        match self {
            PlaybackState::Stopped => None,
            PlaybackState::Playing => Some(PlaybackState::Paused),
            PlaybackState::Paused => Some(PlaybackState::Playing),
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}

/// The three ways a text can be consumed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadingMode {
    SpeedRead,
    Scroll,
    Speech,
}

impl std::fmt::Display for ReadingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadingMode::SpeedRead => write!(f, "Speed Read"),
            ReadingMode::Scroll => write!(f, "Scroll"),
            ReadingMode::Speech => write!(f, "Speech"),
        }
    }
}

/// Common contract of the reading engines.
///
/// Engines are synchronous and single-threaded: the host loop calls
/// [`poll`](PlaybackController::poll) once [`next_deadline`](PlaybackController::next_deadline)
/// has passed, and calls the user actions in between. Starting a session is
/// engine specific because each mode takes different inputs.
pub trait PlaybackController {
    fn mode(&self) -> ReadingMode;

    fn state(&self) -> PlaybackState;

    /// Toggle `Playing` and `Paused`. No-op from `Stopped`.
    fn play_pause(&mut self);

    /// Cancel the clock and return to `Stopped` at the start of the text.
    fn reset(&mut self) -> Result<()>;

    /// Set the engine rate, clamped to the engine range. Returns the stored value.
    fn set_rate(&mut self, rate: f64) -> f64;

    fn rate(&self) -> f64;

    /// Earliest instant at which `poll` has work to do, if any.
    fn next_deadline(&self) -> Option<Instant>;

    /// Deliver whatever is due at the current time.
    fn poll(&mut self);

    /// Subscribe to this engine's events, replacing any previous subscription.
    fn subscribe(&mut self) -> Receiver<PlaybackEvent>;

    /// End the session: cancel timers, release audio, unsubscribe. No
    /// completion is reported and no event is delivered afterwards.
    fn teardown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_targets() {
        assert_eq!(PlaybackState::Stopped.toggled(), None);
        assert_eq!(PlaybackState::Playing.toggled(), Some(PlaybackState::Paused));
        assert_eq!(PlaybackState::Paused.toggled(), Some(PlaybackState::Playing));
    }

    #[test]
    fn test_default_is_stopped() {
        let state = PlaybackState::default();
        assert!(state.is_stopped());
        assert!(!state.is_playing());
        assert!(!state.is_paused());
    }

    #[test]
    fn test_display() {
        assert_eq!(PlaybackState::Paused.to_string(), "Paused");
        assert_eq!(ReadingMode::SpeedRead.to_string(), "Speed Read");
    }
}
