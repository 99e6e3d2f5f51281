//! Observable output of the reading engines

use crate::playback::session::SessionSummary;
use crate::playback::state::PlaybackState;
use crate::reading::text::DisplayWord;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::ops::Range;

/// Event emitted by a reading engine
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    /// The engine moved to a new playback state
    StateChanged(PlaybackState),

    /// Speed reading: the word to display
    Word(DisplayWord),

    /// Scroll reading: the current scroll offset in pixels
    Offset(f64),

    /// Speech reading: byte range of the source text being spoken, or `None`
    /// when the highlight is cleared
    Highlight(Option<Range<usize>>),

    /// The session reached the end of its content
    Completed(SessionSummary),

    /// A user-visible failure; the engine is back at `Stopped`
    Error(String),
}

/// Per-session event subscription.
///
/// Holds at most one subscriber. Dropping the sender on `unsubscribe`
/// guarantees nothing is delivered afterwards.
#[derive(Debug, Default)]
pub struct EventSink {
    tx: Option<Sender<PlaybackEvent>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh subscription, closing any previous one
    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = unbounded();
        self.tx = Some(tx);
        rx
    }

    pub fn unsubscribe(&mut self) {
        self.tx = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.tx.is_some()
    }

    /// Send an event to the subscriber, if any.
    pub fn emit(&mut self, event: PlaybackEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                // Receiver dropped by the UI
                self.tx = None;
            }
        }
    }
}
