//! Shared playback machinery for the reading modes
//!
//! This module provides:
//! - The `{Stopped, Playing, Paused}` state machine and the controller trait
//! - A cancellable periodic clock driven by the host loop
//! - Session bookkeeping and completion reporting
//! - Per-session event subscriptions

pub mod clock;
pub mod events;
pub mod session;
pub mod state;

pub use clock::{ClockHandle, ManualTime, PlaybackClock, TimeSource, TokioTime};
pub use events::{EventSink, PlaybackEvent};
pub use session::{
    CompletionListener, CompletionReporter, ReadingSession, SessionSummary, StatsRecorder,
};
pub use state::{PlaybackController, PlaybackState, ReadingMode};
