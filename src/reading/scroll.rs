//! Continuous scroll reading

use crate::integration::config::ScrollConfig;
use crate::playback::clock::{PlaybackClock, TimeSource};
use crate::playback::events::{EventSink, PlaybackEvent};
use crate::playback::session::{CompletionReporter, ReadingSession};
use crate::playback::state::{PlaybackController, PlaybackState, ReadingMode};
use crate::reading::clamp_rate;
use crate::reading::text::word_count;
use crate::{ReaderError, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const MIN_SCROLL_SPEED: f64 = 20.0;
pub const MAX_SCROLL_SPEED: f64 = 200.0;

/// Scrolls the text at a fixed pixels-per-second rate.
///
/// The engine knows nothing about layout. The caller supplies how far the
/// content can scroll (`max_offset`) and re-supplies it when the layout
/// changes.
pub struct ScrollEngine {
    config: ScrollConfig,
    time: Arc<dyn TimeSource>,
    reporter: CompletionReporter,
    clock: PlaybackClock,
    events: EventSink,
    session: Option<ReadingSession>,
    offset: f64,
    max_offset: f64,
    speed: f64,
    state: PlaybackState,
}

impl ScrollEngine {
    pub fn new(config: ScrollConfig, time: Arc<dyn TimeSource>, reporter: CompletionReporter) -> Self {
        let speed = clamp_rate(config.default_speed, MIN_SCROLL_SPEED, MAX_SCROLL_SPEED)
            .unwrap_or(MIN_SCROLL_SPEED);
        Self {
            config,
            time,
            reporter,
            clock: PlaybackClock::new(),
            events: EventSink::new(),
            session: None,
            offset: 0.0,
            max_offset: 0.0,
            speed,
            state: PlaybackState::Stopped,
        }
    }

    /// Begin scrolling `text`, whose rendered content can scroll `max_offset` pixels
    pub fn start(&mut self, text: &str, max_offset: f64) -> Result<()> {
        let words = word_count(text);
        if words == 0 {
            return Err(ReaderError::EmptyInput);
        }

        self.clock.cancel();
        let session = ReadingSession::new(ReadingMode::Scroll, text, words);
        info!(
            "Scroll session {} started: {} words, {:.0}px at {} px/s",
            session.id(),
            words,
            max_offset,
            self.speed
        );

        self.session = Some(session);
        self.max_offset = max_offset.max(0.0);
        self.set_offset(0.0);
        self.begin_playing();
        Ok(())
    }

    /// Update the scroll extent after a layout change
    pub fn set_max_offset(&mut self, max_offset: f64) {
        self.max_offset = max_offset.max(0.0);
        if self.offset > self.max_offset {
            self.set_offset(self.max_offset);
        }
    }

    pub fn max_offset(&self) -> f64 {
        self.max_offset
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Round a slider value to the configured step, then clamp
    pub fn snap_rate(&self, speed: f64) -> f64 {
        let step = self.config.speed_step;
        let snapped = if step > 0.0 {
            (speed / step).round() * step
        } else {
            speed
        };
        clamp_rate(snapped, MIN_SCROLL_SPEED, MAX_SCROLL_SPEED).unwrap_or(self.speed)
    }

    /// Pixels advanced on each frame at the current speed
    pub fn step_per_tick(&self) -> f64 {
        self.speed / f64::from(self.config.frame_rate)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.frame_rate))
    }

    pub fn session(&self) -> Option<&ReadingSession> {
        self.session.as_ref()
    }

    fn begin_playing(&mut self) {
        let now = self.time.now();
        if let Some(session) = self.session.as_mut() {
            session.mark_playing(now);
        }
        self.clock.schedule(self.frame_interval(), now);
        self.set_state(PlaybackState::Playing);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("Scroller {} -> {}", self.state, state);
            self.state = state;
            self.events.emit(PlaybackEvent::StateChanged(state));
        }
    }

    fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
        self.events.emit(PlaybackEvent::Offset(offset));
    }

    fn tick(&mut self, now: Instant) {
        let next = self.offset + self.step_per_tick();
        if next >= self.max_offset {
            self.set_offset(self.max_offset);
            self.finish(now);
        } else {
            self.set_offset(next);
        }
    }

    fn finish(&mut self, now: Instant) {
        self.clock.cancel();
        self.set_state(PlaybackState::Stopped);
        self.set_offset(0.0);

        let summary = self.session.as_mut().and_then(|s| s.complete(now));
        if let Some(summary) = summary {
            self.events.emit(PlaybackEvent::Completed(summary.clone()));
            self.reporter.report(&summary);
        }
    }
}

impl PlaybackController for ScrollEngine {
    fn mode(&self) -> ReadingMode {
        ReadingMode::Scroll
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn play_pause(&mut self) {
        match self.state {
            PlaybackState::Stopped => {}
            PlaybackState::Playing => {
                self.clock.cancel();
                self.set_state(PlaybackState::Paused);
            }
            PlaybackState::Paused => self.begin_playing(),
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.clock.cancel();
        self.set_state(PlaybackState::Stopped);
        if self.offset != 0.0 {
            self.set_offset(0.0);
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: f64) -> f64 {
        // The frame rate is fixed; only the distance per frame changes
        let Some(speed) = clamp_rate(rate, MIN_SCROLL_SPEED, MAX_SCROLL_SPEED) else {
            warn!("Ignoring scroll speed {}", rate);
            return self.speed;
        };
        self.speed = speed;
        debug!("Scroll speed set to {} px/s", self.speed);
        self.speed
    }

    fn rate(&self) -> f64 {
        self.speed
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.clock.next_due()
    }

    fn poll(&mut self) {
        let now = self.time.now();
        if self.state.is_playing() && self.clock.poll(now) {
            self.tick(now);
        }
    }

    fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    fn teardown(&mut self) {
        self.clock.cancel();
        self.events.unsubscribe();
        self.state = PlaybackState::Stopped;
        if let Some(session) = self.session.take() {
            debug!("Scroll session {} torn down", session.id());
        }
    }
}

impl Drop for ScrollEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
