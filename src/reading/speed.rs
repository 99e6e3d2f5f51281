//! Speed reading: one word at a time at a words-per-minute rate

use crate::integration::config::SpeedReadConfig;
use crate::playback::clock::{PlaybackClock, TimeSource};
use crate::playback::events::{EventSink, PlaybackEvent};
use crate::playback::session::{CompletionReporter, ReadingSession};
use crate::playback::state::{PlaybackController, PlaybackState, ReadingMode};
use crate::reading::clamp_rate;
use crate::reading::text::{tokenize, DisplayWord};
use crate::{ReaderError, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const MIN_WPM: f64 = 50.0;
pub const MAX_WPM: f64 = 800.0;

/// Speed reading engine
pub struct SpeedReadEngine {
    config: SpeedReadConfig,
    time: Arc<dyn TimeSource>,
    reporter: CompletionReporter,
    clock: PlaybackClock,
    events: EventSink,
    session: Option<ReadingSession>,
    tokens: Vec<String>,
    position: usize,
    wpm: f64,
    state: PlaybackState,
    display: Option<DisplayWord>,
}

impl SpeedReadEngine {
    pub fn new(
        config: SpeedReadConfig,
        time: Arc<dyn TimeSource>,
        reporter: CompletionReporter,
    ) -> Self {
        let wpm = clamp_rate(config.default_wpm, MIN_WPM, MAX_WPM).unwrap_or(MIN_WPM);
        Self {
            config,
            time,
            reporter,
            clock: PlaybackClock::new(),
            events: EventSink::new(),
            session: None,
            tokens: Vec::new(),
            position: 0,
            wpm,
            state: PlaybackState::Stopped,
            display: None,
        }
    }

    /// Begin a new session over `text` and start playing.
    ///
    /// Fails with `EmptyInput` if the text has no words, leaving the engine
    /// untouched.
    pub fn start(&mut self, text: &str) -> Result<()> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(ReaderError::EmptyInput);
        }

        self.clock.cancel();
        let session = ReadingSession::new(ReadingMode::SpeedRead, text, tokens.len());
        info!(
            "Speed reading session {} started: {} words at {} wpm",
            session.id(),
            tokens.len(),
            self.wpm
        );

        self.session = Some(session);
        self.tokens = tokens;
        self.position = 0;
        self.refresh_display();
        self.begin_playing();
        Ok(())
    }

    /// Move forward `n` words, stopping at the last word
    pub fn skip_forward(&mut self, n: usize) {
        self.seek(self.position.saturating_add(n));
    }

    /// Move back `n` words, stopping at the first word
    pub fn skip_backward(&mut self, n: usize) {
        self.seek(self.position.saturating_sub(n));
    }

    /// Skip forward by the configured amount
    pub fn skip_forward_default(&mut self) {
        self.skip_forward(self.config.skip_words);
    }

    /// Skip backward by the configured amount
    pub fn skip_backward_default(&mut self) {
        self.skip_backward(self.config.skip_words);
    }

    fn seek(&mut self, target: usize) {
        if self.tokens.is_empty() {
            return;
        }
        self.position = target.min(self.tokens.len() - 1);
        debug!("Seek to word {}", self.position);
        self.refresh_display();
    }

    /// Round a slider value to the configured step, then clamp
    pub fn snap_rate(&self, wpm: f64) -> f64 {
        let step = self.config.wpm_step;
        let snapped = if step > 0.0 {
            (wpm / step).round() * step
        } else {
            wpm
        };
        clamp_rate(snapped, MIN_WPM, MAX_WPM).unwrap_or(self.wpm)
    }

    /// Time between words at the current rate
    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.wpm)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Word currently on screen
    pub fn current_word(&self) -> Option<&DisplayWord> {
        self.display.as_ref()
    }

    /// Fraction of the text read, 0.0 - 1.0
    pub fn progress(&self) -> f64 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        self.position as f64 / self.tokens.len() as f64
    }

    pub fn session(&self) -> Option<&ReadingSession> {
        self.session.as_ref()
    }

    fn begin_playing(&mut self) {
        let now = self.time.now();
        if let Some(session) = self.session.as_mut() {
            session.mark_playing(now);
        }
        self.clock.schedule(self.effective_interval(), now);
        self.set_state(PlaybackState::Playing);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("Speed reader {} -> {}", self.state, state);
            self.state = state;
            self.events.emit(PlaybackEvent::StateChanged(state));
        }
    }

    fn refresh_display(&mut self) {
        self.display = self.tokens.get(self.position).map(DisplayWord::new);
        if let Some(word) = &self.display {
            self.events.emit(PlaybackEvent::Word(word.clone()));
        }
    }

    fn tick(&mut self, now: Instant) {
        // Read the position fresh so skips between ticks take effect
        let Some(token) = self.tokens.get(self.position) else {
            return;
        };
        let word = DisplayWord::new(token.as_str());
        self.events.emit(PlaybackEvent::Word(word.clone()));
        self.display = Some(word);
        self.position += 1;

        if self.position >= self.tokens.len() {
            self.finish(now);
        }
    }

    fn finish(&mut self, now: Instant) {
        self.clock.cancel();
        self.position = 0;
        self.set_state(PlaybackState::Stopped);

        let summary = self.session.as_mut().and_then(|s| s.complete(now));
        if let Some(summary) = summary {
            self.events.emit(PlaybackEvent::Completed(summary.clone()));
            self.reporter.report(&summary);
        }
    }
}

impl PlaybackController for SpeedReadEngine {
    fn mode(&self) -> ReadingMode {
        ReadingMode::SpeedRead
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
        self.position = 0;
        self.set_state(PlaybackState::Stopped);
        self.refresh_display();
        Ok(())
    }

    fn set_rate(&mut self, rate: f64) -> f64 {
        let Some(wpm) = clamp_rate(rate, MIN_WPM, MAX_WPM) else {
            warn!("Ignoring speed reading rate {}", rate);
            return self.wpm;
        };
        self.wpm = wpm;
        if self.state.is_playing() {
            self.clock.set_interval(self.effective_interval());
        }
        debug!("Speed reader rate set to {} wpm", self.wpm);
        self.wpm
    }

    fn rate(&self) -> f64 {
        self.wpm
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
            debug!("Speed reading session {} torn down", session.id());
        }
    }
}

impl Drop for SpeedReadEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
