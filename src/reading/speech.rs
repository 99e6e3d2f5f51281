//! Text-to-speech reading with live word highlighting
//!
//! The synthesizer reports progress from its own thread. Those reports are
//! queued on a per-utterance channel and only applied when the host loop
//! polls the engine, so all state changes happen on the host thread. While
//! an utterance is live the engine's clock runs as an event pump.

use crate::integration::config::{ResetPolicy, SpeechConfig};
use crate::playback::clock::{PlaybackClock, TimeSource};
use crate::playback::events::{EventSink, PlaybackEvent};
use crate::playback::session::{CompletionReporter, ReadingSession};
use crate::playback::state::{PlaybackController, PlaybackState, ReadingMode};
use crate::reading::clamp_rate;
use crate::reading::text::word_count;
use crate::settings::SettingsProvider;
use crate::speech::synthesizer::{
    resolve_voice, SharedSynthesizer, SpeechRequest, SynthesisEvent, SynthesisEventKind, Voice,
};
use crate::speech::tier::SpeedTier;
use crate::{ReaderError, Result};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Synthesis rate bounds
pub const MIN_SPEECH_RATE: f64 = 0.0;
pub const MAX_SPEECH_RATE: f64 = 1.0;

struct Utterance {
    id: Uuid,
    events: Receiver<SynthesisEvent>,
}

/// Speech reading engine
pub struct SpeechPlaybackEngine {
    config: SpeechConfig,
    time: Arc<dyn TimeSource>,
    reporter: CompletionReporter,
    synthesizer: SharedSynthesizer,
    settings: Arc<dyn SettingsProvider>,
    clock: PlaybackClock,
    events: EventSink,
    session: Option<ReadingSession>,
    utterance: Option<Utterance>,
    voice: Option<Voice>,
    highlight: Option<Range<usize>>,
    rate: f64,
    rate_overridden: bool,
    state: PlaybackState,
}

impl SpeechPlaybackEngine {
    pub fn new(
        config: SpeechConfig,
        time: Arc<dyn TimeSource>,
        reporter: CompletionReporter,
        synthesizer: SharedSynthesizer,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        let rate = config.default_tier.rate();
        Self {
            config,
            time,
            reporter,
            synthesizer,
            settings,
            clock: PlaybackClock::new(),
            events: EventSink::new(),
            session: None,
            utterance: None,
            voice: None,
            highlight: None,
            rate,
            rate_overridden: false,
            state: PlaybackState::Stopped,
        }
    }

    /// Start speaking `text` with the voice and tier from settings.
    ///
    /// A rate set through `set_rate` or `set_tier` takes precedence over the
    /// settings tier, including on restart. Claims the shared synthesizer, stopping any other speech session. On
    /// failure the engine stays `Stopped` and no session is kept.
    pub fn start(&mut self, text: &str) -> Result<()> {
        let words = word_count(text);
        if words == 0 {
            return Err(ReaderError::EmptyInput);
        }

        // Whatever this engine was doing is abandoned
        if let Some(id) = self.session_id() {
            if self.synthesizer.is_speaking_for(id) {
                self.synthesizer.stop(id);
            }
        }
        self.end_utterance();
        self.set_highlight(None);
        self.set_state(PlaybackState::Stopped);
        self.session = None;

        let settings = self.settings.speech_settings();
        let voices = self.synthesizer.voices();
        let voice = resolve_voice(&voices, &settings.voice, &self.config.default_voice)
            .ok_or_else(|| ReaderError::SynthesisUnavailable("No voices installed".into()))?;
        if voice.name != settings.voice && voice.id != settings.voice {
            warn!(
                "Voice {} not available, using {}",
                settings.voice, voice.name
            );
        }

        let session = ReadingSession::new(ReadingMode::Speech, text, words);
        if !self.rate_overridden {
            self.rate = settings.tier.rate();
        }
        self.synthesizer.claim(session.id());

        let request = SpeechRequest {
            utterance_id: Uuid::new_v4(),
            text: session.shared_text(),
            voice_id: voice.id.clone(),
            rate: self.rate,
        };
        let utterance_id = request.utterance_id;
        let (tx, rx) = unbounded();

        match self.synthesizer.speak(session.id(), request, tx) {
            Ok(true) => {}
            Ok(false) => {
                // Another session claimed the synthesizer between our claim and speak
                return Err(ReaderError::SynthesisUnavailable(
                    "Synthesizer is in use by another session".into(),
                ));
            }
            Err(e) => {
                warn!("Failed to start speech: {}", e);
                return Err(e);
            }
        }

        info!(
            "Speech session {} started: {} words, voice {}, rate {}",
            session.id(),
            words,
            voice.name,
            self.rate
        );

        self.session = Some(session);
        self.voice = Some(voice);
        self.utterance = Some(Utterance {
            id: utterance_id,
            events: rx,
        });

        let now = self.time.now();
        if let Some(session) = self.session.as_mut() {
            session.mark_playing(now);
        }
        self.clock.schedule(self.pump_interval(), now);
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Use `tier` for the next utterance instead of the settings tier
    pub fn set_tier(&mut self, tier: SpeedTier) -> f64 {
        self.set_rate(tier.rate())
    }

    /// Byte range of the source text currently being spoken
    pub fn highlight(&self) -> Option<Range<usize>> {
        self.highlight.clone()
    }

    /// Source text split around the highlight as (before, spoken, after).
    ///
    /// The source text itself is never modified.
    pub fn segments(&self) -> Option<(&str, &str, &str)> {
        let text = self.session.as_ref()?.source_text();
        match &self.highlight {
            Some(range) => Some((
                &text[..range.start],
                &text[range.clone()],
                &text[range.end..],
            )),
            None => Some((text, "", "")),
        }
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn session(&self) -> Option<&ReadingSession> {
        self.session.as_ref()
    }

    fn pump_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.event_pump_hz))
    }

    fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id())
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("Speech {} -> {}", self.state, state);
            self.state = state;
            self.events.emit(PlaybackEvent::StateChanged(state));
        }
    }

    fn set_highlight(&mut self, range: Option<Range<usize>>) {
        if self.highlight != range {
            self.highlight = range.clone();
            self.events.emit(PlaybackEvent::Highlight(range));
        }
    }

    /// Forget the current utterance. Dropping the receiver unsubscribes from
    /// its callbacks.
    fn end_utterance(&mut self) {
        self.clock.cancel();
        self.utterance = None;
    }

    fn is_valid_range(&self, range: &Range<usize>) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        let text = session.source_text();
        range.start <= range.end
            && range.end <= text.len()
            && text.is_char_boundary(range.start)
            && text.is_char_boundary(range.end)
    }

    /// Drain queued synthesizer callbacks for the current utterance
    fn pump(&mut self, now: Instant) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        if !self.synthesizer.is_owned_by(session_id) {
            self.preempted();
            return;
        }
        let Some((utterance_id, events)) = self
            .utterance
            .as_ref()
            .map(|u| (u.id, u.events.clone()))
        else {
            return;
        };

        loop {
            match events.try_recv() {
                Ok(event) if event.utterance_id != utterance_id => {
                    debug!("Dropping stale event for utterance {}", event.utterance_id);
                }
                Ok(event) => match event.kind {
                    SynthesisEventKind::WillSpeakRange(range) => {
                        if self.is_valid_range(&range) {
                            self.set_highlight(Some(range));
                        } else {
                            debug!("Ignoring invalid highlight range {:?}", range);
                        }
                    }
                    SynthesisEventKind::Finished => {
                        self.finish(now);
                        return;
                    }
                    SynthesisEventKind::Failed(reason) => {
                        self.fail(ReaderError::SynthesisError(reason));
                        return;
                    }
                },
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.fail(ReaderError::SynthesisError(
                        "Speech ended without finishing".into(),
                    ));
                    return;
                }
            }
        }
    }

    fn finish(&mut self, now: Instant) {
        self.end_utterance();
        self.set_highlight(None);
        self.set_state(PlaybackState::Stopped);

        let summary = self.session.as_mut().and_then(|s| s.complete(now));
        if let Some(summary) = summary {
            self.events.emit(PlaybackEvent::Completed(summary.clone()));
            self.reporter.report(&summary);
        }
    }

    fn fail(&mut self, error: ReaderError) {
        warn!("Speech session failed: {}", error);
        self.end_utterance();
        self.set_highlight(None);
        self.set_state(PlaybackState::Stopped);
        self.events.emit(PlaybackEvent::Error(error.user_message()));
    }

    /// Another session took the synthesizer. Stop quietly.
    fn preempted(&mut self) {
        if let Some(id) = self.session_id() {
            info!("Speech session {} lost the synthesizer", id);
        }
        self.end_utterance();
        self.set_highlight(None);
        self.set_state(PlaybackState::Stopped);
    }
}

impl PlaybackController for SpeechPlaybackEngine {
    fn mode(&self) -> ReadingMode {
        ReadingMode::Speech
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn play_pause(&mut self) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        match self.state {
            PlaybackState::Stopped => {}
            PlaybackState::Playing => {
                if self.synthesizer.pause(session_id) {
                    // Nothing arrives while paused
                    self.clock.cancel();
                    self.set_state(PlaybackState::Paused);
                } else {
                    self.preempted();
                }
            }
            PlaybackState::Paused => {
                if self.synthesizer.resume(session_id) {
                    self.clock.schedule(self.pump_interval(), self.time.now());
                    self.set_state(PlaybackState::Playing);
                } else {
                    self.preempted();
                }
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        let text = self.session.as_ref().map(|s| s.shared_text());
        if let Some(id) = self.session_id() {
            self.synthesizer.stop(id);
        }
        self.end_utterance();
        self.set_highlight(None);
        self.set_state(PlaybackState::Stopped);

        match (self.config.reset_policy, text) {
            (ResetPolicy::Restart, Some(text)) => {
                debug!("Restarting speech from the beginning");
                self.start(&text)
            }
            _ => Ok(()),
        }
    }

    fn set_rate(&mut self, rate: f64) -> f64 {
        // A running utterance keeps its rate; the next one uses the new value
        let Some(rate) = clamp_rate(rate, MIN_SPEECH_RATE, MAX_SPEECH_RATE) else {
            warn!("Ignoring speech rate {}", rate);
            return self.rate;
        };
        self.rate = rate;
        self.rate_overridden = true;
        debug!("Speech rate set to {}", self.rate);
        self.rate
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.clock.next_due()
    }

    fn poll(&mut self) {
        let now = self.time.now();
        if self.state.is_playing() && self.clock.poll(now) {
            self.pump(now);
        }
    }

    fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    fn teardown(&mut self) {
        self.events.unsubscribe();
        if let Some(id) = self.session_id() {
            // Pause rather than stop; the next claim stops it
            if self.synthesizer.is_speaking_for(id) {
                self.synthesizer.pause(id);
            }
        }
        self.end_utterance();
        self.highlight = None;
        self.state = PlaybackState::Stopped;
        if let Some(session) = self.session.take() {
            debug!("Speech session {} torn down", session.id());
        }
    }
}

impl Drop for SpeechPlaybackEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::clock::ManualTime;
    use crate::settings::{SpeechSettings, StaticSettings};
    use crate::speech::synthesizer::SpeechSynthesizer;
    use crossbeam_channel::Sender;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Calls {
        voices: Vec<Voice>,
        log: Vec<&'static str>,
        requests: Vec<SpeechRequest>,
        sender: Option<Sender<SynthesisEvent>>,
        speaking: bool,
    }

    #[derive(Clone, Default)]
    struct FakeSynth {
        calls: Arc<Mutex<Calls>>,
    }

    impl FakeSynth {
        fn new() -> Self {
            let calls = Calls {
                voices: vec![
                    Voice::new("v.daniel", "Daniel", "en-GB"),
                    Voice::new("v.anna", "Anna", "de-DE"),
                ],
                ..Calls::default()
            };
            Self {
                calls: Arc::new(Mutex::new(calls)),
            }
        }

        fn rates(&self) -> Vec<f64> {
            self.calls.lock().requests.iter().map(|r| r.rate).collect()
        }

        fn send(&self, kind: SynthesisEventKind) {
            let calls = self.calls.lock();
            let id = calls.requests.last().unwrap().utterance_id;
            calls
                .sender
                .as_ref()
                .unwrap()
                .send(SynthesisEvent::new(id, kind))
                .unwrap();
        }

        fn log(&self) -> Vec<&'static str> {
            self.calls.lock().log.clone()
        }
    }

    impl SpeechSynthesizer for FakeSynth {
        fn voices(&self) -> Vec<Voice> {
            self.calls.lock().voices.clone()
        }

        fn speak(&mut self, request: SpeechRequest, events: Sender<SynthesisEvent>) -> Result<()> {
            let mut calls = self.calls.lock();
            calls.log.push("speak");
            calls.requests.push(request);
            calls.sender = Some(events);
            calls.speaking = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.lock().log.push("pause");
        }

        fn resume(&mut self) {
            self.calls.lock().log.push("resume");
        }

        fn stop(&mut self) {
            let mut calls = self.calls.lock();
            calls.log.push("stop");
            calls.sender = None;
            calls.speaking = false;
        }

        fn is_speaking(&self) -> bool {
            self.calls.lock().speaking
        }
    }

    fn engine_with(
        fake: &FakeSynth,
        policy: ResetPolicy,
    ) -> (SpeechPlaybackEngine, ManualTime, SharedSynthesizer) {
        let time = ManualTime::new();
        let shared = SharedSynthesizer::new(fake.clone());
        let config = SpeechConfig {
            reset_policy: policy,
            ..SpeechConfig::default()
        };
        let settings = StaticSettings::new(SpeechSettings {
            voice: "Daniel".into(),
            tier: SpeedTier::Fast,
        });
        let engine = SpeechPlaybackEngine::new(
            config,
            Arc::new(time.clone()),
            CompletionReporter::new(),
            shared.clone(),
            Arc::new(settings),
        );
        (engine, time, shared)
    }

    fn pump(engine: &mut SpeechPlaybackEngine, time: &ManualTime) {
        time.advance(Duration::from_millis(20));
        engine.poll();
    }

    #[test]
    fn test_start_uses_settings() {
        let fake = FakeSynth::new();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::Restart);
        engine.start("Hello there").unwrap();

        assert!(engine.state().is_playing());
        let calls = fake.calls.lock();
        let request = calls.requests.last().unwrap();
        assert_eq!(request.voice_id, "v.daniel");
        assert_eq!(request.rate, 0.65);
        assert_eq!(&*request.text, "Hello there");
    }

    #[test]
    fn test_no_voices_is_unavailable() {
        let fake = FakeSynth::new();
        fake.calls.lock().voices.clear();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::Restart);
        let err = engine.start("Hello").unwrap_err();
        assert!(matches!(err, ReaderError::SynthesisUnavailable(_)));
        assert!(engine.state().is_stopped());
        assert!(engine.session().is_none());
    }

    #[test]
    fn test_lost_voices_stop_previous_utterance() {
        let fake = FakeSynth::new();
        let (mut engine, _, shared) = engine_with(&fake, ResetPolicy::Restart);
        engine.start("first text").unwrap();
        fake.calls.lock().voices.clear();

        let err = engine.start("second text").unwrap_err();
        assert!(matches!(err, ReaderError::SynthesisUnavailable(_)));
        assert_eq!(fake.log(), vec!["speak", "stop"]);
        assert!(!fake.is_speaking());
        assert!(shared.owner().is_some());
        assert!(engine.session().is_none());
    }

    #[test]
    fn test_tier_survives_restart() {
        let fake = FakeSynth::new();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::Restart);
        engine.set_tier(SpeedTier::VeryFast);
        engine.start("one two").unwrap();

        engine.set_tier(SpeedTier::Slow);
        engine.reset().unwrap();
        assert_eq!(fake.rates(), vec![0.75, 0.35]);
        assert_eq!(engine.rate(), 0.35);
    }

    #[test]
    fn test_settings_tier_applies_without_override() {
        let fake = FakeSynth::new();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::Restart);
        engine.start("one two").unwrap();
        engine.reset().unwrap();
        assert_eq!(fake.rates(), vec![0.65, 0.65]);
    }

    #[test]
    fn test_non_finite_rate() {
        let fake = FakeSynth::new();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::Restart);
        assert_eq!(engine.set_rate(0.4), 0.4);
        assert_eq!(engine.set_rate(f64::NAN), 0.4);
        assert_eq!(engine.set_rate(f64::INFINITY), MAX_SPEECH_RATE);
        assert_eq!(engine.set_rate(f64::NEG_INFINITY), MIN_SPEECH_RATE);
        engine.set_rate(f64::NAN);

        engine.start("one two").unwrap();
        assert_eq!(fake.rates(), vec![MIN_SPEECH_RATE]);
    }

    #[test]
    fn test_highlight_follows_ranges() {
        let fake = FakeSynth::new();
        let (mut engine, time, _) = engine_with(&fake, ResetPolicy::Restart);
        engine.start("Read this aloud").unwrap();

        fake.send(SynthesisEventKind::WillSpeakRange(5..9));
        pump(&mut engine, &time);
        assert_eq!(engine.highlight(), Some(5..9));
        assert_eq!(engine.segments(), Some(("Read ", "this", " aloud")));
        assert_eq!(engine.session().unwrap().source_text(), "Read this aloud");
    }

    #[test]
    fn test_invalid_ranges_are_ignored() {
        let fake = FakeSynth::new();
        let (mut engine, time, _) = engine_with(&fake, ResetPolicy::Restart);
        engine.start("héllo world").unwrap();

        fake.send(SynthesisEventKind::WillSpeakRange(0..2));
        fake.send(SynthesisEventKind::WillSpeakRange(4..40));
        pump(&mut engine, &time);
        assert_eq!(engine.highlight(), None);
    }

    #[test]
    fn test_finish_completes_once() {
        let fake = FakeSynth::new();
        let (mut engine, time, _) = engine_with(&fake, ResetPolicy::Restart);
        let rx = engine.subscribe();
        engine.start("one two three").unwrap();

        fake.send(SynthesisEventKind::WillSpeakRange(0..3));
        fake.send(SynthesisEventKind::Finished);
        pump(&mut engine, &time);
        pump(&mut engine, &time);

        assert!(engine.state().is_stopped());
        assert_eq!(engine.highlight(), None);
        let completions: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                PlaybackEvent::Completed(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].word_count, 3);
    }

    #[test]
    fn test_failure_surfaces_message() {
        let fake = FakeSynth::new();
        let (mut engine, time, _) = engine_with(&fake, ResetPolicy::Restart);
        let rx = engine.subscribe();
        engine.start("one two").unwrap();

        fake.send(SynthesisEventKind::Failed("audio device lost".into()));
        pump(&mut engine, &time);

        assert!(engine.state().is_stopped());
        let expected = ReaderError::SynthesisError(String::new()).user_message();
        assert!(rx
            .try_iter()
            .any(|e| e == PlaybackEvent::Error(expected.clone())));
    }

    #[test]
    fn test_play_pause_drives_synthesizer() {
        let fake = FakeSynth::new();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::Restart);
        engine.play_pause();
        assert!(fake.log().is_empty());

        engine.start("one two").unwrap();
        engine.play_pause();
        assert!(engine.state().is_paused());
        assert!(engine.next_deadline().is_none());
        engine.play_pause();
        assert!(engine.state().is_playing());
        assert_eq!(fake.log(), vec!["speak", "pause", "resume"]);
    }

    #[test]
    fn test_reset_restarts_by_default() {
        let fake = FakeSynth::new();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::Restart);
        engine.start("one two").unwrap();
        let first = engine.session().unwrap().id();

        engine.reset().unwrap();
        assert!(engine.state().is_playing());
        assert_ne!(engine.session().unwrap().id(), first);
        assert_eq!(fake.log(), vec!["speak", "stop", "speak"]);
    }

    #[test]
    fn test_reset_can_wait_for_start() {
        let fake = FakeSynth::new();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::StopAndWait);
        engine.start("one two").unwrap();

        engine.reset().unwrap();
        engine.reset().unwrap();
        assert!(engine.state().is_stopped());
        assert!(engine.next_deadline().is_none());
        assert_eq!(fake.log(), vec!["speak", "stop", "stop"]);
    }

    #[test]
    fn test_teardown_pauses_instead_of_stopping() {
        let fake = FakeSynth::new();
        let (mut engine, _, _) = engine_with(&fake, ResetPolicy::Restart);
        engine.start("one two").unwrap();

        engine.teardown();
        assert_eq!(fake.log(), vec!["speak", "pause"]);
        assert!(engine.state().is_stopped());
        assert!(engine.next_deadline().is_none());
    }

    #[test]
    fn test_new_session_preempts_old_one() {
        let fake = FakeSynth::new();
        let (mut first, time, shared) = engine_with(&fake, ResetPolicy::Restart);
        let rx = first.subscribe();
        first.start("first text").unwrap();

        let mut second = SpeechPlaybackEngine::new(
            SpeechConfig::default(),
            Arc::new(time.clone()),
            CompletionReporter::new(),
            shared,
            Arc::new(StaticSettings::default()),
        );
        second.start("second text").unwrap();

        pump(&mut first, &time);
        assert!(first.state().is_stopped());
        assert!(second.state().is_playing());
        assert!(!rx
            .try_iter()
            .any(|e| matches!(e, PlaybackEvent::Completed(_))));
    }
}
