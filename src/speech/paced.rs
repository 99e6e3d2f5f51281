//! Silent synthesizer that paces through the text word by word
//!
//! Stands in for a platform voice where no audio output is available (the
//! terminal front-end, CI). Each utterance runs on its own worker thread that
//! reports word ranges at a rate derived from the request, and honours
//! pause, resume and stop through a control channel.

use crate::reading::text::word_ranges;
use crate::speech::synthesizer::{
    SpeechRequest, SpeechSynthesizer, SynthesisEvent, SynthesisEventKind, Voice,
};
use crate::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Words per second at the `Normal` rate (0.5)
pub const DEFAULT_WORDS_PER_SECOND: f64 = 2.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    Stop,
}

struct Utterance {
    control_tx: Sender<Control>,
    speaking: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// Synthesizer that "speaks" by timing word ranges.
///
/// A paused utterance keeps its worker thread blocked until it is resumed or
/// stopped. That happens on the next `speak`, on `stop`, or when the
/// synthesizer is dropped.
pub struct PacedSynthesizer {
    voices: Vec<Voice>,
    words_per_second: f64,
    current: Option<Utterance>,
}

impl PacedSynthesizer {
    pub fn new() -> Self {
        Self {
            voices: vec![
                Voice::new("paced.daniel", "Daniel", "en-GB"),
                Voice::new("paced.samantha", "Samantha", "en-US"),
            ],
            words_per_second: DEFAULT_WORDS_PER_SECOND,
            current: None,
        }
    }

    /// Set the pace at the `Normal` rate
    pub fn with_words_per_second(mut self, words_per_second: f64) -> Self {
        self.words_per_second = words_per_second.max(0.1);
        self
    }

    /// Replace the advertised voices
    pub fn with_voices(mut self, voices: Vec<Voice>) -> Self {
        self.voices = voices;
        self
    }

    /// Time spent on each word at `rate`
    fn word_duration(&self, rate: f64) -> Duration {
        let scale = rate.clamp(0.05, 1.0) / 0.5;
        Duration::from_secs_f64(1.0 / (self.words_per_second * scale))
    }
}

impl Default for PacedSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for PacedSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, request: SpeechRequest, events: Sender<SynthesisEvent>) -> Result<()> {
        self.stop();

        let (control_tx, control_rx) = unbounded();
        let speaking = Arc::new(AtomicBool::new(true));
        let word_time = self.word_duration(request.rate);
        let worker_speaking = Arc::clone(&speaking);

        debug!(
            "Pacing utterance {} with voice {} at {:.0}ms per word",
            request.utterance_id,
            request.voice_id,
            word_time.as_secs_f64() * 1000.0
        );

        let worker = thread::spawn(move || {
            let id = request.utterance_id;
            let finished = speak_words(&request.text, word_time, &control_rx, |range| {
                events
                    .send(SynthesisEvent::new(id, SynthesisEventKind::WillSpeakRange(range)))
                    .is_ok()
            });

            worker_speaking.store(false, Ordering::SeqCst);
            if finished {
                let _ = events.send(SynthesisEvent::new(id, SynthesisEventKind::Finished));
                info!("Utterance {} finished", id);
            }
        });

        self.current = Some(Utterance {
            control_tx,
            speaking,
            worker: Some(worker),
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(utterance) = &self.current {
            let _ = utterance.control_tx.send(Control::Pause);
        }
    }

    fn resume(&mut self) {
        if let Some(utterance) = &self.current {
            let _ = utterance.control_tx.send(Control::Resume);
        }
    }

    fn stop(&mut self) {
        if let Some(mut utterance) = self.current.take() {
            let _ = utterance.control_tx.send(Control::Stop);
            utterance.speaking.store(false, Ordering::SeqCst);
            // Join so nothing is sent after stop returns
            if let Some(worker) = utterance.worker.take() {
                if worker.join().is_err() {
                    warn!("Paced synthesizer worker panicked");
                }
            }
        }
    }

    fn is_speaking(&self) -> bool {
        self.current
            .as_ref()
            .map(|u| u.speaking.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Drop for PacedSynthesizer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Walk the words of `text`. Returns true if the end was reached.
fn speak_words(
    text: &str,
    word_time: Duration,
    control: &Receiver<Control>,
    mut announce: impl FnMut(std::ops::Range<usize>) -> bool,
) -> bool {
    for range in word_ranges(text) {
        if !hold(control, Duration::ZERO) {
            return false;
        }
        if !announce(range) {
            // Nobody is listening any more
            return false;
        }
        if !hold(control, word_time) {
            return false;
        }
    }
    true
}

/// Wait out `duration`, extended by any pause. Returns false on stop.
fn hold(control: &Receiver<Control>, duration: Duration) -> bool {
    let mut remaining = duration;
    loop {
        let waited_from = Instant::now();
        match control.recv_timeout(remaining) {
            Ok(Control::Pause) => {
                remaining = remaining.saturating_sub(waited_from.elapsed());
                loop {
                    match control.recv() {
                        Ok(Control::Resume) => break,
                        Ok(Control::Pause) => continue,
                        Ok(Control::Stop) | Err(_) => return false,
                    }
                }
            }
            Ok(Control::Resume) => {
                remaining = remaining.saturating_sub(waited_from.elapsed());
            }
            Ok(Control::Stop) => return false,
            Err(RecvTimeoutError::Timeout) => return true,
            Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(text: &str) -> SpeechRequest {
        SpeechRequest {
            utterance_id: Uuid::new_v4(),
            text: Arc::from(text),
            voice_id: "paced.daniel".into(),
            rate: 0.5,
        }
    }

    #[test]
    fn test_word_duration_scales_with_rate() {
        let synth = PacedSynthesizer::new().with_words_per_second(2.0);
        assert_eq!(synth.word_duration(0.5), Duration::from_millis(500));
        assert_eq!(synth.word_duration(1.0), Duration::from_millis(250));
    }

    #[test]
    fn test_speaks_every_word_then_finishes() {
        let mut synth = PacedSynthesizer::new().with_words_per_second(1000.0);
        let (tx, rx) = unbounded();
        let req = request("one two three");
        let id = req.utterance_id;
        synth.speak(req, tx).unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            assert_eq!(event.utterance_id, id);
            let done = event.kind == SynthesisEventKind::Finished;
            kinds.push(event.kind);
            if done {
                break;
            }
        }

        assert_eq!(
            kinds,
            vec![
                SynthesisEventKind::WillSpeakRange(0..3),
                SynthesisEventKind::WillSpeakRange(4..7),
                SynthesisEventKind::WillSpeakRange(8..13),
                SynthesisEventKind::Finished,
            ]
        );
    }

    #[test]
    fn test_stop_silences_utterance() {
        let mut synth = PacedSynthesizer::new().with_words_per_second(0.5);
        let (tx, rx) = unbounded();
        synth.speak(request("a long sentence that will not finish"), tx).unwrap();
        assert!(synth.is_speaking());

        synth.stop();
        assert!(!synth.is_speaking());

        // Worker is joined and the sender dropped
        let remaining: Vec<_> = rx.iter().collect();
        assert!(remaining
            .iter()
            .all(|e| e.kind != SynthesisEventKind::Finished));
        assert!(remaining.len() <= 1);
    }

    #[test]
    fn test_paused_utterance_is_still_speaking() {
        let mut synth = PacedSynthesizer::new().with_words_per_second(1.0);
        let (tx, _rx) = unbounded();
        synth.speak(request("pause me please"), tx).unwrap();
        synth.pause();
        thread::sleep(Duration::from_millis(20));
        assert!(synth.is_speaking());
        synth.stop();
    }

    #[test]
    fn test_next_utterance_releases_paused_worker() {
        let mut synth = PacedSynthesizer::new().with_words_per_second(1.0);
        let (first_tx, first_rx) = unbounded();
        synth.speak(request("held until replaced"), first_tx).unwrap();
        synth.pause();

        let (second_tx, _second_rx) = unbounded();
        synth.speak(request("next"), second_tx).unwrap();

        // The held worker was joined, so its sender is gone
        let leftover: Vec<_> = first_rx.iter().collect();
        assert!(leftover
            .iter()
            .all(|e| e.kind != SynthesisEventKind::Finished));
        synth.stop();
    }

    #[test]
    fn test_hold_honours_stop_while_paused() {
        let (tx, rx) = unbounded();
        tx.send(Control::Pause).unwrap();
        tx.send(Control::Stop).unwrap();
        assert!(!hold(&rx, Duration::from_secs(10)));
    }

    #[test]
    fn test_hold_times_out() {
        let (_tx, rx) = unbounded::<Control>();
        assert!(hold(&rx, Duration::from_millis(5)));
    }
}
