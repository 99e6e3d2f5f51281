//! Speech synthesis collaborator and the app-wide synthesizer slot
//!
//! The platform synthesizer is an external capability. It speaks a request
//! and reports progress through `SynthesisEvent`s sent on a channel that is
//! created per utterance. The speech engine owns the receiving end and drains
//! it on the host loop, so callbacks fired from a background audio thread
//! never touch engine state directly.

use crate::Result;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// An installed voice
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Platform identifier
    pub id: String,
    /// Display name, as stored in settings
    pub name: String,
    /// BCP-47 language tag
    pub language: String,
}

impl Voice {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
        }
    }

    pub fn is_english(&self) -> bool {
        self.language.starts_with("en")
    }
}

/// One utterance to speak
#[derive(Clone, Debug, PartialEq)]
pub struct SpeechRequest {
    /// Tags every event produced for this utterance
    pub utterance_id: Uuid,
    pub text: Arc<str>,
    pub voice_id: String,
    /// Normalized rate, 0.0 - 1.0
    pub rate: f64,
}

/// Progress reported by the synthesizer
#[derive(Clone, Debug, PartialEq)]
pub enum SynthesisEventKind {
    /// About to speak this byte range of the request text
    WillSpeakRange(Range<usize>),
    /// Reached the end of the utterance
    Finished,
    /// Gave up on the utterance
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisEvent {
    pub utterance_id: Uuid,
    pub kind: SynthesisEventKind,
}

impl SynthesisEvent {
    pub fn new(utterance_id: Uuid, kind: SynthesisEventKind) -> Self {
        Self { utterance_id, kind }
    }
}

/// Platform speech synthesis capability
pub trait SpeechSynthesizer: Send {
    /// Installed voices. Empty means synthesis is unavailable.
    fn voices(&self) -> Vec<Voice>;

    /// Begin speaking, replacing anything in progress. Progress is reported on
    /// `events` until the utterance finishes, fails, or is stopped.
    fn speak(&mut self, request: SpeechRequest, events: Sender<SynthesisEvent>) -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Abandon the current utterance. No further events are sent for it.
    fn stop(&mut self);

    /// True while an utterance is in progress, paused or not
    fn is_speaking(&self) -> bool;
}

/// Pick the voice for a session.
///
/// Tries the preferred voice by name then id, the fallback voice by name,
/// the first English voice, and finally any voice.
pub fn resolve_voice(voices: &[Voice], preferred: &str, fallback: &str) -> Option<Voice> {
    voices
        .iter()
        .find(|v| v.name == preferred)
        .or_else(|| voices.iter().find(|v| v.id == preferred))
        .or_else(|| voices.iter().find(|v| v.name == fallback))
        .or_else(|| voices.iter().find(|v| v.is_english()))
        .or_else(|| voices.first())
        .cloned()
}

struct Slot {
    backend: Box<dyn SpeechSynthesizer>,
    owner: Option<Uuid>,
}

/// The single synthesizer shared by every speech session.
///
/// Only the session that last claimed it may drive it. Claiming stops
/// whatever the previous owner left speaking or paused.
#[derive(Clone)]
pub struct SharedSynthesizer {
    inner: Arc<Mutex<Slot>>,
}

impl SharedSynthesizer {
    pub fn new(backend: impl SpeechSynthesizer + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Slot {
                backend: Box::new(backend),
                owner: None,
            })),
        }
    }

    /// Make `session` the owner, stopping any utterance in progress
    pub fn claim(&self, session: Uuid) {
        let mut slot = self.inner.lock();
        if let Some(previous) = slot.owner {
            if previous != session {
                info!("Speech session {} preempted by {}", previous, session);
            }
        }
        if slot.backend.is_speaking() {
            slot.backend.stop();
        }
        slot.owner = Some(session);
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.inner.lock().owner
    }

    pub fn is_owned_by(&self, session: Uuid) -> bool {
        self.inner.lock().owner == Some(session)
    }

    pub fn voices(&self) -> Vec<Voice> {
        self.inner.lock().backend.voices()
    }

    /// Run `f` against the backend if `session` still owns it
    fn with_owner<R>(
        &self,
        session: Uuid,
        f: impl FnOnce(&mut dyn SpeechSynthesizer) -> R,
    ) -> Option<R> {
        let mut slot = self.inner.lock();
        if slot.owner != Some(session) {
            debug!("Session {} no longer owns the synthesizer", session);
            return None;
        }
        Some(f(slot.backend.as_mut()))
    }

    /// Speak on behalf of `session`. Returns `Ok(false)` if it lost ownership.
    pub fn speak(
        &self,
        session: Uuid,
        request: SpeechRequest,
        events: Sender<SynthesisEvent>,
    ) -> Result<bool> {
        match self.with_owner(session, |backend| backend.speak(request, events)) {
            Some(result) => result.map(|_| true),
            None => Ok(false),
        }
    }

    pub fn pause(&self, session: Uuid) -> bool {
        self.with_owner(session, |backend| backend.pause()).is_some()
    }

    pub fn resume(&self, session: Uuid) -> bool {
        self.with_owner(session, |backend| backend.resume()).is_some()
    }

    pub fn stop(&self, session: Uuid) -> bool {
        self.with_owner(session, |backend| backend.stop()).is_some()
    }

    /// Whether `session` owns the synthesizer and it is mid-utterance
    pub fn is_speaking_for(&self, session: Uuid) -> bool {
        self.with_owner(session, |backend| backend.is_speaking())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for SharedSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSynthesizer")
            .field("owner", &self.owner())
            .finish()
    }
}
