//! User settings consumed by the reading engines
//!
//! The engines only read settings, once, when a session starts. Where the
//! values are persisted is up to the host application.

use crate::speech::tier::SpeedTier;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Voice and speed chosen for text-to-speech
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// Voice display name
    pub voice: String,
    pub tier: SpeedTier,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            voice: "Daniel".to_string(),
            tier: SpeedTier::Normal,
        }
    }
}

/// Read access to the settings collaborator
pub trait SettingsProvider: Send + Sync {
    fn speech_settings(&self) -> SpeechSettings;
}

/// In-memory settings store
#[derive(Clone, Debug, Default)]
pub struct StaticSettings {
    speech: Arc<RwLock<SpeechSettings>>,
}

impl StaticSettings {
    pub fn new(speech: SpeechSettings) -> Self {
        Self {
            speech: Arc::new(RwLock::new(speech)),
        }
    }

    pub fn set_voice(&self, voice: impl Into<String>) {
        self.speech.write().voice = voice.into();
    }

    pub fn set_tier(&self, tier: SpeedTier) {
        self.speech.write().tier = tier;
    }
}

impl SettingsProvider for StaticSettings {
    fn speech_settings(&self) -> SpeechSettings {
        self.speech.read().clone()
    }
}
