//! Configuration for the reading engines
//!
//! Provides centralized configuration for all reading modes. Every field has
//! a default, so a TOML file only needs the values it changes:
//!
//! ```toml
//! [speed_read]
//! default_wpm = 250
//!
//! [speech]
//! default_tier = "fast"
//! reset_policy = "stop_and_wait"
//! ```

use crate::reading::scroll::{MAX_SCROLL_SPEED, MIN_SCROLL_SPEED};
use crate::reading::speed::{MAX_WPM, MIN_WPM};
use crate::speech::tier::SpeedTier;
use crate::{ReaderError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// What the speech engine does after `reset`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Stop and immediately speak the text again from the start
    #[default]
    Restart,
    /// Stop and wait for an explicit start, like the other reading modes
    StopAndWait,
}

/// Speed reading defaults
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeedReadConfig {
    /// Words per minute for a new engine
    pub default_wpm: f64,

    /// Words moved by skip forward/backward
    pub skip_words: usize,

    /// Slider granularity in words per minute
    pub wpm_step: f64,
}

impl Default for SpeedReadConfig {
    fn default() -> Self {
        Self {
            default_wpm: 100.0,
            skip_words: 10,
            wpm_step: 5.0,
        }
    }
}

/// Auto-scroll defaults
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Pixels per second for a new engine
    pub default_speed: f64,

    /// Animation ticks per second
    pub frame_rate: u32,

    /// Slider granularity in pixels per second
    pub speed_step: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            default_speed: 100.0,
            frame_rate: 60,
            speed_step: 5.0,
        }
    }
}

/// Speech playback defaults
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Voice name used when the settings voice is not installed
    pub default_voice: String,

    /// Tier used when settings do not provide one
    pub default_tier: SpeedTier,

    /// Behaviour of `reset`
    pub reset_policy: ResetPolicy,

    /// How often synthesizer callbacks are drained on the host loop
    pub event_pump_hz: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            default_voice: "Daniel".to_string(),
            default_tier: SpeedTier::Normal,
            reset_policy: ResetPolicy::Restart,
            event_pump_hz: 60,
        }
    }
}

/// Configuration for all reading modes
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub speed_read: SpeedReadConfig,
    pub scroll: ScrollConfig,
    pub speech: SpeechConfig,
}

impl ReaderConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ReaderConfig = toml::from_str(text)
            .map_err(|e| ReaderError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Set the default speed reading rate
    pub fn with_wpm(mut self, wpm: f64) -> Self {
        self.speed_read.default_wpm = wpm;
        self
    }

    /// Set the default scroll speed
    pub fn with_scroll_speed(mut self, speed: f64) -> Self {
        self.scroll.default_speed = speed;
        self
    }

    /// Set the default speech tier
    pub fn with_speech_tier(mut self, tier: SpeedTier) -> Self {
        self.speech.default_tier = tier;
        self
    }

    /// Set what speech `reset` does
    pub fn with_reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.speech.reset_policy = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let wpm = self.speed_read.default_wpm;
        if !(MIN_WPM..=MAX_WPM).contains(&wpm) {
            return Err(ReaderError::ConfigError(format!(
                "default_wpm {} outside {}-{}",
                wpm, MIN_WPM, MAX_WPM
            )));
        }

        if self.speed_read.skip_words == 0 {
            return Err(ReaderError::ConfigError("skip_words must be at least 1".into()));
        }

        let speed = self.scroll.default_speed;
        if !(MIN_SCROLL_SPEED..=MAX_SCROLL_SPEED).contains(&speed) {
            return Err(ReaderError::ConfigError(format!(
                "default_speed {} outside {}-{}",
                speed, MIN_SCROLL_SPEED, MAX_SCROLL_SPEED
            )));
        }

        if self.scroll.frame_rate == 0 {
            return Err(ReaderError::ConfigError("frame_rate must be positive".into()));
        }

        if self.speech.event_pump_hz == 0 {
            return Err(ReaderError::ConfigError("event_pump_hz must be positive".into()));
        }

        if self.speed_read.wpm_step < 0.0 || self.scroll.speed_step < 0.0 {
            return Err(ReaderError::ConfigError("slider steps cannot be negative".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.speed_read.default_wpm, 100.0);
        assert_eq!(config.speed_read.skip_words, 10);
        assert_eq!(config.scroll.frame_rate, 60);
        assert_eq!(config.speech.default_voice, "Daniel");
        assert_eq!(config.speech.reset_policy, ResetPolicy::Restart);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ReaderConfig::default()
            .with_wpm(300.0)
            .with_scroll_speed(40.0)
            .with_speech_tier(SpeedTier::Fast)
            .with_reset_policy(ResetPolicy::StopAndWait);

        assert_eq!(config.speed_read.default_wpm, 300.0);
        assert_eq!(config.scroll.default_speed, 40.0);
        assert_eq!(config.speech.default_tier, SpeedTier::Fast);
        assert_eq!(config.speech.reset_policy, ResetPolicy::StopAndWait);
    }

    #[test]
    fn test_partial_toml() {
        let config = ReaderConfig::from_toml_str(
            r#"
            [speed_read]
            default_wpm = 250

            [speech]
            default_tier = "very_fast"
            reset_policy = "stop_and_wait"
            "#,
        )
        .unwrap();

        assert_eq!(config.speed_read.default_wpm, 250.0);
        assert_eq!(config.speed_read.skip_words, 10);
        assert_eq!(config.speech.default_tier, SpeedTier::VeryFast);
        assert_eq!(config.speech.reset_policy, ResetPolicy::StopAndWait);
        assert_eq!(config.scroll, ScrollConfig::default());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        assert!(ReaderConfig::default().with_wpm(1000.0).validate().is_err());
        assert!(ReaderConfig::default().with_scroll_speed(5.0).validate().is_err());
        assert!(ReaderConfig::from_toml_str("[scroll]\nframe_rate = 0").is_err());
        assert!(ReaderConfig::from_toml_str("[speed_read]\nskip_words = 0").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scroll]\ndefault_speed = 150").unwrap();

        let config = ReaderConfig::load(file.path()).unwrap();
        assert_eq!(config.scroll.default_speed, 150.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReaderConfig::load("/nonexistent/reader.toml").unwrap_err();
        assert!(matches!(err, ReaderError::IOError(_)));
    }
}
