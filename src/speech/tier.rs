//! Named speech speed tiers

use crate::{ReaderError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Discrete speaking speed chosen in settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTier {
    VerySlow,
    Slow,
    #[default]
    Normal,
    Fast,
    VeryFast,
}

impl SpeedTier {
    pub const ALL: [SpeedTier; 5] = [
        SpeedTier::VerySlow,
        SpeedTier::Slow,
        SpeedTier::Normal,
        SpeedTier::Fast,
        SpeedTier::VeryFast,
    ];

    /// Normalized synthesis rate (0.0 - 1.0)
    pub fn rate(&self) -> f64 {
        match self {
            SpeedTier::VerySlow => 0.2,
            SpeedTier::Slow => 0.35,
            SpeedTier::Normal => 0.5,
            SpeedTier::Fast => 0.65,
            SpeedTier::VeryFast => 0.75,
        }
    }

    /// Label shown in the settings screen
    pub fn label(&self) -> &'static str {
        match self {
            SpeedTier::VerySlow => "Very Slow",
            SpeedTier::Slow => "Slow",
            SpeedTier::Normal => "Normal",
            SpeedTier::Fast => "Fast",
            SpeedTier::VeryFast => "Very Fast",
        }
    }

    /// Parse a stored label, falling back to `Normal` for anything unknown
    pub fn from_label_or_default(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl FromStr for SpeedTier {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "veryslow" => Ok(SpeedTier::VerySlow),
            "slow" => Ok(SpeedTier::Slow),
            "normal" => Ok(SpeedTier::Normal),
            "fast" => Ok(SpeedTier::Fast),
            "veryfast" => Ok(SpeedTier::VeryFast),
            _ => Err(ReaderError::ConfigError(format!("Unknown speech speed: {}", s))),
        }
    }
}

impl std::fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_are_ordered() {
        let rates: Vec<f64> = SpeedTier::ALL.iter().map(|t| t.rate()).collect();
        assert_eq!(rates, vec![0.2, 0.35, 0.5, 0.65, 0.75]);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("Very Slow".parse::<SpeedTier>().unwrap(), SpeedTier::VerySlow);
        assert_eq!("very-fast".parse::<SpeedTier>().unwrap(), SpeedTier::VeryFast);
        assert_eq!("NORMAL".parse::<SpeedTier>().unwrap(), SpeedTier::Normal);
        assert!("ludicrous".parse::<SpeedTier>().is_err());
    }

    #[test]
    fn test_label_round_trip_and_fallback() {
        for tier in SpeedTier::ALL {
            assert_eq!(SpeedTier::from_label_or_default(tier.label()), tier);
        }
        assert_eq!(SpeedTier::from_label_or_default("Warp"), SpeedTier::Normal);
    }
}
