use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EdgarError, Result};

/// Top-level configuration for Edgar.
///
/// Loaded from `config.toml` next to the models directory by default. Each
/// section corresponds to one stage of the turn pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgarConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub responses: ResponseConfig,
    #[serde(default)]
    pub slots: SlotConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

impl EdgarConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EdgarConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EdgarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check that every score-valued setting lies in `[0, 1]` and that
    /// matching keeps at least one candidate.
    pub fn validate(&self) -> Result<()> {
        if self.matching.max_candidates == 0 {
            return Err(EdgarError::Config(
                "matching.max_candidates must be at least 1".to_string(),
            ));
        }
        let scores = [
            ("matching.threshold", self.matching.threshold),
            ("matching.follow_up_bias", self.matching.follow_up_bias),
            ("slots.interrupt_threshold", self.slots.interrupt_threshold),
        ];
        for (name, value) in scores {
            if !(0.0..=1.0).contains(&value) {
                return Err(EdgarError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory holding `<name>.json` model documents.
    pub models_dir: String,
    /// Model loaded when none is named on the command line.
    pub default_model: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            models_dir: "models".to_string(),
            default_model: None,
        }
    }
}

/// Sentence matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum similarity for a rule without its own threshold.
    pub threshold: f64,
    /// Amount subtracted from the threshold when searching the followers of
    /// the active node, so short on-topic replies still resolve locally.
    pub follow_up_bias: f64,
    /// Maximum number of ranked candidates kept per search.
    pub max_candidates: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            follow_up_bias: 0.1,
            max_candidates: 5,
        }
    }
}

/// Conversation context configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Number of past turns retained in the context history.
    pub history_limit: usize,
    /// Consecutive fallbacks after which the active group is dropped.
    /// Zero keeps the group indefinitely.
    pub max_consecutive_fallbacks: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_limit: 6,
            max_consecutive_fallbacks: 3,
        }
    }
}

/// How one response variant is chosen among several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Always the first authored variant.
    First,
    /// Cycle through variants by turn number.
    RoundRobin,
    /// Pseudo-random, reproducible from `seed` and the turn number.
    Seeded,
}

/// Response variant selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub selection: SelectionPolicy,
    pub seed: u64,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            selection: SelectionPolicy::Seeded,
            seed: 42,
        }
    }
}

/// Multi-part question configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// A different rule matching at or above this score abandons the open
    /// slot set and starts fresh.
    pub interrupt_threshold: f64,
    /// Phrases that abandon the open slot set.
    pub cancel_phrases: Vec<String>,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            interrupt_threshold: 1.0,
            cancel_phrases: vec![
                "cancel".to_string(),
                "never mind".to_string(),
                "stop".to_string(),
            ],
        }
    }
}

/// Follow-up tree navigation commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub enabled: bool,
    pub back_phrases: Vec<String>,
    pub options_phrases: Vec<String>,
    pub exit_phrases: Vec<String>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            back_phrases: ["go back", "back", "take me back", "previous"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            options_phrases: [
                "what are my options",
                "what can i ask",
                "show options",
                "what are the choices",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exit_phrases: ["exit", "quit", "new topic", "start over", "main menu"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}
