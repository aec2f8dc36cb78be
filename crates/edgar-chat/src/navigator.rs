//! Follow-up tree navigation.
//!
//! Search runs in three widening scopes: the followers of the active node,
//! then the active group, then the whole model. The first scope that yields
//! a candidate wins. Explicit navigation commands ("go back", "what are my
//! options", "start over") are recognised separately by
//! [`NavigationCommands::detect`].

use edgar_core::config::NavigationConfig;
use tracing::debug;

use crate::matcher::{normalize, SentenceMatcher};
use crate::model::Model;
use crate::types::{Context, MatchCandidate, MatchSource};

/// A resolved match and the scope that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub candidate: MatchCandidate,
    pub source: MatchSource,
}

/// Resolves an utterance against the model, local scopes first.
#[derive(Debug, Clone)]
pub struct FollowUpNavigator {
    matcher: SentenceMatcher,
    threshold: f64,
    follow_up_bias: f64,
}

impl FollowUpNavigator {
    pub fn new(matcher: SentenceMatcher, threshold: f64, follow_up_bias: f64) -> Self {
        Self {
            matcher,
            threshold,
            follow_up_bias,
        }
    }

    /// Resolve `utterance` given the current position in `context`.
    ///
    /// Returns `None` when no scope produced a candidate; the caller answers
    /// with a fallback.
    pub fn resolve(&self, utterance: &str, context: &Context, model: &Model) -> Option<Resolution> {
        if let Some(node) = &context.active_node {
            let local = self.matcher.best(
                utterance,
                model.followers(node),
                self.threshold,
                self.follow_up_bias,
            );
            if let Some(candidate) = local {
                debug!(node = %node, rule_id = %candidate.rule_id, score = candidate.score, "Resolved among follow-ups");
                return Some(Resolution {
                    candidate,
                    source: MatchSource::FollowUp,
                });
            }
        }

        if let Some(group) = context.active_group.as_ref().and_then(|id| model.group(id)) {
            let in_group = self
                .matcher
                .best(utterance, model.group_rules(group), self.threshold, 0.0);
            if let Some(candidate) = in_group {
                debug!(group = %group.id(), rule_id = %candidate.rule_id, score = candidate.score, "Resolved within group");
                return Some(Resolution {
                    candidate,
                    source: MatchSource::Group,
                });
            }
        }

        self.resolve_global(utterance, model).map(|candidate| {
            debug!(rule_id = %candidate.rule_id, score = candidate.score, "Resolved globally");
            Resolution {
                candidate,
                source: MatchSource::Global,
            }
        })
    }

    /// Best candidate across every rule of the model, ignoring context.
    pub fn resolve_global(&self, utterance: &str, model: &Model) -> Option<MatchCandidate> {
        self.matcher
            .best(utterance, model.rules(), self.threshold, 0.0)
    }

    /// Whether any rule in the model has a trigger equal to `utterance`
    /// after normalization.
    pub fn is_exact_trigger(&self, utterance: &str, model: &Model) -> bool {
        let normalized = normalize(utterance);
        model
            .rules()
            .any(|rule| rule.triggers().iter().any(|t| t.normalized == normalized))
    }
}

impl Default for FollowUpNavigator {
    fn default() -> Self {
        Self::new(SentenceMatcher::default(), 0.6, 0.1)
    }
}

// =============================================================================
// Navigation commands
// =============================================================================

/// An explicit request to move within the follow-up tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationCommand {
    Back,
    Options,
    Exit,
}

/// Normalized command phrases.
///
/// A single-word phrase must be the whole utterance; a longer phrase may
/// appear anywhere as a contiguous run of words.
#[derive(Debug, Clone, Default)]
pub struct NavigationCommands {
    enabled: bool,
    back: Vec<String>,
    options: Vec<String>,
    exit: Vec<String>,
}

impl NavigationCommands {
    pub fn from_config(config: &NavigationConfig) -> Self {
        let prepare = |phrases: &[String]| -> Vec<String> {
            phrases
                .iter()
                .map(|p| normalize(p))
                .filter(|p| !p.is_empty())
                .collect()
        };
        Self {
            enabled: config.enabled,
            back: prepare(&config.back_phrases),
            options: prepare(&config.options_phrases),
            exit: prepare(&config.exit_phrases),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Recognise a navigation command in `utterance`.
    ///
    /// Back is checked first, then options, then exit.
    pub fn detect(&self, utterance: &str) -> Option<NavigationCommand> {
        if !self.enabled {
            return None;
        }
        let normalized = normalize(utterance);
        if normalized.is_empty() {
            return None;
        }
        [
            (NavigationCommand::Back, &self.back),
            (NavigationCommand::Options, &self.options),
            (NavigationCommand::Exit, &self.exit),
        ]
        .into_iter()
        .find(|(_, phrases)| phrases.iter().any(|p| phrase_matches(&normalized, p)))
        .map(|(command, _)| command)
    }
}

/// Whole-word phrase test over normalized text.
pub(crate) fn phrase_matches(normalized: &str, phrase: &str) -> bool {
    if phrase.contains(' ') {
        format!(" {} ", normalized).contains(&format!(" {} ", phrase))
    } else {
        normalized == phrase
    }
}

// =============================================================================
// Tests
// =============================================================================
