//! Query orchestrator: the single entry point for a conversational turn.
//!
//! Routes an utterance through the slot resolver, navigation commands, and
//! the follow-up navigator, then hands the outcome to the context tracker.

use std::sync::LazyLock;

use edgar_core::config::EdgarConfig;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::context::{check_consistency, describe, ContextTracker, TurnOutcome};
use crate::matcher::SentenceMatcher;
use crate::model::{Model, Rule};
use crate::modules::{ModuleRegistry, ModuleRequest};
use crate::navigator::{FollowUpNavigator, NavigationCommand, NavigationCommands, Resolution};
use crate::response::{
    back_reply, exit_reply, options_reply, render_template, ResponseSelector,
    SLOT_CANCELLED_REPLY,
};
use crate::slots::{MultiQaResolver, SlotStep};
use crate::types::{Context, MatchTier, OpenSlots, QueryResponse, ResponseKind};

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("Invalid sentence regex"));

static CONNECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:and|then|also)\s+").expect("Invalid connective regex")
});

/// Split a compound utterance into the questions it contains.
///
/// Splits on sentence terminators followed by whitespace or the end of the
/// input, so decimals stay whole, then on the connectives "and", "then",
/// and "also". Connective-split parts of two characters or fewer are
/// dropped. Returns the trimmed input when nothing survives.
pub fn split_utterance(utterance: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for sentence in SENTENCE_BREAK.split(utterance) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if CONNECTIVE.is_match(sentence) {
            parts.extend(
                CONNECTIVE
                    .split(sentence)
                    .map(str::trim)
                    .filter(|part| part.chars().count() > 2)
                    .map(str::to_string),
            );
        } else {
            parts.push(sentence.to_string());
        }
    }
    if parts.is_empty() {
        let whole = utterance.trim();
        if !whole.is_empty() {
            parts.push(whole.to_string());
        }
    }
    parts
}

/// Runs one turn at a time against a model snapshot.
///
/// Holds no per-session state: the context goes in and a new context comes
/// out, so one orchestrator can serve any number of sessions.
#[derive(Debug, Clone)]
pub struct QueryOrchestrator {
    navigator: FollowUpNavigator,
    commands: NavigationCommands,
    resolver: MultiQaResolver,
    tracker: ContextTracker,
    selector: ResponseSelector,
    modules: ModuleRegistry,
    interrupt_threshold: f64,
}

impl QueryOrchestrator {
    pub fn new(config: &EdgarConfig, modules: ModuleRegistry) -> Self {
        let matcher = SentenceMatcher::new(config.matching.max_candidates);
        Self {
            navigator: FollowUpNavigator::new(
                matcher,
                config.matching.threshold,
                config.matching.follow_up_bias,
            ),
            commands: NavigationCommands::from_config(&config.navigation),
            resolver: MultiQaResolver::new(&config.slots),
            tracker: ContextTracker::new(
                config.context.history_limit,
                config.context.max_consecutive_fallbacks,
            ),
            selector: ResponseSelector::from_config(&config.responses),
            modules,
            interrupt_threshold: config.slots.interrupt_threshold,
        }
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Handle one utterance.
    ///
    /// Never fails: an unmatched utterance, a missing module, or a context
    /// that no longer fits the model all end in a normal response.
    pub fn handle(&self, utterance: &str, context: &Context, model: &Model) -> (QueryResponse, Context) {
        if let Err(err) = check_consistency(context, model) {
            warn!(error = %err, position = %describe(context), "Context out of sync with model, resetting");
            return self.fall_back(utterance, &Context::default(), model);
        }

        if let Some(open) = &context.open_slots {
            return self.continue_slots(utterance, open, context, model);
        }

        self.route(utterance, context, model)
    }

    /// Handle every question in a compound utterance in order, threading
    /// the context through each.
    pub fn handle_many(
        &self,
        utterance: &str,
        context: &Context,
        model: &Model,
    ) -> (Vec<QueryResponse>, Context) {
        let mut current = context.clone();
        let mut responses = Vec::new();
        for part in split_utterance(utterance) {
            let (response, next) = self.handle(&part, &current, model);
            responses.push(response);
            current = next;
        }
        (responses, current)
    }

    /// Navigation commands, then the follow-up navigator.
    fn route(&self, utterance: &str, context: &Context, model: &Model) -> (QueryResponse, Context) {
        if context.active_node.is_some()
            && self.commands.is_enabled()
            && !self.navigator.is_exact_trigger(utterance, model)
        {
            if let Some(command) = self.commands.detect(utterance) {
                return self.navigate(command, utterance, context, model);
            }
        }

        match self.navigator.resolve(utterance, context, model) {
            Some(resolution) => self.answer(resolution, utterance, context, model),
            None => self.fall_back(utterance, context, model),
        }
    }

    fn answer(
        &self,
        resolution: Resolution,
        utterance: &str,
        context: &Context,
        model: &Model,
    ) -> (QueryResponse, Context) {
        let Resolution { candidate, source } = resolution;
        let Some(rule) = model.rule(&candidate.rule_id) else {
            return self.fall_back(utterance, context, model);
        };

        if !rule.requires_slots() {
            let text = self.compose(rule, utterance, &[], context.turn_count);
            let response = QueryResponse {
                text,
                confidence: candidate.score,
                rule_id: Some(candidate.rule_id.clone()),
                kind: ResponseKind::Answer,
                source: Some(source),
                tier: Some(MatchTier::from_score(candidate.score)),
            };
            let next = self.tracker.apply(
                context,
                &TurnOutcome::Matched {
                    candidate,
                    source,
                    utterance: utterance.to_string(),
                },
            );
            return (response, next);
        }

        let step = match self.resolver.begin(rule, utterance) {
            Ok(step) => step,
            Err(err) => {
                warn!(rule_id = %rule.id(), error = %err, "Could not open slot request");
                return self.fall_back(utterance, context, model);
            }
        };
        let (text, kind) = self.slot_reply(rule, utterance, &step, context.turn_count);
        let response = QueryResponse {
            text,
            confidence: candidate.score,
            rule_id: Some(candidate.rule_id.clone()),
            kind,
            source: Some(source),
            tier: Some(MatchTier::from_score(candidate.score)),
        };
        let next = self.tracker.apply(
            context,
            &TurnOutcome::SlotStarted {
                candidate,
                source,
                open: step.open_slots().cloned(),
                utterance: utterance.to_string(),
            },
        );
        (response, next)
    }

    /// An utterance arriving while a slot request is open.
    ///
    /// A cancel phrase abandons the request. A different rule matching at or
    /// above the interrupt threshold abandons it and is answered normally.
    /// An exact trigger of the open rule re-asks the awaited slot. Anything
    /// else is taken as the answer to the awaited slot.
    fn continue_slots(
        &self,
        utterance: &str,
        open: &OpenSlots,
        context: &Context,
        model: &Model,
    ) -> (QueryResponse, Context) {
        let Some(rule) = model.rule(&open.rule_id) else {
            return self.fall_back(utterance, &Context::default(), model);
        };

        if self.resolver.is_cancel(utterance) {
            return match self.resolver.cancel(open) {
                Ok(rule_id) => {
                    let response = QueryResponse {
                        text: SLOT_CANCELLED_REPLY.to_string(),
                        confidence: 1.0,
                        rule_id: Some(rule_id.clone()),
                        kind: ResponseKind::SlotCancelled,
                        source: None,
                        tier: None,
                    };
                    let next = self.tracker.apply(
                        context,
                        &TurnOutcome::SlotCancelled {
                            rule_id,
                            utterance: utterance.to_string(),
                        },
                    );
                    (response, next)
                }
                Err(err) => self.reset_after(err, utterance, context, model),
            };
        }

        let mut repeated = false;
        if let Some(candidate) = self.navigator.resolve_global(utterance, model) {
            if candidate.rule_id == open.rule_id {
                repeated = candidate.score >= 1.0;
            } else if candidate.score >= self.interrupt_threshold {
                if let Err(err) = self.resolver.cancel(open) {
                    return self.reset_after(err, utterance, context, model);
                }
                info!(
                    abandoned = %open.rule_id,
                    rule_id = %candidate.rule_id,
                    score = candidate.score,
                    "Open slot request interrupted by new match"
                );
                let cleared = Context {
                    open_slots: None,
                    ..context.clone()
                };
                return self.route(utterance, &cleared, model);
            }
        }

        // Repeating the open rule's own trigger is not an answer.
        let step = if repeated {
            self.resolver.reask(rule, open)
        } else {
            self.resolver.answer(rule, open, utterance)
        };
        let step = match step {
            Ok(step) => step,
            Err(err) => return self.reset_after(err, utterance, context, model),
        };
        let (text, kind) = self.slot_reply(rule, utterance, &step, context.turn_count);
        let response = QueryResponse {
            text,
            confidence: 1.0,
            rule_id: Some(rule.id().clone()),
            kind,
            source: None,
            tier: None,
        };
        let next = self.tracker.apply(
            context,
            &TurnOutcome::SlotProgress {
                rule_id: rule.id().clone(),
                open: step.open_slots().cloned(),
                utterance: utterance.to_string(),
            },
        );
        (response, next)
    }

    fn slot_reply(
        &self,
        rule: &Rule,
        utterance: &str,
        step: &SlotStep,
        turn: u64,
    ) -> (String, ResponseKind) {
        match step {
            SlotStep::Awaiting { prompt, .. } => (prompt.clone(), ResponseKind::SlotPrompt),
            SlotStep::Complete { values, .. } => (
                self.compose(rule, utterance, values, turn),
                ResponseKind::SlotComplete,
            ),
        }
    }

    fn navigate(
        &self,
        command: NavigationCommand,
        utterance: &str,
        context: &Context,
        model: &Model,
    ) -> (QueryResponse, Context) {
        let utterance = utterance.to_string();
        let (text, outcome) = match command {
            NavigationCommand::Back => {
                let label = context
                    .path
                    .last()
                    .and_then(|id| model.rule(id))
                    .map(Rule::label);
                (back_reply(label), TurnOutcome::NavigatedBack { utterance })
            }
            NavigationCommand::Options => {
                let labels: Vec<&str> = context
                    .active_node
                    .iter()
                    .flat_map(|node| model.followers(node))
                    .map(Rule::label)
                    .collect();
                (options_reply(&labels), TurnOutcome::ListedOptions { utterance })
            }
            NavigationCommand::Exit => (exit_reply(), TurnOutcome::ExitedTree { utterance }),
        };
        debug!(command = ?command, position = %describe(context), "Navigation command");

        let next = self.tracker.apply(context, &outcome);
        let response = QueryResponse {
            text,
            confidence: 1.0,
            rule_id: next.active_node.clone(),
            kind: ResponseKind::Navigation,
            source: None,
            tier: None,
        };
        (response, next)
    }

    fn fall_back(&self, utterance: &str, context: &Context, model: &Model) -> (QueryResponse, Context) {
        let text = self
            .selector
            .select(model.fallback_responses(), context.turn_count)
            .unwrap_or_default()
            .to_string();
        let next = self.tracker.apply(
            context,
            &TurnOutcome::Fallback {
                utterance: utterance.to_string(),
            },
        );
        debug!(position = %describe(&next), fallbacks = next.consecutive_fallbacks, "No match, fallback response");
        let response = QueryResponse {
            text,
            confidence: 0.0,
            rule_id: None,
            kind: ResponseKind::Fallback,
            source: None,
            tier: None,
        };
        (response, next)
    }

    fn reset_after(
        &self,
        err: impl std::fmt::Display,
        utterance: &str,
        context: &Context,
        model: &Model,
    ) -> (QueryResponse, Context) {
        warn!(error = %err, position = %describe(context), "Slot request out of sync, resetting context");
        self.fall_back(utterance, &Context::default(), model)
    }

    /// Response text for a matched rule: the module override when one is
    /// produced, otherwise a selected static variant with slots filled in.
    fn compose(&self, rule: &Rule, utterance: &str, slots: &[(String, String)], turn: u64) -> String {
        if let Some(key) = rule.module() {
            let request = ModuleRequest {
                rule_id: rule.id(),
                utterance,
                slots,
            };
            match self.modules.dispatch(key, &request) {
                Ok(Some(text)) => return text,
                Ok(None) => debug!(module = key, rule_id = %rule.id(), "Module declined, using static response"),
                Err(err) => warn!(module = key, rule_id = %rule.id(), error = %err, "Module call failed, using static response"),
            }
        }
        let template = self.selector.select(rule.responses(), turn).unwrap_or_default();
        render_template(template, slots)
    }
}

// =============================================================================
// Tests
// =============================================================================
