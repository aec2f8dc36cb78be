//! Multi-part question resolution.
//!
//! A rule with required slots walks `Idle -> AwaitingSlot(..) -> Complete`.
//! Values come from the rule's slot patterns when they recognise something,
//! otherwise an answer is taken verbatim for the slot being asked about.
//! Filled slots are never removed while a request is open.

use edgar_core::config::SlotConfig;
use tracing::debug;

use crate::error::{ContextDesyncError, SlotError};
use crate::matcher::normalize;
use crate::model::Rule;
use crate::navigator::phrase_matches;
use crate::types::{OpenSlots, RuleId, SlotState};

/// Validate that a slot state transition is allowed.
///
/// Valid transitions:
/// - Idle -> AwaitingSlot
/// - Idle -> Complete (every slot recognised in the opening utterance)
/// - AwaitingSlot -> AwaitingSlot (next slot, or the same one re-asked)
/// - AwaitingSlot -> Complete
/// - AwaitingSlot -> Idle (cancelled or interrupted)
/// - Complete -> Idle
pub fn validate_transition(from: &SlotState, to: &SlotState) -> Result<(), SlotError> {
    let valid = matches!(
        (from, to),
        (SlotState::Idle, SlotState::AwaitingSlot(_))
            | (SlotState::Idle, SlotState::Complete)
            | (SlotState::AwaitingSlot(_), SlotState::AwaitingSlot(_))
            | (SlotState::AwaitingSlot(_), SlotState::Complete)
            | (SlotState::AwaitingSlot(_), SlotState::Idle)
            | (SlotState::Complete, SlotState::Idle)
    );

    if valid {
        Ok(())
    } else {
        Err(SlotError::InvalidTransition {
            from: from.clone(),
            to: to.clone(),
        })
    }
}

/// Result of advancing a multi-part rule by one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotStep {
    /// Still missing at least one slot; `prompt` asks for `open.awaiting`.
    Awaiting { open: OpenSlots, prompt: String },
    /// Every slot is filled, in the rule's declared slot order.
    Complete {
        rule_id: RuleId,
        values: Vec<(String, String)>,
    },
}

impl SlotStep {
    pub fn state(&self) -> SlotState {
        match self {
            SlotStep::Awaiting { open, .. } => SlotState::AwaitingSlot(open.awaiting.clone()),
            SlotStep::Complete { .. } => SlotState::Complete,
        }
    }

    pub fn open_slots(&self) -> Option<&OpenSlots> {
        match self {
            SlotStep::Awaiting { open, .. } => Some(open),
            SlotStep::Complete { .. } => None,
        }
    }
}

/// Accumulates slot values for one multi-part rule across turns.
#[derive(Debug, Clone, Default)]
pub struct MultiQaResolver {
    cancel_phrases: Vec<String>,
}

impl MultiQaResolver {
    pub fn new(config: &SlotConfig) -> Self {
        Self {
            cancel_phrases: config
                .cancel_phrases
                .iter()
                .map(|p| normalize(p))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Start `rule` from the utterance that matched it.
    ///
    /// Any slot whose pattern recognises a value in `utterance` is filled
    /// immediately.
    pub fn begin(&self, rule: &Rule, utterance: &str) -> Result<SlotStep, SlotError> {
        if !rule.requires_slots() {
            return Err(SlotError::NotSlotted(rule.id().clone()));
        }
        let mut filled = Vec::new();
        extract_recognised(rule, utterance, &mut filled);
        let step = next_step(rule, filled);
        validate_transition(&SlotState::Idle, &step.state())?;
        debug!(rule_id = %rule.id(), state = %step.state(), "Slot request opened");
        Ok(step)
    }

    /// Record `utterance` as the answer to the awaited slot.
    ///
    /// An answer with no usable text re-asks the same slot.
    pub fn answer(
        &self,
        rule: &Rule,
        open: &OpenSlots,
        utterance: &str,
    ) -> Result<SlotStep, SlotError> {
        let from = SlotState::of(Some(open));
        let spec = rule
            .slot(&open.awaiting)
            .ok_or_else(|| ContextDesyncError::MissingSlot {
                rule: rule.id().clone(),
                slot: open.awaiting.clone(),
            })?;

        let mut filled = open.filled.clone();
        let value = spec.extract(utterance).or_else(|| plain_answer(utterance));
        if let Some(value) = value {
            filled.push((open.awaiting.clone(), value));
            extract_recognised(rule, utterance, &mut filled);
        }

        let step = next_step(rule, filled);
        validate_transition(&from, &step.state())?;
        debug!(rule_id = %rule.id(), from = %from, to = %step.state(), "Slot answered");
        Ok(step)
    }

    /// Ask for the awaited slot again without recording anything.
    pub fn reask(&self, rule: &Rule, open: &OpenSlots) -> Result<SlotStep, SlotError> {
        let spec = rule
            .slot(&open.awaiting)
            .ok_or_else(|| ContextDesyncError::MissingSlot {
                rule: rule.id().clone(),
                slot: open.awaiting.clone(),
            })?;
        let step = SlotStep::Awaiting {
            open: open.clone(),
            prompt: spec.prompt.clone(),
        };
        validate_transition(&SlotState::of(Some(open)), &step.state())?;
        debug!(rule_id = %rule.id(), slot = %open.awaiting, "Slot re-asked");
        Ok(step)
    }

    /// Whether `utterance` asks to abandon the open request.
    pub fn is_cancel(&self, utterance: &str) -> bool {
        let normalized = normalize(utterance);
        self.cancel_phrases
            .iter()
            .any(|p| phrase_matches(&normalized, p))
    }

    /// Abandon `open`, returning the rule it belonged to.
    pub fn cancel(&self, open: &OpenSlots) -> Result<RuleId, SlotError> {
        validate_transition(&SlotState::of(Some(open)), &SlotState::Idle)?;
        debug!(rule_id = %open.rule_id, "Slot request abandoned");
        Ok(open.rule_id.clone())
    }
}

/// Fill every still-empty slot whose pattern recognises a value.
fn extract_recognised(rule: &Rule, utterance: &str, filled: &mut Vec<(String, String)>) {
    for spec in rule.slots() {
        if filled.iter().any(|(name, _)| name == &spec.name) {
            continue;
        }
        if let Some(value) = spec.extract(utterance) {
            filled.push((spec.name.clone(), value));
        }
    }
}

fn next_step(rule: &Rule, filled: Vec<(String, String)>) -> SlotStep {
    let missing = rule
        .slots()
        .iter()
        .find(|spec| !filled.iter().any(|(name, _)| name == &spec.name));

    match missing {
        Some(spec) => SlotStep::Awaiting {
            open: OpenSlots {
                rule_id: rule.id().clone(),
                filled,
                awaiting: spec.name.clone(),
            },
            prompt: spec.prompt.clone(),
        },
        None => {
            let values = rule
                .slots()
                .iter()
                .filter_map(|spec| {
                    filled
                        .iter()
                        .find(|(name, _)| name == &spec.name)
                        .map(|(name, value)| (name.clone(), value.clone()))
                })
                .collect();
            SlotStep::Complete {
                rule_id: rule.id().clone(),
                values,
            }
        }
    }
}

/// Whole utterance as a slot value, without surrounding space or trailing
/// sentence punctuation.
fn plain_answer(utterance: &str) -> Option<String> {
    let value = utterance
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim_end();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
