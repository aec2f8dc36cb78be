//! Conversation context tracking.
//!
//! [`ContextTracker::apply`] is the only way a [`Context`] changes: it takes
//! the previous context and the outcome of one turn and returns the next
//! context, trimming the history to the configured window.

use tracing::{debug, info};

use crate::error::ContextDesyncError;
use crate::model::Model;
use crate::types::{Context, MatchCandidate, MatchSource, OpenSlots, RuleId, Turn, TurnKind};

/// What a turn produced, as far as the context is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// An ordinary rule matched.
    Matched {
        candidate: MatchCandidate,
        source: MatchSource,
        utterance: String,
    },
    /// Nothing cleared the threshold.
    Fallback { utterance: String },
    /// A multi-part rule matched. `open` is `None` when the utterance
    /// already supplied every slot.
    SlotStarted {
        candidate: MatchCandidate,
        source: MatchSource,
        open: Option<OpenSlots>,
        utterance: String,
    },
    /// An answer to the awaited slot. `open` is `None` once complete.
    SlotProgress {
        rule_id: RuleId,
        open: Option<OpenSlots>,
        utterance: String,
    },
    /// The open slot request was abandoned.
    SlotCancelled { rule_id: RuleId, utterance: String },
    /// Return to the previous node of the tree path.
    NavigatedBack { utterance: String },
    /// The followers of the active node were listed.
    ListedOptions { utterance: String },
    /// Leave the current tree and topic.
    ExitedTree { utterance: String },
}

/// Applies turn outcomes to contexts.
#[derive(Debug, Clone)]
pub struct ContextTracker {
    /// Maximum number of past turns kept in `history`.
    pub history_limit: usize,
    /// Consecutive fallbacks tolerated before the active group is dropped.
    /// Zero disables the reset.
    pub max_consecutive_fallbacks: u32,
}

impl ContextTracker {
    pub fn new(history_limit: usize, max_consecutive_fallbacks: u32) -> Self {
        Self {
            history_limit,
            max_consecutive_fallbacks,
        }
    }

    /// Produce the context that follows `context` after `outcome`.
    pub fn apply(&self, context: &Context, outcome: &TurnOutcome) -> Context {
        let mut next = context.clone();
        next.turn_count += 1;

        let turn = match outcome {
            TurnOutcome::Matched {
                candidate,
                source,
                utterance,
            } => {
                enter_rule(&mut next, candidate, *source);
                next.consecutive_fallbacks = 0;
                Turn {
                    utterance: utterance.clone(),
                    rule_id: Some(candidate.rule_id.clone()),
                    score: candidate.score,
                    kind: TurnKind::Matched(*source),
                }
            }
            TurnOutcome::Fallback { utterance } => {
                self.fall_back(&mut next);
                Turn {
                    utterance: utterance.clone(),
                    rule_id: None,
                    score: 0.0,
                    kind: TurnKind::Fallback,
                }
            }
            TurnOutcome::SlotStarted {
                candidate,
                source,
                open,
                utterance,
            } => {
                enter_rule(&mut next, candidate, *source);
                next.consecutive_fallbacks = 0;
                next.open_slots = open.clone();
                Turn {
                    utterance: utterance.clone(),
                    rule_id: Some(candidate.rule_id.clone()),
                    score: candidate.score,
                    kind: if open.is_some() {
                        TurnKind::SlotPrompt
                    } else {
                        TurnKind::SlotFilled
                    },
                }
            }
            TurnOutcome::SlotProgress {
                rule_id,
                open,
                utterance,
            } => {
                next.open_slots = open.clone();
                next.consecutive_fallbacks = 0;
                Turn {
                    utterance: utterance.clone(),
                    rule_id: Some(rule_id.clone()),
                    score: 1.0,
                    kind: if open.is_some() {
                        TurnKind::SlotPrompt
                    } else {
                        TurnKind::SlotFilled
                    },
                }
            }
            TurnOutcome::SlotCancelled { rule_id, utterance } => {
                next.open_slots = None;
                Turn {
                    utterance: utterance.clone(),
                    rule_id: Some(rule_id.clone()),
                    score: 1.0,
                    kind: TurnKind::SlotCancelled,
                }
            }
            TurnOutcome::NavigatedBack { utterance } => {
                if let Some(previous) = next.path.pop() {
                    next.active_node = Some(previous);
                }
                navigation_turn(utterance, next.active_node.clone())
            }
            TurnOutcome::ListedOptions { utterance } => {
                navigation_turn(utterance, next.active_node.clone())
            }
            TurnOutcome::ExitedTree { utterance } => {
                next.active_node = None;
                next.active_group = None;
                next.path.clear();
                navigation_turn(utterance, None)
            }
        };

        debug!(
            turn = next.turn_count,
            kind = ?turn.kind,
            rule_id = ?turn.rule_id,
            score = turn.score,
            "Context updated"
        );

        next.history.push(turn);
        while next.history.len() > self.history_limit {
            next.history.remove(0);
        }
        next
    }

    fn fall_back(&self, next: &mut Context) {
        next.active_node = None;
        next.path.clear();
        next.consecutive_fallbacks += 1;
        if self.max_consecutive_fallbacks > 0
            && next.consecutive_fallbacks > self.max_consecutive_fallbacks
        {
            if let Some(group) = next.active_group.take() {
                info!(
                    group = %group,
                    fallbacks = next.consecutive_fallbacks,
                    "Dropping active group after repeated fallbacks"
                );
            }
            next.consecutive_fallbacks = 0;
        }
    }
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new(6, 3)
    }
}

/// Move the tree position to a newly matched rule.
fn enter_rule(next: &mut Context, candidate: &MatchCandidate, source: MatchSource) {
    match source {
        MatchSource::FollowUp => {
            if let Some(current) = next.active_node.take() {
                next.path.push(current);
            }
        }
        MatchSource::Group | MatchSource::Global => {
            next.path.clear();
            next.active_group = Some(candidate.group_id.clone());
        }
    }
    next.active_node = Some(candidate.rule_id.clone());
}

fn navigation_turn(utterance: &str, node: Option<RuleId>) -> Turn {
    Turn {
        utterance: utterance.to_string(),
        rule_id: node,
        score: 1.0,
        kind: TurnKind::Navigation,
    }
}

/// Check that every reference held by `context` still exists in `model`.
///
/// Fails after a reload removed the active group, the active node, a node on
/// the walked path, or the rule and slot of an open request.
pub fn check_consistency(context: &Context, model: &Model) -> Result<(), ContextDesyncError> {
    if let Some(group) = &context.active_group {
        if model.group(group).is_none() {
            return Err(ContextDesyncError::MissingGroup(group.clone()));
        }
    }

    for node in context.path.iter().chain(context.active_node.iter()) {
        let Some(rule) = model.rule(node) else {
            return Err(ContextDesyncError::MissingNode(node.clone()));
        };
        if let Some(group) = &context.active_group {
            if rule.group() != group || !model.is_reachable_in_group(group, node) {
                return Err(ContextDesyncError::NodeOutsideGroup {
                    node: node.clone(),
                    group: group.clone(),
                });
            }
        }
    }

    if let Some(open) = &context.open_slots {
        let known = model
            .rule(&open.rule_id)
            .map(|rule| rule.slot(&open.awaiting).is_some())
            .unwrap_or(false);
        if !known {
            return Err(ContextDesyncError::MissingSlot {
                rule: open.rule_id.clone(),
                slot: open.awaiting.clone(),
            });
        }
    }

    Ok(())
}

/// Short position label for logging.
pub fn describe(context: &Context) -> String {
    match (&context.active_group, &context.active_node) {
        (Some(group), Some(node)) => format!("{} > {}", group, node),
        (Some(group), None) => group.to_string(),
        (None, Some(node)) => node.to_string(),
        (None, None) => "idle".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
