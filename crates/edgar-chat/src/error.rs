//! Error types for the conversational core.

use edgar_core::error::EdgarError;

use crate::types::{GroupId, RuleId, SlotState};

/// Errors surfaced by the session-level API.
///
/// An unmatched utterance is never an error: it produces the model's
/// fallback response.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state lock poisoned: {0}")]
    StateLock(String),
}

impl From<ChatError> for EdgarError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Io(e) => EdgarError::Io(e),
            other => EdgarError::Model(other.to_string()),
        }
    }
}

/// The structural rule a model document violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoadErrorKind {
    #[error("malformed document")]
    Malformed,
    #[error("duplicate group name")]
    DuplicateGroupName,
    #[error("duplicate rule id")]
    DuplicateRuleId,
    #[error("empty trigger set")]
    EmptyTriggers,
    #[error("empty response set")]
    EmptyResponses,
    #[error("dangling follow-up reference")]
    DanglingFollowUp,
    #[error("cyclic follow-up graph")]
    CyclicFollowUp,
    #[error("follow-up crosses group boundary")]
    CrossGroupFollowUp,
    #[error("confidence threshold outside [0, 1]")]
    InvalidThreshold,
    #[error("invalid slot pattern")]
    InvalidSlotPattern,
    #[error("unknown slot")]
    UnknownSlot,
    #[error("duplicate slot name")]
    DuplicateSlot,
}

/// A model document failed validation. Nothing from it was loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid model: {kind}{}", location(.group, .rule, .reference, .detail))]
pub struct LoadError {
    pub kind: LoadErrorKind,
    pub group: Option<GroupId>,
    pub rule: Option<RuleId>,
    /// The offending reference: a follow-up target, slot name, or trigger.
    pub reference: Option<String>,
    pub detail: Option<String>,
}

impl LoadError {
    pub fn new(kind: LoadErrorKind) -> Self {
        Self {
            kind,
            group: None,
            rule: None,
            reference: None,
            detail: None,
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(LoadErrorKind::Malformed).with_detail(detail)
    }

    pub fn in_group(mut self, group: &GroupId) -> Self {
        self.group = Some(group.clone());
        self
    }

    pub fn in_rule(mut self, rule: &RuleId) -> Self {
        self.rule = Some(rule.clone());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Where in the document a `LoadError` was found, as a message suffix.
fn location(
    group: &Option<GroupId>,
    rule: &Option<RuleId>,
    reference: &Option<String>,
    detail: &Option<String>,
) -> String {
    let mut out = String::new();
    if let Some(group) = group {
        out.push_str(&format!(" in group '{}'", group));
    }
    if let Some(rule) = rule {
        out.push_str(&format!(" in rule '{}'", rule));
    }
    if let Some(reference) = reference {
        out.push_str(&format!(" -> '{}'", reference));
    }
    if let Some(detail) = detail {
        out.push_str(&format!(": {}", detail));
    }
    out
}

/// The session context points at something the current model no longer has.
///
/// Recovered by resetting the context; the turn is answered as a fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextDesyncError {
    #[error("active group no longer exists: {0}")]
    MissingGroup(GroupId),
    #[error("active node no longer exists: {0}")]
    MissingNode(RuleId),
    #[error("active node {node} is not part of group {group}")]
    NodeOutsideGroup { node: RuleId, group: GroupId },
    #[error("open slot request references missing rule or slot: {rule}.{slot}")]
    MissingSlot { rule: RuleId, slot: String },
}

/// Multi-part rule progression failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("invalid slot transition: {from} -> {to}")]
    InvalidTransition { from: SlotState, to: SlotState },
    #[error("rule {0} has no slots")]
    NotSlotted(RuleId),
    #[error(transparent)]
    Desync(#[from] ContextDesyncError),
}

/// A module-backed rule could not get an override from its handler.
///
/// Recovered by answering with the rule's static response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("module not registered: {0}")]
    Unavailable(String),
    #[error("module {key} failed: {reason}")]
    Failed { key: String, reason: String },
}
