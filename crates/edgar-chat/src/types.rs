//! Shared value types for the conversational core.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Stable rule identifier, unique within a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Group identifier. Group names are unique, so the name is the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Matching
// =============================================================================

/// One rule that cleared its threshold for an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub rule_id: RuleId,
    pub group_id: GroupId,
    /// The trigger variant, as authored, that produced the best score.
    pub variant: String,
    /// Similarity in `[0, 1]`; `1.0` only for an exact normalized match.
    pub score: f64,
}

/// Which search scope produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Direct followers of the active node.
    FollowUp,
    /// All rules of the active group.
    Group,
    /// Every rule in the model.
    Global,
}

/// Coarse confidence band for a match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    High,
    Medium,
    Low,
}

impl MatchTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            MatchTier::Exact
        } else if score >= 0.75 {
            MatchTier::High
        } else if score >= 0.60 {
            MatchTier::Medium
        } else {
            MatchTier::Low
        }
    }
}

// =============================================================================
// Context
// =============================================================================

/// Partially filled slots of the one multi-part rule awaiting completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSlots {
    pub rule_id: RuleId,
    /// Filled values in the order they were supplied.
    pub filled: Vec<(String, String)>,
    /// The slot the next utterance answers.
    pub awaiting: String,
}

impl OpenSlots {
    pub fn value(&self, slot: &str) -> Option<&str> {
        self.filled
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_filled(&self, slot: &str) -> bool {
        self.value(slot).is_some()
    }
}

/// Progress of a multi-part rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Idle,
    AwaitingSlot(String),
    Complete,
}

impl SlotState {
    /// State implied by a context's open slot request.
    pub fn of(open: Option<&OpenSlots>) -> Self {
        match open {
            Some(open) => SlotState::AwaitingSlot(open.awaiting.clone()),
            None => SlotState::Idle,
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Idle => f.write_str("idle"),
            SlotState::AwaitingSlot(slot) => write!(f, "awaiting({})", slot),
            SlotState::Complete => f.write_str("complete"),
        }
    }
}

/// What happened on a past turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Matched(MatchSource),
    Fallback,
    SlotPrompt,
    SlotFilled,
    SlotCancelled,
    Navigation,
}

/// One entry of the bounded per-session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub utterance: String,
    pub rule_id: Option<RuleId>,
    pub score: f64,
    pub kind: TurnKind,
}

/// Per-session conversational state.
///
/// Owned by exactly one session and replaced wholesale each turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub active_group: Option<GroupId>,
    /// The rule most recently offered; its followers are searched first.
    pub active_node: Option<RuleId>,
    /// Nodes walked before `active_node` within the current tree.
    pub path: Vec<RuleId>,
    pub history: Vec<Turn>,
    pub open_slots: Option<OpenSlots>,
    pub consecutive_fallbacks: u32,
    pub turn_count: u64,
}

impl Context {
    /// No topic, no tree position, and no pending slot request.
    ///
    /// History and counters are not considered.
    pub fn is_empty(&self) -> bool {
        self.active_group.is_none()
            && self.active_node.is_none()
            && self.path.is_empty()
            && self.open_slots.is_none()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.history.last()
    }
}

// =============================================================================
// Responses
// =============================================================================

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Answer,
    SlotPrompt,
    SlotComplete,
    SlotCancelled,
    Navigation,
    Fallback,
}

/// The result of one turn as seen by a chat surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub text: String,
    pub confidence: f64,
    pub rule_id: Option<RuleId>,
    pub kind: ResponseKind,
    pub source: Option<MatchSource>,
    pub tier: Option<MatchTier>,
}

impl QueryResponse {
    pub fn is_fallback(&self) -> bool {
        self.kind == ResponseKind::Fallback
    }
}
