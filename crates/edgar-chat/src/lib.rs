//! Rule-based conversational core for Edgar.
//!
//! Matches utterances against an author-curated rule model, tracks context
//! across turns, navigates follow-up trees, and fills multi-part questions
//! slot by slot.

pub mod context;
pub mod error;
pub mod matcher;
pub mod model;
pub mod modules;
pub mod navigator;
pub mod orchestrator;
pub mod response;
pub mod session;
pub mod slots;
pub mod types;

pub use context::{check_consistency, ContextTracker, TurnOutcome};
pub use error::{ChatError, ContextDesyncError, LoadError, LoadErrorKind, ModuleError, SlotError};
pub use matcher::{normalize, similarity, SentenceMatcher};
pub use model::{GroupDocument, Model, ModelDocument, Rule, RuleDocument};
pub use modules::{ModuleHandler, ModuleRegistry, ModuleRequest};
pub use navigator::{FollowUpNavigator, NavigationCommand, NavigationCommands, Resolution};
pub use orchestrator::{split_utterance, QueryOrchestrator};
pub use response::ResponseSelector;
pub use session::{ModelHandle, Session, MAX_MESSAGE_LENGTH};
pub use slots::{MultiQaResolver, SlotStep};
pub use types::{
    Context, GroupId, MatchCandidate, MatchSource, MatchTier, OpenSlots, QueryResponse,
    ResponseKind, RuleId, SlotState, Turn, TurnKind,
};
