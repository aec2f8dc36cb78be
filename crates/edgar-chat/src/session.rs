//! Sessions and the reloadable model handle.
//!
//! Many sessions share one [`ModelHandle`]. Each turn takes a snapshot of
//! the current model and runs to completion against it, so a reload only
//! affects turns that start after the swap.

use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::info;
use uuid::Uuid;

use crate::error::ChatError;
use crate::model::Model;
use crate::orchestrator::QueryOrchestrator;
use crate::types::{Context, QueryResponse};

/// Maximum utterance length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Atomically swappable shared model.
#[derive(Debug)]
pub struct ModelHandle {
    current: RwLock<Arc<Model>>,
}

impl ModelHandle {
    pub fn new(model: Model) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
        }
    }

    /// The model new turns should run against.
    pub fn snapshot(&self) -> Result<Arc<Model>, ChatError> {
        let guard = self
            .current
            .read()
            .map_err(|e| ChatError::StateLock(format!("model lock poisoned: {}", e)))?;
        Ok(Arc::clone(&guard))
    }

    /// Replace the model. Returns the previous one.
    pub fn swap(&self, model: Model) -> Result<Arc<Model>, ChatError> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| ChatError::StateLock(format!("model lock poisoned: {}", e)))?;
        let previous = std::mem::replace(&mut *guard, Arc::new(model));
        info!(
            previous = previous.name(),
            current = guard.name(),
            rules = guard.rule_count(),
            "Model swapped"
        );
        Ok(previous)
    }

    /// Load and validate `path`, then swap it in. The current model stays
    /// in place when loading fails.
    pub fn reload_from_path(&self, path: &Path) -> Result<Arc<Model>, ChatError> {
        let model = Model::load(path)?;
        self.swap(model)
    }
}

/// One conversation: an id, its own context, and shared collaborators.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    model: Arc<ModelHandle>,
    orchestrator: Arc<QueryOrchestrator>,
    context: Context,
}

impl Session {
    pub fn new(model: Arc<ModelHandle>, orchestrator: Arc<QueryOrchestrator>) -> Self {
        Self {
            id: Uuid::new_v4(),
            model,
            orchestrator,
            context: Context::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Forget the conversation so far.
    pub fn reset(&mut self) {
        self.context = Context::default();
    }

    /// Answer one utterance.
    pub fn ask(&mut self, utterance: &str) -> Result<QueryResponse, ChatError> {
        validate_message(utterance)?;
        let model = self.model.snapshot()?;
        let (response, next) = self.orchestrator.handle(utterance, &self.context, &model);
        self.context = next;
        Ok(response)
    }

    /// Answer each question of a compound utterance in order.
    pub fn ask_many(&mut self, utterance: &str) -> Result<Vec<QueryResponse>, ChatError> {
        validate_message(utterance)?;
        let model = self.model.snapshot()?;
        let (responses, next) = self
            .orchestrator
            .handle_many(utterance, &self.context, &model);
        self.context = next;
        Ok(responses)
    }
}

fn validate_message(utterance: &str) -> Result<(), ChatError> {
    if utterance.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if utterance.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
    }
    Ok(())
}
