//! Module dispatch: handlers that can override a rule's static response.
//!
//! The registry is filled explicitly at startup. A rule tagged with
//! `module = "<key>"` is dispatched to the handler registered under that key;
//! when no handler exists, it fails, or it declines, the rule's own response
//! is used instead.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ModuleError;
use crate::types::RuleId;

/// What a module handler gets to look at.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRequest<'a> {
    pub rule_id: &'a RuleId,
    pub utterance: &'a str,
    /// Filled slots of a completed multi-part rule, in declared order.
    pub slots: &'a [(String, String)],
}

impl<'a> ModuleRequest<'a> {
    pub fn slot(&self, name: &str) -> Option<&'a str> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A source of dynamic responses (time, arithmetic, lookups).
///
/// Handlers run synchronously inside a turn. Anything slow belongs outside
/// the core, with the result handed in through a handler that only reads it.
pub trait ModuleHandler: Send + Sync {
    /// Key that rules use to refer to this handler.
    fn key(&self) -> &str;

    /// Produce an override response, or `Ok(None)` to keep the static one.
    fn handle(&self, request: &ModuleRequest<'_>) -> Result<Option<String>, ModuleError>;
}

/// Handlers by module key.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    handlers: HashMap<String, Arc<dyn ModuleHandler>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own key, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ModuleHandler>) {
        self.handlers.insert(handler.key().to_string(), handler);
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn ModuleHandler>> {
        self.handlers.get(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler registered under `key`.
    pub fn dispatch(
        &self,
        key: &str,
        request: &ModuleRequest<'_>,
    ) -> Result<Option<String>, ModuleError> {
        let handler = self
            .get(key)
            .ok_or_else(|| ModuleError::Unavailable(key.to_string()))?;
        handler.handle(request)
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
