//! Built-in module handlers for Edgar.
//!
//! Handlers are listed in a static table and registered explicitly at
//! startup; nothing is discovered at runtime.

pub mod calculator;
pub mod time;

use std::sync::Arc;

use edgar_chat::{ModuleHandler, ModuleRegistry};
use tracing::debug;

pub use calculator::CalculatorModule;
pub use time::TimeModule;

/// Constructor for a built-in handler.
pub type ModuleFactory = fn() -> Arc<dyn ModuleHandler>;

/// Every built-in module, by key.
pub const BUILTIN_MODULES: &[(&str, ModuleFactory)] = &[
    (time::KEY, time_module),
    (calculator::KEY, calculator_module),
];

fn time_module() -> Arc<dyn ModuleHandler> {
    Arc::new(TimeModule::new())
}

fn calculator_module() -> Arc<dyn ModuleHandler> {
    Arc::new(CalculatorModule)
}

/// A registry holding every built-in module.
pub fn builtin_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    for (key, factory) in BUILTIN_MODULES {
        registry.register(factory());
        debug!(module = key, "Registered built-in module");
    }
    registry
}
