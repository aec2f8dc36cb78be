//! Shared configuration, errors, and logging bootstrap for Edgar.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{EdgarConfig, SelectionPolicy};
pub use error::{EdgarError, Result};
pub use logging::init_tracing;
