//! Current date and time.

use chrono::{Local, NaiveDateTime};
use edgar_chat::{ModuleError, ModuleHandler, ModuleRequest};

pub const KEY: &str = "time";

/// Answers with the local time, the date, or both, depending on what the
/// utterance asks about.
pub struct TimeModule {
    clock: fn() -> NaiveDateTime,
}

impl TimeModule {
    pub fn new() -> Self {
        Self {
            clock: || Local::now().naive_local(),
        }
    }

    /// Use a fixed clock instead of the system one.
    pub fn with_clock(clock: fn() -> NaiveDateTime) -> Self {
        Self { clock }
    }
}

impl Default for TimeModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleHandler for TimeModule {
    fn key(&self) -> &str {
        KEY
    }

    fn handle(&self, request: &ModuleRequest<'_>) -> Result<Option<String>, ModuleError> {
        Ok(Some(describe((self.clock)(), request.utterance)))
    }
}

/// Phrase `now` for `utterance`.
pub fn describe(now: NaiveDateTime, utterance: &str) -> String {
    let lower = utterance.to_lowercase();
    let asks_time = lower.contains("time");
    let asks_date = lower.contains("date") || lower.contains("day");
    match (asks_time, asks_date) {
        (true, false) => format!("The current time is {}.", now.format("%I:%M %p")),
        (false, true) => format!("Today's date is {}.", now.format("%B %d, %Y")),
        _ => format!(
            "The current date and time is {}.",
            now.format("%B %d, %Y at %I:%M %p")
        ),
    }
}
