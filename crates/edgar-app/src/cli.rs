//! CLI argument definitions for the Edgar binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// Edgar, a rule-based conversational engine.
#[derive(Parser, Debug)]
#[command(name = "edgar", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Load a model and report its structure, or why it was rejected.
    Check {
        /// Model name under the models directory, or a path to a JSON file.
        model: String,
    },
    /// Answer one utterance and exit.
    Ask {
        model: String,
        /// The utterance; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        utterance: Vec<String>,
        /// Print full responses as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Interactive conversation on stdin.
    Chat {
        /// Defaults to `general.default_model` from the configuration.
        model: Option<String>,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > EDGAR_CONFIG env var > ./config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("EDGAR_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("config.toml")
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, configured: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| configured.to_string())
    }
}

/// Turn a model argument into a file path.
///
/// Anything that looks like a path is used as-is; a bare name resolves to
/// `<models_dir>/<name>.json`.
pub fn model_path(models_dir: &str, model: &str) -> PathBuf {
    let as_path = Path::new(model);
    if as_path.extension().is_some() || as_path.components().count() > 1 {
        as_path.to_path_buf()
    } else {
        Path::new(models_dir).join(format!("{}.json", model))
    }
}

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Blank,
    Quit,
    Reset,
    Reload,
    ShowContext,
    Say(&'a str),
}

impl<'a> ChatInput<'a> {
    /// Slash commands control the REPL; everything else is spoken to the bot.
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => ChatInput::Blank,
            "/quit" | "/q" => ChatInput::Quit,
            "/reset" => ChatInput::Reset,
            "/reload" => ChatInput::Reload,
            "/context" => ChatInput::ShowContext,
            text => ChatInput::Say(text),
        }
    }
}
