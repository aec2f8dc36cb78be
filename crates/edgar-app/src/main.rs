//! Edgar application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Install the tracing subscriber
//! 3. Register built-in modules and build the query orchestrator
//! 4. Run the requested command against a model file

mod cli;

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use edgar_chat::{Model, ModelHandle, QueryOrchestrator, QueryResponse, Session};
use edgar_core::config::EdgarConfig;

use cli::{ChatInput, CliArgs, Command};

fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config = EdgarConfig::load_or_default(&config_file);
    edgar_core::init_tracing(&args.resolve_log_level(&config.general.log_level));

    tracing::info!("Starting Edgar v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Check { ref model } => {
            let path = cli::model_path(&config.general.models_dir, model);
            check(&path)
        }
        Command::Ask {
            ref model,
            ref utterance,
            json,
        } => {
            let path = cli::model_path(&config.general.models_dir, model);
            let mut session = open_session(&config, &path)?.1;
            let responses = session.ask_many(&utterance.join(" "))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&responses)?);
            } else {
                for response in &responses {
                    println!("{}", response.text);
                }
            }
            Ok(())
        }
        Command::Chat { ref model } => {
            let name = model
                .clone()
                .or_else(|| config.general.default_model.clone())
                .ok_or("no model given and general.default_model is not set")?;
            let path = cli::model_path(&config.general.models_dir, &name);
            let (handle, mut session) = open_session(&config, &path)?;
            chat(&mut session, &handle, &path)
        }
    }
}

/// Load a model and print its groups with their entry points.
fn check(path: &Path) -> Result<(), Box<dyn Error>> {
    let model = Model::load(path)?;
    println!(
        "{}: {} groups, {} rules",
        model.name(),
        model.groups().count(),
        model.rule_count()
    );
    for group in model.groups() {
        let entries: Vec<String> = group.entry_points().iter().map(|id| id.to_string()).collect();
        println!(
            "  {} ({} rules) entry: {}",
            group.name(),
            group.rules().len(),
            entries.join(", ")
        );
    }
    Ok(())
}

fn open_session(
    config: &EdgarConfig,
    path: &Path,
) -> Result<(Arc<ModelHandle>, Session), Box<dyn Error>> {
    let model = Model::load(path)?;
    let handle = Arc::new(ModelHandle::new(model));

    let modules = edgar_modules::builtin_registry();
    tracing::info!(modules = ?modules.keys(), "Modules registered");
    let orchestrator = Arc::new(QueryOrchestrator::new(config, modules));

    let session = Session::new(Arc::clone(&handle), orchestrator);
    tracing::info!(session = %session.id(), path = %path.display(), "Session started");
    Ok((handle, session))
}

/// Read utterances from stdin until EOF or `/quit`.
fn chat(session: &mut Session, handle: &ModelHandle, path: &Path) -> Result<(), Box<dyn Error>> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("Type /quit to leave, /reset to start over, /reload to reread the model.");
    prompt(&mut stdout)?;

    for line in stdin.lock().lines() {
        let line = line?;
        match ChatInput::parse(&line) {
            ChatInput::Blank => {}
            ChatInput::Quit => break,
            ChatInput::Reset => {
                session.reset();
                println!("(context cleared)");
            }
            ChatInput::Reload => match handle.reload_from_path(path) {
                Ok(_) => println!("(model reloaded)"),
                Err(e) => eprintln!("reload failed: {}", e),
            },
            ChatInput::ShowContext => {
                println!("({})", edgar_chat::context::describe(session.context()));
            }
            ChatInput::Say(text) => match session.ask_many(text) {
                Ok(responses) => responses.iter().for_each(|r| println!("{}", reply_line(r))),
                Err(e) => eprintln!("{}", e),
            },
        }
        prompt(&mut stdout)?;
    }
    Ok(())
}

fn prompt(stdout: &mut io::Stdout) -> io::Result<()> {
    write!(stdout, "> ")?;
    stdout.flush()
}

fn reply_line(response: &QueryResponse) -> String {
    match &response.rule_id {
        Some(rule) => format!("edgar: {}  [{} {:.2}]", response.text, rule, response.confidence),
        None => format!("edgar: {}", response.text),
    }
}
