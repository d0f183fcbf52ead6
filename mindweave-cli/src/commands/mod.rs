pub mod generate;
pub mod init;
pub mod render;
pub mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;

use mindweave_core::config::{CONFIG_FILE, MindweaveConfig};
use mindweave_core::layout::LayeredEngine;
use mindweave_core::session::GraphSession;
use mindweave_core::types::DiagramStyle;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a concept graph from text and print it
    Generate(generate::GenerateArgs),
    /// Interactive session: generate, expand, undo and redo on one graph
    Session(session::SessionArgs),
    /// Write a default mindweave.toml
    Init(init::InitArgs),
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub quiet: bool,
}

pub async fn run(cmd: Command, options: GlobalOptions) -> anyhow::Result<()> {
    match cmd {
        Command::Generate(args) => generate::run(args, &options).await,
        Command::Session(args) => session::run(args, &options).await,
        Command::Init(args) => init::run(&args),
    }
}

/// Load configuration from `--config`, or from `./mindweave.toml` when it
/// exists, or fall back to defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<MindweaveConfig> {
    let config = match explicit {
        Some(path) => MindweaveConfig::load(path)
            .with_context(|| format!("Cannot load config from {}", path.display()))?,
        None => MindweaveConfig::load_or_default(Path::new(CONFIG_FILE))
            .with_context(|| format!("Cannot load config from {CONFIG_FILE}"))?,
    };
    config.validate().context("Invalid config")?;
    Ok(config)
}

/// Open a session with the in-process layout engine.
pub fn open_session(
    options: &GlobalOptions,
    style: Option<DiagramStyle>,
) -> anyhow::Result<GraphSession> {
    let mut config = load_config(options.config.as_deref())?;
    if let Some(style) = style {
        config.diagram.style = style;
    }
    GraphSession::from_config(&config, Arc::new(LayeredEngine::new()))
        .context("Failed to set up completion provider")
}
