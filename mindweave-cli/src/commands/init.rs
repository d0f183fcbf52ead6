use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use mindweave_core::config::{CONFIG_FILE, MindweaveConfig};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write mindweave.toml into (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    let target = args.path.join(CONFIG_FILE);
    if target.exists() && !args.force {
        anyhow::bail!(
            "{} already exists. Pass --force to overwrite it.",
            target.display()
        );
    }

    let text = MindweaveConfig::default()
        .to_toml()
        .context("Cannot serialize default config")?;
    std::fs::write(&target, text)
        .with_context(|| format!("Cannot write {}", target.display()))?;

    println!("Wrote {}", target.display());
    Ok(())
}
