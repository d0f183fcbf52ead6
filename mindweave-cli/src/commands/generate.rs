use std::io::Read;

use anyhow::Context;
use clap::Args;
use tracing::info;

use mindweave_core::layout::LayoutOutcome;
use mindweave_core::progress::{IndicatifReporter, NoopReporter, SynthesisReporter};
use mindweave_core::types::DiagramStyle;

use super::render::{OutputFormat, render};
use super::{GlobalOptions, open_session};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Text to turn into a graph; `-` reads standard input
    pub content: String,

    /// Diagram style: mindmap, timeline, quadrant
    #[arg(long)]
    pub style: Option<DiagramStyle>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub async fn run(args: GenerateArgs, options: &GlobalOptions) -> anyhow::Result<()> {
    let content = if args.content == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Cannot read content from stdin")?;
        buf
    } else {
        args.content
    };

    let mut session = open_session(options, args.style)?;
    let reporter: Box<dyn SynthesisReporter> = if options.quiet {
        Box::new(NoopReporter)
    } else {
        Box::new(IndicatifReporter::new())
    };

    let committed = session.generate(&content, reporter.as_ref()).await?;
    info!(nodes = committed.nodes, edges = committed.edges, "graph generated");

    for outcome in session.settle_layout().await {
        if let LayoutOutcome::Failed(e) = outcome {
            reporter.message(&format!("Layout skipped: {e}"));
        }
    }

    println!("{}", render(&session.view(), args.format)?);
    Ok(())
}
