use anyhow::Context;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use mindweave_core::layout::LayoutOutcome;
use mindweave_core::progress::{IndicatifReporter, NoopReporter, SynthesisReporter};
use mindweave_core::session::GraphSession;
use mindweave_core::surface::{ExpandRequest, Gesture, GestureEffect, SurfaceAdapter};
use mindweave_core::types::DiagramStyle;

use super::render::{OutputFormat, render};
use super::{GlobalOptions, open_session};

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Initial diagram style: mindmap, timeline, quadrant
    #[arg(long)]
    pub style: Option<DiagramStyle>,
}

const HELP: &str = "\
commands:
  generate <text>          replace the graph with one generated from text
  expand <node-id> [label] add generated children under a node
  select <node-id> | none  change the selection
  style <style>            mindmap, timeline or quadrant
  undo | redo | clear      history operations
  relayout                 recompute positions
  show [text|json|mermaid] print the graph
  status                   counts and flags
  quit                     leave the session";

/// One parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Generate(String),
    Expand { id: String, label: Option<String> },
    Select(Option<String>),
    Style(DiagramStyle),
    Undo,
    Redo,
    Clear,
    Relayout,
    Show(OutputFormat),
    Status,
    Help,
    Quit,
}

fn parse_line(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let command = match word.to_ascii_lowercase().as_str() {
        "generate" | "gen" => {
            if rest.is_empty() {
                return Err("usage: generate <text>".into());
            }
            ReplCommand::Generate(rest.to_string())
        }
        "expand" => {
            let (id, label) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(id, label)| (id, label.trim()));
            if id.is_empty() {
                return Err("usage: expand <node-id> [label]".into());
            }
            ReplCommand::Expand {
                id: id.to_string(),
                label: (!label.is_empty()).then(|| label.to_string()),
            }
        }
        "select" => match rest {
            "" => return Err("usage: select <node-id> | none".into()),
            "none" => ReplCommand::Select(None),
            id => ReplCommand::Select(Some(id.to_string())),
        },
        "style" => ReplCommand::Style(rest.parse()?),
        "undo" => ReplCommand::Undo,
        "redo" => ReplCommand::Redo,
        "clear" => ReplCommand::Clear,
        "relayout" => ReplCommand::Relayout,
        "show" => ReplCommand::Show(if rest.is_empty() {
            OutputFormat::Text
        } else {
            rest.parse()?
        }),
        "status" => ReplCommand::Status,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(Some(command))
}

struct Repl {
    session: GraphSession,
    surface: SurfaceAdapter,
    expand_rx: mpsc::UnboundedReceiver<ExpandRequest>,
    reporter: Box<dyn SynthesisReporter>,
}

impl Repl {
    async fn execute(&mut self, command: ReplCommand) -> anyhow::Result<bool> {
        match command {
            ReplCommand::Generate(text) => {
                let committed = self.session.generate(&text, self.reporter.as_ref()).await?;
                println!("generated {} nodes, {} edges", committed.nodes, committed.edges);
            }
            ReplCommand::Expand { id, label } => {
                // Expansion goes through the surface so the node label is
                // resolved the same way a click would resolve it.
                if self.surface.handle(&mut self.session, Gesture::ExpandClick(id.clone()))
                    != GestureEffect::ExpandRequested
                {
                    anyhow::bail!("no node with id {id}");
                }
                while let Ok(request) = self.expand_rx.try_recv() {
                    let label = label.as_deref().unwrap_or(&request.label);
                    let committed = self
                        .session
                        .expand(&request.node_id, Some(label), self.reporter.as_ref())
                        .await?;
                    println!("added {} nodes under {}", committed.nodes, request.node_id);
                }
            }
            ReplCommand::Select(id) => {
                let gesture = match id {
                    Some(id) => Gesture::NodeClick(id),
                    None => Gesture::PaneClick,
                };
                self.surface.handle(&mut self.session, gesture);
                match self.session.model().selected() {
                    Some(id) => println!("selected {id}"),
                    None => println!("nothing selected"),
                }
            }
            ReplCommand::Style(style) => {
                self.session.set_style(style);
                println!("style: {style}");
            }
            ReplCommand::Undo => println!("{}", if self.session.undo() { "undone" } else { "nothing to undo" }),
            ReplCommand::Redo => println!("{}", if self.session.redo() { "redone" } else { "nothing to redo" }),
            ReplCommand::Clear => println!("{}", if self.session.clear() { "cleared" } else { "already empty" }),
            ReplCommand::Relayout => self.session.relayout(),
            ReplCommand::Show(format) => println!("{}", render(&self.session.view(), format)?),
            ReplCommand::Status => {
                let counts = self.session.counts();
                println!(
                    "style={} nodes={} edges={} can_undo={} can_redo={} generating={}",
                    self.session.style(),
                    counts.nodes,
                    counts.edges,
                    self.session.can_undo(),
                    self.session.can_redo(),
                    self.session.is_generating(),
                );
            }
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => return Ok(false),
        }

        for outcome in self.session.settle_layout().await {
            if let LayoutOutcome::Failed(e) = outcome {
                self.reporter.message(&format!("layout skipped: {e}"));
            }
        }
        self.surface.publish(&self.session);
        Ok(true)
    }
}

pub async fn run(args: SessionArgs, options: &GlobalOptions) -> anyhow::Result<()> {
    let session = open_session(options, args.style)?;
    let (tx, expand_rx) = mpsc::unbounded_channel();
    let surface = SurfaceAdapter::new(&session, Box::new(tx));
    let reporter: Box<dyn SynthesisReporter> = if options.quiet {
        Box::new(NoopReporter)
    } else {
        Box::new(IndicatifReporter::new())
    };
    let mut repl = Repl {
        session,
        surface,
        expand_rx,
        reporter,
    };

    if !options.quiet {
        println!("mindweave session ({}). Type `help` for commands.", repl.session.style());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Cannot read stdin")? {
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(command)) => match repl.execute(command).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => eprintln!("error: {e:#}"),
            },
            Err(msg) => eprintln!("{msg}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate_with_free_text() {
        assert_eq!(
            parse_line("generate A causes B causes C").unwrap(),
            Some(ReplCommand::Generate("A causes B causes C".into()))
        );
        assert!(parse_line("generate").is_err());
    }

    #[test]
    fn parses_expand_with_optional_label() {
        assert_eq!(
            parse_line("expand node-1").unwrap(),
            Some(ReplCommand::Expand {
                id: "node-1".into(),
                label: None
            })
        );
        assert_eq!(
            parse_line("expand node-1 Light reactions").unwrap(),
            Some(ReplCommand::Expand {
                id: "node-1".into(),
                label: Some("Light reactions".into())
            })
        );
    }

    #[test]
    fn parses_selection_style_and_show() {
        assert_eq!(parse_line("select none").unwrap(), Some(ReplCommand::Select(None)));
        assert_eq!(
            parse_line("style Timeline").unwrap(),
            Some(ReplCommand::Style(DiagramStyle::Timeline))
        );
        assert_eq!(
            parse_line("show mermaid").unwrap(),
            Some(ReplCommand::Show(OutputFormat::Mermaid))
        );
        assert!(parse_line("style gantt").is_err());
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert!(parse_line("frobnicate").unwrap_err().contains("unknown command"));
        assert_eq!(parse_line("EXIT").unwrap(), Some(ReplCommand::Quit));
    }
}
