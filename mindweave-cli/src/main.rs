use std::path::PathBuf;

use clap::Parser;
use mindweave_core::error::{ConfigError, LlmError, MindweaveError, SynthesisError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "mindweave",
    version,
    about = "Turn unstructured text into an editable, auto-laid-out concept graph"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Path to mindweave.toml (default: ./mindweave.toml if present)
    #[arg(long, global = true, env = "MINDWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Map an error to a process exit code by the first Mindweave error found
/// in its chain.
///
///   0: success
///   1: general/unknown error
///   2: configuration error
///   6: LLM provider or transport error
///   7: synthesis rejected (schema, dangling edge, duplicate id, busy)
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<MindweaveError>() {
            return match e {
                MindweaveError::Llm(_) => 6,
                MindweaveError::Config(_) => 2,
                MindweaveError::Synthesis(_) => 7,
                MindweaveError::Layout(_) => 1,
            };
        }
        if cause.is::<ConfigError>() {
            return 2;
        }
        if cause.is::<LlmError>() {
            return 6;
        }
        if cause.is::<SynthesisError>() {
            return 7;
        }
    }
    1
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let options = commands::GlobalOptions {
        config: cli.config,
        quiet: cli.quiet,
    };
    match runtime.block_on(commands::run(cli.command, options)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn exit_code_missing_api_key() {
        let err: anyhow::Error = MindweaveError::Llm(LlmError::Config(
            "api_key not set: environment variable OPENAI_API_KEY is empty".into(),
        ))
        .into();
        let err = err.context("Failed to set up completion provider");
        assert_eq!(classify_exit_code(&err), 6);
    }

    #[test]
    fn exit_code_transport() {
        let err: anyhow::Error = MindweaveError::Llm(LlmError::ApiError {
            status: 429,
            body: "slow down".into(),
        })
        .into();
        assert_eq!(classify_exit_code(&err), 6);
    }

    #[test]
    fn exit_code_config() {
        let err = Err::<(), _>(ConfigError::Parse("expected `=`".into()))
            .context("Cannot load config from ./mindweave.toml")
            .unwrap_err();
        assert_eq!(classify_exit_code(&err), 2);
    }

    #[test]
    fn exit_code_synthesis_rejected() {
        let err: anyhow::Error = MindweaveError::Synthesis(SynthesisError::DanglingEdge {
            from: "a".into(),
            to: "zz".into(),
        })
        .into();
        assert_eq!(classify_exit_code(&err), 7);
    }

    #[test]
    fn exit_code_ignores_words_in_messages() {
        let err = anyhow::anyhow!("No node named config-llm-error in the graph");
        assert_eq!(classify_exit_code(&err), 1);

        let err = Err::<(), _>(std::io::Error::other("config"))
            .context("Cannot read content from stdin")
            .unwrap_err();
        assert_eq!(classify_exit_code(&err), 1);
    }

    #[test]
    fn exit_code_general() {
        let err = anyhow::anyhow!("Something unexpected happened");
        assert_eq!(classify_exit_code(&err), 1);
    }
}
