//! CLI entry and dispatch.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use adaptive_core::config::{self, Config, parse_tag_list};
use adaptive_core::{ReasoningMiddleware, ReasoningOptions, logging};
use anyhow::{Context, Result};
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "adaptive")]
#[command(version = "0.1")]
#[command(about = "Split inline model reasoning from answer text")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    reasoning: ReasoningArgs,
}

/// Reasoning overrides shared by every command.
#[derive(clap::Args, Debug, Clone, Default)]
struct ReasoningArgs {
    /// Comma-separated reasoning tag names, tried in order
    #[arg(long, global = true, value_name = "TAGS", conflicts_with = "pattern")]
    tags: Option<String>,

    /// Custom regular expression for reasoning (batch extraction only)
    #[arg(long, global = true, value_name = "REGEX")]
    pattern: Option<String>,

    /// Separator between disjoint reasoning or text runs
    #[arg(long, global = true, value_name = "SEP")]
    separator: Option<String>,

    /// Treat input as starting inside a reasoning block
    #[arg(long, global = true)]
    start_with_reasoning: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Extract reasoning from a complete response
    Extract {
        /// Input file (reads stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Print [reasoning]/[text] sections instead of JSON
        #[arg(long)]
        plain: bool,
    },

    /// Replay a response as text deltas and print the rewritten parts
    Stream {
        /// Input file (reads stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Characters per text delta
        #[arg(long, default_value = "16")]
        chunk_size: NonZeroUsize,

        /// Text block id used for the deltas
        #[arg(long, default_value = "text-0")]
        id: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Print a fresh config generated from defaults
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, reasoning } = cli;

    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
        },
        Commands::Extract { file, plain } => {
            let config = Config::load().context("load config")?;
            let _guard = logging::init(&config.logging).context("init logging")?;
            let middleware = build_middleware(&reasoning, &config.reasoning)?;
            commands::extract::run(&middleware, file.as_deref(), plain)
        }
        Commands::Stream {
            file,
            chunk_size,
            id,
        } => {
            let config = Config::load().context("load config")?;
            let _guard = logging::init(&config.logging).context("init logging")?;
            let middleware = build_middleware(&reasoning, &config.reasoning)?;
            commands::stream::run(&middleware, file.as_deref(), chunk_size.get(), &id).await
        }
    }
}

/// Applies CLI overrides on top of the loaded config.
///
/// `--tags` beats `ADAPTIVE_REASONING_TAGS`, which beats the config file.
fn reasoning_options(
    args: &ReasoningArgs,
    base: &config::ReasoningConfig,
) -> Result<ReasoningOptions> {
    let mut reasoning = base.clone();
    if let Some(separator) = &args.separator {
        reasoning.separator.clone_from(separator);
    }
    if args.start_with_reasoning {
        reasoning.start_with_reasoning = true;
    }
    if let Some(pattern) = &args.pattern {
        reasoning.pattern = Some(pattern.clone());
    }

    if let Some(tags) = &args.tags {
        reasoning.tag_patterns = parse_tag_list(tags);
        reasoning.pattern = None;
        return reasoning.to_options_with(None);
    }

    reasoning.to_options()
}

fn build_middleware(
    args: &ReasoningArgs,
    base: &config::ReasoningConfig,
) -> Result<ReasoningMiddleware> {
    let options = reasoning_options(args, base)?;
    Ok(ReasoningMiddleware::new(options))
}
