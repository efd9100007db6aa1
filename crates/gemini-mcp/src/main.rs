mod cmd;
mod output;
mod prompts;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cmd::hook::HookSubcommand;
use tools::ToolContext;

#[derive(Parser)]
#[command(
    name = "gemini-mcp",
    about = "Gemini for coding agents: an MCP tool server plus direct and hook commands",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML configuration file (default: .gemini-mcp.yaml in the working directory)
    #[arg(long, global = true, env = "GEMINI_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Print the final result as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at debug level
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Log errors only
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the Gemini tools over MCP (JSON-RPC on stdio). The default.
    Mcp,

    /// Ask a quick development question
    Query {
        question: String,
        /// Extra context sent with the question
        context: Option<String>,
    },

    /// Analyze one file
    Analyze {
        file: String,
        /// comprehensive, security, performance or architecture
        #[arg(default_value = "comprehensive")]
        analysis_type: String,
    },

    /// Analyze a directory of the project
    Codebase {
        directory: String,
        /// structure, security, performance, patterns or all
        #[arg(default_value = "all")]
        scope: String,
    },

    /// Editor and VCS hooks
    Hook {
        #[command(subcommand)]
        subcommand: HookSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Mcp);

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        match &command {
            Commands::Mcp => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    };

    // stdout carries protocol and answer text only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(anyhow::Error::from)
        .and_then(|rt| rt.block_on(run(command, cli.config, cli.json)));

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let ctx = ToolContext::load(config.as_deref())?;

    match command {
        Commands::Mcp => cmd::mcp::run(Arc::new(ctx)).await,
        Commands::Query { question, context } => {
            cmd::query::run(&ctx, &question, context.as_deref(), json).await
        }
        Commands::Analyze {
            file,
            analysis_type,
        } => cmd::analyze::run(&ctx, &file, &analysis_type, json).await,
        Commands::Codebase { directory, scope } => {
            cmd::codebase::run(&ctx, &directory, &scope, json).await
        }
        Commands::Hook { subcommand } => cmd::hook::run(&ctx, subcommand, json).await,
    }
}
