mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "corpus")]
#[command(about = "Semantic search over a folder of documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root holding corpus.yaml (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default corpus.yaml and create the source/storage folders
    Init {
        #[arg(long, help = "Overwrite an existing corpus.yaml")]
        force: bool,
    },
    /// Rebuild the collection from the source folder
    #[command(name = "build-index")]
    BuildIndex {
        #[arg(long, help = "Words per fragment")]
        chunk_size: Option<usize>,
        #[arg(long, help = "Words shared by consecutive fragments")]
        overlap: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Find the fragments most similar to a query
    Ask {
        #[arg(long, short)]
        query: String,
        #[arg(long, short = 'k', alias = "top_k", help = "Number of results")]
        top_k: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show collection statistics
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server over stdio
    #[cfg(feature = "mcp")]
    Mcp,
}

fn main() -> anyhow::Result<()> {
    // stdout carries command output and the MCP transport
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corpus_search=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { force } => commands::init::run(&root, force),
        Commands::BuildIndex {
            chunk_size,
            overlap,
            json,
        } => commands::build_index::run(&root, chunk_size, overlap, json),
        Commands::Ask { query, top_k, json } => commands::ask::run(&root, &query, top_k, json),
        Commands::Status { json } => commands::status::run(&root, json),

        #[cfg(feature = "mcp")]
        Commands::Mcp => run_mcp_server(&root),
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server(root: &std::path::Path) -> anyhow::Result<()> {
    let config = corpus_search::Config::load(root)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(corpus_search::mcp::run_mcp_server(config))
}
