//! TraceAI CLI entry point (§6): `ingest`/`stats`/`trace`/`impact`/`search`
//! plus the `serve` subcommand added to expose C8 over HTTP.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod vector_bridge;

#[derive(Parser)]
#[command(name = "traceai")]
#[command(about = "ETL-intelligence engine: lineage, impact, and semantic search over pipeline artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Workspace root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every supported artifact under `root` and persist the graph + vector index
    Ingest {
        /// Glob patterns to admit (defaults to everything under root)
        #[arg(long = "pattern")]
        pattern: Vec<String>,
    },
    /// Print aggregate graph statistics
    Stats,
    /// Trace lineage for a named entity
    Trace {
        entity: String,
        #[arg(long, default_value = "both")]
        direction: String,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Report the blast radius of changing a named entity
    Impact { entity: String },
    /// Semantic search over indexed text surfaces
    Search {
        text: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
    /// Start the HTTP exposition of the tool surface
    Serve {
        #[arg(short, long, default_value = "7890")]
        port: u16,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = std::env::var("TRACEAI_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| format!("traceai={log_level},traceai_core={log_level},traceai_parsers={log_level},traceai_vector={log_level},traceai_tools={log_level}"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TraceAI v{}", env!("CARGO_PKG_VERSION"));

    let mut app_config = match config::load(&cli.root) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return Ok(ExitCode::from(commands::EXIT_INVALID_ARGS as u8));
        }
    };
    if let Commands::Serve { port, host } = &cli.command {
        app_config.server.port = *port;
        app_config.server.host = host.clone();
    }

    let code = match cli.command {
        Commands::Ingest { pattern } => {
            let patterns = if pattern.is_empty() { None } else { Some(pattern) };
            commands::ingest(&cli.root, &app_config, patterns).await
        }
        Commands::Stats => commands::stats(&app_config),
        Commands::Trace { entity, direction, max_depth } => {
            match parse_direction(&direction) {
                Some(direction) => commands::trace(&app_config, &entity, direction, max_depth),
                None => {
                    eprintln!("invalid --direction: expected upstream, downstream, or both");
                    Ok(commands::EXIT_INVALID_ARGS)
                }
            }
        }
        Commands::Impact { entity } => commands::impact(&app_config, &entity),
        Commands::Search { text, k } => commands::search(&app_config, &text, k).await,
        Commands::Serve { .. } => commands::serve(&cli.root, &app_config).await,
    };

    match code {
        Ok(code) => Ok(ExitCode::from(code as u8)),
        Err(e) => {
            eprintln!("error: {e:#}");
            Ok(ExitCode::from(commands::EXIT_INVALID_ARGS as u8))
        }
    }
}

fn parse_direction(s: &str) -> Option<traceai_tools::schema::DirectionParam> {
    use traceai_tools::schema::DirectionParam;
    match s.to_ascii_lowercase().as_str() {
        "upstream" => Some(DirectionParam::Upstream),
        "downstream" => Some(DirectionParam::Downstream),
        "both" => Some(DirectionParam::Both),
        _ => None,
    }
}
