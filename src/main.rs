mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries MCP traffic in `serve`, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "symbol_indexer=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(&cli)?;

    match cli.command {
        Commands::Index {
            paths,
            excludes,
            suffixes,
            parallelism,
            force,
            quiet,
        } => {
            cli::index_directories(&config, paths, excludes, suffixes, parallelism, force, quiet)?;
        }
        Commands::Serve => {
            cli::run_mcp_server(&config).await?;
        }
        Commands::Search { prefix, limit } => {
            cli::search(&config, &prefix, limit)?;
        }
        Commands::Get { name, file } => {
            cli::get(&config, &name, file.as_deref())?;
        }
        Commands::Context { name, file, depth } => {
            cli::context(&config, &name, file.as_deref(), depth)?;
        }
        Commands::Complete {
            prefix,
            max,
            simple,
        } => {
            cli::complete(&config, &prefix, max, simple)?;
        }
        Commands::Content { symbol, file, json } => {
            cli::content(&config, &symbol, file.as_deref(), json)?;
        }
        Commands::CompleteRealtime { prefix, max } => {
            cli::complete_realtime(&config, &prefix, max)?;
        }
        Commands::Skeleton { path } => {
            cli::skeleton(&path)?;
        }
        Commands::Files => {
            cli::files(&config)?;
        }
        Commands::Stats => {
            cli::stats(&config)?;
        }
        Commands::Diff { edits } => {
            cli::diff(&edits)?;
        }
        Commands::Apply { edits } => {
            cli::apply(&edits)?;
        }
    }

    Ok(())
}
