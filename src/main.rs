//! vbadoc - VBA macro documentation toolkit

mod analyze_cli;
mod serve_cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vbadoc")]
#[command(about = "Extract, graph and document VBA macros in spreadsheet files", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Analyze(analyze_cli::AnalyzeCommands),
    /// Serve the upload form and analysis endpoint
    Serve(serve_cli::ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(cmd) => analyze_cli::run(cmd).await?,
        Commands::Serve(args) => serve_cli::run(args).await?,
    }

    Ok(())
}
