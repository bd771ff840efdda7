// src/main.rs — KitForge entry point

use clap::Parser;

use kitforge::cli::{self, Cli, Commands};
use kitforge::infra::config::Config;
use kitforge::infra::logger;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG when set
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref().map(std::path::Path::new))?;

    match cli.command {
        Commands::Serve { port } => cli::run_serve(&config, port).await,
        Commands::Plan {
            query,
            budget,
            style,
        } => cli::run_plan(&query, budget, &style),
    }
}
