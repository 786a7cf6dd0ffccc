//! Vanguard CLI entry point.

use clap::Parser;

use vanguard::cli::{Cli, Commands};
use vanguard::infrastructure::logging::init_logging;
use vanguard::infrastructure::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config failures fall back to default logging so the error is visible
    let logging = ConfigLoader::load()
        .map(|config| config.logging)
        .unwrap_or_default();
    let _guard = init_logging(&logging).ok().flatten();

    let result = match cli.command {
        Commands::Init(args) => vanguard::cli::commands::init::execute(args, cli.json).await,
        Commands::Mission(args) => vanguard::cli::commands::mission::execute(args, cli.json).await,
        Commands::Task(args) => vanguard::cli::commands::task::execute(args, cli.json).await,
        Commands::Agent(args) => vanguard::cli::commands::agent::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        vanguard::cli::handle_error(err, cli.json);
    }
}
