//! toolhub: configure MCP tool-server instances and use their tools.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = toolhub_core::ConfigStore::new().load();
    let service = commands::build_service(&config)?;

    match cli.command {
        Commands::Servers { ref id } => commands::servers::run(&service, id.as_deref())?,
        Commands::Instance { action } => {
            commands::instance::run(&service, &cli.project, action).await?
        }
        Commands::Tools { ref name } => {
            commands::tools::run(&service, &cli.project, name.as_deref()).await?
        }
        Commands::Call { ref tool, ref args } => {
            commands::call::run(&service, &cli.project, tool, args.as_deref()).await?
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise warnings only, or debug for toolhub crates
/// with `--verbose`. Logs go to stderr so command output stays clean.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "warn,toolhub=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
