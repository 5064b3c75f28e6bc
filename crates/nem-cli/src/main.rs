mod cli;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use config::NemConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = Cli::parse();
    let load = || -> anyhow::Result<NemConfig> {
        let config = NemConfig::load_or_default(&opts.config)?.with_data_dir(opts.data_dir.clone());
        tracing::debug!("data directory {}", config.data.dir.display());
        Ok(config)
    };

    match opts.command {
        Commands::Query(args) => cli::query::run(args, &load()?).await,
        Commands::Resolve(args) => cli::resolve::run(args, &load()?),
        Commands::Warm(args) => cli::warm::run(args, &load()?).await,
        Commands::Cache(cmd) => cli::cache::run(cmd, &load()?),
        Commands::Config(cmd) => cli::config_cmd::run(cmd, &opts.config, opts.data_dir.clone()),
    }
}
