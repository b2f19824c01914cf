#![allow(dead_code)]
mod cli;
mod config;
mod grpc;
mod http;
mod manager;
mod nats;
mod serve;
mod sms;
mod timeseries;
mod update;

use cli::{Cli, Commands};
use clap::Parser;
use config::Config;
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli_args = Cli::parse();

    match cli_args.command {
        Commands::Serve => {
            let config = Config {
                data_dir: cli_args.data_dir.clone(),
                ..Config::default()
            };
            config.ensure_data_dir()?;
            let errors = config.validate();
            if !errors.is_empty() {
                for e in &errors {
                    error!("config error: {}", e);
                }
                anyhow::bail!("invalid configuration");
            }
            serve::run(config).await?;
        }

        Commands::Node(cmd) => cli::node::run(cmd, &cli_args.server).await?,
        Commands::Edge(cmd) => cli::edge::run(cmd, &cli_args.server).await?,
        Commands::Stats => cli::stats::run(&cli_args.server).await?,
        Commands::Doctor => {
            let config = Config {
                data_dir: cli_args.data_dir.clone(),
                ..Config::default()
            };
            cli::doctor::run(config, &cli_args.server).await?;
        }
    }

    Ok(())
}
