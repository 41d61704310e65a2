//! kvs - unified CLI entrypoint.
//!
//! Usage:
//!   kvs run [--script requests.txt] [--stale] [--config config/kvs.toml]
//!   kvs config validate --config config/kvs.toml
//!   kvs config show --config config/kvs.toml [--format json]

use anyhow::{Context, Result};
use clap::Parser;
use kvs::cli::commands::{run_config, run_run};
use kvs::cli::{init_tracing, Cli, Commands};
use kvs::core::config::{Config, ConfigOverrides};
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "config/kvs.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(args) => {
            let config_path = cli
                .config
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            run_config(args, &config_path)
        }
        Commands::Run(args) => {
            // Without --config the built-in defaults apply.
            let mut config = match cli.config {
                Some(ref path) => Config::from_file(&PathBuf::from(path))
                    .with_context(|| format!("failed to load config from {:?}", path))?,
                None => Config::default(),
            };
            config.apply_overrides(&ConfigOverrides {
                log_level: cli.log_level,
                ..Default::default()
            });
            config.validate()?;

            init_tracing(&config.telemetry.log_level);
            run_run(config, args).await
        }
    }
}
