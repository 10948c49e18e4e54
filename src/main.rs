//! # Enroll
//!
//! The `enroll` command line over the `enroll_client` library.
//!
//! ## Environment Setup
//! Copy `.env.example` to `.env` and adjust:
//! ```bash
//! cp .env.example .env
//! ```
//!
//! ## Usage
//! ```bash
//! enroll keygen
//! enroll airdrop --sol 2
//! enroll transfer --to <ADDRESS> --all
//! enroll enroll --github <HANDLE>
//! ```

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use enroll_client::commands::{self, Cli};
use enroll_client::config::Config;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false) // Don't show module targets for cleaner output
                .compact(),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    cli.apply(&mut config)?;

    tracing::debug!(
        cluster = config.cluster.cluster.url(),
        commitment = ?config.pipeline.target,
        "Loaded configuration"
    );

    commands::run(cli, config).await
}
