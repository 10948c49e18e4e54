use std::path::PathBuf;

use anyhow::{Context, Result};
use solana_sdk::signature::Signer;

use crate::config::Config;
use crate::wallet;

pub fn run(config: &Config, out: Option<PathBuf>, force: bool) -> Result<()> {
    let path = out.unwrap_or_else(|| config.wallet.dev_wallet.clone());
    let keypair = wallet::generate();

    wallet::write_wallet_file(&path, &keypair, force)
        .with_context(|| format!("Failed to write wallet to {}", path.display()))?;

    tracing::info!(address = %keypair.pubkey(), path = %path.display(), "Generated new wallet");
    println!("Generated wallet {}", keypair.pubkey());
    println!("Saved to {}", path.display());
    Ok(())
}
