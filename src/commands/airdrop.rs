use std::path::PathBuf;

use anyhow::{Context, Result};
use solana_sdk::signature::Signer;

use crate::commands::{connect, lamports, report};
use crate::config::Config;
use crate::faucet::Faucet;
use crate::wallet;

pub async fn run(config: &Config, wallet: Option<PathBuf>, sol: f64) -> Result<()> {
    let path = wallet.unwrap_or_else(|| config.wallet.dev_wallet.clone());
    let keypair = wallet::read_wallet_file(&path)
        .with_context(|| format!("Failed to load wallet {}", path.display()))?;
    let address = keypair.pubkey();
    let lamports = lamports(sol)?;

    let pipeline = connect(config);
    let faucet = Faucet::new(pipeline.ledger().clone(), config.faucet.clone());

    tracing::info!(address = %address, sol, "Requesting airdrop");
    let confirmation = faucet
        .fund(&pipeline, &address, lamports)
        .await
        .with_context(|| format!("Airdrop of {} SOL to {} failed", sol, address))?;

    report(config, "Airdrop", &confirmation)
}
