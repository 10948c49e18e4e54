use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use solana_sdk::{
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use solana_system_interface::instruction as system_instruction;

use crate::commands::{connect, lamports, report, send};
use crate::config::Config;
use crate::ledger::LedgerClient;
use crate::transaction::{Confirmation, SubmissionPipeline, build};
use crate::wallet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amount {
    Sol(f64),
    /// Everything except the fee for the transfer itself
    All,
}

pub async fn run(config: &Config, wallet: Option<PathBuf>, to: Pubkey, amount: Amount) -> Result<()> {
    let path = wallet.unwrap_or_else(|| config.wallet.dev_wallet.clone());
    let keypair = wallet::read_wallet_file(&path)
        .with_context(|| format!("Failed to load wallet {}", path.display()))?;

    let pipeline = connect(config);
    let confirmation = transfer(&pipeline, &keypair, &to, amount).await?;
    report(config, "Transfer", &confirmation)
}

pub async fn transfer<L: LedgerClient>(
    pipeline: &SubmissionPipeline<L>,
    from: &Keypair,
    to: &Pubkey,
    amount: Amount,
) -> Result<Confirmation> {
    let lamports = match amount {
        Amount::Sol(sol) => lamports(sol)?,
        Amount::All => drain_amount(pipeline, from, to).await?,
    };
    if lamports == 0 {
        bail!("Refusing to transfer 0 lamports");
    }

    tracing::info!(
        from = %from.pubkey(),
        to = %to,
        sol = lamports as f64 / LAMPORTS_PER_SOL as f64,
        "Transferring"
    );
    let ix = system_instruction::transfer(&from.pubkey(), to, lamports);
    send(pipeline, vec![ix], from).await
}

/// Balance minus the fee the ledger quotes for the draining transfer.
async fn drain_amount<L: LedgerClient>(pipeline: &SubmissionPipeline<L>, from: &Keypair, to: &Pubkey) -> Result<u64> {
    let ledger = pipeline.ledger();
    let balance = ledger
        .balance(&from.pubkey())
        .await
        .with_context(|| format!("Failed to fetch balance of {}", from.pubkey()))?;

    let freshness = pipeline
        .fetch_freshness()
        .await
        .context("Failed to fetch a recent blockhash")?;
    let probe = build(
        vec![system_instruction::transfer(&from.pubkey(), to, balance)],
        from.pubkey(),
        freshness,
    )?;
    let fee = ledger
        .fee_for_message(probe.message())
        .await
        .context("Failed to quote transaction fee")?;

    if balance <= fee {
        bail!("Balance of {} lamports does not cover the {} lamport fee", balance, fee);
    }
    tracing::debug!(balance, fee, "Draining wallet");
    Ok(balance - fee)
}
