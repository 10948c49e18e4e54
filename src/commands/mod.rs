//! # Commands
//!
//! The `enroll` command line: argument parsing and one handler per
//! subcommand. Handlers build on the library modules and report failures
//! through `anyhow` so `main` can log them and exit non-zero.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use solana_sdk::{
    instruction::Instruction,
    native_token::sol_str_to_lamports,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

use crate::config::{Config, parse_commitment};
use crate::error::EnrollError;
use crate::ledger::{LedgerClient, RpcLedgerClient};
use crate::transaction::pipeline::FailureReason;
use crate::transaction::{Confirmation, SubmissionPipeline, build, sign};

pub mod airdrop;
pub mod convert;
pub mod enroll;
pub mod keygen;
pub mod transfer;

#[derive(Parser, Debug)]
#[command(name = "enroll", author, version)]
#[command(about = "Provision a devnet wallet, fund it and submit the prerequisite enrollment", long_about = None)]
pub struct Cli {
    /// Cluster moniker (devnet, testnet, mainnet, localnet) or RPC URL
    #[arg(long, global = true, env = "SOLANA_CLUSTER")]
    pub cluster: Option<String>,

    /// Commitment to wait for: confirmed or finalized
    #[arg(long, global = true, env = "SOLANA_COMMITMENT")]
    pub commitment: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a new keypair and save it as a wallet file
    Keygen {
        /// Where to write the wallet (defaults to DEV_WALLET_PATH)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Overwrite an existing wallet file
        #[arg(long)]
        force: bool,
    },
    /// Request SOL from the cluster faucet
    Airdrop {
        #[arg(long)]
        wallet: Option<PathBuf>,
        #[arg(long, default_value_t = 2.0)]
        sol: f64,
    },
    /// Transfer SOL to another address
    Transfer {
        #[arg(long)]
        to: Pubkey,
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        sol: Option<f64>,
        /// Send the whole balance minus the network fee
        #[arg(long)]
        all: bool,
        #[arg(long)]
        wallet: Option<PathBuf>,
    },
    /// Record a GitHub handle with the prerequisite program
    Enroll {
        #[arg(long)]
        github: String,
        /// Defaults to ENROLL_WALLET_PATH
        #[arg(long)]
        wallet: Option<PathBuf>,
        /// Program IDL (defaults to PREREQ_IDL_PATH, then the bundled one)
        #[arg(long)]
        idl: Option<PathBuf>,
        /// Overrides the program address declared by the IDL
        #[arg(long)]
        program_id: Option<Pubkey>,
        /// Call `update` instead of `complete`
        #[arg(long)]
        update: bool,
    },
    /// Convert a base58 secret key (read from stdin) into a wallet file byte array
    Base58ToWallet {
        /// Write the wallet here instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Print a wallet file's secret key as base58
    WalletToBase58 {
        #[arg(long)]
        wallet: Option<PathBuf>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the environment configuration.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(cluster) = &self.cluster {
            config.cluster.cluster = cluster
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid cluster `{}`: {}", cluster, e))?;
        }
        if let Some(commitment) = &self.commitment {
            let commitment = parse_commitment(commitment)?;
            config.cluster.commitment = commitment;
            config.pipeline.target = commitment;
        }
        Ok(())
    }
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Keygen { out, force } => keygen::run(&config, out, force),
        Command::Airdrop { wallet, sol } => airdrop::run(&config, wallet, sol).await,
        Command::Transfer { to, sol, all, wallet } => {
            let amount = match (sol, all) {
                (_, true) => transfer::Amount::All,
                (Some(sol), false) => transfer::Amount::Sol(sol),
                (None, false) => bail!("either --sol or --all is required"),
            };
            transfer::run(&config, wallet, to, amount).await
        }
        Command::Enroll {
            github,
            wallet,
            idl,
            program_id,
            update,
        } => enroll::run(&config, wallet, idl, program_id, &github, update).await,
        Command::Base58ToWallet { out, force } => convert::base58_to_wallet(out, force),
        Command::WalletToBase58 { wallet } => convert::wallet_to_base58(&config, wallet),
    }
}

pub(crate) fn connect(config: &Config) -> SubmissionPipeline<RpcLedgerClient> {
    let ledger = RpcLedgerClient::new(&config.cluster.cluster, config.cluster.commitment_config());
    SubmissionPipeline::new(Arc::new(ledger), config.pipeline.clone())
}

/// Whole lamports in `sol`. Negative amounts and sub-lamport precision are refused.
pub(crate) fn lamports(sol: f64) -> Result<u64> {
    sol_str_to_lamports(&sol.to_string()).with_context(|| format!("Invalid SOL amount {}", sol))
}

/// Build, sign and submit `instructions` with `payer` as fee payer and sole signer.
pub(crate) async fn send<L: LedgerClient>(
    pipeline: &SubmissionPipeline<L>,
    instructions: Vec<Instruction>,
    payer: &Keypair,
) -> Result<Confirmation> {
    let freshness = pipeline
        .fetch_freshness()
        .await
        .context("Failed to fetch a recent blockhash")?;
    let built = build(instructions, payer.pubkey(), freshness).context("Failed to build transaction")?;
    let signed = sign(built, &[payer]).context("Failed to sign transaction")?;
    pipeline.submit(&signed).await.context("Failed to submit transaction")
}

/// Print the outcome of a confirmed transaction, or turn a failed one into an error.
pub(crate) fn report(config: &Config, action: &str, confirmation: &Confirmation) -> Result<()> {
    match confirmation.failure() {
        Some(FailureReason::Timeout) => {
            let waited = (Utc::now() - confirmation.submitted_at).to_std().unwrap_or_default();
            return Err(EnrollError::Timeout {
                signature: confirmation.signature,
                waited,
            })
            .with_context(|| format!("{} was not confirmed", action));
        }
        Some(reason) => bail!("{} failed for {}: {}", action, confirmation.signature, reason),
        None => {}
    }

    tracing::info!(
        signature = %confirmation.signature,
        status = %confirmation.status,
        slot = confirmation.slot.unwrap_or_default(),
        "{} complete",
        action
    );
    println!("{} {}: {}", action, confirmation.status, confirmation.signature);
    println!("{}", config.cluster.explorer_url(&confirmation.signature));
    Ok(())
}
