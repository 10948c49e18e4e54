//! # Faucet
//!
//! One-shot airdrop requests against the cluster faucet. Transient network
//! failures are retried; a rate limit is not. Once the faucet rate-limits an
//! address, further requests for it are refused locally until the cooldown
//! elapses.

use std::sync::Arc;

use dashmap::DashMap;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey, signature::Signature};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::FaucetConfig;
use crate::error::{EnrollError, EnrollResult};
use crate::ledger::LedgerClient;
use crate::transaction::{Confirmation, SubmissionPipeline, retry_with_backoff};

pub struct Faucet<L: LedgerClient> {
    ledger: Arc<L>,
    config: FaucetConfig,
    /// Address -> instant its cooldown ends
    cooldowns: DashMap<Pubkey, Instant>,
}

impl<L: LedgerClient> Faucet<L> {
    pub fn new(ledger: Arc<L>, config: FaucetConfig) -> Self {
        Self {
            ledger,
            config,
            cooldowns: DashMap::new(),
        }
    }

    /// Ask the faucet to credit `address`. Returns the airdrop signature,
    /// which still has to be confirmed.
    pub async fn request_credit(&self, address: &Pubkey, lamports: u64) -> EnrollResult<Signature> {
        if lamports == 0 || lamports > self.config.max_lamports {
            return Err(EnrollError::Rejected(format!(
                "airdrop of {} lamports to {} is outside (0, {}]",
                lamports, address, self.config.max_lamports
            )));
        }

        self.check_cooldown(address)?;

        let result = retry_with_backoff(
            "request_airdrop",
            &self.config.retry,
            |err| matches!(err, EnrollError::NetworkTransient(_)),
            || self.ledger.request_airdrop(address, lamports),
        )
        .await;

        match result {
            Ok(signature) => {
                info!(
                    address = %address,
                    sol = lamports as f64 / LAMPORTS_PER_SOL as f64,
                    signature = %signature,
                    "Airdrop requested"
                );
                Ok(signature)
            }
            Err(EnrollError::RateLimited { scope, .. }) => {
                let until = Instant::now() + self.config.cooldown;
                self.cooldowns.insert(*address, until);
                warn!(
                    address = %address,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "Faucet rate limit hit, address cooling down"
                );
                Err(EnrollError::RateLimited {
                    scope,
                    retry_after: self.config.cooldown,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Request an airdrop and wait for it through the pipeline.
    pub async fn fund(
        &self,
        pipeline: &SubmissionPipeline<L>,
        address: &Pubkey,
        lamports: u64,
    ) -> EnrollResult<Confirmation> {
        // the faucet signs against a blockhash at least this recent
        let freshness = pipeline.fetch_freshness().await?;
        let signature = self.request_credit(address, lamports).await?;
        pipeline
            .await_confirmation(signature, freshness.last_valid_block_height)
            .await
    }

    /// Time left before `address` may ask again, if it is cooling down.
    pub fn cooldown_remaining(&self, address: &Pubkey) -> Option<std::time::Duration> {
        let until = *self.cooldowns.get(address)?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }

    fn check_cooldown(&self, address: &Pubkey) -> EnrollResult<()> {
        match self.cooldown_remaining(address) {
            Some(retry_after) => {
                warn!(address = %address, retry_after_secs = retry_after.as_secs(), "Address still cooling down");
                Err(EnrollError::RateLimited {
                    scope: format!("airdrop to {}", address),
                    retry_after,
                })
            }
            None => {
                self.cooldowns.remove(address);
                Ok(())
            }
        }
    }
}
