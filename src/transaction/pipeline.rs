//! # Submission Pipeline
//!
//! Drives a signed transaction through `Signed → Submitted → {Confirmed,
//! Finalized, Failed}`. Sends are retried with backoff while the failure is
//! transient; every other ledger verdict becomes a terminal `Failed(reason)`.
//!
//! A `Failed(Timeout)` means the outcome is unknown: the ledger may still
//! include the transaction until its freshness token expires. Dropping the
//! future returned by [`SubmissionPipeline::await_confirmation`] only stops
//! local waiting.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use solana_sdk::signature::Signature;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{EnrollError, EnrollResult};
use crate::ledger::{Commitment, LedgerClient};
use crate::transaction::builder::{FreshnessToken, PreparedTransaction};
use crate::transaction::retry::retry_with_backoff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Nothing conclusive within the confirmation timeout.
    Timeout,
    StaleFreshnessToken,
    InsufficientFunds(String),
    Duplicate,
    RateLimited,
    Rejected(String),
    ExecutionFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Submitted,
    Confirmed,
    Finalized,
    Failed(FailureReason),
}

#[derive(Debug, Clone)]
pub struct Confirmation {
    pub signature: Signature,
    pub status: ConfirmationStatus,
    pub submitted_at: DateTime<Utc>,
    /// Slot the transaction landed in, when known.
    pub slot: Option<u64>,
}

impl Confirmation {
    fn new(signature: Signature, status: ConfirmationStatus) -> Self {
        Self {
            signature,
            status,
            submitted_at: Utc::now(),
            slot: None,
        }
    }

    fn failed(signature: Signature, reason: FailureReason) -> Self {
        Self::new(signature, ConfirmationStatus::Failed(reason))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ConfirmationStatus::Confirmed | ConfirmationStatus::Finalized)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            ConfirmationStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "confirmation timed out, outcome unknown"),
            FailureReason::StaleFreshnessToken => write!(f, "freshness token expired"),
            FailureReason::InsufficientFunds(detail) => write!(f, "insufficient funds: {}", detail),
            FailureReason::Duplicate => write!(f, "duplicate transaction"),
            FailureReason::RateLimited => write!(f, "rate limited"),
            FailureReason::Rejected(detail) => write!(f, "rejected: {}", detail),
            FailureReason::ExecutionFailed(detail) => write!(f, "execution failed: {}", detail),
        }
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationStatus::Submitted => write!(f, "submitted"),
            ConfirmationStatus::Confirmed => write!(f, "confirmed"),
            ConfirmationStatus::Finalized => write!(f, "finalized"),
            ConfirmationStatus::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Terminal ledger verdicts become failure reasons. Anything else is handed
/// back to the caller untouched.
fn failure_reason(err: EnrollError) -> Result<FailureReason, EnrollError> {
    match err {
        EnrollError::StaleFreshnessToken { .. } => Ok(FailureReason::StaleFreshnessToken),
        EnrollError::InsufficientFunds { address, detail } => {
            Ok(FailureReason::InsufficientFunds(format!("{}: {}", address, detail)))
        }
        EnrollError::DuplicateTransaction(_) => Ok(FailureReason::Duplicate),
        EnrollError::RateLimited { .. } => Ok(FailureReason::RateLimited),
        EnrollError::Rejected(detail) => Ok(FailureReason::Rejected(detail)),
        other => Err(other),
    }
}

pub struct SubmissionPipeline<L: LedgerClient> {
    ledger: Arc<L>,
    config: PipelineConfig,
}

impl<L: LedgerClient> SubmissionPipeline<L> {
    pub fn new(ledger: Arc<L>, config: PipelineConfig) -> Self {
        Self { ledger, config }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch a freshness token to build against.
    pub async fn fetch_freshness(&self) -> EnrollResult<FreshnessToken> {
        retry_with_backoff("latest_blockhash", &self.config.retry, EnrollError::is_transient, || {
            self.ledger.latest_blockhash()
        })
        .await
    }

    /// Submit a signed transaction and wait for the target commitment.
    ///
    /// Returns `Err` only for local precondition failures and for transient
    /// errors that outlasted every retry; ledger verdicts come back as
    /// `Ok(Confirmation)` with a `Failed` status.
    pub async fn submit(&self, transaction: &PreparedTransaction) -> EnrollResult<Confirmation> {
        let submitted = self.send(transaction).await?;
        if submitted.status != ConfirmationStatus::Submitted {
            return Ok(submitted);
        }

        let confirmation = self
            .await_confirmation(submitted.signature, transaction.freshness().last_valid_block_height)
            .await?;
        Ok(Confirmation {
            submitted_at: submitted.submitted_at,
            ..confirmation
        })
    }

    /// Hand a signed transaction to the ledger without waiting for it.
    ///
    /// An accepted transaction comes back as `Submitted`; a refused one as
    /// `Failed(reason)`.
    pub async fn send(&self, transaction: &PreparedTransaction) -> EnrollResult<Confirmation> {
        if !transaction.is_fully_signed() {
            return Err(EnrollError::IncompleteSignature {
                missing: transaction.missing_signers(),
            });
        }

        let expected = transaction.signature();
        let age = transaction.freshness().age();
        if age > self.config.freshness_window {
            warn!(
                signature = %expected,
                age_secs = age.as_secs(),
                window_secs = self.config.freshness_window.as_secs(),
                "Freshness token expired before submission"
            );
            return Ok(Confirmation::failed(expected, FailureReason::StaleFreshnessToken));
        }

        let submitted_at = Utc::now();
        let sent = retry_with_backoff("send_transaction", &self.config.retry, EnrollError::is_transient, || {
            self.ledger.send_transaction(transaction.as_transaction())
        })
        .await;

        let (signature, status) = match sent {
            Ok(signature) => {
                info!(signature = %signature, "Transaction submitted, awaiting confirmation");
                (signature, ConfirmationStatus::Submitted)
            }
            Err(err) => {
                let reason = failure_reason(err)?;
                warn!(signature = %expected, reason = %reason, "Submission failed");
                (expected, ConfirmationStatus::Failed(reason))
            }
        };
        Ok(Confirmation {
            submitted_at,
            ..Confirmation::new(signature, status)
        })
    }

    /// Poll until `signature` reaches the target commitment, fails on-chain,
    /// its freshness token expires, or the confirmation timeout elapses.
    pub async fn await_confirmation(
        &self,
        signature: Signature,
        last_valid_block_height: u64,
    ) -> EnrollResult<Confirmation> {
        let started = Instant::now();
        match timeout(
            self.config.confirm_timeout,
            self.poll_status(signature, last_valid_block_height),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    signature = %signature,
                    waited_secs = started.elapsed().as_secs(),
                    "Confirmation timed out, transaction may still land"
                );
                Ok(Confirmation::failed(signature, FailureReason::Timeout))
            }
        }
    }

    async fn poll_status(&self, signature: Signature, last_valid_block_height: u64) -> EnrollResult<Confirmation> {
        let mut slot = None;

        loop {
            match self.ledger.transaction_status(&signature).await {
                Ok(Some(status)) => {
                    slot = Some(status.slot);
                    if let Some(err) = status.err {
                        warn!(signature = %signature, slot = status.slot, error = %err, "Transaction failed on-chain");
                        return Ok(Confirmation {
                            slot,
                            ..Confirmation::failed(signature, FailureReason::ExecutionFailed(err))
                        });
                    }
                    if status.commitment >= self.config.target {
                        let reached = match status.commitment {
                            Commitment::Finalized => ConfirmationStatus::Finalized,
                            _ => ConfirmationStatus::Confirmed,
                        };
                        info!(signature = %signature, slot = status.slot, status = %reached, "Transaction confirmed");
                        return Ok(Confirmation {
                            slot,
                            ..Confirmation::new(signature, reached)
                        });
                    }
                    debug!(signature = %signature, commitment = ?status.commitment, "Waiting for target commitment");
                }
                // once landed, the blockhash no longer matters
                Ok(None) if slot.is_none() => {
                    if self.freshness_expired(last_valid_block_height).await? {
                        warn!(signature = %signature, last_valid_block_height, "Freshness token expired before landing");
                        return Ok(Confirmation::failed(signature, FailureReason::StaleFreshnessToken));
                    }
                }
                Ok(None) => {}
                Err(err) if err.is_transient() => {
                    debug!(signature = %signature, error = %err, "Status poll failed, polling again");
                }
                Err(err) => return Err(err),
            }

            sleep(self.config.poll_interval).await;
        }
    }

    async fn freshness_expired(&self, last_valid_block_height: u64) -> EnrollResult<bool> {
        match self.ledger.block_height().await {
            Ok(height) => Ok(height > last_valid_block_height),
            Err(err) if err.is_transient() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
