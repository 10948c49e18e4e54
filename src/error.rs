//! # Error Types
//!
//! Every failure the enrollment client can report, from malformed key material
//! up to ledger-side rejections. Encoding and building errors are programmer
//! errors and are never retried; `is_transient` marks the network failures the
//! submission pipeline retries with backoff.

use std::time::Duration;

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

pub type EnrollResult<T> = std::result::Result<T, EnrollError>;

#[derive(Debug, Error)]
pub enum EnrollError {
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Invalid PDA seeds: {0}")]
    InvalidSeeds(String),

    #[error("No valid bump in [0, 255] for {seed_count} seeds under program {program_id}")]
    NoValidBump {
        program_id: Pubkey,
        seed_count: usize,
    },

    #[error("Invalid IDL: {0}")]
    InvalidIdl(String),

    #[error("Unknown method `{method}` in program `{program}`")]
    UnknownMethod {
        method: String,
        program: String,
    },

    #[error("Argument mismatch for `{method}`: {reason}")]
    ArgumentMismatch {
        method: String,
        reason: String,
    },

    #[error("Account mismatch for `{method}`: {reason}")]
    AccountMismatch {
        method: String,
        reason: String,
    },

    #[error("Missing signatures for required signers: {}", format_keys(missing))]
    MissingSigner {
        missing: Vec<Pubkey>,
    },

    #[error("Transaction is not fully signed, unsigned: {}", format_keys(missing))]
    IncompleteSignature {
        missing: Vec<Pubkey>,
    },

    #[error("Transaction is {size} bytes, limit is {limit}")]
    TransactionTooLarge {
        size: usize,
        limit: usize,
    },

    #[error("Freshness token is stale ({age_secs}s old, window {window_secs}s)")]
    StaleFreshnessToken {
        age_secs: u64,
        window_secs: u64,
    },

    #[error("Rate limited ({scope}), retry in {}s", retry_after.as_secs())]
    RateLimited {
        scope: String,
        retry_after: Duration,
    },

    #[error("Insufficient funds in {address}: {detail}")]
    InsufficientFunds {
        address: Pubkey,
        detail: String,
    },

    #[error("Duplicate transaction {0}")]
    DuplicateTransaction(Signature),

    #[error("Timed out after {}s waiting for {signature}, outcome unknown", waited.as_secs())]
    Timeout {
        signature: Signature,
        waited: Duration,
    },

    #[error("Transient network error: {0}")]
    NetworkTransient(String),

    #[error("Rejected by ledger: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EnrollError {
    /// Whether the failure is worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EnrollError::NetworkTransient(_) | EnrollError::RateLimited { .. }
        )
    }
}

fn format_keys(keys: &[Pubkey]) -> String {
    keys.iter()
        .map(|key| key.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
