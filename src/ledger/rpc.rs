//! JSON-RPC implementation of [`LedgerClient`] and the mapping from
//! `solana_client` errors onto the retry taxonomy.

use std::time::Duration;

use anchor_client::Cluster;
use async_trait::async_trait;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::RpcSendTransactionConfig,
    rpc_request::RpcError,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};

use crate::error::{EnrollError, EnrollResult};
use crate::ledger::{Commitment, LedgerClient, SignatureStatus};
use crate::transaction::FreshnessToken;

/// JSON-RPC error codes a healthy retry can clear: node behind, slot skipped,
/// block not yet available.
const TRANSIENT_RPC_CODES: &[i64] = &[-32004, -32005, -32007, -32014];

/// What the failing call was about, so errors carry the address or signature involved.
#[derive(Debug, Clone, Copy)]
enum CallContext {
    Send { fee_payer: Pubkey, signature: Signature },
    Airdrop { address: Pubkey, lamports: u64 },
    Query,
}

pub struct RpcLedgerClient {
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcLedgerClient {
    pub fn new(cluster: &Cluster, commitment: CommitmentConfig) -> Self {
        tracing::debug!(url = cluster.url(), commitment = ?commitment.commitment, "Creating RPC ledger client");
        Self {
            rpc: RpcClient::new_with_commitment(cluster.url().to_string(), commitment),
            commitment,
        }
    }

    fn classify(&self, err: ClientError, context: CallContext) -> EnrollError {
        if let Some(tx_err) = err.get_transaction_error() {
            return classify_transaction_error(tx_err, context);
        }

        match err.kind() {
            ClientErrorKind::Io(e) => EnrollError::NetworkTransient(e.to_string()),
            ClientErrorKind::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
                Some(429) => rate_limited(context),
                Some(code) if code >= 500 => EnrollError::NetworkTransient(e.to_string()),
                Some(_) => EnrollError::Rejected(e.to_string()),
                // no status: connect, timeout or body errors
                None => EnrollError::NetworkTransient(e.to_string()),
            },
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                if is_rate_limit_message(message) {
                    rate_limited(context)
                } else if TRANSIENT_RPC_CODES.contains(code) {
                    EnrollError::NetworkTransient(message.clone())
                } else {
                    EnrollError::Rejected(format!("RPC error {}: {}", code, message))
                }
            }
            ClientErrorKind::RpcError(rpc_err) => {
                let message = rpc_err.to_string();
                if is_rate_limit_message(&message) {
                    rate_limited(context)
                } else {
                    EnrollError::Rejected(message)
                }
            }
            _ => EnrollError::Rejected(err.to_string()),
        }
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests") || lower.contains("429")
}

fn rate_limited(context: CallContext) -> EnrollError {
    let scope = match context {
        CallContext::Airdrop { address, .. } => format!("airdrop to {}", address),
        CallContext::Send { fee_payer, .. } => format!("send from {}", fee_payer),
        CallContext::Query => "rpc".to_string(),
    };
    EnrollError::RateLimited {
        scope,
        retry_after: Duration::ZERO,
    }
}

fn classify_transaction_error(err: TransactionError, context: CallContext) -> EnrollError {
    match (err, context) {
        (TransactionError::BlockhashNotFound, _) => EnrollError::StaleFreshnessToken {
            age_secs: 0,
            window_secs: 0,
        },
        (TransactionError::AlreadyProcessed, CallContext::Send { signature, .. }) => {
            EnrollError::DuplicateTransaction(signature)
        }
        (
            err @ (TransactionError::InsufficientFundsForFee
            | TransactionError::AccountNotFound
            | TransactionError::InsufficientFundsForRent { .. }),
            CallContext::Send { fee_payer, .. },
        ) => EnrollError::InsufficientFunds {
            address: fee_payer,
            detail: err.to_string(),
        },
        (err, CallContext::Airdrop { address, lamports }) => {
            EnrollError::Rejected(format!("airdrop of {} lamports to {}: {}", lamports, address, err))
        }
        (err, _) => EnrollError::Rejected(err.to_string()),
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn latest_blockhash(&self) -> EnrollResult<FreshnessToken> {
        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| self.classify(e, CallContext::Query))?;
        Ok(FreshnessToken::new(blockhash, last_valid_block_height))
    }

    async fn block_height(&self) -> EnrollResult<u64> {
        self.rpc
            .get_block_height()
            .await
            .map_err(|e| self.classify(e, CallContext::Query))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> EnrollResult<Signature> {
        let context = CallContext::Send {
            fee_payer: transaction.message.account_keys.first().copied().unwrap_or_default(),
            signature: transaction.signatures.first().copied().unwrap_or_default(),
        };
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            // retries are driven by the pipeline, not the RPC node
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };

        self.rpc
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| self.classify(e, context))
    }

    async fn transaction_status(&self, signature: &Signature) -> EnrollResult<Option<SignatureStatus>> {
        let response = self
            .rpc
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| self.classify(e, CallContext::Query))?;

        Ok(response.value.into_iter().next().flatten().map(|status| {
            let commitment = if status.satisfies_commitment(CommitmentConfig::finalized()) {
                Commitment::Finalized
            } else if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                Commitment::Confirmed
            } else {
                Commitment::Processed
            };
            SignatureStatus {
                slot: status.slot,
                commitment,
                err: status.err.map(|e| e.to_string()),
            }
        }))
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> EnrollResult<Signature> {
        self.rpc
            .request_airdrop(address, lamports)
            .await
            .map_err(|e| self.classify(e, CallContext::Airdrop { address: *address, lamports }))
    }

    async fn balance(&self, address: &Pubkey) -> EnrollResult<u64> {
        self.rpc
            .get_balance(address)
            .await
            .map_err(|e| self.classify(e, CallContext::Query))
    }

    async fn fee_for_message(&self, message: &Message) -> EnrollResult<u64> {
        self.rpc
            .get_fee_for_message(message)
            .await
            .map_err(|e| self.classify(e, CallContext::Query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send_context() -> (Pubkey, Signature, CallContext) {
        let fee_payer = Pubkey::new_unique();
        let signature = Signature::new_unique();
        (fee_payer, signature, CallContext::Send { fee_payer, signature })
    }

    #[test]
    fn blockhash_not_found_is_stale() {
        let (_, _, context) = send_context();
        let err = classify_transaction_error(TransactionError::BlockhashNotFound, context);
        assert!(matches!(err, EnrollError::StaleFreshnessToken { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn already_processed_is_duplicate() {
        let (_, signature, context) = send_context();
        let err = classify_transaction_error(TransactionError::AlreadyProcessed, context);
        assert!(matches!(err, EnrollError::DuplicateTransaction(sig) if sig == signature));
    }

    #[test]
    fn unfunded_payer_is_insufficient_funds() {
        let (fee_payer, _, context) = send_context();
        for tx_err in [TransactionError::InsufficientFundsForFee, TransactionError::AccountNotFound] {
            let err = classify_transaction_error(tx_err, context);
            assert!(matches!(err, EnrollError::InsufficientFunds { address, .. } if address == fee_payer));
        }
    }

    #[test]
    fn other_transaction_errors_are_rejections() {
        let err = classify_transaction_error(TransactionError::AccountInUse, CallContext::Query);
        assert!(matches!(err, EnrollError::Rejected(_)));
    }

    #[test]
    fn rate_limit_messages_are_detected() {
        assert!(is_rate_limit_message("429 Too Many Requests"));
        assert!(is_rate_limit_message(
            "airdrop request failed. This can happen when the rate limit for your address has been reached"
        ));
        assert!(!is_rate_limit_message("Transaction simulation failed"));
    }

    #[test]
    fn airdrop_rate_limit_names_the_address() {
        let address = Pubkey::new_unique();
        let err = rate_limited(CallContext::Airdrop { address, lamports: 1 });
        assert!(matches!(err, EnrollError::RateLimited { ref scope, .. } if scope.contains(&address.to_string())));
    }
}
