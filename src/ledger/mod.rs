//! # Ledger Module
//!
//! The network collaborator behind the submission pipeline and the faucet.
//! Everything that talks to a cluster goes through [`LedgerClient`], so the
//! pipeline can be driven by the RPC implementation in production and by a
//! scripted ledger in tests.

use async_trait::async_trait;
use solana_sdk::{message::Message, pubkey::Pubkey, signature::Signature, transaction::Transaction};

use crate::error::EnrollResult;
use crate::transaction::FreshnessToken;

#[cfg(test)]
pub mod mock;
pub mod rpc;

pub use rpc::RpcLedgerClient;

/// Commitment a signature has reached on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

/// Ledger view of one submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub commitment: Commitment,
    /// Execution error, if the transaction landed but failed.
    pub err: Option<String>,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch a recent blockhash together with its expiry height.
    async fn latest_blockhash(&self) -> EnrollResult<FreshnessToken>;

    async fn block_height(&self) -> EnrollResult<u64>;

    /// Hand a signed transaction to the network. Returns once accepted, not once confirmed.
    async fn send_transaction(&self, transaction: &Transaction) -> EnrollResult<Signature>;

    /// `None` while the ledger has no record of the signature.
    async fn transaction_status(&self, signature: &Signature) -> EnrollResult<Option<SignatureStatus>>;

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> EnrollResult<Signature>;

    async fn balance(&self, address: &Pubkey) -> EnrollResult<u64>;

    async fn fee_for_message(&self, message: &Message) -> EnrollResult<u64>;
}
