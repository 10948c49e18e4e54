//! Scripted in-memory ledger for exercising the pipeline and faucet.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    hash::Hash, message::Message, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};

use crate::error::{EnrollError, EnrollResult};
use crate::ledger::{Commitment, LedgerClient, SignatureStatus};
use crate::transaction::FreshnessToken;

pub struct MockLedger {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    block_height: Mutex<u64>,
    send_script: Mutex<VecDeque<EnrollResult<()>>>,
    status_script: Mutex<VecDeque<EnrollResult<Option<SignatureStatus>>>>,
    status_default: Mutex<Option<SignatureStatus>>,
    airdrop_script: Mutex<VecDeque<EnrollResult<Signature>>>,
    balance: Mutex<u64>,
    fee: u64,
    pub sent: Mutex<Vec<Transaction>>,
    pub send_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub airdrop_calls: AtomicUsize,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 1_150,
            block_height: Mutex::new(1_000),
            send_script: Mutex::new(VecDeque::new()),
            status_script: Mutex::new(VecDeque::new()),
            status_default: Mutex::new(None),
            airdrop_script: Mutex::new(VecDeque::new()),
            balance: Mutex::new(0),
            fee: 5_000,
            sent: Mutex::new(Vec::new()),
            send_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            airdrop_calls: AtomicUsize::new(0),
        }
    }
}

impl MockLedger {
    /// Queue the outcome of the next `send_transaction`. Unscripted sends succeed.
    pub fn push_send(&self, result: EnrollResult<()>) {
        self.send_script.lock().push_back(result);
    }

    /// Queue the answer to the next status poll.
    pub fn push_status(&self, result: EnrollResult<Option<SignatureStatus>>) {
        self.status_script.lock().push_back(result);
    }

    /// Answer given once the status script runs dry.
    pub fn set_status_default(&self, status: Option<SignatureStatus>) {
        *self.status_default.lock() = status;
    }

    pub fn push_airdrop(&self, result: EnrollResult<Signature>) {
        self.airdrop_script.lock().push_back(result);
    }

    pub fn set_block_height(&self, height: u64) {
        *self.block_height.lock() = height;
    }

    pub fn set_balance(&self, lamports: u64) {
        *self.balance.lock() = lamports;
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn landed(commitment: Commitment) -> Option<SignatureStatus> {
    Some(SignatureStatus {
        slot: 42,
        commitment,
        err: None,
    })
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn latest_blockhash(&self) -> EnrollResult<FreshnessToken> {
        Ok(FreshnessToken::new(self.blockhash, self.last_valid_block_height))
    }

    async fn block_height(&self) -> EnrollResult<u64> {
        Ok(*self.block_height.lock())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> EnrollResult<Signature> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.send_script.lock().pop_front().unwrap_or(Ok(()));
        scripted?;
        self.sent.lock().push(transaction.clone());
        transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| EnrollError::Rejected("transaction has no signatures".to_string()))
    }

    async fn transaction_status(&self, _signature: &Signature) -> EnrollResult<Option<SignatureStatus>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.status_script.lock().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(self.status_default.lock().clone()),
        }
    }

    async fn request_airdrop(&self, _address: &Pubkey, _lamports: u64) -> EnrollResult<Signature> {
        self.airdrop_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.airdrop_script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(Signature::new_unique()))
    }

    async fn balance(&self, _address: &Pubkey) -> EnrollResult<u64> {
        Ok(*self.balance.lock())
    }

    async fn fee_for_message(&self, _message: &Message) -> EnrollResult<u64> {
        Ok(self.fee)
    }
}
