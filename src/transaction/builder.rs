use std::collections::BTreeMap;
use std::time::Duration;

use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::Message,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use tokio::time::Instant;

use crate::error::{EnrollError, EnrollResult};

/// A recent blockhash and the block height after which it is no longer accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessToken {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    pub fetched_at: Instant,
}

impl FreshnessToken {
    pub fn new(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            blockhash,
            last_valid_block_height,
            fetched_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    Built,
    Signed,
}

/// A transaction on its way to the ledger: built, then signed.
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    instructions: Vec<Instruction>,
    fee_payer: Pubkey,
    freshness: FreshnessToken,
    stage: TransactionStage,
    inner: Transaction,
}

/// Assemble instructions into an unsigned transaction. Instruction order and
/// each instruction's account order are kept exactly as given.
pub fn build(
    instructions: Vec<Instruction>,
    fee_payer: Pubkey,
    freshness: FreshnessToken,
) -> EnrollResult<PreparedTransaction> {
    if instructions.is_empty() {
        return Err(EnrollError::Rejected("transaction has no instructions".to_string()));
    }

    let message = Message::new_with_blockhash(&instructions, Some(&fee_payer), &freshness.blockhash);
    let inner = Transaction::new_unsigned(message);

    // placeholder signatures are already sized, so this is the wire size
    let size = bincode::serialized_size(&inner)
        .map_err(|e| EnrollError::Rejected(format!("cannot size transaction: {}", e)))? as usize;
    if size > PACKET_DATA_SIZE {
        return Err(EnrollError::TransactionTooLarge {
            size,
            limit: PACKET_DATA_SIZE,
        });
    }

    tracing::debug!(
        fee_payer = %fee_payer,
        instructions = instructions.len(),
        signers = inner.message.header.num_required_signatures,
        size,
        "Built transaction"
    );

    Ok(PreparedTransaction {
        instructions,
        fee_payer,
        freshness,
        stage: TransactionStage::Built,
        inner,
    })
}

/// Sign with every supplied keypair that the transaction requires.
///
/// Keypairs that are not required signers are ignored; any required signer
/// still unsigned afterwards is reported as `MissingSigner`.
pub fn sign(mut transaction: PreparedTransaction, keypairs: &[&Keypair]) -> EnrollResult<PreparedTransaction> {
    let required = transaction.required_signers().to_vec();

    let mut selected: Vec<&Keypair> = Vec::with_capacity(required.len());
    for &keypair in keypairs {
        let pubkey = keypair.pubkey();
        if required.contains(&pubkey) && !selected.iter().any(|k| k.pubkey() == pubkey) {
            selected.push(keypair);
        }
    }

    let blockhash = transaction.freshness.blockhash;
    transaction
        .inner
        .try_partial_sign(&selected[..], blockhash)
        .map_err(|e| EnrollError::MalformedKey(format!("signing failed: {}", e)))?;

    let missing = transaction.missing_signers();
    if !missing.is_empty() {
        return Err(EnrollError::MissingSigner { missing });
    }

    transaction.stage = TransactionStage::Signed;
    tracing::debug!(signature = %transaction.signature(), "Transaction signed");
    Ok(transaction)
}

impl PreparedTransaction {
    pub fn stage(&self) -> TransactionStage {
        self.stage
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn freshness(&self) -> &FreshnessToken {
        &self.freshness
    }

    pub fn message(&self) -> &Message {
        &self.inner.message
    }

    pub fn as_transaction(&self) -> &Transaction {
        &self.inner
    }

    /// Signers in message order; the fee payer is always first.
    pub fn required_signers(&self) -> &[Pubkey] {
        let count = self.inner.message.header.num_required_signatures as usize;
        &self.inner.message.account_keys[..count]
    }

    /// Signatures present so far, keyed by signer.
    pub fn signatures(&self) -> BTreeMap<Pubkey, Signature> {
        self.required_signers()
            .iter()
            .zip(&self.inner.signatures)
            .filter(|(_, signature)| **signature != Signature::default())
            .map(|(key, signature)| (*key, *signature))
            .collect()
    }

    pub fn missing_signers(&self) -> Vec<Pubkey> {
        self.required_signers()
            .iter()
            .zip(&self.inner.signatures)
            .filter(|(_, signature)| **signature == Signature::default())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.missing_signers().is_empty()
    }

    /// The fee payer's signature, which is the transaction id once signed.
    pub fn signature(&self) -> Signature {
        self.inner.signatures.first().copied().unwrap_or_default()
    }

    pub fn raw_bytes(&self) -> EnrollResult<Vec<u8>> {
        bincode::serialize(&self.inner)
            .map_err(|e| EnrollError::Rejected(format!("cannot serialize transaction: {}", e)))
    }
}
