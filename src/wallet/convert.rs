//! Conversion between base58 secret strings (the format browser wallets
//! export) and wallet-file bytes.

use solana_sdk::signature::Keypair;
use zeroize::Zeroize;

use crate::error::{EnrollError, EnrollResult};
use crate::wallet::keypair;

/// Decode a base58 secret into a verified keypair.
pub fn keypair_from_base58(encoded: &str) -> EnrollResult<Keypair> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| EnrollError::MalformedKey(format!("invalid base58: {}", e)))?;
    keypair::load_owned(bytes)
}

pub fn keypair_to_base58(keypair: &Keypair) -> String {
    let mut bytes = keypair.to_bytes();
    let encoded = bs58::encode(&bytes).into_string();
    bytes.zeroize();
    encoded
}
