//! # Wallet Module
//!
//! Keypair generation and loading, plus the wallet-file and base58 plumbing
//! around it.
//!
//! ## Features
//! - Fresh keypairs from OS randomness
//! - Strict 64-byte secret loading with public-half verification
//! - JSON byte-array wallet files
//! - Base58 secret string conversion

pub mod convert;
pub mod file;
pub mod keypair;

pub use file::{read_wallet_file, write_wallet_file};
pub use keypair::generate;
