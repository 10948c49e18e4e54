//! # Enroll
//!
//! Client for the prerequisite enrollment program: provisions a throwaway
//! wallet, funds it from the cluster faucet, moves SOL around and submits the
//! `complete`/`update` enrollment instruction.
//!
//! ## Features
//! - Canonical PDA derivation and Anchor IDL instruction encoding
//! - Explicit build, sign, submit and confirm transaction pipeline
//! - Backoff with jitter on transient RPC failures
//! - Faucet rate-limit cooldowns per address
//! - Structured logging with tracing
//!
//! ## Architecture
//! - `wallet`: keypair generation, loading and wallet files
//! - `onchain_instance`: PDA, IDL and instruction encoding
//! - `transaction`: builder, submission pipeline and retry policy
//! - `ledger`: the RPC-facing `LedgerClient` seam
//! - `faucet`: airdrop requests and cooldowns
//! - `config`: environment variable configuration management
//! - `commands`: one handler per subcommand of the `enroll` binary

pub mod commands;
pub mod config;
pub mod error;
pub mod faucet;
pub mod ledger;
pub mod onchain_instance;
pub mod transaction;
pub mod wallet;

pub use error::{EnrollError, EnrollResult};
