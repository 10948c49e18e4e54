//! # Transaction Module
//!
//! Building, signing and submitting transactions:
//! - `builder`: assembles instructions under a fee payer and freshness token, then signs
//! - `pipeline`: submits signed transactions and polls them to a terminal status
//! - `retry`: exponential backoff with jitter for transient ledger failures

pub mod builder;
pub mod pipeline;
pub mod retry;

pub use builder::{FreshnessToken, build, sign};
pub use pipeline::{Confirmation, SubmissionPipeline};
pub use retry::{RetryConfig, retry_with_backoff};
