//! Configuration module for environment variables and command settings

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anchor_client::Cluster;
use anyhow::{Result, anyhow};
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};

use crate::ledger::Commitment;
use crate::transaction::RetryConfig;

/// Largest airdrop the public devnet faucet hands out in one request.
const DEFAULT_FAUCET_MAX_LAMPORTS: u64 = 2_000_000_000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Network endpoint and read commitment
    pub cluster: ClusterConfig,

    /// Submission and confirmation tuning
    pub pipeline: PipelineConfig,

    /// Faucet limits
    pub faucet: FaucetConfig,

    /// Default wallet and IDL locations
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub cluster: Cluster,
    pub commitment: Commitment,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Commitment a transaction must reach before `submit` reports success
    pub target: Commitment,
    /// Upper bound on the whole confirmation wait
    pub confirm_timeout: Duration,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Oldest freshness token the pipeline will still submit
    pub freshness_window: Duration,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct FaucetConfig {
    /// How long an address stays blocked after the faucet rate-limits it
    pub cooldown: Duration,
    pub max_lamports: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Throwaway wallet used for keygen, airdrop and transfer
    pub dev_wallet: PathBuf,
    /// Wallet that signs the enrollment
    pub enroll_wallet: PathBuf,
    /// Overrides the bundled prerequisite IDL
    pub idl_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target: Commitment::Confirmed,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            freshness_window: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            max_lamports: DEFAULT_FAUCET_MAX_LAMPORTS,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; missing or unparsable
    /// numbers fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| var(key, "").parse().unwrap_or(default);

        let cluster_name = var("SOLANA_CLUSTER", "devnet");
        let cluster = Cluster::from_str(&cluster_name)
            .map_err(|e| anyhow!("invalid SOLANA_CLUSTER `{}`: {}", cluster_name, e))?;
        let commitment = parse_commitment(&var("SOLANA_COMMITMENT", "confirmed"))?;

        let defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_attempts: u32::try_from(number("SUBMIT_MAX_ATTEMPTS", defaults.max_attempts as u64))
                .unwrap_or(defaults.max_attempts),
            base_backoff_ms: number("RETRY_BASE_BACKOFF_MS", defaults.base_backoff_ms),
            max_backoff_ms: number("RETRY_MAX_BACKOFF_MS", defaults.max_backoff_ms),
            jitter_factor: defaults.jitter_factor,
        };

        Ok(Self {
            cluster: ClusterConfig { cluster, commitment },

            pipeline: PipelineConfig {
                target: commitment,
                confirm_timeout: Duration::from_secs(number("CONFIRM_TIMEOUT_SECS", 60)),
                poll_interval: Duration::from_millis(number("CONFIRM_POLL_INTERVAL_MS", 500)),
                freshness_window: Duration::from_secs(number("FRESHNESS_WINDOW_SECS", 60)),
                retry: retry.clone(),
            },

            faucet: FaucetConfig {
                cooldown: Duration::from_secs(number("FAUCET_COOLDOWN_SECS", 60)),
                max_lamports: number("FAUCET_MAX_LAMPORTS", DEFAULT_FAUCET_MAX_LAMPORTS),
                retry,
            },

            wallet: WalletConfig {
                dev_wallet: PathBuf::from(var("DEV_WALLET_PATH", "dev-wallet.json")),
                enroll_wallet: PathBuf::from(var("ENROLL_WALLET_PATH", "enroll-wallet.json")),
                idl_path: lookup("PREREQ_IDL_PATH").map(PathBuf::from),
            },
        })
    }
}

/// Only `confirmed` and `finalized` are accepted: a processed transaction can
/// still be dropped by a fork.
pub fn parse_commitment(value: &str) -> Result<Commitment> {
    match value.trim().to_ascii_lowercase().as_str() {
        "confirmed" => Ok(Commitment::Confirmed),
        "finalized" => Ok(Commitment::Finalized),
        other => Err(anyhow!(
            "unsupported commitment `{}`, expected `confirmed` or `finalized`",
            other
        )),
    }
}

impl ClusterConfig {
    pub fn commitment_config(&self) -> CommitmentConfig {
        match self.commitment {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }

    /// Solana Explorer link for a transaction on this cluster.
    pub fn explorer_url(&self, signature: &Signature) -> String {
        let base = format!("https://explorer.solana.com/tx/{}", signature);
        match &self.cluster {
            Cluster::Mainnet => base,
            Cluster::Devnet => format!("{}?cluster=devnet", base),
            Cluster::Testnet => format!("{}?cluster=testnet", base),
            other => format!("{}?cluster=custom&customUrl={}", base, other.url()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_target_devnet() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.cluster.cluster, Cluster::Devnet);
        assert_eq!(config.pipeline.target, Commitment::Confirmed);
        assert_eq!(config.pipeline.confirm_timeout, Duration::from_secs(60));
        assert_eq!(config.faucet.max_lamports, 2_000_000_000);
        assert_eq!(config.wallet.dev_wallet, PathBuf::from("dev-wallet.json"));
        assert!(config.wallet.idl_path.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("SOLANA_CLUSTER", "localnet"),
            ("SOLANA_COMMITMENT", "finalized"),
            ("CONFIRM_POLL_INTERVAL_MS", "250"),
            ("SUBMIT_MAX_ATTEMPTS", "5"),
            ("FAUCET_COOLDOWN_SECS", "3600"),
            ("PREREQ_IDL_PATH", "idl/custom.json"),
        ])
        .unwrap();

        assert_eq!(config.cluster.cluster, Cluster::Localnet);
        assert_eq!(config.pipeline.target, Commitment::Finalized);
        assert_eq!(config.pipeline.poll_interval, Duration::from_millis(250));
        assert_eq!(config.pipeline.retry.max_attempts, 5);
        assert_eq!(config.faucet.retry.max_attempts, 5);
        assert_eq!(config.faucet.cooldown, Duration::from_secs(3600));
        assert_eq!(config.wallet.idl_path, Some(PathBuf::from("idl/custom.json")));
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let config = config_from(&[("CONFIRM_TIMEOUT_SECS", "soon")]).unwrap();
        assert_eq!(config.pipeline.confirm_timeout, Duration::from_secs(60));
    }

    #[test]
    fn attempts_beyond_u32_fall_back() {
        let config = config_from(&[("SUBMIT_MAX_ATTEMPTS", "4294967297")]).unwrap();
        assert_eq!(config.pipeline.retry.max_attempts, RetryConfig::default().max_attempts);
    }

    #[test]
    fn processed_commitment_is_refused() {
        assert!(parse_commitment("processed").is_err());
        assert!(config_from(&[("SOLANA_COMMITMENT", "processed")]).is_err());
        assert_eq!(parse_commitment(" Finalized ").unwrap(), Commitment::Finalized);
    }

    #[test]
    fn explorer_url_names_the_cluster() {
        let signature = Signature::default();
        let devnet = ClusterConfig { cluster: Cluster::Devnet, commitment: Commitment::Confirmed };
        assert!(devnet.explorer_url(&signature).ends_with("?cluster=devnet"));

        let mainnet = ClusterConfig { cluster: Cluster::Mainnet, commitment: Commitment::Confirmed };
        assert!(!mainnet.explorer_url(&signature).contains('?'));

        let local = ClusterConfig { cluster: Cluster::Localnet, commitment: Commitment::Confirmed };
        assert!(local.explorer_url(&signature).contains("customUrl=http://127.0.0.1:8899"));
    }
}
