use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{Context, Result};
use solana_sdk::signature::Signer;
use zeroize::Zeroize;

use crate::config::Config;
use crate::wallet::{self, convert};

/// Reads the base58 secret from stdin so it never lands in shell history.
pub fn base58_to_wallet(out: Option<PathBuf>, force: bool) -> Result<()> {
    println!("Paste the base58 private key and press enter:");
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read private key from stdin")?;

    let parsed = convert::keypair_from_base58(&line);
    line.zeroize();
    let keypair = parsed.context("Failed to decode base58 private key")?;

    match out {
        Some(path) => {
            wallet::write_wallet_file(&path, &keypair, force)
                .with_context(|| format!("Failed to write wallet to {}", path.display()))?;
            println!("Saved wallet {} to {}", keypair.pubkey(), path.display());
        }
        None => {
            let mut bytes = keypair.to_bytes().to_vec();
            println!("{:?}", bytes);
            bytes.zeroize();
        }
    }
    Ok(())
}

pub fn wallet_to_base58(config: &Config, wallet: Option<PathBuf>) -> Result<()> {
    let path = wallet.unwrap_or_else(|| config.wallet.dev_wallet.clone());
    let keypair = wallet::read_wallet_file(&path)
        .with_context(|| format!("Failed to load wallet {}", path.display()))?;

    let mut encoded = convert::keypair_to_base58(&keypair);
    println!("{}", encoded);
    encoded.zeroize();
    Ok(())
}
