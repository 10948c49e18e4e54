//! Wallet files hold the 64-byte secret as a JSON array of byte values,
//! the same layout the Solana CLI writes.

use std::{fs, io, path::Path};

use solana_sdk::signature::Keypair;
use zeroize::Zeroize;

use crate::error::{EnrollError, EnrollResult};
use crate::wallet::keypair;

pub fn read_wallet_file(path: impl AsRef<Path>) -> EnrollResult<Keypair> {
    let path = path.as_ref();
    let mut contents = fs::read_to_string(path)?;
    let parsed: Result<Vec<u8>, _> = serde_json::from_str(&contents);
    contents.zeroize();

    let bytes = parsed.map_err(|e| {
        EnrollError::MalformedKey(format!("{} is not a JSON byte array: {}", path.display(), e))
    })?;
    keypair::load_owned(bytes)
}

/// Persist a keypair. Refuses to clobber an existing wallet unless `overwrite` is set.
pub fn write_wallet_file(path: impl AsRef<Path>, keypair: &Keypair, overwrite: bool) -> EnrollResult<()> {
    let path = path.as_ref();
    if path.exists() && !overwrite {
        return Err(EnrollError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut bytes = keypair.to_bytes().to_vec();
    let mut json = serde_json::to_string(&bytes)?;
    bytes.zeroize();

    let written = fs::write(path, json.as_bytes());
    json.zeroize();
    written?;

    tracing::debug!(path = %path.display(), "Wallet file written");
    Ok(())
}
