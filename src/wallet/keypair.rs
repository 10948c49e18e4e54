use solana_sdk::{
    signature::{Keypair, Signer},
    signer::keypair::keypair_from_seed,
};
use zeroize::Zeroize;

use crate::error::{EnrollError, EnrollResult};

/// Length of the secret material: 32-byte seed followed by the 32-byte public key.
pub const KEYPAIR_LENGTH: usize = 64;

const SEED_LENGTH: usize = 32;

/// Create a fresh signing identity from the OS randomness source.
pub fn generate() -> Keypair {
    Keypair::new()
}

/// Load a keypair from its 64-byte secret material.
///
/// The embedded public half must match the key derived from the seed, so a
/// truncated or spliced wallet is rejected instead of silently signing as a
/// different identity.
pub fn load(bytes: &[u8]) -> EnrollResult<Keypair> {
    if bytes.len() != KEYPAIR_LENGTH {
        return Err(EnrollError::MalformedKey(format!(
            "expected {} bytes, got {}",
            KEYPAIR_LENGTH,
            bytes.len()
        )));
    }

    let keypair = keypair_from_seed(&bytes[..SEED_LENGTH])
        .map_err(|e| EnrollError::MalformedKey(e.to_string()))?;

    if keypair.pubkey().as_ref() != &bytes[SEED_LENGTH..] {
        return Err(EnrollError::MalformedKey(
            "public key does not match the secret seed".to_string(),
        ));
    }

    Ok(keypair)
}

/// Load from an owned buffer and wipe it afterwards.
pub fn load_owned(mut bytes: Vec<u8>) -> EnrollResult<Keypair> {
    let result = load(&bytes);
    bytes.zeroize();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_round_trips_through_load() {
        let keypair = generate();
        let loaded = load(&keypair.to_bytes()).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn generate_yields_distinct_identities() {
        assert_ne!(generate().pubkey(), generate().pubkey());
    }

    #[test]
    fn rejects_wrong_length() {
        let err = load(&[7u8; 63]).unwrap_err();
        assert!(matches!(err, EnrollError::MalformedKey(_)));

        let err = load(&[7u8; 65]).unwrap_err();
        assert!(matches!(err, EnrollError::MalformedKey(_)));
    }

    #[test]
    fn rejects_inconsistent_public_half() {
        let mut bytes = generate().to_bytes();
        let other = generate();
        bytes[SEED_LENGTH..].copy_from_slice(other.pubkey().as_ref());

        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, EnrollError::MalformedKey(_)));
    }

    #[test]
    fn load_owned_matches_load() {
        let keypair = generate();
        let loaded = load_owned(keypair.to_bytes().to_vec()).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }
}
