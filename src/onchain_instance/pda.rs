//! # Program Derived Addresses
//!
//! A PDA is `sha256(seeds ++ [bump] ++ program_id ++ "ProgramDerivedAddress")`
//! for the highest bump whose hash is not an ed25519 point, so no private key
//! can exist for it. On-chain verification uses the same canonical bump.

use ring::digest::{Context, SHA256};
use solana_sdk::pubkey::{MAX_SEED_LEN, MAX_SEEDS, Pubkey};

use crate::error::{EnrollError, EnrollResult};

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Seed prefix of the enrollment account.
pub const PREREQ_SEED: &[u8] = b"prereq";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramDerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

/// Find the canonical PDA for `seeds` under `program_id`.
pub fn derive(seeds: &[&[u8]], program_id: &Pubkey) -> EnrollResult<ProgramDerivedAddress> {
    search_bump(seeds, program_id, is_off_curve)
}

/// Derive the enrollment account for `owner`: seeds `["prereq", owner]`.
pub fn derive_prereq(owner: &Pubkey, program_id: &Pubkey) -> EnrollResult<ProgramDerivedAddress> {
    derive(&[PREREQ_SEED, owner.as_ref()], program_id)
}

/// Hash one candidate address. Does not check curve membership.
pub fn candidate_address(seeds: &[&[u8]], bump: u8, program_id: &Pubkey) -> [u8; 32] {
    let mut hasher = Context::new(&SHA256);
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(&[bump]);
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);

    let mut out = [0u8; 32];
    out.copy_from_slice(hasher.finish().as_ref());
    out
}

fn is_off_curve(candidate: &[u8; 32]) -> bool {
    !Pubkey::new_from_array(*candidate).is_on_curve()
}

fn validate_seeds(seeds: &[&[u8]]) -> EnrollResult<()> {
    // the bump occupies one of the MAX_SEEDS slots
    if seeds.len() >= MAX_SEEDS {
        return Err(EnrollError::InvalidSeeds(format!(
            "{} seeds given, at most {} allowed alongside the bump",
            seeds.len(),
            MAX_SEEDS - 1
        )));
    }
    if let Some((index, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(EnrollError::InvalidSeeds(format!(
            "seed {} is {} bytes, max is {}",
            index,
            seed.len(),
            MAX_SEED_LEN
        )));
    }
    Ok(())
}

fn search_bump(
    seeds: &[&[u8]],
    program_id: &Pubkey,
    accept: impl Fn(&[u8; 32]) -> bool,
) -> EnrollResult<ProgramDerivedAddress> {
    validate_seeds(seeds)?;

    for bump in (0..=u8::MAX).rev() {
        let candidate = candidate_address(seeds, bump, program_id);
        if accept(&candidate) {
            return Ok(ProgramDerivedAddress {
                address: Pubkey::new_from_array(candidate),
                bump,
            });
        }
    }

    Err(EnrollError::NoValidBump {
        program_id: *program_id,
        seed_count: seeds.len(),
    })
}
