use std::path::PathBuf;

use anyhow::{Context, Result};
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use solana_system_interface::program as system_program;

use crate::commands::{connect, report, send};
use crate::config::Config;
use crate::onchain_instance::{AccountMap, EnrollmentCall, Idl, ProgramCall, ProgramInstance};
use crate::wallet;

pub async fn run(
    config: &Config,
    wallet: Option<PathBuf>,
    idl: Option<PathBuf>,
    program_id: Option<Pubkey>,
    github: &str,
    update: bool,
) -> Result<()> {
    let path = wallet.unwrap_or_else(|| config.wallet.enroll_wallet.clone());
    let signer = wallet::read_wallet_file(&path)
        .with_context(|| format!("Failed to load wallet {}", path.display()))?;

    let instance = match idl.or_else(|| config.wallet.idl_path.clone()) {
        Some(idl_path) => {
            let idl = Idl::from_file(&idl_path)
                .with_context(|| format!("Failed to load IDL {}", idl_path.display()))?;
            ProgramInstance::new(idl, program_id)?
        }
        None => ProgramInstance::prereq(program_id)?,
    };

    let call = if update {
        EnrollmentCall::update(github)
    } else {
        EnrollmentCall::complete(github)
    };
    let ix = enrollment_instruction(&instance, &signer, &call)?;

    let pipeline = connect(config);
    let confirmation = send(&pipeline, vec![ix], &signer).await?;
    report(config, "Enrollment", &confirmation)
}

/// Account names the system program goes by in legacy and current IDLs.
const SYSTEM_PROGRAM_NAMES: [&str; 2] = ["systemProgram", "system_program"];

/// The enrollment instruction for `signer`. The wallet fills every signer
/// account the IDL declares, the system program fills whichever name the IDL
/// uses for it unless a fixed address is given, and the rest resolves from
/// the IDL seeds.
pub fn enrollment_instruction(instance: &ProgramInstance, signer: &Keypair, call: &EnrollmentCall) -> Result<Instruction> {
    let program = instance.idl().program_name();
    let declared = instance
        .idl()
        .instruction(call.method())
        .with_context(|| format!("Failed to build enrollment for {}", program))?;

    let mut accounts = AccountMap::new();
    for account in &declared.accounts {
        if account.signer {
            accounts.insert(account.name.clone(), signer.pubkey());
        } else if account.address.is_none() && SYSTEM_PROGRAM_NAMES.contains(&account.name.as_str()) {
            accounts.insert(account.name.clone(), system_program::ID);
        }
    }

    let ix = instance
        .instruction(call, &accounts)
        .with_context(|| format!("Failed to build enrollment for {}", program))?;

    let prereq = declared
        .accounts
        .iter()
        .zip(&ix.accounts)
        .find(|(account, _)| account.pda.is_some())
        .map(|(_, meta)| meta.pubkey);
    tracing::info!(
        signer = %signer.pubkey(),
        program = %instance.program_id(),
        prereq = ?prereq,
        "Prepared enrollment"
    );
    Ok(ix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::ledger::Commitment;
    use crate::ledger::mock::{MockLedger, landed};
    use crate::onchain_instance::codec::sighash;
    use crate::onchain_instance::pda;
    use solana_sdk::instruction::AccountMeta;
    use crate::transaction::SubmissionPipeline;
    use std::sync::Arc;

    #[test]
    fn instruction_targets_the_prereq_pda() {
        let instance = ProgramInstance::prereq(None).unwrap();
        let signer = Keypair::new();

        let ix = enrollment_instruction(&instance, &signer, &EnrollmentCall::complete("octocat")).unwrap();
        let prereq = pda::derive_prereq(&signer.pubkey(), instance.program_id()).unwrap();

        assert_eq!(ix.accounts[0].pubkey, signer.pubkey());
        assert_eq!(ix.accounts[1].pubkey, prereq.address);
        assert_eq!(ix.accounts[2].pubkey, system_program::ID);
        assert_eq!(&ix.data[..8], &sighash("complete"));
        assert_eq!(&ix.data[8..12], &7u32.to_le_bytes());
        assert_eq!(&ix.data[12..], b"octocat");
    }

    #[test]
    fn current_layout_idl_resolves_fixed_system_program() {
        let idl = Idl::from_json(
            r#"{
                "address": "Trb3aEx85DW1cEEvoqEaBkMn1tfmNEEEPaKzLSu4YAv",
                "metadata": {"name": "q3_pre_reqs_rs", "version": "0.1.0", "spec": "0.1.0"},
                "instructions": [{
                    "name": "submit_rs",
                    "discriminator": [77, 124, 82, 163, 21, 133, 181, 206],
                    "accounts": [
                        {"name": "user", "writable": true, "signer": true},
                        {"name": "account", "writable": true, "pda": {"seeds": [
                            {"kind": "const", "value": [112, 114, 101, 114, 101, 113]},
                            {"kind": "account", "path": "user"}
                        ]}},
                        {"name": "system_program", "address": "11111111111111111111111111111111"}
                    ],
                    "args": [{"name": "github", "type": "bytes"}]
                }, {
                    "name": "complete",
                    "accounts": [
                        {"name": "user", "writable": true, "signer": true},
                        {"name": "account", "writable": true, "pda": {"seeds": [
                            {"kind": "const", "value": [112, 114, 101, 114, 101, 113]},
                            {"kind": "account", "path": "user"}
                        ]}},
                        {"name": "system_program", "address": "11111111111111111111111111111111"}
                    ],
                    "args": [{"name": "github", "type": "bytes"}]
                }]
            }"#,
        )
        .unwrap();
        let instance = ProgramInstance::new(idl, None).unwrap();
        let signer = Keypair::new();

        let ix = enrollment_instruction(&instance, &signer, &EnrollmentCall::complete("octocat")).unwrap();
        let prereq = pda::derive_prereq(&signer.pubkey(), instance.program_id()).unwrap();

        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::new(signer.pubkey(), true),
                AccountMeta::new(prereq.address, false),
                AccountMeta::new_readonly(system_program::ID, false),
            ]
        );
        assert_eq!(&ix.data[..8], &sighash("complete"));
    }

    #[test]
    fn system_program_without_address_is_filled_under_its_declared_name() {
        let idl = Idl::from_json(
            r#"{
                "address": "11111111111111111111111111111111",
                "metadata": {"name": "snake_prereq"},
                "instructions": [{
                    "name": "update",
                    "accounts": [
                        {"name": "owner", "writable": true, "signer": true},
                        {"name": "system_program"}
                    ],
                    "args": [{"name": "github", "type": "bytes"}]
                }]
            }"#,
        )
        .unwrap();
        let program_id = Pubkey::new_unique();
        let instance = ProgramInstance::new(idl, Some(program_id)).unwrap();
        let signer = Keypair::new();

        let ix = enrollment_instruction(&instance, &signer, &EnrollmentCall::update("octocat")).unwrap();
        assert_eq!(ix.program_id, program_id);
        assert_eq!(ix.accounts[0], AccountMeta::new(signer.pubkey(), true));
        assert_eq!(ix.accounts[1], AccountMeta::new_readonly(system_program::ID, false));
    }

    #[tokio::test(start_paused = true)]
    async fn enrollment_is_signed_by_the_wallet() {
        let ledger = Arc::new(MockLedger::default());
        ledger.set_status_default(landed(Commitment::Finalized));
        let pipeline = SubmissionPipeline::new(ledger.clone(), PipelineConfig::default());
        let instance = ProgramInstance::prereq(None).unwrap();
        let signer = Keypair::new();

        let ix = enrollment_instruction(&instance, &signer, &EnrollmentCall::update("octocat")).unwrap();
        let confirmation = send(&pipeline, vec![ix], &signer).await.unwrap();

        assert!(confirmation.is_success());
        let sent = ledger.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message.account_keys[0], signer.pubkey());
        sent[0].verify().unwrap();
    }
}
