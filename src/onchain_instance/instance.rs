use std::{collections::BTreeMap, str::FromStr};

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::error::{EnrollError, EnrollResult};
use crate::onchain_instance::{
    codec::{self, IdlValue},
    idl::{Idl, IdlAccountItem, IdlInstruction, IdlSeed},
    pda,
};

/// Enrollment program IDL shipped with the binary.
pub const PREREQ_IDL: &str = include_str!("../../idl/prereq.json");

/// A statically typed call into a program: method name plus its argument tuple.
pub trait ProgramCall {
    fn method(&self) -> &'static str;
    fn args(&self) -> Vec<IdlValue>;
}

/// Calls exposed by the enrollment program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentCall {
    /// First-time enrollment; creates the prereq account.
    Complete { github: Vec<u8> },
    /// Rewrites the GitHub handle of an existing enrollment.
    Update { github: Vec<u8> },
}

impl EnrollmentCall {
    pub fn complete(github: &str) -> Self {
        EnrollmentCall::Complete { github: github.as_bytes().to_vec() }
    }

    pub fn update(github: &str) -> Self {
        EnrollmentCall::Update { github: github.as_bytes().to_vec() }
    }
}

impl ProgramCall for EnrollmentCall {
    fn method(&self) -> &'static str {
        match self {
            EnrollmentCall::Complete { .. } => "complete",
            EnrollmentCall::Update { .. } => "update",
        }
    }

    fn args(&self) -> Vec<IdlValue> {
        match self {
            EnrollmentCall::Complete { github } | EnrollmentCall::Update { github } => {
                vec![IdlValue::Bytes(github.clone())]
            }
        }
    }
}

/// Accounts supplied by the caller, keyed by their IDL name.
pub type AccountMap = BTreeMap<String, Pubkey>;

/// Client handle for one deployed program and its IDL.
#[derive(Debug, Clone)]
pub struct ProgramInstance {
    program_id: Pubkey,
    idl: Idl,
}

impl ProgramInstance {
    /// Create an instance. The program id comes from `program_id` when given,
    /// otherwise from the address the IDL declares.
    pub fn new(idl: Idl, program_id: Option<Pubkey>) -> EnrollResult<Self> {
        let program_id = match program_id {
            Some(id) => id,
            None => idl
                .program_id()?
                .ok_or_else(|| EnrollError::InvalidIdl("IDL declares no program address".to_string()))?,
        };
        Ok(Self { program_id, idl })
    }

    /// Instance for the bundled enrollment program.
    pub fn prereq(program_id: Option<Pubkey>) -> EnrollResult<Self> {
        Self::new(Idl::from_json(PREREQ_IDL)?, program_id)
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn idl(&self) -> &Idl {
        &self.idl
    }

    /// Build the instruction for `call`, resolving accounts from `supplied`,
    /// fixed IDL addresses, and IDL-declared PDA seeds, in declared order.
    pub fn instruction(&self, call: &impl ProgramCall, supplied: &AccountMap) -> EnrollResult<Instruction> {
        let method = call.method();
        let ix = self.idl.instruction(method)?;
        let args = call.args();
        let data = codec::encode(method, &args, &self.idl)?;

        if let Some(unknown) = supplied.keys().find(|name| !ix.accounts.iter().any(|a| &a.name == *name)) {
            return Err(account_mismatch(method, format!("`{}` is not an account of this instruction", unknown)));
        }

        let mut resolved = AccountMap::new();
        let mut metas = Vec::with_capacity(ix.accounts.len());
        for account in &ix.accounts {
            let pubkey = self.resolve_account(ix, account, supplied, &resolved, &args)?;
            resolved.insert(account.name.clone(), pubkey);
            metas.push(if account.writable {
                AccountMeta::new(pubkey, account.signer)
            } else {
                AccountMeta::new_readonly(pubkey, account.signer)
            });
        }

        tracing::debug!(
            program = %self.program_id,
            method,
            accounts = metas.len(),
            "Built program instruction"
        );

        Ok(Instruction {
            program_id: self.program_id,
            accounts: metas,
            data,
        })
    }

    fn resolve_account(
        &self,
        ix: &IdlInstruction,
        account: &IdlAccountItem,
        supplied: &AccountMap,
        resolved: &AccountMap,
        args: &[IdlValue],
    ) -> EnrollResult<Pubkey> {
        if let Some(pubkey) = supplied.get(&account.name) {
            return Ok(*pubkey);
        }

        if let Some(address) = &account.address {
            return Pubkey::from_str(address).map_err(|e| {
                EnrollError::InvalidIdl(format!("account `{}` address `{}`: {}", account.name, address, e))
            });
        }

        let Some(pda) = &account.pda else {
            return Err(account_mismatch(&ix.name, format!("account `{}` was not supplied", account.name)));
        };

        let mut seeds: Vec<Vec<u8>> = Vec::with_capacity(pda.seeds.len());
        for seed in &pda.seeds {
            seeds.push(match seed {
                IdlSeed::Const { value } => value.as_bytes().to_vec(),
                IdlSeed::Account { path } => resolved
                    .get(path)
                    .or_else(|| supplied.get(path))
                    .map(|key| key.to_bytes().to_vec())
                    .ok_or_else(|| {
                        account_mismatch(
                            &ix.name,
                            format!("seed account `{}` of `{}` is not resolved", path, account.name),
                        )
                    })?,
                IdlSeed::Arg { path } => self.arg_seed(ix, path, args)?,
            });
        }

        let seed_refs: Vec<&[u8]> = seeds.iter().map(Vec::as_slice).collect();
        Ok(pda::derive(&seed_refs, &self.program_id)?.address)
    }

    /// Arg seeds use the raw value bytes: no length prefix for bytes and strings.
    fn arg_seed(&self, ix: &IdlInstruction, path: &str, args: &[IdlValue]) -> EnrollResult<Vec<u8>> {
        let (field, value) = ix
            .args
            .iter()
            .zip(args)
            .find(|(field, _)| field.name == path)
            .ok_or_else(|| account_mismatch(&ix.name, format!("seed refers to unknown argument `{}`", path)))?;

        match value {
            IdlValue::Bytes(bytes) => Ok(bytes.clone()),
            IdlValue::String(s) => Ok(s.as_bytes().to_vec()),
            other => codec::encode_value(&ix.name, &field.name, &field.ty, other, &self.idl),
        }
    }
}

fn account_mismatch(method: &str, reason: String) -> EnrollError {
    EnrollError::AccountMismatch {
        method: method.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_system_interface::program as system_program;

    fn signer_accounts(signer: Pubkey) -> AccountMap {
        AccountMap::from([
            ("signer".to_string(), signer),
            ("systemProgram".to_string(), system_program::ID),
        ])
    }

    #[test]
    fn bundled_idl_loads_with_declared_program() {
        let instance = ProgramInstance::prereq(None).unwrap();
        assert_eq!(instance.idl().program_name(), "wba_prereq");
        assert_eq!(Some(*instance.program_id()), instance.idl().program_id().unwrap());
    }

    #[test]
    fn complete_instruction_matches_expected_layout() {
        let instance = ProgramInstance::prereq(None).unwrap();
        let signer = Pubkey::new_unique();

        let ix = instance
            .instruction(&EnrollmentCall::complete("octocat"), &signer_accounts(signer))
            .unwrap();

        let prereq = pda::derive_prereq(&signer, instance.program_id()).unwrap();
        assert_eq!(ix.program_id, *instance.program_id());
        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::new(signer, true),
                AccountMeta::new(prereq.address, false),
                AccountMeta::new_readonly(system_program::ID, false),
            ]
        );

        let mut expected = codec::sighash("complete").to_vec();
        expected.extend_from_slice(&7u32.to_le_bytes());
        expected.extend_from_slice(b"octocat");
        assert_eq!(ix.data, expected);
    }

    #[test]
    fn explicit_program_id_overrides_idl() {
        let program_id = Pubkey::new_unique();
        let instance = ProgramInstance::prereq(Some(program_id)).unwrap();
        let signer = Pubkey::new_unique();

        let ix = instance
            .instruction(&EnrollmentCall::update("octocat"), &signer_accounts(signer))
            .unwrap();

        assert_eq!(ix.program_id, program_id);
        assert_eq!(ix.accounts[1].pubkey, pda::derive_prereq(&signer, &program_id).unwrap().address);
        assert_eq!(&ix.data[..8], &codec::sighash("update"));
    }

    #[test]
    fn supplied_account_overrides_pda() {
        let instance = ProgramInstance::prereq(None).unwrap();
        let signer = Pubkey::new_unique();
        let custom = Pubkey::new_unique();
        let mut accounts = signer_accounts(signer);
        accounts.insert("prereq".to_string(), custom);

        let ix = instance.instruction(&EnrollmentCall::complete("x"), &accounts).unwrap();
        assert_eq!(ix.accounts[1].pubkey, custom);
    }

    #[test]
    fn undeclared_account_is_rejected() {
        let instance = ProgramInstance::prereq(None).unwrap();
        let mut accounts = signer_accounts(Pubkey::new_unique());
        accounts.insert("treasury".to_string(), Pubkey::new_unique());

        let err = instance.instruction(&EnrollmentCall::complete("x"), &accounts).unwrap_err();
        assert!(matches!(err, EnrollError::AccountMismatch { ref reason, .. } if reason.contains("treasury")));
    }

    #[test]
    fn missing_account_is_rejected() {
        let instance = ProgramInstance::prereq(None).unwrap();
        let accounts = AccountMap::from([("signer".to_string(), Pubkey::new_unique())]);

        let err = instance.instruction(&EnrollmentCall::complete("x"), &accounts).unwrap_err();
        assert!(matches!(err, EnrollError::AccountMismatch { ref reason, .. } if reason.contains("systemProgram")));
    }

    #[test]
    fn fixed_addresses_and_arg_seeds_resolve() {
        let idl = Idl::from_json(
            r#"{
                "address": "11111111111111111111111111111111",
                "metadata": {"name": "vaults"},
                "instructions": [{
                    "name": "open",
                    "accounts": [
                        {"name": "owner", "writable": true, "signer": true},
                        {"name": "vault", "writable": true, "pda": {"seeds": [
                            {"kind": "const", "value": [118, 97, 117, 108, 116]},
                            {"kind": "arg", "path": "label"},
                            {"kind": "arg", "path": "index"}
                        ]}},
                        {"name": "system_program", "address": "11111111111111111111111111111111"}
                    ],
                    "args": [
                        {"name": "label", "type": "string"},
                        {"name": "index", "type": "u16"}
                    ]
                }]
            }"#,
        )
        .unwrap();
        let program_id = Pubkey::new_unique();
        let instance = ProgramInstance::new(idl, Some(program_id)).unwrap();

        struct Open;
        impl ProgramCall for Open {
            fn method(&self) -> &'static str {
                "open"
            }
            fn args(&self) -> Vec<IdlValue> {
                vec![IdlValue::String("main".into()), IdlValue::U16(3)]
            }
        }

        let owner = Pubkey::new_unique();
        let accounts = AccountMap::from([("owner".to_string(), owner)]);
        let ix = instance.instruction(&Open, &accounts).unwrap();

        let expected = pda::derive(&[b"vault", b"main", &3u16.to_le_bytes()], &program_id).unwrap();
        assert_eq!(ix.accounts[1].pubkey, expected.address);
        assert_eq!(ix.accounts[2], AccountMeta::new_readonly(system_program::ID, false));
    }

    #[test]
    fn instance_without_address_needs_explicit_id() {
        let idl = Idl::from_json(r#"{"name": "anon", "instructions": []}"#).unwrap();
        assert!(matches!(ProgramInstance::new(idl.clone(), None), Err(EnrollError::InvalidIdl(_))));
        assert!(ProgramInstance::new(idl, Some(Pubkey::new_unique())).is_ok());
    }
}
