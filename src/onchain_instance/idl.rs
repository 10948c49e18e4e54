//! # IDL Schema
//!
//! Serde model of an Anchor IDL document. Both the legacy layout
//! (`isMut`/`isSigner`, `publicKey`, `metadata.address`) and the current one
//! (`writable`/`signer`, `pubkey`, top-level `address`, explicit
//! `discriminator`) deserialize into the same types.

use std::{fs, path::Path, str::FromStr};

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

use crate::error::{EnrollError, EnrollResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Idl {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub metadata: Option<IdlMetadata>,
    pub instructions: Vec<IdlInstruction>,
    #[serde(default)]
    pub accounts: Vec<IdlTypeDef>,
    #[serde(default)]
    pub types: Vec<IdlTypeDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlInstruction {
    pub name: String,
    #[serde(default)]
    pub discriminator: Option<[u8; 8]>,
    #[serde(default)]
    pub accounts: Vec<IdlAccountItem>,
    #[serde(default)]
    pub args: Vec<IdlField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlAccountItem {
    pub name: String,
    #[serde(default, alias = "isMut")]
    pub writable: bool,
    #[serde(default, alias = "isSigner")]
    pub signer: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub pda: Option<IdlPda>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlPda {
    pub seeds: Vec<IdlSeed>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdlSeed {
    Const { value: IdlSeedValue },
    Account { path: String },
    Arg { path: String },
}

/// Constant seeds are raw bytes in current IDLs and strings in legacy ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdlSeedValue {
    Bytes(Vec<u8>),
    Str(String),
}

impl IdlSeedValue {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IdlSeedValue::Bytes(bytes) => bytes,
            IdlSeedValue::Str(s) => s.as_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlTypeDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: Option<IdlTypeDefBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdlTypeDefBody {
    Struct {
        #[serde(default)]
        fields: Vec<IdlField>,
    },
    Enum {
        variants: Vec<IdlEnumVariant>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlEnumVariant {
    pub name: String,
    /// Tuple variants get positional names: `"0"`, `"1"`, ...
    #[serde(default, deserialize_with = "variant_fields")]
    pub fields: Vec<IdlField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVariantFields {
    Named(Vec<IdlField>),
    Tuple(Vec<IdlType>),
}

fn variant_fields<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Vec<IdlField>, D::Error> {
    Ok(match RawVariantFields::deserialize(deserializer)? {
        RawVariantFields::Named(fields) => fields,
        RawVariantFields::Tuple(types) => types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| IdlField {
                name: index.to_string(),
                ty,
            })
            .collect(),
    })
}

/// Argument types the encoder understands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawIdlType")]
pub enum IdlType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    Bytes,
    String,
    Pubkey,
    Vec(Box<IdlType>),
    Option(Box<IdlType>),
    Array(Box<IdlType>, usize),
    Defined(String),
}

impl std::fmt::Display for IdlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdlType::Bool => write!(f, "bool"),
            IdlType::U8 => write!(f, "u8"),
            IdlType::U16 => write!(f, "u16"),
            IdlType::U32 => write!(f, "u32"),
            IdlType::U64 => write!(f, "u64"),
            IdlType::U128 => write!(f, "u128"),
            IdlType::I8 => write!(f, "i8"),
            IdlType::I16 => write!(f, "i16"),
            IdlType::I32 => write!(f, "i32"),
            IdlType::I64 => write!(f, "i64"),
            IdlType::I128 => write!(f, "i128"),
            IdlType::F32 => write!(f, "f32"),
            IdlType::F64 => write!(f, "f64"),
            IdlType::Bytes => write!(f, "bytes"),
            IdlType::String => write!(f, "string"),
            IdlType::Pubkey => write!(f, "pubkey"),
            IdlType::Vec(inner) => write!(f, "vec<{}>", inner),
            IdlType::Option(inner) => write!(f, "option<{}>", inner),
            IdlType::Array(inner, len) => write!(f, "[{}; {}]", inner, len),
            IdlType::Defined(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdlType {
    Primitive(String),
    Vec { vec: Box<IdlType> },
    Option { option: Box<IdlType> },
    Array { array: (Box<IdlType>, usize) },
    Defined { defined: DefinedRef },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinedRef {
    Name(String),
    Named { name: String },
}

impl TryFrom<RawIdlType> for IdlType {
    type Error = String;

    fn try_from(raw: RawIdlType) -> Result<Self, Self::Error> {
        Ok(match raw {
            RawIdlType::Primitive(name) => match name.as_str() {
                "bool" => IdlType::Bool,
                "u8" => IdlType::U8,
                "u16" => IdlType::U16,
                "u32" => IdlType::U32,
                "u64" => IdlType::U64,
                "u128" => IdlType::U128,
                "i8" => IdlType::I8,
                "i16" => IdlType::I16,
                "i32" => IdlType::I32,
                "i64" => IdlType::I64,
                "i128" => IdlType::I128,
                "f32" => IdlType::F32,
                "f64" => IdlType::F64,
                "bytes" => IdlType::Bytes,
                "string" => IdlType::String,
                "pubkey" | "publicKey" => IdlType::Pubkey,
                other => return Err(format!("unsupported IDL type `{}`", other)),
            },
            RawIdlType::Vec { vec } => IdlType::Vec(vec),
            RawIdlType::Option { option } => IdlType::Option(option),
            RawIdlType::Array { array: (inner, len) } => IdlType::Array(inner, len),
            RawIdlType::Defined { defined } => match defined {
                DefinedRef::Name(name) | DefinedRef::Named { name } => IdlType::Defined(name),
            },
        })
    }
}

impl Idl {
    pub fn from_json(json: &str) -> EnrollResult<Self> {
        serde_json::from_str(json).map_err(|e| EnrollError::InvalidIdl(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> EnrollResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loaded IDL document");
        Self::from_json(&contents)
    }

    /// Program name, whichever layout declared it.
    pub fn program_name(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.metadata.as_ref().and_then(|m| m.name.as_deref()))
            .unwrap_or("unknown")
    }

    /// Program address declared by the IDL, if any.
    pub fn program_id(&self) -> EnrollResult<Option<Pubkey>> {
        let declared = self
            .address
            .as_deref()
            .or_else(|| self.metadata.as_ref().and_then(|m| m.address.as_deref()));

        declared
            .map(|address| {
                Pubkey::from_str(address)
                    .map_err(|e| EnrollError::InvalidIdl(format!("program address `{}`: {}", address, e)))
            })
            .transpose()
    }

    pub fn instruction(&self, method: &str) -> EnrollResult<&IdlInstruction> {
        self.instructions
            .iter()
            .find(|ix| ix.name == method)
            .ok_or_else(|| EnrollError::UnknownMethod {
                method: method.to_string(),
                program: self.program_name().to_string(),
            })
    }

    /// Look a defined type up in `types`, then in `accounts`.
    pub fn type_def(&self, name: &str) -> Option<&IdlTypeDefBody> {
        self.types
            .iter()
            .chain(self.accounts.iter())
            .find(|def| def.name == name)
            .and_then(|def| def.ty.as_ref())
    }
}
