//! # Instruction Codec
//!
//! Schema-driven encoding of instruction data: an 8-byte method discriminator
//! followed by the arguments in the Borsh layout Anchor programs expect.
//! Values are checked against the declared types before a single byte is
//! written, so a caller cannot slip an undeclared field through.

use ring::digest::{SHA256, digest};
use solana_sdk::pubkey::Pubkey;

use crate::error::{EnrollError, EnrollResult};
use crate::onchain_instance::idl::{Idl, IdlField, IdlInstruction, IdlType, IdlTypeDefBody};

pub const DISCRIMINATOR_LEN: usize = 8;

/// Namespace Anchor prefixes to instruction names before hashing.
const INSTRUCTION_NAMESPACE: &str = "global";

/// A typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum IdlValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    String(String),
    Pubkey(Pubkey),
    Vec(Vec<IdlValue>),
    Option(Option<Box<IdlValue>>),
    Array(Vec<IdlValue>),
    Struct(Vec<(String, IdlValue)>),
    Enum {
        variant: String,
        fields: Vec<(String, IdlValue)>,
    },
}

impl IdlValue {
    fn kind(&self) -> &'static str {
        match self {
            IdlValue::Bool(_) => "bool",
            IdlValue::U8(_) => "u8",
            IdlValue::U16(_) => "u16",
            IdlValue::U32(_) => "u32",
            IdlValue::U64(_) => "u64",
            IdlValue::U128(_) => "u128",
            IdlValue::I8(_) => "i8",
            IdlValue::I16(_) => "i16",
            IdlValue::I32(_) => "i32",
            IdlValue::I64(_) => "i64",
            IdlValue::I128(_) => "i128",
            IdlValue::F32(_) => "f32",
            IdlValue::F64(_) => "f64",
            IdlValue::Bytes(_) => "bytes",
            IdlValue::String(_) => "string",
            IdlValue::Pubkey(_) => "pubkey",
            IdlValue::Vec(_) => "vec",
            IdlValue::Option(_) => "option",
            IdlValue::Array(_) => "array",
            IdlValue::Struct(_) => "struct",
            IdlValue::Enum { .. } => "enum",
        }
    }
}

/// `sha256("global:<method>")[..8]`.
pub fn sighash(method: &str) -> [u8; DISCRIMINATOR_LEN] {
    let preimage = format!("{}:{}", INSTRUCTION_NAMESPACE, method);
    let hash = digest(&SHA256, preimage.as_bytes());

    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&hash.as_ref()[..DISCRIMINATOR_LEN]);
    out
}

/// Discriminator of an IDL instruction: the declared one, else the sighash
/// of its snake_case name. Legacy IDLs spell methods in camelCase but
/// programs dispatch on the Rust function name.
pub fn discriminator(ix: &IdlInstruction) -> [u8; DISCRIMINATOR_LEN] {
    ix.discriminator.unwrap_or_else(|| sighash(&snake_case(&ix.name)))
}

/// `initEscrow` -> `init_escrow`. A run of capitals stays one word:
/// `mintNFT` -> `mint_nft`.
fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Encode `method(args...)` into instruction data.
pub fn encode(method: &str, args: &[IdlValue], idl: &Idl) -> EnrollResult<Vec<u8>> {
    let ix = idl.instruction(method)?;
    let encoder = Encoder { idl, method };

    if args.len() != ix.args.len() {
        return Err(encoder.mismatch(format!(
            "expected {} arguments, got {}",
            ix.args.len(),
            args.len()
        )));
    }

    let mut out = discriminator(ix).to_vec();
    for (field, value) in ix.args.iter().zip(args) {
        encoder.write(&field.name, &field.ty, value, &mut out)?;
    }

    tracing::debug!(method, bytes = out.len(), "Encoded instruction data");
    Ok(out)
}

/// Serialize a single value without a discriminator. Used for `arg` PDA seeds.
pub fn encode_value(method: &str, name: &str, ty: &IdlType, value: &IdlValue, idl: &Idl) -> EnrollResult<Vec<u8>> {
    let mut out = Vec::new();
    Encoder { idl, method }.write(name, ty, value, &mut out)?;
    Ok(out)
}

/// Decode instruction data back into typed values.
pub fn decode(method: &str, data: &[u8], idl: &Idl) -> EnrollResult<Vec<IdlValue>> {
    let ix = idl.instruction(method)?;
    let decoder = Decoder { idl, method };

    let (head, mut rest) = data
        .split_at_checked(DISCRIMINATOR_LEN)
        .ok_or_else(|| decoder.mismatch("data shorter than the discriminator".to_string()))?;
    if head != discriminator(ix) {
        return Err(decoder.mismatch("discriminator does not match".to_string()));
    }

    let values = ix
        .args
        .iter()
        .map(|field| decoder.read(&field.name, &field.ty, &mut rest))
        .collect::<EnrollResult<Vec<_>>>()?;

    if !rest.is_empty() {
        return Err(decoder.mismatch(format!("{} trailing bytes", rest.len())));
    }
    Ok(values)
}

struct Encoder<'a> {
    idl: &'a Idl,
    method: &'a str,
}

impl Encoder<'_> {
    fn mismatch(&self, reason: String) -> EnrollError {
        EnrollError::ArgumentMismatch {
            method: self.method.to_string(),
            reason,
        }
    }

    fn type_error(&self, name: &str, ty: &IdlType, value: &IdlValue) -> EnrollError {
        self.mismatch(format!("`{}` is declared {} but got {}", name, ty, value.kind()))
    }

    fn write(&self, name: &str, ty: &IdlType, value: &IdlValue, out: &mut Vec<u8>) -> EnrollResult<()> {
        match (ty, value) {
            (IdlType::Bool, IdlValue::Bool(v)) => out.push(*v as u8),
            (IdlType::U8, IdlValue::U8(v)) => out.push(*v),
            (IdlType::U16, IdlValue::U16(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::U32, IdlValue::U32(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::U64, IdlValue::U64(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::U128, IdlValue::U128(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::I8, IdlValue::I8(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::I16, IdlValue::I16(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::I32, IdlValue::I32(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::I64, IdlValue::I64(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::I128, IdlValue::I128(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::F32, IdlValue::F32(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::F64, IdlValue::F64(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (IdlType::Bytes, IdlValue::Bytes(bytes)) => self.write_prefixed(name, bytes, out)?,
            (IdlType::String, IdlValue::String(s)) => self.write_prefixed(name, s.as_bytes(), out)?,
            (IdlType::Pubkey, IdlValue::Pubkey(key)) => out.extend_from_slice(key.as_ref()),
            (IdlType::Vec(inner), IdlValue::Vec(items)) => {
                self.write_len(name, items.len(), out)?;
                for item in items {
                    self.write(name, inner, item, out)?;
                }
            }
            (IdlType::Option(inner), IdlValue::Option(maybe)) => match maybe {
                None => out.push(0),
                Some(item) => {
                    out.push(1);
                    self.write(name, inner, item, out)?;
                }
            },
            (IdlType::Array(inner, len), IdlValue::Array(items)) => {
                if items.len() != *len {
                    return Err(self.mismatch(format!(
                        "`{}` is a fixed array of {} items, got {}",
                        name,
                        len,
                        items.len()
                    )));
                }
                for item in items {
                    self.write(name, inner, item, out)?;
                }
            }
            (IdlType::Defined(type_name), value) => self.write_defined(name, type_name, value, out)?,
            (ty, value) => return Err(self.type_error(name, ty, value)),
        }
        Ok(())
    }

    fn write_len(&self, name: &str, len: usize, out: &mut Vec<u8>) -> EnrollResult<()> {
        let len = u32::try_from(len)
            .map_err(|_| self.mismatch(format!("`{}` is too long for a u32 length prefix", name)))?;
        out.extend_from_slice(&len.to_le_bytes());
        Ok(())
    }

    fn write_prefixed(&self, name: &str, bytes: &[u8], out: &mut Vec<u8>) -> EnrollResult<()> {
        self.write_len(name, bytes.len(), out)?;
        out.extend_from_slice(bytes);
        Ok(())
    }

    fn write_defined(&self, name: &str, type_name: &str, value: &IdlValue, out: &mut Vec<u8>) -> EnrollResult<()> {
        let def = self
            .idl
            .type_def(type_name)
            .ok_or_else(|| self.mismatch(format!("`{}` refers to undefined type {}", name, type_name)))?;

        match (def, value) {
            (IdlTypeDefBody::Struct { fields }, IdlValue::Struct(given)) => {
                self.write_fields(type_name, fields, given, out)
            }
            (IdlTypeDefBody::Enum { variants }, IdlValue::Enum { variant, fields: given }) => {
                let (index, declared) = variants
                    .iter()
                    .enumerate()
                    .find(|(_, v)| &v.name == variant)
                    .ok_or_else(|| self.mismatch(format!("{} has no variant `{}`", type_name, variant)))?;
                let index = u8::try_from(index)
                    .map_err(|_| self.mismatch(format!("{} has more than 256 variants", type_name)))?;
                out.push(index);
                self.write_fields(&format!("{}::{}", type_name, variant), &declared.fields, given, out)
            }
            (_, value) => Err(self.mismatch(format!(
                "`{}` is declared {} but got {}",
                name,
                type_name,
                value.kind()
            ))),
        }
    }

    /// Fields are written in declared order; the given set must match it exactly.
    fn write_fields(
        &self,
        owner: &str,
        declared: &[IdlField],
        given: &[(String, IdlValue)],
        out: &mut Vec<u8>,
    ) -> EnrollResult<()> {
        for (index, (field_name, _)) in given.iter().enumerate() {
            if !declared.iter().any(|f| &f.name == field_name) {
                return Err(self.mismatch(format!("{} has no field `{}`", owner, field_name)));
            }
            if given[..index].iter().any(|(earlier, _)| earlier == field_name) {
                return Err(self.mismatch(format!("{} field `{}` given twice", owner, field_name)));
            }
        }

        for field in declared {
            let (_, value) = given
                .iter()
                .find(|(n, _)| n == &field.name)
                .ok_or_else(|| self.mismatch(format!("{} is missing field `{}`", owner, field.name)))?;
            self.write(&field.name, &field.ty, value, out)?;
        }
        Ok(())
    }
}

struct Decoder<'a> {
    idl: &'a Idl,
    method: &'a str,
}

impl Decoder<'_> {
    fn mismatch(&self, reason: String) -> EnrollError {
        EnrollError::ArgumentMismatch {
            method: self.method.to_string(),
            reason,
        }
    }

    fn take<'d>(&self, name: &str, count: usize, data: &mut &'d [u8]) -> EnrollResult<&'d [u8]> {
        let remaining: &'d [u8] = *data;
        let (head, rest) = remaining
            .split_at_checked(count)
            .ok_or_else(|| self.mismatch(format!("`{}` runs past the end of the data", name)))?;
        *data = rest;
        Ok(head)
    }

    fn take_array<const N: usize>(&self, name: &str, data: &mut &[u8]) -> EnrollResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(name, N, data)?);
        Ok(out)
    }

    fn take_len(&self, name: &str, data: &mut &[u8]) -> EnrollResult<usize> {
        Ok(u32::from_le_bytes(self.take_array(name, data)?) as usize)
    }

    fn read(&self, name: &str, ty: &IdlType, data: &mut &[u8]) -> EnrollResult<IdlValue> {
        Ok(match ty {
            IdlType::Bool => match self.take_array::<1>(name, data)?[0] {
                0 => IdlValue::Bool(false),
                1 => IdlValue::Bool(true),
                other => return Err(self.mismatch(format!("`{}` has invalid bool byte {}", name, other))),
            },
            IdlType::U8 => IdlValue::U8(self.take_array::<1>(name, data)?[0]),
            IdlType::U16 => IdlValue::U16(u16::from_le_bytes(self.take_array(name, data)?)),
            IdlType::U32 => IdlValue::U32(u32::from_le_bytes(self.take_array(name, data)?)),
            IdlType::U64 => IdlValue::U64(u64::from_le_bytes(self.take_array(name, data)?)),
            IdlType::U128 => IdlValue::U128(u128::from_le_bytes(self.take_array(name, data)?)),
            IdlType::I8 => IdlValue::I8(i8::from_le_bytes(self.take_array(name, data)?)),
            IdlType::I16 => IdlValue::I16(i16::from_le_bytes(self.take_array(name, data)?)),
            IdlType::I32 => IdlValue::I32(i32::from_le_bytes(self.take_array(name, data)?)),
            IdlType::I64 => IdlValue::I64(i64::from_le_bytes(self.take_array(name, data)?)),
            IdlType::I128 => IdlValue::I128(i128::from_le_bytes(self.take_array(name, data)?)),
            IdlType::F32 => IdlValue::F32(f32::from_le_bytes(self.take_array(name, data)?)),
            IdlType::F64 => IdlValue::F64(f64::from_le_bytes(self.take_array(name, data)?)),
            IdlType::Bytes => {
                let len = self.take_len(name, data)?;
                IdlValue::Bytes(self.take(name, len, data)?.to_vec())
            }
            IdlType::String => {
                let len = self.take_len(name, data)?;
                let raw = self.take(name, len, data)?.to_vec();
                IdlValue::String(
                    String::from_utf8(raw).map_err(|_| self.mismatch(format!("`{}` is not valid UTF-8", name)))?,
                )
            }
            IdlType::Pubkey => IdlValue::Pubkey(Pubkey::new_from_array(self.take_array(name, data)?)),
            IdlType::Vec(inner) => {
                let len = self.take_len(name, data)?;
                IdlValue::Vec(
                    (0..len)
                        .map(|_| self.read(name, inner, data))
                        .collect::<EnrollResult<_>>()?,
                )
            }
            IdlType::Option(inner) => match self.take_array::<1>(name, data)?[0] {
                0 => IdlValue::Option(None),
                1 => IdlValue::Option(Some(Box::new(self.read(name, inner, data)?))),
                other => return Err(self.mismatch(format!("`{}` has invalid option tag {}", name, other))),
            },
            IdlType::Array(inner, len) => IdlValue::Array(
                (0..*len)
                    .map(|_| self.read(name, inner, data))
                    .collect::<EnrollResult<_>>()?,
            ),
            IdlType::Defined(type_name) => self.read_defined(name, type_name, data)?,
        })
    }

    fn read_defined(&self, name: &str, type_name: &str, data: &mut &[u8]) -> EnrollResult<IdlValue> {
        let def = self
            .idl
            .type_def(type_name)
            .ok_or_else(|| self.mismatch(format!("`{}` refers to undefined type {}", name, type_name)))?;

        match def {
            IdlTypeDefBody::Struct { fields } => Ok(IdlValue::Struct(self.read_fields(fields, data)?)),
            IdlTypeDefBody::Enum { variants } => {
                let index = self.take_array::<1>(name, data)?[0] as usize;
                let variant = variants
                    .get(index)
                    .ok_or_else(|| self.mismatch(format!("{} has no variant index {}", type_name, index)))?;
                Ok(IdlValue::Enum {
                    variant: variant.name.clone(),
                    fields: self.read_fields(&variant.fields, data)?,
                })
            }
        }
    }

    fn read_fields(&self, fields: &[IdlField], data: &mut &[u8]) -> EnrollResult<Vec<(String, IdlValue)>> {
        fields
            .iter()
            .map(|field| Ok((field.name.clone(), self.read(&field.name, &field.ty, data)?)))
            .collect()
    }
}
