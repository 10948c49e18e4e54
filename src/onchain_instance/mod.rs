//! # Onchain Program Instance Module
//!
//! Everything needed to turn a typed program call into an `Instruction`.
//!
//! ## Features
//! - Canonical program derived address search
//! - Anchor IDL parsing (legacy and current layouts)
//! - Schema-checked instruction data encoding and decoding
//! - Account resolution from supplied keys, fixed addresses and PDA seeds

pub mod codec;
pub mod idl;
/// Program instance and typed calls
pub mod instance;
pub mod pda;

pub use idl::Idl;
pub use instance::{AccountMap, EnrollmentCall, ProgramCall, ProgramInstance};
