//! EVM Account Vault
//!
//! A signing backend for deterministic EVM accounts: seed phrases in, signed
//! transactions and messages out. The host supplies storage, routing, and
//! caller authentication; this crate owns key derivation, request validation,
//! policy enforcement, and signing.
//!
//! # Security Model
//!
//! - Seed phrases are stored, never logged; in memory they live behind
//!   redacted, zeroizing wrappers.
//! - Private keys are derived per request inside the wallet module, used
//!   once, and dropped. They are never persisted or exposed.
//! - Every transaction signature is gated by the chain mount's policy
//!   (exclusions, inclusions, caller-origin CIDRs) before any key is derived.
//! - Records are validated fully before they are persisted; partial writes
//!   never occur.

pub mod accounts;
pub mod backend;
pub mod chains;
pub mod policy;
pub mod storage;
pub mod tx;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use backend::{
    AddressResponse, Backend, ChainResponse, SignMessageResponse, SignTransactionResponse,
};
pub use error::{
    CryptoError, Error, PolicyViolation, RecordKind, Result, StorageError, ValidationError,
};
pub use storage::{MemoryStorage, Storage};
