//! Error types for the vault backend

use std::fmt;
use std::net::IpAddr;

use alloy::primitives::Address;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by every backend operation.
///
/// Nothing is retried and nothing is swallowed: each variant is reported to
/// the immediate caller, which decides how to surface it.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} {name:?} does not exist")]
    NotFound { kind: RecordKind, name: String },

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The two record namespaces the backend persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Account,
    Chain,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Account => f.write_str("account"),
            RecordKind::Chain => f.write_str("chain"),
        }
    }
}

/// A missing or malformed request field. Validation is fail-fast: the first
/// offending field aborts the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field {0:?} is missing")]
    MissingField(&'static str),

    #[error("field {0:?} is not a valid decimal number")]
    InvalidNumber(&'static str),

    #[error("field {0:?} is not a valid address")]
    InvalidAddress(&'static str),

    #[error("field {0:?} is not valid hex")]
    InvalidHex(&'static str),

    #[error("invalid chain id")]
    InvalidChainId,

    #[error("{0:?} is not a valid CIDR block")]
    InvalidCidr(String),

    #[error("{0:?} is not a valid record name")]
    InvalidName(String),
}

/// A signing request rejected by the chain-mount policy.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("{0} is excluded by this chain")]
    Excluded(Address),

    #[error("{0} is not in the set of inclusions of this chain")]
    NotIncluded(Address),

    #[error("source address {0} is not permitted by the chain's CIDR restrictions")]
    OriginNotPermitted(IpAddr),

    #[error("caller network origin is unknown")]
    OriginUnknown,
}

/// A failure in mnemonic handling, key derivation, or signing. Fatal for the
/// request: under valid stored state these should not occur.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("mnemonic generation failed: {0}")]
    MnemonicGeneration(String),

    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// An error from the host-supplied storage backend, propagated unchanged.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored record at {path:?} is corrupt: {reason}")]
    CorruptRecord { path: String, reason: String },
}
