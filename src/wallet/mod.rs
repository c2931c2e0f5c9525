//! Key derivation and signing
//!
//! This module is the only place private keys exist. Keys are derived from an
//! account's seed phrase per request, used to sign, and dropped; they are
//! never persisted, cached, or logged.

mod derive;
mod signer;

pub use derive::{derive_signer, generate_seed_phrase};
pub use signer::{
    AccountSigner, SignedMessage, SignedOutcome, SignedTransaction, TransactionDetail,
};
